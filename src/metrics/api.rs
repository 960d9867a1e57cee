//! HTTP API for tracker snapshots
//!
//! Provides JSON endpoints for routing dashboards and debugging.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::health::{MetricSnapshot, Tracker};

/// API response for /stats endpoint
#[derive(Serialize)]
struct StatsResponse<'a> {
    project_id: &'a str,
    window_secs: f64,
    records: usize,
}

/// API response for /upstreams/<id>
#[derive(Serialize)]
struct UpstreamResponse {
    upstream: String,
    metrics: BTreeMap<String, MetricSnapshot>,
}

/// Start the snapshot API server
///
/// This runs a simple HTTP server that responds to:
/// - GET /upstreams/<id> - All records of an upstream keyed by `network|method`
/// - GET /networks/<network>/<method> - Network-wide record for a method (`*` for all)
/// - GET /stats - Tracker statistics
pub fn start_api_server(addr: SocketAddr, tracker: Arc<Tracker>) {
    thread::spawn(move || {
        if let Err(e) = run_api_server(addr, tracker) {
            error!(error = %e, "API server error");
        }
    });
    info!(%addr, "Snapshot API server started");
}

fn run_api_server(addr: SocketAddr, tracker: Arc<Tracker>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr)?;

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_request(stream, &tracker) {
                        debug!(error = %e, "Request handling error");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
            }
        }
    }

    Ok(())
}

fn handle_request(mut stream: TcpStream, tracker: &Tracker) -> std::io::Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer)?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    let first_line = request.lines().next().unwrap_or("");

    // Parse request path
    let path = first_line.split_whitespace().nth(1).unwrap_or("/");

    let (status, body) = route(path, tracker);

    let response = format!(
        "HTTP/1.1 {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok(())
}

fn not_found() -> (&'static str, String) {
    ("404 Not Found", r#"{"error": "Not found"}"#.to_string())
}

/// Resolve a request path to a status line and JSON body
fn route(path: &str, tracker: &Tracker) -> (&'static str, String) {
    if let Some(upstream) = path.strip_prefix("/upstreams/") {
        if upstream.is_empty() || upstream.contains('/') {
            return not_found();
        }
        let metrics = tracker
            .upstream_metrics(upstream)
            .into_iter()
            .map(|(suffix, record)| (suffix, record.snapshot()))
            .collect();
        let response = UpstreamResponse {
            upstream: upstream.to_string(),
            metrics,
        };
        return ("200 OK", serde_json::to_string_pretty(&response).unwrap_or_default());
    }

    if let Some(rest) = path.strip_prefix("/networks/") {
        let Some((network, method)) = rest.split_once('/') else {
            return not_found();
        };
        return match tracker.network_method_metrics(network, method) {
            Some(record) => (
                "200 OK",
                serde_json::to_string_pretty(&record.snapshot()).unwrap_or_default(),
            ),
            None => not_found(),
        };
    }

    match path {
        "/stats" => {
            let response = StatsResponse {
                project_id: tracker.project_id(),
                window_secs: tracker.window().as_secs_f64(),
                records: tracker.len(),
            };
            ("200 OK", serde_json::to_string_pretty(&response).unwrap_or_default())
        }
        "/" => {
            let help = r#"{
  "endpoints": {
    "/upstreams/<id>": "All metrics of an upstream keyed by network|method",
    "/networks/<network>/<method>": "Network-wide metrics for a method (* for all)",
    "/stats": "Tracker statistics"
  }
}"#;
            ("200 OK", help.to_string())
        }
        _ => not_found(),
    }
}
