//! Aggregation keys
//!
//! Observations are stored under (upstream, network, method) triplets where any
//! component may be the wildcard `*`.

use std::fmt;

/// Wildcard token accepted from callers
pub const WILDCARD: &str = "*";

/// One component of an aggregation key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches every value of the dimension (`*`)
    Any,
    /// A concrete upstream id, network id or method name
    Exact(String),
}

impl Segment {
    /// Compare against a raw caller-supplied value
    pub fn matches(&self, raw: &str) -> bool {
        match self {
            Segment::Any => raw == WILDCARD,
            Segment::Exact(value) => value == raw,
        }
    }
}

impl From<&str> for Segment {
    fn from(raw: &str) -> Self {
        if raw == WILDCARD {
            Segment::Any
        } else {
            Segment::Exact(raw.to_string())
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Any => f.write_str(WILDCARD),
            Segment::Exact(value) => f.write_str(value),
        }
    }
}

/// Metric record key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripletKey {
    pub upstream: Segment,
    pub network: Segment,
    pub method: Segment,
}

impl TripletKey {
    pub fn new(upstream: &str, network: &str, method: &str) -> Self {
        Self {
            upstream: Segment::from(upstream),
            network: Segment::from(network),
            method: Segment::from(method),
        }
    }

    /// The five rollup keys every concrete observation is applied to.
    ///
    /// Order: exact, upstream+network, upstream-wide, network+method, network-wide.
    pub fn expand(upstream: &str, network: &str, method: &str) -> [TripletKey; 5] {
        let ups = Segment::from(upstream);
        let ntw = Segment::from(network);
        let mtd = Segment::from(method);

        [
            TripletKey {
                upstream: ups.clone(),
                network: ntw.clone(),
                method: mtd.clone(),
            },
            TripletKey {
                upstream: ups.clone(),
                network: ntw.clone(),
                method: Segment::Any,
            },
            TripletKey {
                upstream: ups,
                network: Segment::Any,
                method: Segment::Any,
            },
            TripletKey {
                upstream: Segment::Any,
                network: ntw.clone(),
                method: mtd,
            },
            TripletKey {
                upstream: Segment::Any,
                network: ntw,
                method: Segment::Any,
            },
        ]
    }

    /// `network|method` label used by the per-upstream accessor
    pub fn suffix(&self) -> String {
        format!("{}|{}", self.network, self.method)
    }

    /// Head metadata key for this record's upstream and network
    pub fn duo(&self) -> DuoKey {
        DuoKey {
            upstream: self.upstream.clone(),
            network: self.network.clone(),
        }
    }
}

impl fmt::Display for TripletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.upstream, self.network, self.method)
    }
}

/// Head metadata key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuoKey {
    pub upstream: Segment,
    pub network: Segment,
}

impl DuoKey {
    pub fn new(upstream: &str, network: &str) -> Self {
        Self {
            upstream: Segment::from(upstream),
            network: Segment::from(network),
        }
    }

    /// Network-wide key (`*`, network)
    pub fn network_wide(network: &str) -> Self {
        Self {
            upstream: Segment::Any,
            network: Segment::from(network),
        }
    }
}
