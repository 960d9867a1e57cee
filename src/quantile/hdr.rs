//! HDR histogram accumulator
//!
//! Samples are stored in microseconds in an auto-resizing histogram.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{QuantileAccumulator, QuantileError, QuantileFactory};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Default quantile accumulator
pub struct HdrQuantiles {
    inner: Mutex<Histogram<u64>>,
}

impl HdrQuantiles {
    /// Create an empty accumulator with the given number of significant figures
    pub fn new(precision: u8) -> Result<Self, QuantileError> {
        if precision > 5 {
            return Err(QuantileError::InvalidPrecision(precision));
        }
        let histogram = Histogram::new(precision)?;
        Ok(Self {
            inner: Mutex::new(histogram),
        })
    }

    /// Factory handing out empty copies of one validated template histogram
    pub fn factory(precision: u8) -> Result<QuantileFactory, QuantileError> {
        let template = Self::new(precision)?.inner.into_inner();
        Ok(Arc::new(move || {
            Box::new(HdrQuantiles {
                inner: Mutex::new(template.clone()),
            }) as Box<dyn QuantileAccumulator>
        }))
    }
}

impl QuantileAccumulator for HdrQuantiles {
    fn add(&self, seconds: f64) {
        // NaN and negative samples saturate to 0
        let micros = (seconds * MICROS_PER_SECOND).round() as u64;
        self.inner.lock().saturating_record(micros);
    }

    fn reset(&self) {
        self.inner.lock().reset();
    }

    fn quantile(&self, q: f64) -> f64 {
        let h = self.inner.lock();
        if h.len() == 0 {
            return 0.0;
        }
        h.value_at_quantile(q.clamp(0.0, 1.0)) as f64 / MICROS_PER_SECOND
    }

    fn count(&self) -> u64 {
        self.inner.lock().len()
    }
}
