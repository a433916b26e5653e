//! Rolling window of incoming transactions.

use shared_types::Timestamp;
use std::collections::VecDeque;
use std::time::Duration;

/// Incoming rates over the sample window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub tx_per_second: f64,
    pub vbytes_per_second: f64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Timestamp,
    vsize: f64,
}

/// Samples of (arrival time, vsize), trimmed to the sample period.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    period: Duration,
    samples: VecDeque<Sample>,
}

impl ThroughputWindow {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            samples: VecDeque::new(),
        }
    }

    pub fn record(&mut self, at: Timestamp, vsize: f64) {
        self.samples.push_back(Sample { at, vsize });
    }

    /// Drop samples older than the period.
    pub fn trim(&mut self, now: Timestamp) {
        let cutoff = now.saturating_sub(self.period.as_millis() as Timestamp);
        while self.samples.front().is_some_and(|sample| sample.at < cutoff) {
            self.samples.pop_front();
        }
    }

    pub fn rates(&self, now: Timestamp) -> Throughput {
        let period_secs = self.period.as_secs_f64();
        if period_secs <= 0.0 {
            return Throughput::default();
        }
        let cutoff = now.saturating_sub(self.period.as_millis() as Timestamp);
        let (count, vbytes) = self
            .samples
            .iter()
            .filter(|sample| sample.at >= cutoff)
            .fold((0usize, 0f64), |(count, vbytes), sample| {
                (count + 1, vbytes + sample.vsize)
            });
        Throughput {
            tx_per_second: count as f64 / period_secs,
            vbytes_per_second: vbytes / period_secs,
        }
    }
}
