//! # Clear Protection
//!
//! A node restart empties its mempool and refills it over minutes. Mirroring
//! that literally would drop and re-announce tens of thousands of
//! transactions, so a sharp shrink of a large mempool suspends deletions for
//! a cooldown instead.
//!
//! ```text
//! [Idle] ──shrink ≥ threshold──→ [Protecting] ──cooldown elapsed──→ [Released]
//!   ↑                                                                  │
//!   └──────────────── next cycle deletes vanished txs ────────────────┘
//! ```

use shared_types::Timestamp;
use tracing::{info, warn};

use crate::config::ClearProtectionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    Idle,
    /// Deletions suspended until the given time (ms).
    Protecting { until: Timestamp },
    /// Cooldown over; the next cycle deletes and returns to idle.
    Released,
}

#[derive(Debug, Clone)]
pub struct ClearProtection {
    config: ClearProtectionConfig,
    state: ProtectionState,
}

impl ClearProtection {
    pub fn new(config: ClearProtectionConfig) -> Self {
        Self {
            config,
            state: ProtectionState::Idle,
        }
    }

    pub fn state(&self) -> ProtectionState {
        self.state
    }

    pub fn is_protecting(&self) -> bool {
        matches!(self.state, ProtectionState::Protecting { .. })
    }

    /// Advance the state machine for one cycle.
    ///
    /// `local_size` is the snapshot size before this cycle's inserts.
    /// Returns true when protection was just engaged.
    pub fn evaluate(&mut self, local_size: usize, upstream_size: usize, now: Timestamp) -> bool {
        if let ProtectionState::Protecting { until } = self.state {
            if now >= until {
                info!("Mempool clear protection cooldown elapsed, deletions resume");
                self.state = ProtectionState::Released;
            }
        }

        if self.state != ProtectionState::Idle || local_size <= self.config.min_size {
            return false;
        }

        let ratio = upstream_size as f64 / local_size as f64;
        if ratio > self.config.ratio {
            return false;
        }

        let until = now + self.config.cooldown.as_millis() as Timestamp;
        self.state = ProtectionState::Protecting { until };
        warn!(
            local_size,
            upstream_size,
            cooldown_secs = self.config.cooldown.as_secs(),
            "Mempool shrank sharply, suspecting an upstream restart: deletions suspended"
        );
        true
    }

    /// Whether this cycle may delete vanished transactions. Consumes a
    /// pending release.
    pub fn allow_deletions(&mut self) -> bool {
        match self.state {
            ProtectionState::Protecting { .. } => false,
            ProtectionState::Released | ProtectionState::Idle => {
                self.state = ProtectionState::Idle;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn protection() -> ClearProtection {
        ClearProtection::new(ClearProtectionConfig::default())
    }

    #[test]
    fn test_small_mempools_are_never_protected() {
        let mut protection = protection();
        assert!(!protection.evaluate(20_000, 0, 0));
        assert!(protection.allow_deletions());
    }

    #[test]
    fn test_mild_shrink_is_not_protected() {
        let mut protection = protection();
        assert!(!protection.evaluate(25_000, 20_001, 0));
        assert_eq!(protection.state(), ProtectionState::Idle);
    }

    #[test]
    fn test_cooldown_cycle() {
        let mut protection = protection();
        assert!(protection.evaluate(25_000, 15_000, 1_000));
        assert!(!protection.allow_deletions());

        // Still protecting, and a further shrink does not re-arm.
        assert!(!protection.evaluate(25_000, 1_000, 60_000));
        assert!(!protection.allow_deletions());

        let after = 1_000 + Duration::from_secs(600).as_millis() as u64;
        assert!(!protection.evaluate(25_000, 15_000, after));
        assert_eq!(protection.state(), ProtectionState::Released);
        assert!(protection.allow_deletions());
        assert_eq!(protection.state(), ProtectionState::Idle);
    }

    #[test]
    fn test_exact_ratio_triggers() {
        let mut protection = protection();
        assert!(protection.evaluate(25_000, 20_000, 0));
    }
}
