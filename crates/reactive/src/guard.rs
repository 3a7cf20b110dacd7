//! Decode failure threshold.
//!
//! A snapshot whose failure ratio reaches the threshold is rejected as a
//! whole; below it, failures are dropped and the decoded items delivered.

use crate::decoder::Decoded;
use docstream_core::{ConfigError, DecodeFailureReport};
use tracing::{debug, warn};

/// Default failure ratio at which a snapshot is rejected.
pub const DEFAULT_DECODE_FAILURE_THRESHOLD: f64 = 0.5;

/// Outcome of evaluating a snapshot against the threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    /// Deliver the decoded items.
    Accept,
    /// Deliver a failure report instead.
    Reject {
        /// `failures / total`.
        ratio: f64,
    },
}

/// Applies the decode failure threshold to decoded snapshots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdGuard {
    threshold: f64,
}

impl Default for ThresholdGuard {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DECODE_FAILURE_THRESHOLD,
        }
    }
}

impl ThresholdGuard {
    /// Creates a guard. The threshold must be in `(0, 1]`.
    pub fn new(threshold: f64) -> Result<Self, ConfigError> {
        if threshold.is_nan() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Returns the configured threshold.
    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluates a snapshot of `total` documents with `failures` failures.
    ///
    /// An empty snapshot is always accepted.
    pub fn evaluate(&self, total: usize, failures: usize) -> Verdict {
        if total == 0 || failures == 0 {
            return Verdict::Accept;
        }
        let ratio = failures as f64 / total as f64;
        if ratio >= self.threshold {
            Verdict::Reject { ratio }
        } else {
            Verdict::Accept
        }
    }

    /// Applies the guard to a decoded snapshot.
    pub fn check<T>(&self, decoded: Decoded<T>) -> Result<Vec<T>, DecodeFailureReport> {
        let total = decoded.total();
        match self.evaluate(total, decoded.failures.len()) {
            Verdict::Accept => {
                if !decoded.failures.is_empty() {
                    debug!(
                        failures = decoded.failures.len(),
                        total,
                        "dropping documents that failed to decode"
                    );
                }
                Ok(decoded.items)
            }
            Verdict::Reject { ratio } => {
                warn!(
                    failures = decoded.failures.len(),
                    total,
                    ratio,
                    threshold = self.threshold,
                    "snapshot rejected: decode failure threshold reached"
                );
                Err(DecodeFailureReport::new(ratio, total, decoded.failures))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstream_core::{DecodeError, DecodeFailure};

    fn decoded(ok: usize, failed: usize) -> Decoded<usize> {
        Decoded {
            items: (0..ok).collect(),
            failures: (0..failed)
                .map(|i| DecodeFailure::new(format!("bad{}", i), DecodeError::new("bad")))
                .collect(),
        }
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ThresholdGuard::new(0.5).is_ok());
        assert!(ThresholdGuard::new(1.0).is_ok());
        assert_eq!(
            ThresholdGuard::new(0.0),
            Err(ConfigError::InvalidThreshold(0.0))
        );
        assert!(ThresholdGuard::new(1.5).is_err());
        assert!(ThresholdGuard::new(-0.1).is_err());
        assert!(ThresholdGuard::new(f64::NAN).is_err());
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(ThresholdGuard::default().threshold(), 0.5);
    }

    #[test]
    fn test_empty_snapshot_accepted() {
        let guard = ThresholdGuard::default();
        assert_eq!(guard.evaluate(0, 0), Verdict::Accept);
        assert_eq!(guard.check(decoded(0, 0)).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_ratio_at_threshold_rejects() {
        let guard = ThresholdGuard::default();
        assert_eq!(guard.evaluate(10, 5), Verdict::Reject { ratio: 0.5 });
        assert_eq!(guard.evaluate(10, 4), Verdict::Accept);
    }

    #[test]
    fn test_below_threshold_drops_failures() {
        let guard = ThresholdGuard::default();
        let items = guard.check(decoded(7, 3)).unwrap();
        assert_eq!(items, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_rejection_report() {
        let guard = ThresholdGuard::default();
        let report = guard.check(decoded(4, 6)).unwrap_err();
        assert_eq!(report.total(), 10);
        assert_eq!(report.failure_count(), 6);
        assert!((report.ratio() - 0.6).abs() < 1e-9);
        assert_eq!(report.failures()[0].document_id, "bad0");
    }

    #[test]
    fn test_threshold_one_rejects_only_total_failure() {
        let guard = ThresholdGuard::new(1.0).unwrap();
        assert_eq!(guard.evaluate(3, 2), Verdict::Accept);
        assert_eq!(guard.evaluate(3, 3), Verdict::Reject { ratio: 1.0 });
    }
}
