//! Routing verdict

use crate::predictor::WeightPrediction;
use crate::sampler::RoutingTally;
use probe_config::BackendClass;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS: balancer steers traffic away from the slow backend"),
            Verdict::Fail { reason } => write!(f, "FAIL: {}", reason),
        }
    }
}

/// Observed split, predicted split and the resulting verdict
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingReport {
    pub tally: RoutingTally,
    pub prediction: WeightPrediction,
    pub slow_ratio_threshold: f64,
    pub verdict: Verdict,
}

impl RoutingReport {
    /// Judge a tally: fail when nothing was attributed or when the slow share
    /// is above `slow_ratio_threshold`. A share equal to the threshold passes.
    pub fn evaluate(tally: RoutingTally, prediction: WeightPrediction, slow_ratio_threshold: f64) -> Self {
        let verdict = match tally.ratio(BackendClass::Slow) {
            None => Verdict::Fail {
                reason: format!(
                    "none of {} probes could be attributed to a backend",
                    tally.attempted()
                ),
            },
            Some(slow) if slow > slow_ratio_threshold => Verdict::Fail {
                reason: format!(
                    "slow backend served {:.1}% of probes, above the {:.1}% threshold; EWMA does not appear to be working",
                    slow * 100.0,
                    slow_ratio_threshold * 100.0
                ),
            },
            Some(_) => Verdict::Pass,
        };

        Self {
            tally,
            prediction,
            slow_ratio_threshold,
            verdict,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict.is_pass()
    }

    pub fn slow_ratio(&self) -> Option<f64> {
        self.tally.ratio(BackendClass::Slow)
    }
}

impl fmt::Display for RoutingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Routing distribution")?;
        for class in BackendClass::all() {
            let observed = self
                .tally
                .ratio(*class)
                .map(|r| format!("{:.1}%", r * 100.0))
                .unwrap_or_else(|| "n/a".to_string());
            writeln!(
                f,
                "  {:<5} {:>4} requests  observed {:>6}  expected {:.1}%",
                class.as_str(),
                self.tally.count(*class),
                observed,
                self.prediction.ratio(*class) * 100.0
            )?;
        }
        writeln!(
            f,
            "  unattributed {}  failed {}",
            self.tally.unattributed(),
            self.tally.failed()
        )?;
        for (marker, count) in self.tally.upstreams() {
            writeln!(f, "  upstream {:<21} {:>4} responses", marker, count)?;
        }
        writeln!(
            f,
            "  expected with L_fast={}ms L_slow={}ms",
            self.prediction.fast_latency_ms, self.prediction.slow_latency_ms
        )?;
        write!(f, "{}", self.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(fast: u64, slow: u64) -> RoutingTally {
        let mut tally = RoutingTally::default();
        for _ in 0..fast {
            tally.record(BackendClass::Fast);
        }
        for _ in 0..slow {
            tally.record(BackendClass::Slow);
        }
        tally
    }

    fn prediction() -> WeightPrediction {
        WeightPrediction::from_latencies(5.0, 500.0)
    }

    #[test]
    fn test_low_slow_share_passes() {
        let report = RoutingReport::evaluate(tally(95, 5), prediction(), 0.15);
        assert!(report.is_pass());
        assert_eq!(report.slow_ratio(), Some(0.05));
    }

    #[test]
    fn test_share_at_threshold_passes() {
        let report = RoutingReport::evaluate(tally(3, 1), prediction(), 0.25);
        assert!(report.is_pass());
    }

    #[test]
    fn test_high_slow_share_fails() {
        let report = RoutingReport::evaluate(tally(50, 50), prediction(), 0.15);
        match &report.verdict {
            Verdict::Fail { reason } => assert!(reason.contains("50.0%")),
            Verdict::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn test_nothing_attributed_fails() {
        let mut empty = RoutingTally::default();
        empty.record_unattributed();
        empty.record_failure();
        let report = RoutingReport::evaluate(empty, prediction(), 0.15);
        assert!(!report.is_pass());
        assert!(report.to_string().contains("none of 2 probes"));
    }

    #[test]
    fn test_summary_lists_both_classes() {
        let summary = RoutingReport::evaluate(tally(98, 2), prediction(), 0.15).to_string();
        assert!(summary.contains("fast"));
        assert!(summary.contains("slow"));
        assert!(summary.contains("expected 1.2%"));
        assert!(summary.ends_with("PASS: balancer steers traffic away from the slow backend"));
        assert!(!summary.contains("upstream"));
    }

    #[test]
    fn test_summary_lists_upstream_markers() {
        let mut observed = tally(9, 1);
        observed.record_upstream("10.1.1.1:7081");
        let summary = RoutingReport::evaluate(observed, prediction(), 0.15).to_string();
        assert!(summary.contains("upstream 10.1.1.1:7081"));
    }
}
