//! Expected traffic split under EWMA weighting

use probe_config::BackendClass;
use std::collections::BTreeMap;

/// Weight an EWMA balancer gives an instance with latency `latency_ms`:
/// `1 / (L + 1)`. Negative latencies count as zero.
pub fn ewma_weight(latency_ms: f64) -> f64 {
    1.0 / (latency_ms.max(0.0) + 1.0)
}

/// Normalise per-class weights into traffic shares that sum to 1
pub fn predict_ratios(latencies: &[(BackendClass, f64)]) -> BTreeMap<BackendClass, f64> {
    let weights: Vec<(BackendClass, f64)> = latencies
        .iter()
        .map(|(class, latency)| (*class, ewma_weight(*latency)))
        .collect();
    let total: f64 = weights.iter().map(|(_, w)| w).sum();

    weights
        .into_iter()
        .map(|(class, weight)| (class, weight / total))
        .collect()
}

/// Predicted split between the fast and the slow class
#[derive(Debug, Clone, PartialEq)]
pub struct WeightPrediction {
    pub fast_latency_ms: f64,
    pub slow_latency_ms: f64,
    ratios: BTreeMap<BackendClass, f64>,
}

impl WeightPrediction {
    pub fn from_latencies(fast_latency_ms: f64, slow_latency_ms: f64) -> Self {
        let ratios = predict_ratios(&[
            (BackendClass::Fast, fast_latency_ms),
            (BackendClass::Slow, slow_latency_ms),
        ]);
        Self {
            fast_latency_ms,
            slow_latency_ms,
            ratios,
        }
    }

    /// Expected share of traffic for `class`
    pub fn ratio(&self, class: BackendClass) -> f64 {
        self.ratios.get(&class).copied().unwrap_or(0.0)
    }

    pub fn ratios(&self) -> &BTreeMap<BackendClass, f64> {
        &self.ratios
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_latencies() {
        let prediction = WeightPrediction::from_latencies(5.0, 500.0);

        // 1/6 against 1/501
        let expected_slow = 6.0 / 507.0;
        assert!((prediction.ratio(BackendClass::Slow) - expected_slow).abs() < 1e-12);
        assert!((prediction.ratio(BackendClass::Slow) - 0.0118).abs() < 1e-4);
        assert!((prediction.ratio(BackendClass::Fast) - 501.0 / 507.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratios_sum_to_one() {
        for (fast, slow) in [(0.0, 0.0), (1.0, 10.0), (5.0, 500.0), (250.0, 30.0)] {
            let prediction = WeightPrediction::from_latencies(fast, slow);
            let sum: f64 = prediction.ratios().values().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_equal_latencies_split_evenly() {
        let prediction = WeightPrediction::from_latencies(42.0, 42.0);
        assert!((prediction.ratio(BackendClass::Fast) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weight_clamps_negative_latency() {
        assert_eq!(ewma_weight(-3.0), 1.0);
        assert_eq!(ewma_weight(0.0), 1.0);
        assert_eq!(ewma_weight(1.0), 0.5);
    }
}
