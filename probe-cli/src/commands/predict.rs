use probe_config::{BackendClass, RoutingConfig};
use probe_routing::WeightPrediction;

pub fn predict_command(routing: &RoutingConfig, fast_latency_ms: Option<f64>, slow_latency_ms: Option<f64>) {
    let prediction = WeightPrediction::from_latencies(
        fast_latency_ms.unwrap_or(routing.fast_latency_ms),
        slow_latency_ms.unwrap_or(routing.slow_latency_ms),
    );
    println!("{}", render(&prediction));
}

fn render(prediction: &WeightPrediction) -> String {
    let mut lines = vec![format!(
        "Expected split with w = 1/(L+1), L_fast={}ms L_slow={}ms",
        prediction.fast_latency_ms, prediction.slow_latency_ms
    )];
    for class in BackendClass::all() {
        lines.push(format!(
            "  {:<5} {:.2}%",
            class.as_str(),
            prediction.ratio(*class) * 100.0
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_prediction() {
        let output = render(&WeightPrediction::from_latencies(5.0, 500.0));
        assert!(output.contains("fast  98.82%"));
        assert!(output.contains("slow  1.18%"));
    }
}
