//! Metrics (§4.11): request/denial/reconnect/compat counters plus latency
//! summaries, exposed both as Prometheus text and as a periodically-pushed
//! OTLP-shaped JSON document.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

const LATENCY_SAMPLE_CAP: usize = 500;

#[derive(Debug, Default, Clone, Hash, PartialEq, Eq)]
struct CounterKey {
    provider: String,
    subtype: String,
    reason: String,
}

#[derive(Debug, Default)]
struct LatencySeries {
    samples: Vec<u64>,
}

impl LatencySeries {
    fn record(&mut self, value_ms: u64) {
        if self.samples.len() >= LATENCY_SAMPLE_CAP {
            self.samples.remove(0);
        }
        self.samples.push(value_ms);
    }

    fn summary(&self) -> LatencySummary {
        if self.samples.is_empty() {
            return LatencySummary::default();
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let avg = sum as f64 / count as f64;
        let p95_idx = ((count as f64) * 0.95).ceil() as usize;
        let p95 = sorted[p95_idx.saturating_sub(1).min(count - 1)];
        LatencySummary {
            count,
            avg_ms: avg,
            p95_ms: p95,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub avg_ms: f64,
    pub p95_ms: u64,
}

/// Canonical series name for control-request round-trip latency (§4.11).
pub const CONTROL_RESPONSE_LATENCY_MS: &str = "control_response_latency_ms";

/// All counters and latency summaries the gateway tracks. Every method
/// takes interior-locked state and is safe to call from any worker (§5
/// "Metric counters/histograms use interior locking, readable any time.").
#[derive(Default)]
pub struct Metrics {
    requests_total: Mutex<HashMap<CounterKey, u64>>,
    reconnect_attempts_total: Mutex<HashMap<CounterKey, u64>>,
    policy_denials_total: Mutex<HashMap<CounterKey, u64>>,
    unsupported_subtype_total: Mutex<HashMap<CounterKey, u64>>,
    latencies: Mutex<HashMap<CounterKey, LatencySeries>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, provider: &str, subtype: &str) {
        *self
            .requests_total
            .lock()
            .entry(CounterKey {
                provider: provider.to_owned(),
                subtype: subtype.to_owned(),
                reason: String::new(),
            })
            .or_insert(0) += 1;
    }

    pub fn record_reconnect_attempt(&self, provider: &str) {
        *self
            .reconnect_attempts_total
            .lock()
            .entry(CounterKey {
                provider: provider.to_owned(),
                subtype: String::new(),
                reason: String::new(),
            })
            .or_insert(0) += 1;
    }

    pub fn record_policy_denial(&self, provider: &str, reason: &str) {
        *self
            .policy_denials_total
            .lock()
            .entry(CounterKey {
                provider: provider.to_owned(),
                subtype: String::new(),
                reason: reason.to_owned(),
            })
            .or_insert(0) += 1;
    }

    pub fn record_unsupported_subtype(&self, provider: &str, subtype: &str) {
        *self
            .unsupported_subtype_total
            .lock()
            .entry(CounterKey {
                provider: provider.to_owned(),
                subtype: subtype.to_owned(),
                reason: String::new(),
            })
            .or_insert(0) += 1;
    }

    pub fn record_latency(&self, metric: &str, provider: &str, subtype: &str, value_ms: u64) {
        self.latencies
            .lock()
            .entry(CounterKey {
                provider: provider.to_owned(),
                subtype: subtype.to_owned(),
                reason: metric.to_owned(),
            })
            .or_default()
            .record(value_ms);
    }

    /// Render Prometheus text exposition (`text/plain; version=0.0.4`).
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        render_counter(&mut out, "requests_total", &self.requests_total.lock(), &["provider", "subtype"]);
        render_counter(
            &mut out,
            "reconnect_attempts_total",
            &self.reconnect_attempts_total.lock(),
            &["provider"],
        );
        render_counter(
            &mut out,
            "policy_denials_total",
            &self.policy_denials_total.lock(),
            &["provider", "reason"],
        );
        render_counter(
            &mut out,
            "unsupported_subtype_total",
            &self.unsupported_subtype_total.lock(),
            &["provider", "subtype"],
        );

        let latencies = self.latencies.lock();
        for (key, series) in latencies.iter() {
            let summary = series.summary();
            let labels = format!("metric=\"{}\",provider=\"{}\",subtype=\"{}\"", key.reason, key.provider, key.subtype);
            out.push_str(&format!("# HELP gateway_latency_ms Control latency summary\n"));
            out.push_str(&format!("# TYPE gateway_latency_ms summary\n"));
            out.push_str(&format!("gateway_latency_ms_count{{{labels}}} {}\n", summary.count));
            out.push_str(&format!("gateway_latency_ms_avg{{{labels}}} {}\n", summary.avg_ms));
            out.push_str(&format!("gateway_latency_ms_p95{{{labels}}} {}\n", summary.p95_ms));
        }
        out
    }

    /// OTLP-flavored JSON document (§4.11): `{timestampUnixNano, metrics:[...]}`.
    pub fn otlp_json(&self, now_unix_nanos: u128) -> serde_json::Value {
        let mut metrics = Vec::new();

        push_counter_metrics(&mut metrics, "requests_total", &self.requests_total.lock());
        push_counter_metrics(&mut metrics, "reconnect_attempts_total", &self.reconnect_attempts_total.lock());
        push_counter_metrics(&mut metrics, "policy_denials_total", &self.policy_denials_total.lock());
        push_counter_metrics(&mut metrics, "unsupported_subtype_total", &self.unsupported_subtype_total.lock());

        for (key, series) in self.latencies.lock().iter() {
            let summary = series.summary();
            let labels = serde_json::json!({"metric": key.reason, "provider": key.provider, "subtype": key.subtype});
            metrics.push(serde_json::json!({"name": "gateway_latency_ms_avg", "labels": labels, "value": summary.avg_ms, "type": "gauge"}));
            metrics.push(serde_json::json!({"name": "gateway_latency_ms_p95", "labels": labels, "value": summary.p95_ms, "type": "gauge"}));
            metrics.push(serde_json::json!({"name": "gateway_latency_ms_count", "labels": labels, "value": summary.count, "type": "counter"}));
        }

        serde_json::json!({
            "timestampUnixNano": now_unix_nanos.to_string(),
            "metrics": metrics,
        })
    }

    /// Push the OTLP-shaped document to `endpoint` once. Errors are logged,
    /// not propagated — a failed metrics push must never affect session
    /// traffic.
    pub async fn push_otlp(&self, endpoint: &str) {
        let now_nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let body = self.otlp_json(now_nanos);
        let client = reqwest::Client::new();
        if let Err(e) = client.post(endpoint).json(&body).send().await {
            tracing::warn!(error = %e, endpoint, "otlp metrics push failed");
        }
    }
}

fn render_counter(out: &mut String, name: &str, table: &HashMap<CounterKey, u64>, label_names: &[&str]) {
    out.push_str(&format!("# HELP {name} Counter\n# TYPE {name} counter\n"));
    for (key, value) in table.iter() {
        let mut labels = Vec::new();
        for label in label_names {
            let v = match *label {
                "provider" => &key.provider,
                "subtype" => &key.subtype,
                "reason" => &key.reason,
                _ => continue,
            };
            labels.push(format!("{label}=\"{v}\""));
        }
        out.push_str(&format!("{name}{{{}}} {value}\n", labels.join(",")));
    }
}

fn push_counter_metrics(out: &mut Vec<serde_json::Value>, name: &str, table: &HashMap<CounterKey, u64>) {
    for (key, value) in table.iter() {
        let labels = serde_json::json!({"provider": key.provider, "subtype": key.subtype, "reason": key.reason});
        out.push(serde_json::json!({"name": name, "labels": labels, "value": value, "type": "counter"}));
    }
}

/// Interval helper for the periodic OTLP pusher (§4.11 default 15s).
pub fn otlp_push_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prometheus_output_contains_recorded_counters() {
        let metrics = Metrics::new();
        metrics.record_request("mock", "initialize");
        metrics.record_policy_denial("mock", "scheme_not_allowed");
        let text = metrics.render_prometheus();
        assert!(text.contains("requests_total{provider=\"mock\",subtype=\"initialize\"} 1"));
        assert!(text.contains("policy_denials_total"));
    }

    #[test]
    fn latency_summary_tracks_count_avg_p95() {
        let metrics = Metrics::new();
        for v in [10, 20, 30, 40, 50] {
            metrics.record_latency(CONTROL_RESPONSE_LATENCY_MS, "mock", "initialize", v);
        }
        let latencies = metrics.latencies.lock();
        let series = latencies
            .values()
            .next()
            .expect("one series recorded");
        let summary = series.summary();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.avg_ms, 30.0);
    }

    #[test]
    fn otlp_json_has_expected_shape() {
        let metrics = Metrics::new();
        metrics.record_request("claude", "set_model");
        let doc = metrics.otlp_json(123);
        assert_eq!(doc["timestampUnixNano"], "123");
        assert!(doc["metrics"].as_array().unwrap().iter().any(|m| m["name"] == "requests_total"));
    }
}
