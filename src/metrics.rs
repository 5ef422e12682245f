//! In-process Prometheus registry rendered as text exposition format.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const DURATION_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

type Labels = Vec<(&'static str, String)>;

#[derive(Debug, Clone, Default)]
struct Histogram {
    buckets: [u64; DURATION_BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl Histogram {
    fn observe(&mut self, value: f64) {
        for (slot, bound) in self.buckets.iter_mut().zip(DURATION_BUCKETS.iter()) {
            if value <= *bound {
                *slot += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }
}

struct CounterFamily {
    name: &'static str,
    help: &'static str,
}

const HTTP_REQUESTS: CounterFamily = CounterFamily {
    name: "http_requests_total",
    help: "Total HTTP requests",
};
const PUNCHES_LOGGED: CounterFamily = CounterFamily {
    name: "punches_logged_total",
    help: "Total punches logged",
};
const WORKOUTS_STARTED: CounterFamily = CounterFamily {
    name: "workouts_started_total",
    help: "Total workouts started",
};
const NOTIFICATIONS_SENT: CounterFamily = CounterFamily {
    name: "notifications_sent_total",
    help: "Total notifications sent",
};

const COUNTER_FAMILIES: [&CounterFamily; 4] = [&HTTP_REQUESTS, &PUNCHES_LOGGED, &WORKOUTS_STARTED, &NOTIFICATIONS_SENT];

#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<BTreeMap<(&'static str, Labels), u64>>,
    durations: Mutex<BTreeMap<Labels, Histogram>>,
    active_workouts: AtomicI64,
}

/// A poisoned registry still holds valid numbers.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn inc(&self, family: &CounterFamily, labels: Labels, by: u64) {
        *lock(&self.counters).entry((family.name, labels)).or_insert(0) += by;
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status_code: u16, duration_secs: f64) {
        self.inc(
            &HTTP_REQUESTS,
            vec![
                ("method", method.to_string()),
                ("endpoint", endpoint.to_string()),
                ("status_code", status_code.to_string()),
            ],
            1,
        );
        lock(&self.durations)
            .entry(vec![("method", method.to_string()), ("endpoint", endpoint.to_string())])
            .or_default()
            .observe(duration_secs);
    }

    /// One increment per stored punch row, whatever its `count`
    pub fn record_punch_logged(&self, punch_type: &str) {
        self.inc(&PUNCHES_LOGGED, vec![("punch_type", punch_type.to_string())], 1);
    }

    pub fn record_workout_started(&self, template: &str) {
        self.inc(&WORKOUTS_STARTED, vec![("template", template.to_string())], 1);
    }

    pub fn record_notification_sent(&self, notification_type: &str, status: &str) {
        self.inc(
            &NOTIFICATIONS_SENT,
            vec![("type", notification_type.to_string()), ("status", status.to_string())],
            1,
        );
    }

    pub fn set_active_workouts(&self, count: i64) {
        self.active_workouts.store(count, Ordering::Relaxed);
    }

    pub fn active_workouts(&self) -> i64 {
        self.active_workouts.load(Ordering::Relaxed)
    }

    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        lock(&self.counters)
            .iter()
            .find(|((family, series), _)| {
                *family == name
                    && series.len() == labels.len()
                    && series.iter().zip(labels).all(|((k, v), (lk, lv))| k == lk && v == lv)
            })
            .map(|(_, value)| *value)
            .unwrap_or(0)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let counters = lock(&self.counters);

        for family in COUNTER_FAMILIES {
            let _ = writeln!(out, "# HELP {} {}", family.name, family.help);
            let _ = writeln!(out, "# TYPE {} counter", family.name);
            for ((name, labels), value) in counters.iter().filter(|((name, _), _)| *name == family.name) {
                let _ = writeln!(out, "{}{} {}", name, format_labels(labels, None), value);
            }
        }
        drop(counters);

        let durations = lock(&self.durations);
        let name = "http_request_duration_seconds";
        let _ = writeln!(out, "# HELP {} HTTP request duration in seconds", name);
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for (labels, histogram) in durations.iter() {
            for (bound, count) in DURATION_BUCKETS.iter().zip(histogram.buckets.iter()) {
                let le = bound.to_string();
                let _ = writeln!(out, "{}_bucket{} {}", name, format_labels(labels, Some(le.as_str())), count);
            }
            let _ = writeln!(out, "{}_bucket{} {}", name, format_labels(labels, Some("+Inf")), histogram.count);
            let _ = writeln!(out, "{}_sum{} {}", name, format_labels(labels, None), histogram.sum);
            let _ = writeln!(out, "{}_count{} {}", name, format_labels(labels, None), histogram.count);
        }
        drop(durations);

        let _ = writeln!(out, "# HELP active_workouts Number of currently active workouts");
        let _ = writeln!(out, "# TYPE active_workouts gauge");
        let _ = writeln!(out, "active_workouts {}", self.active_workouts());

        out
    }
}

fn format_labels(labels: &[(&'static str, String)], le: Option<&str>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, escape_label(value)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{}\"", le));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_punch_logged("jab");
        metrics.record_punch_logged("jab");
        metrics.record_punch_logged("hook");

        assert_eq!(metrics.counter_value("punches_logged_total", &[("punch_type", "jab")]), 2);
        assert_eq!(metrics.counter_value("punches_logged_total", &[("punch_type", "hook")]), 1);
        assert_eq!(metrics.counter_value("punches_logged_total", &[("punch_type", "cross")]), 0);
    }

    #[test]
    fn test_render_exposition() {
        let metrics = Metrics::new();
        metrics.record_request("GET", "/health", 200, 0.003);
        metrics.record_workout_started("sparring");
        metrics.set_active_workouts(2);

        let text = metrics.render();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains(r#"http_requests_total{method="GET",endpoint="/health",status_code="200"} 1"#));
        assert!(text.contains(r#"http_request_duration_seconds_bucket{method="GET",endpoint="/health",le="0.005"} 1"#));
        assert!(text.contains(r#"http_request_duration_seconds_count{method="GET",endpoint="/health"} 1"#));
        assert!(text.contains(r#"workouts_started_total{template="sparring"} 1"#));
        assert!(text.contains("active_workouts 2"));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let mut histogram = Histogram::default();
        histogram.observe(0.2);
        histogram.observe(3.0);

        assert_eq!(histogram.buckets[0], 0);
        assert_eq!(histogram.buckets[5], 1); // le=0.25
        assert_eq!(histogram.buckets[9], 2); // le=5
        assert_eq!(histogram.count, 2);
    }

    #[test]
    fn test_label_escaping() {
        assert_eq!(escape_label(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
