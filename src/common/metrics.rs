//! Group admin metrics
//!
//! Prometheus-compatible counters, gauges and a latency histogram for
//! membership mutations and convergence waits.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for transition waits (in milliseconds)
const WAIT_BUCKETS: [f64; 10] = [
    10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 15000.0, 30000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default wait buckets
    pub fn new() -> Self {
        Self::with_buckets(&WAIT_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // stored as microseconds
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative bucket counts, ending with +Inf
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Global metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    pub groups_added: Counter,
    pub groups_removed: Counter,
    pub servers_moved: Counter,
    pub tables_moved: Counter,

    pub transition_waits: Counter,
    pub transition_timeouts: Counter,
    pub transition_cancellations: Counter,
    pub transition_wait_ms: Histogram,

    /// Last value seen by `list_servers_in_transition`
    pub servers_in_transition: Gauge,

    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            groups_added: Counter::new(),
            groups_removed: Counter::new(),
            servers_moved: Counter::new(),
            tables_moved: Counter::new(),
            transition_waits: Counter::new(),
            transition_timeouts: Counter::new(),
            transition_cancellations: Counter::new(),
            transition_wait_ms: Histogram::new(),
            servers_in_transition: Gauge::new(),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of one convergence wait
    pub fn record_wait(&self, elapsed: Duration, result: &crate::Result<()>) {
        self.transition_waits.inc();
        self.transition_wait_ms
            .observe(elapsed.as_secs_f64() * 1000.0);
        match result {
            Err(crate::Error::TransitionTimeout { .. }) => self.transition_timeouts.inc(),
            Err(crate::Error::Cancelled) => self.transition_cancellations.inc(),
            _ => {}
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = [
            ("rsgroup_groups_added_total", "Groups created", &self.groups_added),
            ("rsgroup_groups_removed_total", "Groups removed", &self.groups_removed),
            ("rsgroup_servers_moved_total", "Servers reassigned between groups", &self.servers_moved),
            ("rsgroup_tables_moved_total", "Tables reassigned between groups", &self.tables_moved),
            ("rsgroup_transition_waits_total", "Convergence waits started", &self.transition_waits),
            ("rsgroup_transition_timeouts_total", "Convergence waits that timed out", &self.transition_timeouts),
            ("rsgroup_transition_cancellations_total", "Convergence waits cancelled", &self.transition_cancellations),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        out.push_str("# HELP rsgroup_servers_in_transition Servers violating group placement\n");
        out.push_str("# TYPE rsgroup_servers_in_transition gauge\n");
        let _ = writeln!(
            out,
            "rsgroup_servers_in_transition {}",
            self.servers_in_transition.get()
        );

        out.push_str("# HELP rsgroup_uptime_seconds Uptime in seconds\n");
        out.push_str("# TYPE rsgroup_uptime_seconds gauge\n");
        let _ = writeln!(out, "rsgroup_uptime_seconds {}", self.uptime_seconds());

        out.push_str("# HELP rsgroup_transition_wait_ms Convergence wait duration in milliseconds\n");
        out.push_str("# TYPE rsgroup_transition_wait_ms histogram\n");
        for (le, count) in self.transition_wait_ms.get_buckets() {
            if le.is_infinite() {
                let _ = writeln!(out, "rsgroup_transition_wait_ms_bucket{{le=\"+Inf\"}} {}", count);
            } else {
                let _ = writeln!(out, "rsgroup_transition_wait_ms_bucket{{le=\"{}\"}} {}", le, count);
            }
        }
        let _ = writeln!(out, "rsgroup_transition_wait_ms_sum {}", self.transition_wait_ms.sum());
        let _ = writeln!(out, "rsgroup_transition_wait_ms_count {}", self.transition_wait_ms.count());

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<MetricsRegistry> =
    once_cell::sync::Lazy::new(MetricsRegistry::new);
