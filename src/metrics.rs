//! In-process relay counters with a Prometheus text exposition.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::Stage;
use crate::prompt::EndpointKind;

/// Latency histogram bucket upper bounds in ms. Upstream LLM calls dominate,
/// so the range reaches well past a second.
const LATENCY_BUCKETS_MS: [u64; 10] = [50, 100, 250, 500, 1000, 2500, 5000, 10000, 30000, 60000];

#[derive(Default)]
struct KindCounters {
    requests: AtomicU64,
    relayed: AtomicU64,
}

pub struct RelayMetrics {
    decryption: KindCounters,
    globalprotect: KindCounters,
    bad_requests_total: AtomicU64,
    completion_failures_total: AtomicU64,
    publish_failures_total: AtomicU64,
    hist_counts: Vec<AtomicU64>,
    hist_sum_ms: AtomicU64,
    hist_count: AtomicU64,
    process_start_epoch: f64,
    process_start_instant: Instant,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayMetrics {
    pub fn new() -> Self {
        let start_time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            decryption: KindCounters::default(),
            globalprotect: KindCounters::default(),
            bad_requests_total: AtomicU64::new(0),
            completion_failures_total: AtomicU64::new(0),
            publish_failures_total: AtomicU64::new(0),
            hist_counts: LATENCY_BUCKETS_MS.iter().map(|_| AtomicU64::new(0)).collect(),
            hist_sum_ms: AtomicU64::new(0),
            hist_count: AtomicU64::new(0),
            process_start_epoch: start_time.as_secs_f64(),
            process_start_instant: Instant::now(),
        }
    }

    fn kind(&self, kind: EndpointKind) -> &KindCounters {
        match kind {
            EndpointKind::Decryption => &self.decryption,
            EndpointKind::GlobalProtect => &self.globalprotect,
        }
    }

    pub fn record_request(&self, kind: EndpointKind) {
        self.kind(kind).requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bad_request(&self) {
        self.bad_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self, kind: EndpointKind) {
        self.kind(kind).relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, stage: Stage) {
        let counter = match stage {
            Stage::Completion => &self.completion_failures_total,
            Stage::Publish => &self.publish_failures_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency_ms(&self, ms: u64) {
        self.hist_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.hist_count.fetch_add(1, Ordering::Relaxed);
        if let Some(idx) = LATENCY_BUCKETS_MS.iter().position(|ub| ms <= *ub) {
            self.hist_counts[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self, kind: EndpointKind) -> u64 {
        self.kind(kind).requests.load(Ordering::Relaxed)
    }

    pub fn relayed_total(&self, kind: EndpointKind) -> u64 {
        self.kind(kind).relayed.load(Ordering::Relaxed)
    }

    pub fn failures_total(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Completion => self.completion_failures_total.load(Ordering::Relaxed),
            Stage::Publish => self.publish_failures_total.load(Ordering::Relaxed),
        }
    }

    pub fn render(&self, model: &str) -> String {
        let mut buf = String::new();
        writeln!(
            &mut buf,
            "# HELP pangpt_requests_total Log events received per endpoint\n# TYPE pangpt_requests_total counter"
        )
        .ok();
        for kind in EndpointKind::ALL {
            writeln!(
                &mut buf,
                "pangpt_requests_total{{kind=\"{}\"}} {}",
                kind,
                self.requests_total(kind)
            )
            .ok();
        }
        writeln!(
            &mut buf,
            "# HELP pangpt_relayed_total Log events answered and posted to chat\n# TYPE pangpt_relayed_total counter"
        )
        .ok();
        for kind in EndpointKind::ALL {
            writeln!(
                &mut buf,
                "pangpt_relayed_total{{kind=\"{}\"}} {}",
                kind,
                self.relayed_total(kind)
            )
            .ok();
        }
        writeln!(
            &mut buf,
            "# HELP pangpt_bad_requests_total Request bodies rejected before relaying\n# TYPE pangpt_bad_requests_total counter"
        )
        .ok();
        writeln!(
            &mut buf,
            "pangpt_bad_requests_total {}",
            self.bad_requests_total.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(
            &mut buf,
            "# HELP pangpt_failures_total Relay failures per pipeline stage\n# TYPE pangpt_failures_total counter"
        )
        .ok();
        for stage in [Stage::Completion, Stage::Publish] {
            writeln!(
                &mut buf,
                "pangpt_failures_total{{stage=\"{}\"}} {}",
                stage.as_str(),
                self.failures_total(stage)
            )
            .ok();
        }

        writeln!(
            &mut buf,
            "# HELP pangpt_request_latency_ms Relay latency histogram milliseconds\n# TYPE pangpt_request_latency_ms histogram"
        )
        .ok();
        let mut cumulative: u64 = 0;
        for (i, ub) in LATENCY_BUCKETS_MS.iter().enumerate() {
            cumulative += self.hist_counts[i].load(Ordering::Relaxed);
            writeln!(
                &mut buf,
                "pangpt_request_latency_ms_bucket{{le=\"{}\"}} {}",
                ub, cumulative
            )
            .ok();
        }
        let count = self.hist_count.load(Ordering::Relaxed);
        writeln!(
            &mut buf,
            "pangpt_request_latency_ms_bucket{{le=\"+Inf\"}} {}",
            count
        )
        .ok();
        writeln!(
            &mut buf,
            "pangpt_request_latency_ms_sum {}",
            self.hist_sum_ms.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(&mut buf, "pangpt_request_latency_ms_count {}", count).ok();

        writeln!(
            &mut buf,
            "# HELP pangpt_build_info Build information\n# TYPE pangpt_build_info gauge"
        )
        .ok();
        writeln!(
            &mut buf,
            "pangpt_build_info{{version=\"{}\",model=\"{}\"}} 1",
            env!("CARGO_PKG_VERSION"),
            model
        )
        .ok();
        writeln!(
            &mut buf,
            "# HELP pangpt_process_start_time_seconds Process start time (Unix epoch seconds)\n# TYPE pangpt_process_start_time_seconds gauge"
        )
        .ok();
        writeln!(
            &mut buf,
            "pangpt_process_start_time_seconds {}",
            self.process_start_epoch
        )
        .ok();
        writeln!(
            &mut buf,
            "# HELP pangpt_process_uptime_seconds Process uptime seconds\n# TYPE pangpt_process_uptime_seconds gauge"
        )
        .ok();
        writeln!(
            &mut buf,
            "pangpt_process_uptime_seconds {}",
            self.process_start_instant.elapsed().as_secs_f64()
        )
        .ok();
        buf
    }
}
