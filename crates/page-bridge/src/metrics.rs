use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntCounterVec, Registry};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeMetricsSnapshot {
    pub events: u64,
    pub dropped: u64,
    pub dispatch_errors: u64,
    pub commands: u64,
    pub command_failures: u64,
}

static EVENTS: AtomicU64 = AtomicU64::new(0);
static DROPPED: AtomicU64 = AtomicU64::new(0);
static DISPATCH_ERRORS: AtomicU64 = AtomicU64::new(0);
static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref BRIDGE_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "chatpilot_bridge_events_total",
            "Raw page events received, by kind"
        ),
        &["kind"]
    )
    .unwrap();
    static ref BRIDGE_DROPPED_TOTAL: IntCounter = IntCounter::new(
        "chatpilot_bridge_dropped_total",
        "Raw page events intentionally dropped by mapping policy",
    )
    .unwrap();
    static ref BRIDGE_DISPATCH_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "chatpilot_bridge_dispatch_errors_total",
        "Payloads that failed to parse or dispatch",
    )
    .unwrap();
    static ref BRIDGE_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "chatpilot_bridge_commands_total",
            "Outbound commands executed, by operation"
        ),
        &["op"]
    )
    .unwrap();
    static ref BRIDGE_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "chatpilot_bridge_command_failures_total",
            "Outbound command failures, by operation"
        ),
        &["op"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register bridge metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, BRIDGE_EVENTS_TOTAL.clone());
    register(registry, BRIDGE_DROPPED_TOTAL.clone());
    register(registry, BRIDGE_DISPATCH_ERRORS_TOTAL.clone());
    register(registry, BRIDGE_COMMANDS_TOTAL.clone());
    register(registry, BRIDGE_COMMAND_FAILURES_TOTAL.clone());
}

pub fn record_event(kind: &str) {
    EVENTS.fetch_add(1, Ordering::Relaxed);
    BRIDGE_EVENTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_dropped() {
    DROPPED.fetch_add(1, Ordering::Relaxed);
    BRIDGE_DROPPED_TOTAL.inc();
}

pub fn record_dispatch_error() {
    DISPATCH_ERRORS.fetch_add(1, Ordering::Relaxed);
    BRIDGE_DISPATCH_ERRORS_TOTAL.inc();
}

pub fn record_command(op: &str) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    BRIDGE_COMMANDS_TOTAL.with_label_values(&[op]).inc();
}

pub fn record_command_failure(op: &str) {
    COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
    BRIDGE_COMMAND_FAILURES_TOTAL.with_label_values(&[op]).inc();
}

pub fn snapshot() -> BridgeMetricsSnapshot {
    BridgeMetricsSnapshot {
        events: EVENTS.load(Ordering::Relaxed),
        dropped: DROPPED.load(Ordering::Relaxed),
        dispatch_errors: DISPATCH_ERRORS.load(Ordering::Relaxed),
        commands: COMMANDS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    EVENTS.store(0, Ordering::Relaxed);
    DROPPED.store(0, Ordering::Relaxed);
    DISPATCH_ERRORS.store(0, Ordering::Relaxed);
    COMMANDS.store(0, Ordering::Relaxed);
    COMMAND_FAILURES.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_and_commands() {
        reset();
        record_event("message_add");
        record_dropped();
        record_command("sendMessage");
        record_command_failure("sendMessage");
        let snap = snapshot();
        assert_eq!(snap.events, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.commands, 1);
        assert_eq!(snap.command_failures, 1);
    }
}
