//! Metrics sink boundary.
//!
//! Persistence and admin code never touch `obs::metrics` directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Get,
    Put,
    Update,
    Delete,
    Query,
    Scan,
    BatchWrite,
    Admin,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        table: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        table: &'a str,
        rows: u64,
    },
    ConditionalConflict {
        table: &'a str,
    },
    BatchRetry {
        table: &'a str,
        unprocessed: u64,
    },
    SchemaChange {
        table: &'a str,
        changes: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { kind, table } => {
                metrics::with_state_mut(|m| {
                    m.ops.record_call(kind);
                    m.tables.entry(table.to_string()).or_default().record_call(kind);
                });
            }

            MetricsEvent::ExecFinish { kind, table, rows } => {
                metrics::with_state_mut(|m| {
                    m.ops.record_rows(kind, rows);
                    m.tables
                        .entry(table.to_string())
                        .or_default()
                        .record_rows(kind, rows);
                });
            }

            MetricsEvent::ConditionalConflict { table } => {
                metrics::with_state_mut(|m| {
                    m.ops.conditional_conflicts = m.ops.conditional_conflicts.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.conditional_conflicts = entry.conditional_conflicts.saturating_add(1);
                });
            }

            MetricsEvent::BatchRetry { table, unprocessed } => {
                metrics::with_state_mut(|m| {
                    m.ops.batch_retries = m.ops.batch_retries.saturating_add(1);
                    m.ops.batch_unprocessed = m.ops.batch_unprocessed.saturating_add(unprocessed);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.batch_retries = entry.batch_retries.saturating_add(1);
                });
            }

            MetricsEvent::SchemaChange { table, changes } => {
                metrics::with_state_mut(|m| {
                    m.ops.schema_changes = m.ops.schema_changes.saturating_add(changes);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.schema_changes = entry.schema_changes.saturating_add(changes);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one operation.
/// Finish accounting happens even on early return or unwind.

pub(crate) struct Span<'a> {
    kind: ExecKind,
    table: &'a str,
    rows: u64,
}

impl<'a> Span<'a> {
    #[must_use]
    pub(crate) fn new(kind: ExecKind, table: &'a str) -> Self {
        record(MetricsEvent::ExecStart { kind, table });

        Self {
            kind,
            table,
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }

    pub(crate) const fn add_rows(&mut self, rows: u64) {
        self.rows = self.rows.saturating_add(rows);
    }
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            table: self.table,
            rows: self.rows,
        });
    }
}
