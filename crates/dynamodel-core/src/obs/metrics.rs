use crate::obs::sink::ExecKind;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for persistence and admin operations.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub tables: BTreeMap<String, TableCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            tables: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Entrypoints
    pub get_calls: u64,
    pub put_calls: u64,
    pub update_calls: u64,
    pub delete_calls: u64,
    pub query_calls: u64,
    pub scan_calls: u64,
    pub batch_calls: u64,
    pub admin_calls: u64,

    // Rows touched
    pub rows_loaded: u64,
    pub rows_written: u64,
    pub rows_deleted: u64,

    // Conflicts and retries
    pub conditional_conflicts: u64,
    pub batch_retries: u64,
    pub batch_unprocessed: u64,

    // Table administration
    pub schema_changes: u64,
}

impl EventOps {
    pub(crate) const fn record_call(&mut self, kind: ExecKind) {
        let slot = match kind {
            ExecKind::Get => &mut self.get_calls,
            ExecKind::Put => &mut self.put_calls,
            ExecKind::Update => &mut self.update_calls,
            ExecKind::Delete => &mut self.delete_calls,
            ExecKind::Query => &mut self.query_calls,
            ExecKind::Scan => &mut self.scan_calls,
            ExecKind::BatchWrite => &mut self.batch_calls,
            ExecKind::Admin => &mut self.admin_calls,
        };
        *slot = slot.saturating_add(1);
    }

    pub(crate) const fn record_rows(&mut self, kind: ExecKind, rows: u64) {
        let slot = match kind {
            ExecKind::Get | ExecKind::Query | ExecKind::Scan => &mut self.rows_loaded,
            ExecKind::Put | ExecKind::Update | ExecKind::BatchWrite => &mut self.rows_written,
            ExecKind::Delete => &mut self.rows_deleted,
            ExecKind::Admin => return,
        };
        *slot = slot.saturating_add(rows);
    }
}

///
/// TableCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableCounters {
    pub reads: u64,
    pub writes: u64,
    pub admin_calls: u64,
    pub rows_loaded: u64,
    pub rows_written: u64,
    pub conditional_conflicts: u64,
    pub batch_retries: u64,
    pub schema_changes: u64,
}

impl TableCounters {
    pub(crate) const fn record_call(&mut self, kind: ExecKind) {
        let slot = match kind {
            ExecKind::Get | ExecKind::Query | ExecKind::Scan => &mut self.reads,
            ExecKind::Put | ExecKind::Update | ExecKind::Delete | ExecKind::BatchWrite => {
                &mut self.writes
            }
            ExecKind::Admin => &mut self.admin_calls,
        };
        *slot = slot.saturating_add(1);
    }

    pub(crate) const fn record_rows(&mut self, kind: ExecKind, rows: u64) {
        let slot = match kind {
            ExecKind::Get | ExecKind::Query | ExecKind::Scan => &mut self.rows_loaded,
            ExecKind::Put | ExecKind::Update | ExecKind::Delete | ExecKind::BatchWrite => {
                &mut self.rows_written
            }
            ExecKind::Admin => return,
        };
        *slot = slot.saturating_add(rows);
    }
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub(crate) fn reset() {
    with_state_mut(|m| *m = EventState::default());
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    pub counters: Option<EventState>,
    pub table_counters: Vec<TableSummary>,
}

///
/// TableSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub reads: u64,
    pub writes: u64,
    pub rows_loaded: u64,
    pub avg_rows_per_read: f64,
    pub conditional_conflicts: u64,
    pub schema_changes: u64,
}

/// Build a metrics report from in-memory counters.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub(crate) fn report() -> EventReport {
    let snap = with_state(Clone::clone);

    let mut table_counters: Vec<TableSummary> = snap
        .tables
        .iter()
        .map(|(table, c)| TableSummary {
            table: table.clone(),
            reads: c.reads,
            writes: c.writes,
            rows_loaded: c.rows_loaded,
            avg_rows_per_read: if c.reads > 0 {
                c.rows_loaded as f64 / c.reads as f64
            } else {
                0.0
            },
            conditional_conflicts: c.conditional_conflicts,
            schema_changes: c.schema_changes,
        })
        .collect();

    table_counters.sort_by(|a, b| {
        b.rows_loaded
            .cmp(&a.rows_loaded)
            .then_with(|| a.table.cmp(&b.table))
    });

    EventReport {
        counters: Some(snap),
        table_counters,
    }
}
