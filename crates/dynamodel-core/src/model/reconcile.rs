//! Diff a declared table against its live description and apply the
//! difference as a sequence of single-change table updates.

use crate::{
    Error,
    db::store::{
        BillingMode, IndexDefinition, IndexDescription, IndexUpdate, StreamUpdate,
        TableDescription, UpdateTableRequest,
    },
    model::{index::IndexModel, table::TableModel},
    obs::sink::{MetricsEvent, record},
};
use std::collections::BTreeMap;

///
/// Change
/// One unit of reconciliation work.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Change {
    Billing(BillingMode),
    Stream(Vec<StreamUpdate>),
    DropIndex(String),
    CreateIndex(IndexDefinition),
    ResizeIndex(IndexDefinition),
}

impl Change {
    fn requests(self, table: &TableModel) -> Vec<UpdateTableRequest> {
        let base = || UpdateTableRequest::new(table.name());

        match self {
            Self::Billing(billing) => vec![UpdateTableRequest {
                billing: Some(billing),
                ..base()
            }],
            Self::Stream(updates) => updates
                .into_iter()
                .map(|update| UpdateTableRequest {
                    stream: Some(update),
                    ..base()
                })
                .collect(),
            Self::DropIndex(name) => vec![UpdateTableRequest {
                index_update: Some(IndexUpdate::Delete { name }),
                ..base()
            }],
            Self::CreateIndex(def) => {
                let keys: Vec<&str> = def.key_schema.names().collect();
                let attribute_definitions = table
                    .attribute_definitions()
                    .into_iter()
                    .filter(|a| keys.contains(&a.name.as_str()))
                    .collect();

                vec![UpdateTableRequest {
                    attribute_definitions,
                    index_update: Some(IndexUpdate::Create(def)),
                    ..base()
                }]
            }
            Self::ResizeIndex(def) => def
                .throughput
                .map(|throughput| UpdateTableRequest {
                    index_update: Some(IndexUpdate::Update {
                        name: def.name,
                        throughput,
                    }),
                    ..base()
                })
                .into_iter()
                .collect(),
        }
    }
}

/// Changes needed to turn `live` into the declared table, in apply order.
pub(crate) fn diff(table: &TableModel, live: &TableDescription) -> Result<Vec<Change>, Error> {
    let mut changes = Vec::new();

    // throughput / billing
    let billing = table.billing()?;
    if billing != live.billing {
        changes.push(Change::Billing(billing));
    }

    // stream
    match (live.stream, table.stream()) {
        (None, Some(view)) => changes.push(Change::Stream(vec![StreamUpdate::Enable(view)])),
        (Some(_), None) => changes.push(Change::Stream(vec![StreamUpdate::Disable])),
        (Some(old), Some(new)) if old != new => changes.push(Change::Stream(vec![
            StreamUpdate::Disable,
            StreamUpdate::Enable(new),
        ])),
        _ => {}
    }

    // global indexes
    let declared: BTreeMap<&str, IndexDefinition> = table
        .global_indexes()
        .map(|i| (i.name(), i.definition()))
        .collect();
    let remote: BTreeMap<&str, &IndexDescription> = live
        .global_indexes
        .iter()
        .map(|i| (i.name.as_str(), i))
        .collect();

    for name in remote.keys().filter(|n| !declared.contains_key(*n)) {
        changes.push(Change::DropIndex((*name).to_string()));
    }

    let mut creates = Vec::new();
    for (name, def) in &declared {
        let Some(live_index) = remote.get(name) else {
            creates.push(Change::CreateIndex(def.clone()));
            continue;
        };

        if live_index.key_schema != def.key_schema || live_index.projection != def.projection {
            changes.push(Change::DropIndex((*name).to_string()));
            creates.push(Change::CreateIndex(def.clone()));
        } else if live_index.throughput != def.throughput && def.throughput.is_some() {
            changes.push(Change::ResizeIndex(def.clone()));
        }
    }
    changes.extend(creates);

    // local indexes cannot change after creation
    warn_local_drift(table, live);

    Ok(changes)
}

fn warn_local_drift(table: &TableModel, live: &TableDescription) {
    let declared: Vec<IndexDefinition> =
        table.local_indexes().map(IndexModel::definition).collect();
    let remote: Vec<IndexDefinition> = live
        .local_indexes
        .iter()
        .map(IndexDescription::definition)
        .collect();

    if declared != remote {
        tracing::warn!(
            table = %table.name(),
            declared = declared.len(),
            remote = remote.len(),
            "local secondary indexes differ from the live table and cannot be updated"
        );
    }
}

/// Describe, diff and apply. Returns the number of changes applied.
pub(crate) fn reconcile(table: &TableModel) -> Result<usize, Error> {
    let live = table.describe()?;
    let changes = diff(table, &live)?;

    if changes.is_empty() {
        tracing::debug!(table = %table.name(), "table is up to date");
        return Ok(0);
    }

    let count = changes.len();
    for change in changes {
        tracing::info!(table = %table.name(), ?change, "updating table");

        for request in change.requests(table) {
            table.store().update_table(request)?;
            table.wait_until_active()?;
        }
    }

    record(MetricsEvent::SchemaChange {
        table: table.name(),
        changes: u64::try_from(count).unwrap_or(u64::MAX),
    });

    Ok(count)
}
