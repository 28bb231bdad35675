use crate::{
    Error, MAX_BATCH_WRITE_ITEMS,
    db::store::{BatchWriteRequest, StoreError, WriteRequest},
    model::Model,
    obs::sink::{ExecKind, MetricsEvent, Span, record},
};
use std::thread;

/// Write `requests` in chunks of the batch limit, retrying unprocessed
/// requests with backoff until the configured attempts run out.
pub(crate) fn write_batch(model: &Model, requests: Vec<WriteRequest>) -> Result<usize, Error> {
    let table = model.table();
    let config = model.batch_config();
    let total = requests.len();

    for chunk in requests.chunks(MAX_BATCH_WRITE_ITEMS) {
        let mut span = Span::new(ExecKind::BatchWrite, table.name());
        let mut pending = chunk.to_vec();
        let mut attempt = 1;

        loop {
            let sent = pending.len();
            let output = table.store().batch_write_item(BatchWriteRequest {
                table_name: table.name().to_string(),
                requests: pending,
            })?;

            let unprocessed = output.unprocessed.len();
            let written = sent.saturating_sub(unprocessed);
            span.add_rows(u64::try_from(written).unwrap_or(u64::MAX));

            if unprocessed == 0 {
                break;
            }

            if attempt >= config.max_attempts {
                return Err(StoreError::UnprocessedItems {
                    table: table.name().to_string(),
                    count: unprocessed,
                }
                .into());
            }

            record(MetricsEvent::BatchRetry {
                table: table.name(),
                unprocessed: u64::try_from(unprocessed).unwrap_or(u64::MAX),
            });
            tracing::warn!(
                table = %table.name(),
                unprocessed,
                attempt,
                "retrying unprocessed batch writes"
            );

            thread::sleep(config.delay_for(attempt));
            attempt += 1;
            pending = output.unprocessed;
        }
    }

    Ok(total)
}
