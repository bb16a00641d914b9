use crate::decoder::Status;
use crate::schema::RepeatValue;

/// Hook into the decoder's progress.
///
/// Every method has an empty default, so implementors pick the events
/// they care about. Each decoder owns its observer; there is no global
/// switch.
pub trait DecodeObserver {
    /// A schema became the active one. `depth` is 1 for the bottom of
    /// the stack.
    fn schema_activated(&mut self, _schema: &str, _depth: usize) {}

    /// A field decoded `size` bytes starting at stream offset `offset`.
    fn field_decoded(&mut self, _schema: &str, _field: &str, _offset: usize, _size: usize) {}

    /// The active field needs `needed` bytes but only `available` are
    /// buffered past the offset.
    fn field_waiting(&mut self, _schema: &str, _field: &str, _needed: usize, _available: usize) {}

    /// A schema drained its queue and its completion hook is about to run.
    fn schema_finished(&mut self, _schema: &str, _repeat: RepeatValue, _depth: usize) {}

    /// Decoding stopped early: end of input, truncation or abort.
    fn terminated(&mut self, _status: &Status) {}
}

/// Observer that ignores everything. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {}

/// Observer that forwards events to `tracing`.
///
/// Progress goes out at `trace`/`debug`; truncated input at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn schema_activated(&mut self, schema: &str, depth: usize) {
        tracing::debug!(schema, depth, "schema activated");
    }

    fn field_decoded(&mut self, schema: &str, field: &str, offset: usize, size: usize) {
        tracing::trace!(schema, field, offset, size, "field decoded");
    }

    fn field_waiting(&mut self, schema: &str, field: &str, needed: usize, available: usize) {
        tracing::trace!(schema, field, needed, available, "waiting for bytes");
    }

    fn schema_finished(&mut self, schema: &str, repeat: RepeatValue, depth: usize) {
        tracing::debug!(schema, ?repeat, depth, "schema finished");
    }

    fn terminated(&mut self, status: &Status) {
        match status {
            Status::Truncated {
                schema,
                field,
                missing,
            } => tracing::warn!(%schema, %field, missing, "input ended mid-field"),
            other => tracing::debug!(status = ?other, "decoding stopped"),
        }
    }
}
