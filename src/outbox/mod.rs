// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Orders are persisted together with one pending entry per notification
// channel. The dispatcher drains those entries outside the request path,
// retrying and dead-lettering per entry.
//
// ============================================================================

mod dispatcher;
mod entry;

pub use dispatcher::{DispatchError, DispatchReport, DispatcherConfig, OutboxDispatcher};
pub use entry::{NotificationChannel, OutboxEntry, OutboxStatus, OutboxStore};
