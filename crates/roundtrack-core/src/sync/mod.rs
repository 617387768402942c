//! Offline-first synchronization with the remote backend.
//!
//! Local writes are queued in a durable [`SyncOutbox`] and pushed in
//! order by [`SyncOutbox::drain`]; [`reconcile`] pulls remote blocks the
//! device has not seen yet.

pub mod outbox;
pub mod reconcile;
pub mod remote;
pub mod types;

pub use outbox::SyncOutbox;
pub use reconcile::{reconcile, ReconcileReport, SkippedBlock};
pub use remote::{HttpRemote, RemoteService};
pub use types::{
    DeadLetter, DrainReport, DrainStop, RetryPolicy, SyncError, SyncOperation, SyncQueueItem,
    SyncStatus,
};
