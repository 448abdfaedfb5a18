//! End-to-end price synchronization: identity resolution, authoritative and
//! fallback pricing, persistence and run reporting.

pub mod cancel;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod store;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use error::SyncError;
pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use report::{ItemOutcome, ItemStatus, SyncReport};
pub use resolver::{
    CorrectionOutcome, IdentityResolver, MappingCheck, PendingCorrection, Resolution,
};
pub use store::{PgSyncStore, SyncStore};
