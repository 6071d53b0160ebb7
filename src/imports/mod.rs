//! Module Import Fallback Manager
//!
//! Resolves named capabilities to module handles through an ordered list of
//! candidate loaders. The first loader that succeeds wins and its handle is
//! memoized; failures along the way are kept as data on the capability's
//! [`ImportStatus`] so callers can see how a module was obtained.
//!
//! # Resolution Flow
//!
//! ```text
//! NotAttempted
//!     ↓ resolve()
//! loader[0] → ok ─────────────────────────→ Succeeded
//!     ↓ err
//! loader[1] → ok ─────────────────────────→ FailedFallback (usable)
//!     ↓ err
//! ...
//!     ↓ err
//! FailedAll  (AllFallbacksExhausted returned to the caller)
//! ```

mod handle;
mod manager;
mod status;

pub use handle::{LoaderEntry, LoaderFn, ModuleHandle};
pub use manager::ImportManager;
pub(crate) use manager::panic_message;
pub use status::{
    CapabilityReport, FailureKind, ImportOutcome, ImportStatus, LoaderFailure, ResolveAllReport,
};
