//! Gatehouse core: request context, tenant identity, error codes, and clocks
//! shared by the admin API pipeline and its collaborators.

pub mod clock;
pub mod context;
pub mod error;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use context::RequestContext;
pub use error::{ErrorBody, ErrorCode};
pub use types::{Payload, ResourceKind, TenantIdentity, UnknownResourceKind};

