//! fbr-session
//!
//! Lifecycle of one distribution attempt: `active` -> `completed` | `cancelled`.
//!
//! Rows are created already `active`. Resolution and the suggested initial
//! count are computed beforehand and are not durable until [`DistributionService::start`].
//! Both terminal states are sticky.

mod policy;
mod service;
mod suggest;

pub use policy::SessionPolicy;
pub use service::{CancelOutcome, DistributionService, StaleSession, StartOutcome, StartSession};
pub use suggest::suggest_initial_count;
