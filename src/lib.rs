pub mod campaign;
pub mod clock;
pub mod csv;
pub mod model;
pub mod money;
pub mod policy;

pub use clock::{Clock, FixedClock, SystemClock};
pub use model::{Decision, DisputeReason, JobId, JobStatus, PolicyRequest};
pub use money::Money;
pub use policy::{PolicyEngine, PolicyError};
