pub mod approvals;
pub mod deliverables;
pub mod health;
pub mod projects;
pub mod runs;
pub mod sse;

pub use health::{health_check, HealthResponse};
