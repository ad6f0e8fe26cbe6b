//! Core domain model for stagegate: stages, capabilities, participants,
//! messages, and the static tables that wire them together.

pub mod error;
pub mod tables;

mod domain;

pub use domain::capability::CapabilityKind;
pub use domain::message::{DecodedArtifact, Message, Payload};
pub use domain::profile::Profile;
pub use domain::stage::Stage;
pub use domain::status::RunStatus;
pub use error::CoreError;
