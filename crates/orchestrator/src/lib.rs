//! Stage-gated orchestration: rosters, rounds, approvals, and the run
//! loop that moves a project's stage cursor from idea to tested code.

pub mod approval;
pub mod budget;
pub mod deliverable;
pub mod environment;
pub mod error;
pub mod history;
pub mod memory;
pub mod participant;
pub mod project;
pub mod reactions;
pub mod roster;
pub mod team;

pub use approval::{ApprovalGate, ApprovalResponder, AutoApprover};
pub use budget::CostLedger;
pub use deliverable::{deliverable_file, DeliverableStore};
pub use environment::{Environment, RoundOutcome};
pub use error::{OrchestratorError, Result};
pub use memory::Memory;
pub use participant::{Participant, Reaction, ReactionContext};
pub use project::{ProductConfig, ProjectStore, ProjectSummary};
pub use reactions::{ArtifactSource, TemplateSource};
pub use roster::ParticipantFactory;
pub use team::Team;
