pub mod capability;
pub mod message;
pub mod profile;
pub mod stage;
pub mod status;
