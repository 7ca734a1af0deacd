//! Deployment module

pub mod orchestrator;
pub mod stream;

pub use orchestrator::{deploy, DeployReport};
