//! Local storage: deploy metadata and client settings

pub mod layout;
pub mod metadata;
pub mod settings;
