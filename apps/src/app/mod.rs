//! Application configuration

pub mod options;
