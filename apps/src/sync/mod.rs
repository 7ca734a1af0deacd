//! Source synchronization with the sync service

pub mod client;
pub mod http;
pub mod session;
pub mod uploader;
