//! Hooklift apps client library
//!
//! Syncs an app's source tree to the Hooklift sync service, deploys it, and
//! streams the build output back.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod storage;
pub mod sync;
pub mod utils;
