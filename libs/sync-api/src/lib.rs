//! Wire models shared with the Hooklift sync service.

pub mod models;

/// Header carrying the sync session identifier on file pushes
pub const SYNC_ID_HEADER: &str = "x-lift-sync-id";

/// Header carrying the prior cache identifier on file pushes
pub const CACHE_ID_HEADER: &str = "x-lift-cache-id";

/// Header carrying the file path, relative to the app root
pub const FILE_PATH_HEADER: &str = "x-lift-file-path";
