//! Lazy, deterministic traversal of an app source tree

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::DeployError;

/// A directory entry waiting to be visited
#[derive(Debug)]
struct Pending {
    path: PathBuf,
    is_dir: bool,
    is_file: bool,
}

/// Walks the regular files under a root directory.
///
/// Entries of each directory are visited in file name order, depth first, so
/// the sequence is stable across runs. Directories are read only when the walk
/// reaches them. Directories themselves are never yielded: the server rebuilds
/// them from each file's relative path.
///
/// The root must be a directory: a missing root or a root that is a regular
/// file fails the walk on the first call to [`SourceWalker::next`]. The walker
/// stops at the first I/O error and cannot be restarted.
#[derive(Debug)]
pub struct SourceWalker {
    root: PathBuf,
    started: bool,
    finished: bool,
    stack: Vec<std::vec::IntoIter<Pending>>,
}

impl SourceWalker {
    /// Create a walker over `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            started: false,
            finished: false,
            stack: Vec::new(),
        }
    }

    /// Root of the walk
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next regular file, `None` once the tree is exhausted or the walk failed
    pub async fn next(&mut self) -> Option<Result<PathBuf, DeployError>> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;
            let root = self.root.clone();
            if let Err(e) = self.descend(&root).await {
                return Some(Err(self.fail(e)));
            }
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                self.finished = true;
                return None;
            };

            let Some(entry) = frame.next() else {
                self.stack.pop();
                continue;
            };

            if entry.is_dir {
                if let Err(e) = self.descend(&entry.path).await {
                    return Some(Err(self.fail(e)));
                }
            } else if entry.is_file {
                return Some(Ok(entry.path));
            } else {
                debug!("Skipping non-regular file: {}", entry.path.display());
            }
        }
    }

    /// Drain the remaining files into a vector
    pub async fn collect(mut self) -> Result<Vec<PathBuf>, DeployError> {
        let mut files = Vec::new();
        while let Some(next) = self.next().await {
            files.push(next?);
        }
        Ok(files)
    }

    async fn descend(&mut self, dir: &Path) -> Result<(), DeployError> {
        let walk_err = |source| DeployError::Walk {
            path: dir.to_path_buf(),
            source,
        };

        let mut read_dir = fs::read_dir(dir).await.map_err(walk_err)?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await.map_err(walk_err)? {
            let file_type = entry.file_type().await.map_err(|source| DeployError::Walk {
                path: entry.path(),
                source,
            })?;
            entries.push((
                entry.file_name(),
                Pending {
                    path: entry.path(),
                    is_dir: file_type.is_dir(),
                    is_file: file_type.is_file(),
                },
            ));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.stack.push(
            entries
                .into_iter()
                .map(|(_, pending)| pending)
                .collect::<Vec<_>>()
                .into_iter(),
        );
        Ok(())
    }

    fn fail(&mut self, err: DeployError) -> DeployError {
        self.finished = true;
        self.stack.clear();
        err
    }
}

/// Path of `path` relative to `root`, `/` separated
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
