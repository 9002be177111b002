//! Files served from the document root, plus the one writable target.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ServerError;
use crate::response::{Response, Status};

/// The only path a plain `POST` may target.
pub const APPEND_TARGET: &str = "test.txt";

const FORBIDDEN_PAGE: &str = "forbidden.html";
const NOT_FOUND_PAGE: &str = "notFound.html";

pub struct StaticFiles {
    root: PathBuf,
    denylist: FxHashSet<String>,
    /// Where each denylist entry lives on disk. A served file at or below
    /// one of these is refused whatever spelling the request used.
    denied_locations: Vec<PathBuf>,
}

impl StaticFiles {
    /// Denylist entries are root-relative names or absolute paths.
    pub fn new(root: impl Into<PathBuf>, denylist: FxHashSet<String>) -> Self {
        let root = root.into();
        let denied_locations = denylist
            .iter()
            .filter_map(|entry| location(&root.join(entry)))
            .collect();
        Self {
            root,
            denylist,
            denied_locations,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects denylisted names and paths that literally start with `../`.
    ///
    /// Deliberately a prefix test only: `a/../../x` is not caught here.
    pub fn check(&self, path: &str) -> Result<(), ServerError> {
        if self.denylist.contains(path) || path.starts_with("../") {
            return Err(ServerError::Forbidden);
        }
        Ok(())
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, ServerError> {
        self.check(path)?;
        let not_found = |e: std::io::Error| {
            debug!(path, error = %e, "static read failed");
            ServerError::NotFound
        };
        let target = fs::canonicalize(self.resolve(path)).await.map_err(not_found)?;
        if self.is_denied_location(&target) {
            debug!(path, "denylisted location");
            return Err(ServerError::Forbidden);
        }
        fs::read(&target).await.map_err(not_found)
    }

    fn is_denied_location(&self, canonical: &Path) -> bool {
        self.denied_locations
            .iter()
            .any(|denied| canonical.starts_with(denied))
    }

    pub async fn serve(&self, path: &str) -> Response {
        match self.read(path).await {
            Ok(bytes) => Response::html(Status::Ok, bytes),
            Err(err) => self.error_page(&err).await,
        }
    }

    pub fn check_append(&self, path: &str) -> Result<(), ServerError> {
        if path == APPEND_TARGET {
            Ok(())
        } else {
            Err(ServerError::Forbidden)
        }
    }

    /// Appends `text` to [`APPEND_TARGET`] and returns the whole file.
    pub async fn append(&self, path: &str, text: &str) -> Result<Vec<u8>, ServerError> {
        self.check_append(path)?;
        let target = self.resolve(path);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        Ok(fs::read(&target).await?)
    }

    /// HTML response for a failed static request. Uses `forbidden.html` or
    /// `notFound.html` from the root when present.
    pub async fn error_page(&self, err: &ServerError) -> Response {
        let Some(status) = err.status() else {
            return Response::empty(Status::InternalServerError);
        };
        let (page, fallback): (&str, &[u8]) = match status {
            Status::Forbidden => (FORBIDDEN_PAGE, b"<h1>403 Forbidden</h1>"),
            Status::NotFound => (NOT_FOUND_PAGE, b"<h1>404 Not Found</h1>"),
            _ => return Response::empty(status),
        };
        let body = fs::read(self.root.join(page))
            .await
            .unwrap_or_else(|_| fallback.to_vec());
        Response::html(status, body)
    }

    // Extra leading slashes would make `join` discard the root.
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

/// Canonical form of `path`. Files that do not exist yet resolve through
/// their parent directory.
fn location(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Some(canonical);
    }
    let parent = std::fs::canonicalize(path.parent()?).ok()?;
    Some(parent.join(path.file_name()?))
}
