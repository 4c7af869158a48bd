//! Source-navigation seam: goto-definition and find-references over a
//! workspace, plus the retry and memo layers wrapped around any backend.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::core::range::{Position, Range};
use crate::infra::config::NavigatorConfig;

/// A place in the workspace a navigator points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location
{
    pub path: PathBuf,
    pub range: Range,
    /// Source text of `range`; present for definitions
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NavigatorError
{
    #[error("navigator timed out")]
    Timeout,

    #[error("navigator unavailable: {0}")]
    Unavailable(String),

    #[error("navigator I/O failure")]
    Io(#[from] std::io::Error),
}

impl NavigatorError
{
    /// Worth retrying
    pub fn is_transient(&self) -> bool
    {
        matches!(self, NavigatorError::Timeout | NavigatorError::Unavailable(_))
    }
}

/// Answers for one workspace session. A miss is `Ok(None)`, never an error.
pub trait Navigator
{
    fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Location>, NavigatorError>;

    fn find_references(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Vec<Location>>, NavigatorError>;

    /// Announce a file before the first query against it.
    fn open_file(
        &self,
        _path: &Path,
    ) -> Result<(), NavigatorError>
    {
        Ok(())
    }
}

impl<N: Navigator + ?Sized> Navigator for &N
{
    fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Location>, NavigatorError>
    {
        (**self).goto_definition(path, position)
    }

    fn find_references(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Vec<Location>>, NavigatorError>
    {
        (**self).find_references(path, position)
    }

    fn open_file(
        &self,
        path: &Path,
    ) -> Result<(), NavigatorError>
    {
        (**self).open_file(path)
    }
}

/// Retries transient failures with linear backoff.
///
/// Gives up after `max_retries` extra attempts, or once `timeout` has
/// elapsed since the first attempt, returning the last error.
pub struct RetryingNavigator<N>
{
    inner: N,
    max_retries: u32,
    backoff: Duration,
    timeout: Duration,
}

impl<N: Navigator> RetryingNavigator<N>
{
    pub fn new(
        inner: N,
        cfg: &NavigatorConfig,
    ) -> Self
    {
        Self {
            inner,
            max_retries: cfg.max_retries,
            backoff: Duration::from_millis(cfg.backoff_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }

    fn attempt<T>(
        &self,
        op: &str,
        mut call: impl FnMut(&N) -> Result<T, NavigatorError>,
    ) -> Result<T, NavigatorError>
    {
        let started = Instant::now();
        let mut tries = 0u32;
        loop
        {
            match call(&self.inner)
            {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && tries < self.max_retries && started.elapsed() < self.timeout =>
                {
                    tries += 1;
                    tracing::debug!(op, attempt = tries, error = %e, "retrying navigator call");
                    thread::sleep(self.backoff * tries);
                }
                Err(e) =>
                {
                    tracing::warn!(op, attempts = tries + 1, error = %e, "navigator call failed");
                    return Err(e);
                }
            }
        }
    }
}

impl<N: Navigator> Navigator for RetryingNavigator<N>
{
    fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Location>, NavigatorError>
    {
        self.attempt("goto_definition", |n| n.goto_definition(path, position))
    }

    fn find_references(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Vec<Location>>, NavigatorError>
    {
        self.attempt("find_references", |n| n.find_references(path, position))
    }

    fn open_file(
        &self,
        path: &Path,
    ) -> Result<(), NavigatorError>
    {
        self.attempt("open_file", |n| n.open_file(path))
    }
}

type Key = (PathBuf, Position);

/// Bounded memo of answers, misses included. Errors are never cached.
pub struct CachedNavigator<N>
{
    inner: N,
    definitions: Cache<Key, Option<Location>>,
    references: Cache<Key, Option<Vec<Location>>>,
}

impl<N: Navigator> CachedNavigator<N>
{
    pub fn new(
        inner: N,
        capacity: u64,
    ) -> Self
    {
        Self { inner, definitions: Cache::new(capacity), references: Cache::new(capacity) }
    }

    /// Drop every memoised answer, e.g. after a file changed on disk
    pub fn invalidate(&self)
    {
        self.definitions.invalidate_all();
        self.references.invalidate_all();
    }
}

impl<N: Navigator> Navigator for CachedNavigator<N>
{
    fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Location>, NavigatorError>
    {
        let key = (path.to_path_buf(), position);
        if let Some(hit) = self.definitions.get(&key)
        {
            return Ok(hit);
        }
        let answer = self.inner.goto_definition(path, position)?;
        self.definitions.insert(key, answer.clone());
        Ok(answer)
    }

    fn find_references(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Vec<Location>>, NavigatorError>
    {
        let key = (path.to_path_buf(), position);
        if let Some(hit) = self.references.get(&key)
        {
            return Ok(hit);
        }
        let answer = self.inner.find_references(path, position)?;
        self.references.insert(key, answer.clone());
        Ok(answer)
    }

    fn open_file(
        &self,
        path: &Path,
    ) -> Result<(), NavigatorError>
    {
        self.inner.open_file(path)
    }
}
