//! Open upload sessions, keyed by file name
//!
//! A session lives from `open` (begin) to `close` (end) or `abandon`. The map
//! itself sits behind a short-lived std mutex that is never held across I/O;
//! each session has its own async mutex so appends to different files proceed
//! in parallel while appends to one file stay sequential.
//!
//! A single-shot upload takes a `Reservation` instead of a session, so the
//! name stays claimed for the whole write and no session can open on it.
//!
//! There are no chunk sequence numbers: chunks land in the order the `append`
//! calls acquire the session, and a re-sent chunk is written twice.

use crate::common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

struct Session {
    path: PathBuf,
    /// `None` once the session has been closed or its file failed to open.
    file: Option<File>,
    bytes_written: u64,
    chunks: u64,
    last_activity: Instant,
}

impl Session {
    fn summary(&self) -> SessionSummary {
        SessionSummary {
            path: self.path.clone(),
            bytes_written: self.bytes_written,
            chunks: self.chunks,
        }
    }
}

type SessionHandle = Arc<AsyncMutex<Session>>;

enum Slot {
    Session(SessionHandle),
    Reserved,
}

/// What a session amounted to when it was closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub chunks: u64,
}

#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, Slot>>,
}

/// Claim on a name held by a single-shot upload. Released on drop.
pub struct Reservation<'a> {
    table: &'a SessionTable,
    name: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut sessions = self.table.sessions();
        if matches!(sessions.get(&self.name), Some(Slot::Reserved)) {
            sessions.remove(&self.name);
        }
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, name: &str) -> Result<SessionHandle> {
        match self.sessions().get(name) {
            Some(Slot::Session(handle)) => Ok(handle.clone()),
            _ => Err(Error::SessionNotFound(name.to_string())),
        }
    }

    /// Remove and return the session for `name`. A reservation is left alone.
    fn take(&self, name: &str) -> Result<SessionHandle> {
        let mut sessions = self.sessions();
        let handle = match sessions.get(name) {
            Some(Slot::Session(handle)) => handle.clone(),
            _ => return Err(Error::SessionNotFound(name.to_string())),
        };
        sessions.remove(name);
        Ok(handle)
    }

    /// Claim `name` for a write that bypasses sessions. Fails while a session
    /// or another reservation holds it.
    pub fn reserve(&self, name: &str) -> Result<Reservation<'_>> {
        let mut sessions = self.sessions();
        if sessions.contains_key(name) {
            return Err(Error::SessionAlreadyOpen(name.to_string()));
        }
        sessions.insert(name.to_string(), Slot::Reserved);
        Ok(Reservation {
            table: self,
            name: name.to_string(),
        })
    }

    /// Start a session for `name`, creating (or truncating) `path`.
    ///
    /// The name is reserved before the file is touched, so a second `open`
    /// for a name that is already in flight fails without truncating the
    /// first session's file.
    pub async fn open(&self, name: &str, path: &Path) -> Result<()> {
        let handle: SessionHandle = Arc::new(AsyncMutex::new(Session {
            path: path.to_path_buf(),
            file: None,
            bytes_written: 0,
            chunks: 0,
            last_activity: Instant::now(),
        }));
        // Appends racing the file creation queue up behind this guard.
        let mut session = handle.clone().lock_owned().await;

        {
            let mut sessions = self.sessions();
            if sessions.contains_key(name) {
                return Err(Error::SessionAlreadyOpen(name.to_string()));
            }
            sessions.insert(name.to_string(), Slot::Session(handle));
        }

        match File::create(path).await {
            Ok(file) => {
                session.file = Some(file);
                Ok(())
            }
            Err(source) => {
                self.sessions().remove(name);
                Err(Error::Create {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Append `chunk` at the session's cursor. Returns the bytes written so far.
    pub async fn append(&self, name: &str, chunk: &[u8]) -> Result<u64> {
        let handle = self.handle(name)?;
        let mut guard = handle.lock().await;
        let session = &mut *guard;

        let file = session
            .file
            .as_mut()
            .ok_or_else(|| Error::SessionNotFound(name.to_string()))?;

        file.write_all(chunk).await.map_err(|source| Error::Write {
            path: session.path.clone(),
            source,
        })?;

        session.bytes_written += chunk.len() as u64;
        session.chunks += 1;
        session.last_activity = Instant::now();
        Ok(session.bytes_written)
    }

    /// Flush and sync the file, then drop the session. `name` can be opened
    /// again afterwards.
    pub async fn close(&self, name: &str) -> Result<SessionSummary> {
        let handle = self.take(name)?;

        let mut session = handle.lock().await;
        let mut file = session
            .file
            .take()
            .ok_or_else(|| Error::SessionNotFound(name.to_string()))?;

        let synced = async {
            file.flush().await?;
            file.sync_all().await
        };
        synced.await.map_err(|source| Error::Write {
            path: session.path.clone(),
            source,
        })?;

        Ok(session.summary())
    }

    /// Drop a session without completing it. Whatever was written stays on disk.
    pub async fn abandon(&self, name: &str) -> Result<SessionSummary> {
        let handle = self.take(name)?;

        Ok(release(&handle).await)
    }

    /// Abandon every session idle for at least `max_idle`. Sessions in the
    /// middle of a write are skipped.
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<(String, SessionSummary)> {
        let mut stale = Vec::new();
        self.sessions().retain(|name, slot| {
            let handle = match slot {
                Slot::Session(handle) => handle,
                Slot::Reserved => return true,
            };
            let idle = handle
                .try_lock()
                .map(|session| session.last_activity.elapsed() >= max_idle)
                .unwrap_or(false);
            if idle {
                stale.push((name.clone(), handle.clone()));
            }
            !idle
        });

        let mut reaped = Vec::with_capacity(stale.len());
        for (name, handle) in stale {
            reaped.push((name, release(&handle).await));
        }
        reaped
    }

    /// Whether a session or reservation holds `name`
    pub fn contains(&self, name: &str) -> bool {
        self.sessions().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

async fn release(handle: &SessionHandle) -> SessionSummary {
    let mut session = handle.lock().await;
    if let Some(mut file) = session.file.take() {
        if let Err(e) = file.flush().await {
            tracing::warn!("Flush of abandoned {} failed: {}", session.path.display(), e);
        }
    }
    session.summary()
}
