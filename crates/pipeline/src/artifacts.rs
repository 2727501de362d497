//! Transient audio artifacts
//!
//! Captures and synthesized replies pass through short-lived files.
//! Every artifact is tracked from creation until it is consumed and
//! deleted, or reaped by the periodic age sweep. The store owns a
//! temporary directory, so nothing survives process shutdown.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// What produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOwner {
    /// Finalized speaker capture
    Capture,
    /// Synthesized reply audio
    Synthesis,
}

impl std::fmt::Display for ArtifactOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactOwner::Capture => write!(f, "capture"),
            ArtifactOwner::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// A tracked transient file.
#[derive(Debug, Clone)]
pub struct TempArtifact {
    pub id: Uuid,
    pub path: PathBuf,
    pub owner: ArtifactOwner,
    pub created_at: Instant,
}

/// Store of transient audio files.
pub struct TempArtifactStore {
    root: TempDir,
    live: Mutex<HashMap<Uuid, TempArtifact>>,
}

impl TempArtifactStore {
    pub fn new() -> std::io::Result<Self> {
        let root = tempfile::Builder::new().prefix("voice-relay-").tempdir()?;
        tracing::debug!(dir = %root.path().display(), "artifact store ready");
        Ok(Self {
            root,
            live: Mutex::new(HashMap::new()),
        })
    }

    /// Write bytes to a fresh tracked artifact.
    pub fn create(
        &self,
        owner: ArtifactOwner,
        extension: &str,
        bytes: &[u8],
    ) -> std::io::Result<TempArtifact> {
        let id = Uuid::new_v4();
        let path = self.root.path().join(format!("{id}.{extension}"));
        std::fs::write(&path, bytes)?;

        let artifact = TempArtifact {
            id,
            path,
            owner,
            created_at: Instant::now(),
        };
        tracing::debug!(
            id = %artifact.id,
            owner = %artifact.owner,
            bytes = bytes.len(),
            "artifact created"
        );
        self.live.lock().insert(id, artifact.clone());
        Ok(artifact)
    }

    /// Delete an artifact. Best effort: failures are logged, never
    /// escalated.
    pub fn remove(&self, artifact: &TempArtifact) {
        self.live.lock().remove(&artifact.id);
        if let Err(e) = std::fs::remove_file(&artifact.path) {
            tracing::warn!(
                path = %artifact.path.display(),
                error = %e,
                "failed to delete artifact"
            );
        }
    }

    /// Delete tracked artifacts older than `max_age`. Returns how many
    /// were reaped.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<TempArtifact> = {
            let live = self.live.lock();
            live.values()
                .filter(|a| now.duration_since(a.created_at) >= max_age)
                .cloned()
                .collect()
        };

        for artifact in &stale {
            tracing::debug!(id = %artifact.id, owner = %artifact.owner, "sweeping stale artifact");
            self.remove(artifact);
        }
        stale.len()
    }

    /// Currently tracked artifact count.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Store root directory (for logging/diagnostics).
    pub fn dir(&self) -> &std::path::Path {
        self.root.path()
    }
}
