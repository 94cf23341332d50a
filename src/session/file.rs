//! Snapshot persistence on the local filesystem.

use std::path::{Path, PathBuf};

use super::{SessionError, SessionResult, Snapshot};

/// Stores one `<session_id>.json` file per session under a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> SessionResult<PathBuf> {
        if session_id.is_empty()
            || session_id.contains(['/', '\\'])
            || session_id == "."
            || session_id == ".."
        {
            return Err(SessionError::Storage {
                message: format!("invalid session id: {:?}", session_id),
            });
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    pub async fn save(&self, session_id: &str, snapshot: &Snapshot) -> SessionResult<()> {
        let path = self.path_for(session_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let data = snapshot.to_opaque()?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(session_id, path = %path.display(), "Snapshot saved");
        Ok(())
    }

    pub async fn load(&self, session_id: &str) -> SessionResult<Option<Snapshot>> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Snapshot::from_opaque(&data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, session_id: &str) -> SessionResult<bool> {
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
