//! Writing responses into the producer's inbound directory.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

use crate::message::AgentResponse;

/// Writes responses as `<uuid>.json` files into one directory.
///
/// Each response is staged under a hidden temporary name in the same
/// directory and linked into place once flushed, so a producer watching
/// for `*.json` never sees a half-written file. Publishing never replaces
/// an existing file.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    dir: Utf8PathBuf,
}

impl ResponseWriter {
    /// Creates a writer targeting `dir` (usually `<root>/Input`).
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Serializes `response` and publishes it under a fresh unique name.
    ///
    /// Returns the published path.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created or the file
    /// cannot be written; no partial file is left behind.
    pub fn write(&self, response: &AgentResponse) -> io::Result<Utf8PathBuf> {
        let payload = serde_json::to_vec_pretty(response).map_err(io::Error::other)?;
        std::fs::create_dir_all(&self.dir)?;

        let id = Uuid::new_v4();
        let staging = self.dir.join(format!(".{id}.json.tmp"));
        if let Err(e) = stage(&staging, &payload) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }

        let candidates = std::iter::once(id)
            .chain(std::iter::repeat_with(Uuid::new_v4))
            .map(|id| self.dir.join(format!("{id}.json")));
        let published = publish(&staging, candidates);
        let _ = std::fs::remove_file(&staging);
        let published = published?;

        tracing::info!(
            path = %published,
            message_type = response.message_type(),
            "Response written"
        );
        Ok(published)
    }
}

/// Links `staging` under the first candidate name that does not exist yet.
///
/// `hard_link` fails with `AlreadyExists` instead of replacing the target,
/// unlike `rename` on Unix.
fn publish(
    staging: &Utf8Path,
    candidates: impl IntoIterator<Item = Utf8PathBuf>,
) -> io::Result<Utf8PathBuf> {
    for candidate in candidates {
        match std::fs::hard_link(staging, &candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free response name",
    ))
}

fn stage(path: &Utf8Path, payload: &[u8]) -> io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(payload)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::message::{AgentResponse, ProjectStatusChanged};

    fn response() -> AgentResponse {
        AgentResponse::ChangeProjectStatusMessage(ProjectStatusChanged {
            project_id: Uuid::new_v4(),
            project_state: "Producing".into(),
        })
    }

    #[test]
    fn test_writes_unique_json_files() {
        let dir = TempDir::new().unwrap();
        let input = Utf8PathBuf::from_path_buf(dir.path().join("Input")).unwrap();
        let writer = ResponseWriter::new(&input);

        let first = writer.write(&response()).unwrap();
        let second = writer.write(&response()).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.extension(), Some("json"));
        let names: Vec<_> = std::fs::read_dir(&input).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 2, "staging files must not be left behind");

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(first).unwrap()).unwrap();
        assert_eq!(value["messageType"], "ChangeProjectStatusMessage");
        assert_eq!(value["projectState"], "Producing");
    }

    #[test]
    fn test_publish_never_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let taken = root.join("taken.json");
        let free = root.join("free.json");
        let staging = root.join(".staged.json.tmp");
        std::fs::write(&taken, "existing").unwrap();
        std::fs::write(&staging, "fresh").unwrap();

        let published = publish(&staging, [taken.clone(), free.clone()]).unwrap();

        assert_eq!(published, free);
        assert_eq!(std::fs::read_to_string(&taken).unwrap(), "existing");
        assert_eq!(std::fs::read_to_string(&free).unwrap(), "fresh");
    }

    #[test]
    fn test_publish_reports_exhausted_candidates() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let taken = root.join("taken.json");
        let staging = root.join(".staged.json.tmp");
        std::fs::write(&taken, "existing").unwrap();
        std::fs::write(&staging, "fresh").unwrap();

        let err = publish(&staging, [taken.clone()]).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&taken).unwrap(), "existing");
    }
}
