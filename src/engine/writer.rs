use crate::error::{BridgeError, Result};
use crate::identifier::HouseId;
use crate::model::ConfigDocument;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Persists a [`ConfigDocument`] as `<config_dir>/<id>.json`.
pub struct ConfigWriter {
    dir: PathBuf,
}

impl ConfigWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: &HouseId) -> PathBuf {
        self.dir.join(id.config_file_name())
    }

    /// Write `doc` under the identifier `id` and return the file path.
    ///
    /// The caller passes the id it derived so the same value names every file
    /// of the run.
    pub async fn write(&self, id: &HouseId, doc: &ConfigDocument) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BridgeError::io(&self.dir, e))?;

        let path = self.path_for(id);
        let body = to_pretty_json(doc, &path)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| BridgeError::io(&path, e))?;
        tracing::info!(path = %path.display(), "config file saved");
        Ok(path)
    }
}

/// Four-space indented JSON, the layout the simulator's tooling expects.
fn to_pretty_json(doc: &ConfigDocument, path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    doc.serialize(&mut ser).map_err(|e| {
        BridgeError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    Ok(buf)
}
