// ── Whole-file JSON persistence ──

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CoreError;

/// Write `value` next to `path` and rename over it.
pub(crate) async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let buf = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, buf).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoreError> {
    match tokio::fs::read(path).await {
        Ok(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
