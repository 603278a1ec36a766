use std::fmt;
use std::path::Path;

use super::upload_id::UploadId;

const DEFAULT_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 8;

/// Location of a staged upload inside the transient audio store.
///
/// Paths are flat (`{upload_id}.{ext}`) so deleting the object leaves no
/// directory behind. Only the extension of the client filename survives,
/// and only if it is short and alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn for_upload(upload_id: &UploadId, filename: Option<&str>) -> Self {
        Self(format!(
            "{}.{}",
            upload_id.as_uuid(),
            sanitized_extension(filename)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.0).extension().and_then(|e| e.to_str())
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitized_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
