//! Display payload extraction from ZIP archives.
//!
//! An archive is opened once, up front, so that an unreadable download is
//! reported before anything is created remotely. Individual entries are then
//! turned into [`DisplayPayload`]s one by one; a bad entry never affects its
//! siblings.

use std::io::{Cursor, Read};
use std::path::Path;

use base64::Engine;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Default per-entry size limit (250 KiB).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 250 * 1024;

/// One image ready to be sent to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayPayload {
    pub file_name: String,
    pub mime_type: String,
    pub data_uri: String,
}

/// Why a single archive entry could not be turned into a payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryError {
    #[error("file \"{file_name}\" ({size_kb} KB) exceeds the {limit_kb} KB limit")]
    Oversize {
        file_name: String,
        size_kb: u64,
        limit_kb: u64,
    },
    #[error("file \"{file_name}\" could not be read: {reason}")]
    Unreadable { file_name: String, reason: String },
}

impl EntryError {
    pub fn file_name(&self) -> &str {
        match self {
            EntryError::Oversize { file_name, .. } | EntryError::Unreadable { file_name, .. } => {
                file_name
            }
        }
    }
}

/// An opened in-memory ZIP archive.
pub struct PayloadArchive {
    inner: ZipArchive<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for PayloadArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadArchive")
            .field("entries", &self.inner.len())
            .finish()
    }
}

impl PayloadArchive {
    pub fn open(bytes: Vec<u8>) -> Result<Self, zip::result::ZipError> {
        let inner = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { inner })
    }

    /// Number of raw entries, including directories.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Converts every file entry into a payload, skipping directories and
    /// nested archives. Results keep archive order.
    pub fn payloads(&mut self, max_entry_bytes: u64) -> Vec<Result<DisplayPayload, EntryError>> {
        let mut results = Vec::new();
        for index in 0..self.inner.len() {
            let mut entry = match self.inner.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(index, error = %e, "[ARCHIVE] Cannot open entry");
                    results.push(Err(EntryError::Unreadable {
                        file_name: format!("#{index}"),
                        reason: e.to_string(),
                    }));
                    continue;
                }
            };

            let file_name = entry.name().to_string();
            if entry.is_dir() || is_nested_archive(&file_name) {
                debug!(file = %file_name, "[ARCHIVE] Skipping entry");
                continue;
            }

            let declared = entry.size();
            if declared > max_entry_bytes {
                results.push(Err(oversize(&file_name, declared, max_entry_bytes)));
                continue;
            }

            let bytes = match read_bounded(&mut entry, declared, max_entry_bytes) {
                Ok(bytes) => bytes,
                Err(e) => {
                    results.push(Err(EntryError::Unreadable {
                        file_name,
                        reason: e.to_string(),
                    }));
                    continue;
                }
            };
            if bytes.len() as u64 > max_entry_bytes {
                results.push(Err(oversize(&file_name, bytes.len() as u64, max_entry_bytes)));
                continue;
            }

            results.push(Ok(encode_payload(file_name, &bytes)));
        }
        results
    }
}

/// Reads at most `limit + 1` bytes, enough to tell an entry over the limit
/// whatever size its header declares.
fn read_bounded<R: Read>(reader: R, declared: u64, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(declared.min(limit) as usize);
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn oversize(file_name: &str, size: u64, limit: u64) -> EntryError {
    EntryError::Oversize {
        file_name: file_name.to_string(),
        size_kb: (size + 512) / 1024,
        limit_kb: limit / 1024,
    }
}

fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_nested_archive(file_name: &str) -> bool {
    extension(file_name) == "zip"
}

/// Content type for an archive entry, inferred from its extension.
pub fn mime_type_for(file_name: &str) -> String {
    let ext = extension(file_name);
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "gif" => "image/gif".to_string(),
        "webp" => "image/webp".to_string(),
        "svg" => "image/svg+xml".to_string(),
        "bmp" => "image/bmp".to_string(),
        _ => format!("image/{ext}"),
    }
}

/// Wraps raw bytes into a base64 `data:` URI payload.
pub fn encode_payload(file_name: String, bytes: &[u8]) -> DisplayPayload {
    let mime_type = mime_type_for(&file_name);
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    DisplayPayload {
        data_uri: format!("data:{mime_type};base64,{encoded}"),
        mime_type,
        file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, bytes) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type_for("a.PNG"), "image/png");
        assert_eq!(mime_type_for("dir/b.jpg"), "image/jpeg");
        assert_eq!(mime_type_for("c.svg"), "image/svg+xml");
        assert_eq!(mime_type_for("d.avif"), "image/avif");
    }

    #[test]
    fn payload_is_a_data_uri() {
        let payload = encode_payload("x.gif".into(), b"GIF");
        assert_eq!(payload.data_uri, "data:image/gif;base64,R0lG");
    }

    #[test]
    fn skips_directories_and_nested_archives() {
        let bytes = build_zip(&[
            ("banners/", vec![]),
            ("banners/300x250.png", vec![1, 2, 3]),
            ("inner.ZIP", vec![9]),
        ]);
        let mut archive = PayloadArchive::open(bytes).unwrap();
        let results = archive.payloads(DEFAULT_MAX_ENTRY_BYTES);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().file_name, "banners/300x250.png");
    }

    #[test]
    fn oversize_entries_are_reported_individually() {
        let bytes = build_zip(&[
            ("small.png", vec![0; 10]),
            ("big.jpg", vec![0; 2048]),
        ]);
        let mut archive = PayloadArchive::open(bytes).unwrap();
        let results = archive.payloads(1024);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(EntryError::Oversize { file_name, size_kb, limit_kb }) => {
                assert_eq!(file_name, "big.jpg");
                assert_eq!(*size_kb, 2);
                assert_eq!(*limit_kb, 1);
            }
            other => panic!("expected oversize error, got {other:?}"),
        }
    }

    #[test]
    fn bounded_read_ignores_understated_size() {
        let inflated = vec![0u8; 64];
        let bytes = read_bounded(Cursor::new(inflated), 1, 16).unwrap();
        assert_eq!(bytes.len(), 17);
    }

    #[test]
    fn garbage_is_not_an_archive() {
        assert!(PayloadArchive::open(b"not a zip".to_vec()).is_err());
    }
}
