use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

pub const INDEX_NAME: &str = "index.m3u8";
pub const METADATA_NAME: &str = "metadata.json";
pub const MANIFEST_NAME: &str = "manifest.json";
pub const END_OF_LIST: &str = "#EXT-X-ENDLIST";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("io error at {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("invalid segment index {path}: {reason}")]
    Index { path: PathBuf, reason: String },
    #[error("invalid record {path}: {source}")]
    Record {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("bundle {fingerprint} is not complete")]
    Incomplete { fingerprint: String },
}

pub type BundleResult<T> = Result<T, BundleError>;

/// Stable 128-bit identity of a source item: the first 16 bytes of a SHA-256
/// digest over the raw path string, hex-encoded. Paths are never
/// canonicalized; moving the library re-keys the bundles.
pub fn fingerprint(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    Absent,
    Partial,
    Complete,
}

/// One entry of a sealed bundle's segment index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSegment {
    pub file_name: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub original_path: String,
    pub video_hash: String,
    pub generated_at: DateTime<Utc>,
    /// Wall-clock seconds the transcode took.
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub original_path: String,
    pub filename: String,
    /// Epoch milliseconds at which the bundle was recorded.
    pub added_at: i64,
}

pub type ChannelManifest = HashMap<String, ManifestEntry>;

/// Owns the on-disk bundle layout under the cache root. The only component
/// allowed to touch bundle directories.
#[derive(Debug, Clone)]
pub struct BundleStore {
    cache_dir: PathBuf,
}

impl BundleStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn channel_dir(&self, slug: &str) -> PathBuf {
        self.cache_dir.join("channels").join(slug)
    }

    pub fn bundle_dir(&self, slug: &str, fingerprint: &str) -> PathBuf {
        self.channel_dir(slug).join("videos").join(fingerprint)
    }

    /// Idempotent creation of a bundle's writable directory.
    pub fn create(&self, slug: &str, fingerprint: &str) -> BundleResult<PathBuf> {
        let dir = self.bundle_dir(slug, fingerprint);
        std::fs::create_dir_all(&dir).map_err(|source| BundleError::Io {
            source,
            path: dir.clone(),
        })?;
        Ok(dir)
    }

    /// The four-clause completeness check: index present with the end-of-list
    /// marker, at least one listed segment, every listed segment on disk, and
    /// the metadata record present.
    pub fn status(&self, slug: &str, fingerprint: &str) -> BundleStatus {
        let dir = self.bundle_dir(slug, fingerprint);
        if !dir.is_dir() {
            return BundleStatus::Absent;
        }
        let index_path = dir.join(INDEX_NAME);
        let contents = match std::fs::read_to_string(&index_path) {
            Ok(contents) => contents,
            Err(_) => return BundleStatus::Partial,
        };
        if !contents.lines().any(|line| line.trim() == END_OF_LIST) {
            return BundleStatus::Partial;
        }
        let segments = match parse_index(&contents) {
            Ok(segments) => segments,
            Err(_) => return BundleStatus::Partial,
        };
        if segments.is_empty() {
            return BundleStatus::Partial;
        }
        if !segments
            .iter()
            .all(|segment| dir.join(&segment.file_name).is_file())
        {
            return BundleStatus::Partial;
        }
        if !dir.join(METADATA_NAME).is_file() {
            return BundleStatus::Partial;
        }
        BundleStatus::Complete
    }

    /// Delete a partial bundle, best-effort.
    pub fn reap(&self, slug: &str, fingerprint: &str) {
        let dir = self.bundle_dir(slug, fingerprint);
        if let Err(error) = std::fs::remove_dir_all(&dir) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %dir.display(), %error, "failed to reap partial bundle");
            }
        }
    }

    /// Parse a complete bundle's segment index and metadata record.
    pub fn open(
        &self,
        slug: &str,
        fingerprint: &str,
    ) -> BundleResult<(Vec<IndexedSegment>, BundleMetadata)> {
        if self.status(slug, fingerprint) != BundleStatus::Complete {
            return Err(BundleError::Incomplete {
                fingerprint: fingerprint.to_string(),
            });
        }
        let dir = self.bundle_dir(slug, fingerprint);
        let index_path = dir.join(INDEX_NAME);
        let contents = std::fs::read_to_string(&index_path).map_err(|source| BundleError::Io {
            source,
            path: index_path.clone(),
        })?;
        let segments = parse_index(&contents).map_err(|reason| BundleError::Index {
            path: index_path,
            reason,
        })?;
        let metadata = self.read_metadata(slug, fingerprint)?;
        Ok((segments, metadata))
    }

    pub fn read_metadata(&self, slug: &str, fingerprint: &str) -> BundleResult<BundleMetadata> {
        let path = self.bundle_dir(slug, fingerprint).join(METADATA_NAME);
        let contents = std::fs::read_to_string(&path).map_err(|source| BundleError::Io {
            source,
            path: path.clone(),
        })?;
        serde_json::from_str(&contents).map_err(|source| BundleError::Record { source, path })
    }

    pub fn write_metadata(
        &self,
        slug: &str,
        fingerprint: &str,
        metadata: &BundleMetadata,
    ) -> BundleResult<()> {
        let path = self.bundle_dir(slug, fingerprint).join(METADATA_NAME);
        let body = serde_json::to_vec_pretty(metadata).map_err(|source| BundleError::Record {
            source,
            path: path.clone(),
        })?;
        std::fs::write(&path, body).map_err(|source| BundleError::Io { source, path })
    }

    pub fn read_manifest(&self, slug: &str) -> BundleResult<ChannelManifest> {
        let path = self.channel_dir(slug).join(MANIFEST_NAME);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(ChannelManifest::new())
            }
            Err(source) => return Err(BundleError::Io { source, path }),
        };
        serde_json::from_str(&contents).map_err(|source| BundleError::Record { source, path })
    }

    /// Record a sealed bundle in the per-channel manifest.
    pub fn record_source(
        &self,
        slug: &str,
        fingerprint: &str,
        original_path: &Path,
    ) -> BundleResult<()> {
        let mut manifest = self.read_manifest(slug)?;
        let filename = original_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        manifest.insert(
            fingerprint.to_string(),
            ManifestEntry {
                original_path: original_path.to_string_lossy().to_string(),
                filename,
                added_at: Utc::now().timestamp_millis(),
            },
        );
        let dir = self.channel_dir(slug);
        std::fs::create_dir_all(&dir).map_err(|source| BundleError::Io {
            source,
            path: dir.clone(),
        })?;
        let path = dir.join(MANIFEST_NAME);
        let body = serde_json::to_vec_pretty(&manifest).map_err(|source| BundleError::Record {
            source,
            path: path.clone(),
        })?;
        std::fs::write(&path, body).map_err(|source| BundleError::Io { source, path })
    }
}

/// Parse a bundle index: for each `#EXTINF:<d>,` line the next non-comment
/// line is the segment filename.
fn parse_index(contents: &str) -> Result<Vec<IndexedSegment>, String> {
    let extinf = Regex::new(r"#EXTINF:([0-9]+(\.[0-9]+)?)").map_err(|err| err.to_string())?;
    let mut segments = Vec::new();
    let mut pending: Option<f64> = None;
    for line in contents.lines().map(str::trim) {
        if let Some(captures) = extinf.captures(line) {
            let duration = captures[1]
                .parse::<f64>()
                .map_err(|_| format!("invalid duration in `{line}`"))?;
            pending = Some(duration);
        } else if line.starts_with('#') || line.is_empty() {
            continue;
        } else if let Some(duration) = pending.take() {
            segments.push(IndexedSegment {
                file_name: line.to_string(),
                duration,
            });
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_parsing_pairs_durations_with_filenames() {
        let contents = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n\
                        #EXTINF:6.006000,\nsegment_00000.ts\n\
                        #EXTINF:4.5,\nsegment_00001.ts\n#EXT-X-ENDLIST\n";
        let segments = parse_index(contents).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].file_name, "segment_00000.ts");
        assert!((segments[0].duration - 6.006).abs() < 1e-9);
        assert_eq!(segments[1].file_name, "segment_00001.ts");
        assert!((segments[1].duration - 4.5).abs() < 1e-9);
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let a = fingerprint(Path::new("/media/a.mp4"));
        let b = fingerprint(Path::new("/media/a.mp4"));
        let c = fingerprint(Path::new("/media/b.mp4"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
