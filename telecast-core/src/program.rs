use std::path::Path;

use tracing::{debug, warn};

use crate::bundle::{fingerprint, BundleStatus, BundleStore};

/// One playable segment of a channel's looping program.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    /// Index of the source item this segment was cut from.
    pub video_index: usize,
    pub duration: f64,
    /// Root-relative URL under which the segment is served.
    pub url: String,
    /// Running sum of all earlier segment durations; the segment plays over
    /// `[cumulative, cumulative + duration)`.
    pub cumulative: f64,
}

/// A source item included in a compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSource {
    pub fingerprint: String,
    pub original_path: String,
}

/// The in-memory, effectively immutable program a channel broadcasts:
/// bundle indices concatenated in channel order.
#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    pub segments: Vec<SegmentRecord>,
    pub total_seconds: f64,
    /// Source identity per `video_index`.
    pub sources: Vec<CompiledSource>,
}

impl CompiledProgram {
    pub fn new(segments: Vec<(usize, f64, String)>, sources: Vec<CompiledSource>) -> Self {
        let mut records = Vec::with_capacity(segments.len());
        let mut cumulative = 0.0f64;
        for (video_index, duration, url) in segments {
            records.push(SegmentRecord {
                video_index,
                duration,
                url,
                cumulative,
            });
            cumulative += duration;
        }
        Self {
            segments: records,
            total_seconds: cumulative,
            sources,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Build a channel's compiled program by concatenating the indices of every
/// complete bundle, preserving queue order. Incomplete or unreadable bundles
/// are excluded from this compile; the channel carries on with the rest.
pub fn compile(slug: &str, queue: &[impl AsRef<Path>], store: &BundleStore) -> CompiledProgram {
    let mut segments = Vec::new();
    let mut sources = Vec::new();
    for source in queue {
        let source = source.as_ref();
        let hash = fingerprint(source);
        match store.status(slug, &hash) {
            BundleStatus::Complete => {}
            status => {
                debug!(slug, source = %source.display(), ?status, "bundle not ready, skipping");
                continue;
            }
        }
        let (indexed, metadata) = match store.open(slug, &hash) {
            Ok(opened) => opened,
            Err(error) => {
                warn!(slug, source = %source.display(), %error, "unreadable bundle excluded");
                continue;
            }
        };
        let video_index = sources.len();
        sources.push(CompiledSource {
            fingerprint: hash.clone(),
            original_path: metadata.original_path,
        });
        for segment in indexed {
            let url = format!("channels/{slug}/videos/{hash}/{}", segment.file_name);
            segments.push((video_index, segment.duration, url));
        }
    }
    CompiledProgram::new(segments, sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_timestamps_start_at_zero() {
        let program = CompiledProgram::new(
            vec![
                (0, 6.0, "a/0.ts".into()),
                (0, 6.0, "a/1.ts".into()),
                (1, 4.5, "b/0.ts".into()),
            ],
            vec![
                CompiledSource {
                    fingerprint: "aa".into(),
                    original_path: "/media/a.mp4".into(),
                },
                CompiledSource {
                    fingerprint: "bb".into(),
                    original_path: "/media/b.mp4".into(),
                },
            ],
        );
        assert_eq!(program.len(), 3);
        assert!((program.total_seconds - 16.5).abs() < 1e-9);
        assert_eq!(program.segments[0].cumulative, 0.0);
        assert_eq!(program.segments[1].cumulative, 6.0);
        assert_eq!(program.segments[2].cumulative, 12.0);
    }
}
