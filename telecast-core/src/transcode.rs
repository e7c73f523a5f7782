use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::bundle::{fingerprint, BundleError, BundleMetadata, BundleStatus, BundleStore};
use crate::config::TranscodeSection;

/// Bytes of the transcoder's diagnostic stream retained on failure.
pub const DIAGNOSTIC_TAIL_BYTES: usize = 500;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Complete,
    Failed {
        exit_code: Option<i32>,
        diagnostic_tail: String,
    },
}

/// Exit state of one transcoder invocation.
#[derive(Debug, Clone)]
pub struct TranscodeExit {
    pub code: Option<i32>,
    pub diagnostic_tail: String,
}

/// Seam for the external transcoder process, so the pipeline is testable
/// without the binary installed.
#[async_trait]
pub trait TranscoderInvoker: Send + Sync {
    async fn invoke(&self, args: &[String]) -> io::Result<TranscodeExit>;
}

/// Spawns the real transcoder binary. Two cooperating tasks per invocation:
/// one drains the diagnostic stream into a bounded ring, one awaits exit;
/// both are joined before returning.
#[derive(Debug, Clone)]
pub struct SystemTranscoder {
    binary: PathBuf,
}

impl SystemTranscoder {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TranscoderInvoker for SystemTranscoder {
    async fn invoke(&self, args: &[String]) -> io::Result<TranscodeExit> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let mut stderr = child.stderr.take();

        let drain = async {
            let mut ring = DiagnosticRing::new(DIAGNOSTIC_TAIL_BYTES);
            if let Some(stream) = stderr.as_mut() {
                let mut chunk = [0u8; 512];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(read) => ring.extend(&chunk[..read]),
                    }
                }
            }
            ring
        };
        let (ring, status) = tokio::join!(drain, child.wait());
        let status = status?;
        Ok(TranscodeExit {
            code: status.code(),
            diagnostic_tail: ring.into_string(),
        })
    }
}

/// Fixed-capacity byte ring keeping only the tail of a stream.
#[derive(Debug)]
pub struct DiagnosticRing {
    buffer: VecDeque<u8>,
    capacity: usize,
}

impl DiagnosticRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for byte in bytes {
            if self.buffer.len() == self.capacity {
                self.buffer.pop_front();
            }
            self.buffer.push_back(*byte);
        }
    }

    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&Vec::from(self.buffer)).into_owned()
    }
}

/// Converts one source file into a sealed segment bundle by driving the
/// external transcoder. Invocations must be serialized by the caller; the
/// worker itself never retries.
pub struct TranscodeWorker {
    store: BundleStore,
    config: TranscodeSection,
    invoker: Box<dyn TranscoderInvoker>,
    ffprobe: PathBuf,
}

impl TranscodeWorker {
    pub fn new(
        store: BundleStore,
        config: TranscodeSection,
        invoker: Box<dyn TranscoderInvoker>,
        ffprobe: impl AsRef<Path>,
    ) -> Self {
        Self {
            store,
            config,
            invoker,
            ffprobe: ffprobe.as_ref().to_path_buf(),
        }
    }

    pub fn store(&self) -> &BundleStore {
        &self.store
    }

    /// Produce the bundle for `source` under `slug`. Complete bundles are
    /// never re-transcoded; partial ones are reaped first.
    pub async fn transcode(&self, source: &Path, slug: &str) -> TranscodeResult<TranscodeOutcome> {
        let hash = fingerprint(source);
        match self.store.status(slug, &hash) {
            BundleStatus::Complete => {
                debug!(slug, source = %source.display(), "bundle already sealed, skipping");
                return Ok(TranscodeOutcome::Complete);
            }
            BundleStatus::Partial => {
                debug!(slug, source = %source.display(), "reaping partial bundle");
                self.store.reap(slug, &hash);
            }
            BundleStatus::Absent => {}
        }
        let bundle_dir = self.store.create(slug, &hash)?;

        if let Some(seconds) = self.probe_duration(source).await {
            debug!(slug, source = %source.display(), seconds, "probed source duration");
        }

        let args = self.build_args(source, &bundle_dir);
        let started = Instant::now();
        // A spawn failure is a failed transcode like any non-zero exit; the
        // scheduler logs it and moves on.
        let exit = match self.invoker.invoke(&args).await {
            Ok(exit) => exit,
            Err(error) => {
                return Ok(TranscodeOutcome::Failed {
                    exit_code: None,
                    diagnostic_tail: error.to_string(),
                })
            }
        };

        if exit.code != Some(0) {
            return Ok(TranscodeOutcome::Failed {
                exit_code: exit.code,
                diagnostic_tail: exit.diagnostic_tail,
            });
        }

        self.store.write_metadata(
            slug,
            &hash,
            &BundleMetadata {
                original_path: source.to_string_lossy().to_string(),
                video_hash: hash.clone(),
                generated_at: Utc::now(),
                duration: started.elapsed().as_secs_f64(),
            },
        )?;

        if self.store.status(slug, &hash) != BundleStatus::Complete {
            warn!(slug, source = %source.display(), "transcoder exited cleanly but bundle is incomplete");
            return Ok(TranscodeOutcome::Failed {
                exit_code: Some(0),
                diagnostic_tail: "bundle failed completeness validation".into(),
            });
        }
        self.store.record_source(slug, &hash, source)?;
        info!(
            slug,
            source = %source.display(),
            took = started.elapsed().as_secs_f64(),
            "bundle sealed"
        );
        Ok(TranscodeOutcome::Complete)
    }

    /// Arguments directing the transcoder to fill the bundle directory with
    /// numbered segments and a finalized index.
    fn build_args(&self, source: &Path, bundle_dir: &Path) -> Vec<String> {
        let mut filter = format!(
            "scale={}:{}:force_original_aspect_ratio=decrease,pad={}:{}:-1:-1",
            self.config.width, self.config.height, self.config.width, self.config.height
        );
        if let Some(extra) = &self.config.video_filter {
            filter.push(',');
            filter.push_str(extra);
        }
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            source.to_string_lossy().into_owned(),
            "-c:v".into(),
            self.config.video_codec.clone(),
            "-preset".into(),
            self.config.preset.clone(),
            "-crf".into(),
            self.config.quality.clone(),
            "-vf".into(),
            filter,
            "-c:a".into(),
            self.config.audio_codec.clone(),
            "-b:a".into(),
            self.config.audio_bitrate.clone(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.config.segment_seconds.to_string(),
            "-hls_list_size".into(),
            "0".into(),
            "-hls_playlist_type".into(),
            "vod".into(),
            "-hls_segment_filename".into(),
            bundle_dir
                .join("segment_%05d.ts")
                .to_string_lossy()
                .into_owned(),
            bundle_dir
                .join(crate::bundle::INDEX_NAME)
                .to_string_lossy()
                .into_owned(),
        ]
    }

    /// Probe the source's duration under a hard wall-clock timeout. Any
    /// failure or timeout is "unknown", never fatal.
    pub async fn probe_duration(&self, source: &Path) -> Option<f64> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(source)
            .stdin(Stdio::null());
        let output = match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(_)) | Ok(Err(_)) => return None,
            Err(_) => {
                warn!(source = %source.display(), "probe timed out");
                return None;
            }
        };
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_ring_keeps_only_the_tail() {
        let mut ring = DiagnosticRing::new(8);
        ring.extend(b"0123456789abcdef");
        assert_eq!(ring.into_string(), "89abcdef");

        let mut ring = DiagnosticRing::new(8);
        ring.extend(b"short");
        assert_eq!(ring.into_string(), "short");
    }

    #[test]
    fn diagnostic_ring_handles_incremental_writes() {
        let mut ring = DiagnosticRing::new(4);
        for chunk in [&b"ab"[..], &b"cd"[..], &b"ef"[..]] {
            ring.extend(chunk);
        }
        assert_eq!(ring.into_string(), "cdef");
    }
}
