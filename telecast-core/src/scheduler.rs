use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::channel::ChannelPool;
use crate::transcode::{TranscodeOutcome, TranscodeWorker};

/// Round-robin pre-generation queue: one FIFO sub-queue per channel,
/// interleaved so every channel becomes playable after a bounded prefix of
/// work instead of starving behind a long first channel.
#[derive(Default)]
pub struct GenerationScheduler {
    queues: Mutex<Vec<ChannelQueue>>,
    current_index: AtomicUsize,
    total: AtomicUsize,
    generating: AtomicBool,
}

struct ChannelQueue {
    slug: String,
    sources: VecDeque<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub current_index: usize,
    pub total_videos: usize,
    pub is_generating: bool,
    pub percent_complete: f64,
}

impl GenerationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel's missing sources, preserving channel order. Adding
    /// the same slug again extends its sub-queue.
    pub fn enqueue_channel(&self, slug: &str, sources: Vec<PathBuf>) {
        if sources.is_empty() {
            return;
        }
        let mut queues = self.queues.lock().unwrap();
        self.total.fetch_add(sources.len(), Ordering::SeqCst);
        if let Some(queue) = queues.iter_mut().find(|queue| queue.slug == slug) {
            queue.sources.extend(sources);
        } else {
            queues.push(ChannelQueue {
                slug: slug.to_string(),
                sources: sources.into(),
            });
        }
    }

    /// Flatten the sub-queues by repeatedly taking the head of each non-empty
    /// queue in the order the channels were added.
    pub fn build_flat(&self) -> Vec<(String, PathBuf)> {
        let mut queues = self.queues.lock().unwrap();
        let mut flat = Vec::new();
        loop {
            let mut drained = true;
            for queue in queues.iter_mut() {
                if let Some(source) = queue.sources.pop_front() {
                    flat.push((queue.slug.clone(), source));
                    drained = false;
                }
            }
            if drained {
                break;
            }
        }
        queues.clear();
        flat
    }

    /// Process the flat queue serially through the worker; exactly one
    /// transcoder process runs at any time. Not reentrant: a concurrent call
    /// returns immediately.
    pub async fn run(&self, worker: &TranscodeWorker, pool: &ChannelPool) {
        if self
            .generating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("pre-generation already running");
            return;
        }
        let flat = self.build_flat();
        info!(videos = flat.len(), "pre-generation pass starting");
        for (slug, source) in flat {
            match worker.transcode(&source, &slug).await {
                Ok(TranscodeOutcome::Complete) => {
                    if let Some(channel) = pool.get(&slug) {
                        channel.recompile(worker.store());
                        channel.start();
                    }
                }
                Ok(TranscodeOutcome::Failed {
                    exit_code,
                    diagnostic_tail,
                }) => {
                    // Failures are skipped; the channel runs with fewer items.
                    warn!(
                        slug,
                        source = %source.display(),
                        ?exit_code,
                        tail = %diagnostic_tail,
                        "transcode failed, skipping"
                    );
                }
                Err(error) => {
                    warn!(slug, source = %source.display(), %error, "transcode errored, skipping");
                }
            }
            self.current_index.fetch_add(1, Ordering::SeqCst);
        }
        self.generating.store(false, Ordering::SeqCst);
        info!("pre-generation pass finished");
    }

    pub fn progress(&self) -> Progress {
        let current_index = self.current_index.load(Ordering::SeqCst);
        let total_videos = self.total.load(Ordering::SeqCst);
        let percent_complete = if total_videos == 0 {
            100.0
        } else {
            current_index as f64 * 100.0 / total_videos as f64
        };
        Progress {
            current_index,
            total_videos,
            is_generating: self.generating.load(Ordering::SeqCst),
            percent_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_queue_interleaves_round_robin() {
        let scheduler = GenerationScheduler::new();
        scheduler.enqueue_channel(
            "alpha",
            vec![PathBuf::from("a1"), PathBuf::from("a2"), PathBuf::from("a3")],
        );
        scheduler.enqueue_channel("beta", vec![PathBuf::from("b1")]);
        scheduler.enqueue_channel("gamma", vec![PathBuf::from("g1"), PathBuf::from("g2")]);

        let flat: Vec<String> = scheduler
            .build_flat()
            .into_iter()
            .map(|(slug, source)| format!("{slug}/{}", source.display()))
            .collect();
        assert_eq!(
            flat,
            vec![
                "alpha/a1", "beta/b1", "gamma/g1", "alpha/a2", "gamma/g2", "alpha/a3"
            ]
        );
    }

    #[test]
    fn progress_reports_percentages() {
        let scheduler = GenerationScheduler::new();
        assert_eq!(scheduler.progress().percent_complete, 100.0);
        scheduler.enqueue_channel("alpha", vec![PathBuf::from("a1"), PathBuf::from("a2")]);
        let progress = scheduler.progress();
        assert_eq!(progress.total_videos, 2);
        assert_eq!(progress.current_index, 0);
        assert_eq!(progress.percent_complete, 0.0);
        assert!(!progress.is_generating);
    }
}
