use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bundle::{BundleStore, ChannelManifest};
use crate::channel::{Channel, ChannelPool};
use crate::clock::{next_3am, phase, previous_3am};
use crate::definitions::ChannelDefinition;
use crate::program::CompiledProgram;

/// Entries shorter than this merge with same-titled neighbors, so a run of
/// music videos or shorts reads as one block in the guide.
const MERGE_BELOW_SECONDS: f64 = 20.0 * 60.0;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// One row of a channel's programming-day schedule. Derived, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub title: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub duration_seconds: f64,
    pub is_current: bool,
}

/// A maximal run of consecutive segments cut from the same source.
#[derive(Debug, Clone, PartialEq)]
struct Show {
    video_index: usize,
    start_sec: f64,
    duration: f64,
}

fn group_shows(program: &CompiledProgram) -> Vec<Show> {
    let mut shows: Vec<Show> = Vec::new();
    for segment in &program.segments {
        match shows.last_mut() {
            Some(show) if show.video_index == segment.video_index => {
                show.duration += segment.duration;
            }
            _ => shows.push(Show {
                video_index: segment.video_index,
                start_sec: segment.cumulative,
                duration: segment.duration,
            }),
        }
    }
    shows
}

/// Derive a show title from its source path: the basename of the first
/// configured root that prefixes the path, else the basename of the source's
/// parent directory.
fn derive_title(definition: &ChannelDefinition, source_path: &str) -> String {
    let source = Path::new(source_path);
    for root in &definition.paths {
        if source.starts_with(root) {
            if let Some(name) = root.file_name() {
                return name.to_string_lossy().into_owned();
            }
        }
    }
    source
        .parent()
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path.to_string())
}

fn title_for(
    definition: &ChannelDefinition,
    manifest: &ChannelManifest,
    program: &CompiledProgram,
    video_index: usize,
) -> String {
    // The original path comes from the channel manifest when the bundle is
    // recorded there, otherwise from the compiled queue itself.
    let source = program.sources.get(video_index);
    let path = source
        .and_then(|source| manifest.get(&source.fingerprint))
        .map(|entry| entry.original_path.clone())
        .or_else(|| source.map(|source| source.original_path.clone()))
        .unwrap_or_default();
    derive_title(definition, &path)
}

/// Project a channel's looping program onto the current programming day:
/// every loop instance overlapping `[previous3am, next3am)` contributes its
/// shows, then short same-titled runs are merged.
pub fn build_schedule(
    definition: &ChannelDefinition,
    program: &CompiledProgram,
    manifest: &ChannelManifest,
    offset: f64,
    now: DateTime<Local>,
) -> Vec<ScheduleEntry> {
    if program.is_empty() || program.total_seconds <= 0.0 {
        return Vec::new();
    }
    let total = program.total_seconds;
    let day_start = previous_3am(now);
    let day_end = next_3am(now);

    let channel_phase = phase(offset, total);
    // Start of the loop currently on air, then rewind whole loops until the
    // running loop begins before the programming day.
    let mut loop_start = now - chrono::Duration::milliseconds((channel_phase * 1000.0) as i64);
    while loop_start > day_start {
        loop_start -= chrono::Duration::milliseconds((total * 1000.0) as i64);
    }

    let shows = group_shows(program);
    let mut entries = Vec::new();
    while loop_start < day_end {
        for show in &shows {
            let start = loop_start + chrono::Duration::milliseconds((show.start_sec * 1000.0) as i64);
            let end = start + chrono::Duration::milliseconds((show.duration * 1000.0) as i64);
            if end <= day_start || start >= day_end {
                continue;
            }
            entries.push(ScheduleEntry {
                title: title_for(definition, manifest, program, show.video_index),
                start,
                end,
                duration_seconds: show.duration,
                is_current: start <= now && now < end,
            });
        }
        loop_start += chrono::Duration::milliseconds((total * 1000.0) as i64);
    }
    entries.sort_by_key(|entry| entry.start);
    merge_short_runs(entries)
}

/// Collapse runs of consecutive entries sharing a title where every member is
/// shorter than the merge threshold. The threshold applies to each member's
/// own duration, not the accumulated run.
pub(crate) fn merge_short_runs(entries: Vec<ScheduleEntry>) -> Vec<ScheduleEntry> {
    let mut merged: Vec<(ScheduleEntry, bool)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let short = entry.duration_seconds < MERGE_BELOW_SECONDS;
        match merged.last_mut() {
            Some((previous, run_is_short))
                if *run_is_short && short && previous.title == entry.title =>
            {
                previous.end = entry.end;
                previous.duration_seconds =
                    (previous.end - previous.start).num_milliseconds() as f64 / 1000.0;
                previous.is_current |= entry.is_current;
            }
            _ => merged.push((entry, short)),
        }
    }
    merged.into_iter().map(|(entry, _)| entry).collect()
}

/// Guide entries per channel, recomputed on a timer so request handlers never
/// build schedules on the hot path (except as a cold-start fallback).
#[derive(Default)]
pub struct GuideCache {
    entries: RwLock<HashMap<String, Arc<Vec<ScheduleEntry>>>>,
}

impl GuideCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute(channel: &Channel, store: &BundleStore, now_utc: DateTime<Utc>) -> Vec<ScheduleEntry> {
        let Some(offset) = channel.offset_at(now_utc) else {
            return Vec::new();
        };
        let manifest = store.read_manifest(channel.slug()).unwrap_or_else(|error| {
            warn!(slug = %channel.slug(), %error, "unreadable channel manifest");
            ChannelManifest::new()
        });
        let now_local = Local.timestamp_millis_opt(now_utc.timestamp_millis()).single();
        let Some(now_local) = now_local else {
            return Vec::new();
        };
        build_schedule(
            channel.definition(),
            &channel.compiled(),
            &manifest,
            offset,
            now_local,
        )
    }

    /// Recompute every channel's schedule and publish the fresh set.
    pub fn refresh(&self, pool: &ChannelPool, store: &BundleStore) {
        let now = Utc::now();
        let mut fresh = HashMap::new();
        for channel in pool.all().iter() {
            fresh.insert(
                channel.slug().to_string(),
                Arc::new(Self::compute(channel, store, now)),
            );
        }
        debug!(channels = fresh.len(), "guide cache refreshed");
        *self.entries.write().unwrap() = fresh;
    }

    /// Serve the cached schedule; on the very first request for a channel,
    /// compute it synchronously.
    pub fn get(
        &self,
        pool: &ChannelPool,
        store: &BundleStore,
        slug: &str,
    ) -> Option<Arc<Vec<ScheduleEntry>>> {
        if let Some(entries) = self.entries.read().unwrap().get(slug) {
            return Some(entries.clone());
        }
        let channel = pool.get(slug)?;
        let entries = Arc::new(Self::compute(&channel, store, Utc::now()));
        self.entries
            .write()
            .unwrap()
            .insert(slug.to_string(), entries.clone());
        Some(entries)
    }

    /// Periodic refresh loop.
    pub async fn run(self: Arc<Self>, pool: Arc<ChannelPool>, store: BundleStore) {
        loop {
            tokio::time::sleep(REFRESH_INTERVAL).await;
            self.refresh(&pool, &store);
        }
    }
}
