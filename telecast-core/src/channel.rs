use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bundle::{fingerprint, BundleStatus, BundleStore};
use crate::clock::offset_seconds;
use crate::config::is_supported_source;
use crate::definitions::{ChannelDefinition, ChannelKind};
use crate::playlist;
use crate::program::{compile, CompiledProgram};

/// One configured channel: its ordered source queue, the compiled program it
/// is currently broadcasting, and its runtime state.
pub struct Channel {
    definition: ChannelDefinition,
    queue: Vec<PathBuf>,
    compiled: RwLock<Arc<CompiledProgram>>,
    /// `None` until `start()`; readers observe the `(started, epoch)` pair as
    /// a single atomic transition.
    epoch: RwLock<Option<DateTime<Utc>>>,
}

impl Channel {
    /// Build the channel program: walk every root, keep supported files, and
    /// order them per the channel type. A shuffle channel's permutation is
    /// fixed here for the life of the channel.
    pub fn build(definition: ChannelDefinition) -> Self {
        let mut queue = Vec::new();
        for root in &definition.paths {
            if !root.exists() {
                warn!(slug = %definition.slug, root = %root.display(), "root path missing");
                continue;
            }
            for entry in WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
            {
                if entry.file_type().is_file() && is_supported_source(entry.path()) {
                    queue.push(entry.path().to_path_buf());
                }
            }
        }
        if matches!(definition.kind, ChannelKind::Shuffle) {
            queue.shuffle(&mut thread_rng());
        }
        if queue.is_empty() {
            warn!(slug = %definition.slug, "channel has no playable sources");
        }
        debug!(slug = %definition.slug, sources = queue.len(), "channel program built");
        Self {
            definition,
            queue,
            compiled: RwLock::new(Arc::new(CompiledProgram::default())),
            epoch: RwLock::new(None),
        }
    }

    pub fn slug(&self) -> &str {
        &self.definition.slug
    }

    pub fn definition(&self) -> &ChannelDefinition {
        &self.definition
    }

    pub fn queue(&self) -> &[PathBuf] {
        &self.queue
    }

    /// Sources whose bundles are not yet complete, in channel order.
    pub fn pending_sources(&self, store: &BundleStore) -> Vec<PathBuf> {
        self.queue
            .iter()
            .filter(|source| {
                store.status(&self.definition.slug, &fingerprint(source)) != BundleStatus::Complete
            })
            .cloned()
            .collect()
    }

    /// Recompile the broadcast program from the bundles on disk and publish
    /// it atomically.
    pub fn recompile(&self, store: &BundleStore) {
        let program = compile(&self.definition.slug, &self.queue, store);
        debug!(
            slug = %self.definition.slug,
            segments = program.len(),
            loop_seconds = program.total_seconds,
            "program compiled"
        );
        *self.compiled.write().unwrap() = Arc::new(program);
    }

    pub fn compiled(&self) -> Arc<CompiledProgram> {
        self.compiled.read().unwrap().clone()
    }

    pub fn is_broadcastable(&self) -> bool {
        !self.compiled().is_empty()
    }

    /// Begin broadcasting: capture the epoch once. The epoch is never updated
    /// for the life of this channel value.
    pub fn start(&self) {
        let mut epoch = self.epoch.write().unwrap();
        if epoch.is_none() {
            let now = Utc::now();
            *epoch = Some(now);
            info!(slug = %self.definition.slug, %now, "channel started");
        }
    }

    pub fn started(&self) -> bool {
        self.epoch().is_some()
    }

    pub fn epoch(&self) -> Option<DateTime<Utc>> {
        *self.epoch.read().unwrap()
    }

    /// Seconds since the channel epoch at `now`; `None` until started.
    pub fn offset_at(&self, now: DateTime<Utc>) -> Option<f64> {
        self.epoch().map(|epoch| offset_seconds(epoch, now))
    }

    /// The manifest a client joining at `now` receives. Pure: reads the
    /// published program and epoch, mutates nothing, safe from any number of
    /// concurrent request handlers.
    pub fn manifest_at(&self, now: DateTime<Utc>) -> Option<String> {
        let offset = self.offset_at(now)?;
        Some(playlist::render(&self.compiled(), offset))
    }

    pub fn current_manifest(&self) -> Option<String> {
        self.manifest_at(Utc::now())
    }
}

/// The channel set, swapped wholesale on definitions reload so readers never
/// observe a partially built set.
#[derive(Default)]
pub struct ChannelPool {
    channels: RwLock<Arc<Vec<Arc<Channel>>>>,
}

impl ChannelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build channels from definitions, compile what is already on disk, and
    /// start every broadcast. A channel with no sealed bundles yet serves the
    /// empty manifest until pre-generation catches up.
    pub fn rebuild(&self, definitions: Vec<ChannelDefinition>, store: &BundleStore) {
        let mut channels = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let channel = Arc::new(Channel::build(definition));
            channel.recompile(store);
            channel.start();
            channels.push(channel);
        }
        info!(channels = channels.len(), "channel pool rebuilt");
        *self.channels.write().unwrap() = Arc::new(channels);
    }

    /// Stop broadcasts ahead of a rebuild. Dropping the old channel values on
    /// swap is what actually retires their epochs; this only records intent.
    pub fn stop_all(&self) {
        for channel in self.all().iter() {
            if channel.started() {
                info!(slug = %channel.slug(), "stopping channel for rebuild");
            }
        }
    }

    pub fn all(&self) -> Arc<Vec<Arc<Channel>>> {
        self.channels.read().unwrap().clone()
    }

    pub fn get(&self, slug: &str) -> Option<Arc<Channel>> {
        self.all()
            .iter()
            .find(|channel| channel.slug() == slug)
            .cloned()
    }
}

/// Typed service-boundary outcome for a manifest request; the out-of-scope
/// HTTP layer maps these onto its statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestResponse {
    /// Channel is live; body is the rendered manifest (possibly the
    /// three-line empty manifest when no bundle is sealed yet).
    Live(String),
    UnknownChannel,
    NotStarted,
}

pub fn manifest_for(pool: &ChannelPool, slug: &str, now: DateTime<Utc>) -> ManifestResponse {
    match pool.get(slug) {
        None => ManifestResponse::UnknownChannel,
        Some(channel) => match channel.manifest_at(now) {
            None => ManifestResponse::NotStarted,
            Some(body) => ManifestResponse::Live(body),
        },
    }
}
