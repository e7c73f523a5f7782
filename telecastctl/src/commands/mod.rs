pub mod channels;
pub mod engine;
pub mod generate;
pub mod guide;
pub mod manifest;

use std::sync::Arc;

use telecast_core::{
    load_or_create_definitions, BundleStore, ChannelPool, EngineConfig, SystemTranscoder,
    TranscodeWorker,
};

use crate::Result;

/// Services shared by every subcommand, built once from the environment.
pub struct Services {
    pub config: EngineConfig,
    pub store: BundleStore,
    pub pool: Arc<ChannelPool>,
}

impl Services {
    /// Load configuration, seal the cache root, and build the channel pool
    /// from the definitions file (creating the default file when missing).
    pub fn bootstrap() -> Result<Self> {
        let config = EngineConfig::from_env()?;
        config.ensure_cache_root()?;
        let store = BundleStore::new(&config.paths.cache_dir);
        let definitions = load_or_create_definitions(&config.paths.channel_list)?;
        let pool = Arc::new(ChannelPool::new());
        pool.rebuild(definitions, &store);
        Ok(Self {
            config,
            store,
            pool,
        })
    }

    pub fn worker(&self) -> TranscodeWorker {
        TranscodeWorker::new(
            self.store.clone(),
            self.config.transcode.clone(),
            Box::new(SystemTranscoder::new(&self.config.paths.ffmpeg)),
            &self.config.paths.ffprobe,
        )
    }
}
