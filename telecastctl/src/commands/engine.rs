use std::sync::Arc;

use telecast_core::{load_definitions, DefinitionsWatcher, GenerationScheduler, GuideCache};
use tracing::{info, warn};

use super::Services;
use crate::Result;

/// Host the long-running engine: initial pre-generation, the definitions
/// watcher, and the guide-cache refresher, until interrupted.
pub async fn execute() -> Result<()> {
    let services = Arc::new(Services::bootstrap()?);
    let scheduler = Arc::new(GenerationScheduler::new());
    let worker = Arc::new(services.worker());
    let cache = Arc::new(GuideCache::new());

    cache.refresh(&services.pool, &services.store);
    tokio::spawn(
        cache
            .clone()
            .run(services.pool.clone(), services.store.clone()),
    );

    let watcher = DefinitionsWatcher::new(&services.config.paths.channel_list)?;
    {
        let services = services.clone();
        let scheduler = scheduler.clone();
        let worker = worker.clone();
        tokio::spawn(watcher.run(move || {
            let services = services.clone();
            let scheduler = scheduler.clone();
            let worker = worker.clone();
            async move {
                // An unreadable or invalid file leaves the prior channel set
                // in effect.
                let definitions =
                    match load_definitions(&services.config.paths.channel_list) {
                        Ok(definitions) => definitions,
                        Err(error) => {
                            warn!(%error, "definitions reload failed, keeping prior channels");
                            return;
                        }
                    };
                services.pool.stop_all();
                services.pool.rebuild(definitions, &services.store);
                enqueue_pending(&services, &scheduler);
                scheduler.run(&worker, &services.pool).await;
            }
        }));
    }

    enqueue_pending(&services, &scheduler);
    {
        let services = services.clone();
        let scheduler = scheduler.clone();
        let worker = worker.clone();
        tokio::spawn(async move {
            scheduler.run(&worker, &services.pool).await;
        });
    }

    info!("engine running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

fn enqueue_pending(services: &Services, scheduler: &GenerationScheduler) {
    for channel in services.pool.all().iter() {
        scheduler.enqueue_channel(channel.slug(), channel.pending_sources(&services.store));
    }
}
