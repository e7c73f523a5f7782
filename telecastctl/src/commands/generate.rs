use telecast_core::GenerationScheduler;
use tracing::info;

use super::Services;
use crate::Result;

/// Fill the pre-generation queues from every channel and process them once.
pub async fn execute() -> Result<()> {
    let services = Services::bootstrap()?;
    let scheduler = GenerationScheduler::new();
    for channel in services.pool.all().iter() {
        scheduler.enqueue_channel(channel.slug(), channel.pending_sources(&services.store));
    }
    let worker = services.worker();
    scheduler.run(&worker, &services.pool).await;

    let progress = scheduler.progress();
    info!(
        processed = progress.current_index,
        total = progress.total_videos,
        "generation pass complete"
    );
    for channel in services.pool.all().iter() {
        let program = channel.compiled();
        println!(
            "{}: {} segments, {:.1}s loop, broadcastable={}",
            channel.slug(),
            program.len(),
            program.total_seconds,
            channel.is_broadcastable()
        );
    }
    Ok(())
}
