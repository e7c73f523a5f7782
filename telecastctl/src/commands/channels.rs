use serde_json::json;

use super::Services;
use crate::{OutputFormat, Result};

pub fn execute(format: OutputFormat) -> Result<()> {
    let services = Services::bootstrap()?;
    let channels = services.pool.all();
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = channels
                .iter()
                .map(|channel| {
                    let program = channel.compiled();
                    json!({
                        "slug": channel.slug(),
                        "name": channel.definition().name,
                        "type": channel.definition().kind,
                        "queuedSources": channel.queue().len(),
                        "compiledSegments": program.len(),
                        "loopSeconds": program.total_seconds,
                        "started": channel.started(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for channel in channels.iter() {
                let program = channel.compiled();
                println!(
                    "{:<20} {:<24} sources={:<4} segments={:<6} loop={:.1}s started={}",
                    channel.slug(),
                    channel.definition().name,
                    channel.queue().len(),
                    program.len(),
                    program.total_seconds,
                    channel.started()
                );
            }
        }
    }
    Ok(())
}
