use clap::Args;
use telecast_core::GuideCache;

use super::Services;
use crate::{AppError, OutputFormat, Result};

#[derive(Args, Debug)]
pub struct GuideArgs {
    /// Channel slug
    pub slug: String,
}

pub fn execute(args: GuideArgs, format: OutputFormat) -> Result<()> {
    let services = Services::bootstrap()?;
    if services.pool.get(&args.slug).is_none() {
        return Err(AppError::UnknownChannel(args.slug));
    }
    let cache = GuideCache::new();
    let entries = cache
        .get(&services.pool, &services.store, &args.slug)
        .unwrap_or_default();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries.as_ref())?),
        OutputFormat::Text => {
            for entry in entries.iter() {
                println!(
                    "{} {} - {}  {:<30} {}",
                    if entry.is_current { ">" } else { " " },
                    entry.start.format("%H:%M"),
                    entry.end.format("%H:%M"),
                    entry.title,
                    format_duration(entry.duration_seconds)
                );
            }
        }
    }
    Ok(())
}

fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}
