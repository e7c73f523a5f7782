use chrono::Utc;
use clap::Args;
use telecast_core::{manifest_for, ManifestResponse};

use super::Services;
use crate::{AppError, Result};

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Channel slug
    pub slug: String,
    /// Render at this offset in seconds since the channel epoch instead of
    /// the channel's live position
    #[arg(long)]
    pub offset: Option<f64>,
}

pub fn execute(args: ManifestArgs) -> Result<()> {
    let services = Services::bootstrap()?;
    if let Some(offset) = args.offset {
        let channel = services
            .pool
            .get(&args.slug)
            .ok_or_else(|| AppError::UnknownChannel(args.slug.clone()))?;
        print!("{}", telecast_core::render(&channel.compiled(), offset));
        return Ok(());
    }
    match manifest_for(&services.pool, &args.slug, Utc::now()) {
        ManifestResponse::Live(body) => {
            print!("{body}");
            Ok(())
        }
        ManifestResponse::UnknownChannel => Err(AppError::UnknownChannel(args.slug)),
        ManifestResponse::NotStarted => Err(AppError::ChannelNotStarted(args.slug)),
    }
}
