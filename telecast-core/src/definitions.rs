use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Sequential,
    Shuffle,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelDefinition {
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub name: String,
    pub slug: String,
    pub paths: Vec<PathBuf>,
}

impl ChannelDefinition {
    fn validate(&self) -> Result<()> {
        if self.slug.is_empty() {
            return Err(ConfigError::InvalidDefinition {
                slug: self.slug.clone(),
                reason: "slug must not be empty".into(),
            });
        }
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidDefinition {
                slug: self.slug.clone(),
                reason: "slug must be URL-safe ([A-Za-z0-9_-])".into(),
            });
        }
        Ok(())
    }
}

fn default_definitions() -> Vec<ChannelDefinition> {
    vec![ChannelDefinition {
        kind: ChannelKind::Shuffle,
        name: "Example Channel".into(),
        slug: "example".into(),
        paths: vec![PathBuf::from("/media")],
    }]
}

/// Load the channel-definitions file, creating it with the default single
/// channel when missing.
pub fn load_or_create_definitions(path: &Path) -> Result<Vec<ChannelDefinition>> {
    if !path.exists() {
        let defaults = default_definitions();
        let body = serde_json::to_vec_pretty(&defaults).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })?;
        std::fs::write(path, body).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        info!(path = %path.display(), "created default channel definitions");
        return Ok(defaults);
    }
    load_definitions(path)
}

pub fn load_definitions(path: &Path) -> Result<Vec<ChannelDefinition>> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let definitions: Vec<ChannelDefinition> =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })?;
    let mut seen = Vec::with_capacity(definitions.len());
    for definition in &definitions {
        definition.validate()?;
        if seen.contains(&definition.slug) {
            return Err(ConfigError::InvalidDefinition {
                slug: definition.slug.clone(),
                reason: "duplicate slug".into(),
            });
        }
        seen.push(definition.slug.clone());
    }
    Ok(definitions)
}

/// Watches the definitions file by polling its modification time.
///
/// Polling is deliberate: filesystem notification is unreliable on networked
/// mounts, and a five-minute reload latency is acceptable.
pub struct DefinitionsWatcher {
    path: PathBuf,
    interval: Duration,
    last_modified: Option<SystemTime>,
}

impl DefinitionsWatcher {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let last_modified = modified_at(&path)?;
        Ok(Self {
            path,
            interval: DEFAULT_POLL_INTERVAL,
            last_modified,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One poll step: true when the file's mtime moved since the last call.
    pub fn poll(&mut self) -> bool {
        let current = match modified_at(&self.path) {
            Ok(value) => value,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to stat channel definitions");
                return false;
            }
        };
        if current != self.last_modified {
            self.last_modified = current;
            return true;
        }
        false
    }

    /// Poll forever, invoking `on_change` after each detected modification.
    pub async fn run<F, Fut>(mut self, on_change: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            tokio::time::sleep(self.interval).await;
            if self.poll() {
                info!(path = %self.path.display(), "channel definitions changed, reloading");
                on_change().await;
            }
        }
    }
}

fn modified_at(path: &Path) -> io::Result<Option<SystemTime>> {
    match std::fs::metadata(path) {
        Ok(metadata) => metadata.modified().map(Some),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}
