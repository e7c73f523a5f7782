use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// File extensions recognized as playable source material.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "m4v", "webm", "ts"];

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub paths: PathsSection,
    pub transcode: TranscodeSection,
}

#[derive(Debug, Clone)]
pub struct PathsSection {
    pub cache_dir: PathBuf,
    pub channel_list: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TranscodeSection {
    pub segment_seconds: u32,
    pub width: u32,
    pub height: u32,
    pub video_codec: String,
    pub preset: String,
    pub quality: String,
    pub video_filter: Option<String>,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_dir = lookup("CACHE_DIR").unwrap_or_else(|| "cache".into());
        let channel_list = lookup("CHANNEL_LIST").unwrap_or_else(|| "channels.json".into());
        let segment_seconds = parse_var(&lookup, "HLS_SEGMENT_LENGTH_SECONDS", 6u32)?;
        let (width, height) = parse_dimensions(
            lookup("DIMENSIONS").unwrap_or_else(|| "1280x720".into()),
        )?;
        Ok(Self {
            paths: PathsSection {
                cache_dir: PathBuf::from(cache_dir),
                channel_list: PathBuf::from(channel_list),
                ffmpeg: PathBuf::from(lookup("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".into())),
                ffprobe: PathBuf::from(lookup("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".into())),
            },
            transcode: TranscodeSection {
                segment_seconds,
                width,
                height,
                video_codec: lookup("VIDEO_CODEC").unwrap_or_else(|| "libx264".into()),
                preset: lookup("PRESET").unwrap_or_else(|| "veryfast".into()),
                quality: lookup("QUALITY").unwrap_or_else(|| "23".into()),
                video_filter: lookup("VIDEO_FILTER").filter(|value| !value.is_empty()),
                audio_codec: lookup("AUDIO_CODEC").unwrap_or_else(|| "aac".into()),
                audio_bitrate: lookup("AUDIO_BITRATE").unwrap_or_else(|| "128k".into()),
            },
        })
    }

    /// Create the cache root. This is the only startup step allowed to be fatal.
    pub fn ensure_cache_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.cache_dir).map_err(|source| ConfigError::CacheRoot {
            source,
            path: self.paths.cache_dir.clone(),
        })
    }
}

pub fn is_supported_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value: raw }),
    }
}

fn parse_dimensions(raw: String) -> Result<(u32, u32)> {
    let parsed = raw
        .split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
    match parsed {
        Some((w, h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(ConfigError::Env {
            var: "DIMENSIONS",
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            pairs
                .iter()
                .find(|(name, _)| *name == var)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.paths.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.transcode.segment_seconds, 6);
        assert_eq!((config.transcode.width, config.transcode.height), (1280, 720));
        assert_eq!(config.transcode.video_codec, "libx264");
        assert!(config.transcode.video_filter.is_none());
    }

    #[test]
    fn overrides_are_honored() {
        let vars = [
            ("CACHE_DIR", "/srv/telecast"),
            ("HLS_SEGMENT_LENGTH_SECONDS", "4"),
            ("DIMENSIONS", "1920x1080"),
            ("VIDEO_FILTER", "yadif"),
        ];
        let config = EngineConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.paths.cache_dir, PathBuf::from("/srv/telecast"));
        assert_eq!(config.transcode.segment_seconds, 4);
        assert_eq!((config.transcode.width, config.transcode.height), (1920, 1080));
        assert_eq!(config.transcode.video_filter.as_deref(), Some("yadif"));
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        let vars = [("DIMENSIONS", "widescreen")];
        let err = EngineConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "DIMENSIONS", .. }));
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_source(Path::new("/media/show/Episode.MKV")));
        assert!(is_supported_source(Path::new("clip.mp4")));
        assert!(!is_supported_source(Path::new("notes.txt")));
        assert!(!is_supported_source(Path::new("bare")));
    }
}
