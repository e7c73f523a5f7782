pub mod bundle;
pub mod channel;
pub mod clock;
pub mod config;
pub mod definitions;
pub mod error;
pub mod guide;
pub mod playlist;
pub mod program;
pub mod scheduler;
pub mod transcode;

pub use bundle::{
    fingerprint, BundleError, BundleMetadata, BundleResult, BundleStatus, BundleStore,
    ChannelManifest, IndexedSegment, ManifestEntry,
};
pub use channel::{manifest_for, Channel, ChannelPool, ManifestResponse};
pub use config::{EngineConfig, PathsSection, TranscodeSection, SUPPORTED_EXTENSIONS};
pub use definitions::{
    load_definitions, load_or_create_definitions, ChannelDefinition, ChannelKind,
    DefinitionsWatcher,
};
pub use error::{ConfigError, Result};
pub use guide::{build_schedule, GuideCache, ScheduleEntry};
pub use playlist::{render, WINDOW_AHEAD, WINDOW_BEHIND};
pub use program::{compile, CompiledProgram, CompiledSource, SegmentRecord};
pub use scheduler::{GenerationScheduler, Progress};
pub use transcode::{
    SystemTranscoder, TranscodeExit, TranscodeOutcome, TranscodeResult, TranscodeWorker,
    TranscoderInvoker,
};
