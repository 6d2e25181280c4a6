//! Newsreel pipeline worker.
//!
//! Turns headlines into narrated vertical videos through five stages:
//! ingest, script, voice, visuals and assemble. Each stage claims one task
//! from the task board per cycle; the binary runs cycles until shut down.

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod narrator;
pub mod news;
pub mod pipeline;
pub mod sources;
pub mod stages;
pub mod writer;

pub use config::{
    HackerNewsConfig, OllamaConfig, PixabayConfig, StoreBackend, TtsConfig, WorkerConfig,
};
pub use download::{AssetFetcher, HttpFetcher};
pub use error::{WorkerError, WorkerResult};
pub use logging::TaskLogger;
pub use narrator::{EdgeTtsNarrator, Narrator};
pub use news::{HackerNewsSource, NewsItem, NewsSource};
pub use pipeline::{Collaborators, CycleReport, Pipeline};
pub use sources::{AssetCandidate, AssetSource, PixabayImageSource, PixabayVideoSource};
pub use stages::{Stage, StageOutcome};
pub use writer::{OllamaScriptWriter, ScriptDraft, ScriptWriter};
