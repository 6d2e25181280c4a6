//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use newsreel_media::{TimelineStrategy, DEFAULT_MUSIC_GAIN};

use crate::error::{WorkerError, WorkerResult};

/// Search terms used when scene footage runs short of the narration.
pub const DEFAULT_FALLBACK_TERMS: &[&str] = &[
    "abstract technology",
    "digital network",
    "futuristic city",
    "data visualization",
];

/// Where task records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Firestore,
}

impl FromStr for StoreBackend {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "firestore" => Ok(StoreBackend::Firestore),
            other => Err(WorkerError::config_error(format!("unknown store backend: {}", other))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch space; one subdirectory per task
    pub work_dir: PathBuf,
    /// Finished artifacts land here as `FINAL_<task id>.mp4`
    pub output_dir: PathBuf,
    /// Pause between pipeline cycles
    pub poll_interval: Duration,
    /// Run a single cycle and exit
    pub run_once: bool,
    /// Claims older than this may be taken over by another worker
    pub claim_timeout: Duration,
    /// Maximum concurrent segment normalizations
    pub max_normalize_parallel: usize,
    /// Maximum concurrent asset source searches
    pub max_fetch_parallel: usize,
    pub timeline_strategy: TimelineStrategy,
    /// Fixed seed for asset selection; entropy when unset
    pub selection_seed: Option<u64>,
    /// Background music, skipped when the file does not exist
    pub music_path: Option<PathBuf>,
    pub music_gain: f64,
    pub caption_font: Option<PathBuf>,
    pub keywords_per_scene: usize,
    pub fallback_terms: Vec<String>,
    /// Footage target is narration duration plus this margin
    pub min_footage_margin_secs: f64,
    pub max_fallback_attempts: usize,
    pub store_backend: StoreBackend,
    pub ingest_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/newsreel"),
            output_dir: PathBuf::from("output"),
            poll_interval: Duration::from_secs(15),
            run_once: false,
            claim_timeout: Duration::from_secs(1800),
            max_normalize_parallel: 4,
            max_fetch_parallel: 4,
            timeline_strategy: TimelineStrategy::Uniform,
            selection_seed: None,
            music_path: None,
            music_gain: DEFAULT_MUSIC_GAIN,
            caption_font: None,
            keywords_per_scene: 2,
            fallback_terms: DEFAULT_FALLBACK_TERMS.iter().map(|t| t.to_string()).collect(),
            min_footage_margin_secs: 10.0,
            max_fallback_attempts: 8,
            store_backend: StoreBackend::Memory,
            ingest_enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unparseable numbers fall back to defaults; an unknown timeline
    /// strategy or store backend is a configuration error.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let timeline_strategy = match std::env::var("TIMELINE_STRATEGY") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| WorkerError::config_error(format!("{}", e)))?,
            Err(_) => defaults.timeline_strategy,
        };
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store_backend,
        };
        let fallback_terms = std::env::var("FALLBACK_TERMS")
            .ok()
            .map(|raw| split_list(&raw))
            .filter(|terms| !terms.is_empty())
            .unwrap_or(defaults.fallback_terms);

        Ok(Self {
            work_dir: env_path("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            output_dir: env_path("WORKER_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            poll_interval: Duration::from_secs(
                env_parse("WORKER_POLL_INTERVAL_SECS").unwrap_or(defaults.poll_interval.as_secs()),
            ),
            run_once: env_flag("WORKER_RUN_ONCE").unwrap_or(defaults.run_once),
            claim_timeout: Duration::from_secs(
                env_parse("WORKER_CLAIM_TIMEOUT_SECS").unwrap_or(defaults.claim_timeout.as_secs()),
            ),
            max_normalize_parallel: env_parse("WORKER_MAX_NORMALIZE_PARALLEL")
                .unwrap_or(defaults.max_normalize_parallel),
            max_fetch_parallel: env_parse("WORKER_MAX_FETCH_PARALLEL")
                .unwrap_or(defaults.max_fetch_parallel),
            timeline_strategy,
            selection_seed: env_parse("SELECTION_SEED"),
            music_path: env_path("MUSIC_PATH"),
            music_gain: env_parse("MUSIC_GAIN").unwrap_or(defaults.music_gain),
            caption_font: env_path("CAPTION_FONT"),
            keywords_per_scene: env_parse("KEYWORDS_PER_SCENE").unwrap_or(defaults.keywords_per_scene),
            fallback_terms,
            min_footage_margin_secs: env_parse("MIN_FOOTAGE_MARGIN_SECS")
                .unwrap_or(defaults.min_footage_margin_secs),
            max_fallback_attempts: env_parse("MAX_FALLBACK_ATTEMPTS")
                .unwrap_or(defaults.max_fallback_attempts),
            store_backend,
            ingest_enabled: env_flag("INGEST_ENABLED").unwrap_or(defaults.ingest_enabled),
        })
    }

    /// Scratch directory for one task.
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.work_dir.join(task_id)
    }

    /// Final artifact path for one task.
    pub fn output_path(&self, task_id: &str) -> PathBuf {
        self.output_dir.join(format!("FINAL_{}.mp4", task_id))
    }
}

/// Local Ollama chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            timeout: Duration::from_secs(180),
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OLLAMA_URL").unwrap_or(defaults.base_url),
            model: std::env::var("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(
                env_parse("OLLAMA_TIMEOUT_SECS").unwrap_or(defaults.timeout.as_secs()),
            ),
        }
    }
}

/// `edge-tts` command line settings.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub binary: String,
    pub voice: String,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            binary: "edge-tts".to_string(),
            voice: "en-US-ChristopherNeural".to_string(),
            timeout_secs: 300,
        }
    }
}

impl TtsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var("EDGE_TTS_BIN").unwrap_or(defaults.binary),
            voice: std::env::var("TTS_VOICE").unwrap_or(defaults.voice),
            timeout_secs: env_parse("TTS_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Pixabay stock media API.
#[derive(Debug, Clone)]
pub struct PixabayConfig {
    pub api_key: String,
    pub base_url: String,
    pub per_page: u32,
    /// Also search stills, which get a slow zoom when placed
    pub include_images: bool,
}

impl PixabayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://pixabay.com/api".to_string(),
            per_page: 5,
            include_images: false,
        }
    }

    /// Requires `PIXABAY_API_KEY`.
    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("PIXABAY_API_KEY")
            .map_err(|_| WorkerError::config_error("PIXABAY_API_KEY not set"))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("PIXABAY_URL") {
            config.base_url = base_url;
        }
        config.per_page = env_parse("PIXABAY_PER_PAGE").unwrap_or(config.per_page);
        config.include_images = env_flag("PIXABAY_INCLUDE_IMAGES").unwrap_or(config.include_images);
        Ok(config)
    }
}

/// Hacker News JSON API.
#[derive(Debug, Clone)]
pub struct HackerNewsConfig {
    pub base_url: String,
    /// Top stories inspected per ingest run
    pub max_items: usize,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hacker-news.firebaseio.com/v0".to_string(),
            max_items: 10,
        }
    }
}

impl HackerNewsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("HN_API_URL").unwrap_or(defaults.base_url),
            max_items: env_parse("HN_MAX_ITEMS").unwrap_or(defaults.max_items),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
