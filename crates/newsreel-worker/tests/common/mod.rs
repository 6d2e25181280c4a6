//! In-process fakes for every pipeline collaborator.
//!
//! Downloads write a tiny marker file whose content tells the fake probe
//! what the "media" is: `clip:<seconds>` or `image`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use newsreel_media::{
    Compositor, MediaError, MediaInfo, MediaProbe, MediaResult, NormalizeRequest, NormalizedSegment,
    RenderJob, RenderOutput, SegmentNormalizer, SpeechToText,
};
use newsreel_models::{
    AssetKind, CanvasSize, Narration, Scene, Transcript, TranscriptSegment, TranscriptWord,
};
use newsreel_store::{MemoryTaskStore, TaskBoard};
use newsreel_worker::{
    AssetCandidate, AssetFetcher, AssetSource, Collaborators, NewsItem, NewsSource, Narrator, ScriptDraft,
    ScriptWriter, WorkerConfig, WorkerError, WorkerResult,
};

pub struct FakeNews(pub Vec<NewsItem>);

#[async_trait]
impl NewsSource for FakeNews {
    fn name(&self) -> &str {
        "fake_news"
    }

    async fn headlines(&self) -> WorkerResult<Vec<NewsItem>> {
        Ok(self.0.clone())
    }
}

/// Returns `scenes` keyword lists as scenes, or an error when `fail` is set.
pub struct FakeWriter {
    pub scenes: Vec<Vec<&'static str>>,
    pub fail: bool,
}

#[async_trait]
impl ScriptWriter for FakeWriter {
    async fn write(&self, title: &str, _source_text: &str) -> WorkerResult<ScriptDraft> {
        if self.fail {
            return Err(WorkerError::script_failed("model unavailable"));
        }
        let scenes = self
            .scenes
            .iter()
            .enumerate()
            .map(|(i, keywords)| Scene::new(i, keywords.iter().map(|k| k.to_string()).collect()))
            .collect();
        Ok(ScriptDraft {
            script: format!("Big news about {}.", title),
            scenes,
        })
    }
}

pub struct FakeNarrator {
    pub duration: f64,
}

#[async_trait]
impl Narrator for FakeNarrator {
    async fn narrate(&self, _script: &str, output: &Path) -> WorkerResult<Narration> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"mp3")?;
        Ok(Narration {
            path: output.to_path_buf(),
            duration: self.duration,
        })
    }
}

/// Maps search terms to candidate URLs like `fake://clip/8` or `fake://broken/1`.
pub struct FakeSource {
    pub name: &'static str,
    pub results: HashMap<String, Vec<String>>,
    pub searches: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(name: &'static str, results: &[(&str, &[&str])]) -> Self {
        Self {
            name,
            results: results
                .iter()
                .map(|(term, urls)| (term.to_string(), urls.iter().map(|u| u.to_string()).collect()))
                .collect(),
            searches: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AssetSource for FakeSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(&self, term: &str) -> WorkerResult<Vec<AssetCandidate>> {
        self.searches.lock().unwrap().push(term.to_string());
        Ok(self
            .results
            .get(term)
            .map(|urls| {
                urls.iter()
                    .map(|url| AssetCandidate {
                        url: url.clone(),
                        kind: if url.contains("image") { AssetKind::Image } else { AssetKind::Clip },
                        source: self.name.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Fails every URL containing `broken`, like a network error.
#[derive(Default)]
pub struct FakeFetcher {
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<()> {
        self.fetched.lock().unwrap().push(url.to_string());
        if url.contains("broken") {
            return Err(WorkerError::asset(format!("connection reset fetching {}", url)));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let marker = match url.strip_prefix("fake://clip/") {
            Some(seconds) => format!("clip:{}", seconds),
            None => "image".to_string(),
        };
        std::fs::write(dest, marker)?;
        Ok(())
    }
}

pub struct FakeProbe;

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let marker = std::fs::read_to_string(path).map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
        let info = match marker.strip_prefix("clip:") {
            Some(seconds) => MediaInfo {
                duration: seconds.parse().unwrap_or(0.0),
                width: 1280,
                height: 720,
                fps: 30.0,
                codec: "h264".into(),
                format_name: "mov,mp4,m4a,3gp,3g2,mj2".into(),
                has_video: true,
                has_audio: false,
                size: 3,
            },
            None => MediaInfo {
                duration: 0.0,
                width: 1920,
                height: 1280,
                fps: 25.0,
                codec: "mjpeg".into(),
                format_name: "image2".into(),
                has_video: true,
                has_audio: false,
                size: 5,
            },
        };
        Ok(info)
    }
}

/// Two sentences of two words each.
pub struct FakeSpeech {
    pub fail: bool,
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, audio: &Path) -> MediaResult<Transcript> {
        if self.fail {
            return Err(MediaError::transcription_failed(audio, "no speech detected"));
        }
        Ok(Transcript::new(vec![
            TranscriptSegment {
                start: 0.0,
                end: 1.2,
                text: "Breaking news.".into(),
                words: vec![
                    TranscriptWord::new("Breaking", 0.50, 0.48),
                    TranscriptWord::new("news.", 0.6, 1.1),
                ],
            },
            TranscriptSegment {
                start: 12.4,
                end: 14.0,
                text: "Markets rally.".into(),
                words: vec![
                    TranscriptWord::new("Markets", 12.4, 13.0),
                    TranscriptWord::new("rally.", 13.0, 14.0),
                ],
            },
        ]))
    }
}

#[derive(Default)]
pub struct FakeNormalizer {
    pub requests: Mutex<Vec<NormalizeRequest>>,
}

#[async_trait]
impl SegmentNormalizer for FakeNormalizer {
    async fn normalize(&self, request: &NormalizeRequest) -> MediaResult<NormalizedSegment> {
        self.requests.lock().unwrap().push(request.clone());
        std::fs::write(&request.output, b"segment")?;
        Ok(NormalizedSegment {
            path: request.output.clone(),
            duration: request.duration,
        })
    }
}

/// Records jobs; with `fail` set it writes a partial file and errors.
#[derive(Default)]
pub struct FakeCompositor {
    pub jobs: Mutex<Vec<RenderJob>>,
    pub fail: bool,
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn render(&self, job: &RenderJob) -> MediaResult<RenderOutput> {
        self.jobs.lock().unwrap().push(job.clone());
        std::fs::write(&job.output, b"partial")?;
        if self.fail {
            return Err(MediaError::render_failed(&job.output, "muxer exploded"));
        }
        Ok(RenderOutput {
            path: job.output.clone(),
            duration: job.total_duration,
            size_bytes: 7,
        })
    }
}

/// Store, board, config and fakes for one test.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<MemoryTaskStore>,
    pub board: TaskBoard,
    pub config: Arc<WorkerConfig>,
    pub source: Arc<FakeSource>,
    pub fetcher: Arc<FakeFetcher>,
    pub normalizer: Arc<FakeNormalizer>,
    pub compositor: Arc<FakeCompositor>,
}

impl Harness {
    pub fn new(source: FakeSource) -> Self {
        Self::with_config(source, |_| {})
    }

    pub fn with_config(source: FakeSource, tweak: impl FnOnce(&mut WorkerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WorkerConfig {
            work_dir: dir.path().join("work"),
            output_dir: dir.path().join("output"),
            selection_seed: Some(7),
            ..Default::default()
        };
        tweak(&mut config);

        let store = Arc::new(MemoryTaskStore::new());
        Self {
            board: TaskBoard::new(store.clone()),
            store,
            config: Arc::new(config),
            source: Arc::new(source),
            fetcher: Arc::new(FakeFetcher::default()),
            normalizer: Arc::new(FakeNormalizer::default()),
            compositor: Arc::new(FakeCompositor::default()),
            dir,
        }
    }

    pub fn collaborators(&self, writer: FakeWriter, narration_secs: f64, speech_fails: bool) -> Collaborators {
        Collaborators {
            news: Some(Arc::new(FakeNews(vec![
                NewsItem::new("Chip shortage eases - Reuters").with_url("https://example.com/chips"),
            ]))),
            writer: Arc::new(writer),
            narrator: Arc::new(FakeNarrator {
                duration: narration_secs,
            }),
            sources: vec![self.source.clone() as Arc<dyn AssetSource>],
            fetcher: self.fetcher.clone(),
            probe: Arc::new(FakeProbe),
            speech: Arc::new(FakeSpeech { fail: speech_fails }),
            normalizer: self.normalizer.clone(),
            compositor: self.compositor.clone(),
            canvas: CanvasSize::default(),
        }
    }
}
