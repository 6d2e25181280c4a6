//! Narration script and scene generation.
//!
//! [`OllamaScriptWriter`] talks to a local Ollama server. The first chat
//! call runs in JSON mode and must return an object with a `script` key;
//! the second asks for one visual description per line, which become the
//! task's scenes.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use newsreel_models::ingest::{normalize_scenes, normalize_script, parse_scene_lines};
use newsreel_models::Scene;

use crate::config::OllamaConfig;
use crate::error::{WorkerError, WorkerResult};

/// Most scenes requested per script.
pub const MAX_SCENES: usize = 8;

/// Output of a script writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptDraft {
    pub script: String,
    pub scenes: Vec<Scene>,
}

/// Turns a story into narration plus scene descriptions.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write(&self, title: &str, source_text: &str) -> WorkerResult<ScriptDraft>;
}

/// [`ScriptWriter`] backed by the Ollama chat API.
pub struct OllamaScriptWriter {
    config: OllamaConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaScriptWriter {
    pub fn new(config: OllamaConfig) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn script_prompt(source_text: &str) -> String {
        format!(
            r#"You are a tech news narrator.
SOURCE: "{}"

Write a script of about 130 words (50 seconds spoken) summarizing this news for a short video.
Write only the spoken words of a single narrator talking to the audience: no stage directions,
no speaker names, no scene headings. Open with a hook, explain what happened, close with why it matters.

Respond with a JSON object with a "script" key."#,
            source_text
        )
    }

    fn scene_prompt(script: &str) -> String {
        format!(
            r#"Script: "{}"

Write {} visual image descriptions to match this script.
One description per line, describing only the image. No numbers or bullet points."#,
            script, MAX_SCENES
        )
    }

    async fn chat(&self, prompt: &str, format: Option<&str>) -> WorkerResult<String> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            format,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::script_failed(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::script_failed(format!(
                "Ollama returned {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::script_failed(format!("Failed to parse Ollama response: {}", e)))?;
        Ok(chat.message.content)
    }
}

#[async_trait]
impl ScriptWriter for OllamaScriptWriter {
    async fn write(&self, title: &str, source_text: &str) -> WorkerResult<ScriptDraft> {
        info!(model = %self.config.model, "Generating script for: {}", title);

        let raw = self.chat(&Self::script_prompt(source_text), Some("json")).await?;
        let payload: Value = serde_json::from_str(raw.trim())
            .map_err(|e| WorkerError::script_failed(format!("Script is not JSON: {}", e)))?;
        let script = normalize_script(&payload)?;

        let raw_scenes = self.chat(&Self::scene_prompt(&script), None).await?;
        let lines = parse_scene_lines(&raw_scenes, MAX_SCENES);
        debug!(lines = lines.len(), "Parsed scene descriptions");

        let scenes = normalize_scenes(Value::Array(
            lines
                .iter()
                .enumerate()
                .map(|(i, line)| json!({ "scene_number": i + 1, "image_prompt": line }))
                .collect(),
        ));

        Ok(ScriptDraft { script, scenes })
    }
}
