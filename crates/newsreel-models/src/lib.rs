//! Shared data models for the Newsreel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Tasks and their lifecycle status
//! - Scenes and gathered visual assets
//! - Transcripts with word-level timing
//! - Timeline segments, captions and their styling
//! - Encoding configuration

pub mod encoding;
pub mod error;
pub mod ingest;
pub mod scene;
pub mod task;
pub mod timeline;
pub mod transcript;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use scene::{AssetKind, Scene, SceneRole, VisualAsset, VisualScene};
pub use task::{Narration, Task, TaskClaim, TaskFailure, TaskId, TaskStatus, TaskStatusParseError};
pub use timeline::{
    CanvasFit, CanvasSize, CaptionEvent, CaptionPosition, CaptionStyle, HorizontalAnchor,
    Playback, SegmentTransform, TimelineSegment, ZoomPolicy,
};
pub use transcript::{Transcript, TranscriptSegment, TranscriptWord};
