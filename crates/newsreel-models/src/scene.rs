//! Scenes and the visual assets gathered for them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Intended narrative role of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneRole {
    /// Opening beat that grabs attention
    Hook,
    #[default]
    Body,
    /// Closing beat
    CallToAction,
}

impl SceneRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneRole::Hook => "hook",
            SceneRole::Body => "body",
            SceneRole::CallToAction => "call_to_action",
        }
    }

    /// Role assigned by position within a script of `count` scenes.
    pub fn for_position(index: usize, count: usize) -> Self {
        if index == 0 {
            SceneRole::Hook
        } else if count >= 3 && index + 1 == count {
            SceneRole::CallToAction
        } else {
            SceneRole::Body
        }
    }
}

impl fmt::Display for SceneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One narrative beat. Immutable once the script stage has written it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Ordinal position, dense from 0
    pub index: usize,
    /// Stock-footage search keywords, most relevant first
    pub keywords: Vec<String>,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub role: SceneRole,
}

impl Scene {
    pub fn new(index: usize, keywords: Vec<String>) -> Self {
        Self {
            index,
            keywords,
            image_prompt: None,
            role: SceneRole::Body,
        }
    }

    pub fn with_image_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.image_prompt = Some(prompt.into());
        self
    }

    pub fn with_role(mut self, role: SceneRole) -> Self {
        self.role = role;
        self
    }

    /// Search terms to try, capped at `limit`.
    pub fn search_terms(&self, limit: usize) -> Vec<String> {
        let mut terms: Vec<String> = self.keywords.iter().take(limit).cloned().collect();
        if terms.is_empty() {
            if let Some(prompt) = &self.image_prompt {
                terms.push(prompt.clone());
            }
        }
        terms
    }
}

/// Kind of a visual asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Has intrinsic duration, may need looping or trimming
    Clip,
    /// Infinite effective duration, gets synthetic motion
    Image,
}

impl AssetKind {
    const IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png", "webp", "bmp"];

    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Image)
        } else {
            Some(AssetKind::Clip)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Clip => "clip",
            AssetKind::Image => "image",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A downloaded or generated visual on local disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisualAsset {
    pub path: PathBuf,
    pub kind: AssetKind,
    /// Native duration in seconds (0 for images)
    #[serde(default)]
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl VisualAsset {
    pub fn clip(path: impl Into<PathBuf>, duration: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Clip,
            duration,
            width,
            height,
        }
    }

    pub fn image(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Image,
            duration: 0.0,
            width,
            height,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == AssetKind::Image
    }

    /// Has a picture size and, for clips, a positive duration.
    pub fn is_usable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && (self.is_image() || (self.duration.is_finite() && self.duration > 0.0))
    }
}

/// Assets gathered for one scene. An exhausted scene keeps an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisualScene {
    pub scene_index: usize,
    #[serde(default)]
    pub assets: Vec<VisualAsset>,
}

impl VisualScene {
    pub fn new(scene_index: usize, assets: Vec<VisualAsset>) -> Self {
        Self { scene_index, assets }
    }

    pub fn is_exhausted(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_by_position() {
        assert_eq!(SceneRole::for_position(0, 5), SceneRole::Hook);
        assert_eq!(SceneRole::for_position(2, 5), SceneRole::Body);
        assert_eq!(SceneRole::for_position(4, 5), SceneRole::CallToAction);
        // two-scene scripts have no call to action
        assert_eq!(SceneRole::for_position(1, 2), SceneRole::Body);
    }

    #[test]
    fn test_asset_kind_from_path() {
        assert_eq!(AssetKind::from_path(Path::new("a/b.JPG")), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_path(Path::new("clip.mp4")), Some(AssetKind::Clip));
        assert_eq!(AssetKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_usable_assets() {
        assert!(VisualAsset::clip("a.mp4", 5.0, 1920, 1080).is_usable());
        assert!(VisualAsset::image("a.png", 800, 600).is_usable());
        assert!(!VisualAsset::clip("a.mp4", 0.0, 1920, 1080).is_usable());
        assert!(!VisualAsset::image("a.png", 0, 600).is_usable());
    }

    #[test]
    fn test_search_terms_fall_back_to_prompt() {
        let scene = Scene::new(0, vec![]).with_image_prompt("city skyline at night");
        assert_eq!(scene.search_terms(2), vec!["city skyline at night".to_string()]);

        let scene = Scene::new(1, vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(scene.search_terms(2).len(), 2);
    }
}
