//! Task module - pages, generation context, and the task state store

pub mod store;

use serde::{Deserialize, Serialize};

/// Structural role of a page within an outline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Cover,
    Intro,
    Content,
    Summary,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Intro => "intro",
            Self::Content => "content",
            Self::Summary => "summary",
        }
    }
}

/// One structural unit of the outline, requiring exactly one image
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page {
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: PageKind,
    pub content: String,
}

/// Visual style tag applied to every image of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    Tech,
    #[default]
    Flat,
    Minimal,
    Photo,
    Sketch,
    Infographic,
    Cinematic,
    Brand,
}

impl ImageStyle {
    /// Parse a style tag, falling back to `Flat` for anything unknown
    pub fn parse_or_default(tag: &str) -> Self {
        match tag {
            "tech" => Self::Tech,
            "flat" => Self::Flat,
            "minimal" => Self::Minimal,
            "photo" => Self::Photo,
            "sketch" => Self::Sketch,
            "infographic" => Self::Infographic,
            "cinematic" => Self::Cinematic,
            "brand" => Self::Brand,
            _ => Self::Flat,
        }
    }

    /// The descriptive phrase injected into image prompts
    pub fn descriptive_phrase(&self) -> &'static str {
        match self {
            Self::Tech => {
                "futuristic tech style, blue tones, abstract data streams and AI \
                 interface visuals, clean background, neon glow accents"
            }
            Self::Flat => {
                "flat illustration style, simple shapes, soft color palette, \
                 friendly and approachable, suited to instructional content"
            }
            Self::Minimal => {
                "minimalist style, white or light background, a single visual \
                 subject, modern design with generous negative space"
            }
            Self::Photo => {
                "realistic photographic style, natural lighting, real-world \
                 scenes, high production quality, strong sense of place"
            }
            Self::Sketch => {
                "hand-drawn sketch style, loose linework like classroom notes \
                 or whiteboard drawings, warm and informal"
            }
            Self::Infographic => {
                "infographic style, clearly separated sections, visualized \
                 processes and key points, structured for teaching"
            }
            Self::Cinematic => {
                "cinematic style, warm lighting, narrative scene composition \
                 like a film still, emotionally evocative"
            }
            Self::Brand => {
                "brand-consistent style, fixed color palette and visual \
                 language, clean composition, professional and reusable"
            }
        }
    }
}

/// Caller-supplied context for one generation run
#[derive(Debug, Clone, Default)]
pub struct OutlineContext {
    /// Full outline text, kept in prompts for style consistency
    pub full_outline: String,
    /// User-uploaded reference images (raw bytes, compressed on intake)
    pub user_images: Vec<Vec<u8>>,
    /// The user's original topic request
    pub user_topic: String,
    pub style: ImageStyle,
}
