//! Data models and structures used throughout the application

use serde::{Deserialize, Serialize};

/// Reserved style id for user-authored prompt text. Never used by a preset.
pub const CUSTOM_STYLE_ID: &str = "custom";

/// Lifecycle status of a single sticker job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Idle,
    Processing,
    Completed,
    Failed,
}

/// One image's end-to-end processing unit, from source bytes to result or error
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub original: Vec<u8>,
    /// Present only if the user drew on the annotation canvas (PNG bytes)
    pub annotated: Option<Vec<u8>>,
    pub result: Option<Vec<u8>>,
    pub status: ProcessingStatus,
    pub error: Option<String>,
    pub width: u32,
    pub height: u32,
    pub created_at: String,
}

impl Job {
    /// The image the dispatcher should send: the annotated version wins.
    pub fn effective_input(&self) -> &[u8] {
        self.annotated.as_deref().unwrap_or(&self.original)
    }

    pub fn has_annotation(&self) -> bool {
        self.annotated.is_some()
    }
}

/// Webview-facing summary of a job. Image bytes are fetched separately
/// through `get_job_preview` so state refreshes stay small.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: String,
    pub file_name: String,
    pub status: ProcessingStatus,
    pub error: Option<String>,
    pub has_annotation: bool,
    pub has_result: bool,
    pub width: u32,
    pub height: u32,
    pub created_at: String,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            file_name: job.file_name.clone(),
            status: job.status,
            error: job.error.clone(),
            has_annotation: job.annotated.is_some(),
            has_result: job.result.is_some(),
            width: job.width,
            height: job.height,
            created_at: job.created_at.clone(),
        }
    }
}

/// A freshly uploaded file, before it becomes a job
#[derive(Debug, Clone, Deserialize)]
pub struct NewUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// The style applied to every job in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StyleSelection {
    /// Keep the subject as-is; only cut it out
    Faithful,
    /// An artistic or thematic preset, resolved by its stable id
    Preset { id: String },
    /// User-authored prompt text, used verbatim
    Custom { text: String },
}

impl Default for StyleSelection {
    fn default() -> Self {
        StyleSelection::Faithful
    }
}

impl StyleSelection {
    /// Stable identifier used for fragment resolution and caching.
    pub fn style_id(&self) -> &str {
        match self {
            StyleSelection::Faithful => "faithful",
            StyleSelection::Preset { id } => id,
            StyleSelection::Custom { .. } => CUSTOM_STYLE_ID,
        }
    }
}

/// Catalog grouping for the style picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleGroup {
    Faithful,
    Artistic,
    Thematic,
}

/// One entry in the style catalog shown by the webview
#[derive(Debug, Clone, Serialize)]
pub struct StylePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub group: StyleGroup,
    pub preview_color: &'static str,
}

/// Terminal result of one job's remote generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success { data: Vec<u8> },
    Failure { error: String },
}
