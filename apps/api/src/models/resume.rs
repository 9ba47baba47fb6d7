use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One uploaded resume as seen by its owner. Stored as the resume's `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSummary {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Summary plus the text extracted at upload time.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeDetail {
    #[serde(flatten)]
    pub summary: ResumeSummary,
    pub extracted_text: String,
}
