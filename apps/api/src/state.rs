use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Config;
use crate::resumes::UploadPolicy;
use crate::storage::BlobStore;
use crate::tailoring::Tailor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth: Arc<AuthService>,
    /// Per-user resume files. S3 in production, in-memory in tests.
    pub blobs: Arc<dyn BlobStore>,
    pub tailor: Arc<dyn Tailor>,
}

impl AppState {
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.config.max_upload_bytes,
            allowed_types: self.config.allowed_file_types.clone(),
        }
    }
}
