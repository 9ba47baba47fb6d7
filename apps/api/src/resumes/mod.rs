//! Per-user resume files.
//!
//! Every resume lives under `resumes/{identity_id}/{resume_id}/` in the blob store:
//! the extracted text at `text.txt`, the original upload at `original/{file_name}`, and
//! its `ResumeSummary` at `meta.json`. `meta.json` is written last and is the only key
//! listings look at, so a partially written resume is never visible.
//! The identity id always comes from the resolved session, so one identity can never
//! address another's keys.

pub mod extract;
pub mod handlers;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeDetail, ResumeSummary};
use crate::storage::BlobStore;

const ORIGINAL_DIR: &str = "original/";
const TEXT_FILE: &str = "text.txt";
const META_FILE: &str = "meta.json";

fn identity_prefix(identity_id: Uuid) -> String {
    format!("resumes/{identity_id}/")
}

fn resume_prefix(identity_id: Uuid, resume_id: Uuid) -> String {
    format!("resumes/{identity_id}/{resume_id}/")
}

fn original_key(prefix: &str, file_name: &str) -> String {
    format!("{prefix}{ORIGINAL_DIR}{file_name}")
}

/// Upload limits taken from configuration.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
}

/// A file name that passed validation.
#[derive(Debug)]
pub struct AcceptedUpload {
    pub file_name: String,
    pub extension: String,
}

impl UploadPolicy {
    pub fn check(&self, raw_file_name: &str, size: usize) -> Result<AcceptedUpload, AppError> {
        let accepted = self.check_name(raw_file_name)?;

        if size == 0 {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if size > self.max_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the {} byte upload limit",
                self.max_bytes
            )));
        }
        Ok(accepted)
    }

    pub fn check_name(&self, raw_file_name: &str) -> Result<AcceptedUpload, AppError> {
        let file_name = sanitize_file_name(raw_file_name)
            .ok_or_else(|| AppError::Validation("A file name is required".to_string()))?;

        let extension = extract::file_extension(&file_name)
            .filter(|ext| self.allowed_types.iter().any(|allowed| allowed == ext))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "File type not allowed; accepted types: {}",
                    self.allowed_types.join(", ")
                ))
            })?;

        Ok(AcceptedUpload {
            file_name,
            extension,
        })
    }
}

/// Reduces a client-supplied name to its final path segment.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name)
}

/// Body of `PUT /api/v1/resumes/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct ResumeUpdate {
    pub file_name: Option<String>,
    pub extracted_text: Option<String>,
}

async fn put_meta(
    blobs: &dyn BlobStore,
    prefix: &str,
    summary: &ResumeSummary,
) -> Result<(), AppError> {
    let body = serde_json::to_vec(summary)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode resume meta: {e}")))?;
    blobs
        .put(
            &format!("{prefix}{META_FILE}"),
            Bytes::from(body),
            "application/json",
        )
        .await?;
    Ok(())
}

/// Best-effort cleanup after a failed multi-object write.
async fn discard_partial(blobs: &dyn BlobStore, prefix: &str) {
    if let Err(e) = blobs.delete_prefix(prefix).await {
        warn!(prefix, "Failed to clean up partial resume: {e}");
    }
}

/// Extracts text, then stores text, original, and meta under a fresh resume id.
pub async fn store_resume(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
    upload: AcceptedUpload,
    body: Bytes,
    now: DateTime<Utc>,
) -> Result<ResumeDetail, AppError> {
    let extracted_text = extract::extract_text(&upload.extension, body.clone()).await?;

    let resume_id = Uuid::new_v4();
    let prefix = resume_prefix(identity_id, resume_id);
    let summary = ResumeSummary {
        id: resume_id,
        file_name: upload.file_name,
        size_bytes: body.len() as u64,
        uploaded_at: now,
        updated_at: None,
    };

    let written = async {
        blobs
            .put(
                &format!("{prefix}{TEXT_FILE}"),
                Bytes::from(extracted_text.clone()),
                "text/plain; charset=utf-8",
            )
            .await?;
        blobs
            .put(
                &original_key(&prefix, &summary.file_name),
                body,
                extract::content_type_for(&upload.extension),
            )
            .await?;
        put_meta(blobs, &prefix, &summary).await
    }
    .await;

    if let Err(e) = written {
        discard_partial(blobs, &prefix).await;
        return Err(e);
    }

    info!(%identity_id, %resume_id, size_bytes = summary.size_bytes, "Resume stored");
    Ok(ResumeDetail {
        summary,
        extracted_text,
    })
}

fn not_found(resume_id: Uuid) -> AppError {
    AppError::NotFound(format!("Resume {resume_id} not found"))
}

async fn load_summary(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
    resume_id: Uuid,
) -> Result<ResumeSummary, AppError> {
    let raw = blobs
        .get(&format!("{}{META_FILE}", resume_prefix(identity_id, resume_id)))
        .await?
        .ok_or_else(|| not_found(resume_id))?;
    let summary: ResumeSummary =
        serde_json::from_slice(&raw).map_err(crate::storage::StoreError::from)?;
    if summary.id != resume_id {
        return Err(crate::storage::StoreError::Corrupt(format!(
            "meta for {resume_id} names resume {}",
            summary.id
        ))
        .into());
    }
    Ok(summary)
}

/// The caller's resumes, newest first.
pub async fn list_resumes(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
) -> Result<Vec<ResumeSummary>, AppError> {
    let prefix = identity_prefix(identity_id);
    let resume_ids: Vec<Uuid> = blobs
        .list(&prefix)
        .await?
        .iter()
        .filter_map(|meta| {
            let (resume_id, file) = meta.key.strip_prefix(&prefix)?.split_once('/')?;
            (file == META_FILE).then(|| Uuid::parse_str(resume_id).ok())?
        })
        .collect();

    let mut resumes = Vec::with_capacity(resume_ids.len());
    for resume_id in resume_ids {
        match load_summary(blobs, identity_id, resume_id).await {
            Ok(summary) => resumes.push(summary),
            // Deleted between list and get.
            Err(AppError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    resumes.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
    Ok(resumes)
}

pub async fn get_resume(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
    resume_id: Uuid,
) -> Result<ResumeDetail, AppError> {
    let summary = load_summary(blobs, identity_id, resume_id).await?;
    let text = blobs
        .get(&format!("{}{TEXT_FILE}", resume_prefix(identity_id, resume_id)))
        .await?
        .ok_or_else(|| not_found(resume_id))?;

    Ok(ResumeDetail {
        summary,
        extracted_text: String::from_utf8_lossy(&text).into_owned(),
    })
}

/// The original upload: its file name and bytes.
pub async fn download_resume(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
    resume_id: Uuid,
) -> Result<(String, Bytes), AppError> {
    let summary = load_summary(blobs, identity_id, resume_id).await?;
    let body = blobs
        .get(&original_key(
            &resume_prefix(identity_id, resume_id),
            &summary.file_name,
        ))
        .await?
        .ok_or_else(|| not_found(resume_id))?;
    Ok((summary.file_name, body))
}

/// Renames the original and/or replaces the extracted text. The extension of a renamed
/// file must stay the same, since it decides how the bytes are served.
pub async fn update_resume(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
    resume_id: Uuid,
    update: ResumeUpdate,
    policy: &UploadPolicy,
    now: DateTime<Utc>,
) -> Result<ResumeDetail, AppError> {
    if update.file_name.is_none() && update.extracted_text.is_none() {
        return Err(AppError::Validation(
            "Provide file_name and/or extracted_text".to_string(),
        ));
    }

    let new_text = match update.extracted_text.as_deref().map(str::trim) {
        Some("") => {
            return Err(AppError::Validation(
                "extracted_text must not be empty".to_string(),
            ))
        }
        other => other.map(str::to_string),
    };

    let mut summary = load_summary(blobs, identity_id, resume_id).await?;
    let prefix = resume_prefix(identity_id, resume_id);

    let rename = match &update.file_name {
        Some(raw) => Some(policy.check_name(raw)?),
        None => None,
    }
    .filter(|accepted| accepted.file_name != summary.file_name);
    if let Some(accepted) = &rename {
        if extract::file_extension(&summary.file_name).as_deref()
            != Some(accepted.extension.as_str())
        {
            return Err(AppError::Validation(
                "Renaming cannot change the file extension".to_string(),
            ));
        }
    }

    if let Some(text) = &new_text {
        blobs
            .put(
                &format!("{prefix}{TEXT_FILE}"),
                Bytes::from(text.clone()),
                "text/plain; charset=utf-8",
            )
            .await?;
    }

    let mut replaced_original = None;
    if let Some(accepted) = rename {
        let old_key = original_key(&prefix, &summary.file_name);
        let body = blobs
            .get(&old_key)
            .await?
            .ok_or_else(|| not_found(resume_id))?;
        let new_key = original_key(&prefix, &accepted.file_name);
        blobs
            .put(&new_key, body, extract::content_type_for(&accepted.extension))
            .await?;
        summary.file_name = accepted.file_name;
        replaced_original = Some((old_key, new_key));
    }

    summary.updated_at = Some(now);
    if let Err(e) = put_meta(blobs, &prefix, &summary).await {
        if let Some((_, new_key)) = &replaced_original {
            if let Err(cleanup) = blobs.delete(new_key).await {
                warn!(key = %new_key, "Failed to remove renamed original: {cleanup}");
            }
        }
        return Err(e);
    }

    // Meta now points at the new key; a leftover old original is never read.
    if let Some((old_key, _)) = &replaced_original {
        if let Err(e) = blobs.delete(old_key).await {
            warn!(key = %old_key, "Failed to remove previous original: {e}");
        }
    }

    info!(%identity_id, %resume_id, "Resume updated");
    get_resume(blobs, identity_id, resume_id).await
}

pub async fn delete_resume(
    blobs: &dyn BlobStore,
    identity_id: Uuid,
    resume_id: Uuid,
) -> Result<(), AppError> {
    let removed = blobs
        .delete_prefix(&resume_prefix(identity_id, resume_id))
        .await?;
    if removed == 0 {
        return Err(not_found(resume_id));
    }
    info!(%identity_id, %resume_id, removed, "Resume deleted");
    Ok(())
}
