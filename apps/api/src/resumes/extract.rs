//! Plain-text extraction from uploaded resume files.
//!
//! PDF parsing is CPU-bound and runs inside `tokio::task::spawn_blocking`.

use bytes::Bytes;

use crate::errors::AppError;

/// Lower-cased extension of `file_name`, without the dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "md" => "text/markdown",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

pub async fn extract_text(extension: &str, body: Bytes) -> Result<String, AppError> {
    let text = match extension {
        "pdf" => {
            match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&body))
                .await
            {
                Ok(parsed) => {
                    parsed.map_err(|e| AppError::Validation(format!("Could not read PDF: {e}")))?
                }
                // pdf-extract panics on some malformed documents.
                Err(e) if e.is_panic() => {
                    return Err(AppError::Validation("Could not read PDF".to_string()))
                }
                Err(e) => {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "spawn_blocking failed in PDF extraction: {e}"
                    )))
                }
            }
        }
        _ => String::from_utf8(body.to_vec())
            .map_err(|_| AppError::Validation("File is not valid UTF-8 text".to_string()))?,
    };

    let text = normalize_whitespace(&text);
    if text.is_empty() {
        return Err(AppError::Validation(
            "No text could be extracted from the file".to_string(),
        ));
    }
    Ok(text)
}

/// Trims trailing spaces on every line and collapses runs of blank lines to one.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("cv.PDF"), Some("pdf".to_string()));
        assert_eq!(file_extension("notes.v2.md"), Some("md".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[tokio::test]
    async fn test_text_extraction_normalizes_blank_lines() {
        let body = Bytes::from_static(b"Jane Doe  \n\n\n\nRust engineer\r\n");
        let text = extract_text("txt", body).await.unwrap();
        assert_eq!(text, "Jane Doe\n\nRust engineer");
    }

    #[tokio::test]
    async fn test_invalid_utf8_and_blank_text_are_rejected() {
        let invalid = extract_text("txt", Bytes::from_static(&[0xff, 0xfe, 0x00])).await;
        assert!(matches!(invalid, Err(AppError::Validation(_))));

        let blank = extract_text("md", Bytes::from_static(b"  \n \n")).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_a_validation_error() {
        let result = extract_text("pdf", Bytes::from_static(b"not a pdf at all")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
