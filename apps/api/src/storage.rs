//! Content storage for uploaded resumes and rendered PDFs (S3 / MinIO).

use aws_sdk_s3::primitives::ByteStream;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Object-store handle bound to a single bucket.
#[derive(Clone)]
pub struct ContentStore {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl ContentStore {
    pub fn new(s3: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let size = bytes.len();
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

        info!("Stored {size} bytes at s3://{}/{}", self.bucket, key);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let object = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("download of {key} failed: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::S3(format!("reading {key} failed: {e}")))?;

        Ok(data.into_bytes().to_vec())
    }
}

/// Key for an original upload. Includes a fresh id so a re-upload never
/// overwrites an object another in-flight run may still be reading.
pub fn upload_key(user_id: Uuid, filename: &str) -> String {
    format!("resumes/{user_id}/{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

/// Key for a rendered resume.
pub fn rendered_key(user_id: Uuid) -> String {
    format!("rendered/{user_id}/{}.pdf", Uuid::new_v4())
}

/// Keeps ASCII alphanumerics plus `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c: char| c == '.' || c == '_').is_empty() {
        "resume.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_spaces() {
        assert_eq!(sanitize_filename("../../etc/My CV.pdf"), "My_CV.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\cv.pdf"), "cv.pdf");
    }

    #[test]
    fn test_sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_filename(""), "resume.pdf");
        assert_eq!(sanitize_filename(".."), "resume.pdf");
    }

    #[test]
    fn test_keys_are_scoped_to_user() {
        let user = Uuid::new_v4();
        assert!(upload_key(user, "cv.pdf").starts_with(&format!("resumes/{user}/")));
        assert!(upload_key(user, "cv.pdf").ends_with("-cv.pdf"));
        assert!(rendered_key(user).starts_with(&format!("rendered/{user}/")));
        assert_ne!(rendered_key(user), rendered_key(user));
    }
}
