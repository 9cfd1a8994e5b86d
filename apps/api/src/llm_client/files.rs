//! File handles in the provider's file store.
//!
//! Binary resumes are registered once and referenced by id from prompts via
//! `ContentPart::InputFile`. Handles are released after each optimization run.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use super::{api_error, LlmClient, LlmError};

/// Purpose tag the provider requires for files referenced from model input.
const FILE_PURPOSE: &str = "user_data";

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

impl LlmClient {
    /// Uploads a PDF and returns the provider's file handle.
    pub async fn upload_file(&self, bytes: Vec<u8>, filename: &str) -> Result<String, LlmError> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().text("purpose", FILE_PURPOSE).part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        let file: FileObject = response.json().await?;
        info!("Registered model file {} ({filename})", file.id);
        Ok(file.id)
    }

    /// Deletes a file handle. A handle the provider no longer knows is not an error.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), LlmError> {
        let response = self
            .client
            .delete(format!("{}/files/{file_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            warn!("Model file {file_id} was already gone");
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        info!("Deleted model file {file_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_object_deserializes_id() {
        let file: FileObject = serde_json::from_str(
            r#"{"id":"file-abc","object":"file","bytes":120000,"purpose":"user_data"}"#,
        )
        .unwrap();
        assert_eq!(file.id, "file-abc");
    }
}
