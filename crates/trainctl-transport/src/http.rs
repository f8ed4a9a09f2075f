//! Multipart upload client.
//!
//! Implements [`UploadBackend`] on top of reqwest. Both archives go out in a
//! single `multipart/form-data` POST; the reply is handed back untouched.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{debug, error};
use trainctl_core::{ArchivePart, UploadBackend, UploadFailure, UploadReply, UploadRequest};

/// Upload backend speaking HTTP to the training server.
#[derive(Debug, Clone)]
pub struct HttpUploadClient {
    /// Full URL of the upload endpoint (e.g. "http://localhost:8000/upload").
    upload_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl HttpUploadClient {
    /// Creates a client posting to `upload_url`.
    ///
    /// No timeout is configured: an unanswered upload stays in flight until
    /// the server or the network gives up.
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self::with_client(upload_url, Client::new())
    }

    /// Creates a client reusing an existing reqwest `Client`.
    pub fn with_client(upload_url: impl Into<String>, client: Client) -> Self {
        Self { upload_url: upload_url.into(), client }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    fn to_part(archive: &ArchivePart) -> Result<Part, UploadFailure> {
        Part::bytes(archive.payload.to_vec())
            .file_name(archive.file_name.clone())
            .mime_str(&archive.content_type)
            .map_err(|e| UploadFailure::NetworkError(format!("Failed to set MIME type: {}", e)))
    }

    fn build_form(request: &UploadRequest) -> Result<Form, UploadFailure> {
        request.parts().into_iter().try_fold(Form::new(), |form, archive| {
            Ok(form.part(archive.name, Self::to_part(archive)?))
        })
    }
}

#[async_trait]
impl UploadBackend for HttpUploadClient {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReply, UploadFailure> {
        debug!(
            upload_url = %self.upload_url,
            training = %request.training.file_name,
            validation = %request.validation.file_name,
            bytes = request.training.payload.len() + request.validation.payload.len(),
            "Uploading datasets"
        );

        let form = Self::build_form(&request)?;

        let response = self.client.post(&self.upload_url).multipart(form).send().await.map_err(|e| {
            error!(error = %e, upload_url = %self.upload_url, "Upload request failed");
            if e.is_connect() {
                UploadFailure::NetworkError(format!("Training server not reachable at {}", self.upload_url))
            } else {
                UploadFailure::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!(error = %e, status = %status, "Failed to read upload response body");
            UploadFailure::NetworkError(format!("Failed to read response: {}", e))
        })?;

        debug!(status = %status, body_len = body.len(), "Upload answered");
        Ok(UploadReply::new(status.as_u16(), body))
    }
}
