//! HTTP collaborators: history, presence, upload, toggle and attachment fetch.

use async_trait::async_trait;
use pchat_proto::api::{
    ErrorResponse, ToggleStatusRequest, ToggleStatusResponse, UploadForm, UploadResponse,
};
use pchat_proto::MessageRecord;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use tracing::debug;

use crate::error::ClientError;

/// Downloaded attachment body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Message history as `viewer` may see it.
    async fn fetch_history(&self, viewer: &str) -> Result<Vec<MessageRecord>, ClientError>;

    async fn fetch_users(&self) -> Result<Vec<String>, ClientError>;

    /// Store an attachment message. It arrives back as a message push.
    async fn upload(&self, form: UploadForm, file: Vec<u8>) -> Result<UploadResponse, ClientError>;

    async fn toggle_status(&self, request: &ToggleStatusRequest) -> Result<bool, ClientError>;

    async fn fetch_attachment(&self, file_id: &str, viewer: &str)
        -> Result<Attachment, ClientError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pchat-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-2xx response into `ClientError::Request`, using the server's
/// `detail` when it sent one.
async fn api_error(res: Response) -> ClientError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.detail)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body
            }
        });
    ClientError::Request {
        status: status.as_u16(),
        detail,
    }
}

async fn check(res: Response) -> Result<Response, ClientError> {
    if res.status().is_success() {
        Ok(res)
    } else {
        Err(api_error(res).await)
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn fetch_history(&self, viewer: &str) -> Result<Vec<MessageRecord>, ClientError> {
        let res = self
            .client
            .get(self.url("/messages"))
            .query(&[("viewer", viewer)])
            .send()
            .await?;
        let records: Vec<MessageRecord> = check(res).await?.json().await?;
        debug!(count = records.len(), "history fetched");
        Ok(records)
    }

    async fn fetch_users(&self) -> Result<Vec<String>, ClientError> {
        let res = self.client.get(self.url("/users")).send().await?;
        let users: Vec<String> = check(res).await?.json().await?;
        Ok(users)
    }

    async fn upload(&self, form: UploadForm, file: Vec<u8>) -> Result<UploadResponse, ClientError> {
        if form.sender.trim().is_empty() {
            return Err(ClientError::InvalidInput("upload needs a sender".into()));
        }
        let part = Part::bytes(file)
            .file_name(form.filename.clone())
            .mime_str(&form.content_type)?;
        let multipart = Form::new()
            .part("file", part)
            .text("sender", form.sender)
            .text("text", form.text)
            .text("private", form.private.to_string())
            .text("status", form.status.as_str())
            .text("receiver", form.receiver.unwrap_or_default());

        let res = self
            .client
            .post(self.url("/upload"))
            .multipart(multipart)
            .send()
            .await?;
        let body: UploadResponse = check(res).await?.json().await?;
        debug!(message_id = %body.message_id, file_id = %body.file_id, "upload stored");
        Ok(body)
    }

    async fn toggle_status(&self, request: &ToggleStatusRequest) -> Result<bool, ClientError> {
        let url = self.url(&format!("/toggle_status/{}", request.message_id));
        let res = self.client.post(url).json(request).send().await?;
        let body: ToggleStatusResponse = check(res).await?.json().await?;
        Ok(body.success)
    }

    async fn fetch_attachment(
        &self,
        file_id: &str,
        viewer: &str,
    ) -> Result<Attachment, ClientError> {
        let res = self
            .client
            .get(self.url(&format!("/file/{file_id}")))
            .query(&[("viewer", viewer)])
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::UnknownMessage(format!("file {file_id}")));
        }
        let res = check(res).await?;
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = res.bytes().await?.to_vec();
        Ok(Attachment {
            content_type,
            bytes,
        })
    }
}
