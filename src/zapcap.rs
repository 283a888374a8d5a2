//! Client for the hosted captioning service (ZapCap).
//!
//! The pipeline only talks to [`CaptionService`]; [`ZapcapClient`] is the
//! reqwest-backed implementation used in production.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::{StreamExt, stream::BoxStream};
use reqwest::{
    Client, RequestBuilder, Response, Url,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{config::SubtitleConfig, error::ServiceError};

const API_KEY_HEADER: &str = "x-api-key";
const ERROR_BODY_LIMIT: usize = 512;

const STATUS_FAILED: &str = "failed";
const STATUS_COMPLETED: &str = "completed";
const TRANSCRIPT_READY_STATUSES: &[&str] = &["transcriptionCompleted", "rendering", STATUS_COMPLETED];

pub type ByteStream = BoxStream<'static, Result<Bytes, ServiceError>>;

/// A video as received from the browser.
#[derive(Clone, Debug)]
pub struct UploadedVideo {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedVideo {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Handle the service assigned to an uploaded video.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteVideoId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for RemoteVideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caption style preset. Fields other than `id` are passed through untouched
/// to the health endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionTemplate {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl CaptionTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        self.status == STATUS_FAILED
    }

    pub fn transcript_ready(&self) -> bool {
        self.transcript.is_some() || TRANSCRIPT_READY_STATUSES.contains(&self.status.as_str())
    }

    pub fn render_ready(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Turns a `failed` status into [`ServiceError::TaskFailed`].
    pub fn into_active(self) -> Result<Self, ServiceError> {
        if self.is_failed() {
            return Err(ServiceError::TaskFailed {
                message: self.error.unwrap_or_else(|| "no reason given".to_string()),
            });
        }
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl TranscriptWord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_time: None,
            end_time: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Transcript {
    pub words: Vec<TranscriptWord>,
}

pub const EMPTY_TRANSCRIPT_TEXT: &str = "No transcript available";

impl Transcript {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(TranscriptWord::new).collect(),
        }
    }

    /// Word texts joined by single spaces.
    pub fn text(&self) -> String {
        let joined = self
            .words
            .iter()
            .map(|word| word.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            EMPTY_TRANSCRIPT_TEXT.to_string()
        } else {
            joined
        }
    }
}

// The service has returned both shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptPayload {
    Wrapped { words: Vec<TranscriptWord> },
    Bare(Vec<TranscriptWord>),
}

impl<'de> Deserialize<'de> for Transcript {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let words = match TranscriptPayload::deserialize(deserializer)? {
            TranscriptPayload::Wrapped { words } | TranscriptPayload::Bare(words) => words,
        };
        Ok(Self { words })
    }
}

#[async_trait]
pub trait CaptionService: Send + Sync {
    async fn upload_video(&self, video: &UploadedVideo) -> Result<RemoteVideoId, ServiceError>;

    async fn list_templates(&self) -> Result<Vec<CaptionTemplate>, ServiceError>;

    async fn create_task(
        &self,
        video: &RemoteVideoId,
        template_id: &str,
        auto_approve: bool,
    ) -> Result<TaskId, ServiceError>;

    async fn task_status(
        &self,
        video: &RemoteVideoId,
        task: &TaskId,
    ) -> Result<TaskStatus, ServiceError>;

    /// Fetches the transcript of a task whose status reports it ready.
    async fn fetch_transcript(
        &self,
        video: &RemoteVideoId,
        task: &TaskId,
        status: &TaskStatus,
    ) -> Result<Transcript, ServiceError>;

    /// Opens the rendered video of a completed task as a byte stream.
    async fn download_render(&self, status: &TaskStatus) -> Result<ByteStream, ServiceError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    template_id: &'a str,
    auto_approve: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    task_id: String,
}

#[derive(Clone)]
pub struct ZapcapClient {
    http: Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    transfer_timeout: Duration,
}

impl ZapcapClient {
    pub fn new(api_key: impl Into<String>, config: &SubtitleConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(concat!("creatorkit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout: config.request_timeout,
            transfer_timeout: config.transfer_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, &self.api_key)
    }

    /// Requests to URLs handed out by the service (transcript, render) only
    /// carry the credential when they point back at the API itself.
    fn get_external(&self, url: &str, timeout: Duration) -> RequestBuilder {
        let request = self.http.get(url).timeout(timeout);
        if same_origin(url, &self.base_url) {
            self.authorized(request)
        } else {
            request
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = checked(request.send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| ServiceError::Decode(err.to_string()))
    }
}

/// Scheme, host and port must all match; a shared string prefix is not enough.
fn same_origin(url: &str, base: &str) -> bool {
    match (Url::parse(url), Url::parse(base)) {
        (Ok(url), Ok(base)) => {
            url.scheme() == base.scheme()
                && url.host_str() == base.host_str()
                && url.port_or_known_default() == base.port_or_known_default()
        }
        _ => false,
    }
}

/// Converts non-2xx responses into [`ServiceError::Status`].
async fn checked(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CaptionService for ZapcapClient {
    async fn upload_video(&self, video: &UploadedVideo) -> Result<RemoteVideoId, ServiceError> {
        let mime = mime_guess::from_path(&video.filename).first_or_octet_stream();
        let part = Part::stream_with_length(video.bytes.clone(), video.bytes.len() as u64)
            .file_name(video.filename.clone())
            .mime_str(mime.essence_str())?;
        let request = self
            .authorized(self.http.post(self.url("/videos")))
            .timeout(self.transfer_timeout)
            .multipart(Form::new().part("file", part));
        let response: UploadResponse = self.send_json(request).await?;
        Ok(RemoteVideoId(response.id))
    }

    async fn list_templates(&self) -> Result<Vec<CaptionTemplate>, ServiceError> {
        let request = self
            .authorized(self.http.get(self.url("/templates")))
            .timeout(self.request_timeout);
        self.send_json(request).await
    }

    async fn create_task(
        &self,
        video: &RemoteVideoId,
        template_id: &str,
        auto_approve: bool,
    ) -> Result<TaskId, ServiceError> {
        let request = self
            .authorized(self.http.post(self.url(&format!("/videos/{video}/task"))))
            .timeout(self.request_timeout)
            .json(&CreateTaskRequest {
                template_id,
                auto_approve,
            });
        let response: CreateTaskResponse = self.send_json(request).await?;
        Ok(TaskId(response.task_id))
    }

    async fn task_status(
        &self,
        video: &RemoteVideoId,
        task: &TaskId,
    ) -> Result<TaskStatus, ServiceError> {
        let request = self
            .authorized(self.http.get(self.url(&format!("/videos/{video}/task/{task}"))))
            .timeout(self.request_timeout);
        let status: TaskStatus = self.send_json(request).await?;
        debug!(%video, %task, status = %status.status, "task status");
        Ok(status)
    }

    async fn fetch_transcript(
        &self,
        video: &RemoteVideoId,
        task: &TaskId,
        status: &TaskStatus,
    ) -> Result<Transcript, ServiceError> {
        let url = status
            .transcript
            .clone()
            .unwrap_or_else(|| self.url(&format!("/videos/{video}/task/{task}/transcript")));
        self.send_json(self.get_external(&url, self.request_timeout))
            .await
    }

    async fn download_render(&self, status: &TaskStatus) -> Result<ByteStream, ServiceError> {
        let url = status
            .download_url
            .as_deref()
            .ok_or(ServiceError::MissingDownloadUrl)?;
        let response = checked(self.get_external(url, self.transfer_timeout).send().await?).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ServiceError::from))
            .boxed())
    }
}
