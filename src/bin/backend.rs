#![forbid(unsafe_code)]

//! Axum backend for the video upload page.
//!
//! Exposes the subtitle pipeline and the listing of rendered videos as JSON,
//! and serves the rendered files themselves under `/videos/`.

use std::{
    io::SeekFrom,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use creatorkit_tools::{
    OutputStore, PipelineError, StoredVideoRecord, SubtitlePipeline, UploadedVideo, ZapcapClient,
    config::{RuntimeOverrides, SubtitleConfig, ZAPCAP_API_KEY_VAR, resolve_runtime_settings},
    zapcap::CaptionTemplate,
};
use mime_guess::MimeGuess;
use serde::Serialize;
use serde_json::json;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
    net::TcpListener,
    signal,
};
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VIDEO_FIELD: &str = "video";
const DEFAULT_UPLOAD_NAME: &str = "video.mp4";
const DEFAULT_LOG_FILTER: &str = "creatorkit_tools=info,backend=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "backend", version, about = "Subtitle generation backend")]
struct BackendArgs {
    /// Directory whose `videos/` folder holds rendered videos
    #[arg(long)]
    public_root: Option<PathBuf>,
    /// IP address to listen on
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// `.env` file to read instead of `./.env`
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl BackendArgs {
    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            public_root: self.public_root.clone(),
            host: self.host.clone(),
            port: self.port,
            env_path: self.env_file.clone(),
        }
    }
}

/// Shared state injected into every handler. `subtitles` is `None` when no
/// service credential was configured at startup.
#[derive(Clone)]
struct AppState {
    store: OutputStore,
    subtitles: Option<Arc<SubtitlePipeline>>,
}

impl AppState {
    fn pipeline(&self) -> ApiResult<&SubtitlePipeline> {
        self.subtitles.as_deref().ok_or_else(|| {
            PipelineError::Configuration {
                key: ZAPCAP_API_KEY_VAR,
            }
            .into()
        })
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: None,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            details: err.detail(),
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.message, "details": details }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubtitleResponse {
    success: bool,
    video_id: String,
    task_id: String,
    transcript: String,
    video_url: String,
    filename: String,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct TemplatesResponse {
    success: bool,
    templates: Vec<CaptionTemplate>,
    message: &'static str,
}

#[derive(Serialize)]
struct VideoListResponse {
    success: bool,
    videos: Vec<StoredVideoRecord>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = BackendArgs::parse();
    let settings = resolve_runtime_settings(args.overrides())?;
    let host: IpAddr = settings
        .host
        .parse()
        .with_context(|| format!("expected an IPv4 or IPv6 address, got {:?}", settings.host))?;

    let store = OutputStore::new(settings.videos_dir());
    store
        .ensure_exists()
        .await
        .with_context(|| format!("creating {}", store.dir().display()))?;

    let config = SubtitleConfig::from_runtime(&settings);
    let state = AppState {
        subtitles: build_pipeline(&config, store.clone())?,
        store,
    };
    let app = build_router(state, settings.max_upload_bytes);

    let addr = SocketAddr::new(host, settings.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn build_pipeline(
    config: &SubtitleConfig,
    store: OutputStore,
) -> Result<Option<Arc<SubtitlePipeline>>> {
    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(err) => {
            warn!("{err}; subtitle routes are disabled");
            return Ok(None);
        }
    };
    let client = ZapcapClient::new(api_key, config).context("building video service client")?;
    let pipeline = SubtitlePipeline::new(config, Arc::new(client), store)?;
    Ok(Some(Arc::new(pipeline)))
}

fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/api/video-subtitles",
            get(subtitle_templates).post(generate_subtitles),
        )
        .route("/api/videos", get(list_videos))
        .route("/videos/{filename}", get(serve_video))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    // Only affects graceful shutdown; Ctrl+C still terminates the process.
    if let Err(err) = signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {err}");
    }
}

async fn generate_subtitles(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SubtitleResponse>> {
    let pipeline = state.pipeline()?;
    let video = read_video_field(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No video file provided"))?;

    let processed = pipeline.process_video(video).await?;
    Ok(Json(SubtitleResponse {
        success: true,
        video_id: processed.video_id.0,
        task_id: processed.task_id.0,
        transcript: processed.transcript,
        video_url: processed.video_url,
        filename: processed.filename,
        message: "Video processed successfully with subtitles and saved locally",
    }))
}

/// Pulls the `video` part out of the form. An empty part counts as missing.
async fn read_video_field(mut multipart: Multipart) -> ApiResult<Option<UploadedVideo>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(UploadedVideo::new(filename, bytes)));
    }
    Ok(None)
}

async fn subtitle_templates(State(state): State<AppState>) -> ApiResult<Json<TemplatesResponse>> {
    let templates = state.pipeline()?.templates().await?;
    Ok(Json(TemplatesResponse {
        success: true,
        templates,
        message: "Video service is reachable",
    }))
}

async fn list_videos(State(state): State<AppState>) -> Response {
    let listing = async {
        let created = state.store.ensure_exists().await?;
        let videos = state.store.list().await?;
        Ok::<_, std::io::Error>((created, videos))
    };

    match listing.await {
        Ok((created, videos)) => Json(VideoListResponse {
            success: true,
            count: videos.len(),
            videos,
            message: created.then_some("Videos directory created"),
        })
        .into_response(),
        Err(err) => {
            warn!(dir = %state.store.dir().display(), "listing videos failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string(), "videos": [], "count": 0 })),
            )
                .into_response()
        }
    }
}

async fn serve_video(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = state
        .store
        .resolve(&filename)
        .ok_or_else(|| ApiError::not_found("file not found"))?;
    stream_file(&path, &headers).await
}

/// Streams a file from disk, honouring a single `Range: bytes=` request.
async fn stream_file(path: &Path, request_headers: &HeaderMap) -> ApiResult<Response> {
    let mut file = File::open(path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let meta = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if !meta.is_file() {
        return Err(ApiError::not_found("file not found"));
    }
    let size = meta.len();
    let range = request_headers
        .get(header::RANGE)
        .and_then(|value| parse_range_header(value, size));

    let mut response = match range {
        Some((start, _)) if start >= size => {
            let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_RANGE, header_value(format!("bytes */{size}"))?);
            response
        }
        Some((start, end)) => {
            let end = end.min(size.saturating_sub(1));
            let length = end - start + 1;
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|err| ApiError::internal(err.to_string()))?;
            let mut response = Body::from_stream(ReaderStream::new(file.take(length))).into_response();
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let out = response.headers_mut();
            out.insert(
                header::CONTENT_RANGE,
                header_value(format!("bytes {start}-{end}/{size}"))?,
            );
            out.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            response
        }
        None => {
            let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            response
        }
    };

    let out = response.headers_mut();
    out.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    out.insert(header::CONTENT_TYPE, header_value(mime.to_string())?);
    Ok(response)
}

fn header_value(value: String) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| ApiError::internal(err.to_string()))
}

fn parse_range_header(value: &HeaderValue, size: u64) -> Option<(u64, u64)> {
    let range = value.to_str().ok()?.trim().strip_prefix("bytes=")?.trim();
    let (start, end) = range.split_once('-')?;

    if start.is_empty() {
        // "-N" asks for the last N bytes.
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        return Some((size.saturating_sub(suffix), size.saturating_sub(1)));
    }

    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        size.saturating_sub(1)
    } else {
        end.parse().ok()?
    };
    (end >= start).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Bytes, to_bytes};
    use creatorkit_tools::{
        CaptionService, ServiceError,
        zapcap::{ByteStream, RemoteVideoId, TaskId, TaskStatus, Transcript},
    };
    use futures_util::{StreamExt, stream};
    use reqwest::multipart::{Form, Part};
    use serde_json::Value;
    use tempfile::{TempDir, tempdir};

    /// Caption service whose task is finished on the first status poll.
    struct StubService {
        templates: Vec<CaptionTemplate>,
    }

    #[async_trait]
    impl CaptionService for StubService {
        async fn upload_video(&self, _video: &UploadedVideo) -> Result<RemoteVideoId, ServiceError> {
            Ok(RemoteVideoId("vid-1".into()))
        }

        async fn list_templates(&self) -> Result<Vec<CaptionTemplate>, ServiceError> {
            Ok(self.templates.clone())
        }

        async fn create_task(
            &self,
            _video: &RemoteVideoId,
            _template_id: &str,
            _auto_approve: bool,
        ) -> Result<TaskId, ServiceError> {
            Ok(TaskId("task-1".into()))
        }

        async fn task_status(
            &self,
            _video: &RemoteVideoId,
            _task: &TaskId,
        ) -> Result<TaskStatus, ServiceError> {
            Ok(TaskStatus {
                status: "completed".into(),
                download_url: Some("stub://render".into()),
                ..TaskStatus::default()
            })
        }

        async fn fetch_transcript(
            &self,
            _video: &RemoteVideoId,
            _task: &TaskId,
            _status: &TaskStatus,
        ) -> Result<Transcript, ServiceError> {
            Ok(Transcript::from_words(["hello", "world"]))
        }

        async fn download_render(&self, _status: &TaskStatus) -> Result<ByteStream, ServiceError> {
            let chunks = vec![
                Ok(Bytes::from(vec![5u8; 40])),
                Ok(Bytes::from_static(b"\x00\x01")),
            ];
            Ok(stream::iter(chunks).boxed())
        }
    }

    struct BackendTestContext {
        _temp: TempDir,
        state: AppState,
    }

    impl BackendTestContext {
        fn new(with_credential: bool) -> Self {
            let temp = tempdir().unwrap();
            let store = OutputStore::new(temp.path().join("public").join("videos"));
            let subtitles = with_credential.then(|| {
                let config = SubtitleConfig {
                    api_key: Some("test-key".into()),
                    ..SubtitleConfig::default()
                };
                let service = StubService {
                    templates: vec![CaptionTemplate::new("tmpl-1")],
                };
                Arc::new(SubtitlePipeline::new(&config, Arc::new(service), store.clone()).unwrap())
            });
            Self {
                _temp: temp,
                state: AppState { store, subtitles },
            }
        }

        async fn spawn(&self) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let app = build_router(self.state.clone(), 1024 * 1024);
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            base
        }
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn video_form(name: &str, bytes: Vec<u8>) -> Form {
        Form::new().part(
            VIDEO_FIELD,
            Part::bytes(bytes)
                .file_name(name.to_string())
                .mime_str("video/mp4")
                .unwrap(),
        )
    }

    #[test]
    fn backend_args_map_to_overrides() {
        let args = BackendArgs::try_parse_from([
            "backend",
            "--public-root",
            "/srv/public",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--env-file",
            "/etc/creatorkit.env",
        ])
        .unwrap();
        let overrides = args.overrides();
        assert_eq!(overrides.public_root, Some(PathBuf::from("/srv/public")));
        assert_eq!(overrides.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(overrides.port, Some(9000));
        assert_eq!(overrides.env_path, Some(PathBuf::from("/etc/creatorkit.env")));

        let defaults = BackendArgs::try_parse_from(["backend"]).unwrap().overrides();
        assert!(defaults.public_root.is_none() && defaults.port.is_none());
        assert!(BackendArgs::try_parse_from(["backend", "--port", "nope"]).is_err());
    }

    #[tokio::test]
    async fn api_error_serializes_json() {
        let response = ApiError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let parsed = json_body(response).await;
        assert_eq!(parsed["error"], "missing");
        assert!(parsed.get("details").is_none());

        let timeout = PipelineError::Timeout {
            stage: creatorkit_tools::Stage::RenderPolling,
            waited: std::time::Duration::from_secs(600),
        };
        let response = ApiError::from(timeout).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let parsed = json_body(response).await;
        assert_eq!(parsed["error"], "render-polling timed out after 600s");
        assert_eq!(parsed["details"], "condition not reached within 600000ms");
    }

    #[tokio::test]
    async fn list_videos_creates_directory_on_first_use() {
        let ctx = BackendTestContext::new(false);

        let first = json_body(list_videos(State(ctx.state.clone())).await).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["count"], 0);
        assert_eq!(first["message"], "Videos directory created");
        assert!(ctx.state.store.dir().is_dir());

        ctx.state
            .store
            .write("clip_with_subtitles_1.mp4", Bytes::from_static(b"abc"))
            .await
            .unwrap();
        let second = json_body(list_videos(State(ctx.state.clone())).await).await;
        assert_eq!(second["count"], 1);
        assert!(second.get("message").is_none());
        assert_eq!(second["videos"][0]["filename"], "clip_with_subtitles_1.mp4");
        assert_eq!(second["videos"][0]["url"], "/videos/clip_with_subtitles_1.mp4");
        assert_eq!(second["videos"][0]["size"], 3);
        assert!(second["videos"][0]["createdAt"].is_string());
        assert!(second["videos"][0]["modifiedAt"].is_string());
    }

    #[tokio::test]
    async fn templates_require_credential() {
        let ctx = BackendTestContext::new(false);
        let err = subtitle_templates(State(ctx.state.clone())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains(ZAPCAP_API_KEY_VAR));
    }

    #[tokio::test]
    async fn templates_are_listed() {
        let ctx = BackendTestContext::new(true);
        let Json(payload) = subtitle_templates(State(ctx.state.clone())).await.unwrap();
        assert!(payload.success);
        assert_eq!(payload.templates.len(), 1);
        assert_eq!(payload.templates[0].id, "tmpl-1");
    }

    #[tokio::test]
    async fn upload_without_credential_reports_configuration_error() {
        let ctx = BackendTestContext::new(false);
        let base = ctx.spawn().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/video-subtitles"))
            .multipart(video_form("demo.mp4", vec![0u8; 10]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains(ZAPCAP_API_KEY_VAR));
    }

    #[tokio::test]
    async fn upload_without_video_field_is_rejected() {
        let ctx = BackendTestContext::new(true);
        let base = ctx.spawn().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/video-subtitles"))
            .multipart(Form::new().text("title", "no file here"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "No video file provided");

        let response = reqwest::Client::new()
            .post(format!("{base}/api/video-subtitles"))
            .multipart(video_form("empty.mp4", Vec::new()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn upload_produces_served_artifact() {
        let ctx = BackendTestContext::new(true);
        let base = ctx.spawn().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/video-subtitles"))
            .multipart(video_form("demo.mp4", vec![0u8; 1024]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["videoId"], "vid-1");
        assert_eq!(body["taskId"], "task-1");
        assert_eq!(body["transcript"], "hello world");
        let filename = body["filename"].as_str().unwrap().to_string();
        assert!(filename.starts_with("demo_with_subtitles_") && filename.ends_with(".mp4"));
        assert_eq!(body["videoUrl"], format!("/videos/{filename}"));

        let video = client
            .get(format!("{base}/videos/{filename}"))
            .send()
            .await
            .unwrap();
        assert_eq!(video.status().as_u16(), 200);
        assert_eq!(video.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(video.bytes().await.unwrap().len(), 42);

        let partial = client
            .get(format!("{base}/videos/{filename}"))
            .header(header::RANGE, "bytes=40-")
            .send()
            .await
            .unwrap();
        assert_eq!(partial.status().as_u16(), 206);
        assert_eq!(partial.headers()[header::CONTENT_RANGE], "bytes 40-41/42");
        assert_eq!(partial.bytes().await.unwrap().as_ref(), b"\x00\x01");

        let listing: Value = client
            .get(format!("{base}/api/videos"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listing["count"], 1);
        assert_eq!(listing["videos"][0]["filename"], filename.as_str());
        assert_eq!(listing["videos"][0]["size"], 42);
    }

    #[tokio::test]
    async fn serve_video_rejects_unknown_and_unsafe_names() {
        let ctx = BackendTestContext::new(false);
        ctx.state.store.ensure_exists().await.unwrap();

        for name in ["missing.mp4", "..", ".hidden.mp4.part"] {
            let err = serve_video(
                State(ctx.state.clone()),
                AxumPath(name.to_string()),
                HeaderMap::new(),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn serve_video_skips_directories() {
        let ctx = BackendTestContext::new(false);
        std::fs::create_dir_all(ctx.state.store.dir().join("nested.mp4")).unwrap();

        let err = serve_video(
            State(ctx.state.clone()),
            AxumPath("nested.mp4".to_string()),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsatisfiable_range_is_reported() {
        let ctx = BackendTestContext::new(false);
        ctx.state
            .store
            .write("a.mp4", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=50-60"));
        let response = serve_video(State(ctx.state.clone()), AxumPath("a.mp4".into()), headers)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");
    }

    #[test]
    fn parse_range_header_variants() {
        let parse = |raw: &'static str| parse_range_header(&HeaderValue::from_static(raw), 100);
        assert_eq!(parse("bytes=0-9"), Some((0, 9)));
        assert_eq!(parse("bytes=90-"), Some((90, 99)));
        assert_eq!(parse("bytes=-10"), Some((90, 99)));
        assert_eq!(parse("bytes=-500"), Some((0, 99)));
        assert_eq!(parse("bytes=-0"), None);
        assert_eq!(parse("bytes=9-3"), None);
        assert_eq!(parse("items=0-9"), None);
        assert_eq!(parse("bytes=abc"), None);
    }
}
