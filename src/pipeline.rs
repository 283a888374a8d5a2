//! Subtitle generation pipeline.
//!
//! One call to [`SubtitlePipeline::process_video`] runs upload, template
//! selection, task creation, transcript polling, render polling and
//! materialization strictly in that order. Nothing is retried: any failure
//! ends the run and the caller resubmits the whole video.

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    config::SubtitleConfig,
    error::{PipelineError, Stage},
    poll::{PollError, PollPolicy, poll_until},
    store::{OutputStore, StreamWriteError, artifact_filename, public_url},
    zapcap::{
        ByteStream, CaptionService, CaptionTemplate, RemoteVideoId, TaskId, TaskStatus, Transcript,
        UploadedVideo,
    },
};

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedVideo {
    pub video_id: RemoteVideoId,
    pub task_id: TaskId,
    pub transcript: String,
    pub video_url: String,
    pub filename: String,
    pub size: u64,
}

pub struct SubtitlePipeline {
    service: Arc<dyn CaptionService>,
    store: OutputStore,
    transcript_poll: PollPolicy,
    render_poll: PollPolicy,
}

impl SubtitlePipeline {
    /// Fails with [`PipelineError::Configuration`] when the config carries no
    /// credential, before the service is ever used.
    pub fn new(
        config: &SubtitleConfig,
        service: Arc<dyn CaptionService>,
        store: OutputStore,
    ) -> Result<Self, PipelineError> {
        config.api_key()?;
        Ok(Self {
            service,
            store,
            transcript_poll: config.transcript_poll,
            render_poll: config.render_poll,
        })
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub async fn templates(&self) -> Result<Vec<CaptionTemplate>, PipelineError> {
        self.service
            .list_templates()
            .await
            .map_err(|err| PipelineError::upstream(Stage::TemplateSelection, err))
    }

    pub async fn process_video(&self, video: UploadedVideo) -> Result<ProcessedVideo, PipelineError> {
        let original = video.filename.clone();
        let result = self.run(video).await;
        if let Err(err) = &result {
            error!(filename = %original, stage = ?err.stage(), "subtitle generation failed: {err}");
        }
        result
    }

    async fn run(&self, video: UploadedVideo) -> Result<ProcessedVideo, PipelineError> {
        info!(filename = %video.filename, bytes = video.bytes.len(), "uploading video");
        let video_id = self
            .service
            .upload_video(&video)
            .await
            .map_err(|err| PipelineError::upstream(Stage::Upload, err))?;
        info!(%video_id, "video uploaded");

        let template = self.select_template().await?;
        info!(template = %template.id, "creating video task");

        let task_id = self
            .service
            .create_task(&video_id, &template.id, true)
            .await
            .map_err(|err| PipelineError::upstream(Stage::TaskCreation, err))?;
        info!(%task_id, "video task created, polling for transcript");

        let transcript = self.poll_transcript(&video_id, &task_id).await?;
        info!(%task_id, words = transcript.words.len(), "transcript completed, polling for render");

        let render = self.poll_render(&video_id, &task_id).await?;
        info!(%task_id, "render completed, downloading video");

        let filename = artifact_filename(&video.filename, self.store.next_stamp());
        let size = self.materialize(&filename, render).await?;

        Ok(ProcessedVideo {
            video_id,
            task_id,
            transcript: transcript.text(),
            video_url: public_url(&filename),
            filename,
            size,
        })
    }

    /// Always the first template the service lists.
    async fn select_template(&self) -> Result<CaptionTemplate, PipelineError> {
        self.templates()
            .await?
            .into_iter()
            .next()
            .ok_or(PipelineError::NoTemplates)
    }

    async fn poll_transcript(
        &self,
        video_id: &RemoteVideoId,
        task_id: &TaskId,
    ) -> Result<Transcript, PipelineError> {
        let stage = Stage::TranscriptPolling;
        let status = self
            .wait_for(&self.transcript_poll, stage, video_id, task_id, TaskStatus::transcript_ready)
            .await?;
        self.service
            .fetch_transcript(video_id, task_id, &status)
            .await
            .map_err(|err| PipelineError::upstream(stage, err))
    }

    async fn poll_render(
        &self,
        video_id: &RemoteVideoId,
        task_id: &TaskId,
    ) -> Result<ByteStream, PipelineError> {
        let stage = Stage::RenderPolling;
        let status = self
            .wait_for(&self.render_poll, stage, video_id, task_id, TaskStatus::render_ready)
            .await?;
        self.service
            .download_render(&status)
            .await
            .map_err(|err| PipelineError::upstream(stage, err))
    }

    async fn wait_for(
        &self,
        policy: &PollPolicy,
        stage: Stage,
        video_id: &RemoteVideoId,
        task_id: &TaskId,
        ready: fn(&TaskStatus) -> bool,
    ) -> Result<TaskStatus, PipelineError> {
        let service = &self.service;
        poll_until(
            policy,
            move || async move {
                service
                    .task_status(video_id, task_id)
                    .await
                    .and_then(TaskStatus::into_active)
            },
            ready,
        )
        .await
        .map_err(|err| match err {
            PollError::TimedOut { waited } => PipelineError::Timeout { stage, waited },
            PollError::Failed(err) => PipelineError::upstream(stage, err),
        })
    }

    async fn materialize(&self, filename: &str, render: ByteStream) -> Result<u64, PipelineError> {
        let stage = Stage::Materialization;
        self.store
            .write_stream(filename, render)
            .await
            .map_err(|err| match err {
                StreamWriteError::Source(err) => PipelineError::upstream(stage, err),
                StreamWriteError::Io(source) => PipelineError::Io { stage, source },
            })
    }
}
