#![forbid(unsafe_code)]

//! Subtitle generation backend for the creatorkit web app.
//!
//! Uploaded videos are sent to a hosted captioning service, polled until the
//! captioned render is ready, and stored locally for the UI to list and play.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod poll;
pub mod store;
pub mod zapcap;

pub use error::{PipelineError, ServiceError, Stage};
pub use pipeline::{ProcessedVideo, SubtitlePipeline};
pub use store::{OutputStore, StoredVideoRecord};
pub use zapcap::{CaptionService, UploadedVideo, ZapcapClient};
