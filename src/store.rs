//! Filesystem-backed store for rendered videos.
//!
//! Files land in a single flat directory that is also served publicly under
//! `/videos/`. Writes stream into a hidden `.part` file next to the target and
//! are renamed into place once complete, so a listing never sees half a video.

use std::{
    convert::Infallible,
    fmt, io,
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt, stream};
use serde::Serialize;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

pub const VIDEOS_SUBDIR: &str = "videos";
pub const ARTIFACT_EXTENSION: &str = "mp4";
const ARTIFACT_SUFFIX: &str = "_with_subtitles_";
const FALLBACK_STEM: &str = "video";
/// Leaves room for the suffix, a 20-digit stamp and the `.{name}.part`
/// wrapping within the 255-byte file name limit.
const MAX_STEM_BYTES: usize = 200;

/// One rendered video as reported by [`OutputStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVideoRecord {
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Failure while copying a byte stream into the store.
#[derive(Debug)]
pub enum StreamWriteError<E> {
    /// The inbound stream yielded an error.
    Source(E),
    Io(io::Error),
}

impl<E> From<io::Error> for StreamWriteError<E> {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl<E: fmt::Display> fmt::Display for StreamWriteError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(err) => write!(f, "reading source stream: {err}"),
            Self::Io(err) => write!(f, "writing file: {err}"),
        }
    }
}

#[derive(Clone)]
pub struct OutputStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    dir: PathBuf,
    last_stamp: AtomicU64,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                dir: dir.into(),
                last_stamp: AtomicU64::new(0),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Creates the backing directory when missing. Returns `true` when this
    /// call created it.
    pub async fn ensure_exists(&self) -> io::Result<bool> {
        match fs::metadata(&self.inner.dir).await {
            Ok(meta) if meta.is_dir() => Ok(false),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists but is not a directory", self.inner.dir.display()),
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(dir = %self.inner.dir.display(), "creating videos directory");
                fs::create_dir_all(&self.inner.dir).await?;
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    /// Lists stored artifacts, newest first by creation time.
    pub async fn list(&self) -> io::Result<Vec<StoredVideoRecord>> {
        if self.ensure_exists().await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.inner.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !is_artifact_name(&filename) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(err) => {
                    // Removed between read_dir and stat.
                    debug!(%filename, "skipping entry: {err}");
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let created = meta.created().unwrap_or(modified);
            records.push(StoredVideoRecord {
                url: public_url(&filename),
                filename,
                size: meta.len(),
                created_at: DateTime::<Utc>::from(created),
                modified_at: DateTime::<Utc>::from(modified),
            });
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(records)
    }

    /// Writes `bytes` as `filename`. Returns the number of bytes written.
    pub async fn write(&self, filename: &str, bytes: Bytes) -> io::Result<u64> {
        let source = stream::once(async move { Ok::<_, Infallible>(bytes) });
        self.write_stream(filename, source)
            .await
            .map_err(|err| match err {
                StreamWriteError::Source(never) => match never {},
                StreamWriteError::Io(err) => err,
            })
    }

    /// Copies `source` chunk by chunk into `filename`, never holding more than
    /// one chunk in memory.
    pub async fn write_stream<S, E>(
        &self,
        filename: &str,
        source: S,
    ) -> Result<u64, StreamWriteError<E>>
    where
        S: Stream<Item = Result<Bytes, E>>,
    {
        let target = self.resolve(filename).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid artifact filename: {filename:?}"),
            )
        })?;
        self.ensure_exists().await?;

        let partial = self.inner.dir.join(format!(".{filename}.part"));
        let result = match copy_into(&partial, source).await {
            Ok(written) => fs::rename(&partial, &target)
                .await
                .map(|()| written)
                .map_err(StreamWriteError::Io),
            Err(err) => Err(err),
        };

        match &result {
            Ok(written) => info!(path = %target.display(), bytes = written, "stored video"),
            Err(_) => {
                if let Err(err) = fs::remove_file(&partial).await
                    && err.kind() != io::ErrorKind::NotFound
                {
                    warn!(path = %partial.display(), "failed to remove partial file: {err}");
                }
            }
        }
        result
    }

    /// Maps a public filename to its path inside the store. Rejects anything
    /// that is not a single plain path segment.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !filename.starts_with('.') => {
                Some(self.inner.dir.join(filename))
            }
            _ => None,
        }
    }

    /// Unix time in milliseconds, bumped past the last stamp this store
    /// handed out so two artifacts never share one.
    pub fn next_stamp(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let previous = self
            .inner
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

async fn copy_into<S, E>(path: &Path, source: S) -> Result<u64, StreamWriteError<E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let mut file = fs::File::create(path).await?;
    let mut source = std::pin::pin!(source);
    let mut written: u64 = 0;
    while let Some(chunk) = source.next().await {
        let chunk = chunk.map_err(StreamWriteError::Source)?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

fn is_artifact_name(filename: &str) -> bool {
    !filename.starts_with('.')
        && Path::new(filename)
            .extension()
            .is_some_and(|ext| ext == ARTIFACT_EXTENSION)
}

pub fn public_url(filename: &str) -> String {
    format!("/{VIDEOS_SUBDIR}/{filename}")
}

/// Builds `{stem}_with_subtitles_{stamp}.mp4` from an uploaded filename.
///
/// Only the final extension is dropped. Directory components are ignored and
/// characters outside `[A-Za-z0-9._-]` become `_` so the name is safe to use
/// as a URL path segment. Long stems are cut so the name always fits on disk.
pub fn artifact_filename(original: &str, stamp_ms: u64) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match base.rfind('.') {
        Some(idx) if idx + 1 < base.len() => &base[..idx],
        _ => base,
    };
    let mut stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // ASCII only at this point, so any byte index is a char boundary.
    stem.truncate(MAX_STEM_BYTES);
    if stem.trim_matches(['.', '_']).is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    format!("{stem}{ARTIFACT_SUFFIX}{stamp_ms}.{ARTIFACT_EXTENSION}")
}
