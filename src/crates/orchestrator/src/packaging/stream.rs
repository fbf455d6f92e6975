//! Staged progress frames for streaming deliveries.

use super::archive::{archive_entries, write_archive};
use crate::app::GeneratedApp;
use crate::extraction::validate_generated_code;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Default channel capacity for progress streams.
pub const DEFAULT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Initializing,
    Generating,
    Validating,
    Packaging,
    Complete,
    Error,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Initializing => "initializing",
            ProgressStage::Generating => "generating",
            ProgressStage::Validating => "validating",
            ProgressStage::Packaging => "packaging",
            ProgressStage::Complete => "complete",
            ProgressStage::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Complete | ProgressStage::Error)
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One server-sent progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressFrame {
    pub stage: ProgressStage,
    /// Percentage, 0-100.
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProgressFrame {
    pub fn new(stage: ProgressStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The receiving side went away.
#[derive(Debug, Error)]
#[error("progress stream closed by receiver")]
pub struct StreamClosed;

/// Sends frames and keeps progress non-decreasing.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    sender: mpsc::Sender<ProgressFrame>,
    last: Arc<AtomicU8>,
}

impl ProgressEmitter {
    /// Create an emitter and the stream it feeds.
    pub fn channel(buffer: usize) -> (Self, ReceiverStream<ProgressFrame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let emitter = Self {
            sender,
            last: Arc::new(AtomicU8::new(0)),
        };
        (emitter, ReceiverStream::new(receiver))
    }

    /// Send a frame, raising its progress to the last value sent if needed.
    pub async fn send(&self, mut frame: ProgressFrame) -> Result<(), StreamClosed> {
        let previous = self.last.fetch_max(frame.progress, Ordering::SeqCst);
        frame.progress = frame.progress.max(previous);
        debug!(stage = %frame.stage, progress = frame.progress, "Progress");
        self.sender.send(frame).await.map_err(|_| StreamClosed)
    }

    pub async fn stage(
        &self,
        stage: ProgressStage,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<(), StreamClosed> {
        self.send(ProgressFrame::new(stage, progress, message)).await
    }

    pub async fn complete(
        &self,
        message: impl Into<String>,
        data: Value,
    ) -> Result<(), StreamClosed> {
        self.send(ProgressFrame::new(ProgressStage::Complete, 100, message).with_data(data))
            .await
    }

    /// Terminal error frame, keeping the progress reached so far.
    pub async fn fail(&self, message: impl Into<String>) -> Result<(), StreamClosed> {
        let progress = self.last.load(Ordering::SeqCst);
        self.send(ProgressFrame::new(ProgressStage::Error, progress, message))
            .await
    }

    pub fn last_progress(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Payload of the `complete` frame: the base64 archive and an app summary.
pub fn complete_payload(app: &GeneratedApp, archive: &[u8]) -> Value {
    json!({
        "archive": BASE64.encode(archive),
        "encoding": "base64",
        "format": "tar.gz",
        "app": {
            "name": app.name,
            "description": app.description,
            "files": app.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            "dependencies": app.dependencies,
            "envVars": app.env_vars,
            "metadata": app.metadata,
        }
    })
}

/// Package `app` while reporting progress.
///
/// Frames run `initializing(0)`, one `generating` frame per file between 10
/// and 60, `validating(70)`, `packaging(85)` and `complete(100)` carrying
/// the archive. A packaging failure ends the stream with an `error` frame.
pub fn package_stream(app: GeneratedApp) -> ReceiverStream<ProgressFrame> {
    let (emitter, stream) = ProgressEmitter::channel(DEFAULT_BUFFER);

    tokio::spawn(async move {
        if let Err(StreamClosed) = emit_package(&emitter, &app).await {
            debug!(app = %app.name, "Packaging stream receiver dropped");
        }
    });

    stream
}

async fn emit_package(emitter: &ProgressEmitter, app: &GeneratedApp) -> Result<(), StreamClosed> {
    emitter
        .stage(ProgressStage::Initializing, 0, format!("Packaging {} files", app.files.len()))
        .await?;

    let total = app.files.len().max(1);
    for (i, file) in app.files.iter().enumerate() {
        let progress = 10 + (50 * (i + 1) / total) as u8;
        emitter
            .stage(ProgressStage::Generating, progress, format!("Added {}", file.path))
            .await?;
    }

    let warnings = validate_generated_code(&app.files);
    emitter
        .stage(
            ProgressStage::Validating,
            70,
            format!("{} validation warnings", warnings.len()),
        )
        .await?;

    emitter
        .stage(ProgressStage::Packaging, 85, "Writing archive")
        .await?;

    let mtime = app.metadata.generated_at.timestamp().max(0) as u64;
    let archive = archive_entries(app).and_then(|entries| write_archive(&entries, mtime));
    match archive {
        Ok(bytes) => {
            let message = format!("Packaged {} ({} bytes)", app.name, bytes.len());
            emitter
                .complete(message, complete_payload(app, &bytes))
                .await
        }
        Err(e) => {
            warn!(error = %e, "Packaging failed");
            emitter.fail(e.to_string()).await
        }
    }
}
