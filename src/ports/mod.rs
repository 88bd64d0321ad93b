use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

pub use crate::error::{MediaError, PipelineError};

pub type PortFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Identifying info for an inbound call, as reported by the transport.
#[derive(Clone, Debug)]
pub struct CallInfo {
    pub call_id: String,
    pub caller: String,
    pub device_id: String,
}

/// Frame-level sink for outgoing audio plus call teardown. Implementations
/// wrap the actual wire transport; sends are best-effort and must never
/// block the runtime.
pub trait CallTransport: Send + Sync {
    fn send_frame(&self, frame: &[u8]);
    fn disconnect(&self);
    fn is_closed(&self) -> bool;
}

/// Speech format descriptor handed to the recognition pipeline alongside
/// the audio stream. Fixed for this core: 16 kHz, 16-bit, mono PCM.
#[derive(Clone, Debug)]
pub struct SpeechMetadata {
    pub sample_rate: u32,
    pub sample_width: u16,
    pub channels: u16,
    pub codec: &'static str,
}

impl Default for SpeechMetadata {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            sample_width: 2,
            channels: 1,
            codec: "pcm",
        }
    }
}

/// One end-to-end recognition/understanding/response run.
///
/// `audio` is a lazy, finite, non-restartable chunk sequence: the caller
/// feeds it while the run is in flight and closes it when the voice command
/// ends. `conversation_id` carries context from earlier utterances of the
/// same call.
pub struct PipelineRequest {
    pub audio: mpsc::Receiver<Vec<u8>>,
    pub metadata: SpeechMetadata,
    pub conversation_id: Option<String>,
    pub pipeline_id: Option<String>,
}

/// Events emitted by one pipeline run, in order. The core reacts to
/// `IntentEnd` and `TtsEnd`; the rest are logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    RunStart,
    SttEnd { text: String },
    IntentEnd { conversation_id: String },
    TtsEnd { media_id: String },
    Error { message: String },
}

/// Recognition/understanding/response pipeline entry point.
pub trait AssistPipeline: Send + Sync {
    fn run(&self, request: PipelineRequest) -> PortFuture<Result<Vec<PipelineEvent>, PipelineError>>;
}

/// Resolves the opaque handle carried by a `TtsEnd` event to raw PCM bytes.
pub trait MediaSource: Send + Sync {
    fn resolve(&self, media_id: &str) -> PortFuture<Result<Vec<u8>, MediaError>>;
}

/// Device directory: call admission plus the per-device "active" indicator
/// toggled on connection lifecycle events.
pub trait DeviceDirectory: Send + Sync {
    fn allow_call(&self, call: &CallInfo) -> bool;
    fn set_active(&self, device_id: &str, active: bool);
}
