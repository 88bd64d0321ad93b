//! Real-time voice-call audio pipeline controller: detects speech on an
//! incoming call, streams it to a recognition pipeline, and paces the
//! synthesized response back to the caller.

pub mod audio;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod ports;
pub mod queue;
pub mod session;
pub mod vad;

pub use handler::{CallHandler, CallRouter};
pub use ports::{CallInfo, PipelineEvent, PipelineRequest, SpeechMetadata};
pub use session::{CallSession, CycleOutcome, FallbackAnnouncer, PipelineCallHandler};
pub use vad::VoiceSegmenter;
