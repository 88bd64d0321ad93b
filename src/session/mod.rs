pub mod fallback;
pub mod pipeline;

pub use fallback::FallbackAnnouncer;
pub use pipeline::{CallSession, CycleOutcome, PipelineCallHandler};

pub type CallId = String;
