use std::sync::Arc;

use log::info;

use crate::audio::PromptStore;
use crate::config;
use crate::ports::{AssistPipeline, CallInfo, CallTransport, DeviceDirectory, MediaSource};
use crate::session::{CallSession, FallbackAnnouncer, PipelineCallHandler};

/// Per-call handler, fixed at admission time: a configured device gets the
/// full pipeline loop, anything else gets the "not configured"
/// announcement loop.
pub enum CallHandler {
    Pipeline(PipelineCallHandler),
    Fallback(FallbackAnnouncer),
}

impl CallHandler {
    pub fn on_chunk(&self, chunk: Vec<u8>) {
        match self {
            CallHandler::Pipeline(handler) => handler.on_chunk(chunk),
            CallHandler::Fallback(announcer) => announcer.on_chunk(chunk),
        }
    }

    pub fn connection_made(&self) {
        match self {
            CallHandler::Pipeline(handler) => handler.connection_made(),
            CallHandler::Fallback(announcer) => announcer.connection_made(),
        }
    }

    pub fn connection_lost(&self) {
        match self {
            CallHandler::Pipeline(handler) => handler.connection_lost(),
            CallHandler::Fallback(announcer) => announcer.connection_lost(),
        }
    }

    /// External cancellation (device reconfiguration etc.); a no-op for
    /// fallback calls.
    pub fn cancel(&self) {
        if let CallHandler::Pipeline(handler) = self {
            handler.cancel();
        }
    }
}

/// Builds one `CallHandler` per accepted call from the shared
/// collaborators.
pub struct CallRouter {
    directory: Arc<dyn DeviceDirectory>,
    pipeline: Arc<dyn AssistPipeline>,
    media: Arc<dyn MediaSource>,
    prompts: Arc<PromptStore>,
    pipeline_id: Option<String>,
}

impl CallRouter {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        pipeline: Arc<dyn AssistPipeline>,
        media: Arc<dyn MediaSource>,
        prompts: Arc<PromptStore>,
        pipeline_id: Option<String>,
    ) -> Self {
        Self {
            directory,
            pipeline,
            media,
            prompts,
            pipeline_id,
        }
    }

    pub fn accept(&self, call: &CallInfo, transport: Arc<dyn CallTransport>) -> CallHandler {
        if self.directory.allow_call(call) {
            let session = CallSession::new(
                call.call_id.clone(),
                transport,
                Arc::clone(&self.pipeline),
                Arc::clone(&self.media),
                Arc::clone(&self.prompts),
                self.pipeline_id.clone(),
                config::session_config().clone(),
                config::segmenter_config().clone(),
                config::audio_settings().clone(),
            );
            CallHandler::Pipeline(PipelineCallHandler::new(
                session,
                call.device_id.clone(),
                Arc::clone(&self.directory),
            ))
        } else {
            info!(
                "[call {}] caller {} has no configured device",
                call.call_id, call.caller
            );
            CallHandler::Fallback(FallbackAnnouncer::new(
                transport,
                Arc::clone(&self.prompts),
                config::audio_settings().clone(),
                config::fallback_config().clone(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptConfig;
    use crate::error::{MediaError, PipelineError};
    use crate::ports::{PipelineEvent, PipelineRequest, PortFuture};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct DummyTransport;

    impl CallTransport for DummyTransport {
        fn send_frame(&self, _frame: &[u8]) {}
        fn disconnect(&self) {}
        fn is_closed(&self) -> bool {
            false
        }
    }

    struct NullPipeline;

    impl AssistPipeline for NullPipeline {
        fn run(
            &self,
            _request: PipelineRequest,
        ) -> PortFuture<Result<Vec<PipelineEvent>, PipelineError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct NullMedia;

    impl MediaSource for NullMedia {
        fn resolve(&self, media_id: &str) -> PortFuture<Result<Vec<u8>, MediaError>> {
            let media_id = media_id.to_string();
            Box::pin(async move { Err(MediaError::UnknownMedia(media_id)) })
        }
    }

    #[derive(Default)]
    struct FakeDirectory {
        allow: AtomicBool,
        active: Mutex<Vec<(String, bool)>>,
    }

    impl DeviceDirectory for FakeDirectory {
        fn allow_call(&self, _call: &CallInfo) -> bool {
            self.allow.load(Ordering::SeqCst)
        }

        fn set_active(&self, device_id: &str, active: bool) {
            self.active
                .lock()
                .unwrap()
                .push((device_id.to_string(), active));
        }
    }

    fn router(directory: Arc<FakeDirectory>) -> CallRouter {
        CallRouter::new(
            directory,
            Arc::new(NullPipeline),
            Arc::new(NullMedia),
            Arc::new(PromptStore::new(PromptConfig {
                dir: std::env::temp_dir().join("voicebridge-router-test"),
            })),
            None,
        )
    }

    fn call_info() -> CallInfo {
        CallInfo {
            call_id: "call-1".to_string(),
            caller: "sip:tester@example.com".to_string(),
            device_id: "device-1".to_string(),
        }
    }

    #[tokio::test]
    async fn allowed_calls_get_the_pipeline_handler() {
        let directory = Arc::new(FakeDirectory::default());
        directory.allow.store(true, Ordering::SeqCst);
        let handler = router(directory.clone()).accept(&call_info(), Arc::new(DummyTransport));
        assert!(matches!(handler, CallHandler::Pipeline(_)));

        handler.connection_made();
        handler.connection_lost();
        let active = directory.active.lock().unwrap();
        assert_eq!(
            active.as_slice(),
            &[
                ("device-1".to_string(), true),
                ("device-1".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn denied_calls_get_the_fallback_handler() {
        let directory = Arc::new(FakeDirectory::default());
        let handler = router(directory.clone()).accept(&call_info(), Arc::new(DummyTransport));
        assert!(matches!(handler, CallHandler::Fallback(_)));

        // Lifecycle events for unconfigured calls touch no device state.
        handler.connection_made();
        handler.connection_lost();
        assert!(directory.active.lock().unwrap().is_empty());
    }
}
