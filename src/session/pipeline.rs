use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use uuid::Uuid;

use crate::audio::{AudioSender, PromptStore, LISTENING_PROMPT, PROCESSING_PROMPT};
use crate::config::{AudioSettings, SegmenterConfig, SessionConfig};
use crate::error::{PipelineError, PromptError};
use crate::ports::{
    AssistPipeline, CallTransport, DeviceDirectory, MediaSource, PipelineEvent, PipelineRequest,
    SpeechMetadata,
};
use crate::queue::ChunkQueue;
use crate::session::CallId;
use crate::vad::VoiceSegmenter;

/// Capacity of the audio channel feeding one pipeline run. Small on
/// purpose: the pipeline pulls, the feeder suspends.
const PIPELINE_AUDIO_CAPACITY: usize = 32;

/// How one wait/stream/pipeline cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Pipeline ran to the end (or no speech arrived before the transport
    /// closed the audio stream). Synthesized audio may still be in flight.
    Completed,
    /// Caller hang-up: inter-chunk silence or the whole-cycle deadline.
    TimedOut,
    /// Pipeline failure or external cancellation; the call stays up.
    Cancelled,
}

struct CycleSlot {
    cancel: oneshot::Sender<()>,
    generation: u64,
}

#[derive(Default)]
struct SessionState {
    conversation_id: Option<String>,
    session_id: Option<String>,
    cycle: Option<CycleSlot>,
    generation: u64,
}

/// Per-call state for a configured device: conversation context, the
/// single-flight cycle slot, the pending-chunk queue.
///
/// One instance per accepted call; never shared across calls, so a new
/// call always starts with a fresh conversation.
pub struct CallSession {
    call_id: CallId,
    cfg: SessionConfig,
    segmenter_cfg: SegmenterConfig,
    transport: Arc<dyn CallTransport>,
    pipeline: Arc<dyn AssistPipeline>,
    media: Arc<dyn MediaSource>,
    prompts: Arc<PromptStore>,
    sender: AudioSender,
    pipeline_id: Option<String>,
    queue: ChunkQueue,
    state: Mutex<SessionState>,
}

impl CallSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        call_id: impl Into<CallId>,
        transport: Arc<dyn CallTransport>,
        pipeline: Arc<dyn AssistPipeline>,
        media: Arc<dyn MediaSource>,
        prompts: Arc<PromptStore>,
        pipeline_id: Option<String>,
        cfg: SessionConfig,
        segmenter_cfg: SegmenterConfig,
        audio: AudioSettings,
    ) -> Arc<Self> {
        let sender = AudioSender::new(Arc::clone(&transport), audio);
        Arc::new(Self {
            call_id: call_id.into(),
            cfg,
            segmenter_cfg,
            transport,
            pipeline,
            media,
            prompts,
            sender,
            pipeline_id,
            queue: ChunkQueue::new(),
            state: Mutex::new(SessionState::default()),
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.state.lock().unwrap().conversation_id.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().unwrap().session_id.clone()
    }

    pub(crate) fn cycle_active(&self) -> bool {
        self.state.lock().unwrap().cycle.is_some()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Cancels the active cycle, if any. Safe in every state; the cycle
    /// resolves as Cancelled and the call stays connected.
    pub fn cancel_cycle(&self) {
        let slot = self.state.lock().unwrap().cycle.take();
        if let Some(slot) = slot {
            let _ = slot.cancel.send(());
        }
    }

    async fn wait_for_speech(
        &self,
        segmenter: &mut VoiceSegmenter,
        lookback: &mut VecDeque<Vec<u8>>,
    ) -> Result<bool, CycleError> {
        loop {
            let chunk = timeout(self.cfg.audio_timeout, self.queue.pop())
                .await
                .map_err(|_| CycleError::SilenceTimeout)?;
            if chunk.is_empty() {
                // transport signalled end of audio
                return Ok(false);
            }
            segmenter.process(&chunk);
            if segmenter.in_command() {
                return Ok(true);
            }
            // Bounded lookback; the oldest pre-speech audio falls off first.
            if lookback.len() == self.cfg.pre_speech_chunks {
                lookback.pop_front();
            }
            lookback.push_back(chunk);
        }
    }

    async fn send_media(&self, media_id: &str) {
        if self.transport.is_closed() {
            return;
        }
        match self.media.resolve(media_id).await {
            Ok(bytes) => self.sender.send_pcm(&bytes, Duration::ZERO).await,
            Err(err) => warn!(
                "[call {}] media {} unavailable: {}",
                self.call_id, media_id, err
            ),
        }
    }

    async fn play_prompt(&self, name: &str, delay: Duration) -> Result<(), PromptError> {
        let bytes = self.prompts.load(name).await?;
        self.sender.send_pcm(&bytes, delay).await;
        Ok(())
    }

    fn clear_session_id(&self) {
        self.state.lock().unwrap().session_id = None;
    }

    fn finish_cycle(&self, outcome: CycleOutcome, generation: u64) {
        if outcome == CycleOutcome::TimedOut {
            self.clear_session_id();
            self.transport.disconnect();
        }
        self.queue.clear();
        let mut st = self.state.lock().unwrap();
        if st.cycle.as_ref().map(|slot| slot.generation) == Some(generation) {
            st.cycle = None;
        }
    }
}

enum CycleError {
    SilenceTimeout,
    Pipeline(PipelineError),
}

enum StreamEnd {
    /// Command finished (or the transport closed the audio stream).
    Natural,
    /// Inter-chunk timeout: the caller hung up mid-command.
    HangUp,
    /// The pipeline stopped consuming audio.
    ConsumerGone,
}

/// Chunk-arrival entry point: at most one cycle task per session. The
/// check-and-spawn happens under the state lock; every other chunk merely
/// enqueues.
pub(crate) fn spawn_cycle_if_idle(session: &Arc<CallSession>) {
    let mut st = session.state.lock().unwrap();
    if st.cycle.is_some() {
        return;
    }
    // Stale audio from the previous cycle must not leak into this one.
    session.queue.clear();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    st.generation += 1;
    let generation = st.generation;
    st.cycle = Some(CycleSlot {
        cancel: cancel_tx,
        generation,
    });
    drop(st);
    let session = Arc::clone(session);
    tokio::spawn(async move {
        run_cycle(session, cancel_rx, generation).await;
    });
}

/// One full cycle: wait-for-speech, stream the command to the pipeline,
/// react to its events, return to idle.
pub(crate) async fn run_cycle(
    session: Arc<CallSession>,
    cancel: oneshot::Receiver<()>,
    generation: u64,
) -> CycleOutcome {
    begin_utterance(&session);

    let outcome = tokio::select! {
        _ = cancel => {
            info!("[call {}] cycle cancelled", session.call_id);
            CycleOutcome::Cancelled
        }
        result = timeout(session.cfg.pipeline_deadline, cycle_body(&session)) => match result {
            Err(_) => {
                debug!("[call {}] pipeline timeout", session.call_id);
                CycleOutcome::TimedOut
            }
            Ok(Ok(())) => CycleOutcome::Completed,
            Ok(Err(CycleError::SilenceTimeout)) => {
                debug!("[call {}] no audio, caller hung up", session.call_id);
                CycleOutcome::TimedOut
            }
            Ok(Err(CycleError::Pipeline(err))) => {
                warn!("[call {}] pipeline failed: {}", session.call_id, err);
                CycleOutcome::Cancelled
            }
        }
    };

    session.finish_cycle(outcome, generation);
    outcome
}

/// First utterance of the call gets a session id and, if enabled, the
/// "listening" tone. The tone is fire-and-forget so the wait loop starts
/// immediately.
fn begin_utterance(session: &Arc<CallSession>) {
    let assigned = {
        let mut st = session.state.lock().unwrap();
        if st.session_id.is_none() {
            st.session_id = Some(Uuid::new_v4().to_string());
            true
        } else {
            false
        }
    };
    if assigned && session.cfg.listening_tone_enabled {
        spawn_prompt(session, LISTENING_PROMPT, session.cfg.tone_delay);
    }
}

async fn cycle_body(session: &Arc<CallSession>) -> Result<(), CycleError> {
    let mut segmenter = VoiceSegmenter::new(session.segmenter_cfg.clone());
    let mut lookback: VecDeque<Vec<u8>> = VecDeque::new();
    if !session.wait_for_speech(&mut segmenter, &mut lookback).await? {
        debug!("[call {}] no speech detected", session.call_id);
        return Ok(());
    }

    debug!("[call {}] starting pipeline", session.call_id);

    let (audio_tx, audio_rx) = mpsc::channel(PIPELINE_AUDIO_CAPACITY);
    let request = PipelineRequest {
        audio: audio_rx,
        metadata: SpeechMetadata::default(),
        conversation_id: session.state.lock().unwrap().conversation_id.clone(),
        pipeline_id: session.pipeline_id.clone(),
    };

    let feed = stream_command_audio(session, segmenter, lookback, audio_tx);
    let run = session.pipeline.run(request);
    let (_, events) = tokio::join!(feed, run);
    let events = events.map_err(CycleError::Pipeline)?;
    handle_events(session, events);
    Ok(())
}

/// Feeds the pipeline its lazy audio sequence: buffered pre-speech chunks
/// first, in arrival order, then live chunks until the segmenter reports
/// the command finished. The terminating chunk is not forwarded.
async fn stream_command_audio(
    session: &Arc<CallSession>,
    mut segmenter: VoiceSegmenter,
    lookback: VecDeque<Vec<u8>>,
    audio_tx: mpsc::Sender<Vec<u8>>,
) {
    let mut end = StreamEnd::Natural;

    for chunk in lookback {
        if audio_tx.send(chunk).await.is_err() {
            end = StreamEnd::ConsumerGone;
            break;
        }
    }

    if matches!(end, StreamEnd::Natural) {
        loop {
            let chunk = match timeout(session.cfg.audio_timeout, session.queue.pop()).await {
                Ok(chunk) => chunk,
                Err(_) => {
                    // Caller hung up mid-command.
                    debug!("[call {}] audio timeout", session.call_id);
                    session.clear_session_id();
                    session.transport.disconnect();
                    end = StreamEnd::HangUp;
                    break;
                }
            };
            if chunk.is_empty() {
                break;
            }
            if !segmenter.process(&chunk) {
                // Command finished.
                break;
            }
            if audio_tx.send(chunk).await.is_err() {
                end = StreamEnd::ConsumerGone;
                break;
            }
        }
    }

    if matches!(end, StreamEnd::Natural) && session.cfg.processing_tone_enabled {
        spawn_prompt(session, PROCESSING_PROMPT, Duration::ZERO);
    }
    session.queue.clear();
}

/// Reacts to the pipeline's event sequence. Synthesized-audio delivery is
/// detached: the cycle returns to idle without waiting for playback.
fn handle_events(session: &Arc<CallSession>, events: Vec<PipelineEvent>) {
    for event in events {
        match event {
            PipelineEvent::RunStart => {}
            PipelineEvent::SttEnd { text } => {
                debug!("[call {}] transcript: {}", session.call_id, text);
            }
            PipelineEvent::IntentEnd { conversation_id } => {
                session.state.lock().unwrap().conversation_id = Some(conversation_id);
            }
            PipelineEvent::TtsEnd { media_id } => {
                let session = Arc::clone(session);
                tokio::spawn(async move {
                    session.send_media(&media_id).await;
                });
            }
            PipelineEvent::Error { message } => {
                warn!("[call {}] pipeline reported: {}", session.call_id, message);
            }
        }
    }
}

fn spawn_prompt(session: &Arc<CallSession>, name: &'static str, delay: Duration) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        if let Err(err) = session.play_prompt(name, delay).await {
            warn!(
                "[call {}] {} prompt skipped: {}",
                session.call_id, name, err
            );
        }
    });
}

/// Handler for calls from a configured device: runs the recognition
/// pipeline in a loop, one utterance per cycle.
pub struct PipelineCallHandler {
    session: Arc<CallSession>,
    device_id: String,
    directory: Arc<dyn DeviceDirectory>,
}

impl PipelineCallHandler {
    pub fn new(
        session: Arc<CallSession>,
        device_id: impl Into<String>,
        directory: Arc<dyn DeviceDirectory>,
    ) -> Self {
        Self {
            session,
            device_id: device_id.into(),
            directory,
        }
    }

    pub fn on_chunk(&self, chunk: Vec<u8>) {
        spawn_cycle_if_idle(&self.session);
        self.session.queue.push(chunk);
    }

    pub fn connection_made(&self) {
        info!(
            "[call {}] connected (device {})",
            self.session.call_id, self.device_id
        );
        self.directory.set_active(&self.device_id, true);
    }

    pub fn connection_lost(&self) {
        info!("[call {}] connection lost", self.session.call_id);
        self.directory.set_active(&self.device_id, false);
    }

    pub fn cancel(&self) {
        self.session.cancel_cycle();
    }

    pub fn session(&self) -> &Arc<CallSession> {
        &self.session
    }
}
