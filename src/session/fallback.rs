use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;
use tokio::time::sleep;

use crate::audio::{AudioSender, PromptStore, NOT_CONFIGURED_PROMPT};
use crate::config::{AudioSettings, FallbackConfig};
use crate::ports::CallTransport;

/// Handler for calls that are not bound to a configured device: loops a
/// pre-recorded "not configured" message on a fixed cadence.
///
/// One announcement task at a time; once the message and the cooldown have
/// run, the next incoming chunk re-triggers the loop. The message bytes
/// are loaded once and cached by the prompt store.
pub struct FallbackAnnouncer {
    transport: Arc<dyn CallTransport>,
    prompts: Arc<PromptStore>,
    sender: AudioSender,
    cfg: FallbackConfig,
    announcing: Arc<AtomicBool>,
}

impl FallbackAnnouncer {
    pub fn new(
        transport: Arc<dyn CallTransport>,
        prompts: Arc<PromptStore>,
        audio: AudioSettings,
        cfg: FallbackConfig,
    ) -> Self {
        let sender = AudioSender::new(Arc::clone(&transport), audio);
        Self {
            transport,
            prompts,
            sender,
            cfg,
            announcing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn on_chunk(&self, _chunk: Vec<u8>) {
        if self.transport.is_closed() {
            return;
        }
        if self
            .announcing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let prompts = Arc::clone(&self.prompts);
        let sender = self.sender.clone();
        let cfg = self.cfg.clone();
        let announcing = Arc::clone(&self.announcing);
        tokio::spawn(async move {
            match prompts.load(NOT_CONFIGURED_PROMPT).await {
                Ok(bytes) => sender.send_pcm(&bytes, cfg.message_delay).await,
                Err(err) => warn!("[fallback] announcement skipped: {}", err),
            }
            sleep(cfg.loop_delay).await;
            // Allow the message to play again.
            announcing.store(false, Ordering::SeqCst);
        });
    }

    pub fn connection_made(&self) {}

    pub fn connection_lost(&self) {}
}
