use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::time::sleep;

use crate::config::AudioSettings;
use crate::ports::CallTransport;

/// Packetizes raw PCM into fixed-size frames and paces them to real time
/// against the call transport.
///
/// Pacing uses the configured ratio (1.01 by default) so the receiver's
/// buffer stays ahead. Sending to a closed transport is a silent no-op.
#[derive(Clone)]
pub struct AudioSender {
    transport: Arc<dyn CallTransport>,
    settings: AudioSettings,
}

impl AudioSender {
    pub fn new(transport: Arc<dyn CallTransport>, settings: AudioSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Sends `silence_before` of zeroed frames, then the PCM itself, one
    /// paced frame at a time. The final short frame is zero-padded.
    pub async fn send_pcm(&self, pcm: &[u8], silence_before: Duration) {
        if self.transport.is_closed() {
            return;
        }

        let frame_bytes = self.settings.frame_bytes();
        let pace = self.settings.paced_frame_duration();

        let silence_frames =
            (silence_before.as_millis() as u64 / self.settings.frame_ms.max(1)) as usize;
        if silence_frames > 0 {
            let silence = vec![0u8; frame_bytes];
            for _ in 0..silence_frames {
                if self.transport.is_closed() {
                    return;
                }
                self.transport.send_frame(&silence);
                sleep(pace).await;
            }
        }

        debug!("sending {} byte(s) of audio", pcm.len());

        for frame in pcm.chunks(frame_bytes) {
            if self.transport.is_closed() {
                return;
            }
            if frame.len() == frame_bytes {
                self.transport.send_frame(frame);
            } else {
                let mut padded = frame.to_vec();
                padded.resize(frame_bytes, 0);
                self.transport.send_frame(&padded);
            }
            sleep(pace).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        closed: AtomicBool,
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl CallTransport for RecordingTransport {
        fn send_frame(&self, frame: &[u8]) {
            self.frames.lock().unwrap().push(frame.to_vec());
        }

        fn disconnect(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn fast_settings() -> AudioSettings {
        AudioSettings {
            frame_ms: 20,
            pacing_ratio: 1.01,
            ..AudioSettings::default()
        }
    }

    #[tokio::test]
    async fn packetizes_and_pads_the_tail() {
        let transport = Arc::new(RecordingTransport::default());
        let sender = AudioSender::new(transport.clone(), fast_settings());

        // 2.5 frames of audio
        let pcm = vec![0x11u8; 640 * 2 + 320];
        sender.send_pcm(&pcm, Duration::ZERO).await;

        let frames = transport.frames.lock().unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 640));
        assert_eq!(&frames[2][..320], &pcm[..320]);
        assert!(frames[2][320..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn lead_in_silence_precedes_audio() {
        let transport = Arc::new(RecordingTransport::default());
        let sender = AudioSender::new(transport.clone(), fast_settings());

        sender
            .send_pcm(&vec![0x22u8; 640], Duration::from_millis(60))
            .await;

        let frames = transport.frames.lock().unwrap();
        assert_eq!(frames.len(), 4);
        for silence in &frames[..3] {
            assert!(silence.iter().all(|&b| b == 0));
        }
        assert_eq!(frames[3], vec![0x22u8; 640]);
    }

    #[tokio::test]
    async fn closed_transport_is_a_silent_noop() {
        let transport = Arc::new(RecordingTransport::default());
        transport.disconnect();
        let sender = AudioSender::new(transport.clone(), fast_settings());

        sender.send_pcm(&vec![0x33u8; 1280], Duration::ZERO).await;
        assert!(transport.frames.lock().unwrap().is_empty());
    }
}
