use crate::audio::rms_energy;
use crate::config::SegmenterConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SegmenterState {
    BeforeCommand,
    InCommand,
    Finished,
}

/// Detects the start and end of one voice command from a stream of
/// fixed-format PCM chunks.
///
/// The detector itself keeps no audio: callers buffer pre-speech chunks in a
/// bounded lookback and replay them once `in_command` flips. One instance
/// covers one utterance; construct a fresh one (or `reset`) for the next.
pub struct VoiceSegmenter {
    cfg: SegmenterConfig,
    state: SegmenterState,
    voiced_ms: u64,
    silent_ms: u64,
    command_ms: u64,
}

impl VoiceSegmenter {
    pub fn new(cfg: SegmenterConfig) -> Self {
        Self {
            cfg,
            state: SegmenterState::BeforeCommand,
            voiced_ms: 0,
            silent_ms: 0,
            command_ms: 0,
        }
    }

    pub fn in_command(&self) -> bool {
        self.state == SegmenterState::InCommand
    }

    pub fn reset(&mut self) {
        self.state = SegmenterState::BeforeCommand;
        self.voiced_ms = 0;
        self.silent_ms = 0;
        self.command_ms = 0;
    }

    /// Consumes one chunk and returns whether a voice command is still in
    /// progress. The first `false` marks the chunk excluded from the
    /// command.
    pub fn process(&mut self, chunk: &[u8]) -> bool {
        let chunk_ms = chunk_duration_ms(chunk);
        if chunk_ms == 0 {
            return self.state != SegmenterState::Finished;
        }

        let is_voice = rms_energy(chunk) >= self.cfg.rms_threshold;

        match self.state {
            SegmenterState::BeforeCommand => {
                if is_voice {
                    self.voiced_ms = self.voiced_ms.saturating_add(chunk_ms);
                    if self.voiced_ms >= self.cfg.speech_start_ms {
                        self.state = SegmenterState::InCommand;
                        self.command_ms = self.voiced_ms;
                        self.silent_ms = 0;
                    }
                } else {
                    self.voiced_ms = 0;
                }
                true
            }
            SegmenterState::InCommand => {
                self.command_ms = self.command_ms.saturating_add(chunk_ms);
                if is_voice {
                    self.silent_ms = 0;
                } else {
                    self.silent_ms = self.silent_ms.saturating_add(chunk_ms);
                }

                if self.silent_ms >= self.cfg.command_silence_ms
                    || self.command_ms >= self.cfg.max_command_ms
                {
                    self.state = SegmenterState::Finished;
                    return false;
                }
                true
            }
            SegmenterState::Finished => false,
        }
    }
}

/// Milliseconds of audio in a chunk at the fixed 16 kHz/16-bit/mono format.
fn chunk_duration_ms(chunk: &[u8]) -> u64 {
    (chunk.len() as u64 / 2) * 1000 / 16_000
}
