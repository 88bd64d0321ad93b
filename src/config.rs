use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Fixed outgoing/incoming audio parameters. STT and TTS both expect
/// 16 kHz mono with 16-bit samples; frames are sliced at 20 ms.
#[derive(Clone, Debug)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub sample_width: u16,
    pub channels: u16,
    pub frame_ms: u64,
    /// Sleep slightly longer than real time per frame so the receiver's
    /// jitter buffer never underruns.
    pub pacing_ratio: f64,
}

impl AudioSettings {
    pub fn from_env() -> Self {
        Self {
            sample_rate: env_u32("AUDIO_SAMPLE_RATE", 16_000),
            sample_width: env_u16("AUDIO_SAMPLE_WIDTH", 2),
            channels: env_u16("AUDIO_CHANNELS", 1),
            frame_ms: env_u64("AUDIO_FRAME_MS", 20),
            pacing_ratio: env_f64("AUDIO_PACING_RATIO", 1.01),
        }
    }

    /// Bytes of PCM covering one millisecond.
    pub fn bytes_per_ms(&self) -> usize {
        (self.sample_rate as usize / 1000) * self.sample_width as usize * self.channels as usize
    }

    /// Bytes of PCM covering one outgoing frame.
    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_ms() * self.frame_ms as usize
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    /// Frame duration stretched by the pacing ratio.
    pub fn paced_frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_duration().as_secs_f64() * self.pacing_ratio)
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            sample_width: 2,
            channels: 1,
            frame_ms: 20,
            pacing_ratio: 1.01,
        }
    }
}

static AUDIO_SETTINGS: OnceLock<AudioSettings> = OnceLock::new();

pub fn audio_settings() -> &'static AudioSettings {
    AUDIO_SETTINGS.get_or_init(AudioSettings::from_env)
}

/// Energy-based voice command detection thresholds.
#[derive(Clone, Debug)]
pub struct SegmenterConfig {
    pub rms_threshold: u32,
    /// Consecutive voiced audio required before a command opens.
    pub speech_start_ms: u64,
    /// Trailing silence that closes an open command.
    pub command_silence_ms: u64,
    /// Hard cap on command length.
    pub max_command_ms: u64,
}

impl SegmenterConfig {
    pub fn from_env() -> Self {
        Self {
            rms_threshold: env_u32("VAD_ENERGY_THRESHOLD", 500),
            speech_start_ms: env_u64("VAD_SPEECH_START_MS", 300),
            command_silence_ms: env_u64("VAD_COMMAND_SILENCE_MS", 500),
            max_command_ms: env_u64("VAD_MAX_COMMAND_MS", 30_000),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 500,
            speech_start_ms: 300,
            command_silence_ms: 500,
            max_command_ms: 30_000,
        }
    }
}

static SEGMENTER_CONFIG: OnceLock<SegmenterConfig> = OnceLock::new();

pub fn segmenter_config() -> &'static SegmenterConfig {
    SEGMENTER_CONFIG.get_or_init(SegmenterConfig::from_env)
}

/// Per-call pipeline cycle tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// End-to-end deadline for one wait/stream/pipeline cycle.
    pub pipeline_deadline: Duration,
    /// Longest allowed gap between chunks; expiry means the caller hung up.
    pub audio_timeout: Duration,
    pub listening_tone_enabled: bool,
    pub processing_tone_enabled: bool,
    /// Lookback capacity so speech onset before the detector trigger
    /// is not lost (~2 s at 20 ms chunks).
    pub pre_speech_chunks: usize,
    /// Lead-in silence before the listening tone.
    pub tone_delay: Duration,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            pipeline_deadline: env_duration_sec("PIPELINE_DEADLINE_SEC", 30),
            audio_timeout: env_duration_ms("AUDIO_TIMEOUT_MS", 2_000),
            listening_tone_enabled: env_bool("LISTENING_TONE_ENABLED", true),
            processing_tone_enabled: env_bool("PROCESSING_TONE_ENABLED", true),
            pre_speech_chunks: env_u64("PRE_SPEECH_CHUNKS", 100) as usize,
            tone_delay: env_duration_ms("TONE_DELAY_MS", 200),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipeline_deadline: Duration::from_secs(30),
            audio_timeout: Duration::from_secs(2),
            listening_tone_enabled: true,
            processing_tone_enabled: true,
            pre_speech_chunks: 100,
            tone_delay: Duration::from_millis(200),
        }
    }
}

static SESSION_CONFIG: OnceLock<SessionConfig> = OnceLock::new();

pub fn session_config() -> &'static SessionConfig {
    SESSION_CONFIG.get_or_init(SessionConfig::from_env)
}

/// Cadence of the "not configured" announcement loop.
#[derive(Clone, Debug)]
pub struct FallbackConfig {
    pub message_delay: Duration,
    pub loop_delay: Duration,
}

impl FallbackConfig {
    pub fn from_env() -> Self {
        Self {
            message_delay: env_duration_ms("FALLBACK_MESSAGE_DELAY_MS", 1_000),
            loop_delay: env_duration_ms("FALLBACK_LOOP_DELAY_MS", 2_000),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            message_delay: Duration::from_secs(1),
            loop_delay: Duration::from_secs(2),
        }
    }
}

static FALLBACK_CONFIG: OnceLock<FallbackConfig> = OnceLock::new();

pub fn fallback_config() -> &'static FallbackConfig {
    FALLBACK_CONFIG.get_or_init(FallbackConfig::from_env)
}

#[derive(Clone, Debug)]
pub struct PromptConfig {
    pub dir: PathBuf,
}

impl PromptConfig {
    pub fn from_env() -> Self {
        let dir = env_non_empty("PROMPT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts")));
        Self { dir }
    }
}

static PROMPT_CONFIG: OnceLock<PromptConfig> = OnceLock::new();

pub fn prompt_config() -> &'static PromptConfig {
    PROMPT_CONFIG.get_or_init(PromptConfig::from_env)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Stdout,
    File,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub mode: LogMode,
    pub dir: Option<String>,
    pub file_name: String,
}

impl LoggingConfig {
    fn from_env() -> Self {
        let format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let dir = env_non_empty("LOG_DIR");
        let mode = if dir.is_some() {
            LogMode::File
        } else {
            LogMode::Stdout
        };
        Self {
            format,
            mode,
            dir,
            file_name: std::env::var("LOG_FILE").unwrap_or_else(|_| "voicebridge.log".to_string()),
        }
    }
}

static LOGGING_CONFIG: OnceLock<LoggingConfig> = OnceLock::new();

pub fn logging_config() -> &'static LoggingConfig {
    LOGGING_CONFIG.get_or_init(LoggingConfig::from_env)
}

fn env_duration_ms(key: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn env_duration_sec(key: &str, default_sec: u64) -> Duration {
    let sec = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_sec);
    Duration::from_secs(sec)
}

fn env_bool(key: &str, default_value: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default_value)
}

fn env_u16(key: &str, default_value: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default_value)
}

fn env_u32(key: &str, default_value: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn env_u64(key: &str, default_value: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn env_f64(key: &str, default_value: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default_value)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
