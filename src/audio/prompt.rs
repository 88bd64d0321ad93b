use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use hound::{SampleFormat, WavReader};

use crate::config::PromptConfig;
use crate::error::PromptError;

pub const LISTENING_PROMPT: &str = "listening";
pub const PROCESSING_PROMPT: &str = "processing";
pub const NOT_CONFIGURED_PROMPT: &str = "not_configured";

/// Loads named prompt audio ("listening", "processing", "not_configured")
/// from disk and caches the decoded bytes for the lifetime of the store.
///
/// A prompt is either `<name>.pcm` (raw 16 kHz/16-bit/mono, passed through)
/// or `<name>.wav` (decoded with hound). File I/O runs off the runtime.
pub struct PromptStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl PromptStore {
    pub fn new(cfg: PromptConfig) -> Self {
        Self {
            dir: cfg.dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self, name: &str) -> Result<Arc<Vec<u8>>, PromptError> {
        if let Some(bytes) = self.cache.lock().unwrap().get(name) {
            return Ok(Arc::clone(bytes));
        }

        let dir = self.dir.clone();
        let owned = name.to_string();
        let bytes = tokio::task::spawn_blocking(move || read_prompt_file(&dir, &owned))
            .await
            .map_err(|err| PromptError::Decode(err.to_string()))??;

        let bytes = Arc::new(bytes);
        self.cache
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }
}

fn read_prompt_file(dir: &Path, name: &str) -> Result<Vec<u8>, PromptError> {
    let pcm_path = dir.join(format!("{name}.pcm"));
    if pcm_path.is_file() {
        return Ok(std::fs::read(pcm_path)?);
    }
    let wav_path = dir.join(format!("{name}.wav"));
    if wav_path.is_file() {
        return wav_to_pcm16(&wav_path).map_err(|err| PromptError::Decode(err.to_string()));
    }
    Err(PromptError::NotFound(name.to_string()))
}

/// Decodes a 16-bit mono WAV file to raw little-endian PCM bytes.
fn wav_to_pcm16(path: &Path) -> Result<Vec<u8>> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(anyhow!(
            "unsupported wav format: {:?}/{} bit",
            spec.sample_format,
            spec.bits_per_sample
        ));
    }
    if spec.channels != 1 {
        return Err(anyhow!("expected mono wav, got {} channels", spec.channels));
    }
    let mut out = Vec::new();
    for sample in reader.samples::<i16>() {
        out.extend_from_slice(&sample?.to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn store_for(dir: &Path) -> PromptStore {
        PromptStore::new(PromptConfig {
            dir: dir.to_path_buf(),
        })
    }

    #[tokio::test]
    async fn loads_raw_pcm_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("listening.pcm"), [1u8, 2, 3, 4]).unwrap();
        let store = store_for(dir.path());
        let bytes = store.load(LISTENING_PROMPT).await.unwrap();
        assert_eq!(*bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn decodes_wav_prompt_to_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let path = dir.path().join("processing.wav");
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for sample in [100i16, -100, 2000] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let store = store_for(dir.path());
        let bytes = store.load(PROCESSING_PROMPT).await.unwrap();
        let mut expected = Vec::new();
        for sample in [100i16, -100, 2000] {
            expected.extend_from_slice(&sample.to_le_bytes());
        }
        assert_eq!(*bytes, expected);
    }

    #[tokio::test]
    async fn caches_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_configured.pcm");
        std::fs::write(&path, [9u8, 9]).unwrap();
        let store = store_for(dir.path());
        store.load(NOT_CONFIGURED_PROMPT).await.unwrap();

        // Source file gone; the cached bytes still serve.
        std::fs::remove_file(&path).unwrap();
        let bytes = store.load(NOT_CONFIGURED_PROMPT).await.unwrap();
        assert_eq!(*bytes, vec![9, 9]);
    }

    #[tokio::test]
    async fn missing_prompt_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_for(dir.path());
        assert!(matches!(
            store.load("no_such").await,
            Err(PromptError::NotFound(_))
        ));
    }
}
