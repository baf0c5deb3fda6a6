use std::path::{Path, PathBuf};

use crate::error::ReaderError;
use crate::voice::Voice;
use crate::{AudioBuffer, SynthesisEngine, SPEED_RANGE};

use super::model::{KokoroError, KokoroModel, SAMPLE_RATE};
use super::phonemizer::EspeakConfig;

/// Parameters for configuring Kokoro model loading.
#[derive(Debug, Clone, Default)]
pub struct KokoroModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
}

/// Kokoro-82M speech synthesizer.
///
/// ```rust,no_run
/// use autoreader::{engines::kokoro::KokoroEngine, SynthesisEngine, Voice};
/// use std::path::Path;
///
/// let mut engine = KokoroEngine::new();
/// engine.load_model(Path::new("models/kokoro"))?;
/// let audio = engine.synthesize("Hello, world!", Voice::AfSky, 1.0)?;
/// println!("{:.1}s of audio", audio.duration_secs());
/// # Ok::<(), autoreader::ReaderError>(())
/// ```
pub struct KokoroEngine {
    model: Option<KokoroModel>,
    model_path: Option<PathBuf>,
    espeak: EspeakConfig,
}

impl Default for KokoroEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KokoroEngine {
    /// Create an engine that runs `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self::with_espeak(EspeakConfig::default())
    }

    pub fn with_espeak(espeak: EspeakConfig) -> Self {
        Self {
            model: None,
            model_path: None,
            espeak,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Voice ids in the loaded archive; empty until a model is loaded.
    pub fn list_voices(&self) -> Vec<&str> {
        self.model
            .as_ref()
            .map(|m| m.voice_ids())
            .unwrap_or_default()
    }
}

impl SynthesisEngine for KokoroEngine {
    type ModelParams = KokoroModelParams;

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), ReaderError> {
        let model =
            KokoroModel::load(model_path, params.num_threads).map_err(ReaderError::ModelLoad)?;

        let available = model.voice_ids();
        let missing: Vec<&str> = Voice::ALL
            .iter()
            .map(|v| v.id())
            .filter(|id| !available.contains(id))
            .collect();
        if !missing.is_empty() {
            log::warn!("Voice archive lacks presets: {}", missing.join(", "));
        }

        self.model = Some(model);
        self.model_path = Some(model_path.to_path_buf());
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model = None;
        self.model_path = None;
    }

    fn synthesize(&mut self, text: &str, voice: Voice, speed: f32) -> Result<AudioBuffer, ReaderError> {
        if !SPEED_RANGE.contains(&speed) {
            return Err(ReaderError::InvalidSpeed(speed));
        }
        let model = self.model.as_mut().ok_or(KokoroError::ModelNotLoaded)?;
        let samples = model.synthesize_text(text, voice, speed, &self.espeak)?;
        Ok(AudioBuffer::new(samples, SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::KokoroEngine;
    use crate::error::ReaderError;
    use crate::engines::kokoro::KokoroError;
    use crate::voice::Voice;
    use crate::SynthesisEngine;

    #[test]
    fn synthesize_without_model_is_an_inference_error() {
        let mut engine = KokoroEngine::new();
        let err = engine.synthesize("hello", Voice::AfBella, 1.0).unwrap_err();
        assert!(matches!(err, ReaderError::ModelInference(KokoroError::ModelNotLoaded)));
        assert!(engine.list_voices().is_empty());
    }

    #[test]
    fn rejects_speed_outside_range() {
        let mut engine = KokoroEngine::new();
        let err = engine.synthesize("hello", Voice::AfBella, 4.0).unwrap_err();
        assert!(matches!(err, ReaderError::InvalidSpeed(s) if s == 4.0));
    }

    #[test]
    fn loading_from_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = KokoroEngine::new();
        let err = engine.load_model(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ReaderError::ModelLoad(KokoroError::ModelFileMissing(_))));
        assert!(!engine.is_loaded());
        assert!(engine.model_path().is_none());
    }
}
