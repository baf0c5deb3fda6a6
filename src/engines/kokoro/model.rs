use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::{arr1, Array2, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::phonemizer::{phonemize, EspeakConfig};
use super::voices::VoicePack;
use crate::voice::Voice;

/// Maximum number of phoneme tokens per inference call (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

/// Output sample rate from the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Preferred model file inside the model directory.
pub const PREFERRED_ONNX: &str = "kokoro-quant-convinteger.onnx";

pub const VOICES_FILE: &str = "voices-v1.0.bin";

const CHUNK_CROSSFADE_SAMPLES: usize = 240; // 10ms @ 24kHz

/// Punctuation token ids in the Kokoro vocabulary: `; : , . ! ?`
const PUNCT_IDS: &[i64] = &[1, 2, 3, 4, 5, 6];

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Voice '{0}' is missing from the voice archive")]
    VoiceNotFound(String),
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("Model file missing: {}", .0.display())]
    ModelFileMissing(PathBuf),
    #[error("Invalid config.json: {0}")]
    Config(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
}

/// A loaded Kokoro ONNX session together with its voices and vocabulary.
pub struct KokoroModel {
    session: Session,
    voices: VoicePack,
    vocab: HashMap<char, i64>,
    /// "input_ids" or "tokens", depending on the export
    tokens_input_name: String,
    speed_is_int32: bool,
    speed_warned: bool,
}

impl KokoroModel {
    /// Load the model from a directory holding an `.onnx` graph, the
    /// `voices-v1.0.bin` archive and optionally `config.json`.
    pub fn load(model_dir: &Path, num_threads: Option<usize>) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let session = init_session(&onnx_path, num_threads)?;
        let tokens_input_name = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_type(&session);
        log::debug!("Model inputs: tokens='{tokens_input_name}', int32 speed={speed_is_int32}");

        let voices_path = model_dir.join(VOICES_FILE);
        if !voices_path.is_file() {
            return Err(KokoroError::ModelFileMissing(voices_path));
        }
        let voices = VoicePack::load(&voices_path)?;

        let config_path = model_dir.join("config.json");
        let vocab = if config_path.is_file() {
            super::vocab::load_vocab(&config_path)?
        } else {
            log::warn!("config.json not found, using built-in vocabulary");
            super::vocab::builtin_vocab()
        };

        Ok(Self {
            session,
            voices,
            vocab,
            tokens_input_name,
            speed_is_int32,
            speed_warned: false,
        })
    }

    /// Turn text into 24 kHz mono samples.
    ///
    /// Phoneme sequences longer than [`MAX_PHONEME_LEN`] are run in several
    /// passes and the pieces crossfaded together.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        voice: Voice,
        speed: f32,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, KokoroError> {
        let ids = phonemize(text, voice.accent().espeak_code(), &self.vocab, espeak)?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(Vec::new());
        }

        if self.speed_is_int32 && !self.speed_warned {
            let (applied, rounded) = int32_speed(speed);
            if rounded {
                log::warn!(
                    "This model takes whole-number speeds only; speaking at {applied} instead of {speed}"
                );
                self.speed_warned = true;
            }
        }

        // One style index for the whole text so chunks share the same prosody.
        let style = self.voices.style(voice.id(), ids.len())?;

        let chunks = if ids.len() > MAX_PHONEME_LEN {
            log::debug!("{} phoneme tokens exceed {MAX_PHONEME_LEN}, chunking", ids.len());
            split_chunks(&ids)
        } else {
            vec![ids.as_slice()]
        };

        let mut combined = Vec::with_capacity(ids.len() * 300);
        for chunk in chunks {
            let audio = self.run_chunk(chunk, &style, speed)?;
            append_with_crossfade(&mut combined, &audio, CHUNK_CROSSFADE_SAMPLES);
        }
        Ok(combined)
    }

    fn run_chunk(
        &mut self,
        tokens: &[i64],
        style: &[f32; STYLE_DIM],
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        // [[0, t1..tN, 0]]
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let tokens_arr = Array2::from_shape_vec((1, padded.len()), padded)?;
        let style_view = ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;
        let tokens_name = self.tokens_input_name.as_str();

        let outputs = if self.speed_is_int32 {
            let speed_arr = arr1(&[int32_speed(speed).0]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        } else {
            let speed_arr = arr1(&[speed]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        };

        let (_, waveform) = outputs
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(waveform.iter().copied().collect())
    }

    /// Voice ids present in the loaded archive, sorted.
    pub fn voice_ids(&self) -> Vec<&str> {
        self.voices.ids()
    }
}

/// Prefers [`PREFERRED_ONNX`], then the first `.onnx` file by name.
fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join(PREFERRED_ONNX);
    if preferred.is_file() {
        return Ok(preferred);
    }
    if !model_dir.is_dir() {
        return Err(KokoroError::ModelFileMissing(model_dir.to_path_buf()));
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| KokoroError::ModelFileMissing(model_dir.join("*.onnx")))
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, KokoroError> {
    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers([CPUExecutionProvider::default().build()])?;

    if let Some(threads) = num_threads {
        builder = builder.with_intra_threads(threads)?.with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

fn detect_tokens_input(session: &Session) -> String {
    for input in session.inputs() {
        if input.name() == "input_ids" || input.name() == "tokens" {
            return input.name().to_string();
        }
    }
    "input_ids".to_string()
}

/// The speed an int32-speed export receives, and whether it had to be
/// rounded to get there.
fn int32_speed(speed: f32) -> (i32, bool) {
    let applied = speed.round() as i32;
    (applied, applied as f32 != speed)
}

/// Newer exports take speed as int32, older ones as float32.
fn detect_speed_type(session: &Session) -> bool {
    for input in session.inputs() {
        if input.name() == "speed" {
            return format!("{:?}", input.dtype())
                .to_ascii_lowercase()
                .contains("int32");
        }
    }
    true
}

/// Split phoneme ids into runs of at most [`MAX_PHONEME_LEN`], cutting after
/// the last punctuation token where one exists.
fn split_chunks(ids: &[i64]) -> Vec<&[i64]> {
    let mut chunks = Vec::new();
    let mut rest = ids;

    while rest.len() > MAX_PHONEME_LEN {
        let cut = rest[..MAX_PHONEME_LEN]
            .iter()
            .rposition(|id| PUNCT_IDS.contains(id))
            .map(|i| i + 1)
            .unwrap_or(MAX_PHONEME_LEN);
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Append `src` to `dst`, blending the first `crossfade_samples` of `src`
/// into the tail of `dst` with a linear ramp.
fn append_with_crossfade(dst: &mut Vec<f32>, src: &[f32], crossfade_samples: usize) {
    let overlap = crossfade_samples.min(dst.len()).min(src.len());
    let start = dst.len() - overlap;
    for (i, (d, s)) in dst[start..].iter_mut().zip(src).enumerate() {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        *d = *d * (1.0 - t) + s * t;
    }
    dst.extend_from_slice(&src[overlap..]);
}
