//! # autoreader
//!
//! Reads plain-text files aloud with the Kokoro-82M text-to-speech model,
//! saving the speech as WAV, playing it through the system's audio player,
//! or both.
//!
//! ## Pipeline
//!
//! 1. [`input`] resolves a single file or every `.txt` file in a folder.
//! 2. [`segmenter`] cuts each text into pieces one inference call can handle.
//! 3. A [`SynthesisEngine`] (normally [`engines::kokoro::KokoroEngine`])
//!    turns each piece into an [`AudioBuffer`].
//! 4. [`sink`] plays each buffer as it arrives and/or saves the joined audio.
//! 5. [`pipeline`] drives the above per file and across a folder.
//!
//! ```ignore
//! use std::path::Path;
//! use autoreader::{engines::kokoro::KokoroEngine, SynthesisEngine, Voice};
//!
//! let mut engine = KokoroEngine::new();
//! engine.load_model(Path::new("models/kokoro"))?;
//!
//! let audio = engine.synthesize("Hello, world!", Voice::BfEmma, 1.0)?;
//! audio.write_wav(Path::new("hello.wav"))?;
//! # Ok::<(), autoreader::ReaderError>(())
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod segmenter;
pub mod sink;
pub mod voice;

use std::path::Path;

pub use config::{RunConfig, RunConfigBuilder};
pub use error::ReaderError;
pub use voice::Voice;

/// Slowest and fastest speech rates accepted by [`SynthesisEngine::synthesize`].
pub const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;

/// Mono audio produced for one segment of text.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    /// 24000 for Kokoro
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// An empty buffer that will take on the rate of whatever is appended first.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Append `other` to the end of this buffer.
    pub fn append(&mut self, other: &AudioBuffer) -> Result<(), ReaderError> {
        if self.samples.is_empty() {
            self.sample_rate = other.sample_rate;
        } else if other.sample_rate != self.sample_rate {
            return Err(ReaderError::SampleRateMismatch {
                expected: self.sample_rate,
                found: other.sample_rate,
            });
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Write the audio to a mono 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), ReaderError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Read a WAV file, downmixing multichannel audio to mono.
    pub fn read_wav(path: &Path) -> Result<Self, ReaderError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        Ok(Self::new(samples, spec.sample_rate))
    }
}

/// Common interface for text-to-speech engines.
///
/// The pipeline only needs `synthesize`; model management is here so the
/// binary can load and release an engine without knowing its concrete type.
pub trait SynthesisEngine {
    /// Parameters for configuring model loading (threads, etc.)
    type ModelParams: Default;

    /// Load a model from the specified path using default parameters.
    fn load_model(&mut self, model_path: &Path) -> Result<(), ReaderError> {
        self.load_model_with_params(model_path, Self::ModelParams::default())
    }

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), ReaderError>;

    fn unload_model(&mut self);

    /// Synthesize one segment of text. Blocks until the model returns.
    fn synthesize(&mut self, text: &str, voice: Voice, speed: f32) -> Result<AudioBuffer, ReaderError>;
}
