//! Kokoro-82M text-to-speech engine.
//!
//! Runs the Kokoro ONNX export through ONNX Runtime and phonemizes text
//! with the `espeak-ng` executable.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed (or pointed to with `--espeak-bin`):
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # or any other *.onnx export
//! ├── voices-v1.0.bin                  # voice archive (.npz)
//! └── config.json                      # optional, supplies the vocabulary
//! ```
//!
//! Download links:
//! - Model: <https://github.com/taylorchu/kokoro-onnx/releases/tag/v0.2.0>
//! - Voices: <https://github.com/thewh1teagle/kokoro-onnx/releases/tag/model-files-v1.0>

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod vocab;
pub mod voices;

pub use engine::{KokoroEngine, KokoroModelParams};
pub use model::{KokoroError, SAMPLE_RATE};
pub use phonemizer::EspeakConfig;
