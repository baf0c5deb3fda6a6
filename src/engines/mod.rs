//! Speech synthesis engines.
//!
//! - `kokoro` - Kokoro-82M (ONNX format, espeak-ng required)

pub mod kokoro;
