use std::path::PathBuf;

use crate::engines::kokoro::KokoroError;

/// Failures surfaced by the reader pipeline.
///
/// Which of these abort the run, abort a single file, or are merely logged
/// is decided by the caller; see [`ReaderError::is_fatal_for_file`].
#[derive(thiserror::Error, Debug)]
pub enum ReaderError {
    #[error("Input '{}' does not exist", .0.display())]
    InputNotFound(PathBuf),
    #[error("No .txt files found in {}", .0.display())]
    EmptyBatch(PathBuf),
    #[error("Failed to load the speech model: {0}")]
    ModelLoad(#[source] KokoroError),
    #[error("Speech synthesis failed: {0}")]
    ModelInference(#[from] KokoroError),
    #[error("Audio playback unsupported: {0}")]
    UnsupportedPlatform(String),
    #[error("Audio playback failed: {0}")]
    Playback(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Speed {0} is outside the supported range 0.5-2.0")]
    InvalidSpeed(f32),
    #[error("Unknown voice '{0}'. Valid voices are: {valid}", valid = crate::voice::Voice::names().join(", "))]
    UnknownVoice(String),
    #[error("Cannot join audio at {found} Hz onto audio at {expected} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },
    #[error("No audio was generated for {}", .0.display())]
    NoAudio(PathBuf),
}

impl ReaderError {
    /// Whether this error stops processing of the file it occurred in.
    ///
    /// Playback problems only cost the affected segment its playback.
    pub fn is_fatal_for_file(&self) -> bool {
        !matches!(
            self,
            ReaderError::UnsupportedPlatform(_) | ReaderError::Playback(_) | ReaderError::EmptyBatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ReaderError;
    use crate::engines::kokoro::KokoroError;
    use std::path::PathBuf;

    #[test]
    fn playback_errors_do_not_abort_a_file() {
        assert!(!ReaderError::Playback("device busy".into()).is_fatal_for_file());
        assert!(!ReaderError::UnsupportedPlatform("haiku".into()).is_fatal_for_file());
        assert!(!ReaderError::EmptyBatch(PathBuf::from("input")).is_fatal_for_file());
    }

    #[test]
    fn inference_and_io_errors_abort_a_file() {
        let inference = ReaderError::from(KokoroError::ModelNotLoaded);
        assert!(inference.is_fatal_for_file());
        let io = ReaderError::from(std::io::Error::other("disk full"));
        assert!(io.is_fatal_for_file());
    }

    #[test]
    fn unknown_voice_lists_valid_choices() {
        let message = ReaderError::UnknownVoice("zz_nobody".into()).to_string();
        assert!(message.contains("zz_nobody"));
        assert!(message.contains("af_bella"));
        assert!(message.contains("bm_lewis"));
    }
}
