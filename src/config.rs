//! Resolved settings for one invocation.

use std::path::PathBuf;

use derive_builder::Builder;

use crate::segmenter::DEFAULT_MAX_LEN;
use crate::voice::Voice;
use crate::SPEED_RANGE;

pub const DEFAULT_INPUT_DIR: &str = "input";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_MODEL_DIR: &str = "models/kokoro";

/// Everything a run needs, fixed before the first file is touched.
///
/// ```
/// use autoreader::{RunConfigBuilder, Voice};
///
/// let config = RunConfigBuilder::default()
///     .voice(Voice::BmGeorge)
///     .speed(1.25)
///     .play(false)
///     .build()?;
/// assert!(config.save);
/// # Ok::<(), autoreader::config::RunConfigBuilderError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct RunConfig {
    /// Single file to read. `None` selects folder mode.
    #[builder(default)]
    pub input: Option<PathBuf>,
    /// Explicit output file for single-file mode.
    #[builder(default)]
    pub output: Option<PathBuf>,
    #[builder(default = "PathBuf::from(DEFAULT_INPUT_DIR)", setter(into))]
    pub input_dir: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_OUTPUT_DIR)", setter(into))]
    pub output_dir: PathBuf,
    #[builder(default)]
    pub voice: Voice,
    #[builder(default = "1.0")]
    pub speed: f32,
    #[builder(default = "true")]
    pub play: bool,
    #[builder(default = "true")]
    pub save: bool,
    /// Also write every segment to its own file.
    #[builder(default)]
    pub keep_segments: bool,
    #[builder(default = "DEFAULT_MAX_LEN")]
    pub max_segment_len: usize,
    #[builder(default = "PathBuf::from(DEFAULT_MODEL_DIR)", setter(into))]
    pub model_dir: PathBuf,
    #[builder(default)]
    pub num_threads: Option<usize>,
    #[builder(default)]
    pub espeak_bin: Option<PathBuf>,
    #[builder(default)]
    pub espeak_data: Option<PathBuf>,
}

impl RunConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(speed) = self.speed {
            if !SPEED_RANGE.contains(&speed) {
                return Err(format!(
                    "speed {speed} is outside {}-{}",
                    SPEED_RANGE.start(),
                    SPEED_RANGE.end()
                ));
            }
        }
        if self.max_segment_len == Some(0) {
            return Err("max segment length must be at least 1".to_string());
        }
        Ok(())
    }
}

impl RunConfig {
    /// Neither saving nor playing: the run has nothing to produce.
    pub fn is_noop(&self) -> bool {
        !self.play && !self.save
    }

    pub fn is_batch(&self) -> bool {
        self.input.is_none()
    }
}
