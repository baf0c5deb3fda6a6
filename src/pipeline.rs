//! Per-file and per-folder orchestration.
//!
//! Each file moves through
//! `Pending -> Segmenting -> Synthesizing(i of n) -> Emitting -> Done`,
//! or ends in `Failed`. Files and segments are processed one at a time.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::ReaderError;
use crate::input::{read_text, resolve_inputs};
use crate::segmenter::Segmenter;
use crate::sink::{AudioSink, Player, SavePlan, SinkReport};
use crate::voice::Voice;
use crate::SynthesisEngine;

/// Characters of each segment echoed to the log.
const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Segmenting,
    Synthesizing { segment: usize, total: usize },
    Emitting,
    Done,
    Failed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Pending => f.write_str("pending"),
            FileState::Segmenting => f.write_str("segmenting"),
            FileState::Synthesizing { segment, total } => {
                write!(f, "synthesizing {segment} of {total}")
            }
            FileState::Emitting => f.write_str("emitting"),
            FileState::Done => f.write_str("done"),
            FileState::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of one successfully processed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub input: PathBuf,
    pub segments: usize,
    pub sink: SinkReport,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub completed: Vec<FileReport>,
    pub failed: Vec<(PathBuf, ReaderError)>,
}

/// `input/doc.txt` -> `<output_dir>/doc.wav`
pub fn derive_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}.wav"))
}

/// Like [`derive_output_path`], but never hands out a path already in
/// `taken`: `doc.txt` and `doc.TXT` become `doc.wav` and `doc_2.wav`.
fn unique_output_path(
    input: &Path,
    output_dir: &Path,
    taken: &mut HashSet<PathBuf>,
) -> PathBuf {
    let base = derive_output_path(input, output_dir);
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = crate::sink::sibling_path(&base, &format!("_{n}.wav"));
        n += 1;
    }
    if candidate != base {
        log::warn!(
            "{} would overwrite {}, writing {} instead",
            input.display(),
            base.display(),
            candidate.display()
        );
    }
    taken.insert(candidate.clone());
    candidate
}

fn preview(segment: &str) -> String {
    let mut chars = segment.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Runs files through segmenter, engine and sink with one fixed configuration.
pub struct Pipeline<'a, E: SynthesisEngine> {
    engine: &'a mut E,
    player: Option<&'a dyn Player>,
    segmenter: Segmenter,
    voice: Voice,
    speed: f32,
    save: bool,
    keep_segments: bool,
    output_dir: PathBuf,
}

impl<'a, E: SynthesisEngine> Pipeline<'a, E> {
    pub fn new(engine: &'a mut E, player: Option<&'a dyn Player>, config: &RunConfig) -> Self {
        Self {
            engine,
            player,
            segmenter: Segmenter::new(config.max_segment_len),
            voice: config.voice,
            speed: config.speed,
            save: config.save,
            keep_segments: config.keep_segments,
            output_dir: config.output_dir.clone(),
        }
    }

    /// Read, synthesize and emit one file.
    ///
    /// The first inference or write error aborts the file; nothing is retried.
    pub fn process_file(&mut self, input: &Path, output: &Path) -> Result<FileReport, ReaderError> {
        let mut state = FileState::Pending;
        let result = self.process_inner(input, output, &mut state);
        match &result {
            Ok(_) => advance(input, &mut state, FileState::Done),
            Err(e) => {
                log::debug!("{} failed while {state}: {e}", input.display());
                advance(input, &mut state, FileState::Failed);
            }
        }
        result
    }

    fn process_inner(
        &mut self,
        input: &Path,
        output: &Path,
        state: &mut FileState,
    ) -> Result<FileReport, ReaderError> {
        let text = read_text(input)?;

        advance(input, state, FileState::Segmenting);
        let segments = self.segmenter.segments(&text);
        let total = segments.clone().count();
        if total == 0 {
            log::warn!("{} contains no text", input.display());
        }

        let save = self.save.then(|| SavePlan {
            output: output.to_path_buf(),
            keep_segments: self.keep_segments,
        });
        let mut sink = AudioSink::new(save, self.player);

        log::info!("Generating speech using voice '{}'...", self.voice);
        for (i, segment) in segments.enumerate() {
            let number = i + 1;
            advance(input, state, FileState::Synthesizing { segment: number, total });
            log::info!("Segment {number}/{total}: {}", preview(segment));
            let emitted = self
                .engine
                .synthesize(segment, self.voice, self.speed)
                .and_then(|audio| sink.emit(number, &audio));
            if let Err(e) = emitted {
                sink.discard();
                return Err(e);
            }
        }

        advance(input, state, FileState::Emitting);
        let sink = sink.finish()?;
        Ok(FileReport {
            input: input.to_path_buf(),
            segments: total,
            sink,
        })
    }

    /// Process every file, deriving each output name from its input.
    ///
    /// A failing file is logged and skipped.
    pub fn run_batch(&mut self, inputs: &[PathBuf]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let mut taken = HashSet::new();
        for (i, input) in inputs.iter().enumerate() {
            log::info!("[{}/{}] {}", i + 1, inputs.len(), input.display());
            let output = unique_output_path(input, &self.output_dir, &mut taken);
            match self.process_file(input, &output) {
                Ok(report) => summary.completed.push(report),
                Err(e) => {
                    log::error!("Skipping {}: {e}", input.display());
                    summary.failed.push((input.clone(), e));
                }
            }
        }
        log::info!(
            "Batch finished: {} succeeded, {} failed",
            summary.completed.len(),
            summary.failed.len()
        );
        summary
    }
}

fn advance(input: &Path, state: &mut FileState, next: FileState) {
    log::debug!("{}: {state} -> {next}", input.display());
    *state = next;
}

/// Carry out a whole invocation.
///
/// Inputs are resolved first, so a missing file is reported even when
/// nothing would be saved or played. `load_engine` is only called once
/// there is work to do, so a no-op configuration or an empty input folder
/// never loads the model. In
/// single-file mode any failure is returned; in folder mode failures are
/// collected in the summary.
pub fn run<E, F>(
    config: &RunConfig,
    load_engine: F,
    player: Option<&dyn Player>,
) -> Result<BatchSummary, ReaderError>
where
    E: SynthesisEngine,
    F: FnOnce() -> Result<E, ReaderError>,
{
    let inputs = match resolve_inputs(config.input.as_deref(), &config.input_dir) {
        Ok(inputs) => inputs,
        Err(ReaderError::EmptyBatch(dir)) => {
            log::warn!("No .txt files found in {}, nothing to do", dir.display());
            return Ok(BatchSummary::default());
        }
        Err(e) => return Err(e),
    };

    if config.is_noop() {
        log::warn!("Both saving and playing are disabled, nothing to do");
        return Ok(BatchSummary::default());
    }
    if !config.save && player.is_none() {
        log::warn!("Playback is unavailable and saving is disabled, nothing to do");
        return Ok(BatchSummary::default());
    }

    let mut engine = load_engine()?;
    let mut pipeline = Pipeline::new(&mut engine, player, config);

    if config.is_batch() {
        if let Some(output) = &config.output {
            log::warn!(
                "Ignoring --output {} in folder mode; files are written to {}",
                output.display(),
                config.output_dir.display()
            );
        }
        return Ok(pipeline.run_batch(&inputs));
    }

    let input = &inputs[0];
    let output = config
        .output
        .clone()
        .unwrap_or_else(|| derive_output_path(input, &config.output_dir));
    let report = pipeline.process_file(input, &output)?;
    Ok(BatchSummary {
        completed: vec![report],
        failed: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::{derive_output_path, preview, run, unique_output_path, FileState, Pipeline};
    use crate::config::{RunConfig, RunConfigBuilder};
    use crate::engines::kokoro::KokoroError;
    use crate::error::ReaderError;
    use crate::sink::tests::RecordingPlayer;
    use crate::voice::Voice;
    use crate::{AudioBuffer, SynthesisEngine};
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// One sample per byte of text; text containing "FAIL" fails inference.
    #[derive(Default)]
    struct FakeEngine {
        calls: Vec<(String, Voice, f32)>,
    }

    impl SynthesisEngine for FakeEngine {
        type ModelParams = ();

        fn load_model_with_params(&mut self, _: &Path, _: ()) -> Result<(), ReaderError> {
            Ok(())
        }

        fn unload_model(&mut self) {}

        fn synthesize(&mut self, text: &str, voice: Voice, speed: f32) -> Result<AudioBuffer, ReaderError> {
            self.calls.push((text.to_string(), voice, speed));
            if text.contains("FAIL") {
                return Err(KokoroError::PhonemizerFailed("boom".into()).into());
            }
            Ok(AudioBuffer::new(vec![0.1; text.len()], 24_000))
        }
    }

    fn config(dir: &Path) -> RunConfigBuilder {
        let mut builder = RunConfigBuilder::default();
        builder
            .input_dir(dir.join("input"))
            .output_dir(dir.join("output"))
            .play(false);
        builder
    }

    fn never_load() -> Result<FakeEngine, ReaderError> {
        panic!("model should not be loaded")
    }

    #[test]
    fn derives_wav_name_in_output_dir() {
        assert_eq!(
            derive_output_path(Path::new("doc.txt"), Path::new("output")),
            PathBuf::from("output/doc.wav")
        );
        assert_eq!(
            derive_output_path(Path::new("input/notes.v2.txt"), Path::new("out")),
            PathBuf::from("out/notes.v2.wav")
        );
    }

    #[test]
    fn previews_long_segments() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn state_names_read_naturally() {
        let state = FileState::Synthesizing { segment: 2, total: 5 };
        assert_eq!(state.to_string(), "synthesizing 2 of 5");
    }

    #[test]
    fn processes_segments_in_order_and_saves_joined_audio() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "First paragraph here.\n\nSecond paragraph here.").unwrap();
        let output = dir.path().join("out/doc.wav");

        let cfg: RunConfig = config(dir.path())
            .max_segment_len(30)
            .voice(Voice::BmGeorge)
            .speed(1.5)
            .build()
            .unwrap();
        let mut engine = FakeEngine::default();
        let report = Pipeline::new(&mut engine, None, &cfg)
            .process_file(&input, &output)
            .unwrap();

        assert_eq!(report.segments, 2);
        assert_eq!(
            engine.calls,
            vec![
                ("First paragraph here.".to_string(), Voice::BmGeorge, 1.5),
                ("Second paragraph here.".to_string(), Voice::BmGeorge, 1.5),
            ]
        );
        let saved = AudioBuffer::read_wav(&output).unwrap();
        assert_eq!(saved.samples.len(), 21 + 22);
    }

    #[test]
    fn plays_each_segment_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "One.\nTwo.\nThree.").unwrap();
        let output = dir.path().join("doc.wav");

        let cfg = config(dir.path())
            .play(true)
            .save(false)
            .max_segment_len(6)
            .build()
            .unwrap();
        let player = RecordingPlayer::default();
        let mut engine = FakeEngine::default();
        let report = Pipeline::new(&mut engine, Some(&player), &cfg)
            .process_file(&input, &output)
            .unwrap();

        assert_eq!(report.sink.segments_played, 3);
        assert_eq!(player.played.borrow().len(), 3);
        assert!(!output.exists());
    }

    #[test]
    fn inference_failure_aborts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Fine start.\nThen FAIL.\nNever reached.").unwrap();
        let output = dir.path().join("doc.wav");

        let cfg = config(dir.path()).max_segment_len(12).build().unwrap();
        let mut engine = FakeEngine::default();
        let err = Pipeline::new(&mut engine, None, &cfg)
            .process_file(&input, &output)
            .unwrap_err();

        assert!(matches!(err, ReaderError::ModelInference(_)));
        assert_eq!(engine.calls.len(), 2);
        assert!(!output.exists());
    }

    #[test]
    fn batch_skips_failed_files() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();
        fs::write(input_dir.join("a.txt"), "Alpha.").unwrap();
        fs::write(input_dir.join("b.txt"), "FAIL here.").unwrap();
        fs::write(input_dir.join("c.txt"), "Gamma.").unwrap();

        let cfg = config(dir.path()).build().unwrap();
        let summary = run(&cfg, || Ok(FakeEngine::default()), None).unwrap();

        assert_eq!(summary.completed.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, input_dir.join("b.txt"));
        assert!(dir.path().join("output/a.wav").is_file());
        assert!(!dir.path().join("output/b.wav").exists());
        assert!(dir.path().join("output/c.wav").is_file());
    }

    #[test]
    fn empty_folder_completes_without_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("input")).unwrap();

        let cfg = config(dir.path()).build().unwrap();
        let summary = run(&cfg, never_load, None).unwrap();

        assert!(summary.completed.is_empty());
        assert!(summary.failed.is_empty());
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn disabled_outputs_do_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Hello.").unwrap();

        let cfg = config(dir.path())
            .input(Some(input))
            .save(false)
            .build()
            .unwrap();
        let summary = run(&cfg, never_load, None).unwrap();

        assert!(summary.completed.is_empty());
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn missing_single_file_is_fatal_even_when_outputs_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let noop = config(dir.path())
            .input(Some(missing.clone()))
            .save(false)
            .build()
            .unwrap();
        let err = run(&noop, never_load, None).unwrap_err();
        assert!(matches!(err, ReaderError::InputNotFound(p) if p == missing));

        // Play requested, but no player could be found.
        let unplayable = config(dir.path())
            .input(Some(missing))
            .play(true)
            .save(false)
            .build()
            .unwrap();
        let err = run(&unplayable, never_load, None).unwrap_err();
        assert!(matches!(err, ReaderError::InputNotFound(_)));
    }

    #[test]
    fn unavailable_player_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Hello.").unwrap();

        let cfg = config(dir.path())
            .input(Some(input))
            .play(true)
            .save(true)
            .build()
            .unwrap();
        let summary = run(&cfg, || Ok(FakeEngine::default()), None).unwrap();

        let expected = dir.path().join("output/doc.wav");
        assert_eq!(summary.completed.len(), 1);
        assert_eq!(summary.completed[0].sink.segments_played, 0);
        assert!(expected.is_file());
    }

    #[test]
    fn unavailable_player_without_saving_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Hello.").unwrap();

        let cfg = config(dir.path())
            .input(Some(input))
            .play(true)
            .save(false)
            .build()
            .unwrap();
        let summary = run(&cfg, never_load, None).unwrap();

        assert!(summary.completed.is_empty());
        assert!(summary.failed.is_empty());
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn colliding_outputs_get_distinct_names() {
        let out = Path::new("output");
        let mut taken = HashSet::new();
        assert_eq!(
            unique_output_path(Path::new("in/a.txt"), out, &mut taken),
            PathBuf::from("output/a.wav")
        );
        assert_eq!(
            unique_output_path(Path::new("in/a.TXT"), out, &mut taken),
            PathBuf::from("output/a_2.wav")
        );
        assert_eq!(
            unique_output_path(Path::new("in/a.Txt"), out, &mut taken),
            PathBuf::from("output/a_3.wav")
        );
        assert_eq!(
            unique_output_path(Path::new("in/b.txt"), out, &mut taken),
            PathBuf::from("output/b.wav")
        );
    }

    #[test]
    fn failed_file_leaves_no_segment_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Fine start.\nThen FAIL.").unwrap();
        let output = dir.path().join("doc.wav");

        let cfg = config(dir.path())
            .max_segment_len(12)
            .keep_segments(true)
            .build()
            .unwrap();
        let mut engine = FakeEngine::default();
        Pipeline::new(&mut engine, None, &cfg)
            .process_file(&input, &output)
            .unwrap_err();

        assert_eq!(engine.calls.len(), 2);
        assert!(!crate::sink::segment_path(&output, 1).exists());
        assert!(!output.exists());
    }

    #[test]
    fn missing_single_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path())
            .input(Some(dir.path().join("missing.txt")))
            .build()
            .unwrap();
        let err = run(&cfg, never_load, None).unwrap_err();
        assert!(matches!(err, ReaderError::InputNotFound(_)));
    }

    #[test]
    fn single_file_uses_derived_or_explicit_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Hello there.").unwrap();

        let derived = config(dir.path()).input(Some(input.clone())).build().unwrap();
        let summary = run(&derived, || Ok(FakeEngine::default()), None).unwrap();
        let expected = dir.path().join("output/doc.wav");
        assert_eq!(summary.completed[0].sink.output.as_deref(), Some(expected.as_path()));
        assert!(expected.is_file());

        let explicit_path = dir.path().join("speech.wav");
        let explicit = config(dir.path())
            .input(Some(input))
            .output(Some(explicit_path.clone()))
            .build()
            .unwrap();
        run(&explicit, || Ok(FakeEngine::default()), None).unwrap();
        assert!(explicit_path.is_file());
    }

    #[test]
    fn single_file_inference_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "FAIL").unwrap();
        let cfg = config(dir.path()).input(Some(input)).build().unwrap();
        let err = run(&cfg, || Ok(FakeEngine::default()), None).unwrap_err();
        assert!(matches!(err, ReaderError::ModelInference(_)));
    }
}
