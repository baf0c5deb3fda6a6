//! Where synthesized audio goes: the speakers, a WAV file, or both.

pub mod player;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReaderError;
use crate::AudioBuffer;

pub use player::{detect_player, Player};

/// How one file's audio is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePlan {
    pub output: PathBuf,
    /// Also write `<stem>_segment_<n>.wav` per segment plus a
    /// `<stem>_segments.txt` index.
    pub keep_segments: bool,
}

/// What a finished sink produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkReport {
    pub output: Option<PathBuf>,
    pub segment_files: Vec<PathBuf>,
    pub segment_index: Option<PathBuf>,
    pub segments_played: usize,
    pub duration_secs: f64,
}

/// Receives one file's segments in order.
///
/// Playback happens as each segment arrives; the saved file is written
/// once by [`AudioSink::finish`].
pub struct AudioSink<'p> {
    save: Option<SavePlan>,
    player: Option<&'p dyn Player>,
    joined: AudioBuffer,
    segment_files: Vec<PathBuf>,
    played: usize,
    duration_secs: f64,
}

impl<'p> AudioSink<'p> {
    pub fn new(save: Option<SavePlan>, player: Option<&'p dyn Player>) -> Self {
        Self {
            save,
            player,
            joined: AudioBuffer::empty(0),
            segment_files: Vec::new(),
            played: 0,
            duration_secs: 0.0,
        }
    }

    /// Handle segment `number` (1-based).
    ///
    /// Playback failures are logged and swallowed; write failures are returned.
    pub fn emit(&mut self, number: usize, audio: &AudioBuffer) -> Result<(), ReaderError> {
        if audio.is_empty() {
            log::warn!("Segment {number} produced no audio, skipping");
            return Ok(());
        }
        self.duration_secs += audio.duration_secs();

        if let Some(plan) = &self.save {
            self.joined.append(audio)?;
            if plan.keep_segments {
                let path = segment_path(&plan.output, number);
                ensure_parent_dir(&path)?;
                log::info!("Saving segment to {}", path.display());
                audio.write_wav(&path)?;
                self.segment_files.push(path);
            }
        }

        if let Some(player) = self.player {
            log::info!("Playing segment {number}...");
            match play_buffer(player, audio) {
                Ok(()) => self.played += 1,
                Err(e) => log::warn!("Segment {number} not played: {e}"),
            }
        }
        Ok(())
    }

    /// Give up on this file, deleting any segment files already written.
    pub fn discard(self) {
        for path in &self.segment_files {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("Could not remove {}: {e}", path.display());
            }
        }
    }

    pub fn finish(self) -> Result<SinkReport, ReaderError> {
        let mut report = SinkReport {
            segments_played: self.played,
            duration_secs: self.duration_secs,
            ..SinkReport::default()
        };

        let Some(plan) = self.save else {
            return Ok(report);
        };
        if self.joined.is_empty() {
            return Err(ReaderError::NoAudio(plan.output));
        }

        ensure_parent_dir(&plan.output)?;
        self.joined.write_wav(&plan.output)?;
        log::info!(
            "Saved {:.1}s of audio to {}",
            self.joined.duration_secs(),
            plan.output.display()
        );

        let mut segment_files = self.segment_files;
        if segment_files.len() == 1 {
            // A lone segment is the output file itself.
            fs::remove_file(&segment_files[0])?;
            segment_files.clear();
        } else if !segment_files.is_empty() {
            let index = segment_index_path(&plan.output);
            let listing: String = segment_files
                .iter()
                .map(|p| format!("{}\n", p.display()))
                .collect();
            fs::write(&index, listing)?;
            log::info!("List of {} segments saved to {}", segment_files.len(), index.display());
            report.segment_index = Some(index);
        }

        report.segment_files = segment_files;
        report.output = Some(plan.output);
        Ok(report)
    }
}

/// Write `audio` to a scratch WAV that lives only for the duration of playback.
fn play_buffer(player: &dyn Player, audio: &AudioBuffer) -> Result<(), ReaderError> {
    let scratch = tempfile::Builder::new()
        .prefix("autoreader-")
        .suffix(".wav")
        .tempfile()?
        .into_temp_path();
    audio.write_wav(&scratch)?;
    player.play(&scratch)
}

pub(crate) fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}{suffix}"))
}

/// `output/doc.wav` -> `output/doc_segment_3.wav`
pub fn segment_path(output: &Path, number: usize) -> PathBuf {
    sibling_path(output, &format!("_segment_{number}.wav"))
}

/// `output/doc.wav` -> `output/doc_segments.txt`
pub fn segment_index_path(output: &Path) -> PathBuf {
    sibling_path(output, "_segments.txt")
}

fn ensure_parent_dir(path: &Path) -> Result<(), ReaderError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            fs::create_dir_all(dir)?;
            log::info!("Created output directory: {}", dir.display());
            Ok(())
        }
        _ => Ok(()),
    }
}
