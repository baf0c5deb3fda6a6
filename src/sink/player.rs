//! Playing WAV files through the operating system's own tools.
//!
//! | OS      | Mechanism                                        |
//! |---------|--------------------------------------------------|
//! | macOS   | `afplay`                                         |
//! | Windows | PowerShell `System.Media.SoundPlayer.PlaySync()` |
//! | Linux   | first of `paplay`, `aplay`, `pw-play`, `ffplay`  |

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::ReaderError;

/// Linux players in order of preference.
pub const LINUX_PLAYERS: &[&str] = &["paplay", "aplay", "pw-play", "ffplay"];

/// Something that can play a WAV file, blocking until it finishes.
pub trait Player {
    fn name(&self) -> &str;

    fn play(&self, wav_path: &Path) -> Result<(), ReaderError>;
}

/// Pick the player for the host operating system.
pub fn detect_player() -> Result<Box<dyn Player>, ReaderError> {
    if cfg!(target_os = "macos") {
        Ok(Box::new(AfplayPlayer))
    } else if cfg!(target_os = "windows") {
        Ok(Box::new(SoundPlayer))
    } else if cfg!(target_os = "linux") {
        LinuxPlayer::detect().map(|p| Box::new(p) as Box<dyn Player>)
    } else {
        Err(ReaderError::UnsupportedPlatform(format!(
            "no playback mechanism for {}",
            std::env::consts::OS
        )))
    }
}

/// macOS `afplay`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AfplayPlayer;

impl Player for AfplayPlayer {
    fn name(&self) -> &str {
        "afplay"
    }

    fn play(&self, wav_path: &Path) -> Result<(), ReaderError> {
        run_player(Command::new("afplay").arg(wav_path))
    }
}

/// Windows `System.Media.SoundPlayer`, driven through PowerShell.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoundPlayer;

impl Player for SoundPlayer {
    fn name(&self) -> &str {
        "powershell"
    }

    fn play(&self, wav_path: &Path) -> Result<(), ReaderError> {
        let quoted = wav_path.display().to_string().replace('\'', "''");
        let script = format!("(New-Object System.Media.SoundPlayer '{quoted}').PlaySync()");
        run_player(Command::new("powershell").args([
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            script.as_str(),
        ]))
    }
}

/// Whichever command-line player a Linux desktop has installed.
#[derive(Debug, Clone)]
pub struct LinuxPlayer {
    program: PathBuf,
}

impl LinuxPlayer {
    pub fn detect() -> Result<Self, ReaderError> {
        LINUX_PLAYERS
            .iter()
            .find_map(|name| find_executable(name))
            .map(|program| Self { program })
            .ok_or_else(|| {
                ReaderError::UnsupportedPlatform(format!(
                    "none of {} found on PATH",
                    LINUX_PLAYERS.join(", ")
                ))
            })
    }

    fn program_name(&self) -> &str {
        self.program
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
    }
}

impl Player for LinuxPlayer {
    fn name(&self) -> &str {
        self.program_name()
    }

    fn play(&self, wav_path: &Path) -> Result<(), ReaderError> {
        let mut cmd = Command::new(&self.program);
        if self.program_name() == "ffplay" {
            cmd.args(["-autoexit", "-nodisp", "-loglevel", "error"]);
        } else if self.program_name() == "aplay" {
            cmd.arg("-q");
        }
        run_player(cmd.arg(wav_path))
    }
}

fn run_player(cmd: &mut Command) -> Result<(), ReaderError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ReaderError::Playback(format!("failed to launch {program}: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ReaderError::Playback(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Look `name` up on PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
