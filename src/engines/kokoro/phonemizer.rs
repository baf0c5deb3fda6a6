//! Grapheme-to-phoneme conversion through the `espeak-ng` executable.
//!
//! Text is cut into word runs and punctuation marks. Word runs go to
//! espeak-ng in a single batched call (one per line); punctuation is
//! mapped straight to its vocabulary id so pauses survive phonemization.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::model::KokoroError;

/// Where to find espeak-ng. `None` fields fall back to the system install.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    /// Directory holding `espeak-ng-data`, passed as `ESPEAK_DATA_PATH`.
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self) -> Command {
        let bin: &OsStr = self
            .bin_path
            .as_deref()
            .map_or(OsStr::new("espeak-ng"), |p| p.as_os_str());
        let mut cmd = Command::new(bin);
        if let Some(data) = &self.data_path {
            cmd.env("ESPEAK_DATA_PATH", data);
        }
        cmd
    }
}

/// Convert text to Kokoro token ids for the espeak-ng language `lang`.
///
/// IPA symbols missing from `vocab` are dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &HashMap<char, i64>,
    espeak: &EspeakConfig,
) -> Result<Vec<i64>, KokoroError> {
    let pieces = split_pieces(text);
    let words: Vec<&str> = pieces
        .iter()
        .filter_map(|piece| match piece {
            Piece::Words(w) => Some(w.as_str()),
            Piece::Mark(_) => None,
        })
        .collect();
    let word_ids = if words.is_empty() {
        Vec::new()
    } else {
        phonemize_batch(&words, lang, vocab, espeak)?
    };
    let mut word_ids = word_ids.into_iter();

    let mut ids = Vec::new();
    for piece in &pieces {
        match piece {
            Piece::Words(_) => ids.extend(word_ids.next().unwrap_or_default()),
            Piece::Mark(ch) => ids.extend(vocab.get(ch).copied()),
        }
    }
    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Words(String),
    Mark(char),
}

fn split_pieces(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut words = String::new();

    for (idx, ch) in text.char_indices() {
        if let Some(mark) = boundary_mark(ch) {
            if !joins_digits(text, idx, ch) {
                flush_words(&mut pieces, &mut words);
                pieces.push(Piece::Mark(mark));
                continue;
            }
        }
        if ch.is_whitespace() {
            if !words.is_empty() && !words.ends_with(' ') {
                words.push(' ');
            }
        } else {
            words.push(ch);
        }
    }
    flush_words(&mut pieces, &mut words);
    pieces
}

fn flush_words(pieces: &mut Vec<Piece>, words: &mut String) {
    let trimmed = words.trim();
    if !trimmed.is_empty() {
        pieces.push(Piece::Words(trimmed.to_string()));
    }
    words.clear();
}

/// Punctuation that Kokoro voices as a pause. Line breaks read as full stops.
fn boundary_mark(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

/// `2.5` and `1,000` keep their separator inside the word run.
fn joins_digits(text: &str, idx: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }
    let before = text[..idx].chars().next_back();
    let after = text[idx + ch.len_utf8()..].chars().next();
    matches!((before, after), (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit())
}

fn phonemize_batch(
    words: &[&str],
    lang: &str,
    vocab: &HashMap<char, i64>,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<i64>>, KokoroError> {
    let output = run_espeak(&words.join("\n"), lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() == words.len() {
        return Ok(lines.iter().map(|line| ipa_to_ids(line, vocab)).collect());
    }

    log::debug!(
        "espeak-ng returned {} lines for {} inputs, phonemizing one at a time",
        lines.len(),
        words.len()
    );
    words
        .iter()
        .map(|w| run_espeak(w, lang, espeak).map(|ipa| ipa_to_ids(&ipa, vocab)))
        .collect()
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let mut child = espeak
        .command()
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KokoroError::EspeakNotFound,
            _ => KokoroError::Io(e),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(newline_terminated(input).as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(KokoroError::PhonemizerFailed(format!(
            "espeak-ng exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// espeak-ng reads stdin line by line and under-processes an unterminated last line.
fn newline_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

fn ipa_to_ids(ipa: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    ipa.lines()
        .map(str::trim)
        .flat_map(str::chars)
        .filter(|&ch| ch != '_')
        .filter_map(|ch| vocab.get(&ch).copied())
        .collect()
}
