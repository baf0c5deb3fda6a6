//! Splitting long text into pieces small enough for one inference call.
//!
//! Breaks prefer paragraph boundaries, then sentence ends, then whitespace.
//! Only a run of text with none of those inside the limit is cut mid-word.

use std::iter::FusedIterator;

/// Default segment length limit in bytes.
///
/// Comfortably below the point where Kokoro's 510-token phoneme window
/// forces the model to chunk a single request.
pub const DEFAULT_MAX_LEN: usize = 400;

/// Characters that may trail a sentence terminator and still belong to it.
const SENTENCE_CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    max_len: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEN)
    }
}

impl Segmenter {
    /// A limit of zero is raised to one.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Lazily split `text`. Segments borrow from `text` and are trimmed.
    pub fn segments<'a>(&self, text: &'a str) -> Segments<'a> {
        Segments {
            rest: text,
            max_len: self.max_len,
        }
    }
}

/// Iterator over the segments of one text.
///
/// Cloning yields an independent iterator from the same position, which is
/// how callers count segments before consuming them.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    rest: &'a str,
    max_len: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest.trim_start();
        if rest.is_empty() {
            self.rest = rest;
            return None;
        }

        let trimmed = rest.trim_end();
        if trimmed.len() <= self.max_len {
            self.rest = "";
            return Some(trimmed);
        }

        let limit = floor_char_boundary(rest, self.max_len);
        let cut = if limit == 0 {
            // A single character wider than the limit.
            rest.chars().next().map_or(rest.len(), char::len_utf8)
        } else {
            find_break(rest, limit)
        };

        let (head, tail) = rest.split_at(cut);
        self.rest = tail;
        Some(head.trim_end())
    }
}

impl FusedIterator for Segments<'_> {}

/// Pick the end of the next segment within `rest[..limit]`.
///
/// `rest` starts with a non-whitespace character, so any break found past
/// index zero leaves a non-empty head.
fn find_break(rest: &str, limit: usize) -> usize {
    let window = &rest[..limit];

    if let Some(i) = window.rfind('\n').filter(|&i| i > 0) {
        return i;
    }
    if let Some(end) = last_sentence_end(rest, limit) {
        return end;
    }
    if rest[limit..].starts_with(char::is_whitespace) {
        return limit;
    }
    if let Some(i) = window.rfind(char::is_whitespace).filter(|&i| i > 0) {
        return i;
    }
    limit
}

fn last_sentence_end(rest: &str, limit: usize) -> Option<usize> {
    rest[..limit]
        .char_indices()
        .rev()
        .filter(|&(_, c)| matches!(c, '.' | '!' | '?'))
        .find_map(|(i, c)| {
            let mut end = i + c.len_utf8();
            for ch in rest[end..].chars() {
                if !SENTENCE_CLOSERS.contains(&ch) {
                    break;
                }
                end += ch.len_utf8();
            }
            let at_boundary = rest[end..].chars().next().map_or(true, char::is_whitespace);
            (end <= limit && at_boundary).then_some(end)
        })
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
