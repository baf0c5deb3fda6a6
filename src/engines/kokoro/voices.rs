use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

type StyleVector = [f32; STYLE_DIM];

/// Style tables for every voice in a Kokoro voice archive.
///
/// Row `n` of a voice's table is the style to use for a text of `n`
/// phoneme tokens.
pub struct VoicePack {
    voices: HashMap<String, Vec<StyleVector>>,
}

impl VoicePack {
    /// Load a `.npz` archive where each `<voice>.npy` entry is a float32
    /// array of shape `[N, 256]` (or `[N, 1, 256]`).
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| KokoroError::VoiceParse(format!("{}: {e}", path.display())))?;

        let mut voices = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| KokoroError::VoiceParse(format!("entry {i}: {e}")))?;
            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_string();
            let voice_id = entry_name.trim_end_matches(".npy");
            if voice_id.is_empty() {
                continue;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| KokoroError::VoiceParse(format!("{entry_name}: {e}")))?;
            voices.insert(voice_id.to_string(), parse_npy(&bytes, &entry_name)?);
        }

        log::info!("Loaded {} voices from {}", voices.len(), path.display());
        Ok(Self { voices })
    }

    /// Style vector for `voice` at `index`, clamped to the table's last row.
    pub fn style(&self, voice: &str, index: usize) -> Result<StyleVector, KokoroError> {
        let table = self
            .voices
            .get(voice)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;
        Ok(table[index.min(table.len() - 1)])
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Parse a little-endian float32 `.npy` payload into style rows.
///
/// Only the v1 header layout is read; the shape is implied by the payload
/// length, which must be a whole number of rows.
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<StyleVector>, KokoroError> {
    let fail = |msg: String| KokoroError::VoiceParse(format!("{name}: {msg}"));

    if data.len() < 10 || &data[..6] != b"\x93NUMPY" {
        return Err(fail("not a .npy file".to_string()));
    }

    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let payload = data
        .get(10 + header_len..)
        .ok_or_else(|| fail(format!("header of {header_len} bytes is truncated")))?;

    let row_bytes = STYLE_DIM * 4;
    if payload.len() % row_bytes != 0 {
        return Err(fail(format!(
            "{} payload bytes is not a whole number of {STYLE_DIM}-float rows",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (dst, raw) in style.iter_mut().zip(row.chunks_exact(4)) {
                *dst = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            }
            style
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{parse_npy, VoicePack};
    use crate::engines::kokoro::model::STYLE_DIM;
    use std::io::Write;

    fn npy(rows: usize, fill: impl Fn(usize) -> f32) -> Vec<u8> {
        let header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {STYLE_DIM}), }}");
        let mut header = header.into_bytes();
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(b' ');
        }
        header.push(b'\n');

        let mut out = b"\x93NUMPY\x01\x00".to_vec();
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(&header);
        for i in 0..rows * STYLE_DIM {
            out.extend_from_slice(&fill(i).to_le_bytes());
        }
        out
    }

    #[test]
    fn parses_rows_in_order() {
        let rows = parse_npy(&npy(3, |i| i as f32), "af_test.npy").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], 0.0);
        assert_eq!(rows[1][0], STYLE_DIM as f32);
        assert_eq!(rows[2][STYLE_DIM - 1], (3 * STYLE_DIM - 1) as f32);
    }

    #[test]
    fn rejects_bad_magic_and_partial_rows() {
        assert!(parse_npy(b"PK\x03\x04 not numpy", "x.npy").is_err());
        let mut data = npy(1, |_| 0.0);
        data.truncate(data.len() - 4);
        assert!(parse_npy(&data, "x.npy").is_err());
    }

    #[test]
    fn loads_archive_and_clamps_style_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voices.bin");
        {
            let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file("bf_emma.npy", opts).unwrap();
            zip.write_all(&npy(2, |i| if i < STYLE_DIM { 1.0 } else { 2.0 })).unwrap();
            zip.start_file("af_bella.npy", opts).unwrap();
            zip.write_all(&npy(1, |_| 0.5)).unwrap();
            zip.finish().unwrap();
        }

        let pack = VoicePack::load(&path).unwrap();
        assert_eq!(pack.ids(), vec!["af_bella", "bf_emma"]);
        assert_eq!(pack.style("bf_emma", 0).unwrap()[0], 1.0);
        assert_eq!(pack.style("bf_emma", 500).unwrap()[0], 2.0);
        assert!(pack.style("am_adam", 0).is_err());
    }
}
