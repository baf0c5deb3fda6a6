//! Preset Kokoro speakers.
//!
//! Voice ids follow Kokoro's `{accent}{gender}_{name}` convention, so
//! `bf_emma` is a British English female voice named "emma".

use std::fmt;
use std::str::FromStr;

use crate::error::ReaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    American,
    British,
}

impl Accent {
    /// espeak-ng language code used to phonemize text for this accent.
    pub fn espeak_code(self) -> &'static str {
        match self {
            Accent::American => "en-us",
            Accent::British => "en-gb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Voice {
    #[default]
    AfBella,
    AfNicole,
    AfSarah,
    AfSky,
    AmAdam,
    AmMichael,
    BfEmma,
    BfIsabella,
    BmGeorge,
    BmLewis,
}

impl Voice {
    pub const ALL: [Voice; 10] = [
        Voice::AfBella,
        Voice::AfNicole,
        Voice::AfSarah,
        Voice::AfSky,
        Voice::AmAdam,
        Voice::AmMichael,
        Voice::BfEmma,
        Voice::BfIsabella,
        Voice::BmGeorge,
        Voice::BmLewis,
    ];

    /// Id of the voice inside the Kokoro voice archive.
    pub fn id(self) -> &'static str {
        match self {
            Voice::AfBella => "af_bella",
            Voice::AfNicole => "af_nicole",
            Voice::AfSarah => "af_sarah",
            Voice::AfSky => "af_sky",
            Voice::AmAdam => "am_adam",
            Voice::AmMichael => "am_michael",
            Voice::BfEmma => "bf_emma",
            Voice::BfIsabella => "bf_isabella",
            Voice::BmGeorge => "bm_george",
            Voice::BmLewis => "bm_lewis",
        }
    }

    pub fn accent(self) -> Accent {
        match self.id().as_bytes()[0] {
            b'b' => Accent::British,
            _ => Accent::American,
        }
    }

    pub fn gender(self) -> Gender {
        match self.id().as_bytes()[1] {
            b'm' => Gender::Male,
            _ => Gender::Female,
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.id()).collect()
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Voice {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReaderError::UnknownVoice(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Accent, Gender, Voice};

    #[test]
    fn parses_ids_loosely() {
        assert_eq!(" bf_emma ".parse::<Voice>().unwrap(), Voice::BfEmma);
        assert_eq!("AM_ADAM".parse::<Voice>().unwrap(), Voice::AmAdam);
        assert!("af_heart".parse::<Voice>().is_err());
    }

    #[test]
    fn id_round_trips_through_display() {
        for voice in Voice::ALL {
            assert_eq!(voice.to_string().parse::<Voice>().unwrap(), voice);
        }
    }

    #[test]
    fn decodes_accent_and_gender_from_prefix() {
        assert_eq!(Voice::BmLewis.accent(), Accent::British);
        assert_eq!(Voice::BmLewis.gender(), Gender::Male);
        assert_eq!(Voice::AfSky.accent().espeak_code(), "en-us");
        assert_eq!(Voice::AfSky.gender(), Gender::Female);
        assert_eq!(Voice::BfIsabella.accent().espeak_code(), "en-gb");
    }

    #[test]
    fn default_is_bella() {
        assert_eq!(Voice::default().id(), "af_bella");
    }
}
