//! Media classes and volume label legality.

use serde::{Deserialize, Serialize};

/// ANSI X3.27 tape labels: at most 6 characters.
pub const TAPE_VSN_LEN: usize = 6;
/// Generic (disk/optical) labels: at most 31 characters.
pub const GENERIC_VSN_LEN: usize = 31;

// Special characters permitted by ANSI X3.27-1987 tape labels.
const TAPE_VSN_PUNCT: &str = "!\"%&'()*+,-./:;<=>?_";

// Generic labels additionally allow these.
const GENERIC_VSN_PUNCT: &str = "!\"%&'()*+,-./:;<=>?_@#$^{}[]~`";

/// Label rule class of a media type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    /// ANSI labeled tape
    Tape,
    /// Disk archive or optical media, generic label rules
    Generic,
}

impl MediaClass {
    /// Classify a two letter media type code.
    ///
    /// Disk archives ("dk") and optical families ("od", "mo", "wo")
    /// follow the generic rule; everything else is treated as ANSI
    /// labeled tape.
    pub fn from_media_type(media_type: &str) -> Self {
        match media_type {
            "dk" | "od" | "mo" | "wo" | "o2" => MediaClass::Generic,
            _ => MediaClass::Tape,
        }
    }
}

/// Check a VSN against the label rules of its media class.
///
/// Tape: 1-6 characters, upper case letters, digits and the ANSI special
/// character set. Generic: 1-31 characters with an extended special
/// character set.
pub fn vsn_label_is_legal(class: MediaClass, vsn: &str) -> bool {
    let (max_len, punct) = match class {
        MediaClass::Tape => (TAPE_VSN_LEN, TAPE_VSN_PUNCT),
        MediaClass::Generic => (GENERIC_VSN_LEN, GENERIC_VSN_PUNCT),
    };

    if vsn.is_empty() || vsn.len() > max_len {
        return false;
    }

    vsn.chars().all(|c| {
        c.is_ascii_uppercase()
            || c.is_ascii_digit()
            || (class == MediaClass::Generic && c.is_ascii_lowercase())
            || punct.contains(c)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tape_labels() {
        assert!(vsn_label_is_legal(MediaClass::Tape, "AA0001"));
        assert!(vsn_label_is_legal(MediaClass::Tape, "X"));
        assert!(vsn_label_is_legal(MediaClass::Tape, "A-1.2_"));

        // too long
        assert!(!vsn_label_is_legal(MediaClass::Tape, "AA00011"));
        // empty
        assert!(!vsn_label_is_legal(MediaClass::Tape, ""));
        // lower case is not part of the ANSI set
        assert!(!vsn_label_is_legal(MediaClass::Tape, "aa0001"));
        // neither is space
        assert!(!vsn_label_is_legal(MediaClass::Tape, "AA 001"));
    }

    #[test]
    fn generic_labels() {
        assert!(vsn_label_is_legal(MediaClass::Generic, "disk_volume_01"));
        assert!(vsn_label_is_legal(
            MediaClass::Generic,
            "A234567890123456789012345678901"
        ));
        assert!(!vsn_label_is_legal(
            MediaClass::Generic,
            "A2345678901234567890123456789012"
        ));
        assert!(!vsn_label_is_legal(MediaClass::Generic, "has space"));
    }

    #[test]
    fn media_type_classes() {
        assert_eq!(MediaClass::from_media_type("dk"), MediaClass::Generic);
        assert_eq!(MediaClass::from_media_type("mo"), MediaClass::Generic);
        assert_eq!(MediaClass::from_media_type("li"), MediaClass::Tape);
        assert_eq!(MediaClass::from_media_type("ti"), MediaClass::Tape);
    }
}
