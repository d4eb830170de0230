use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The seven emotion labels the classifier may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Neutral,
    Fear,
    Surprise,
    Disgust,
}

impl Emotion {
    /// All emotions in tie-break priority order. When two emotions share the
    /// highest count, the one listed first here wins.
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Neutral,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Neutral => "neutral",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a label outside the recognized set.
#[derive(Debug, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Emotion::Happy),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            "neutral" => Ok(Emotion::Neutral),
            "fear" => Ok(Emotion::Fear),
            "surprise" => Ok(Emotion::Surprise),
            "disgust" => Ok(Emotion::Disgust),
            other => Err(UnknownEmotion(other.to_string())),
        }
    }
}

/// Label used when no face has been seen within the freshness window.
pub const NO_FACE: &str = "no_face";

/// Render an optional emotion as its wire label.
pub fn label(current: Option<Emotion>) -> &'static str {
    current.map(Emotion::as_str).unwrap_or(NO_FACE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_labels() {
        for e in Emotion::ALL {
            assert_eq!(e.as_str().parse::<Emotion>().unwrap(), e);
        }
    }

    #[test]
    fn rejects_unknown_label() {
        assert!("bored".parse::<Emotion>().is_err());
    }

    #[test]
    fn no_face_label_for_none() {
        assert_eq!(label(None), "no_face");
        assert_eq!(label(Some(Emotion::Fear)), "fear");
    }
}
