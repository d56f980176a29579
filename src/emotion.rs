//! The fixed emotion vocabulary and the score distribution reported for a face

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// One of the seven emotion classes the classifier predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry = 0,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Every label, in the order the classifier emits its scores
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A score in [0, 1] for every label in [`Emotion::ALL`]. Always carries all
/// seven entries, even when no face was found.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmotionDistribution {
    scores: [f32; 7],
}

impl EmotionDistribution {
    pub fn get(&self, emotion: Emotion) -> f32 {
        self.scores[emotion as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.iter().map(|e| (*e, self.get(*e)))
    }

    /// The label with the highest score; the earliest label wins a tie
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        for (emotion, score) in self.iter() {
            if score > self.get(best) {
                best = emotion;
            }
        }
        best
    }
}

impl From<[f32; 7]> for EmotionDistribution {
    fn from(raw: [f32; 7]) -> Self {
        let scores = raw.map(|s| if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 });
        EmotionDistribution { scores }
    }
}

impl Serialize for EmotionDistribution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.scores.len()))?;
        for (emotion, score) in self.iter() {
            map.serialize_entry(emotion.as_str(), &score)?;
        }
        map.end()
    }
}
