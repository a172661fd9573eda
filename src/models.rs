use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Turn and life counts a single-player game starts with.
    pub fn preset(self) -> DifficultyPreset {
        match self {
            Difficulty::Easy => names::EASY_PRESET,
            Difficulty::Medium => names::MEDIUM_PRESET,
            Difficulty::Hard => names::HARD_PRESET,
        }
    }

    /// Tiers are cumulative: a medium pool contains easy images too.
    pub fn includes(self, other: Difficulty) -> bool {
        other <= self
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyPreset {
    pub turns: i64,
    pub lives: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Single,
    Endless,
    Daily,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Single => "single",
            GameMode::Endless => "endless",
            GameMode::Daily => "daily",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(GameMode::Single),
            "endless" => Ok(GameMode::Endless),
            "daily" => Ok(GameMode::Daily),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Real,
    Ai,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Real => "real",
            ImageKind::Ai => "ai",
        }
    }

    /// Directory prefix the asset files of this kind are stored under.
    pub fn bucket(self) -> &'static str {
        match self {
            ImageKind::Real => "real/",
            ImageKind::Ai => "ai/",
        }
    }
}

impl FromStr for ImageKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(ImageKind::Real),
            "ai" => Ok(ImageKind::Ai),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Which side of the displayed pair the player picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Left,
    Right,
    /// The answer timer ran out before a pick was made.
    Timeout,
}

impl Choice {
    /// Controllers post `1` for the left image and `2` for the right one.
    pub fn from_wire(value: i64) -> Option<Choice> {
        match value {
            1 => Some(Choice::Left),
            2 => Some(Choice::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplayerStatus {
    Waiting,
    Ready,
    InProgress,
    Completed,
}

impl MultiplayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MultiplayerStatus::Waiting => "waiting",
            MultiplayerStatus::Ready => "ready",
            MultiplayerStatus::InProgress => "in_progress",
            MultiplayerStatus::Completed => "completed",
        }
    }

    pub fn is_started(self) -> bool {
        matches!(
            self,
            MultiplayerStatus::InProgress | MultiplayerStatus::Completed
        )
    }
}

impl FromStr for MultiplayerStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(MultiplayerStatus::Waiting),
            "ready" => Ok(MultiplayerStatus::Ready),
            "in_progress" => Ok(MultiplayerStatus::InProgress),
            "completed" => Ok(MultiplayerStatus::Completed),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownValue {}

/// Which images a selection may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierFilter {
    /// Every image, including ones that were never given a difficulty.
    Any,
    /// Cumulative pool up to and including the tier.
    UpTo(Difficulty),
    /// Only images of exactly this tier.
    Exactly(Difficulty),
}

impl TierFilter {
    pub fn for_difficulty(difficulty: Option<Difficulty>) -> TierFilter {
        match difficulty {
            Some(d) => TierFilter::UpTo(d),
            None => TierFilter::Any,
        }
    }

    pub fn admits(self, difficulty: Option<Difficulty>) -> bool {
        match (self, difficulty) {
            (TierFilter::Any, _) => true,
            (TierFilter::UpTo(max), Some(d)) => max.includes(d),
            (TierFilter::Exactly(tier), Some(d)) => tier == d,
            (_, None) => false,
        }
    }
}

/// Ordered ids of images a game has already displayed, stored comma-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownImages(Vec<i64>);

impl ShownImages {
    pub fn parse(joined: &str) -> ShownImages {
        ShownImages(
            joined
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect(),
        )
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    pub fn push(&mut self, id: i64) {
        self.0.push(id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last `n` shown ids.
    pub fn recent(&self, n: usize) -> &[i64] {
        let start = self.0.len().saturating_sub(n);
        &self.0[start..]
    }

    /// Drops all but the last `n` ids.
    pub fn keep_recent(&mut self, n: usize) {
        let excess = self.0.len().saturating_sub(n);
        self.0.drain(..excess);
    }

    pub fn join(&self) -> String {
        self.0
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<i64> for ShownImages {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        ShownImages(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_cumulative() {
        let medium = TierFilter::UpTo(Difficulty::Medium);
        assert!(medium.admits(Some(Difficulty::Easy)));
        assert!(medium.admits(Some(Difficulty::Medium)));
        assert!(!medium.admits(Some(Difficulty::Hard)));
        assert!(!medium.admits(None));
        assert!(TierFilter::Any.admits(None));
        assert!(!TierFilter::Exactly(Difficulty::Hard).admits(Some(Difficulty::Easy)));
    }

    #[test]
    fn shown_images_keeps_order_and_skips_garbage() {
        let mut shown = ShownImages::parse("3, 7,,x,9");
        assert_eq!(shown.ids(), &[3, 7, 9]);
        shown.push(11);
        assert_eq!(shown.recent(2), &[9, 11]);
        assert_eq!(shown.recent(10), &[3, 7, 9, 11]);
        assert_eq!(shown.join(), "3,7,9,11");
        assert!(ShownImages::parse("").is_empty());
    }

    #[test]
    fn keep_recent_trims_oldest() {
        let mut shown: ShownImages = (1..=6).collect();
        shown.keep_recent(4);
        assert_eq!(shown.ids(), &[3, 4, 5, 6]);
        shown.keep_recent(10);
        assert_eq!(shown.len(), 4);
    }

    #[test]
    fn wire_choice() {
        assert_eq!(Choice::from_wire(1), Some(Choice::Left));
        assert_eq!(Choice::from_wire(2), Some(Choice::Right));
        assert_eq!(Choice::from_wire(3), None);
    }
}
