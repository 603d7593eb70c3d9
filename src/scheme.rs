use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

pub const CEILING: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

impl LetterGrade {
    /// Highest grade first.
    pub const LADDER: [LetterGrade; 13] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::DMinus,
        LetterGrade::F,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::DMinus => "D-",
            LetterGrade::F => "F",
        }
    }

    /// Accepts the display form ("B+") or the enum-ish form ("B_PLUS").
    pub fn parse(raw: &str) -> Option<LetterGrade> {
        let t = raw.trim().to_ascii_uppercase().replace(['_', ' '], "");
        let t = t.replace("PLUS", "+").replace("MINUS", "-");
        LetterGrade::LADDER
            .iter()
            .copied()
            .find(|g| g.as_str() == t)
    }

    /// Position on the ladder, 0 being the highest grade.
    pub fn rank(self) -> usize {
        LetterGrade::LADDER
            .iter()
            .position(|g| *g == self)
            .unwrap_or(LetterGrade::LADDER.len() - 1)
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRange {
    pub lower_bound: f64,
    pub letter: LetterGrade,
    pub color: String,
}

/// Letter-grade ladder over `[0, 100)`.
///
/// Ranges are kept in ladder order with strictly decreasing lower bounds and
/// the last bound pinned at 0, so `classify` is total over non-negative input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeScheme {
    ranges: Vec<GradeRange>,
}

const DEFAULT_LADDER: [(f64, LetterGrade, &str); 13] = [
    (97.0, LetterGrade::APlus, "lightgreen"),
    (93.0, LetterGrade::A, "green"),
    (90.0, LetterGrade::AMinus, "darkgreen"),
    (87.0, LetterGrade::BPlus, "lightblue"),
    (83.0, LetterGrade::B, "blue"),
    (80.0, LetterGrade::BMinus, "darkblue"),
    (77.0, LetterGrade::CPlus, "lightyellow"),
    (73.0, LetterGrade::C, "yellow"),
    (70.0, LetterGrade::CMinus, "gold"),
    (67.0, LetterGrade::DPlus, "lavender"),
    (63.0, LetterGrade::D, "purple"),
    (60.0, LetterGrade::DMinus, "darkviolet"),
    (0.0, LetterGrade::F, "red"),
];

impl Default for GradeScheme {
    fn default() -> Self {
        Self {
            ranges: DEFAULT_LADDER
                .iter()
                .map(|(bound, letter, color)| GradeRange {
                    lower_bound: *bound,
                    letter: *letter,
                    color: color.to_string(),
                })
                .collect(),
        }
    }
}

impl GradeScheme {
    /// Builds a scheme from stored ranges, rejecting anything that is not a
    /// complete, strictly decreasing ladder ending at 0.
    pub fn from_ranges(mut ranges: Vec<GradeRange>) -> Result<Self, SessionError> {
        ranges.sort_by_key(|r| r.letter.rank());
        let letters: Vec<LetterGrade> = ranges.iter().map(|r| r.letter).collect();
        if letters != LetterGrade::LADDER {
            return Err(SessionError::precondition(
                "grade scheme must contain each letter grade exactly once",
            ));
        }
        for pair in ranges.windows(2) {
            if !(pair[1].lower_bound < pair[0].lower_bound) {
                return Err(SessionError::OverlappingRange {
                    letter: pair[1].letter,
                    requested: pair[1].lower_bound,
                    conflict: pair[0].lower_bound,
                });
            }
        }
        if let Some(top) = ranges.first() {
            if !(top.lower_bound < CEILING) {
                return Err(SessionError::OverlappingRange {
                    letter: top.letter,
                    requested: top.lower_bound,
                    conflict: CEILING,
                });
            }
        }
        if let Some(bottom) = ranges.last() {
            if bottom.lower_bound != 0.0 {
                return Err(SessionError::OverlappingRange {
                    letter: bottom.letter,
                    requested: bottom.lower_bound,
                    conflict: 0.0,
                });
            }
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[GradeRange] {
        &self.ranges
    }

    pub fn range(&self, letter: LetterGrade) -> Option<&GradeRange> {
        self.ranges.iter().find(|r| r.letter == letter)
    }

    /// First range, scanning from the top, whose lower bound is <= `percentage`.
    /// `None` only for negative or NaN input.
    pub fn classify(&self, percentage: f64) -> Option<&GradeRange> {
        self.ranges.iter().find(|r| percentage >= r.lower_bound)
    }

    pub fn update_bound(
        &mut self,
        letter: LetterGrade,
        new_lower_bound: f64,
    ) -> Result<(), SessionError> {
        if !new_lower_bound.is_finite() {
            return Err(SessionError::precondition(
                "lower bound must be a finite percentage",
            ));
        }
        let index = self.index_of(letter)?;
        let higher = if index == 0 {
            CEILING
        } else {
            self.ranges[index - 1].lower_bound
        };

        if new_lower_bound >= higher {
            return Err(SessionError::OverlappingRange {
                letter,
                requested: new_lower_bound,
                conflict: higher,
            });
        }
        match self.ranges.get(index + 1) {
            Some(next) if new_lower_bound <= next.lower_bound => {
                return Err(SessionError::OverlappingRange {
                    letter,
                    requested: new_lower_bound,
                    conflict: next.lower_bound,
                });
            }
            // Bottom range stays pinned at 0.
            None if new_lower_bound != 0.0 => {
                return Err(SessionError::OverlappingRange {
                    letter,
                    requested: new_lower_bound,
                    conflict: 0.0,
                });
            }
            _ => {}
        }

        self.ranges[index].lower_bound = new_lower_bound;
        Ok(())
    }

    pub fn update_color(
        &mut self,
        letter: LetterGrade,
        color: impl Into<String>,
    ) -> Result<(), SessionError> {
        let index = self.index_of(letter)?;
        self.ranges[index].color = color.into();
        Ok(())
    }

    fn index_of(&self, letter: LetterGrade) -> Result<usize, SessionError> {
        self.ranges
            .iter()
            .position(|r| r.letter == letter)
            .ok_or_else(|| SessionError::precondition(format!("no range for {}", letter)))
    }
}
