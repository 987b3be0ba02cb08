use core::fmt;
use std::{str::FromStr, sync::LazyLock};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accepted spellings of a semester key. The canonical one is `1-2025`, the
/// backend also hands out `hoc_ky_1-2025`, `hoc_ky_1_2025`, `hoc_ky_12025`
/// and `HK1_2025`.
static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:hoc_ky_|hk)?(?P<ordinal>[12])[-_]?(?P<year>\d{4})$")
        .expect("semester key pattern is valid")
});

/// One entry of the semester drop-down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemesterOption {
    pub value: String,
    pub label: String,
}

impl SemesterOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> SemesterOption {
        SemesterOption {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The "all semesters" entry is the one without a value.
    pub fn is_all_semesters(&self) -> bool {
        self.value.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Ordinal {
    First,
    Second,
}

impl Ordinal {
    pub fn number(&self) -> u8 {
        match self {
            Ordinal::First => 1,
            Ordinal::Second => 2,
        }
    }
}

impl TryFrom<u8> for Ordinal {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Ordinal::First),
            2 => Ok(Ordinal::Second),
            other => Err(format!("semester ordinal must be 1 or 2, got {}", other)),
        }
    }
}

impl From<Ordinal> for u8 {
    fn from(ordinal: Ordinal) -> u8 {
        ordinal.number()
    }
}

/// A semester named by its half of the academic year and the year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemesterIdentity {
    #[serde(alias = "semester")]
    pub ordinal: Ordinal,
    pub year: u16,
}

impl SemesterIdentity {
    pub fn new(ordinal: Ordinal, year: u16) -> SemesterIdentity {
        SemesterIdentity { ordinal, year }
    }

    /// Canonical key, equal to the `value` of the matching [SemesterOption].
    pub fn key(&self) -> String {
        format!("{}-{}", self.ordinal.number(), self.year)
    }

    /// Whether `key` names this semester, in any accepted spelling.
    pub fn matches_key(&self, key: &str) -> bool {
        self.key() == key || key.parse::<SemesterIdentity>().ok().as_ref() == Some(self)
    }
}

impl FromStr for SemesterIdentity {
    type Err = anyhow::Error;

    fn from_str(key: &str) -> Result<Self> {
        let captures = KEY_PATTERN
            .captures(key.trim())
            .ok_or_else(|| anyhow!("'{}' is not a valid semester key", key))?;
        let ordinal = captures
            .name("ordinal")
            .ok_or_else(|| anyhow!("Failed to extract semester ordinal"))?
            .as_str()
            .parse::<u8>()
            .with_context(|| anyhow!("Failed to parse semester ordinal"))?;
        let year = captures
            .name("year")
            .ok_or_else(|| anyhow!("Failed to extract semester year"))?
            .as_str()
            .parse::<u16>()
            .with_context(|| anyhow!("Failed to parse semester year"))?;
        let ordinal = Ordinal::try_from(ordinal).map_err(|err| anyhow!(err))?;
        Ok(SemesterIdentity { ordinal, year })
    }
}

impl fmt::Display for SemesterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Semester {} {}", self.ordinal.number(), self.year)
    }
}

/// How far a semester is into being closed for edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Active,
    Closing,
    LockedSoft,
    LockedHard,
    Archived,
    /// Anything the backend reports that this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl LifecycleState {
    /// Position from fully open (0) to immutable history (4).
    pub fn closure_rank(&self) -> Option<u8> {
        match self {
            LifecycleState::Active => Some(0),
            LifecycleState::Closing => Some(1),
            LifecycleState::LockedSoft => Some(2),
            LifecycleState::LockedHard => Some(3),
            LifecycleState::Archived => Some(4),
            LifecycleState::Unknown => None,
        }
    }

    pub fn permits_writes(&self) -> bool {
        match self {
            LifecycleState::Active | LifecycleState::Closing => true,
            LifecycleState::LockedSoft | LifecycleState::LockedHard | LifecycleState::Archived => {
                false
            }
            LifecycleState::Unknown => true,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Closing => "CLOSING",
            LifecycleState::LockedSoft => "LOCKED_SOFT",
            LifecycleState::LockedHard => "LOCKED_HARD",
            LifecycleState::Archived => "ARCHIVED",
            LifecycleState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", state_str)
    }
}

/// Status answer for one requested semester.
///
/// `identity` is the globally active semester, which is not necessarily the
/// one that was asked about. `state` belongs to the requested semester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterStatusRecord {
    #[serde(default)]
    pub identity: Option<SemesterIdentity>,
    #[serde(default)]
    pub state: Option<LifecycleState>,
}

impl SemesterStatusRecord {
    pub fn new(identity: Option<SemesterIdentity>, state: Option<LifecycleState>) -> Self {
        SemesterStatusRecord { identity, state }
    }

    pub fn active_key(&self) -> Option<String> {
        self.identity.map(|it| it.key())
    }
}

/// Body of the `current` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSemester {
    pub value: String,
}
