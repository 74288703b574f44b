//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A simulation month. Month 1 is the first simulated month.
pub type Month = u32;

/// Dense account identifier, 1..=n_accounts.
pub type AccountId = u32;

/// Campaign wave identifier, assigned region-major, channel-minor.
pub type WaveId = u32;

/// The canonical run identifier.
pub type RunId = String;

/// Serialize a bool as 0/1.
pub fn flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

/// Outreach channel a nudge can be delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "inapp")]
    InApp,
}

impl Channel {
    /// Stable iteration order. Draw order in the panel follows this.
    pub const ALL: [Channel; 3] = [Channel::Email, Channel::Sms, Channel::InApp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms   => "sms",
            Self::InApp => "inapp",
        }
    }

    /// Months added to the region's base start month.
    pub fn start_offset(&self) -> Month {
        match self {
            Self::Email => 0,
            Self::Sms   => 1,
            Self::InApp => 2,
        }
    }

    pub fn intensity(&self) -> u32 {
        match self {
            Self::Email => 1,
            Self::Sms   => 2,
            Self::InApp => 1,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    North,
    South,
    East,
    West,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::North, Region::South, Region::East, Region::West];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "North",
            Self::South => "South",
            Self::East  => "East",
            Self::West  => "West",
        }
    }

    /// First campaign month for the region's email wave.
    pub fn base_start_month(&self) -> Month {
        match self {
            Self::North => 4,
            Self::South => 7,
            Self::East  => 10,
            Self::West  => 13,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "18-34")]
    Age18To34,
    #[serde(rename = "35-49")]
    Age35To49,
    #[serde(rename = "50-64")]
    Age50To64,
    #[serde(rename = "65+")]
    Age65Plus,
}

impl AgeBand {
    pub const WEIGHTED: [(AgeBand, f64); 4] = [
        (AgeBand::Age18To34, 0.20),
        (AgeBand::Age35To49, 0.30),
        (AgeBand::Age50To64, 0.30),
        (AgeBand::Age65Plus, 0.20),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Age18To34 => "18-34",
            Self::Age35To49 => "35-49",
            Self::Age50To64 => "50-64",
            Self::Age65Plus => "65+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenureBand {
    #[serde(rename = "0-2y")]
    UpTo2Years,
    #[serde(rename = "3-5y")]
    From3To5Years,
    #[serde(rename = "6y+")]
    Over6Years,
}

impl TenureBand {
    pub const WEIGHTED: [(TenureBand, f64); 3] = [
        (TenureBand::UpTo2Years, 0.35),
        (TenureBand::From3To5Years, 0.35),
        (TenureBand::Over6Years, 0.30),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpTo2Years    => "0-2y",
            Self::From3To5Years => "3-5y",
            Self::Over6Years    => "6y+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    pub const WEIGHTED: [(RiskTolerance, f64); 3] = [
        (RiskTolerance::Low, 0.40),
        (RiskTolerance::Medium, 0.40),
        (RiskTolerance::High, 0.20),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low    => "low",
            Self::Medium => "medium",
            Self::High   => "high",
        }
    }
}

/// Preferred-channel mix of the account population.
pub const PREFERRED_CHANNEL_WEIGHTS: [(Channel, f64); 3] = [
    (Channel::Email, 0.50),
    (Channel::Sms, 0.15),
    (Channel::InApp, 0.35),
];
