// BinWatch: Readings, Identity & Report Outcomes

use std::fmt;

// ---------------------------------------------------------------------------
// Distance (one robust sonar estimate, whole centimeters)
// ---------------------------------------------------------------------------
/// A sonar distance in centimeters. "No echo" is modelled as
/// `Option::<Distance>::None` by the sampler, never as a magic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance(u16);

impl Distance {
    pub const fn from_cm(cm: u16) -> Self {
        Self(cm)
    }

    pub const fn cm(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}cm", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fill level
// ---------------------------------------------------------------------------
/// Bin fullness in percent. Always within `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FillLevel(u8);

impl FillLevel {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// Build a level from any integer, saturating into `0..=100`.
    pub fn saturating(percent: i32) -> Self {
        Self(percent.clamp(0, 100) as u8)
    }

    pub const fn percent(self) -> u8 {
        self.0
    }
}

impl fmt::Display for FillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ---------------------------------------------------------------------------
// Bin identity (fixed for the process lifetime)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinIdentity {
    pub bin_id: u32,
    pub host: &'static str,
    pub port: u16,
}

impl BinIdentity {
    /// `http://{host}:{port}/bins/{bin_id}`, with `host` being either the
    /// configured hostname or an address resolved from it.
    pub fn url_via(&self, host: &str) -> String {
        format!("http://{}:{}/bins/{}", host, self.port, self.bin_id)
    }

    pub fn url(&self) -> String {
        self.url_via(self.host)
    }
}

// ---------------------------------------------------------------------------
// Report outcome
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The collector acknowledged the update (200 or 204).
    Delivered(u16),
    /// The collector answered with any other status.
    Rejected(u16),
    /// No response: connection error, timeout, or the fallback address
    /// could not be resolved.
    TransportFailed,
}

impl ReportOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 | 204 => Self::Delivered(status),
            other => Self::Rejected(other),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}
