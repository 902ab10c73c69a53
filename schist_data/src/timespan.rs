use std::fmt;

use serde::{Deserialize, Serialize};

/// A duration measured in milliseconds, as written in scripts ("5 seconds",
/// "a tick", "1 day and 12 hours").
///
/// The engine runs on a fixed 20 ticks-per-second clock, so one tick is 50ms.
/// Timespans are stored in milliseconds and converted to ticks only when they
/// reach the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timespan {
    millis: u64,
}

/// Display/parse units, largest first.
const UNITS: [(u64, &str); 6] = [
    (86_400_000, "day"),
    (3_600_000, "hour"),
    (60_000, "minute"),
    (1_000, "second"),
    (Timespan::TICK_MILLIS, "tick"),
    (1, "millisecond"),
];

impl Timespan {
    /// Milliseconds per scheduler tick.
    pub const TICK_MILLIS: u64 = 50;

    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    #[must_use]
    pub fn from_ticks(ticks: u64) -> Self {
        Self {
            millis: ticks.saturating_mul(Self::TICK_MILLIS),
        }
    }

    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self {
            millis: secs.saturating_mul(1_000),
        }
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        self.millis
    }

    /// Whole ticks in this timespan, rounding down.
    #[must_use]
    pub fn ticks(self) -> u64 {
        self.millis / Self::TICK_MILLIS
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.millis == 0
    }

    /// Parse a written timespan like "5 seconds", "a tick", or
    /// "1 minute and 30 seconds". Returns `None` for anything that is not a
    /// timespan, including negative or non-finite counts.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_lowercase();
        if text.is_empty() {
            return None;
        }
        let mut total = 0.0_f64;
        for part in text.split(" and ").flat_map(|chunk| chunk.split(',')) {
            let part = part.trim();
            let (count, unit) = part.rsplit_once(' ')?;
            let count = match count.trim() {
                "a" | "an" | "one" => 1.0,
                digits => digits.parse::<f64>().ok()?,
            };
            if !count.is_finite() || count < 0.0 {
                return None;
            }
            total += count * unit_millis(unit.trim())? as f64;
        }
        if !total.is_finite() || total > u64::MAX as f64 {
            return None;
        }
        Some(Self::from_millis(total.round() as u64))
    }
}

fn unit_millis(unit: &str) -> Option<u64> {
    let singular = unit.strip_suffix('s').unwrap_or(unit);
    UNITS
        .iter()
        .find(|(_, name)| *name == singular)
        .map(|(millis, _)| *millis)
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis == 0 {
            return write!(f, "0 seconds");
        }
        let mut rest = self.millis;
        let mut parts = Vec::new();
        for (unit, name) in UNITS {
            let count = rest / unit;
            if count > 0 {
                let plural = if count == 1 { "" } else { "s" };
                parts.push(format!("{count} {name}{plural}"));
                rest %= unit;
            }
        }
        match parts.split_last() {
            Some((last, [])) => write!(f, "{last}"),
            Some((last, init)) => write!(f, "{} and {last}", init.join(", ")),
            None => unreachable!("non-zero timespan produced no parts"),
        }
    }
}
