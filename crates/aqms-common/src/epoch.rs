//! Validity intervals for versioned metadata.
//!
//! An [`Epoch`] is the half-open interval `[start, end)` during which one
//! version of a network, station, channel or response stage is in effect.
//! A missing end means the epoch is open (currently in effect).

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EpochError, EpochResult};

/// Timestamps are always UTC.
pub type Timestamp = DateTime<Utc>;

/// A time-bounded validity interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Epoch {
    start: Timestamp,
    end: Option<Timestamp>,
}

impl Epoch {
    /// Create an epoch, rejecting zero-length and inverted intervals.
    pub fn new(start: Timestamp, end: Option<Timestamp>) -> EpochResult<Self> {
        if let Some(end) = end {
            match end.cmp(&start) {
                Ordering::Equal => return Err(EpochError::ZeroLength(start)),
                Ordering::Less => return Err(EpochError::Inverted { start, end }),
                Ordering::Greater => {}
            }
        }
        Ok(Self { start, end })
    }

    /// An epoch with no end.
    pub fn open(start: Timestamp) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: Timestamp, end: Timestamp) -> EpochResult<Self> {
        Self::new(start, Some(end))
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// True if `instant` falls within `[start, end)`.
    pub fn contains(&self, instant: Timestamp) -> bool {
        self.start <= instant && ends_after(self.end, instant)
    }

    /// True if the intervals share any instant. An open end is +infinity.
    ///
    /// An epoch ending at T and one starting at T are adjacent, not
    /// overlapping.
    pub fn overlaps(&self, other: &Epoch) -> bool {
        ends_after(self.end, other.start) && ends_after(other.end, self.start)
    }

    /// True if this epoch is over (its end, or now when open) by the time
    /// `other` starts.
    pub fn precedes(&self, other: &Epoch) -> bool {
        self.precedes_at(other, Utc::now())
    }

    /// [`Epoch::precedes`] with an explicit clock.
    pub fn precedes_at(&self, other: &Epoch, now: Timestamp) -> bool {
        self.end.unwrap_or(now) <= other.start
    }

    /// True if one epoch ends exactly where the other starts.
    pub fn is_adjacent_to(&self, other: &Epoch) -> bool {
        self.end == Some(other.start) || other.end == Some(self.start)
    }

    /// Merge duplicate or adjacent intervals into one.
    ///
    /// Returns `None` when the intervals are neither identical nor adjacent.
    /// Payload equality is the caller's concern, see [`crate::rows::coalesce`].
    pub fn coalesce(&self, other: &Epoch) -> Option<Epoch> {
        if self == other {
            return Some(*self);
        }
        if self.end == Some(other.start) {
            return Some(Epoch {
                start: self.start,
                end: other.end,
            });
        }
        if other.end == Some(self.start) {
            return Some(Epoch {
                start: other.start,
                end: self.end,
            });
        }
        None
    }

    /// Same start, new end.
    pub fn with_end(&self, end: Option<Timestamp>) -> EpochResult<Epoch> {
        Epoch::new(self.start, end)
    }

    /// Compare two optional ends where `None` sorts last.
    pub fn cmp_end(a: Option<Timestamp>, b: Option<Timestamp>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

impl PartialOrd for Epoch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Epoch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| Epoch::cmp_end(self.end, other.end))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(
                f,
                "[{}, {})",
                format_timestamp(&self.start),
                format_timestamp(&end)
            ),
            None => write!(f, "[{}, open)", format_timestamp(&self.start)),
        }
    }
}

/// `end` (None = +infinity) is strictly after `instant`.
fn ends_after(end: Option<Timestamp>, instant: Timestamp) -> bool {
    end.map_or(true, |end| end > instant)
}

/// Parse an ISO 8601 timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (assumed UTC) and
/// date-only forms.
pub fn parse_timestamp(s: &str) -> EpochResult<Timestamp> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(EpochError::InvalidTimestamp(s.to_string()))
}

/// Format a timestamp the way StationXML documents carry them.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
