//! # Ledger Numbering
//!
//! Human-facing ticket numbers and the business calendar they are keyed on.
//!
//! ## Format
//! ```text
//!   T 20261018 0042
//!   │ │        └── daily sequence, zero-padded to 4 digits
//!   │ └─────────── business day (YYYYMMDD)
//!   └───────────── prefix
//! ```
//!
//! The sequence itself is reserved atomically by `mesa-db` (one counter row
//! per business day); this module only formats and parses.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

const PREFIX: char = 'T';

// =============================================================================
// Ticket Number
// =============================================================================

/// A formatted ticket number, shared by every row of one bill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct TicketNumber(String);

impl TicketNumber {
    /// Formats a number for `day` and a 1-based daily sequence.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use mesa_core::ledger::TicketNumber;
    ///
    /// let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    /// assert_eq!(TicketNumber::new(day, 7).as_str(), "T202610180007");
    /// ```
    pub fn new(day: NaiveDate, sequence: u32) -> TicketNumber {
        TicketNumber(format!("{}{}{:04}", PREFIX, day.format("%Y%m%d"), sequence))
    }

    /// Parses a stored number back into (day, sequence).
    pub fn parse(value: &str) -> CoreResult<(NaiveDate, u32)> {
        let invalid = |reason: &str| {
            CoreError::from(ValidationError::InvalidFormat {
                field: "ticket_number".to_string(),
                reason: reason.to_string(),
            })
        };

        let rest = value
            .strip_prefix(PREFIX)
            .ok_or_else(|| invalid("missing T prefix"))?;
        if rest.len() < 12 || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected T followed by at least 12 digits"));
        }
        let (date, seq) = rest.split_at(8);
        let day = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid("bad date"))?;
        let sequence = seq.parse::<u32>().map_err(|_| invalid("bad sequence"))?;
        Ok((day, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Business Calendar
// =============================================================================

/// Maps instants onto the restaurant's operating days.
///
/// Timestamps are stored in UTC; "today" and "same day" are decided in the
/// restaurant's fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// UTC calendar.
    pub fn utc() -> BusinessCalendar {
        BusinessCalendar { offset: Utc.fix() }
    }

    /// Calendar at a fixed offset from UTC, in minutes (e.g. -360 for UTC-6).
    pub fn with_offset_minutes(minutes: i32) -> CoreResult<BusinessCalendar> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                CoreError::InvalidConfig(format!(
                    "business_utc_offset_minutes {} is outside -1439..=1439",
                    minutes
                ))
            })?;
        Ok(BusinessCalendar { offset })
    }

    /// Business day an instant belongs to.
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// `[start, end)` of a business day, in UTC.
    pub fn bounds(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_of(day);
        let end = day
            .checked_add_days(Days::new(1))
            .map(|next| self.start_of(next))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }

    fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        (day.and_time(NaiveTime::MIN) - self.offset).and_utc()
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        BusinessCalendar::utc()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
