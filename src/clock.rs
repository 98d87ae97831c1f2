//! Render-time timestamps.
//!
//! The renderer never reads the wall clock itself; it asks a [`Timestamp`]
//! for a ready-made string so tests can pin the value.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Offset of Indian Standard Time (UTC+5:30) in seconds.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// e.g. `04:05 PM UTC+05:30, Friday, 01 March 2024`
const TIMESTAMP_FORMAT: &str = "%I:%M %p UTC%:z, %A, %d %B %Y";

/// Produces the human-readable timestamp shown in the comment footer.
pub trait Timestamp {
    fn timestamp(&self) -> String;
}

impl<F: Fn() -> String> Timestamp for F {
    fn timestamp(&self) -> String {
        self()
    }
}

/// Wall clock rendered in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    offset: FixedOffset,
}

impl ZonedClock {
    /// Clock pinned to UTC+5:30.
    pub fn ist() -> Self {
        Self {
            offset: FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix()),
        }
    }

    /// Format an instant in this clock's offset.
    #[must_use]
    pub fn format_at(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

impl Timestamp for ZonedClock {
    fn timestamp(&self) -> String {
        self.format_at(Utc::now())
    }
}
