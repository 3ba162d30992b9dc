//! Polling clock and the special time tokens it backs.
//!
//! Two tokens are recognised inside templates:
//!
//! - `$lastPollingDateTime`: the last polling instant, advanced by an external scheduler
//! - `$currentDateTime`: the wall-clock instant at which the template is rendered
//!
//! Both render as integer epoch timestamps. A single [`EpochUnit`] flag selects
//! seconds or milliseconds for both.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Unit of rendered epoch timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpochUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl EpochUnit {
    /// Convert epoch milliseconds into this unit, truncating.
    pub fn from_millis(self, millis: i64) -> i64 {
        match self {
            Self::Seconds => millis / 1000,
            Self::Milliseconds => millis,
        }
    }
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Last polling instant plus the epoch unit used to render it.
///
/// The instant never moves backwards: [`advance_to`](Self::advance_to) ignores
/// values older than the current one.
#[derive(Debug)]
pub struct PollingClock {
    last_polling_millis: AtomicI64,
    unit: EpochUnit,
}

impl PollingClock {
    pub fn new(last_polling_millis: i64, unit: EpochUnit) -> Self {
        Self {
            last_polling_millis: AtomicI64::new(last_polling_millis),
            unit,
        }
    }

    /// Start the clock `window_secs` before the clock's current instant.
    pub fn with_window(clock: &dyn Clock, window_secs: u64, unit: EpochUnit) -> Self {
        let window_millis = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self::new(clock.now_millis().saturating_sub(window_millis), unit)
    }

    pub fn unit(&self) -> EpochUnit {
        self.unit
    }

    pub fn last_polling_millis(&self) -> i64 {
        self.last_polling_millis.load(Ordering::Acquire)
    }

    /// Move the last polling instant forward. Returns the instant now in effect.
    pub fn advance_to(&self, millis: i64) -> i64 {
        let prev = self.last_polling_millis.fetch_max(millis, Ordering::AcqRel);
        prev.max(millis)
    }
}

/// Reserved placeholder names that resolve to timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialToken {
    LastPollingDateTime,
    CurrentDateTime,
}

impl SpecialToken {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "$lastPollingDateTime" => Some(Self::LastPollingDateTime),
            "$currentDateTime" => Some(Self::CurrentDateTime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastPollingDateTime => "$lastPollingDateTime",
            Self::CurrentDateTime => "$currentDateTime",
        }
    }
}

/// Resolves special tokens to their rendered text.
pub trait TokenResolver {
    fn resolve(&self, token: SpecialToken) -> i64;
}

/// Token resolver over a polling clock and a wall clock.
pub struct TimeTokens<'a> {
    polling: &'a PollingClock,
    clock: &'a dyn Clock,
}

impl<'a> TimeTokens<'a> {
    pub fn new(polling: &'a PollingClock, clock: &'a dyn Clock) -> Self {
        Self { polling, clock }
    }
}

impl TokenResolver for TimeTokens<'_> {
    fn resolve(&self, token: SpecialToken) -> i64 {
        let millis = match token {
            SpecialToken::LastPollingDateTime => self.polling.last_polling_millis(),
            // Read on every call: never cached across a batch.
            SpecialToken::CurrentDateTime => self.clock.now_millis(),
        };
        self.polling.unit().from_millis(millis)
    }
}
