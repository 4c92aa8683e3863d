// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated clock: a signed offset applied over wall time.
//!
//! Every timestamp a twin produces — record creation times, webhook event
//! times, idempotency record ages — is read through one `Clock` handle, so a
//! single `POST /admin/time/advance` moves all time-driven behavior at once.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MIN: i64 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MIN;

/// Offset-based virtual clock. `now() = wall clock + offset`.
#[derive(Debug, Default)]
pub struct Clock {
    offset_nanos: AtomicI64,
}

impl Clock {
    pub fn new() -> Self {
        Self { offset_nanos: AtomicI64::new(0) }
    }

    /// Current simulated time.
    pub fn now(&self) -> SystemTime {
        let offset = self.offset_nanos.load(Ordering::Relaxed);
        if offset >= 0 {
            SystemTime::now() + Duration::from_nanos(offset as u64)
        } else {
            SystemTime::now() - Duration::from_nanos(offset.unsigned_abs())
        }
    }

    /// Simulated time as unix seconds.
    pub fn now_unix(&self) -> i64 {
        match self.now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        }
    }

    /// Simulated time as unix milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }

    /// Shift the offset by the given number of nanoseconds. Negative values
    /// move simulated time backwards.
    pub fn advance(&self, nanos: i64) {
        self.offset_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Clear the offset back to wall time.
    pub fn reset(&self) {
        self.offset_nanos.store(0, Ordering::Relaxed);
    }

    /// Current offset in nanoseconds.
    pub fn offset_nanos(&self) -> i64 {
        self.offset_nanos.load(Ordering::Relaxed)
    }
}

/// Return current wall-clock epoch millis (unaffected by any simulated offset).
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

// -- Duration strings ---------------------------------------------------------

/// Parse a duration string into nanoseconds.
///
/// Accepts a decimal number per segment with a unit suffix `ns|us|µs|ms|s|m|h`,
/// an optional leading sign, and concatenated segments (`"1h1s"`, `"-1.5m"`).
pub fn parse_duration(s: &str) -> anyhow::Result<i64> {
    let original = s;
    let mut rest = s.trim();
    anyhow::ensure!(!rest.is_empty(), "empty duration");

    let mut sign = 1i64;
    if let Some(r) = rest.strip_prefix('-') {
        sign = -1;
        rest = r;
    } else if let Some(r) = rest.strip_prefix('+') {
        rest = r;
    }
    anyhow::ensure!(!rest.is_empty(), "invalid duration {original:?}");

    // Bare zero needs no unit.
    if rest == "0" {
        return Ok(0);
    }

    let mut total: i64 = 0;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        anyhow::ensure!(num_end > 0, "invalid duration {original:?}");
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration {original:?}"))?;
        rest = &rest[num_end..];

        let unit_nanos = if let Some(r) = rest.strip_prefix("ns") {
            rest = r;
            1.0
        } else if let Some(r) = rest.strip_prefix("us") {
            rest = r;
            1_000.0
        } else if let Some(r) = rest.strip_prefix("µs") {
            rest = r;
            1_000.0
        } else if let Some(r) = rest.strip_prefix("ms") {
            rest = r;
            1_000_000.0
        } else if let Some(r) = rest.strip_prefix('s') {
            rest = r;
            NANOS_PER_SEC as f64
        } else if let Some(r) = rest.strip_prefix('m') {
            rest = r;
            NANOS_PER_MIN as f64
        } else if let Some(r) = rest.strip_prefix('h') {
            rest = r;
            NANOS_PER_HOUR as f64
        } else {
            anyhow::bail!("unknown unit in duration {original:?}");
        };

        let nanos = (value * unit_nanos).round() as i64;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| anyhow::anyhow!("duration {original:?} overflows"))?;
    }

    Ok(sign.saturating_mul(total))
}

/// Format nanoseconds as a duration string: `"1h0m30s"`, `"250ms"`, `"-2m10s"`.
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_owned();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let n = nanos.unsigned_abs();

    // Sub-second values use the largest fitting small unit.
    if n < 1_000 {
        return format!("{sign}{n}ns");
    }
    if n < 1_000_000 {
        return format!("{sign}{}µs", trim_fraction(n as f64 / 1_000.0));
    }
    if n < NANOS_PER_SEC as u64 {
        return format!("{sign}{}ms", trim_fraction(n as f64 / 1_000_000.0));
    }

    let hours = n / NANOS_PER_HOUR as u64;
    let mins = (n % NANOS_PER_HOUR as u64) / NANOS_PER_MIN as u64;
    let sec_nanos = n % NANOS_PER_MIN as u64;
    let secs = trim_fraction(sec_nanos as f64 / NANOS_PER_SEC as f64);

    match (hours, mins) {
        (0, 0) => format!("{sign}{secs}s"),
        (0, m) => format!("{sign}{m}m{secs}s"),
        (h, m) => format!("{sign}{h}h{m}m{secs}s"),
    }
}

/// Render a float without trailing fraction zeros ("1.5", "10").
fn trim_fraction(v: f64) -> String {
    let s = format!("{v:.3}");
    match s.trim_end_matches('0').trim_end_matches('.') {
        "" => "0".to_owned(),
        t => t.to_owned(),
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
