//! Human-readable durations.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Hours => 3600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
        }
    }

    fn smaller(self) -> Option<TimeUnit> {
        match self {
            TimeUnit::Hours => Some(TimeUnit::Minutes),
            TimeUnit::Minutes => Some(TimeUnit::Seconds),
            TimeUnit::Seconds => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeUnit::Hours => "h",
            TimeUnit::Minutes => "m",
            TimeUnit::Seconds => "s",
        })
    }
}

/// Split `secs` into hour, minute and second fragments.
///
/// Zero components are dropped. Sub-second precision (two decimals) is kept
/// only when the whole duration is under a second; `0` is `[(0, Seconds)]`.
pub fn duration_fragments(secs: f64) -> Vec<(f64, TimeUnit)> {
    let secs = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
    if secs < 1.0 {
        return vec![((secs * 100.0).round() / 100.0, TimeUnit::Seconds)];
    }
    let mut out = Vec::new();
    push_fragments(secs.floor(), TimeUnit::Hours, &mut out);
    out
}

fn push_fragments(remaining: f64, unit: TimeUnit, out: &mut Vec<(f64, TimeUnit)>) {
    let count = (remaining / unit.seconds()).floor();
    if count > 0.0 {
        out.push((count, unit));
    }
    if let Some(next) = unit.smaller() {
        push_fragments(remaining - count * unit.seconds(), next, out);
    }
}

/// `"1h 2m 5s"`, `"42s"`, `"0.35s"`.
pub fn format_duration(secs: f64) -> String {
    duration_fragments(secs)
        .iter()
        .map(|(count, unit)| format!("{count}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Benchmark means at a readable scale: `"12.3µs"`, `"4.56ms"`, `"1.234s"`.
pub fn format_timing(secs: f64) -> String {
    if secs < 1e-3 {
        format!("{:.1}µs", secs * 1e6)
    } else if secs < 1.0 {
        format!("{:.2}ms", secs * 1e3)
    } else {
        format!("{secs:.3}s")
    }
}
