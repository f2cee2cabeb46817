//! Shared formatting for CLI commands.

const MINUTE_MS: u64 = 60_000;
const BAR_WIDTH: usize = 10;

/// Formats milliseconds as "Xh Ym" from one hour up, "Xm" below, and
/// "Xs" below one minute.
pub fn format_duration(ms: u64) -> String {
    if ms < MINUTE_MS {
        return format!("{}s", ms / 1_000);
    }
    let total_minutes = ms / MINUTE_MS;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Share of `total` as a percentage.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[expect(clippy::cast_precision_loss, reason = "display only")]
    let share = part as f64 / total as f64;
    share * 100.0
}

/// Ten-character bar of `value` relative to `max`.
/// Non-zero values below 5% still get one block.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "clamped to 0..=10"
)]
pub fn progress_bar(value: u64, max: u64) -> String {
    if max == 0 {
        return "░".repeat(BAR_WIDTH);
    }

    let ratio = percent(value, max) / 100.0;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().clamp(0.0, 10.0) as usize
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}
