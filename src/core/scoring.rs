//! Score, level and gravity rules.

use crate::types::{
    BASE_DROP_MS, DROP_INTERVAL_MIN_MS, DROP_MS_PER_LEVEL, LINE_SCORES,
};

/// Points for clearing `lines` rows with the given pre-clear combo count.
///
/// Base values are 100/300/500/800 for 1-4 lines, multiplied by
/// `1 + 0.5 * combo` in integer math. A first clear (combo 0) scores the
/// base value; a tetris at combo 2 scores 1600.
pub fn line_clear_points(lines: usize, combo: u32) -> u64 {
    let base = u64::from(LINE_SCORES[lines.min(4)]);
    base * (2 + u64::from(combo)) / 2
}

/// Level derived from total lines cleared: one level per 10 lines.
pub fn level_for_lines(total_lines: u64) -> u32 {
    (total_lines / 10) as u32
}

/// Gravity interval for a level, clamped to the minimum.
pub fn drop_interval_ms(level: u32) -> u64 {
    u64::from(
        BASE_DROP_MS
            .saturating_sub(DROP_MS_PER_LEVEL.saturating_mul(level))
            .max(DROP_INTERVAL_MIN_MS),
    )
}
