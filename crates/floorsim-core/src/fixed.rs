use fixed::types::I32F32;

/// Q32.32 fixed-point used for speed ratios and queue estimates.
pub type Fixed64 = I32F32;

/// Simulated time, in whole ticks.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Only for loading configuration.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64 for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Whole ticks as a fixed-point value, saturating at the Fixed64 range.
#[inline]
pub fn ticks_to_fixed(t: Ticks) -> Fixed64 {
    Fixed64::saturating_from_num(t)
}

/// Ticks needed for one unit of work: `processing_time / speed`, rounded up,
/// never less than one. A non-positive speed is treated as 1.
pub fn per_unit_ticks(processing_time: Ticks, speed: Fixed64) -> Ticks {
    let speed = if speed <= Fixed64::ZERO {
        Fixed64::ONE
    } else {
        speed
    };
    let raw = ticks_to_fixed(processing_time)
        .checked_div(speed)
        .unwrap_or(Fixed64::MAX);
    let whole = raw.checked_ceil().unwrap_or(Fixed64::MAX);
    whole.to_num::<i64>().max(1) as Ticks
}
