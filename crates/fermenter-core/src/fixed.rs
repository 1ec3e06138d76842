use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert a tick count into Fixed64, saturating at the integer range.
#[inline]
pub fn ticks_to_fixed64(ticks: Ticks) -> Fixed64 {
    Fixed64::saturating_from_num(ticks)
}

/// Round a non-negative fixed-point tick amount to whole ticks, half away
/// from zero. Negative amounts round to 0.
#[inline]
pub fn round_to_ticks(v: Fixed64) -> Ticks {
    if v <= Fixed64::ZERO {
        return 0;
    }
    v.saturating_round().to_num::<u64>()
}

/// Linearly map `x` from `[x0, x1]` onto `[y0, y1]` without clamping.
///
/// A degenerate source range maps everything to `y0`.
#[inline]
pub fn lerp_double(x0: Fixed64, x1: Fixed64, y0: Fixed64, y1: Fixed64, x: Fixed64) -> Fixed64 {
    let span = x1 - x0;
    if span == Fixed64::ZERO {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / span
}

/// Like [`lerp_double`], but `x` is first clamped into `[x0, x1]`.
#[inline]
pub fn lerp_double_clamped(
    x0: Fixed64,
    x1: Fixed64,
    y0: Fixed64,
    y1: Fixed64,
    x: Fixed64,
) -> Fixed64 {
    let (lo, hi) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
    lerp_double(x0, x1, y0, y1, x.clamp(lo, hi))
}
