use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for every
/// duration and rate inside the simulation so ticks replay identically.
pub type Fixed64 = I32F32;

/// Convert an f64 to Fixed64. Use only at the API boundary, never in the
/// tick loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// `a / b`, or `None` when `b` is zero.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
    }

    #[test]
    fn nan_converts_to_zero() {
        assert_eq!(f64_to_fixed64(f64::NAN), Fixed64::ZERO);
    }

    #[test]
    fn huge_values_saturate() {
        assert_eq!(f64_to_fixed64(1e30), Fixed64::MAX);
        assert_eq!(f64_to_fixed64(-1e30), Fixed64::MIN);
    }

    #[test]
    fn checked_div_by_zero() {
        assert!(checked_div_64(f64_to_fixed64(1.0), Fixed64::ZERO).is_none());
        assert_eq!(
            checked_div_64(f64_to_fixed64(3.0), f64_to_fixed64(2.0)),
            Some(f64_to_fixed64(1.5))
        );
    }

    #[test]
    fn fixed64_determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a * f64_to_fixed64(3.0), b * f64_to_fixed64(3.0));
    }
}
