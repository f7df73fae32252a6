//! Common time/period helpers for grip_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in microseconds for a given rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Compute the period in milliseconds for a given rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_us_clamps_and_rounds_down() {
        assert_eq!(period_us(0), MICROS_PER_SEC);
        assert_eq!(period_us(100), 10_000);
        assert_eq!(period_us(20_000), 50);
        // Beyond 1 MHz the floor of 1 us applies
        assert_eq!(period_us(2_000_000), 1);
    }

    #[test]
    fn period_ms_floors_at_one() {
        assert_eq!(period_ms(100), 10);
        assert_eq!(period_ms(20_000), 1);
    }
}
