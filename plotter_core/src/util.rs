use std::time::Duration;

/// Seconds to whole milliseconds, rounded up; non-finite or negative gives 0.
pub fn secs_to_ms_ceil(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ms = (secs * 1000.0).ceil() as u64;
    ms
}

#[inline]
pub fn period_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_ms() {
        assert_eq!(secs_to_ms_ceil(0.0), 0);
        assert_eq!(secs_to_ms_ceil(-1.0), 0);
        assert_eq!(secs_to_ms_ceil(f64::NAN), 0);
        assert_eq!(secs_to_ms_ceil(0.0151), 16);
        assert_eq!(period_ms(0), Duration::from_millis(1));
    }
}
