use rand::Rng;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_MIN_DELAY_MS: u64 = 1;
pub const DEFAULT_CAP_MS: u64 = 5000;

/// Full-jitter backoff: a delay drawn uniformly from
/// `[0, min(cap, min_delay * 2^attempt))` milliseconds.
pub fn full_jitter(attempt: u32, min_delay_ms: u64, cap_ms: u64) -> u64 {
    let exp = min_delay_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    let bound = exp.min(cap_ms).max(1);
    rand::rng().random_range(0..bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_under_exponential_bound() {
        for attempt in 1..=10 {
            for _ in 0..100 {
                let delay = full_jitter(attempt, 1, 5000);
                assert!(delay < 5000u64.min(1u64 << attempt));
            }
        }
    }

    #[test]
    fn cap_limits_large_attempts() {
        for _ in 0..100 {
            assert!(full_jitter(30, 1, 5000) < 5000);
        }
        // Shift overflow saturates instead of panicking.
        assert!(full_jitter(80, 1, 5000) < 5000);
    }

    #[test]
    fn min_delay_scales_the_bound() {
        for _ in 0..100 {
            assert!(full_jitter(2, 10, 5000) < 40);
        }
    }
}
