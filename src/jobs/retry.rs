/// Exponential backoff policy used when rescheduling failed jobs.
///
/// Deterministic: `delay(attempts) = min(multiplier^attempts, max_seconds)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub multiplier: i64,
    pub max_seconds: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            multiplier: 2,
            max_seconds: 60,
        }
    }
}

impl RetryPolicy {
    pub fn delay_seconds(&self, attempts: i32) -> i64 {
        let exp = attempts.max(0) as u32;

        // Compute multiplier^attempts safely. If it overflows, the cap takes over.
        let delay = self.multiplier.checked_pow(exp).unwrap_or(i64::MAX);

        delay.min(self.max_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt_and_caps_at_sixty() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_seconds(0), 1);
        assert_eq!(policy.delay_seconds(1), 2);
        assert_eq!(policy.delay_seconds(2), 4);
        assert_eq!(policy.delay_seconds(5), 32);
        assert_eq!(policy.delay_seconds(6), 60);
        assert_eq!(policy.delay_seconds(100), 60);
    }

    #[test]
    fn non_decreasing_and_bounded() {
        let policy = RetryPolicy::default();
        let mut previous = 0;
        for attempts in 0..200 {
            let delay = policy.delay_seconds(attempts);
            assert!(delay >= previous);
            assert!(delay <= 60);
            previous = delay;
        }
    }

    #[test]
    fn negative_attempts_behave_like_zero() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_seconds(-3), 1);
    }
}
