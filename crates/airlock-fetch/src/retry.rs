use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base * attempt`.
///
/// ```
/// use std::time::Duration;
/// use airlock_fetch::retry_delay;
///
/// assert_eq!(retry_delay(1, Duration::from_secs(2)), Duration::from_secs(2));
/// assert_eq!(retry_delay(3, Duration::from_secs(2)), Duration::from_secs(6));
/// ```
pub fn retry_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_linearly() {
        let base = Duration::from_millis(250);
        let delays: Vec<_> = (1..=4).map(|n| retry_delay(n, base)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_millis(750),
                Duration::from_millis(1000),
            ]
        );
    }

    #[test]
    fn zero_base_never_waits() {
        assert_eq!(retry_delay(10, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(retry_delay(u32::MAX, Duration::MAX), Duration::MAX);
    }
}
