use std::time::Duration;

/// Exponential backoff with a configurable multiplier, capped at a maximum
/// delay (base 250 ms, multiplier 1.8, cap 10 s for the control channel).
///
/// Unlike a full-jitter backoff, delays here are deterministic, producing
/// the exact sequence `250, 450, 810, 1458, …`. A single agent process
/// reconnecting to one coordinator has no thundering-herd concern to
/// jitter against.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base_ms: u64,
    multiplier: f64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    /// Build a new backoff starting at `base_ms`, growing by `multiplier`
    /// each attempt, capped at `max_ms`.
    #[must_use]
    pub const fn new(base_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        Self { base_ms, multiplier, max_ms, attempt: 0 }
    }

    /// The backoff policy used for the control channel.
    #[must_use]
    pub const fn for_control_channel() -> Self {
        Self::new(250, 1.8, 10_000)
    }

    /// Compute the next delay and advance the attempt counter.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_delay(&mut self) -> Duration {
        let exp_ms = self.base_ms as f64 * self.multiplier.powi(self.attempt as i32);
        let capped_ms = exp_ms.min(self.max_ms as f64);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(capped_ms as u64)
    }

    /// Reset the attempt counter after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_equals_base() {
        let mut backoff = Backoff::new(250, 1.8, 10_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn delay_grows_by_multiplier() {
        let mut backoff = Backoff::new(250, 1.8, 10_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(450));
        assert_eq!(backoff.next_delay(), Duration::from_millis(810));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1458));
    }

    #[test]
    fn delay_capped_at_max() {
        let mut backoff = Backoff::new(250, 1.8, 10_000);
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_millis(10_000));
        }
        assert_eq!(backoff.next_delay(), Duration::from_millis(10_000));
    }

    #[test]
    fn reset_resets_attempt() {
        let mut backoff = Backoff::new(250, 1.8, 10_000);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn zero_base_produces_zero_delay() {
        let mut backoff = Backoff::new(0, 1.8, 10_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(0));
    }
}
