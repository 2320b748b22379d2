use embedded_time::duration::Microseconds;

/// Decides when a failed connection is attempted again
pub trait ReconnectRetryPolicy: Send + Sync {
    /// Delay before the given attempt. Attempts are counted from 1 since the last success.
    fn delay(&self, attempt: u32) -> Microseconds;
}

/// Doubles the delay on every attempt, up to a maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialRetry {
    base: Microseconds,
    max: Microseconds,
}

impl ExponentialRetry {
    pub fn new(base: Microseconds, max: Microseconds) -> Self {
        Self { base, max }
    }
}

impl Default for ExponentialRetry {
    /// 5 ms base, 10 s max.
    fn default() -> Self {
        Self::new(Microseconds(5_000), Microseconds(10_000_000))
    }
}

impl ReconnectRetryPolicy for ExponentialRetry {
    fn delay(&self, attempt: u32) -> Microseconds {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = (self.base.0 as u64).saturating_mul(1u64 << exponent);
        Microseconds(delay.min(self.max.0 as u64) as u32)
    }
}

/// Same delay for every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearRetry {
    interval: Microseconds,
}

impl LinearRetry {
    pub fn new(interval: Microseconds) -> Self {
        Self { interval }
    }
}

impl ReconnectRetryPolicy for LinearRetry {
    fn delay(&self, _attempt: u32) -> Microseconds {
        self.interval
    }
}
