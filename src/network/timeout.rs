use core::fmt::{Display, Formatter};
use embedded_time::duration::{Generic, Microseconds};
use embedded_time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    TimerStartFailed,
    TimerError,
}

impl Display for TimeoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            TimeoutError::TimerStartFailed => write!(f, "unable to start timer"),
            TimeoutError::TimerError => write!(f, "clock failure"),
        }
    }
}

impl std::error::Error for TimeoutError {}

/// Source of monotonic time in microseconds
///
/// Implemented for every [Clock] whose ticks can be converted to microseconds.
pub trait MonotonicClock: Send + Sync {
    fn now_micros(&self) -> Result<u64, TimeoutError>;
}

impl<C> MonotonicClock for C
where
    C: Clock + Send + Sync,
    Microseconds<u64>: TryFrom<Generic<C::T>>,
{
    fn now_micros(&self) -> Result<u64, TimeoutError> {
        let instant = self.try_now().map_err(|_| TimeoutError::TimerError)?;
        let elapsed = Microseconds::<u64>::try_from(instant.duration_since_epoch())
            .map_err(|_| TimeoutError::TimerError)?;
        Ok(elapsed.0)
    }
}

/// Point in time after which an operation is considered timed out
///
/// A zero duration disables the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeout {
    expires_at: Option<u64>,
}

impl Timeout {
    pub fn new(clock: &dyn MonotonicClock, duration: Microseconds) -> Result<Timeout, TimeoutError> {
        if duration.0 == 0 {
            return Ok(Self::never());
        }

        let now = clock.now_micros().map_err(|_| TimeoutError::TimerStartFailed)?;
        Ok(Self::starting_at(now, duration))
    }

    /// Timeout relative to an already known instant
    pub fn starting_at(now: u64, duration: Microseconds) -> Timeout {
        if duration.0 == 0 {
            return Self::never();
        }

        Self {
            expires_at: Some(now.saturating_add(duration.0 as u64)),
        }
    }

    pub fn never() -> Timeout {
        Self { expires_at: None }
    }

    pub fn expired(&self, clock: &dyn MonotonicClock) -> Result<bool, TimeoutError> {
        if self.expires_at.is_none() {
            return Ok(false);
        }

        Ok(self.expired_at(clock.now_micros()?))
    }

    pub fn expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.expires_at.is_some()
    }
}
