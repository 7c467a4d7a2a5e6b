use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::time::Clock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer is already running")]
    AlreadyRunning,

    #[error("timer is not running")]
    NotRunning,
}

/// Stopwatch for one reading session.
///
/// Time accumulates across pause/resume. `finish` hands out the elapsed
/// seconds exactly once and resets the timer.
#[derive(Debug, Clone)]
pub struct ReadingTimer {
    clock: Clock,
    running_since: Option<DateTime<Utc>>,
    accumulated: Duration,
}

impl ReadingTimer {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            running_since: None,
            accumulated: Duration::zero(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Start (or resume) timing.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyRunning` if the timer is running.
    pub fn start(&mut self) -> Result<(), TimerError> {
        if self.running_since.is_some() {
            return Err(TimerError::AlreadyRunning);
        }
        self.running_since = Some(self.clock.now());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::NotRunning` if the timer is paused or idle.
    pub fn pause(&mut self) -> Result<(), TimerError> {
        let since = self.running_since.take().ok_or(TimerError::NotRunning)?;
        self.accumulated += non_negative(self.clock.now() - since);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::AlreadyRunning` if the timer is running.
    pub fn resume(&mut self) -> Result<(), TimerError> {
        self.start()
    }

    /// Elapsed time so far, including the running stretch.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let running = self
            .running_since
            .map_or_else(Duration::zero, |since| non_negative(self.clock.now() - since));
        self.accumulated + running
    }

    /// Stops the timer and returns the elapsed whole seconds.
    ///
    /// The timer is reset afterwards, so a second call returns 0.
    pub fn finish(&mut self) -> u64 {
        let secs = u64::try_from(self.elapsed().num_seconds()).unwrap_or(0);
        self.running_since = None;
        self.accumulated = Duration::zero();
        secs
    }

    /// Gives the timer a new clock; tests use this to step time.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }
}

fn non_negative(delta: Duration) -> Duration {
    delta.max(Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_clock;

    #[test]
    fn accumulates_across_pause_and_resume() {
        let mut clock = fixed_clock();
        let mut timer = ReadingTimer::new(clock);
        timer.start().unwrap();

        clock.advance(Duration::seconds(100));
        timer.set_clock(clock);
        timer.pause().unwrap();

        clock.advance(Duration::seconds(500));
        timer.set_clock(clock);
        assert_eq!(timer.elapsed(), Duration::seconds(100));

        timer.resume().unwrap();
        clock.advance(Duration::seconds(20));
        timer.set_clock(clock);
        assert_eq!(timer.finish(), 120);
    }

    #[test]
    fn finish_yields_once() {
        let mut clock = fixed_clock();
        let mut timer = ReadingTimer::new(clock);
        timer.start().unwrap();
        clock.advance(Duration::seconds(1800));
        timer.set_clock(clock);

        assert_eq!(timer.finish(), 1800);
        assert_eq!(timer.finish(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn rejects_invalid_transitions() {
        let mut timer = ReadingTimer::new(fixed_clock());
        assert_eq!(timer.pause().unwrap_err(), TimerError::NotRunning);
        timer.start().unwrap();
        assert_eq!(timer.start().unwrap_err(), TimerError::AlreadyRunning);
    }
}
