//! Condition polling.
//!
//! Backend state changes (a service starting, replication converging, a web
//! UI coming up) are not pushed to the test; they have to be polled. The
//! [`Poller`] evaluates a predicate until it returns a [`Truthy`] value,
//! sleeping between attempts, and gives up once the time budget is spent.
//!
//! Everything here blocks the calling thread. An attempt that is already
//! running is never interrupted; the budget is only checked between
//! attempts, so the wait can overrun `timeout` by at most one predicate call.

mod outcome;
mod truthy;

pub use outcome::{LastObservation, WaitError, WaitOutcome, WaitTimeout};
pub use truthy::Truthy;

use std::convert::Infallible;
use std::fmt::{Debug, Display};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

/// Shortest sleep between attempts, whatever `delay` says.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Repeatedly evaluates a predicate until it succeeds or time runs out.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use conscript::Poller;
///
/// let mut checks = 0;
/// let outcome = Poller::new(Duration::from_secs(5))
///     .delay(Duration::from_millis(10))
///     .message("database to accept connections")
///     .wait_until(|| {
///         checks += 1;
///         checks >= 3
///     })
///     .unwrap();
/// assert_eq!(outcome.attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct Poller {
    /// Minimum time between two evaluations.
    delay: Duration,

    /// Total time budget.
    timeout: Duration,

    /// What is being waited for, for logs and errors.
    message: String,

    /// Treat predicate errors as falsy results instead of aborting.
    handle_errors: bool,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
            message: "condition".to_string(),
            handle_errors: false,
        }
    }
}

impl Poller {
    /// Create a poller with the given time budget and a one second delay.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Set the delay between evaluations. Values under a millisecond are
    /// raised to one.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the total time budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Describe what is being waited for.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Count predicate errors as "not yet" instead of aborting the wait.
    pub fn handle_errors(mut self, handle: bool) -> Self {
        self.handle_errors = handle;
        self
    }

    /// Get the delay between evaluations.
    pub fn get_delay(&self) -> Duration {
        self.delay
    }

    /// Get the time budget.
    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the description.
    pub fn get_message(&self) -> &str {
        &self.message
    }

    /// Poll `predicate` until it returns a truthy value.
    pub fn wait_for<T, E, P>(&self, predicate: P) -> Result<WaitOutcome<T>, WaitError<E>>
    where
        P: FnMut() -> Result<T, E>,
        T: Truthy + Debug,
        E: Display,
    {
        self.wait_for_with(predicate, || Ok(()))
    }

    /// Poll `predicate`, running `fail_callback` after every unsuccessful
    /// attempt.
    ///
    /// The callback exists for conditions that need a cache refresh before
    /// they can change. Its errors are not swallowed: they abort the wait
    /// with [`WaitError::FailCallback`].
    pub fn wait_for_with<T, E, P, C>(
        &self,
        mut predicate: P,
        mut fail_callback: C,
    ) -> Result<WaitOutcome<T>, WaitError<E>>
    where
        P: FnMut() -> Result<T, E>,
        C: FnMut() -> Result<(), E>,
        T: Truthy + Debug,
        E: Display,
    {
        debug!(
            "waiting for {} (timeout {:?}, delay {:?})",
            self.message, self.timeout, self.delay
        );

        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let last = match predicate() {
                Ok(value) if value.is_truthy() => {
                    let elapsed = start.elapsed();
                    debug!(
                        "{} satisfied after {:?} ({} attempts)",
                        self.message, elapsed, attempts
                    );
                    return Ok(WaitOutcome {
                        value,
                        elapsed,
                        attempts,
                    });
                }
                Ok(value) => {
                    trace!("{}: attempt {} returned {:?}", self.message, attempts, value);
                    LastObservation::Value(format!("{value:?}"))
                }
                Err(e) if self.handle_errors => {
                    debug!("{}: attempt {} failed: {}", self.message, attempts, e);
                    LastObservation::Error(e.to_string())
                }
                Err(e) => return Err(WaitError::Predicate(e)),
            };

            fail_callback().map_err(WaitError::FailCallback)?;

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(self.timed_out(elapsed, attempts, last).into());
            }

            thread::sleep(self.delay.max(MIN_DELAY).min(self.timeout - elapsed));

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(self.timed_out(elapsed, attempts, last).into());
            }
        }
    }

    /// Poll an infallible predicate until it returns a truthy value.
    pub fn wait_until<T, P>(&self, mut predicate: P) -> Result<WaitOutcome<T>, WaitTimeout>
    where
        P: FnMut() -> T,
        T: Truthy + Debug,
    {
        self.wait_for(|| Ok::<T, Infallible>(predicate()))
            .map_err(|err| match err {
                WaitError::Timeout(timeout) => timeout,
                WaitError::Predicate(never) | WaitError::FailCallback(never) => match never {},
            })
    }

    fn timed_out(
        &self,
        elapsed: Duration,
        attempts: u32,
        last: LastObservation,
    ) -> WaitTimeout {
        debug!(
            "gave up waiting for {} after {:?} ({} attempts)",
            self.message, elapsed, attempts
        );
        WaitTimeout {
            description: self.message.clone(),
            timeout: self.timeout,
            elapsed,
            attempts,
            last: Some(last),
        }
    }
}

/// Poll `predicate` every `delay` until it returns a truthy value or
/// `timeout` has passed.
pub fn wait_for<T, E, P>(
    predicate: P,
    delay: Duration,
    timeout: Duration,
) -> Result<WaitOutcome<T>, WaitError<E>>
where
    P: FnMut() -> Result<T, E>,
    T: Truthy + Debug,
    E: Display,
{
    Poller::new(timeout).delay(delay).wait_for(predicate)
}

/// [`wait_for`] with a callback run after every unsuccessful attempt.
pub fn wait_for_with<T, E, P, C>(
    predicate: P,
    fail_callback: C,
    delay: Duration,
    timeout: Duration,
) -> Result<WaitOutcome<T>, WaitError<E>>
where
    P: FnMut() -> Result<T, E>,
    C: FnMut() -> Result<(), E>,
    T: Truthy + Debug,
    E: Display,
{
    Poller::new(timeout)
        .delay(delay)
        .wait_for_with(predicate, fail_callback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_success_does_not_sleep() {
        let start = Instant::now();
        let outcome = wait_for(|| Ok::<_, Infallible>(true), Duration::from_secs(1), Duration::from_secs(5))
            .unwrap();
        assert!(outcome.value);
        assert_eq!(outcome.attempts, 1);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_never_true_times_out_after_three_or_four_attempts() {
        let mut calls = 0u32;
        let start = Instant::now();
        let err = wait_for(
            || {
                calls += 1;
                Ok::<_, Infallible>(false)
            },
            Duration::from_millis(100),
            Duration::from_millis(350),
        )
        .unwrap_err();
        let elapsed = start.elapsed();

        assert!((3..=4).contains(&calls), "calls = {calls}");
        assert!(elapsed >= Duration::from_millis(350));
        let timeout = err.as_timeout().unwrap();
        assert_eq!(timeout.attempts, calls);
        assert_eq!(timeout.last, Some(LastObservation::Value("false".into())));
    }

    #[test]
    fn test_third_call_succeeds() {
        let mut calls = 0u32;
        let outcome = wait_for(
            || {
                calls += 1;
                Ok::<_, Infallible>(if calls == 3 { Some("ready") } else { None })
            },
            Duration::from_millis(50),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(outcome.value, Some("ready"));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_predicate_error_propagates() {
        let mut calls = 0u32;
        let err = wait_for(
            || {
                calls += 1;
                Err::<bool, _>("ssh refused")
            },
            Duration::from_millis(10),
            Duration::from_secs(5),
        )
        .unwrap_err();

        assert!(matches!(err, WaitError::Predicate("ssh refused")));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_handled_errors_count_as_falsy() {
        let mut calls = 0u32;
        let outcome = Poller::new(Duration::from_secs(5))
            .delay(Duration::from_millis(10))
            .handle_errors(true)
            .wait_for(|| {
                calls += 1;
                if calls < 3 { Err("not up yet") } else { Ok(true) }
            })
            .unwrap();
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_handled_error_is_last_observation() {
        let err = Poller::new(Duration::from_millis(50))
            .delay(Duration::from_millis(10))
            .handle_errors(true)
            .message("web ui")
            .wait_for(|| Err::<bool, _>("503"))
            .unwrap_err();

        let timeout = err.as_timeout().unwrap();
        assert_eq!(timeout.description, "web ui");
        assert_eq!(timeout.last, Some(LastObservation::Error("503".into())));
    }

    #[test]
    fn test_fail_callback_runs_between_attempts() {
        let mut calls = 0u32;
        let mut refreshes = 0u32;
        let outcome = wait_for_with(
            || {
                calls += 1;
                Ok::<_, String>(calls == 4)
            },
            || {
                refreshes += 1;
                Ok(())
            },
            Duration::from_millis(5),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(outcome.attempts, 4);
        assert_eq!(refreshes, 3);
    }

    #[test]
    fn test_fail_callback_error_aborts() {
        let err = wait_for_with(
            || Ok::<_, String>(false),
            || Err("cache refresh failed".to_string()),
            Duration::from_millis(5),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, WaitError::FailCallback(msg) if msg == "cache refresh failed"));
    }

    #[test]
    fn test_zero_delay_does_not_spin() {
        let mut calls = 0u32;
        let err = Poller::new(Duration::from_millis(50))
            .delay(Duration::ZERO)
            .wait_until(|| {
                calls += 1;
                false
            })
            .unwrap_err();
        assert!(calls <= 60, "calls = {calls}");
        assert_eq!(err.attempts, calls);
    }

    #[test]
    fn test_zero_timeout_evaluates_once() {
        let mut calls = 0u32;
        let err = Poller::new(Duration::ZERO)
            .wait_until(|| {
                calls += 1;
                false
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.attempts, 1);
    }
}
