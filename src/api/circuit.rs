use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Guards the Data API v3 caller against hammering a key that is already
/// failing. Two independent trips exist, mirroring the teacher's rate-limit
/// backoff (`YoutubeHttpContextFilter`) generalized to the two failure modes
/// the Data API actually reports:
///
/// - a `quotaExceeded` 403 trips the breaker for the rest of the current UTC
///   day, the same way `YtApiClient::is_ratelimited` remembers a julian day
///   in the reference implementation, since per-project quota resets at
///   midnight Pacific and will not recover sooner;
/// - three consecutive `5xx`/transient failures trip the breaker briefly
///   (60s), since those are expected to be transient.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<State>,
}

#[derive(Debug, Clone, Copy, Default)]
struct State {
    quota_tripped_until: Option<Instant>,
    consecutive_failures: u32,
    failure_tripped_until: Option<Instant>,
}

const FAILURE_TRIP_THRESHOLD: u32 = 3;
const FAILURE_COOLDOWN: Duration = Duration::from_secs(60);
const QUOTA_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// `true` if calls should be short-circuited right now.
    pub fn is_open(&self) -> bool {
        let state = self.state.read().unwrap();
        let now = Instant::now();
        state.quota_tripped_until.is_some_and(|until| now < until)
            || state.failure_tripped_until.is_some_and(|until| now < until)
    }

    pub fn record_quota_exceeded(&self) {
        let mut state = self.state.write().unwrap();
        state.quota_tripped_until = Some(Instant::now() + QUOTA_COOLDOWN);
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write().unwrap();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= FAILURE_TRIP_THRESHOLD {
            state.failure_tripped_until = Some(Instant::now() + FAILURE_COOLDOWN);
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();
        state.consecutive_failures = 0;
        state.failure_tripped_until = None;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
