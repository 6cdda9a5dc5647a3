use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Failed logins allowed per window before lockout.
pub const MAX_FAILURES: u32 = 5;
/// Window over which failures are counted.
pub const WINDOW: Duration = Duration::from_secs(60);
/// Lockout duration after MAX_FAILURES.
pub const LOCKOUT: Duration = Duration::from_secs(300);

/// How a reserved login attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    /// An enrolled identity matched; the client's failures are forgotten.
    Granted,
    /// The frame was usable but matched nobody; counts as a failure.
    Denied,
    /// Bad frame, pose rejection or infrastructure error; not counted.
    Inconclusive,
}

#[derive(Debug, Clone, Copy)]
struct ClientRecord {
    failures: u32,
    in_flight: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl ClientRecord {
    fn fresh(now: Instant) -> Self {
        Self {
            failures: 0,
            in_flight: 0,
            window_start: now,
            locked_until: None,
        }
    }

    /// Start a new counting window, keeping attempts still in flight.
    fn restart_window(&mut self, now: Instant) {
        self.failures = 0;
        self.window_start = now;
        self.locked_until = None;
    }

    fn is_idle(&self) -> bool {
        self.failures == 0 && self.in_flight == 0 && self.locked_until.is_none()
    }
}

/// Per-client limiter for face login attempts.
///
/// Face login carries no claimed identity, so attempts are keyed by a
/// caller-supplied client key (remote address, device id). Only a completed
/// "no enrolled match" counts as a failure; undecodable frames, missing
/// faces and pose rejections do not.
///
/// Attempts are reserved with [`begin_attempt`](Self::begin_attempt) before
/// the pipeline runs and settled with [`finish_attempt`](Self::finish_attempt).
/// In-flight attempts count against the budget, so concurrent requests from
/// one client cannot run more than `MAX_FAILURES` pipelines per window.
#[derive(Debug, Default)]
pub struct LoginRateLimiter {
    records: HashMap<String, ClientRecord>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve one attempt for `client`.
    ///
    /// `Err(seconds)` while the client is locked out, or while its pending
    /// and failed attempts already fill the window's budget.
    pub fn begin_attempt(&mut self, client: &str) -> Result<(), u64> {
        self.begin_attempt_at(client, Instant::now())
    }

    /// Settle an attempt reserved with [`begin_attempt`](Self::begin_attempt).
    pub fn finish_attempt(&mut self, client: &str, result: AttemptResult) {
        self.finish_attempt_at(client, result, Instant::now());
    }

    fn begin_attempt_at(&mut self, client: &str, now: Instant) -> Result<(), u64> {
        let record = self
            .records
            .entry(client.to_string())
            .or_insert_with(|| ClientRecord::fresh(now));

        match record.locked_until {
            Some(until) if now < until => {
                return Err(until.duration_since(now).as_secs().max(1));
            }
            Some(_) => record.restart_window(now),
            None if now.duration_since(record.window_start) >= WINDOW => record.restart_window(now),
            None => {}
        }

        if record.failures + record.in_flight >= MAX_FAILURES {
            let window_left = WINDOW.saturating_sub(now.duration_since(record.window_start));
            tracing::warn!(
                client,
                failures = record.failures,
                in_flight = record.in_flight,
                "login attempt budget exhausted"
            );
            return Err(window_left.as_secs().max(1));
        }

        record.in_flight += 1;
        Ok(())
    }

    fn finish_attempt_at(&mut self, client: &str, result: AttemptResult, now: Instant) {
        let Some(record) = self.records.get_mut(client) else {
            return;
        };
        record.in_flight = record.in_flight.saturating_sub(1);

        match result {
            AttemptResult::Granted => {
                record.failures = 0;
                record.locked_until = None;
            }
            AttemptResult::Denied => {
                if now.duration_since(record.window_start) >= WINDOW {
                    record.restart_window(now);
                }
                record.failures += 1;
                if record.failures >= MAX_FAILURES {
                    record.locked_until = Some(now + LOCKOUT);
                    tracing::warn!(
                        client,
                        failures = record.failures,
                        lockout_secs = LOCKOUT.as_secs(),
                        "login rate limit triggered, locking client"
                    );
                } else {
                    tracing::debug!(
                        client,
                        failures = record.failures,
                        max = MAX_FAILURES,
                        "login failed, incrementing failure counter"
                    );
                }
            }
            AttemptResult::Inconclusive => {}
        }

        if record.is_idle() {
            self.records.remove(client);
        }
    }
}
