use chrono::{DateTime, Utc};

/// Injected time source: `Clock.now()` / `Clock.monotonic()`.
///
/// Kept as a trait rather than calling `Utc::now()` directly so the Budget
/// Controller and Discovery Orchestrator are deterministically testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn monotonic(&self) -> f64;
}

/// Real wall-clock implementation, backed by `chrono`/`std::time::Instant`.
pub struct SystemClock {
    started: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            started: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Fixed/steppable clock for tests. `advance` moves both wall and monotonic
/// time forward together.
pub struct FixedClock {
    inner: std::sync::Mutex<FixedClockState>,
}

struct FixedClockState {
    now: DateTime<Utc>,
    monotonic: f64,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            inner: std::sync::Mutex::new(FixedClockState { now, monotonic: 0.0 }),
        }
    }

    pub fn advance(&self, seconds: f64) {
        let mut state = self.inner.lock().expect("clock mutex poisoned");
        state.now += chrono::Duration::milliseconds((seconds * 1000.0) as i64);
        state.monotonic += seconds;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().expect("clock mutex poisoned").now
    }

    fn monotonic(&self) -> f64 {
        self.inner.lock().expect("clock mutex poisoned").monotonic
    }
}
