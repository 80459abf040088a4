//! Clock injection (SPEC_FULL §10 supplement): `RetryDelay`/`NonceStuckTimeout`
//! are measured against wall-clock age, which makes the Finalizer's run loop
//! untestable without a way to fast-forward time. `Clock` is the seam;
//! production code uses [`SystemClock`], tests use [`AdvanceableClock`].

use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock a test can advance explicitly instead of sleeping real time.
pub struct AdvanceableClock {
    current: Mutex<Instant>
}

impl AdvanceableClock {
    pub fn new(start: Instant) -> Self {
        Self { current: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }
}

impl Clock for AdvanceableClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }
}
