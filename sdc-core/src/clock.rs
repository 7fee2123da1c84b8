use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::stream::Stream;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};
use tokio_stream::StreamExt;

/// A stream of tick events produced by [`Clock::ticker`].
pub type TickStream = Pin<Box<dyn Stream<Item = ()> + Send>>;

/// Supplies monotonic "now" and a restartable ticker, so that the address
/// table and pruner never touch wall-clock time directly and can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync + 'static {
    /// The current monotonic instant.
    fn now(&self) -> Instant;

    /// A lazy, restartable sequence of tick events spaced `interval` apart.
    fn ticker(&self, interval: Duration) -> TickStream;
}

/// The production [`Clock`], backed by the Tokio runtime's timer wheel.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn ticker(&self, interval: Duration) -> TickStream {
        Box::pin(IntervalStream::new(tokio::time::interval(interval)).map(|_| ()))
    }
}

/// A test double that advances virtual time on command and fires every
/// outstanding ticker deterministically, rather than racing the real clock.
#[derive(Clone, Default)]
pub struct TestClock {
    inner: Arc<Mutex<TestClockInner>>,
}

#[derive(Default)]
struct TestClockInner {
    now: Option<Instant>,
    tickers: Vec<mpsc::UnboundedSender<()>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves virtual time forward and fires every ticker registered so far.
    pub fn advance(&self, by: Duration) {
        let mut inner = self.inner.lock();
        let now = *inner.now.get_or_insert_with(Instant::now) + by;
        inner.now = Some(now);
        inner.tickers.retain(|tx| tx.send(()).is_ok());
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        let mut inner = self.inner.lock();
        *inner.now.get_or_insert_with(Instant::now)
    }

    fn ticker(&self, _interval: Duration) -> TickStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().tickers.push(tx);
        Box::pin(UnboundedReceiverStream::new(rx))
    }
}
