//! Hosted port for [kestrel](https://github.com/kestrel-rtos/kestrel)
//!
//! Drives the kernel from a normal OS thread: ticks come from the wall clock
//! and interrupt handlers run on their own threads, signalling the kernel
//! through an [`InterruptLine`].

use std::{
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use kestrel::{Event, Kernel, KernelConfig, Port};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

pub mod logger;

struct Shared {
    stopped: AtomicBool,
    ticks: AtomicU64,
}

/// Port delivering one [`Event::Tick`] per tick period of wall-clock time.
pub struct TickPort {
    period: Duration,
    next_tick: Instant,
    events: Receiver<Event>,
    sender: Sender<Event>,
    shared: Arc<Shared>,
}

impl TickPort {
    /// Creates a port ticking at `tick_freq` Hz.
    pub fn new(tick_freq: u32) -> Self {
        let period = Duration::from_secs(1) / tick_freq.max(1);
        let (sender, events) = mpsc::channel();
        Self {
            period,
            next_tick: Instant::now() + period,
            events,
            sender,
            shared: Arc::new(Shared {
                stopped: AtomicBool::new(false),
                ticks: AtomicU64::new(0),
            }),
        }
    }

    /// Handle for interrupt-source threads.
    pub fn interrupt_line(&self) -> InterruptLine {
        InterruptLine {
            sender: self.sender.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Number of ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }
}

impl Port for TickPort {
    fn wait_for_event(&mut self) -> Event {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Event::Shutdown;
        }

        let timeout = self.next_tick.saturating_duration_since(Instant::now());
        match self.events.recv_timeout(timeout) {
            Ok(Event::Shutdown) => {
                self.shared.stopped.store(true, Ordering::Release);
                Event::Shutdown
            }
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                // Scheduled from the previous deadline so that ticks do not drift
                self.next_tick += self.period;
                self.shared.ticks.fetch_add(1, Ordering::AcqRel);
                Event::Tick
            }
        }
    }
}

/// Connection from an interrupt source to the kernel loop.
#[derive(Clone)]
pub struct InterruptLine {
    sender: Sender<Event>,
    shared: Arc<Shared>,
}

impl InterruptLine {
    /// Runs `handler` as an interrupt handler, then wakes the kernel loop so
    /// that a reschedule requested by the handler is honored.
    pub fn raise<R>(&self, handler: impl FnOnce() -> R) -> R {
        let ret = handler();
        let _ = self.sender.send(Event::Interrupt);
        ret
    }

    /// Makes [`Kernel::start`] return.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Event::Shutdown);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Ticks delivered by the port so far.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }
}

/// Spawns a thread that raises an interrupt every `period`, `count` times
/// (forever if `None`), or until the kernel is shut down.
pub fn spawn_interrupt_source<M, F>(
    kernel: &'static Kernel<M>,
    line: InterruptLine,
    period: Duration,
    count: Option<usize>,
    mut handler: F,
) -> JoinHandle<()>
where
    M: Send + 'static,
    F: FnMut(&Kernel<M>) + Send + 'static,
{
    thread::spawn(move || {
        let mut raised = 0;
        while count.is_none_or(|count| raised < count) && !line.is_shut_down() {
            thread::sleep(period);
            line.raise(|| handler(kernel));
            raised += 1;
        }
    })
}

/// Creates a kernel and a matching tick port.
pub fn init<M>(config: KernelConfig) -> (Kernel<M>, TickPort) {
    let port = TickPort::new(config.tick_freq);
    (Kernel::new(config), port)
}
