//! Single-slot debounce timer.
//!
//! `arm()` (re)sets one pending deadline; when it passes with no further arm,
//! the timer fires once by sending the configured event. One background
//! thread per timer; dropping the timer stops it.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Slot {
    deadline: Option<Instant>,
    shutdown: bool,
}

pub struct DebounceTimer {
    shared: Arc<(Mutex<Slot>, Condvar)>,
    window: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    /// Spawn the timer thread. Each fire sends a clone of `event` on `tx`.
    pub fn new<E>(window: Duration, tx: Sender<E>, event: E) -> Self
    where
        E: Clone + Send + 'static,
    {
        let shared = Arc::new((
            Mutex::new(Slot {
                deadline: None,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let worker = Arc::clone(&shared);
        let handle = thread::spawn(move || run(worker, tx, event));
        Self {
            shared,
            window,
            handle: Some(handle),
        }
    }

    /// Schedule a fire `window` from now, replacing any pending deadline.
    pub fn arm(&self) {
        let (lock, cvar) = &*self.shared;
        if let Ok(mut slot) = lock.lock() {
            slot.deadline = Some(Instant::now() + self.window);
            cvar.notify_one();
        }
    }

    /// Drop any pending deadline without firing.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.shared;
        if let Ok(mut slot) = lock.lock() {
            slot.deadline = None;
            cvar.notify_one();
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        {
            let (lock, cvar) = &*self.shared;
            if let Ok(mut slot) = lock.lock() {
                slot.shutdown = true;
                cvar.notify_one();
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run<E: Clone>(shared: Arc<(Mutex<Slot>, Condvar)>, tx: Sender<E>, event: E) {
    let (lock, cvar) = &*shared;
    let mut slot = match lock.lock() {
        Ok(s) => s,
        Err(_) => return,
    };
    loop {
        if slot.shutdown {
            return;
        }
        match slot.deadline {
            None => {
                slot = match cvar.wait(slot) {
                    Ok(s) => s,
                    Err(_) => return,
                };
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    slot.deadline = None;
                    if tx.send(event.clone()).is_err() {
                        return;
                    }
                    continue;
                }
                slot = match cvar.wait_timeout(slot, deadline - now) {
                    Ok((s, _)) => s,
                    Err(_) => return,
                };
            }
        }
    }
}
