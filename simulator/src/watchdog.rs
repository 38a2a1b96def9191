//! # Phase Watchdog
//!
//! A background thread that fires if a phase is not disarmed within its
//! budget. Arming again replaces the previous deadline. The run has no
//! recovery path for a stuck phase, so the binary's expiry action ends the
//! process.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Called once per expired deadline, with the phase label.
pub type ExpiryAction = Box<dyn Fn(&'static str) + Send + 'static>;

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: Instant,
    label: &'static str,
}

#[derive(Debug, Default)]
struct State {
    armed: Option<Armed>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    signal: Condvar,
}

pub struct Watchdog {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start the watchdog thread. Nothing is armed yet.
    pub fn spawn(on_expire: ExpiryAction) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            signal: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("watchdog".into())
            .spawn(move || watch(&worker, on_expire))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Expect a `disarm` within `budget`.
    pub fn arm(&self, budget: Duration, label: &'static str) {
        let mut state = self.shared.state.lock();
        state.armed = Some(Armed {
            deadline: Instant::now() + budget,
            label,
        });
        self.shared.signal.notify_one();
    }

    pub fn disarm(&self) {
        let mut state = self.shared.state.lock();
        state.armed = None;
        self.shared.signal.notify_one();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.signal.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn watch(shared: &Shared, on_expire: ExpiryAction) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        match state.armed {
            None => shared.signal.wait(&mut state),
            Some(armed) if Instant::now() >= armed.deadline => {
                state.armed = None;
                on_expire(armed.label);
            }
            Some(armed) => {
                shared.signal.wait_until(&mut state, armed.deadline);
            }
        }
    }
}
