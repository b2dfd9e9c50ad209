//! Virtual-time scheduler and wired-AND line shared by all participants.
//!
//! Every participant (the master and each slave) runs on its own thread, but
//! only the one holding the token executes; the others are parked. A
//! participant gives the token up when it sleeps or waits for a pulse. The
//! token then goes to the lowest-numbered participant that can run, and when
//! nobody can, virtual time jumps to the earliest wake-up. Runs are therefore
//! deterministic and independent of host timing.

use std::{
    panic,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

/// Participant index. The master is always 0.
pub type Id = usize;

/// Index of the master.
pub const MASTER: Id = 0;

/// Unwind payload used to stop participants still blocked when the
/// simulation ends.
pub(crate) struct Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ready,
    Sleeping(u64),
    WaitingPulse,
    Finished,
}

/// The pulse-capture view of one slave: last low pulse and whether it is
/// still unconsumed.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Mailbox {
    pub new: bool,
    pub length_us: u16,
    pub overrun: bool,
}

#[derive(Debug)]
struct Node {
    status: Status,
    low: bool,
    listens: bool,
    mailbox: Mailbox,
}

#[derive(Debug)]
struct State {
    now: u64,
    token: Option<Id>,
    nodes: Vec<Node>,
    fell_at: u64,
    pulses: u64,
    shutdown: bool,
}

impl State {
    fn line_low(&self) -> bool {
        self.nodes.iter().any(|n| n.low)
    }

    /// Hands the token to the next runnable participant, advancing time if
    /// needed. Ends the simulation when nobody can ever run again.
    fn schedule(&mut self) {
        loop {
            let now = self.now;
            for n in &mut self.nodes {
                if matches!(n.status, Status::Sleeping(t) if t <= now) {
                    n.status = Status::Ready;
                }
            }
            if let Some(id) = self.nodes.iter().position(|n| n.status == Status::Ready) {
                self.token = Some(id);
                return;
            }
            let wake = self
                .nodes
                .iter()
                .filter_map(|n| match n.status {
                    Status::Sleeping(t) => Some(t),
                    _ => None,
                })
                .min();
            match wake {
                Some(t) => self.now = t,
                None => {
                    log::trace!("[{:>8} us] bus idle, simulation over", self.now);
                    self.token = None;
                    self.shutdown = true;
                    return;
                }
            }
        }
    }

    fn drive(&mut self, id: Id, low: bool) {
        let was_low = self.line_low();
        self.nodes[id].low = low;
        match (was_low, self.line_low()) {
            (false, true) => self.fell_at = self.now,
            (true, false) => {
                let length_us = u16::try_from(self.now - self.fell_at).unwrap_or(u16::MAX);
                log::trace!("[{:>8} us] low pulse of {length_us} us", self.now);
                self.pulses += 1;
                for n in self.nodes.iter_mut().filter(|n| n.listens) {
                    n.mailbox = Mailbox {
                        new: true,
                        length_us,
                        overrun: n.mailbox.overrun || n.mailbox.new,
                    };
                    if n.status == Status::WaitingPulse {
                        n.status = Status::Ready;
                    }
                }
            }
            _ => {}
        }
    }
}

/// State shared by every handle of one simulation.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<State>,
    turn: Condvar,
}

impl Shared {
    /// A bus with only the master, which holds the token.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                now: 0,
                token: Some(MASTER),
                nodes: vec![Node {
                    status: Status::Ready,
                    low: false,
                    listens: false,
                    mailbox: Mailbox::default(),
                }],
                fell_at: 0,
                pulses: 0,
                shutdown: false,
            }),
            turn: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parks the caller until it holds the token again. Unwinds with
    /// [`Shutdown`] if the simulation ends first.
    fn block<'a>(&'a self, mut st: MutexGuard<'a, State>, id: Id) -> MutexGuard<'a, State> {
        if st.token == Some(id) && st.nodes[id].status != Status::Ready {
            st.schedule();
            self.turn.notify_all();
        }
        loop {
            if st.token == Some(id) {
                return st;
            }
            if st.shutdown {
                drop(st);
                panic::resume_unwind(Box::new(Shutdown));
            }
            st = self.turn.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Registers a slave. It runs once the current token holder blocks.
    pub fn add_slave(&self) -> Id {
        let mut st = self.lock();
        st.nodes.push(Node {
            status: Status::Ready,
            low: false,
            listens: true,
            mailbox: Mailbox::default(),
        });
        st.nodes.len() - 1
    }

    /// Blocks a freshly started participant thread until its first turn.
    pub fn wait_turn(&self, id: Id) {
        let st = self.lock();
        drop(self.block(st, id));
    }

    pub fn now(&self) -> u64 {
        self.lock().now
    }

    pub fn pulses(&self) -> u64 {
        self.lock().pulses
    }

    pub fn line_high(&self) -> bool {
        !self.lock().line_low()
    }

    pub fn drive(&self, id: Id, low: bool) {
        self.lock().drive(id, low);
    }

    pub fn sleep(&self, id: Id, us: u64) {
        let mut st = self.lock();
        let wake = st.now + us;
        st.nodes[id].status = Status::Sleeping(wake);
        drop(self.block(st, id));
    }

    /// Takes the pending pulse, waiting for one if there is none.
    pub fn wait_pulse(&self, id: Id) -> Mailbox {
        let mut st = self.lock();
        if !st.nodes[id].mailbox.new {
            st.nodes[id].status = Status::WaitingPulse;
            st = self.block(st, id);
        }
        std::mem::take(&mut st.nodes[id].mailbox)
    }

    pub fn discard(&self, id: Id) {
        self.lock().nodes[id].mailbox = Mailbox::default();
    }

    /// Retires a participant for good and releases the line it held.
    pub fn finish(&self, id: Id) {
        let mut st = self.lock();
        st.drive(id, false);
        st.nodes[id].status = Status::Finished;
        if st.token == Some(id) {
            st.schedule();
        }
        self.turn.notify_all();
    }
}
