//! # onewire-sim
//! A virtual-time 1-Wire bus.
//!
//! The simulator runs the real bit-banged master ([`onewire_gpio::GpioOneWire`])
//! and real slaves ([`onewire_slave::OneWireSlave`]) against each other on one
//! wired-AND line. Time is virtual: delays cost nothing on the host, and a run
//! gives the same result every time.
//!
//! The thread creating the [`Sim`] is the master. Each slave runs its own
//! closure on a separate thread:
//!
//! ```ignore
//! let mut sim = Sim::new();
//! sim.spawn_slave(|line| {
//!     let mut slave = line.into_slave(rom);
//!     let cmd = slave.wait_for_function_command();
//! });
//! let mut bus = sim.master();
//! bus.transaction(RomAddressing::SkipRom, 0x44)?;
//! sim.shutdown();
//! ```
//!
//! The simulation ends once the master has shut it down and no slave can make
//! progress; slaves still blocked on the line are unwound quietly.

mod bus;
mod hal;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use embedded_onewire::RomId;
use onewire_gpio::GpioOneWire;
use onewire_slave::OneWireSlave;

pub use bus::{Id, MASTER};
pub use hal::{SimDelay, SimPin, SimPulses};

use bus::{Shared, Shutdown};

/// Slave built on the simulated line.
pub type SimSlave = OneWireSlave<SimPin, SimPulses, SimDelay>;
/// Master built on the simulated line.
pub type SimMaster = GpioOneWire<SimPin, SimDelay>;

/// Everything a slave needs to attach to the simulated line.
#[derive(Debug)]
pub struct SlaveLine {
    /// Line driver.
    pub pin: SimPin,
    /// Edge capture.
    pub pulses: SimPulses,
    /// Delay.
    pub delay: SimDelay,
}

impl SlaveLine {
    /// Participant index of this slave.
    pub fn id(&self) -> Id {
        self.pin.id
    }

    /// Builds a slave answering to `rom`.
    pub fn into_slave(self, rom: RomId) -> SimSlave {
        match OneWireSlave::new(self.pin, self.pulses, self.delay, rom) {
            Ok(slave) => slave,
            Err(e) => match e {},
        }
    }
}

/// A simulated bus with one master and any number of slaves.
#[derive(Debug)]
pub struct Sim {
    shared: Arc<Shared>,
    slaves: Vec<JoinHandle<()>>,
    finished: bool,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    /// An empty bus. The calling thread is the master.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            slaves: Vec::new(),
            finished: false,
        }
    }

    /// The master's line driver.
    pub fn master_pin(&self) -> SimPin {
        SimPin {
            shared: self.shared.clone(),
            id: MASTER,
        }
    }

    /// The master's delay.
    pub fn master_delay(&self) -> SimDelay {
        SimDelay {
            shared: self.shared.clone(),
            id: MASTER,
        }
    }

    /// A bit-banged master on the line.
    pub fn master(&self) -> SimMaster {
        match GpioOneWire::new(self.master_pin(), self.master_delay()) {
            Ok(bus) => bus,
            Err(e) => match e {},
        }
    }

    /// Attaches a slave running `f`. It starts as soon as the master first
    /// waits.
    pub fn spawn_slave<F>(&mut self, f: F) -> Id
    where
        F: FnOnce(SlaveLine) + Send + 'static,
    {
        let id = self.shared.add_slave();
        let line = SlaveLine {
            pin: SimPin {
                shared: self.shared.clone(),
                id,
            },
            pulses: SimPulses {
                shared: self.shared.clone(),
                id,
            },
            delay: SimDelay {
                shared: self.shared.clone(),
                id,
            },
        };
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(format!("onewire-slave-{id}"))
            .spawn(move || {
                let res = panic::catch_unwind(AssertUnwindSafe(|| {
                    shared.wait_turn(id);
                    f(line)
                }));
                shared.finish(id);
                if let Err(payload) = res {
                    if !payload.is::<Shutdown>() {
                        panic::resume_unwind(payload);
                    }
                }
            });
        match handle {
            Ok(handle) => self.slaves.push(handle),
            Err(e) => panic!("cannot start slave thread: {e}"),
        }
        id
    }

    /// Virtual time in µs.
    pub fn now_us(&self) -> u64 {
        self.shared.now()
    }

    /// Low pulses seen on the line so far.
    pub fn pulse_count(&self) -> u64 {
        self.shared.pulses()
    }

    /// Retires the master, lets the slaves run until they block for good and
    /// joins them. A slave panic is re-raised here.
    pub fn shutdown(mut self) {
        if let Some(payload) = self.finish() {
            panic::resume_unwind(payload);
        }
    }

    fn finish(&mut self) -> Option<Box<dyn Any + Send>> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.shared.finish(MASTER);
        let mut failure = None;
        for handle in self.slaves.drain(..) {
            if let Err(payload) = handle.join() {
                failure.get_or_insert(payload);
            }
        }
        log::debug!("Simulation finished at {} us", self.shared.now());
        failure
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        if let Some(payload) = self.finish() {
            if !thread::panicking() {
                panic::resume_unwind(payload);
            }
        }
    }
}
