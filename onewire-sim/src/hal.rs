use std::{convert::Infallible, sync::Arc};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};
use onewire_slave::PulseSource;

use crate::bus::{Id, Shared};

/// Open-drain connection of one participant to the simulated line.
#[derive(Debug, Clone)]
pub struct SimPin {
    pub(crate) shared: Arc<Shared>,
    pub(crate) id: Id,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.shared.drive(self.id, true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.shared.drive(self.id, false);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.shared.line_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.shared.line_high())
    }
}

/// Delay in virtual microseconds. Other participants run meanwhile.
#[derive(Debug, Clone)]
pub struct SimDelay {
    pub(crate) shared: Arc<Shared>,
    pub(crate) id: Id,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.shared.sleep(self.id, ns.div_ceil(1_000).into());
    }

    fn delay_us(&mut self, us: u32) {
        self.shared.sleep(self.id, us.into());
    }

    fn delay_ms(&mut self, ms: u32) {
        self.shared.sleep(self.id, u64::from(ms) * 1_000);
    }
}

/// A slave's view of the line edges, standing in for the pin-change
/// interrupt and its stopwatch.
#[derive(Debug)]
pub struct SimPulses {
    pub(crate) shared: Arc<Shared>,
    pub(crate) id: Id,
}

impl PulseSource for SimPulses {
    fn wait_for_pulse_end(&mut self) -> u16 {
        let pulse = self.shared.wait_pulse(self.id);
        if pulse.overrun {
            log::trace!("slave {}: pulse overrun", self.id);
        }
        pulse.length_us
    }

    fn discard_pending(&mut self) {
        self.shared.discard(self.id);
    }
}
