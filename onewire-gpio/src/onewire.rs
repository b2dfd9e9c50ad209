use crate::{GpioOneWire, ResetStatus, timing::*};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use embedded_onewire::{OneWire, OneWireResult};

impl<P: InputPin + OutputPin, D: DelayNs> OneWire for GpioOneWire<P, D> {
    type Status = ResetStatus;

    type BusError = P::Error;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        self.wait_for_high(IDLE_TIMEOUT_US)?;
        self.drive_low()?;
        self.delay.delay_us(RESET_LOW_US);
        self.release()?;
        self.delay.delay_us(PRESENCE_SAMPLE_US);
        let presence = !self.sample()?; // presence pulse = line held low by a slave
        self.delay.delay_us(RESET_RECOVERY_US);
        let high = self.sample()?;
        log::trace!("1-Wire reset: presence {presence}, line high {high}");
        Ok(ResetStatus::new()
            .with_presence_pulse_detect(presence)
            .with_short_detect(!high)
            .with_logic_level(high))
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        self.drive_low()?;
        if bit {
            self.delay.delay_us(WRITE_ONE_LOW_US);
            self.release()?;
            self.delay.delay_us(WRITE_ONE_HIGH_US);
        } else {
            self.delay.delay_us(WRITE_ZERO_LOW_US);
            self.release()?;
            self.delay.delay_us(WRITE_ZERO_HIGH_US);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.drive_low()?;
        self.delay.delay_us(READ_LOW_US);
        self.release()?; // a slave sending 0 holds the line from here
        self.delay.delay_us(READ_SAMPLE_US);
        let bit = self.sample()?;
        self.delay.delay_us(READ_RECOVERY_US);
        Ok(bit)
    }

    fn sample_line(&mut self) -> OneWireResult<bool, Self::BusError> {
        Ok(self.sample()?)
    }
}
