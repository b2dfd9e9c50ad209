use std::sync::mpsc::{self, Sender};

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use embedded_onewire::{
    OneWire, OneWireError, OneWireResult, OneWireSearchKind, OneWireStatus, RomAddressing, RomId,
    SearchCursor,
};
use onewire_log::{
    LOG_FUNCTION_CMD, LogError, LogFrame, LogMessage, LogReceiver, LogSender, MAX_MESSAGE_LENGTH,
};
use onewire_sim::{Sim, SimDelay, SimPin};
use onewire_slave::OneWireSlave;
use rand::Rng;

fn rom(family: u8, first: u8) -> RomId {
    RomId::from_parts(family, [first, 0, 0, 0, 0, 0])
}

/// A slave that answers ROM commands and ignores function commands.
fn plain_slave(sim: &mut Sim, rom: RomId, alarmed: bool) {
    sim.spawn_slave(move |line| {
        let mut slave = line.into_slave(rom);
        slave.set_alarmed(alarmed);
        loop {
            let _ = slave.wait_for_function_command();
        }
    });
}

/// A slave relaying log messages (with their NUL) to `tx`.
fn logging_slave(sim: &mut Sim, rom: RomId, tx: Sender<(RomId, Vec<u8>)>) {
    sim.spawn_slave(move |line| {
        let mut slave = line.into_slave(rom);
        let mut receiver = LogReceiver::new(|msg: &LogMessage| {
            let _ = tx.send((rom, msg.as_bytes_with_nul().to_vec()));
        });
        loop {
            let _ = receiver.poll(&mut slave);
        }
    });
}

fn enumerate<B: OneWire>(bus: &mut B, kind: OneWireSearchKind) -> Vec<RomId>
where
    B::BusError: std::fmt::Debug,
{
    let mut roms = Vec::new();
    let (mut cursor, mut found) = SearchCursor::first(bus, kind).unwrap();
    while let Some(rom) = found {
        roms.push(rom);
        found = cursor.next(bus).unwrap();
    }
    assert!(cursor.is_exhausted());
    roms
}

/// Inverts one written bit, counted from the start of the next transaction.
struct FlipBit<B> {
    inner: B,
    countdown: Option<usize>,
}

impl<B: OneWire> OneWire for FlipBit<B> {
    type Status = B::Status;
    type BusError = B::BusError;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        self.inner.reset()
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        let flip = self.countdown == Some(0);
        self.countdown = self.countdown.and_then(|n| n.checked_sub(1));
        self.inner.write_bit(bit ^ flip)
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.inner.read_bit()
    }

    fn sample_line(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.inner.sample_line()
    }
}

#[test]
fn single_slave_search() {
    let id = RomId::from_parts(0x42, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    let mut sim = Sim::new();
    plain_slave(&mut sim, id, false);
    let mut bus = sim.master();

    let (mut cursor, first) = SearchCursor::first(&mut bus, OneWireSearchKind::Normal).unwrap();
    assert_eq!(first, Some(id));
    assert_eq!(cursor.next(&mut bus).unwrap(), None);
    assert!(cursor.verify(&mut bus, id).unwrap());
    assert!(!cursor.verify(&mut bus, rom(0x42, 1)).unwrap());
    assert_eq!(bus.read_rom().unwrap(), id);
    sim.shutdown();
}

#[test]
fn two_slave_search_order() {
    let a = rom(0x28, 0x01);
    let b = rom(0x28, 0x02);
    let mut sim = Sim::new();
    plain_slave(&mut sim, a, false);
    plain_slave(&mut sim, b, false);
    let mut bus = sim.master();

    // zero branch first: the IDs first differ at bit 8, where `b` has the 0
    assert_eq!(enumerate(&mut bus, OneWireSearchKind::Normal), [b, a]);
    // and again, same order
    assert_eq!(enumerate(&mut bus, OneWireSearchKind::Normal), [b, a]);
    // colliding READ_ROM answers fail the CRC
    assert!(matches!(bus.read_rom(), Err(OneWireError::InvalidRomCrc)));
    sim.shutdown();
}

#[test]
fn search_many_slaves() {
    let mut rng = rand::rng();
    let mut ids: Vec<RomId> = (0..6)
        .map(|_| RomId::from_parts(rng.random_range(0x10..0x14), rng.random()))
        .collect();
    ids.sort_by_key(|r| r.into_bits());
    ids.dedup();
    let mut sim = Sim::new();
    for &id in &ids {
        plain_slave(&mut sim, id, false);
    }
    let mut bus = sim.master();
    let mut found = enumerate(&mut bus, OneWireSearchKind::Normal);
    found.sort_by_key(|r| r.into_bits());
    assert_eq!(found, ids);
    sim.shutdown();
}

#[test]
fn family_targeting() {
    let mut sim = Sim::new();
    for id in [rom(0x10, 1), rom(0x28, 1), rom(0x28, 2), rom(0x42, 1)] {
        plain_slave(&mut sim, id, false);
    }
    let mut bus = sim.master();

    let mut cursor = SearchCursor::new(OneWireSearchKind::Normal);
    cursor.target_family(0x28);
    let found = cursor.next(&mut bus).unwrap().unwrap();
    assert_eq!(found.family(), 0x28);

    cursor.skip_family();
    let next = cursor.next(&mut bus).unwrap().unwrap();
    assert_eq!(next, rom(0x42, 1));
    sim.shutdown();
}

#[test]
fn alarm_search_finds_only_alarmed() {
    let quiet = rom(0x28, 0x01);
    let alarmed = rom(0x28, 0x02);
    let mut sim = Sim::new();
    plain_slave(&mut sim, quiet, false);
    plain_slave(&mut sim, alarmed, true);
    let mut bus = sim.master();
    assert_eq!(enumerate(&mut bus, OneWireSearchKind::Alarmed), [alarmed]);
    assert_eq!(enumerate(&mut bus, OneWireSearchKind::Normal).len(), 2);
    sim.shutdown();
}

#[test]
fn empty_bus() {
    let sim = Sim::new();
    let mut bus = sim.master();
    assert!(!bus.reset().unwrap().presence());
    assert!(matches!(
        SearchCursor::first(&mut bus, OneWireSearchKind::Normal),
        Err(OneWireError::NoDevicePresent)
    ));
    sim.shutdown();
}

#[test]
fn log_hello() {
    let (tx, rx) = mpsc::channel();
    let id = rom(0x4c, 1);
    let mut sim = Sim::new();
    logging_slave(&mut sim, id, tx);
    let mut bus = sim.master();
    let mut delay = sim.master_delay();

    LogSender::new().send(&mut bus, &mut delay, b"hello").unwrap();
    sim.shutdown();
    let got: Vec<_> = rx.iter().collect();
    assert_eq!(got, [(id, b"hello\0".to_vec())]);
}

#[test]
fn log_bit_flip_is_not_acknowledged() {
    let (tx, rx) = mpsc::channel();
    let id = rom(0x4c, 1);
    let mut sim = Sim::new();
    logging_slave(&mut sim, id, tx);
    let mut delay = sim.master_delay();
    // READ_ROM, function command and length are written before the payload
    let mut bus = FlipBit {
        inner: sim.master(),
        countdown: Some(3 * 8 + 3),
    };

    let res = LogSender::new().send(&mut bus, &mut delay, b"hello");
    assert!(matches!(res, Err(LogError::NoAck(0xff))));
    // a retry goes through
    LogSender::new().send(&mut bus, &mut delay, b"hello").unwrap();
    sim.shutdown();
    let got: Vec<_> = rx.iter().map(|(_, msg)| msg).collect();
    assert_eq!(got, [b"hello\0".to_vec()]);
}

#[test]
fn reset_during_log_payload() {
    let (tx, rx) = mpsc::channel();
    let id = rom(0x4c, 1);
    let mut sim = Sim::new();
    logging_slave(&mut sim, id, tx);
    let mut bus = sim.master();
    let mut delay = sim.master_delay();

    assert_eq!(
        bus.transaction(RomAddressing::ReadRom, LOG_FUNCTION_CMD).unwrap(),
        Some(id)
    );
    bus.write_byte(5).unwrap();
    bus.write_bytes(b"he").unwrap();
    let status = bus.reset().unwrap();
    assert!(status.presence());

    LogSender::new().send(&mut bus, &mut delay, b"world").unwrap();
    sim.shutdown();
    let got: Vec<_> = rx.iter().map(|(_, msg)| msg).collect();
    assert_eq!(got, [b"world\0".to_vec()]);
}

/// A slave pin that spends `latency_us` of CPU time before every edge it drives.
struct SlowPin {
    pin: SimPin,
    delay: SimDelay,
    latency_us: u32,
}

impl embedded_hal::digital::ErrorType for SlowPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SlowPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.delay.delay_us(self.latency_us);
        self.pin.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high()
    }
}

#[test]
fn log_busy_hold_starts_within_last_slot() {
    // the last CRC bit is a 0, leaving the slave the 10 us write-0 recovery
    // to take the line busy before the master polls it
    let payload = [b'y'; MAX_MESSAGE_LENGTH];
    let frame = LogFrame::new(&payload).unwrap();
    assert_eq!(frame.crc_bytes()[1] & 0x80, 0);

    let (tx, rx) = mpsc::channel();
    let id = rom(0x4c, 1);
    let mut sim = Sim::new();
    sim.spawn_slave(move |line| {
        let pin = SlowPin {
            pin: line.pin,
            delay: line.delay.clone(),
            latency_us: 8,
        };
        let mut slave = match OneWireSlave::new(pin, line.pulses, line.delay, id) {
            Ok(slave) => slave,
            Err(e) => match e {},
        };
        let mut receiver = LogReceiver::new(|msg: &LogMessage| {
            let _ = tx.send(msg.payload().to_vec());
        });
        loop {
            let _ = receiver.poll(&mut slave);
        }
    });
    let mut bus = sim.master();
    let mut delay = sim.master_delay();

    LogSender::new()
        .with_addressing(RomAddressing::SkipRom)
        .send(&mut bus, &mut delay, &payload)
        .unwrap();
    sim.shutdown();
    let got: Vec<_> = rx.iter().collect();
    assert_eq!(got, [payload.to_vec()]);
}

#[test]
fn log_to_one_of_two() {
    let (tx, rx) = mpsc::channel();
    let a = rom(0x4c, 1);
    let b = rom(0x4c, 2);
    let mut sim = Sim::new();
    logging_slave(&mut sim, a, tx.clone());
    logging_slave(&mut sim, b, tx);
    let mut bus = sim.master();
    let mut delay = sim.master_delay();

    for (target, text) in [(b, &b"to b"[..]), (a, &b"to a"[..])] {
        LogSender::new()
            .with_addressing(RomAddressing::MatchRom(target))
            .send(&mut bus, &mut delay, text)
            .unwrap();
    }
    sim.shutdown();
    let got: Vec<_> = rx.iter().collect();
    assert_eq!(got, [(b, b"to b\0".to_vec()), (a, b"to a\0".to_vec())]);
}

#[test]
fn log_random_payloads() {
    let (tx, rx) = mpsc::channel();
    let id = rom(0x4c, 1);
    let mut sim = Sim::new();
    logging_slave(&mut sim, id, tx);
    let mut bus = sim.master();
    let mut delay = sim.master_delay();

    let mut rng = rand::rng();
    let mut sent = Vec::new();
    for _ in 0..4 {
        let len = rng.random_range(0..=onewire_log::MAX_MESSAGE_LENGTH);
        let mut payload = vec![0u8; len];
        rng.fill(&mut payload[..]);
        LogSender::new().send(&mut bus, &mut delay, &payload).unwrap();
        payload.push(0);
        sent.push(payload);
    }
    sim.shutdown();
    let got: Vec<_> = rx.iter().map(|(_, msg)| msg).collect();
    assert_eq!(got, sent);
}

#[test]
fn skip_rom_reaches_every_slave() {
    let (tx, rx) = mpsc::channel();
    let mut sim = Sim::new();
    for id in [rom(0x28, 1), rom(0x28, 2)] {
        let tx = tx.clone();
        sim.spawn_slave(move |line| {
            let mut slave = line.into_slave(id);
            let _ = tx.send((id, slave.wait_for_function_command().ok()));
        });
    }
    drop(tx);
    let mut bus = sim.master();
    bus.transaction(RomAddressing::SkipRom, 0xbe).unwrap();
    sim.shutdown();

    let mut got: Vec<_> = rx.iter().collect();
    got.sort_by_key(|(id, _)| id.into_bits());
    assert_eq!(got, [(rom(0x28, 1), Some(0xbe)), (rom(0x28, 2), Some(0xbe))]);
}

#[test]
fn presence_pulse_swallows_overlapping_reset() {
    let id = rom(0x4c, 1);
    let mut sim = Sim::new();
    plain_slave(&mut sim, id, false);
    let mut pin = sim.master_pin();
    let mut delay = sim.master_delay();

    pin.set_low().unwrap();
    delay.delay_us(480);
    pin.set_high().unwrap();
    delay.delay_us(70);
    assert!(pin.is_low().unwrap(), "presence pulse");
    // second reset while the presence pulse is still low
    pin.set_low().unwrap();
    delay.delay_us(480);
    pin.set_high().unwrap();
    delay.delay_us(70);
    assert!(pin.is_high().unwrap(), "second reset went unanswered");
    delay.delay_us(410);

    // the slave took the long pulse for the end of its presence pulse and is
    // waiting for a ROM command; the next reset is answered normally
    let mut bus = sim.master();
    assert_eq!(bus.read_rom().unwrap(), id);
    sim.shutdown();
}

#[test]
fn virtual_time_advances() {
    let mut sim = Sim::new();
    plain_slave(&mut sim, rom(0x4c, 1), false);
    let mut bus = sim.master();
    let before = sim.now_us();
    assert!(bus.reset().unwrap().presence());
    // reset low plus recovery
    assert_eq!(sim.now_us() - before, 960);
    // the master's reset pulse and the presence pulse
    assert_eq!(sim.pulse_count(), 2);
    sim.shutdown();
}
