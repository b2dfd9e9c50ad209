use std::sync::mpsc;

use clap::Parser;
use embedded_onewire::{OneWireSearchKind, RomAddressing, RomId, SearchCursor};
use onewire_log::{LogMessage, LogReceiver, LogSender};
use onewire_sim::Sim;

/// Enumerate simulated 1-Wire slaves and relay a log message to each of them
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of slaves on the bus
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..))]
    slaves: u8,
    /// Message sent to every slave
    #[arg(short, long, default_value = "hello")]
    message: String,
    /// Family code of the slaves (e.g. 0x4c)
    #[arg(short, long, default_value = "0x4c", value_parser = parse_byte)]
    family: u8,
}

fn parse_byte(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();

    let mut sim = Sim::new();
    let (tx, rx) = mpsc::channel();
    for i in 0..args.slaves {
        let rom = RomId::from_parts(args.family, [i + 1, 0, 0, 0, 0, 0]);
        let tx = tx.clone();
        sim.spawn_slave(move |line| {
            let mut slave = line.into_slave(rom);
            let mut receiver = LogReceiver::new(|msg: &LogMessage| {
                let _ = tx.send((rom, msg.clone()));
            });
            loop {
                if let Err(e) = receiver.poll(&mut slave) {
                    log::debug!("Slave {rom}: {e:?}");
                }
            }
        });
    }
    drop(tx);

    let mut bus = sim.master();
    let mut delay = sim.master_delay();
    // Enumerate devices on the 1-Wire bus
    let mut roms = Vec::new();
    let (mut cursor, mut found) =
        SearchCursor::first(&mut bus, OneWireSearchKind::Normal).expect("Search failed");
    while let Some(rom) = found {
        roms.push(rom);
        found = cursor.next(&mut bus).expect("Search failed");
    }
    log::info!("Found {} devices", roms.len());

    for rom in &roms {
        let sender = LogSender::new().with_addressing(RomAddressing::MatchRom(*rom));
        match sender.send(&mut bus, &mut delay, args.message.as_bytes()) {
            Ok(()) => log::info!("ROM: {rom}, message delivered"),
            Err(e) => log::warn!("ROM: {rom}, delivery failed: {e:?}"),
        }
    }
    log::info!("Bus time: {} us, {} pulses", sim.now_us(), sim.pulse_count());
    sim.shutdown();

    for (rom, msg) in rx {
        println!("{rom}: {}", String::from_utf8_lossy(msg.payload()));
    }
}
