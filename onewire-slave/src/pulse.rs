use core::cell::Cell;
use critical_section::Mutex;

/// Pulse-width thresholds in µs of observed line-low time. Lower bounds are
/// inclusive.
pub mod threshold {
    /// Pulses shorter than this start a write-one or read slot.
    pub const ZERO_MIN_US: u16 = 15;
    /// Pulses from [`ZERO_MIN_US`] up to (excluding) this are write-zero slots.
    pub const MALFORMED_MIN_US: u16 = 70;
    /// Pulses this long or longer are resets. The slave measures the whole
    /// low time including its own presence pulse, so this sits well below
    /// the 480 µs the master drives.
    pub const RESET_MIN_US: u16 = 360;
}

/// Classification of one low pulse on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    /// Write-one slot, or the start of a read slot.
    One,
    /// Write-zero slot.
    Zero,
    /// Between a write-zero slot and a reset; never legal.
    Malformed,
    /// Reset pulse.
    Reset,
}

impl PulseKind {
    /// Classify a pulse of `us` microseconds. Total over all widths.
    pub const fn classify(us: u16) -> Self {
        if us < threshold::ZERO_MIN_US {
            Self::One
        } else if us < threshold::MALFORMED_MIN_US {
            Self::Zero
        } else if us < threshold::RESET_MIN_US {
            Self::Malformed
        } else {
            Self::Reset
        }
    }
}

/// Free-running microsecond stopwatch used by the edge interrupt.
///
/// Must tick at least twice per µs and must report an overflow whenever the
/// counter has wrapped since the last [`reset`](Stopwatch::reset).
pub trait Stopwatch {
    /// Restart counting from zero and clear the overflow flag.
    fn reset(&mut self);
    /// Ticks since the last reset.
    fn ticks(&self) -> u16;
    /// Whether the counter wrapped since the last reset.
    fn overflowed(&self) -> bool;
}

/// Where the slave gets its pulses from.
///
/// On hardware this is a [`PulseCapture`] filled by the pin-change interrupt;
/// a simulator can hand pulses over however it likes.
pub trait PulseSource {
    /// Blocks until the line has gone low and back high, and returns how
    /// long it was low in µs. Saturates at `u16::MAX`.
    fn wait_for_pulse_end(&mut self) -> u16;
    /// Drops a pulse that has been captured but not consumed yet.
    fn discard_pending(&mut self);
}

/// Last pulse captured by the edge interrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseEvent {
    /// Set by the rising edge, cleared when the main loop consumes the event.
    pub new: bool,
    /// Length of the last low pulse in stopwatch ticks.
    pub length_ticks: u16,
    /// A rising edge arrived while the previous event was still unconsumed
    /// and overwrote it.
    pub overrun: bool,
}

/// Pulse event shared between the pin-change interrupt and the main loop.
///
/// Meant to live in a `static`:
///
/// ```ignore
/// static PULSES: PulseCapture = PulseCapture::new(2);
///
/// #[interrupt]
/// fn PCINT0() {
///     let line_high = /* read the pin */;
///     PULSES.on_edge(line_high, &mut TIMER1);
/// }
/// ```
pub struct PulseCapture {
    event: Mutex<Cell<PulseEvent>>,
    ticks_per_us: u16,
}

impl PulseCapture {
    /// Creates an empty capture for a stopwatch running at `ticks_per_us`.
    pub const fn new(ticks_per_us: u16) -> Self {
        assert!(ticks_per_us > 0);
        Self {
            event: Mutex::new(Cell::new(PulseEvent {
                new: false,
                length_ticks: 0,
                overrun: false,
            })),
            ticks_per_us,
        }
    }

    /// Edge interrupt entry point. `line_high` is the line level after the edge.
    pub fn on_edge<W: Stopwatch>(&self, line_high: bool, stopwatch: &mut W) {
        if line_high {
            self.rising_edge(stopwatch);
        } else {
            self.falling_edge(stopwatch);
        }
    }

    /// A low pulse starts: restart the stopwatch. Whoever pulled the line
    /// down, including this slave, restarts it.
    pub fn falling_edge<W: Stopwatch>(&self, stopwatch: &mut W) {
        critical_section::with(|_| stopwatch.reset());
    }

    /// A low pulse ends: publish its length.
    pub fn rising_edge<W: Stopwatch>(&self, stopwatch: &W) {
        let ticks = if stopwatch.overflowed() {
            u16::MAX
        } else {
            stopwatch.ticks()
        };
        critical_section::with(|cs| {
            let cell = self.event.borrow(cs);
            let prev = cell.get();
            cell.set(PulseEvent {
                new: true,
                length_ticks: ticks,
                overrun: prev.overrun || prev.new,
            });
        });
    }

    /// Consumes the pending event, if any.
    pub fn take(&self) -> Option<PulseEvent> {
        critical_section::with(|cs| {
            let cell = self.event.borrow(cs);
            let ev = cell.get();
            if ev.new {
                cell.set(PulseEvent::default());
                Some(ev)
            } else {
                None
            }
        })
    }

    /// Drops the pending event, if any.
    pub fn discard(&self) {
        critical_section::with(|cs| self.event.borrow(cs).set(PulseEvent::default()));
    }

    /// Converts a pulse length to µs; an overflowed stopwatch stays saturated.
    pub fn ticks_to_us(&self, ticks: u16) -> u16 {
        if ticks == u16::MAX {
            u16::MAX
        } else {
            ticks / self.ticks_per_us
        }
    }
}

impl PulseSource for &PulseCapture {
    fn wait_for_pulse_end(&mut self) -> u16 {
        loop {
            if let Some(ev) = self.take() {
                let us = self.ticks_to_us(ev.length_ticks);
                if ev.overrun && cfg!(feature = "strict") {
                    crate::trap("pulse event overrun", us);
                }
                return us;
            }
            core::hint::spin_loop();
        }
    }

    fn discard_pending(&mut self) {
        self.discard();
    }
}
