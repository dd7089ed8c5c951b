//! # I/O Shield Driver
//!
//! This is a driver for the 64Shield I/O board, which carries up to seven
//! Microchip MCP23017 16-bit I/O expanders on one I²C bus.
//!
//! Each MCP23017 is a *bank*. Bank `n` lives at I²C address `0x20 + n`, and
//! has sixteen pins split across two eight-bit halves, A and B. Pins are
//! numbered flat across the whole shield, so pin 0 is bank 0 `GPA0`, pin 8 is
//! bank 0 `GPB0`, pin 16 is bank 1 `GPA0`, and so on up to pin 111.
//!
//! The driver does not own the bus. You pass it in to each call, so you can
//! share the bus with other devices between calls.
//!
//! # Example
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{Read, Write};
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, _address: u8, _bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl Read for I2c {
//! #     type Error = ();
//! #     fn read(&mut self, _address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.fill(0);
//! #         Ok(())
//! #     }
//! # }
//! # let mut i2c = I2c;
//! let mut shield = ioshield::IoShield::new();
//! if let Err(e) = shield.initialize(&mut i2c) {
//!     // A chip didn't respond
//! }
//! // Bank 1, GPA3 drives an LED
//! shield.pin_mode(&mut i2c, 19, ioshield::PinMode::Output).unwrap();
//! shield.digital_write(&mut i2c, 19, true).unwrap();
//! // Bank 0, GPB0 reads a button to ground
//! shield.pin_pullup(&mut i2c, 8, true).unwrap();
//! let pressed = !shield.digital_read(&mut i2c, 8).unwrap();
//! # assert!(pressed);
//! ```

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

use embedded_hal::blocking::i2c::{Read, Write};

//
// Public Types
//

/// Whether a pin is an input or an output.
///
/// The numbering matches the usual Arduino constants. The MCP23017 direction
/// register uses the opposite sense (a `1` bit means input), so the driver
/// flips the value before it goes on the wire.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinMode {
    /// Pin is a high-impedance input
    Input = 0,
    /// Pin is a push-pull output
    Output = 1,
}

/// Selects one byte of a 16-bit register pair.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Half {
    /// The `A` register, pins `GPA0..=GPA7`
    A = 0,
    /// The `B` register, pins `GPB0..=GPB7`
    B = 1,
}

/// A flat pin number, split into the parts the chip cares about.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PinAddress {
    /// Which MCP23017 on the shield (0 to 6)
    pub bank: u8,
    /// Which register in the pair
    pub half: Half,
    /// Which bit in that register (0 to 7)
    pub bit: u8,
}

/// Things that can go wrong when talking to the shield.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The I²C bus reported an error (usually a missing chip not sending ACK)
    Bus(E),
    /// The pin number is not on a populated bank
    InvalidPin(u8),
    /// The bank number is not populated
    InvalidBank(u8),
}

/// Represents the MCP23017 chips on the I/O shield.
///
/// Holds the scratch buffer used for every register transfer. The buffer
/// contents are only meaningful inside a single call.
#[derive(Debug, Clone)]
pub struct IoShield {
    banks: u8,
    buffer: [u8; 2],
}

//
// Private Types
//

/// The register pairs in the MCP23017, with `IOCON.BANK = 0`.
///
/// The `B` register of each pair is at the `A` address plus one.
#[derive(Copy, Clone, Debug)]
enum Register {
    /// IODIR - 1 = input, 0 = output
    Direction = 0x00,
    /// IPOL - 1 = inverted input
    InputPolarity = 0x02,
    /// GPINTEN - interrupt-on-change enable
    InterruptEnable = 0x04,
    /// DEFVAL - compare value for interrupt-on-change
    DefaultValue = 0x06,
    /// INTCON - compare against DEFVAL or previous value
    InterruptControl = 0x08,
    /// IOCON - chip configuration
    Configuration = 0x0A,
    /// GPPU - 100k pull-up enable
    Pullup = 0x0C,
    /// INTF - interrupt flags (read-only)
    InterruptFlag = 0x0E,
    /// INTCAP - captured pin state (read-only)
    InterruptCapture = 0x10,
    /// GPIO - reads the pins, writes the latch
    Gpio = 0x12,
    /// OLAT - output latch
    OutputLatch = 0x14,
}

//
// Public Data
//

/// The I²C address of bank 0. Bank `n` is at `BASE_ADDRESS + n`.
pub const BASE_ADDRESS: u8 = 0b010_0000;

/// How many MCP23017s the shield can carry.
pub const MAX_BANKS: u8 = 7;

/// How many pins each MCP23017 has.
pub const PINS_PER_BANK: u8 = 16;

/// How many pins a fully populated shield has.
pub const NUM_PINS: u8 = MAX_BANKS * PINS_PER_BANK;

//
// Private Data
//

/// Everything after the direction registers, cleared by
/// [`IoShield::initialize`] in this order.
const CLEARED_ON_INIT: [Register; 10] = [
    Register::InputPolarity,
    Register::InterruptEnable,
    Register::DefaultValue,
    Register::InterruptControl,
    Register::Configuration,
    Register::Pullup,
    Register::InterruptFlag,
    Register::InterruptCapture,
    Register::Gpio,
    Register::OutputLatch,
];

//
// impls on Public Types
//

impl From<PinMode> for u8 {
    fn from(mode: PinMode) -> u8 {
        mode as u8
    }
}

impl From<Half> for u8 {
    fn from(half: Half) -> u8 {
        half as u8
    }
}

impl PinAddress {
    /// Split a flat pin number into bank, half and bit.
    ///
    /// * bank = `pin / 16`
    /// * half = bit 3 of `pin`
    /// * bit = `pin - (bank * 2 + half) * 8`
    ///
    /// Returns `None` for pins beyond a fully populated shield.
    pub const fn decode(pin: u8) -> Option<PinAddress> {
        if pin >= NUM_PINS {
            return None;
        }
        let bank = pin >> 4;
        let half = (pin & 8) >> 3;
        let bit = pin - ((bank << 1) + half) * 8;
        Some(PinAddress {
            bank,
            half: if half == 0 { Half::A } else { Half::B },
            bit,
        })
    }

    /// Turn this back into a flat pin number.
    pub const fn pin(&self) -> u8 {
        (self.bank << 4) | ((self.half as u8) << 3) | self.bit
    }

    /// The mask for this pin within its eight-bit register.
    pub const fn mask(&self) -> u8 {
        1 << self.bit
    }
}

impl IoShield {
    /// Create a driver for a fully populated shield (seven chips).
    ///
    /// Nothing is sent until you call a method with a bus.
    pub const fn new() -> IoShield {
        IoShield::with_banks(MAX_BANKS)
    }

    /// Create a driver for a shield with only the first `banks` chips fitted.
    ///
    /// The count is saturated to `1..=MAX_BANKS`.
    pub const fn with_banks(banks: u8) -> IoShield {
        let banks = if banks == 0 {
            1
        } else if banks > MAX_BANKS {
            MAX_BANKS
        } else {
            banks
        };
        IoShield {
            banks,
            buffer: [0; 2],
        }
    }

    /// How many chips this driver talks to.
    pub const fn banks(&self) -> u8 {
        self.banks
    }

    /// Put every chip into a known state.
    ///
    /// All pins become inputs, and every other register pair from `IPOL`
    /// up to `OLAT` is cleared (which also leaves `IOCON.BANK = 0`, as the
    /// register map assumes).
    ///
    /// Every write is sent even if an earlier one fails, so one missing chip
    /// does not leave the others unconfigured. The first bus error is
    /// returned once the whole sequence is done.
    pub fn initialize<B, E>(&mut self, bus: &mut B) -> Result<(), Error<E>>
    where
        B: Write<Error = E>,
    {
        let mut result = Ok(());
        for bank in 0..self.banks {
            self.buffer = [0xFF, 0xFF];
            result = result.and(self.write_registers(bus, bank, Register::Direction as u8, 2));
            self.buffer = [0x00, 0x00];
            for register in CLEARED_ON_INIT {
                result = result.and(self.write_registers(bus, bank, register as u8, 2));
            }
        }
        result
    }

    /// Make a pin an input or an output.
    pub fn pin_mode<B, E>(&mut self, bus: &mut B, pin: u8, mode: PinMode) -> Result<(), Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        let address = self.check_pin(pin)?;
        // The chip's direction bit is the inverse of the mode number
        let direction = (u8::from(mode) ^ 1) != 0;
        self.write_register_pin(
            bus,
            address.bank,
            address.bit,
            Register::Direction.offset(address.half),
            direction,
        )
    }

    /// Turn the internal pull-up on a pin on or off.
    pub fn pin_pullup<B, E>(&mut self, bus: &mut B, pin: u8, enabled: bool) -> Result<(), Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        let address = self.check_pin(pin)?;
        self.write_register_pin(
            bus,
            address.bank,
            address.bit,
            Register::Pullup.offset(address.half),
            enabled,
        )
    }

    /// Drive an output pin high (`true`) or low (`false`).
    ///
    /// The other seven pins in the same half are read back from `GPIO` and
    /// written again unchanged.
    pub fn digital_write<B, E>(&mut self, bus: &mut B, pin: u8, level: bool) -> Result<(), Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        let address = self.check_pin(pin)?;
        self.write_register_pin(
            bus,
            address.bank,
            address.bit,
            Register::Gpio.offset(address.half),
            level,
        )
    }

    /// Read the level on a pin.
    pub fn digital_read<B, E>(&mut self, bus: &mut B, pin: u8) -> Result<bool, Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        let address = self.check_pin(pin)?;
        self.read_registers(bus, address.bank, Register::Gpio.offset(address.half), 1)?;
        Ok((self.buffer[0] >> address.bit) & 1 != 0)
    }

    /// Set the direction of all sixteen pins on a bank.
    ///
    /// This is the raw `IODIR` value, so a `1` bit means input. The low
    /// byte is half A and the high byte is half B.
    pub fn port_mode<B, E>(&mut self, bus: &mut B, bank: u8, value: u16) -> Result<(), Error<E>>
    where
        B: Write<Error = E>,
    {
        self.write_port(bus, bank, Register::Direction, value)
    }

    /// Set the pull-ups of all sixteen pins on a bank.
    pub fn port_pullup<B, E>(&mut self, bus: &mut B, bank: u8, value: u16) -> Result<(), Error<E>>
    where
        B: Write<Error = E>,
    {
        self.write_port(bus, bank, Register::Pullup, value)
    }

    /// Set the output levels of all sixteen pins on a bank.
    pub fn port_write<B, E>(&mut self, bus: &mut B, bank: u8, value: u16) -> Result<(), Error<E>>
    where
        B: Write<Error = E>,
    {
        self.write_port(bus, bank, Register::Gpio, value)
    }

    /// Read the levels of all sixteen pins on a bank.
    pub fn port_read<B, E>(&mut self, bus: &mut B, bank: u8) -> Result<u16, Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        self.check_bank(bank)?;
        self.read_registers(bus, bank, Register::Gpio as u8, 2)?;
        Ok(u16::from_le_bytes(self.buffer))
    }

    /// Check a pin number is on one of our banks.
    fn check_pin<E>(&self, pin: u8) -> Result<PinAddress, Error<E>> {
        match PinAddress::decode(pin) {
            Some(address) if address.bank < self.banks => Ok(address),
            _ => Err(Error::InvalidPin(pin)),
        }
    }

    /// Check a bank number is one of ours.
    fn check_bank<E>(&self, bank: u8) -> Result<(), Error<E>> {
        if bank < self.banks {
            Ok(())
        } else {
            Err(Error::InvalidBank(bank))
        }
    }

    fn write_port<B, E>(
        &mut self,
        bus: &mut B,
        bank: u8,
        register: Register,
        value: u16,
    ) -> Result<(), Error<E>>
    where
        B: Write<Error = E>,
    {
        self.check_bank(bank)?;
        self.buffer = value.to_le_bytes();
        self.write_registers(bus, bank, register as u8, 2)
    }

    /// Send `count` bytes from the buffer, starting at register `start`.
    ///
    /// The chip auto-increments the register address after each byte.
    fn write_registers<B, E>(
        &self,
        bus: &mut B,
        bank: u8,
        start: u8,
        count: usize,
    ) -> Result<(), Error<E>>
    where
        B: Write<Error = E>,
    {
        debug_assert!(count <= self.buffer.len());
        let address = BASE_ADDRESS + bank;
        let mut frame = [start, 0, 0];
        frame[1..=count].copy_from_slice(&self.buffer[..count]);
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "MCP23017 0x{:02x} write 0x{:02x} <- {=[u8]:x}",
            address,
            start,
            &frame[1..=count]
        );
        bus.write(address, &frame[..=count]).map_err(Error::Bus)
    }

    /// Fetch `count` bytes into the buffer, starting at register `start`.
    ///
    /// The register address goes out as its own write, with a stop, before
    /// the read.
    fn read_registers<B, E>(
        &mut self,
        bus: &mut B,
        bank: u8,
        start: u8,
        count: usize,
    ) -> Result<(), Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        debug_assert!(count <= self.buffer.len());
        let address = BASE_ADDRESS + bank;
        bus.write(address, &[start]).map_err(Error::Bus)?;
        bus.read(address, &mut self.buffer[..count]).map_err(Error::Bus)?;
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "MCP23017 0x{:02x} read 0x{:02x} -> {=[u8]:x}",
            address,
            start,
            &self.buffer[..count]
        );
        Ok(())
    }

    /// Set or clear one bit in one register, leaving the rest alone.
    fn write_register_pin<B, E>(
        &mut self,
        bus: &mut B,
        bank: u8,
        bit: u8,
        register: u8,
        level: bool,
    ) -> Result<(), Error<E>>
    where
        B: Write<Error = E> + Read<Error = E>,
    {
        self.read_registers(bus, bank, register, 1)?;
        self.buffer[0] = with_bit(self.buffer[0], bit, level);
        self.write_registers(bus, bank, register, 1)
    }
}

impl Default for IoShield {
    fn default() -> IoShield {
        IoShield::new()
    }
}

//
// impls on Private Types
//

impl Register {
    /// The address of one half of this pair.
    const fn offset(self, half: Half) -> u8 {
        self as u8 + half as u8
    }
}

//
// Private Functions
//

/// Returns `byte` with bit `bit` set to `level`.
const fn with_bit(byte: u8, bit: u8, level: bool) -> u8 {
    if level {
        byte | (1 << bit)
    } else {
        byte & !(1 << bit)
    }
}

//
// Tests
//


//
// End of file
//
