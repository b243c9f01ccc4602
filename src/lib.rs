//! # ISL28022 Driver
//!
//! This is a driver for the Renesas (Intersil) ISL28022 digital power
//! monitor.
//!
//! Specifically, this driver is for setting and reading the registers in the
//! ISL28022 over I²C. It does not handle the threshold comparators or the
//! interrupt output, other than letting you read those registers raw.
//!
//! The ISL28022 measures:
//!
//! * Bus voltage, at 12, 13 or 14 bits depending on the bus range
//! * Shunt voltage, at 12 to 15 bits depending on the PGA gain
//! * Current, derived from shunt voltage and the Calibration Register
//! * Power, derived from current and bus voltage
//!
//! The [`Isl28022`] object works out the Configuration Register and the
//! Calibration Register once, from a [`DeviceParameters`], and keeps them so
//! it knows how to scale each reading. The chip is set up once and then left
//! alone. There is no support for triggered conversions.
//!
//! All values are in volts, ohms, amps, watts and seconds.
//!
//! # Example
//!
//! You might setup the power monitor like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, address: SevenBitAddress, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.copy_from_slice(&[0x3E, 0x80]);
//! #         Ok(())
//! #     }
//! # }
//! # fn main() -> Result<(), isl28022::DriverError<()>> {
//! # let mut i2c = I2c;
//! let params = isl28022::DeviceParameters::default()
//!     .with_full_scale_bus_voltage(isl28022::FullScaleBusVoltage::V32)
//!     .with_shunt_range(isl28022::ShuntRange::Mv80)
//!     .with_bus_averaging(isl28022::Averaging::X8);
//! let mut monitor = isl28022::Isl28022::new(isl28022::BusAddress::DEFAULT, &params)?;
//! if let Err(e) = monitor.init(&mut i2c) {
//!     // Power monitor didn't respond
//! }
//! // Wait monitor.initialization_delay() before the first reading
//! let bus = monitor.bus_voltage(&mut i2c)?;
//! if bus.overflow {
//!     // Current or power readings are not valid
//! }
//! let amps = monitor.current(&mut i2c)?;
//! # Ok(())
//! # }
//! ```

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod config;

pub use codec::{BusVoltage, CalibrationConstants};
pub use config::{
    Averaging, Axis, ConfigurationWord, DeviceParameters, FullScaleBusVoltage, OperatingMode,
    ShuntRange,
};

use core::time::Duration;

//
// Public Types
//

/// The ISL28022 has sixteen I²C addresses, from 0x40 to 0x4F, depending on
/// how the A0 and A1 pins are strapped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusAddress(u8);

/// The registers in the ISL28022 (datasheet Table 2)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Configuration
    Configuration = 0x00,
    /// Shunt voltage reading
    ShuntVoltage = 0x01,
    /// Bus voltage reading, plus the overflow flag
    BusVoltage = 0x02,
    /// Power reading
    Power = 0x03,
    /// Current reading
    Current = 0x04,
    /// Calibration
    Calibration = 0x05,
    /// Shunt voltage threshold
    ShuntVoltageThreshold = 0x06,
    /// Bus voltage threshold
    BusVoltageThreshold = 0x07,
    /// DCS interrupt status
    DcsInterruptStatus = 0x08,
    /// Auxiliary control
    AuxControl = 0x09,
}

/// Identifies which parameter was rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parameter {
    /// The bus full-scale voltage wasn't 16, 32 or 60 V
    FullScaleBusVoltage,
    /// The shunt full-scale voltage wasn't 40, 80, 160 or 320 mV
    ShuntRange,
    /// The shunt resistance wasn't a positive, finite number
    ShuntResistance,
    /// The averaging count wasn't 0, 1, 2, 4, 8, 16, 32, 64 or 128
    Averaging,
    /// The operating mode had bits set above bit 2
    Mode,
    /// The I²C address was outside 0x40 to 0x4F
    BusAddress,
}

/// The things that can go wrong inside this driver, without involving the
/// bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A parameter was outside its legal set.
    InvalidParameter(Parameter),
    /// A resolution code or bit width that the configuration should never
    /// produce. Carries the offending value.
    UnreachableResolutionCode(u8),
    /// A register read came back with this many bytes, rather than two.
    MalformedBuffer(usize),
}

/// The things that can go wrong when talking to the ISL28022.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// The I²C bus reported an error
    Bus(E),
    /// The driver rejected the data
    Device(Error),
}

/// Represents our ISL28022 chip.
#[derive(Debug, Clone)]
pub struct Isl28022 {
    bus_address: u8,
    configuration: ConfigurationWord,
    calibration: CalibrationConstants,
}

//
// impls on Public Types
//

impl BusAddress {
    /// The address with A0 and A1 both tied to ground.
    pub const DEFAULT: BusAddress = BusAddress(0x40);

    /// Check an I²C address is one the ISL28022 can be strapped to.
    pub fn new(address: u8) -> Result<BusAddress, Error> {
        match address {
            0x40..=0x4F => Ok(BusAddress(address)),
            _ => Err(Error::InvalidParameter(Parameter::BusAddress)),
        }
    }
}

impl Default for BusAddress {
    fn default() -> BusAddress {
        BusAddress::DEFAULT
    }
}

impl From<BusAddress> for u8 {
    fn from(addr: BusAddress) -> u8 {
        addr.0
    }
}

impl From<Register> for u8 {
    fn from(register: Register) -> u8 {
        register as u8
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidParameter(p) => write!(f, "invalid parameter: {:?}", p),
            Error::UnreachableResolutionCode(code) => {
                write!(f, "unreachable resolution code {}", code)
            }
            Error::MalformedBuffer(len) => {
                write!(f, "register read returned {} bytes, expected 2", len)
            }
        }
    }
}

impl<E> From<Error> for DriverError<E> {
    fn from(e: Error) -> DriverError<E> {
        DriverError::Device(e)
    }
}

impl Isl28022 {
    /// Create a new ISL28022 proxy object.
    ///
    /// This works out the Configuration and Calibration Register values but
    /// does not touch the bus. Call [`Isl28022::init`] to program the chip.
    pub fn new(bus_address: BusAddress, params: &DeviceParameters) -> Result<Isl28022, Error> {
        let configuration = ConfigurationWord::synthesize(params);
        let calibration = codec::derive_calibration(
            params.shunt_range().full_scale_volts(),
            params.shunt_resistance_ohms(),
            configuration.resolution(Axis::Shunt)?,
        )?;
        Ok(Isl28022 {
            bus_address: bus_address.into(),
            configuration,
            calibration,
        })
    }

    /// Reset the ISL28022, then program the Configuration and Calibration
    /// Registers, over I²C.
    pub fn init<B>(&mut self, bus: &mut B) -> Result<(), B::Error>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        self.write_register(bus, Register::Configuration, ConfigurationWord::RESET.bits())?;
        self.write_register(bus, Register::Configuration, self.configuration.bits())?;
        self.write_register(bus, Register::Calibration, self.calibration.register_value)?;
        Ok(())
    }

    /// Read the shunt voltage, in volts.
    pub fn shunt_voltage<B>(&self, bus: &mut B) -> Result<f64, DriverError<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let raw = self.read_register(bus, Register::ShuntVoltage)?;
        let bits = self.configuration.resolution(Axis::Shunt)?;
        Ok(codec::shunt_voltage(raw, bits)?)
    }

    /// Read the bus voltage, in volts, along with the overflow flag.
    pub fn bus_voltage<B>(&self, bus: &mut B) -> Result<BusVoltage, DriverError<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let raw = self.read_register(bus, Register::BusVoltage)?;
        let bits = self.configuration.resolution(Axis::Bus)?;
        let reading = codec::bus_voltage(raw, bits)?;
        if reading.overflow {
            #[cfg(feature = "defmt")]
            defmt::warn!("ISL28022 0x{:02x} bus voltage overflow", self.bus_address);
        }
        Ok(reading)
    }

    /// Read the current, in amps.
    pub fn current<B>(&self, bus: &mut B) -> Result<f64, DriverError<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let raw = self.read_register(bus, Register::Current)?;
        Ok(self.calibration.current(raw))
    }

    /// Read the power, in watts.
    pub fn power<B>(&self, bus: &mut B) -> Result<f64, DriverError<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let raw = self.read_register(bus, Register::Power)?;
        Ok(self.calibration.power(raw))
    }

    /// Read any register, without interpretation.
    ///
    /// Useful for the threshold, interrupt status and auxiliary control
    /// registers, which this driver doesn't otherwise manage.
    pub fn read_register<B>(
        &self,
        bus: &mut B,
        register: Register,
    ) -> Result<u16, DriverError<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let mut buffer = [0u8; 2];
        bus.write_read(self.bus_address, &[register.into()], &mut buffer)
            .map_err(DriverError::Bus)?;
        Ok(codec::combine_read(&buffer)?)
    }

    /// The I²C address this object talks to.
    pub fn address(&self) -> u8 {
        self.bus_address
    }

    /// The value programmed into the Configuration Register.
    pub fn configuration(&self) -> ConfigurationWord {
        self.configuration
    }

    /// The calibration constants, including the Calibration Register value.
    pub fn calibration(&self) -> &CalibrationConstants {
        &self.calibration
    }

    /// How long one shunt voltage conversion takes.
    pub fn shunt_conversion_delay(&self) -> Duration {
        self.configuration.conversion_delay(Axis::Shunt)
    }

    /// How long one bus voltage conversion takes.
    pub fn bus_conversion_delay(&self) -> Duration {
        self.configuration.conversion_delay(Axis::Bus)
    }

    /// How long to wait after [`Isl28022::init`] before the first reading.
    pub fn initialization_delay(&self) -> Result<Duration, Error> {
        self.configuration.initialization_delay()
    }

    /// Write one 16-bit register.
    fn write_register<B>(&self, bus: &mut B, register: Register, value: u16) -> Result<(), B::Error>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        let buffer = codec::frame_write(register.into(), value);
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Setting ISL28022 0x{:02x} register 0x{:02x} to 0x{:04x}",
            self.bus_address,
            buffer[0],
            value
        );
        bus.write(self.bus_address, &buffer)
    }
}

//
// Tests
//


//
// End of file
//
