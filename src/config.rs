//! # Configuration Register Synthesis
//!
//! Turns a set of physical operating parameters into the 16-bit word that
//! the ISL28022 expects in its Configuration Register (datasheet Table 3),
//! and reads resolution and timing facts back out of that word.
//!
//! The Configuration Register is laid out as:
//!
//! ```text
//!  15   14..13   12..11   10..7    6..3    2..0
//! RST   BRNG     PG       BADC     SADC    MODE
//! ```
//!
//! Everything in here is pure computation. Nothing talks to the bus.

use core::time::Duration;

use crate::{Error, Parameter};

//
// Public Types
//

/// The full-scale range of the bus voltage ADC, selected by the BRNG bits.
///
/// The range also fixes the bus ADC resolution when averaging is disabled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FullScaleBusVoltage {
    /// 16 V full scale (12-bit bus resolution)
    V16,
    /// 32 V full scale (13-bit bus resolution)
    V32,
    /// 60 V full scale (14-bit bus resolution)
    V60,
}

/// The full-scale range of the shunt voltage ADC, selected by the PGA bits.
///
/// The gain also fixes the shunt ADC resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShuntRange {
    /// ±40 mV full scale (12-bit shunt resolution)
    Mv40,
    /// ±80 mV full scale (13-bit shunt resolution)
    Mv80,
    /// ±160 mV full scale (14-bit shunt resolution)
    Mv160,
    /// ±320 mV full scale (15-bit shunt resolution)
    Mv320,
}

/// How many conversions the ADC accumulates before updating a register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Averaging {
    /// No averaging. The ADC runs at the resolution implied by the range.
    Disabled,
    /// 1 sample
    X1,
    /// 2 samples
    X2,
    /// 4 samples
    X4,
    /// 8 samples
    X8,
    /// 16 samples
    X16,
    /// 32 samples
    X32,
    /// 64 samples
    X64,
    /// 128 samples
    X128,
}

/// The operating mode, which lives in the bottom three bits of the
/// Configuration Register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Power-down
    PowerDown = 0b000,
    /// Shunt voltage, triggered
    ShuntTriggered = 0b001,
    /// Bus voltage, triggered
    BusTriggered = 0b010,
    /// Shunt and bus voltage, triggered
    ShuntAndBusTriggered = 0b011,
    /// ADC off (disabled)
    AdcOff = 0b100,
    /// Shunt voltage, continuous
    ShuntContinuous = 0b101,
    /// Bus voltage, continuous
    BusContinuous = 0b110,
    /// Shunt and bus voltage, continuous. This is the power-on default.
    ShuntAndBusContinuous = 0b111,
}

/// Selects which of the two ADC channels we're asking about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// The bus voltage ADC
    Bus,
    /// The shunt voltage ADC
    Shunt,
}

/// The physical parameters the ISL28022 is set up with.
///
/// These are fixed once the driver has been created. Each enumerated field
/// can only hold a legal value, and the shunt resistance is checked when
/// the parameters are built.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceParameters {
    full_scale_bus_voltage: FullScaleBusVoltage,
    shunt_range: ShuntRange,
    shunt_resistance_ohms: f64,
    bus_averaging: Averaging,
    shunt_averaging: Averaging,
    mode: OperatingMode,
}

/// A 16-bit value for the Configuration Register.
///
/// Built with [`ConfigurationWord::synthesize`], then kept as the record of
/// how the chip has been set up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationWord(u16);

//
// Private Data
//

/// Writing this bit resets the chip and runs a system calibration.
const RESET_BIT: u16 = 1 << 15;

const BRNG_SHIFT: u16 = 13;
const PG_SHIFT: u16 = 11;
const BADC_SHIFT: u16 = 7;
const SADC_SHIFT: u16 = 3;

const TWO_BIT_MASK: u16 = 0b11;
const ADC_FIELD_MASK: u16 = 0b1111;
const MODE_MASK: u16 = 0b111;

/// Set in an ADC field when the low three bits hold an averaging count.
const AVERAGING_ENABLE: u8 = 0b1000;

/// Conversion times from datasheet Table 8, in microseconds.
const CONVERSION_TIMES_US: [u64; 11] = [
    80, 146, 284, 559, 1_110, 2_210, 4_410, 8_810, 17_610, 35_210, 70_410,
];

/// The chip's internal oscillator, used to time the power-on calibration.
const OSCILLATOR_HZ: u64 = 500_000;

//
// impls on Public Types
//

impl FullScaleBusVoltage {
    /// Convert a full-scale voltage in whole volts.
    ///
    /// Only 16, 32 and 60 are accepted.
    pub fn from_volts(volts: u8) -> Result<FullScaleBusVoltage, Error> {
        match volts {
            16 => Ok(FullScaleBusVoltage::V16),
            32 => Ok(FullScaleBusVoltage::V32),
            60 => Ok(FullScaleBusVoltage::V60),
            _ => Err(Error::InvalidParameter(Parameter::FullScaleBusVoltage)),
        }
    }

    /// The full-scale voltage, in volts.
    pub fn volts(self) -> f64 {
        match self {
            FullScaleBusVoltage::V16 => 16.0,
            FullScaleBusVoltage::V32 => 32.0,
            FullScaleBusVoltage::V60 => 60.0,
        }
    }

    /// The BRNG1:BRNG0 code.
    fn range_code(self) -> u16 {
        match self {
            FullScaleBusVoltage::V16 => 0b00,
            FullScaleBusVoltage::V32 => 0b01,
            FullScaleBusVoltage::V60 => 0b10,
        }
    }

    /// The BADC field when averaging is off. There is no 15-bit bus mode.
    fn adc_resolution_field(self) -> u8 {
        match self {
            FullScaleBusVoltage::V16 => 0b0000,
            FullScaleBusVoltage::V32 => 0b0001,
            FullScaleBusVoltage::V60 => 0b0010,
        }
    }
}

impl ShuntRange {
    /// Convert a full-scale shunt voltage in millivolts.
    ///
    /// Only 40, 80, 160 and 320 are accepted.
    pub fn from_millivolts(millivolts: u16) -> Result<ShuntRange, Error> {
        match millivolts {
            40 => Ok(ShuntRange::Mv40),
            80 => Ok(ShuntRange::Mv80),
            160 => Ok(ShuntRange::Mv160),
            320 => Ok(ShuntRange::Mv320),
            _ => Err(Error::InvalidParameter(Parameter::ShuntRange)),
        }
    }

    /// The full-scale shunt voltage, in volts.
    pub fn full_scale_volts(self) -> f64 {
        match self {
            ShuntRange::Mv40 => 0.040,
            ShuntRange::Mv80 => 0.080,
            ShuntRange::Mv160 => 0.160,
            ShuntRange::Mv320 => 0.320,
        }
    }

    /// The PG1:PG0 code.
    fn pga_code(self) -> u16 {
        match self {
            ShuntRange::Mv40 => 0b00,
            ShuntRange::Mv80 => 0b01,
            ShuntRange::Mv160 => 0b10,
            ShuntRange::Mv320 => 0b11,
        }
    }

    /// The SADC field when averaging is off.
    fn adc_resolution_field(self) -> u8 {
        match self {
            // 12-bit is the all-zeroes pattern
            ShuntRange::Mv40 => 0b0000,
            ShuntRange::Mv80 => 0b0001,
            ShuntRange::Mv160 => 0b0010,
            ShuntRange::Mv320 => 0b0011,
        }
    }
}

impl Averaging {
    /// The number of samples averaged, with zero meaning disabled.
    pub fn samples(self) -> u8 {
        match self {
            Averaging::Disabled => 0,
            Averaging::X1 => 1,
            Averaging::X2 => 2,
            Averaging::X4 => 4,
            Averaging::X8 => 8,
            Averaging::X16 => 16,
            Averaging::X32 => 32,
            Averaging::X64 => 64,
            Averaging::X128 => 128,
        }
    }

    /// The 3-bit averaging code, or `None` if averaging is disabled.
    fn code(self) -> Option<u8> {
        match self {
            Averaging::Disabled => None,
            Averaging::X1 => Some(0b000),
            Averaging::X2 => Some(0b001),
            Averaging::X4 => Some(0b010),
            Averaging::X8 => Some(0b011),
            Averaging::X16 => Some(0b100),
            Averaging::X32 => Some(0b101),
            Averaging::X64 => Some(0b110),
            Averaging::X128 => Some(0b111),
        }
    }

    fn from_code(code: u8) -> Averaging {
        match code & 0b111 {
            0b000 => Averaging::X1,
            0b001 => Averaging::X2,
            0b010 => Averaging::X4,
            0b011 => Averaging::X8,
            0b100 => Averaging::X16,
            0b101 => Averaging::X32,
            0b110 => Averaging::X64,
            _ => Averaging::X128,
        }
    }
}

impl TryFrom<u8> for Averaging {
    type Error = Error;

    fn try_from(samples: u8) -> Result<Averaging, Error> {
        match samples {
            0 => Ok(Averaging::Disabled),
            1 => Ok(Averaging::X1),
            2 => Ok(Averaging::X2),
            4 => Ok(Averaging::X4),
            8 => Ok(Averaging::X8),
            16 => Ok(Averaging::X16),
            32 => Ok(Averaging::X32),
            64 => Ok(Averaging::X64),
            128 => Ok(Averaging::X128),
            _ => Err(Error::InvalidParameter(Parameter::Averaging)),
        }
    }
}

impl OperatingMode {
    fn from_bits(bits: u8) -> OperatingMode {
        match bits & 0b111 {
            0b000 => OperatingMode::PowerDown,
            0b001 => OperatingMode::ShuntTriggered,
            0b010 => OperatingMode::BusTriggered,
            0b011 => OperatingMode::ShuntAndBusTriggered,
            0b100 => OperatingMode::AdcOff,
            0b101 => OperatingMode::ShuntContinuous,
            0b110 => OperatingMode::BusContinuous,
            _ => OperatingMode::ShuntAndBusContinuous,
        }
    }
}

impl TryFrom<u8> for OperatingMode {
    type Error = Error;

    /// Rejects anything with bits set above bit 2.
    fn try_from(bits: u8) -> Result<OperatingMode, Error> {
        if bits & !(MODE_MASK as u8) != 0 {
            return Err(Error::InvalidParameter(Parameter::Mode));
        }
        Ok(OperatingMode::from_bits(bits))
    }
}

impl DeviceParameters {
    /// Build a validated set of parameters.
    ///
    /// The shunt resistance is given in milliohms, as printed on most
    /// current-sense resistors, and must be finite and greater than zero.
    pub fn new(
        full_scale_bus_voltage: FullScaleBusVoltage,
        shunt_range: ShuntRange,
        shunt_resistance_milliohm: f64,
        bus_averaging: Averaging,
        shunt_averaging: Averaging,
        mode: OperatingMode,
    ) -> Result<DeviceParameters, Error> {
        Ok(DeviceParameters {
            full_scale_bus_voltage,
            shunt_range,
            shunt_resistance_ohms: milliohm_to_ohm(shunt_resistance_milliohm)?,
            bus_averaging,
            shunt_averaging,
            mode,
        })
    }

    /// Change the bus voltage range.
    pub fn with_full_scale_bus_voltage(mut self, range: FullScaleBusVoltage) -> DeviceParameters {
        self.full_scale_bus_voltage = range;
        self
    }

    /// Change the shunt voltage range.
    pub fn with_shunt_range(mut self, range: ShuntRange) -> DeviceParameters {
        self.shunt_range = range;
        self
    }

    /// Change the shunt resistance, given in milliohms.
    pub fn with_shunt_resistance_milliohm(
        mut self,
        milliohm: f64,
    ) -> Result<DeviceParameters, Error> {
        self.shunt_resistance_ohms = milliohm_to_ohm(milliohm)?;
        Ok(self)
    }

    /// Change the bus ADC averaging.
    pub fn with_bus_averaging(mut self, averaging: Averaging) -> DeviceParameters {
        self.bus_averaging = averaging;
        self
    }

    /// Change the shunt ADC averaging.
    pub fn with_shunt_averaging(mut self, averaging: Averaging) -> DeviceParameters {
        self.shunt_averaging = averaging;
        self
    }

    /// Change the operating mode.
    pub fn with_mode(mut self, mode: OperatingMode) -> DeviceParameters {
        self.mode = mode;
        self
    }

    /// Get the bus voltage range.
    pub fn full_scale_bus_voltage(&self) -> FullScaleBusVoltage {
        self.full_scale_bus_voltage
    }

    /// Get the shunt voltage range.
    pub fn shunt_range(&self) -> ShuntRange {
        self.shunt_range
    }

    /// Get the shunt resistance, in ohms.
    pub fn shunt_resistance_ohms(&self) -> f64 {
        self.shunt_resistance_ohms
    }

    /// Get the bus ADC averaging.
    pub fn bus_averaging(&self) -> Averaging {
        self.bus_averaging
    }

    /// Get the shunt ADC averaging.
    pub fn shunt_averaging(&self) -> Averaging {
        self.shunt_averaging
    }

    /// Get the operating mode.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }
}

impl Default for DeviceParameters {
    /// 16 V bus, ±320 mV across a 5 mΩ shunt, no averaging, continuous
    /// shunt and bus conversions.
    fn default() -> DeviceParameters {
        DeviceParameters {
            full_scale_bus_voltage: FullScaleBusVoltage::V16,
            shunt_range: ShuntRange::Mv320,
            shunt_resistance_ohms: 0.005,
            bus_averaging: Averaging::Disabled,
            shunt_averaging: Averaging::Disabled,
            mode: OperatingMode::ShuntAndBusContinuous,
        }
    }
}

impl ConfigurationWord {
    /// The word that resets the chip. Only the RST bit is set.
    pub const RESET: ConfigurationWord = ConfigurationWord(RESET_BIT);

    /// Work out the Configuration Register contents for the given parameters.
    ///
    /// Same parameters in, same word out. Every valid set of parameters has
    /// exactly one encoding.
    pub fn synthesize(params: &DeviceParameters) -> ConfigurationWord {
        let bus_field = adc_field(
            params.bus_averaging,
            params.full_scale_bus_voltage.adc_resolution_field(),
        );
        let shunt_field = adc_field(
            params.shunt_averaging,
            params.shunt_range.adc_resolution_field(),
        );
        ConfigurationWord(
            (params.mode as u16)
                | (params.full_scale_bus_voltage.range_code() << BRNG_SHIFT)
                | (params.shunt_range.pga_code() << PG_SHIFT)
                | ((bus_field as u16) << BADC_SHIFT)
                | ((shunt_field as u16) << SADC_SHIFT),
        )
    }

    /// Wrap a raw register value, e.g. one read back from the chip.
    pub const fn from_bits(bits: u16) -> ConfigurationWord {
        ConfigurationWord(bits)
    }

    /// The raw register value.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether the RST bit is set.
    pub fn is_reset(self) -> bool {
        self.0 & RESET_BIT != 0
    }

    /// The BRNG1:BRNG0 code.
    pub fn bus_range_code(self) -> u8 {
        ((self.0 >> BRNG_SHIFT) & TWO_BIT_MASK) as u8
    }

    /// The PG1:PG0 code.
    pub fn pga_code(self) -> u8 {
        ((self.0 >> PG_SHIFT) & TWO_BIT_MASK) as u8
    }

    /// The four BADC bits.
    pub fn bus_adc_field(self) -> u8 {
        ((self.0 >> BADC_SHIFT) & ADC_FIELD_MASK) as u8
    }

    /// The four SADC bits.
    pub fn shunt_adc_field(self) -> u8 {
        ((self.0 >> SADC_SHIFT) & ADC_FIELD_MASK) as u8
    }

    /// The operating mode.
    pub fn mode(self) -> OperatingMode {
        OperatingMode::from_bits((self.0 & MODE_MASK) as u8)
    }

    /// The averaging selected for one axis.
    ///
    /// When the averaging-enable bit is clear the field holds a resolution
    /// rather than a count, and this reports [`Averaging::Disabled`].
    pub fn averaging(self, axis: Axis) -> Averaging {
        let field = self.adc_field(axis);
        if field & AVERAGING_ENABLE == 0 {
            Averaging::Disabled
        } else {
            Averaging::from_code(field)
        }
    }

    /// The ADC resolution, in bits, for one axis.
    ///
    /// The shunt decodes its PGA code as 12, 13, 14 or 15 bits. The bus
    /// ADC tops out at 14 bits, so BRNG codes `10` and `11` both mean 14.
    pub fn resolution(self, axis: Axis) -> Result<u8, Error> {
        match axis {
            Axis::Shunt => match self.pga_code() {
                0b00 => Ok(12),
                0b01 => Ok(13),
                0b10 => Ok(14),
                0b11 => Ok(15),
                code => Err(Error::UnreachableResolutionCode(code)),
            },
            Axis::Bus => match self.bus_range_code() {
                0b00 => Ok(12),
                0b01 => Ok(13),
                0b10 | 0b11 => Ok(14),
                code => Err(Error::UnreachableResolutionCode(code)),
            },
        }
    }

    /// How long one conversion takes on the given axis.
    ///
    /// Keyed on the exact bit pattern in the ADC field. The patterns
    /// `0100` to `0111` never come out of [`ConfigurationWord::synthesize`]
    /// and give a zero delay.
    pub fn conversion_delay(self, axis: Axis) -> Duration {
        let field = self.adc_field(axis);
        let index = match field {
            0b0000 => 0,
            0b0001 => 1,
            0b0010 => 2,
            0b0011 => 3,
            // A single-sample average is one 15-bit conversion
            0b1000 => 3,
            0b1001 => 4,
            0b1010 => 5,
            0b1011 => 6,
            0b1100 => 7,
            0b1101 => 8,
            0b1110 => 9,
            0b1111 => 10,
            _ => {
                #[cfg(feature = "defmt")]
                defmt::warn!("No ISL28022 conversion time for ADC field 0b{:04b}", field);
                return Duration::ZERO;
            }
        };
        Duration::from_micros(CONVERSION_TIMES_US[index])
    }

    /// How long to wait after power-on before the first reading.
    ///
    /// The chip runs one oscillator tick per shunt count.
    pub fn initialization_delay(self) -> Result<Duration, Error> {
        let counts = 1u64 << self.resolution(Axis::Shunt)?;
        Ok(Duration::from_micros(counts * 1_000_000 / OSCILLATOR_HZ))
    }

    fn adc_field(self, axis: Axis) -> u8 {
        match axis {
            Axis::Bus => self.bus_adc_field(),
            Axis::Shunt => self.shunt_adc_field(),
        }
    }
}

impl core::fmt::Display for ConfigurationWord {
    /// Renders the bit groups, e.g. `0 00 11 0000 0011 111`.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} {:02b} {:02b} {:04b} {:04b} {:03b}",
            u8::from(self.is_reset()),
            self.bus_range_code(),
            self.pga_code(),
            self.bus_adc_field(),
            self.shunt_adc_field(),
            self.0 & MODE_MASK,
        )
    }
}

impl From<ConfigurationWord> for u16 {
    fn from(word: ConfigurationWord) -> u16 {
        word.0
    }
}

//
// Private Functions
//

/// Pick the 4-bit ADC field: an averaging count if one was asked for,
/// otherwise the resolution implied by the range.
fn adc_field(averaging: Averaging, resolution_field: u8) -> u8 {
    match averaging.code() {
        Some(code) => AVERAGING_ENABLE | code,
        None => resolution_field,
    }
}

fn milliohm_to_ohm(milliohm: f64) -> Result<f64, Error> {
    if milliohm.is_finite() && milliohm > 0.0 {
        Ok(milliohm / 1000.0)
    } else {
        Err(Error::InvalidParameter(Parameter::ShuntResistance))
    }
}

//
// Tests
//


//
// End of file
//
