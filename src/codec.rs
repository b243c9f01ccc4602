//! # Measurement Decoding
//!
//! Converts raw register contents into volts, amps and watts, works out the
//! calibration constants for a given shunt, and frames register values for
//! the wire.
//!
//! All quantities are SI: volts, ohms, amps and watts.

use crate::Error;

//
// Public Types
//

/// Scaling constants derived from the shunt, fixed for the life of the
/// driver.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationConstants {
    /// The largest current the shunt range can measure, in amps.
    pub current_full_scale: f64,
    /// Amps per count of the Current Register.
    pub current_lsb: f64,
    /// The value for the Calibration Register. Always even.
    pub register_value: u16,
}

/// A decoded Bus Voltage Register.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusVoltage {
    /// The bus voltage, in volts.
    pub volts: f64,
    /// The OVF bit. Set when the power or current calculation overflowed.
    pub overflow: bool,
}

//
// Public Data
//

/// Volts per count of the Shunt Voltage Register (10 µV).
pub const SHUNT_VOLTAGE_LSB: f64 = 0.000_010;

/// Volts per count of the Bus Voltage Register (4 mV).
pub const BUS_VOLTAGE_LSB: f64 = 0.004;

//
// Private Data
//

/// Ratio between the Power Register LSB and current LSB × bus LSB.
const POWER_SCALE: f64 = 5000.0;

/// The numerator of the calibration equation: 2^12 × 10 µV.
const CALIBRATION_SCALE: f64 = 4096.0 * SHUNT_VOLTAGE_LSB;

/// The Current Register always holds a 15-bit magnitude plus sign.
const CURRENT_BITS: u8 = 15;

/// The Power Register has no sign bit.
const POWER_MASK: u16 = 0x7FFF;

/// The OVF flag in the Bus Voltage Register.
const BUS_OVERFLOW_BIT: u16 = 1 << 0;

//
// impls on Public Types
//

impl CalibrationConstants {
    /// Convert a raw Current Register value to amps.
    pub fn current(&self, raw: u16) -> f64 {
        current(raw, self.current_lsb)
    }

    /// Convert a raw Power Register value to watts.
    pub fn power(&self, raw: u16) -> f64 {
        power(raw, self.current_lsb, BUS_VOLTAGE_LSB)
    }
}

//
// Public Functions
//

/// Interpret `raw` as a signed value with a sign bit at position
/// `significant_bits` and magnitude bits below it.
///
/// Negative values start at -1 and subtract the place value of every clear
/// magnitude bit. Bits above the sign bit are ignored.
pub fn decode_signed(raw: u16, significant_bits: u8) -> f64 {
    let raw = u32::from(raw);
    let sign_bit = 1u32.checked_shl(u32::from(significant_bits)).unwrap_or(0);
    let negative = raw & sign_bit != 0;
    let mut value: i32 = if negative { -1 } else { 0 };
    for n in 0..significant_bits.min(16) {
        let place = 1i32 << n;
        let set = raw & (1 << n) != 0;
        if negative && !set {
            value -= place;
        } else if !negative && set {
            value += place;
        }
    }
    value as f64
}

/// Convert a raw Shunt Voltage Register value to volts.
///
/// `resolution_bits` must be 12, 13, 14 or 15.
pub fn shunt_voltage(raw: u16, resolution_bits: u8) -> Result<f64, Error> {
    match resolution_bits {
        12..=15 => Ok(decode_signed(raw, resolution_bits) * SHUNT_VOLTAGE_LSB),
        _ => Err(Error::UnreachableResolutionCode(resolution_bits)),
    }
}

/// Convert a raw Bus Voltage Register value to volts.
///
/// Bit 0 is the overflow flag and is reported separately. The value is
/// unsigned and its alignment depends on `resolution_bits`, which must be
/// 12, 13 or 14.
pub fn bus_voltage(raw: u16, resolution_bits: u8) -> Result<BusVoltage, Error> {
    let counts = match resolution_bits {
        12 => (raw & 0x7FF8) >> 3,
        13 => (raw & 0xFFF8) >> 3,
        14 => (raw & 0xFFFC) >> 2,
        _ => return Err(Error::UnreachableResolutionCode(resolution_bits)),
    };
    Ok(BusVoltage {
        volts: f64::from(counts) * BUS_VOLTAGE_LSB,
        overflow: raw & BUS_OVERFLOW_BIT != 0,
    })
}

/// Convert a raw Current Register value to amps.
///
/// The Current Register is always 15 bits plus sign, whatever the shunt
/// resolution.
pub fn current(raw: u16, current_lsb: f64) -> f64 {
    decode_signed(raw, CURRENT_BITS) * current_lsb
}

/// Convert a raw Power Register value to watts.
pub fn power(raw: u16, current_lsb: f64, vbus_lsb: f64) -> f64 {
    f64::from(raw & POWER_MASK) * current_lsb * vbus_lsb * POWER_SCALE
}

/// Work out the current scaling and the Calibration Register value for a
/// shunt.
///
/// The register value is truncated and then has its bottom bit cleared, as
/// the chip ignores it.
pub fn derive_calibration(
    shunt_full_scale_volts: f64,
    shunt_resistance_ohms: f64,
    shunt_resolution_bits: u8,
) -> Result<CalibrationConstants, Error> {
    if !(12..=15).contains(&shunt_resolution_bits) {
        return Err(Error::UnreachableResolutionCode(shunt_resolution_bits));
    }
    let current_full_scale = shunt_full_scale_volts / shunt_resistance_ohms;
    let current_lsb = current_full_scale / f64::from(1u16 << shunt_resolution_bits);
    // Float-to-int casts truncate toward zero and saturate
    let register_value =
        ((CALIBRATION_SCALE / (current_lsb * shunt_resistance_ohms)) as u16) & 0xFFFE;
    Ok(CalibrationConstants {
        current_full_scale,
        current_lsb,
        register_value,
    })
}

/// Build the bytes that write `value` into `register`: the register
/// address, then the value big-endian.
pub fn frame_write(register: u8, value: u16) -> [u8; 3] {
    let [high, low] = value.to_be_bytes();
    [register, high, low]
}

/// Combine the two bytes of a register read, most significant first.
///
/// Anything other than exactly two bytes is rejected.
pub fn combine_read(bytes: &[u8]) -> Result<u16, Error> {
    match bytes {
        [high, low] => Ok(u16::from_be_bytes([*high, *low])),
        _ => Err(Error::MalformedBuffer(bytes.len())),
    }
}

//
// Tests
//

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_signed_boundaries() {
        assert_eq!(decode_signed(0x0000, 15), 0.0);
        assert_eq!(decode_signed(0x7FFF, 15), 32767.0);
        assert_eq!(decode_signed(0x8000, 15), -32768.0);
        assert_eq!(decode_signed(0xFFFF, 15), -1.0);
        assert_eq!(decode_signed(0x0001, 15), 1.0);
    }

    #[test]
    fn decode_signed_narrow_fields() {
        // 12 bits: sign at bit 12
        assert_eq!(decode_signed(0x0FFF, 12), 4095.0);
        assert_eq!(decode_signed(0x1000, 12), -4096.0);
        assert_eq!(decode_signed(0x1FFF, 12), -1.0);
        // 13 bits
        assert_eq!(decode_signed(0x1FFF, 13), 8191.0);
        assert_eq!(decode_signed(0x2000, 13), -8192.0);
        // 14 bits
        assert_eq!(decode_signed(0x3FFF, 14), 16383.0);
        assert_eq!(decode_signed(0x4000, 14), -16384.0);
        assert_eq!(decode_signed(0x7FFE, 14), -2.0);
    }

    #[test]
    fn decode_signed_ignores_bits_above_sign() {
        assert_eq!(decode_signed(0xE001, 12), 1.0);
        assert_eq!(decode_signed(0xFFFF, 12), -1.0);
    }

    #[test]
    fn shunt_voltage_scaling() {
        assert!(approx_eq!(f64, shunt_voltage(0x7D00, 15).unwrap(), 0.32, epsilon = 1e-12));
        // -200 counts
        assert!(approx_eq!(f64, shunt_voltage(0xFF38, 15).unwrap(), -0.002, epsilon = 1e-12));
        assert!(approx_eq!(f64, shunt_voltage(0x0FA0, 12).unwrap(), 0.04, epsilon = 1e-12));
    }

    #[test]
    fn shunt_voltage_rejects_bad_resolution() {
        assert_eq!(shunt_voltage(0, 11), Err(Error::UnreachableResolutionCode(11)));
        assert_eq!(shunt_voltage(0, 16), Err(Error::UnreachableResolutionCode(16)));
    }

    #[test]
    fn bus_voltage_twelve_bit() {
        let reading = bus_voltage(0b0000_0000_0000_1000, 12).unwrap();
        assert!(approx_eq!(f64, reading.volts, 0.004, epsilon = 1e-12));
        assert!(!reading.overflow);
        // Top bit is not part of a 12-bit reading
        let reading = bus_voltage(0x8008, 12).unwrap();
        assert!(approx_eq!(f64, reading.volts, 0.004, epsilon = 1e-12));
    }

    #[test]
    fn bus_voltage_thirteen_and_fourteen_bit() {
        let reading = bus_voltage(0x8008, 13).unwrap();
        assert!(approx_eq!(f64, reading.volts, 4097.0 * 0.004, epsilon = 1e-9));
        let reading = bus_voltage(0x0004, 14).unwrap();
        assert!(approx_eq!(f64, reading.volts, 0.004, epsilon = 1e-12));
        let reading = bus_voltage(0xFFFC, 14).unwrap();
        assert!(approx_eq!(f64, reading.volts, 16383.0 * 0.004, epsilon = 1e-9));
    }

    #[test]
    fn bus_voltage_reports_overflow_without_changing_value() {
        let clear = bus_voltage(0x3E80, 12).unwrap();
        let set = bus_voltage(0x3E81, 12).unwrap();
        assert!(!clear.overflow);
        assert!(set.overflow);
        assert_eq!(clear.volts, set.volts);
        assert!(approx_eq!(f64, set.volts, 8.0, epsilon = 1e-9));
    }

    #[test]
    fn bus_voltage_has_no_fifteen_bit_mode() {
        assert_eq!(bus_voltage(0, 15), Err(Error::UnreachableResolutionCode(15)));
        assert_eq!(bus_voltage(0, 0), Err(Error::UnreachableResolutionCode(0)));
    }

    #[test]
    fn current_is_always_fifteen_bit() {
        let lsb = 0.001_953_125;
        assert!(approx_eq!(f64, current(0x0200, lsb), 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, current(0x8000, lsb), -64.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, current(0xFFFF, lsb), -lsb, epsilon = 1e-12));
    }

    #[test]
    fn power_is_unsigned_fifteen_bit() {
        let lsb = 0.001_953_125;
        assert!(approx_eq!(
            f64,
            power(100, lsb, BUS_VOLTAGE_LSB),
            3.906_25,
            epsilon = 1e-9
        ));
        // The top bit is dropped rather than treated as a sign
        assert_eq!(
            power(0x8064, lsb, BUS_VOLTAGE_LSB),
            power(0x0064, lsb, BUS_VOLTAGE_LSB)
        );
    }

    #[test]
    fn calibration_for_five_milliohm_shunt() {
        let cal = derive_calibration(0.320, 0.005, 15).unwrap();
        assert!(approx_eq!(f64, cal.current_full_scale, 64.0, epsilon = 1e-6));
        assert!(approx_eq!(f64, cal.current_lsb, 0.001_953_125, epsilon = 1e-6));
        // floor(0.04096 / 0.000009765625) = floor(4194.304)
        assert_eq!(cal.register_value, 4194);
        assert!(approx_eq!(f64, cal.current(0x0200), 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, cal.power(100), 3.906_25, epsilon = 1e-9));
    }

    #[test]
    fn calibration_register_is_even() {
        for (volts, bits) in [(0.040, 12), (0.080, 13), (0.160, 14), (0.320, 15)] {
            for ohms in [0.001, 0.0033, 0.01, 0.1] {
                let cal = derive_calibration(volts, ohms, bits).unwrap();
                assert_eq!(cal.register_value & 1, 0, "{} V {} ohm", volts, ohms);
            }
        }
        // 40 mV over 0.1 ohm at 12 bits is 4194.304 before truncation
        let cal = derive_calibration(0.040, 0.1, 12).unwrap();
        assert_eq!(cal.register_value, 4194);
        assert!(approx_eq!(f64, cal.current_full_scale, 0.4, epsilon = 1e-12));
    }

    #[test]
    fn calibration_rejects_bad_resolution() {
        assert_eq!(
            derive_calibration(0.320, 0.005, 16),
            Err(Error::UnreachableResolutionCode(16))
        );
    }

    #[test]
    fn write_framing_is_big_endian() {
        assert_eq!(frame_write(0x00, 0x181F), [0x00, 0x18, 0x1F]);
        assert_eq!(frame_write(0x05, 0x1062), [0x05, 0x10, 0x62]);
    }

    #[test]
    fn read_combining() {
        assert_eq!(combine_read(&[0x12, 0x34]), Ok(0x1234));
        assert_eq!(combine_read(&[0xFF, 0x00]), Ok(0xFF00));
    }

    #[test]
    fn read_combining_rejects_wrong_length() {
        assert_eq!(combine_read(&[]), Err(Error::MalformedBuffer(0)));
        assert_eq!(combine_read(&[0x12]), Err(Error::MalformedBuffer(1)));
        assert_eq!(combine_read(&[0x12, 0x34, 0x56]), Err(Error::MalformedBuffer(3)));
    }
}

//
// End of file
//
