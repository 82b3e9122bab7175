use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Formatter;
use std::io::Write;

use crate::segy_error::SegyError;

/// Byte order of the binary header, trace headers and samples. The SEG-Y
/// standard is big endian, but little endian files exist in the wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    pub fn read_i16(self, mut buf: &[u8]) -> Result<i16, SegyError> {
        let v = match self {
            Endian::Big => buf.read_i16::<BigEndian>()?,
            Endian::Little => buf.read_i16::<LittleEndian>()?,
        };
        Ok(v)
    }

    pub fn read_u16(self, mut buf: &[u8]) -> Result<u16, SegyError> {
        let v = match self {
            Endian::Big => buf.read_u16::<BigEndian>()?,
            Endian::Little => buf.read_u16::<LittleEndian>()?,
        };
        Ok(v)
    }

    pub fn read_i32(self, mut buf: &[u8]) -> Result<i32, SegyError> {
        let v = match self {
            Endian::Big => buf.read_i32::<BigEndian>()?,
            Endian::Little => buf.read_i32::<LittleEndian>()?,
        };
        Ok(v)
    }

    pub fn read_u32(self, mut buf: &[u8]) -> Result<u32, SegyError> {
        let v = match self {
            Endian::Big => buf.read_u32::<BigEndian>()?,
            Endian::Little => buf.read_u32::<LittleEndian>()?,
        };
        Ok(v)
    }

    pub fn write_i16<W: Write>(self, buf: &mut W, v: i16) -> Result<(), SegyError> {
        match self {
            Endian::Big => buf.write_i16::<BigEndian>(v)?,
            Endian::Little => buf.write_i16::<LittleEndian>(v)?,
        }
        Ok(())
    }

    pub fn write_u16<W: Write>(self, buf: &mut W, v: u16) -> Result<(), SegyError> {
        match self {
            Endian::Big => buf.write_u16::<BigEndian>(v)?,
            Endian::Little => buf.write_u16::<LittleEndian>(v)?,
        }
        Ok(())
    }

    pub fn write_i32<W: Write>(self, buf: &mut W, v: i32) -> Result<(), SegyError> {
        match self {
            Endian::Big => buf.write_i32::<BigEndian>(v)?,
            Endian::Little => buf.write_i32::<LittleEndian>(v)?,
        }
        Ok(())
    }

    pub fn write_u32<W: Write>(self, buf: &mut W, v: u32) -> Result<(), SegyError> {
        match self {
            Endian::Big => buf.write_u32::<BigEndian>(v)?,
            Endian::Little => buf.write_u32::<LittleEndian>(v)?,
        }
        Ok(())
    }
}

/// Known sample format codes from bytes 25-26 of the binary header.
/// ```text
/// 1   4-byte IBM floating point
/// 2   4-byte two's complement integer
/// 3   2-byte two's complement integer
/// 5   4-byte IEEE floating point
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    IbmFloat32,
    Int32,
    Int16,
    IeeeFloat32,
}

impl SampleFormat {
    /// Creates a SampleFormat from the binary header format code.
    pub fn from_code(code: i16) -> Result<SampleFormat, SegyError> {
        match code {
            1 => Ok(SampleFormat::IbmFloat32),
            2 => Ok(SampleFormat::Int32),
            3 => Ok(SampleFormat::Int16),
            5 => Ok(SampleFormat::IeeeFloat32),
            _ => Err(SegyError::UnsupportedFormat(code)),
        }
    }

    /// The format code, as written to the binary header.
    pub fn code(&self) -> i16 {
        match self {
            SampleFormat::IbmFloat32 => 1,
            SampleFormat::Int32 => 2,
            SampleFormat::Int16 => 3,
            SampleFormat::IeeeFloat32 => 5,
        }
    }

    /// Bytes per sample on disk.
    pub fn byte_width(&self) -> usize {
        match self {
            SampleFormat::IbmFloat32 => 4,
            SampleFormat::Int32 => 4,
            SampleFormat::Int16 => 2,
            SampleFormat::IeeeFloat32 => 4,
        }
    }

    /// Decodes raw sample bytes into native floats. `raw` must hold a whole
    /// number of samples of this format's width.
    pub fn decode_samples(&self, raw: &[u8], endian: Endian) -> Vec<f32> {
        let width = self.byte_width();
        let mut samples = Vec::with_capacity(raw.len() / width);
        for chunk in raw.chunks_exact(width) {
            let v = match self {
                SampleFormat::IbmFloat32 => {
                    let bits = match endian {
                        Endian::Big => u32::from_be_bytes(chunk.try_into().unwrap()),
                        Endian::Little => u32::from_le_bytes(chunk.try_into().unwrap()),
                    };
                    ibm_to_f32(bits)
                }
                SampleFormat::Int32 => match endian {
                    Endian::Big => i32::from_be_bytes(chunk.try_into().unwrap()) as f32,
                    Endian::Little => i32::from_le_bytes(chunk.try_into().unwrap()) as f32,
                },
                SampleFormat::Int16 => match endian {
                    Endian::Big => i16::from_be_bytes(chunk.try_into().unwrap()) as f32,
                    Endian::Little => i16::from_le_bytes(chunk.try_into().unwrap()) as f32,
                },
                SampleFormat::IeeeFloat32 => {
                    let bits = match endian {
                        Endian::Big => u32::from_be_bytes(chunk.try_into().unwrap()),
                        Endian::Little => u32::from_le_bytes(chunk.try_into().unwrap()),
                    };
                    f32::from_bits(bits)
                }
            };
            samples.push(v);
        }
        samples
    }

    /// Encodes native floats into raw sample bytes of this format.
    pub fn encode_samples(&self, samples: &[f32], endian: Endian) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * self.byte_width());
        for &s in samples {
            match self {
                SampleFormat::IbmFloat32 => {
                    let bits = f32_to_ibm(s);
                    match endian {
                        Endian::Big => out.extend_from_slice(&bits.to_be_bytes()),
                        Endian::Little => out.extend_from_slice(&bits.to_le_bytes()),
                    }
                }
                SampleFormat::Int32 => {
                    let v = s as i32;
                    match endian {
                        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
                        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
                    }
                }
                SampleFormat::Int16 => {
                    let v = s as i16;
                    match endian {
                        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
                        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
                    }
                }
                SampleFormat::IeeeFloat32 => {
                    let bits = s.to_bits();
                    match endian {
                        Endian::Big => out.extend_from_slice(&bits.to_be_bytes()),
                        Endian::Little => out.extend_from_slice(&bits.to_le_bytes()),
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::IbmFloat32 => write!(f, "4-byte IBM floating point"),
            SampleFormat::Int32 => write!(f, "4-byte two's complement integer"),
            SampleFormat::Int16 => write!(f, "2-byte two's complement integer"),
            SampleFormat::IeeeFloat32 => write!(f, "4-byte IEEE floating point"),
        }
    }
}

/// Converts an IBM System/360 hexadecimal float bit pattern to a native f32.
///
/// The layout is sign (1 bit), base-16 exponent biased by 64 (7 bits) and a
/// 24-bit fraction in [1/16, 1). Not the same as the IEEE-754 layout, a
/// reinterpret would silently corrupt amplitudes.
pub fn ibm_to_f32(bits: u32) -> f32 {
    if bits & 0x7fff_ffff == 0 {
        return 0.0;
    }
    let sign = if bits & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 24) & 0x7f) as i32 - 64;
    let fraction = (bits & 0x00ff_ffff) as f64 / 16_777_216.0;
    (sign * fraction * 16f64.powi(exponent)) as f32
}

/// Converts a native f32 to the nearest IBM hexadecimal float bit pattern.
pub fn f32_to_ibm(value: f32) -> u32 {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let sign = if value.is_sign_negative() {
        0x8000_0000u32
    } else {
        0
    };
    let mut fraction = value.abs() as f64;
    let mut exponent: i32 = 0;
    while fraction >= 1.0 {
        fraction /= 16.0;
        exponent += 1;
    }
    while fraction < 0.0625 {
        fraction *= 16.0;
        exponent -= 1;
    }
    let mut mantissa = (fraction * 16_777_216.0).round() as u32;
    if mantissa == 0x0100_0000 {
        // rounding carried into a new hex digit
        mantissa = 0x0010_0000;
        exponent += 1;
    }
    let exponent = (exponent + 64).clamp(0, 127) as u32;
    sign | (exponent << 24) | (mantissa & 0x00ff_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ibm_known_patterns() {
        // reference values from the IBM hexadecimal float definition
        assert_eq!(ibm_to_f32(0x0000_0000), 0.0);
        assert_eq!(ibm_to_f32(0x4110_0000), 1.0);
        assert_eq!(ibm_to_f32(0xC110_0000), -1.0);
        assert_eq!(ibm_to_f32(0x4264_0000), 100.0);
        assert_eq!(ibm_to_f32(0xC276_A000), -118.625);
        assert_eq!(ibm_to_f32(0x4048_0000), 0.28125);
    }

    #[test]
    fn ibm_encode_known_patterns() {
        assert_eq!(f32_to_ibm(0.0), 0x0000_0000);
        assert_eq!(f32_to_ibm(1.0), 0x4110_0000);
        assert_eq!(f32_to_ibm(-1.0), 0xC110_0000);
        assert_eq!(f32_to_ibm(100.0), 0x4264_0000);
        assert_eq!(f32_to_ibm(-118.625), 0xC276_A000);
    }

    #[test]
    fn ibm_round_trip() {
        for v in [1.5f32, -0.125, 3200.0, 0.0001220703125, -99.5] {
            let rt = ibm_to_f32(f32_to_ibm(v));
            assert!((rt - v).abs() <= v.abs() * 1e-6, "{} != {}", rt, v);
        }
    }

    #[test]
    fn format_codes() {
        for code in [1i16, 2, 3, 5] {
            let fmt = SampleFormat::from_code(code).unwrap();
            assert_eq!(fmt.code(), code);
        }
        assert!(matches!(
            SampleFormat::from_code(4),
            Err(SegyError::UnsupportedFormat(4))
        ));
        assert!(SampleFormat::from_code(0).is_err());
    }

    #[test]
    fn decode_ieee_big_endian() {
        let raw = [0x3f, 0x80, 0x00, 0x00, 0xc0, 0x00, 0x00, 0x00];
        let samples = SampleFormat::IeeeFloat32.decode_samples(&raw, Endian::Big);
        assert_eq!(samples, vec![1.0, -2.0]);
    }

    #[test]
    fn decode_int16_little_endian() {
        let raw = [0x01, 0x00, 0xff, 0xff];
        let samples = SampleFormat::Int16.decode_samples(&raw, Endian::Little);
        assert_eq!(samples, vec![1.0, -1.0]);
    }

    #[test]
    fn sample_round_trip_all_formats() {
        // integer formats carry whole-valued amplitudes only
        let float_samples = vec![0.0f32, 1.0, -1.0, 12.5, -3200.0];
        let int_samples = vec![0.0f32, 1.0, -1.0, 12.0, -3200.0];
        for (fmt, samples) in [
            (SampleFormat::IbmFloat32, &float_samples),
            (SampleFormat::Int32, &int_samples),
            (SampleFormat::Int16, &int_samples),
            (SampleFormat::IeeeFloat32, &float_samples),
        ] {
            for endian in [Endian::Big, Endian::Little] {
                let raw = fmt.encode_samples(samples, endian);
                assert_eq!(raw.len(), samples.len() * fmt.byte_width());
                let rt = fmt.decode_samples(&raw, endian);
                assert_eq!(&rt, samples, "{:?} {:?}", fmt, endian);
            }
        }
    }

    #[test]
    fn integer_formats_truncate_fractional_amplitudes() {
        for fmt in [SampleFormat::Int32, SampleFormat::Int16] {
            let raw = fmt.encode_samples(&[12.5, -7.75], Endian::Big);
            let rt = fmt.decode_samples(&raw, Endian::Big);
            assert_eq!(rt, vec![12.0, -7.0], "{:?}", fmt);
        }
    }
}
