use std::fmt;

use crate::sample_format::{Endian, SampleFormat};
use crate::segy_error::SegyError;

/// Size in bytes of the binary file header, directly after the textual header.
pub const BINARY_HEADER_SIZE: usize = 400;

/// The typed fields of the 400-byte binary file header. Reserved bytes are
/// ignored on read and zero-filled on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryHeader {
    pub job_id: i32,
    pub line_number: i32,
    pub reel_number: i32,
    pub traces_per_ensemble: i16,
    pub aux_traces_per_ensemble: i16,
    pub sample_interval_us: i16,
    pub sample_interval_original_us: i16,
    pub samples_per_trace: u16,
    pub samples_per_trace_original: u16,
    pub sample_format: SampleFormat,
    pub ensemble_fold: i16,
    pub trace_sorting_code: i16,
    pub measurement_system: i16,
    pub segy_revision: u16,
    pub fixed_length_traces: i16,
    pub extended_header_count: i16,
}

// field offsets within the 400-byte block
const JOB_ID: usize = 0;
const LINE_NUMBER: usize = 4;
const REEL_NUMBER: usize = 8;
const TRACES_PER_ENSEMBLE: usize = 12;
const AUX_TRACES_PER_ENSEMBLE: usize = 14;
const SAMPLE_INTERVAL: usize = 16;
const SAMPLE_INTERVAL_ORIGINAL: usize = 18;
const SAMPLES_PER_TRACE: usize = 20;
const SAMPLES_PER_TRACE_ORIGINAL: usize = 22;
const SAMPLE_FORMAT: usize = 24;
const ENSEMBLE_FOLD: usize = 26;
const TRACE_SORTING: usize = 28;
const MEASUREMENT_SYSTEM: usize = 54;
const SEGY_REVISION: usize = 300;
const FIXED_LENGTH_TRACES: usize = 302;
const EXTENDED_HEADER_COUNT: usize = 304;

impl BinaryHeader {
    /// Minimal header for writing: rev 1, trace sorting left at 0.
    pub fn new(
        sample_format: SampleFormat,
        samples_per_trace: u16,
        sample_interval_us: i16,
    ) -> BinaryHeader {
        BinaryHeader {
            job_id: 0,
            line_number: 0,
            reel_number: 1,
            traces_per_ensemble: 0,
            aux_traces_per_ensemble: 0,
            sample_interval_us,
            sample_interval_original_us: sample_interval_us,
            samples_per_trace,
            samples_per_trace_original: samples_per_trace,
            sample_format,
            ensemble_fold: 0,
            trace_sorting_code: 0,
            measurement_system: 1,
            segy_revision: 0x0100,
            fixed_length_traces: 1,
            extended_header_count: 0,
        }
    }

    /// Decodes the binary file header.
    pub fn from_bytes(raw: &[u8], endian: Endian) -> Result<BinaryHeader, SegyError> {
        if raw.len() != BINARY_HEADER_SIZE {
            return Err(SegyError::HeaderSize(BINARY_HEADER_SIZE, raw.len()));
        }
        let format_code = endian.read_i16(&raw[SAMPLE_FORMAT..])?;
        let sample_format = SampleFormat::from_code(format_code)?;
        let segy_revision = endian.read_u16(&raw[SEGY_REVISION..])?;
        if segy_revision >> 8 > 2 {
            return Err(SegyError::UnsupportedRevision(segy_revision));
        }
        let sample_interval_us = endian.read_i16(&raw[SAMPLE_INTERVAL..])?;
        if sample_interval_us <= 0 {
            return Err(SegyError::HeaderFormat(format!(
                "sample interval must be positive, was {}",
                sample_interval_us
            )));
        }
        let samples_per_trace = endian.read_u16(&raw[SAMPLES_PER_TRACE..])?;
        if samples_per_trace == 0 {
            return Err(SegyError::HeaderFormat(
                "samples per trace must be positive".to_string(),
            ));
        }
        Ok(BinaryHeader {
            job_id: endian.read_i32(&raw[JOB_ID..])?,
            line_number: endian.read_i32(&raw[LINE_NUMBER..])?,
            reel_number: endian.read_i32(&raw[REEL_NUMBER..])?,
            traces_per_ensemble: endian.read_i16(&raw[TRACES_PER_ENSEMBLE..])?,
            aux_traces_per_ensemble: endian.read_i16(&raw[AUX_TRACES_PER_ENSEMBLE..])?,
            sample_interval_us,
            sample_interval_original_us: endian.read_i16(&raw[SAMPLE_INTERVAL_ORIGINAL..])?,
            samples_per_trace,
            samples_per_trace_original: endian.read_u16(&raw[SAMPLES_PER_TRACE_ORIGINAL..])?,
            sample_format,
            ensemble_fold: endian.read_i16(&raw[ENSEMBLE_FOLD..])?,
            trace_sorting_code: endian.read_i16(&raw[TRACE_SORTING..])?,
            measurement_system: endian.read_i16(&raw[MEASUREMENT_SYSTEM..])?,
            segy_revision,
            fixed_length_traces: endian.read_i16(&raw[FIXED_LENGTH_TRACES..])?,
            extended_header_count: endian.read_i16(&raw[EXTENDED_HEADER_COUNT..])?,
        })
    }

    /// Encodes to the 400-byte on-disk form.
    pub fn to_bytes(&self, endian: Endian) -> Vec<u8> {
        let mut raw = vec![0u8; BINARY_HEADER_SIZE];
        put_i32(&mut raw, JOB_ID, self.job_id, endian);
        put_i32(&mut raw, LINE_NUMBER, self.line_number, endian);
        put_i32(&mut raw, REEL_NUMBER, self.reel_number, endian);
        put_i16(&mut raw, TRACES_PER_ENSEMBLE, self.traces_per_ensemble, endian);
        put_i16(
            &mut raw,
            AUX_TRACES_PER_ENSEMBLE,
            self.aux_traces_per_ensemble,
            endian,
        );
        put_i16(&mut raw, SAMPLE_INTERVAL, self.sample_interval_us, endian);
        put_i16(
            &mut raw,
            SAMPLE_INTERVAL_ORIGINAL,
            self.sample_interval_original_us,
            endian,
        );
        put_u16(&mut raw, SAMPLES_PER_TRACE, self.samples_per_trace, endian);
        put_u16(
            &mut raw,
            SAMPLES_PER_TRACE_ORIGINAL,
            self.samples_per_trace_original,
            endian,
        );
        put_i16(&mut raw, SAMPLE_FORMAT, self.sample_format.code(), endian);
        put_i16(&mut raw, ENSEMBLE_FOLD, self.ensemble_fold, endian);
        put_i16(&mut raw, TRACE_SORTING, self.trace_sorting_code, endian);
        put_i16(&mut raw, MEASUREMENT_SYSTEM, self.measurement_system, endian);
        put_u16(&mut raw, SEGY_REVISION, self.segy_revision, endian);
        put_i16(&mut raw, FIXED_LENGTH_TRACES, self.fixed_length_traces, endian);
        put_i16(
            &mut raw,
            EXTENDED_HEADER_COUNT,
            self.extended_header_count,
            endian,
        );
        raw
    }

    /// Bytes occupied on disk by one trace's samples.
    pub fn trace_data_len(&self) -> usize {
        self.samples_per_trace as usize * self.sample_format.byte_width()
    }
}

impl fmt::Display for BinaryHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "SEG-Y rev {}.{}",
            self.segy_revision >> 8,
            self.segy_revision & 0xff
        )?;
        writeln!(f, "      samples per trace: {}", self.samples_per_trace)?;
        writeln!(f, "   sample interval (us): {}", self.sample_interval_us)?;
        writeln!(f, "          sample format: {}", self.sample_format)?;
        write!(f, "     trace sorting code: {}", self.trace_sorting_code)
    }
}

fn put_i16(buf: &mut [u8], offset: usize, v: i16, endian: Endian) {
    let bytes = match endian {
        Endian::Big => v.to_be_bytes(),
        Endian::Little => v.to_le_bytes(),
    };
    buf[offset..offset + 2].copy_from_slice(&bytes);
}

fn put_u16(buf: &mut [u8], offset: usize, v: u16, endian: Endian) {
    let bytes = match endian {
        Endian::Big => v.to_be_bytes(),
        Endian::Little => v.to_le_bytes(),
    };
    buf[offset..offset + 2].copy_from_slice(&bytes);
}

fn put_i32(buf: &mut [u8], offset: usize, v: i32, endian: Endian) {
    let bytes = match endian {
        Endian::Big => v.to_be_bytes(),
        Endian::Little => v.to_le_bytes(),
    };
    buf[offset..offset + 4].copy_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_header() -> BinaryHeader {
        let mut h = BinaryHeader::new(SampleFormat::IeeeFloat32, 500, 2000);
        h.job_id = 42;
        h.line_number = 7;
        h.trace_sorting_code = 4;
        h.ensemble_fold = 30;
        h
    }

    #[test]
    fn round_trip_big_endian() {
        let header = dummy_header();
        let raw = header.to_bytes(Endian::Big);
        assert_eq!(raw.len(), BINARY_HEADER_SIZE);
        let rt = BinaryHeader::from_bytes(&raw, Endian::Big).unwrap();
        assert_eq!(rt, header);
    }

    #[test]
    fn round_trip_little_endian() {
        let header = dummy_header();
        let raw = header.to_bytes(Endian::Little);
        let rt = BinaryHeader::from_bytes(&raw, Endian::Little).unwrap();
        assert_eq!(rt, header);
    }

    #[test]
    fn decode_field_offsets() {
        let raw = dummy_header().to_bytes(Endian::Big);
        // spot check the on-disk layout directly
        assert_eq!(i32::from_be_bytes(raw[0..4].try_into().unwrap()), 42);
        assert_eq!(i16::from_be_bytes(raw[16..18].try_into().unwrap()), 2000);
        assert_eq!(u16::from_be_bytes(raw[20..22].try_into().unwrap()), 500);
        assert_eq!(i16::from_be_bytes(raw[24..26].try_into().unwrap()), 5);
        assert_eq!(u16::from_be_bytes(raw[300..302].try_into().unwrap()), 0x0100);
    }

    #[test]
    fn wrong_size_rejected() {
        let raw = vec![0u8; 399];
        assert!(matches!(
            BinaryHeader::from_bytes(&raw, Endian::Big),
            Err(SegyError::HeaderSize(BINARY_HEADER_SIZE, 399))
        ));
    }

    #[test]
    fn unknown_format_rejected() {
        let mut raw = dummy_header().to_bytes(Endian::Big);
        raw[24] = 0;
        raw[25] = 9;
        assert!(matches!(
            BinaryHeader::from_bytes(&raw, Endian::Big),
            Err(SegyError::UnsupportedFormat(9))
        ));
    }

    #[test]
    fn unknown_revision_rejected() {
        let mut raw = dummy_header().to_bytes(Endian::Big);
        raw[300] = 3;
        assert!(matches!(
            BinaryHeader::from_bytes(&raw, Endian::Big),
            Err(SegyError::UnsupportedRevision(_))
        ));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut raw = dummy_header().to_bytes(Endian::Big);
        raw[16] = 0;
        raw[17] = 0;
        assert!(matches!(
            BinaryHeader::from_bytes(&raw, Endian::Big),
            Err(SegyError::HeaderFormat(_))
        ));
    }

    #[test]
    fn trace_data_len() {
        let header = dummy_header();
        assert_eq!(header.trace_data_len(), 2000);
    }
}
