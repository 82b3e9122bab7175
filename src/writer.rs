use log::debug;
use ndarray::IxDyn;
use std::fs::OpenOptions;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::binary_header::BinaryHeader;
use crate::byte_locs::{ByteLocationSpec, TRACE_SEQ_FIELD};
use crate::loader::GriddedDataset;
use crate::sample_format::Endian;
use crate::segy_error::SegyError;
use crate::text_header::{TextEncoding, TextHeader, TEXT_HEADER_SIZE};
use crate::trace_header::TraceHeader;

/// What to emit for grid positions with no trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Leave missing tuples out entirely (sparse file).
    SkipMissing,
    /// Emit a zero-filled trace for every tuple.
    ZeroFill,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub endian: Endian,
    pub mode: WriteMode,
    pub text_encoding: TextEncoding,
}

impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            endian: Endian::Big,
            mode: WriteMode::ZeroFill,
            text_encoding: TextEncoding::Ebcdic,
        }
    }
}

/// Serializes a gridded dataset back to a SEG-Y file, one trace per grid
/// position in canonical order (inline ascending, then crossline, then
/// offset). The output is staged in a temporary file next to `path` and
/// persisted only when every byte has been written, so a failed write never
/// leaves a partial SEG-Y file behind.
pub fn write<P: AsRef<Path>>(
    dataset: &GriddedDataset,
    text_header: &TextHeader,
    binary_header: &BinaryHeader,
    spec: &ByteLocationSpec,
    path: P,
    options: &WriteOptions,
) -> Result<(), SegyError> {
    spec.get("iline")
        .ok_or_else(|| SegyError::IncompleteMetadata("iline".to_string()))?;
    spec.get("xline")
        .ok_or_else(|| SegyError::IncompleteMetadata("xline".to_string()))?;
    if dataset.offsets.is_some() && !spec.contains("offset") {
        return Err(SegyError::IncompleteMetadata("offset".to_string()));
    }

    let path = path.as_ref();
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let temp = match dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };
    let mut buf = BufWriter::new(temp);

    // reconcile the binary header with the dataset shape
    let mut bin = binary_header.clone();
    bin.samples_per_trace = dataset.samples_per_trace() as u16;
    bin.samples_per_trace_original = bin.samples_per_trace;
    bin.sample_interval_us = dataset.sample_interval_us;
    bin.extended_header_count = 0;

    buf.write_all(&text_header.to_bytes(options.text_encoding))?;
    buf.write_all(&bin.to_bytes(options.endian))?;

    let zero_trace = vec![0.0f32; dataset.samples_per_trace()];
    let mut written = 0usize;
    for index in dataset.grid_indices() {
        let present = dataset.is_present(&index);
        if !present && options.mode == WriteMode::SkipMissing {
            continue;
        }
        let (il, xl, off) = dataset.axis_values(&index);
        let mut header = TraceHeader::new();
        header.set("iline", il);
        header.set("xline", xl);
        if let Some(off) = off {
            header.set("offset", off);
        }
        // stored header fields win where the spec maps them
        for (name, values) in &dataset.header_values {
            if spec.contains(name) {
                header.set(name, values[IxDyn(&index)]);
            }
        }
        if spec.contains(TRACE_SEQ_FIELD) && header.get(TRACE_SEQ_FIELD).is_none() {
            header.set(TRACE_SEQ_FIELD, (written + 1) as i32);
        }
        buf.write_all(&header.to_bytes(spec, options.endian)?)?;

        let samples = if present {
            dataset.trace(&index)
        } else {
            zero_trace.clone()
        };
        buf.write_all(&bin.sample_format.encode_samples(&samples, options.endian))?;
        written += 1;
    }

    let temp = buf
        .into_inner()
        .map_err(|e| SegyError::IOError(e.into_error()))?;
    temp.persist(path).map_err(|e| SegyError::IOError(e.error))?;
    debug!("wrote {} traces to {}", written, path.display());
    Ok(())
}

/// Replaces the 3200-byte textual header of an existing SEG-Y file in
/// place, leaving everything else untouched.
pub fn replace_text_header<P: AsRef<Path>>(
    path: P,
    text_header: &TextHeader,
    encoding: TextEncoding,
) -> Result<(), SegyError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len < TEXT_HEADER_SIZE as u64 {
        return Err(SegyError::HeaderSize(TEXT_HEADER_SIZE, len as usize));
    }
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&text_header.to_bytes(encoding))?;
    Ok(())
}
