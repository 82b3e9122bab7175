use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::binary_header::{BinaryHeader, BINARY_HEADER_SIZE};
use crate::byte_locs::ByteLocationSpec;
use crate::sample_format::{Endian, SampleFormat};
use crate::segy_error::SegyError;
use crate::text_header::{TextEncoding, TextHeader, TEXT_HEADER_SIZE};
use crate::trace_header::{
    FieldSelection, TraceHeader, TRACE_HEADER_SIZE, TRACE_SAMPLES_OFFSET,
};

const PROGRESS_INTERVAL: usize = 100_000;

/// Options for a header scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub endian: Endian,
    /// Number of malformed traces tolerated before the scan aborts with a
    /// partial table. The scan stops after budget+1 failures.
    pub error_budget: usize,
    /// Cross-check each trace's embedded samples-count field against the
    /// binary header.
    pub validate_trace_samples: bool,
}

impl Default for ScanOptions {
    fn default() -> ScanOptions {
        ScanOptions {
            endian: Endian::Big,
            error_budget: 0,
            validate_trace_samples: true,
        }
    }
}

/// One scanned trace: its index, where its header starts in the file, and
/// the requested header fields.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub trace_index: usize,
    pub byte_offset: u64,
    pub header: TraceHeader,
}

/// A malformed trace encountered during a scan.
#[derive(Debug)]
pub struct ScanFailure {
    pub trace_index: usize,
    pub byte_offset: u64,
    pub error: SegyError,
}

/// Result of a full-file header scan. Rows are in on-disk trace order.
#[derive(Debug)]
pub struct ScanTable {
    pub records: Vec<ScanRecord>,
    pub failures: Vec<ScanFailure>,
    /// True when the failure count exceeded the error budget and the scan
    /// stopped early.
    pub aborted: bool,
    /// Byte offset of a trailing partial trace, when the file ends mid-trace.
    pub truncated_at: Option<u64>,
    pub samples_per_trace: u16,
    pub sample_interval_us: i16,
    pub sample_format: SampleFormat,
    pub endian: Endian,
}

impl ScanTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads only the 3200-byte textual header. O(1) regardless of file size.
pub fn scrape_text_header<P: AsRef<Path>>(
    path: P,
    encoding: Option<TextEncoding>,
) -> Result<(TextHeader, TextEncoding), SegyError> {
    let mut file = File::open(path)?;
    let mut raw = vec![0u8; TEXT_HEADER_SIZE];
    file.read_exact(&mut raw)?;
    TextHeader::from_bytes(&raw, encoding)
}

/// Reads only the 400-byte binary header. O(1) regardless of file size.
pub fn scrape_binary_header<P: AsRef<Path>>(
    path: P,
    endian: Endian,
) -> Result<BinaryHeader, SegyError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(TEXT_HEADER_SIZE as u64))?;
    let mut raw = vec![0u8; BINARY_HEADER_SIZE];
    file.read_exact(&mut raw)?;
    BinaryHeader::from_bytes(&raw, endian)
}

/// Single sequential pass over every trace header in the file. Sample bytes
/// are skipped with relative seeks, never read, so peak memory stays at one
/// 240-byte header buffer no matter how many traces the file holds.
pub fn scan<P: AsRef<Path>>(
    path: P,
    spec: &ByteLocationSpec,
    fields: &[&str],
    options: &ScanOptions,
) -> Result<ScanTable, SegyError> {
    for &name in fields {
        spec.require(name)?;
    }
    let file = File::open(&path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    reader.seek(SeekFrom::Start(TEXT_HEADER_SIZE as u64))?;
    let mut bin_raw = vec![0u8; BINARY_HEADER_SIZE];
    reader.read_exact(&mut bin_raw)?;
    let bin = BinaryHeader::from_bytes(&bin_raw, options.endian)?;

    let data_start = (TEXT_HEADER_SIZE + BINARY_HEADER_SIZE) as u64
        + bin.extended_header_count.max(0) as u64 * TEXT_HEADER_SIZE as u64;
    if data_start > (TEXT_HEADER_SIZE + BINARY_HEADER_SIZE) as u64 {
        reader.seek(SeekFrom::Start(data_start))?;
    }

    let trace_len = (TRACE_HEADER_SIZE + bin.trace_data_len()) as u64;
    let body_len = file_len.saturating_sub(data_start);
    let whole_traces = (body_len / trace_len) as usize;
    let truncated_at = if body_len % trace_len != 0 {
        Some(data_start + whole_traces as u64 * trace_len)
    } else {
        None
    };

    let mut table = ScanTable {
        records: Vec::with_capacity(whole_traces),
        failures: Vec::new(),
        aborted: false,
        truncated_at,
        samples_per_trace: bin.samples_per_trace,
        sample_interval_us: bin.sample_interval_us,
        sample_format: bin.sample_format,
        endian: options.endian,
    };

    let mut header_buf = [0u8; TRACE_HEADER_SIZE];
    for trace_index in 0..whole_traces {
        let byte_offset = data_start + trace_index as u64 * trace_len;
        reader.read_exact(&mut header_buf)?;

        if options.validate_trace_samples {
            let ns = options
                .endian
                .read_u16(&header_buf[TRACE_SAMPLES_OFFSET..TRACE_SAMPLES_OFFSET + 2])?;
            if ns != 0 && ns != bin.samples_per_trace {
                table.failures.push(ScanFailure {
                    trace_index,
                    byte_offset,
                    error: SegyError::TraceSampleMismatch {
                        trace_index,
                        header_samples: ns,
                        file_samples: bin.samples_per_trace,
                    },
                });
                if table.failures.len() > options.error_budget {
                    table.aborted = true;
                    break;
                }
                reader.seek_relative(bin.trace_data_len() as i64)?;
                continue;
            }
        }

        let header = TraceHeader::from_bytes(
            &header_buf,
            spec,
            FieldSelection::Subset(fields),
            options.endian,
        )?;
        table.records.push(ScanRecord {
            trace_index,
            byte_offset,
            header,
        });
        reader.seek_relative(bin.trace_data_len() as i64)?;

        if (trace_index + 1) % PROGRESS_INTERVAL == 0 {
            debug!("scanned {} of {} traces", trace_index + 1, whole_traces);
        }
    }
    debug!(
        "scan complete: {} rows, {} failures, truncated: {}",
        table.records.len(),
        table.failures.len(),
        table.truncated_at.is_some()
    );
    Ok(table)
}

/// Byte position of one trace within the scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLocation {
    pub trace_index: usize,
    pub byte_offset: u64,
}

/// Survey geometry derived from a scan: the unique axis values plus a
/// lookup from (inline, crossline, offset) to the trace holding it.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub inlines: Vec<i32>,
    pub crosslines: Vec<i32>,
    pub offsets: Option<Vec<i32>>,
    /// True iff every axis combination has exactly one trace.
    pub regular: bool,
    lookup: HashMap<(i32, i32, i32), TraceLocation>,
}

impl Geometry {
    /// Trace location for an axis tuple, if the file holds one. Pass
    /// `None` for the offset on post-stack geometries.
    pub fn locate(&self, inline: i32, crossline: i32, offset: Option<i32>) -> Option<&TraceLocation> {
        self.lookup
            .get(&(inline, crossline, offset.unwrap_or(0)))
    }

    /// Number of tuples in the full Cartesian product of the axes.
    pub fn grid_size(&self) -> usize {
        self.inlines.len()
            * self.crosslines.len()
            * self.offsets.as_ref().map_or(1, |o| o.len())
    }

    /// Number of tuples actually present.
    pub fn trace_count(&self) -> usize {
        self.lookup.len()
    }
}

/// Collects the unique inline/crossline(/offset) values from a scan table
/// and checks the regularity invariant. A duplicate axis tuple is an error
/// listing every trace index involved, never silently resolved.
pub fn infer_geometry(
    table: &ScanTable,
    inline_field: &str,
    crossline_field: &str,
    offset_field: Option<&str>,
) -> Result<Geometry, SegyError> {
    let mut inlines = BTreeSet::new();
    let mut crosslines = BTreeSet::new();
    let mut offsets = BTreeSet::new();
    let mut lookup: HashMap<(i32, i32, i32), TraceLocation> = HashMap::new();
    let mut claims: HashMap<(i32, i32, i32), Vec<usize>> = HashMap::new();

    for record in &table.records {
        let il = record
            .header
            .get(inline_field)
            .ok_or_else(|| SegyError::UnmappedField(inline_field.to_string()))?;
        let xl = record
            .header
            .get(crossline_field)
            .ok_or_else(|| SegyError::UnmappedField(crossline_field.to_string()))?;
        let off = match offset_field {
            Some(name) => record
                .header
                .get(name)
                .ok_or_else(|| SegyError::UnmappedField(name.to_string()))?,
            None => 0,
        };
        inlines.insert(il);
        crosslines.insert(xl);
        offsets.insert(off);
        claims.entry((il, xl, off)).or_default().push(record.trace_index);
        lookup.entry((il, xl, off)).or_insert(TraceLocation {
            trace_index: record.trace_index,
            byte_offset: record.byte_offset,
        });
    }

    for ((il, xl, off), traces) in &claims {
        if traces.len() > 1 {
            return Err(SegyError::GeometryConflict {
                inline: *il,
                crossline: *xl,
                offset: *off,
                traces: traces.clone(),
            });
        }
    }

    let inlines: Vec<i32> = inlines.into_iter().collect();
    let crosslines: Vec<i32> = crosslines.into_iter().collect();
    let offsets: Option<Vec<i32>> = offset_field.map(|_| offsets.into_iter().collect());
    let product = inlines.len()
        * crosslines.len()
        * offsets.as_ref().map_or(1, |o| o.len());
    let regular = lookup.len() == product;

    Ok(Geometry {
        inlines,
        crosslines,
        offsets,
        regular,
        lookup,
    })
}

/// Builds an in-memory post-stack SEG-Y file for tests, one IEEE-float
/// trace per (inline, crossline) pair, standard_3d byte locations.
#[cfg(test)]
pub(crate) fn synthetic_segy(traces: &[(i32, i32, Vec<f32>)], samples_per_trace: u16) -> Vec<u8> {
    use crate::byte_locs::{well_known, TRACE_SEQ_FIELD};
    use std::collections::BTreeMap;

    let spec = well_known("standard_3d").unwrap();
    let text = TextHeader::default_template(&BTreeMap::new()).unwrap();
    let bin = BinaryHeader::new(SampleFormat::IeeeFloat32, samples_per_trace, 2000);
    let mut out = Vec::new();
    out.extend_from_slice(&text.to_bytes(TextEncoding::Ebcdic));
    out.extend_from_slice(&bin.to_bytes(Endian::Big));
    for (i, (il, xl, samples)) in traces.iter().enumerate() {
        let mut header = TraceHeader::new();
        header.set(TRACE_SEQ_FIELD, (i + 1) as i32);
        header.set("iline", *il);
        header.set("xline", *xl);
        header.set("cdp_x", il * 100);
        header.set("cdp_y", xl * 100);
        out.extend_from_slice(&header.to_bytes(spec, Endian::Big).unwrap());
        out.extend_from_slice(&SampleFormat::IeeeFloat32.encode_samples(samples, Endian::Big));
    }
    out
}

#[cfg(test)]
pub(crate) fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}
