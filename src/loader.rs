use log::debug;
use ndarray::{ArrayD, IxDyn};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::binary_header::{BinaryHeader, BINARY_HEADER_SIZE};
use crate::byte_locs::ByteLocationSpec;
use crate::sample_format::Endian;
use crate::scanner::Geometry;
use crate::segy_error::SegyError;
use crate::text_header::TEXT_HEADER_SIZE;
use crate::trace_header::{FieldSelection, TraceHeader, TRACE_HEADER_SIZE};

const PROGRESS_INTERVAL: usize = 100_000;

/// Element type of an array-store variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    I32,
}

/// Contract the loader writes into and the writer reads from. The core
/// never assumes an on-disk array format, only this block interface.
///
/// A block spans the whole final dimension of a variable; `index` addresses
/// the remaining leading dimensions.
pub trait ArrayStore {
    fn create_variable(
        &mut self,
        name: &str,
        dims: &[usize],
        dtype: DType,
    ) -> Result<(), SegyError>;
    fn write_block(&mut self, name: &str, index: &[usize], values: &[f32])
        -> Result<(), SegyError>;
    fn read_block(&mut self, name: &str, index: &[usize]) -> Result<Vec<f32>, SegyError>;
}

/// In-memory ArrayStore, the reference implementation used by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    vars: HashMap<String, (Vec<usize>, Vec<f32>)>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn block_start(dims: &[usize], index: &[usize]) -> Result<(usize, usize), SegyError> {
        if index.len() + 1 != dims.len() {
            return Err(SegyError::Unknown(format!(
                "block index rank {} does not match variable rank {}",
                index.len(),
                dims.len()
            )));
        }
        let block_len = dims[dims.len() - 1];
        let mut flat = 0usize;
        for (d, (&i, &n)) in index.iter().zip(dims.iter()).enumerate() {
            if i >= n {
                return Err(SegyError::Unknown(format!(
                    "block index {} out of range for dimension {} of size {}",
                    i, d, n
                )));
            }
            flat = flat * n + i;
        }
        Ok((flat * block_len, block_len))
    }
}

impl ArrayStore for MemoryStore {
    fn create_variable(
        &mut self,
        name: &str,
        dims: &[usize],
        _dtype: DType,
    ) -> Result<(), SegyError> {
        let len: usize = dims.iter().product();
        self.vars
            .insert(name.to_string(), (dims.to_vec(), vec![0.0; len]));
        Ok(())
    }

    fn write_block(
        &mut self,
        name: &str,
        index: &[usize],
        values: &[f32],
    ) -> Result<(), SegyError> {
        let (dims, data) = self
            .vars
            .get_mut(name)
            .ok_or_else(|| SegyError::Unknown(format!("no variable `{}`", name)))?;
        let (start, block_len) = MemoryStore::block_start(dims, index)?;
        if values.len() != block_len {
            return Err(SegyError::Unknown(format!(
                "block for `{}` must hold {} values, got {}",
                name,
                block_len,
                values.len()
            )));
        }
        data[start..start + block_len].copy_from_slice(values);
        Ok(())
    }

    fn read_block(&mut self, name: &str, index: &[usize]) -> Result<Vec<f32>, SegyError> {
        let (dims, data) = self
            .vars
            .get(name)
            .ok_or_else(|| SegyError::Unknown(format!("no variable `{}`", name)))?;
        let (start, block_len) = MemoryStore::block_start(dims, index)?;
        Ok(data[start..start + block_len].to_vec())
    }
}

/// Options for a geometry-aware load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub endian: Endian,
    /// Trace header fields to carry alongside the samples, broadcast over
    /// the trace dimensions.
    pub header_fields: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        LoadOptions {
            endian: Endian::Big,
            header_fields: Vec::new(),
        }
    }
}

/// Trace samples arranged on the survey grid, inline × crossline
/// (× offset) × sample. Missing tuples hold NaN and a zero presence flag.
#[derive(Debug, Clone)]
pub struct GriddedDataset {
    pub inlines: Vec<i32>,
    pub crosslines: Vec<i32>,
    pub offsets: Option<Vec<i32>>,
    pub sample_interval_us: i16,
    pub data: ArrayD<f32>,
    pub present: ArrayD<u8>,
    pub header_values: BTreeMap<String, ArrayD<i32>>,
}

impl GriddedDataset {
    pub fn samples_per_trace(&self) -> usize {
        *self.data.shape().last().unwrap()
    }

    /// The dimensions addressing a trace, without the sample axis.
    pub fn trace_dims(&self) -> &[usize] {
        let shape = self.data.shape();
        &shape[..shape.len() - 1]
    }

    pub fn is_present(&self, index: &[usize]) -> bool {
        self.present[IxDyn(index)] != 0
    }

    /// One trace's samples at a grid position.
    pub fn trace(&self, index: &[usize]) -> Vec<f32> {
        let ns = self.samples_per_trace();
        let mut full = index.to_vec();
        full.push(0);
        let mut out = Vec::with_capacity(ns);
        for t in 0..ns {
            full[index.len()] = t;
            out.push(self.data[IxDyn(&full)]);
        }
        out
    }

    /// Grid positions in canonical order: inline ascending, then crossline,
    /// then offset. Independent of the on-disk trace order.
    pub fn grid_indices(&self) -> Vec<Vec<usize>> {
        let dims = self.trace_dims().to_vec();
        let mut out = Vec::with_capacity(dims.iter().product());
        let mut index = vec![0usize; dims.len()];
        loop {
            out.push(index.clone());
            let mut axis = dims.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < dims[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }

    /// Axis values for a grid position, offset None on post-stack grids.
    pub fn axis_values(&self, index: &[usize]) -> (i32, i32, Option<i32>) {
        let il = self.inlines[index[0]];
        let xl = self.crosslines[index[1]];
        let off = self.offsets.as_ref().map(|o| o[index[2]]);
        (il, xl, off)
    }

    /// Dumps samples, presence mask and header fields into an array store.
    pub fn store_into<S: ArrayStore + ?Sized>(&self, store: &mut S) -> Result<(), SegyError> {
        let trace_dims = self.trace_dims().to_vec();
        // mask and header blocks span the final trace dimension
        let mask_block = *trace_dims.last().unwrap();
        store.create_variable("samples", self.data.shape(), DType::F32)?;
        store.create_variable("present", &trace_dims, DType::I32)?;
        for name in self.header_values.keys() {
            store.create_variable(&format!("header/{}", name), &trace_dims, DType::I32)?;
        }

        for index in self.grid_indices() {
            store.write_block("samples", &index, &self.trace(&index))?;
        }
        // mask and header blocks vary the last trace dimension
        for index in self.grid_indices() {
            if index[index.len() - 1] != 0 {
                continue;
            }
            let lead = &index[..index.len() - 1];
            let mut mask_block_vals = Vec::with_capacity(mask_block);
            let mut header_blocks: BTreeMap<&str, Vec<f32>> = self
                .header_values
                .keys()
                .map(|k| (k.as_str(), Vec::with_capacity(mask_block)))
                .collect();
            let mut full = lead.to_vec();
            full.push(0);
            for last in 0..mask_block {
                full[lead.len()] = last;
                mask_block_vals.push(self.present[IxDyn(&full)] as f32);
                for (name, values) in &self.header_values {
                    header_blocks
                        .get_mut(name.as_str())
                        .unwrap()
                        .push(values[IxDyn(&full)] as f32);
                }
            }
            store.write_block("present", lead, &mask_block_vals)?;
            for (name, block) in header_blocks {
                store.write_block(&format!("header/{}", name), lead, &block)?;
            }
        }
        Ok(())
    }

    /// Rebuilds a dataset from an array store populated by `store_into`.
    pub fn from_store<S: ArrayStore + ?Sized>(
        store: &mut S,
        inlines: Vec<i32>,
        crosslines: Vec<i32>,
        offsets: Option<Vec<i32>>,
        sample_interval_us: i16,
        samples_per_trace: usize,
        header_fields: &[&str],
    ) -> Result<GriddedDataset, SegyError> {
        let mut dims = vec![inlines.len(), crosslines.len()];
        if let Some(o) = &offsets {
            dims.push(o.len());
        }
        let mut data_dims = dims.clone();
        data_dims.push(samples_per_trace);
        let mut data = ArrayD::from_elem(IxDyn(&data_dims), f32::NAN);
        let mut present = ArrayD::zeros(IxDyn(&dims));
        let mut header_values: BTreeMap<String, ArrayD<i32>> = header_fields
            .iter()
            .map(|&name| (name.to_string(), ArrayD::zeros(IxDyn(&dims))))
            .collect();

        let dataset_dims = dims.clone();
        let lead_dims = &dataset_dims[..dataset_dims.len() - 1];
        let mask_block = *dataset_dims.last().unwrap();

        let mut lead = vec![0usize; lead_dims.len()];
        loop {
            let mask_vals = store.read_block("present", &lead)?;
            let header_blocks: BTreeMap<String, Vec<f32>> = header_fields
                .iter()
                .map(|&name| {
                    store
                        .read_block(&format!("header/{}", name), &lead)
                        .map(|b| (name.to_string(), b))
                })
                .collect::<Result<_, _>>()?;
            let mut full = lead.clone();
            full.push(0);
            for last in 0..mask_block {
                full[lead.len()] = last;
                present[IxDyn(&full)] = mask_vals[last] as u8;
                for (name, block) in &header_blocks {
                    header_values.get_mut(name).unwrap()[IxDyn(&full)] = block[last] as i32;
                }
                let samples = store.read_block("samples", &full)?;
                let mut sample_idx = full.clone();
                sample_idx.push(0);
                for (t, &v) in samples.iter().enumerate() {
                    sample_idx[full.len()] = t;
                    data[IxDyn(&sample_idx)] = v;
                }
            }
            // advance the leading index odometer-style
            let mut axis = lead.len();
            loop {
                if axis == 0 {
                    return Ok(GriddedDataset {
                        inlines,
                        crosslines,
                        offsets,
                        sample_interval_us,
                        data,
                        present,
                        header_values,
                    });
                }
                axis -= 1;
                lead[axis] += 1;
                if lead[axis] < lead_dims[axis] {
                    break;
                }
                lead[axis] = 0;
            }
        }
    }
}

/// Reads trace samples for every geometry tuple into a gridded array.
/// Tuples are visited inline ascending, then crossline, then offset; the
/// trace bytes are located through the geometry's scan offsets, so the
/// on-disk order does not matter. Missing tuples are left as NaN with a
/// zero presence flag.
pub fn load<P: AsRef<Path>>(
    path: P,
    geometry: &Geometry,
    spec: &ByteLocationSpec,
    options: &LoadOptions,
) -> Result<GriddedDataset, SegyError> {
    for name in &options.header_fields {
        spec.require(name)?;
    }
    let file = File::open(&path)?;
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(TEXT_HEADER_SIZE as u64))?;
    let mut bin_raw = vec![0u8; BINARY_HEADER_SIZE];
    reader.read_exact(&mut bin_raw)?;
    let bin = BinaryHeader::from_bytes(&bin_raw, options.endian)?;
    let ns = bin.samples_per_trace as usize;
    let data_len = bin.trace_data_len();

    let mut dims = vec![geometry.inlines.len(), geometry.crosslines.len()];
    if let Some(o) = &geometry.offsets {
        dims.push(o.len());
    }
    let mut data_dims = dims.clone();
    data_dims.push(ns);
    let mut data = ArrayD::from_elem(IxDyn(&data_dims), f32::NAN);
    let mut present: ArrayD<u8> = ArrayD::zeros(IxDyn(&dims));
    let mut header_values: BTreeMap<String, ArrayD<i32>> = options
        .header_fields
        .iter()
        .map(|name| (name.clone(), ArrayD::zeros(IxDyn(&dims))))
        .collect();

    let field_refs: Vec<&str> = options.header_fields.iter().map(|s| s.as_str()).collect();
    let mut header_buf = [0u8; TRACE_HEADER_SIZE];
    let mut sample_buf = vec![0u8; data_len];
    let offsets_axis: Vec<Option<i32>> = match &geometry.offsets {
        Some(o) => o.iter().map(|&v| Some(v)).collect(),
        None => vec![None],
    };

    let mut loaded = 0usize;
    for (i, &il) in geometry.inlines.iter().enumerate() {
        for (j, &xl) in geometry.crosslines.iter().enumerate() {
            for (k, &off) in offsets_axis.iter().enumerate() {
                let location = match geometry.locate(il, xl, off) {
                    Some(loc) => *loc,
                    None => continue,
                };
                let mut index = vec![i, j];
                if geometry.offsets.is_some() {
                    index.push(k);
                }
                reader.seek(SeekFrom::Start(location.byte_offset))?;
                reader.read_exact(&mut header_buf).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        SegyError::Truncated {
                            offset: location.byte_offset,
                            trace_index: location.trace_index,
                        }
                    } else {
                        SegyError::IOError(e)
                    }
                })?;
                if !field_refs.is_empty() {
                    let header = TraceHeader::from_bytes(
                        &header_buf,
                        spec,
                        FieldSelection::Subset(&field_refs),
                        options.endian,
                    )?;
                    for name in &options.header_fields {
                        header_values.get_mut(name).unwrap()[IxDyn(&index)] =
                            header.get(name).unwrap_or(0);
                    }
                }
                reader.read_exact(&mut sample_buf).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        SegyError::Truncated {
                            offset: location.byte_offset + TRACE_HEADER_SIZE as u64,
                            trace_index: location.trace_index,
                        }
                    } else {
                        SegyError::IOError(e)
                    }
                })?;
                let samples = bin.sample_format.decode_samples(&sample_buf, options.endian);
                let mut sample_idx = index.clone();
                sample_idx.push(0);
                for (t, &v) in samples.iter().enumerate() {
                    sample_idx[index.len()] = t;
                    data[IxDyn(&sample_idx)] = v;
                }
                present[IxDyn(&index)] = 1;
                loaded += 1;
                if loaded % PROGRESS_INTERVAL == 0 {
                    debug!("loaded {} traces", loaded);
                }
            }
        }
    }
    debug!("load complete: {} of {} tuples", loaded, geometry.grid_size());

    Ok(GriddedDataset {
        inlines: geometry.inlines.clone(),
        crosslines: geometry.crosslines.clone(),
        offsets: geometry.offsets.clone(),
        sample_interval_us: bin.sample_interval_us,
        data,
        present,
        header_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_locs::well_known;
    use crate::sample_format::SampleFormat;
    use crate::scanner::{infer_geometry, scan, synthetic_segy, write_temp, ScanOptions};

    fn grid_traces() -> Vec<(i32, i32, Vec<f32>)> {
        let mut traces = Vec::new();
        for il in [1, 2] {
            for xl in [10, 11, 12, 13, 14] {
                let samples: Vec<f32> = (0..8).map(|t| (il * 1000 + xl * 10 + t) as f32).collect();
                traces.push((il, xl, samples));
            }
        }
        traces
    }

    #[test]
    fn load_matches_directly_decoded_traces() {
        let bytes = synthetic_segy(&grid_traces(), 8);
        let file = write_temp(&bytes);
        let spec = well_known("standard_3d").unwrap();
        let table = scan(
            file.path(),
            spec,
            &["iline", "xline"],
            &ScanOptions::default(),
        )
        .unwrap();
        let geometry = infer_geometry(&table, "iline", "xline", None).unwrap();
        let dataset = load(file.path(), &geometry, spec, &LoadOptions::default()).unwrap();

        assert_eq!(dataset.data.shape(), &[2, 5, 8]);
        for record in &table.records {
            let il = record.header.get("iline").unwrap();
            let xl = record.header.get("xline").unwrap();
            let i = geometry.inlines.iter().position(|&v| v == il).unwrap();
            let j = geometry.crosslines.iter().position(|&v| v == xl).unwrap();
            // decode the trace bytes directly at the scan offset
            let start = record.byte_offset as usize + TRACE_HEADER_SIZE;
            let raw = &bytes[start..start + 32];
            let direct = SampleFormat::IeeeFloat32.decode_samples(raw, Endian::Big);
            assert_eq!(dataset.trace(&[i, j]), direct);
            assert!(dataset.is_present(&[i, j]));
        }
    }

    #[test]
    fn load_fills_missing_tuples_with_nan() {
        let mut traces = grid_traces();
        traces.remove(7); // drop (2, 12)
        let file = write_temp(&synthetic_segy(&traces, 8));
        let spec = well_known("standard_3d").unwrap();
        let table = scan(
            file.path(),
            spec,
            &["iline", "xline"],
            &ScanOptions::default(),
        )
        .unwrap();
        let geometry = infer_geometry(&table, "iline", "xline", None).unwrap();
        assert!(!geometry.regular);
        let dataset = load(file.path(), &geometry, spec, &LoadOptions::default()).unwrap();
        assert!(!dataset.is_present(&[1, 2]));
        assert!(dataset.trace(&[1, 2]).iter().all(|v| v.is_nan()));
        assert!(dataset.is_present(&[1, 3]));
    }

    #[test]
    fn load_carries_header_fields() {
        let file = write_temp(&synthetic_segy(&grid_traces(), 8));
        let spec = well_known("standard_3d").unwrap();
        let table = scan(
            file.path(),
            spec,
            &["iline", "xline"],
            &ScanOptions::default(),
        )
        .unwrap();
        let geometry = infer_geometry(&table, "iline", "xline", None).unwrap();
        let options = LoadOptions {
            header_fields: vec!["cdp_x".to_string(), "cdp_y".to_string()],
            ..LoadOptions::default()
        };
        let dataset = load(file.path(), &geometry, spec, &options).unwrap();
        let cdp_x = &dataset.header_values["cdp_x"];
        assert_eq!(cdp_x[IxDyn(&[0, 0])], 100);
        assert_eq!(cdp_x[IxDyn(&[1, 4])], 200);
        let cdp_y = &dataset.header_values["cdp_y"];
        assert_eq!(cdp_y[IxDyn(&[0, 3])], 1300);
    }

    #[test]
    fn memory_store_round_trip() {
        let file = write_temp(&synthetic_segy(&grid_traces(), 8));
        let spec = well_known("standard_3d").unwrap();
        let table = scan(
            file.path(),
            spec,
            &["iline", "xline"],
            &ScanOptions::default(),
        )
        .unwrap();
        let geometry = infer_geometry(&table, "iline", "xline", None).unwrap();
        let options = LoadOptions {
            header_fields: vec!["cdp_x".to_string()],
            ..LoadOptions::default()
        };
        let dataset = load(file.path(), &geometry, spec, &options).unwrap();

        let mut store = MemoryStore::new();
        dataset.store_into(&mut store).unwrap();
        let rt = GriddedDataset::from_store(
            &mut store,
            dataset.inlines.clone(),
            dataset.crosslines.clone(),
            None,
            dataset.sample_interval_us,
            8,
            &["cdp_x"],
        )
        .unwrap();
        assert_eq!(rt.data, dataset.data);
        assert_eq!(rt.present, dataset.present);
        assert_eq!(rt.header_values["cdp_x"], dataset.header_values["cdp_x"]);
    }

    #[test]
    fn memory_store_rejects_bad_blocks() {
        let mut store = MemoryStore::new();
        store.create_variable("v", &[2, 3], DType::F32).unwrap();
        assert!(store.write_block("v", &[0], &[1.0, 2.0, 3.0]).is_ok());
        assert!(store.write_block("v", &[2], &[1.0, 2.0, 3.0]).is_err());
        assert!(store.write_block("v", &[0], &[1.0]).is_err());
        assert!(store.read_block("w", &[0]).is_err());
        assert_eq!(store.read_block("v", &[0]).unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
