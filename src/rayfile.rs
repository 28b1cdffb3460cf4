//! Binary ray-trace (LTRF) import.
//!
//! Layout, all little-endian:
//!
//! ```text
//! "LTRF"                                        4-byte signature
//! major minor data_type far_field color length  6 x i32
//! x0 y0 z0 flux                                 4 x f32
//! x y z l m n power wavelength                  8 x f32 per ray, repeated
//! "LTRFEND"                                     trailer
//! ```
//!
//! Only files with `color_info == 2` (per-ray wavelength) are read. The rays
//! can be binned into a power grid over their x/z extent and fed to the
//! solver as planar illumination.

use std::path::Path;

use ndarray::Array2;
use nom::multi::count;
use nom::number::complete::{le_f32, le_i32};
use nom::IResult;
use nom::Parser;
use tracing::debug;

use crate::error::{PvError, Result};

const SIGNATURE: &[u8] = b"LTRF";
const TRAILER: &[u8] = b"LTRFEND";
const RECORD_BYTES: usize = 32;
const SUPPORTED_COLOR_INFO: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHeader {
    pub major_version: i32,
    pub minor_version: i32,
    pub data_type: i32,
    pub far_field: i32,
    pub color_info: i32,
    pub length_units: i32,
    pub origin: [f32; 3],
    pub flux: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub l: f32,
    pub m: f32,
    pub n: f32,
    pub power: f32,
    pub wavelength: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RayFile {
    pub header: RayHeader,
    pub rays: Vec<Ray>,
}

fn header_fields(input: &[u8]) -> IResult<&[u8], RayHeader> {
    let (input, (major_version, minor_version, data_type, far_field, color_info, length_units)) =
        (le_i32, le_i32, le_i32, le_i32, le_i32, le_i32).parse(input)?;
    let (input, (x0, y0, z0, flux)) = (le_f32, le_f32, le_f32, le_f32).parse(input)?;
    Ok((
        input,
        RayHeader {
            major_version,
            minor_version,
            data_type,
            far_field,
            color_info,
            length_units,
            origin: [x0, y0, z0],
            flux,
        },
    ))
}

fn ray_record(input: &[u8]) -> IResult<&[u8], Ray> {
    let (input, v) = count(le_f32, 8).parse(input)?;
    Ok((
        input,
        Ray {
            x: v[0],
            y: v[1],
            z: v[2],
            l: v[3],
            m: v[4],
            n: v[5],
            power: v[6],
            wavelength: v[7],
        },
    ))
}

impl RayFile {
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(body) = data.strip_prefix(SIGNATURE) else {
            return Err(PvError::UnsupportedFormat("missing LTRF signature".into()));
        };
        let (mut rest, header) = header_fields(body)
            .map_err(|_| PvError::UnsupportedFormat("truncated ray file header".into()))?;
        if header.color_info != SUPPORTED_COLOR_INFO {
            return Err(PvError::UnsupportedFormat(format!(
                "color_info {} (only {} is supported)",
                header.color_info, SUPPORTED_COLOR_INFO
            )));
        }

        let mut rays = Vec::new();
        while !rest.starts_with(TRAILER) {
            if rest.len() < RECORD_BYTES {
                return Err(PvError::UnsupportedFormat(format!(
                    "ray file ends after {} records without trailer",
                    rays.len()
                )));
            }
            let (next, ray) = ray_record(rest)
                .map_err(|_| PvError::UnsupportedFormat("malformed ray record".into()))?;
            rays.push(ray);
            rest = next;
        }
        debug!(rays = rays.len(), version = header.major_version, "ray file parsed");
        Ok(Self { header, rays })
    }

    /// Distinct wavelengths, ascending.
    pub fn wavelengths(&self) -> Vec<f32> {
        let mut w: Vec<f32> = self.rays.iter().map(|r| r.wavelength).collect();
        w.sort_by(f32::total_cmp);
        w.dedup();
        w
    }

    /// Sum ray power into an `r_pixels x c_pixels` grid spanning the x (rows)
    /// and z (columns) extent of the rays.
    pub fn bin_power(&self, r_pixels: usize, c_pixels: usize) -> Result<Array2<f64>> {
        if r_pixels == 0 || c_pixels == 0 {
            return Err(PvError::Config("ray binning grid must be non-empty".into()));
        }
        let mut grid = Array2::zeros((r_pixels, c_pixels));
        if self.rays.is_empty() {
            return Ok(grid);
        }

        let (x_min, x_max) = extent(self.rays.iter().map(|r| r.x));
        let (z_min, z_max) = extent(self.rays.iter().map(|r| r.z));
        for ray in &self.rays {
            let i = bin(ray.x, x_min, x_max, r_pixels);
            let j = bin(ray.z, z_min, z_max, c_pixels);
            grid[[i, j]] += f64::from(ray.power);
        }
        Ok(grid)
    }
}

fn extent(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// The maximum lands in the last bin.
fn bin(v: f32, lo: f32, hi: f32, n: usize) -> usize {
    let span = hi - lo;
    if span <= 0.0 {
        return 0;
    }
    let k = ((v - lo) / span * n as f32).floor() as usize;
    k.min(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn file_bytes(color_info: i32, rays: &[[f32; 8]], trailer: bool) -> Vec<u8> {
        let mut out = SIGNATURE.to_vec();
        for v in [1, 0, 0, 0, color_info, 3] {
            out.extend_from_slice(&i32::to_le_bytes(v));
        }
        for v in [0.0f32, 0.0, 0.0, 1.5] {
            out.extend_from_slice(&f32::to_le_bytes(v));
        }
        for ray in rays {
            for v in ray {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        if trailer {
            out.extend_from_slice(TRAILER);
        }
        out
    }

    fn ray(x: f32, z: f32, power: f32, wavelength: f32) -> [f32; 8] {
        [x, 0.0, z, 0.0, 1.0, 0.0, power, wavelength]
    }

    #[test]
    fn test_parse_header_and_records() {
        let bytes = file_bytes(2, &[ray(0.0, 0.0, 1.0, 500.0), ray(1.0, 2.0, 2.0, 400.0)], true);
        let file = RayFile::parse(&bytes).unwrap();
        assert_eq!(file.header.major_version, 1);
        assert_eq!(file.header.length_units, 3);
        assert_eq!(file.header.flux, 1.5);
        assert_eq!(file.rays.len(), 2);
        assert_eq!(file.rays[1].z, 2.0);
        assert_eq!(file.wavelengths(), vec![400.0, 500.0]);
    }

    #[test]
    fn test_empty_body() {
        let file = RayFile::parse(&file_bytes(2, &[], true)).unwrap();
        assert!(file.rays.is_empty());
        assert_eq!(file.bin_power(2, 2).unwrap().sum(), 0.0);
    }

    #[test]
    fn test_bad_signature_is_unsupported() {
        let mut bytes = file_bytes(2, &[], true);
        bytes[0] = b'X';
        assert!(matches!(RayFile::parse(&bytes), Err(PvError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_other_color_info_is_unsupported() {
        let bytes = file_bytes(1, &[ray(0.0, 0.0, 1.0, 500.0)], true);
        assert!(matches!(RayFile::parse(&bytes), Err(PvError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_trailer_is_unsupported() {
        let bytes = file_bytes(2, &[ray(0.0, 0.0, 1.0, 500.0)], false);
        assert!(matches!(RayFile::parse(&bytes), Err(PvError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_bin_power_corners() {
        let rays = [
            ray(0.0, 0.0, 1.0, 500.0),
            ray(10.0, 10.0, 2.0, 500.0),
            ray(10.0, 0.0, 4.0, 500.0),
            ray(0.1, 0.1, 0.5, 500.0),
        ];
        let file = RayFile::parse(&file_bytes(2, &rays, true)).unwrap();
        let grid = file.bin_power(2, 2).unwrap();
        assert_abs_diff_eq!(grid[[0, 0]], 1.5);
        assert_abs_diff_eq!(grid[[1, 1]], 2.0);
        assert_abs_diff_eq!(grid[[1, 0]], 4.0);
        assert_abs_diff_eq!(grid.sum(), 7.5);
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rays.ray");
        std::fs::write(&path, file_bytes(2, &[ray(0.0, 0.0, 1.0, 500.0)], true)).unwrap();
        assert_eq!(RayFile::read(&path).unwrap().rays.len(), 1);
    }
}
