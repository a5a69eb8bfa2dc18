//! Reader for NumPy `.npy` matrices.
//!
//! Only what the offline pipeline writes is accepted: two-dimensional,
//! C-ordered, little-endian `float32` or `float64`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::LoadError;

const ARTIFACT: &str = "embedding matrix";
const MAGIC: &[u8] = b"\x93NUMPY";

static DESCR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'descr'\s*:\s*'([^']+)'").expect("descr pattern is valid"));
static FORTRAN_ORDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'fortran_order'\s*:\s*(True|False)").expect("fortran_order pattern is valid")
});
static SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").expect("shape pattern is valid"));

/// Dense row-major matrix of `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

pub fn read_npy(path: &Path) -> Result<Matrix, LoadError> {
    let bytes = std::fs::read(path).map_err(|err| LoadError::Missing {
        artifact: ARTIFACT,
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    parse_npy(&bytes)
}

pub fn parse_npy(bytes: &[u8]) -> Result<Matrix, LoadError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(corrupt("missing NPY magic string"));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(corrupt(&format!("unsupported NPY version {major}"))),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .ok_or_else(|| corrupt("truncated or non-UTF-8 header"))?;

    let descr = capture(&DESCR, header, "descr")?;
    let item_size = match descr {
        "<f4" => 4,
        "<f8" => 8,
        other => {
            return Err(schema(&format!(
                "dtype `{other}` is not little-endian float32/float64"
            )));
        }
    };

    if capture(&FORTRAN_ORDER, header, "fortran_order")? == "True" {
        return Err(schema("Fortran-ordered arrays are not supported"));
    }

    let dims = capture(&SHAPE, header, "shape")?
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| corrupt(&format!("invalid shape dimension `{dim}`")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let &[rows, cols] = dims.as_slice() else {
        return Err(schema(&format!(
            "expected a 2-D matrix, found {} dimensions",
            dims.len()
        )));
    };

    let data = &bytes[data_start..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(item_size))
        .ok_or_else(|| corrupt("shape overflows"))?;
    if data.len() != expected {
        return Err(corrupt(&format!(
            "expected {expected} data bytes for shape ({rows}, {cols}), found {}",
            data.len()
        )));
    }

    let data = if item_size == 4 {
        decode_f32(data)
    } else {
        data.chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect()
    };

    Ok(Matrix { rows, cols, data })
}

fn decode_f32(data: &[u8]) -> Vec<f32> {
    if cfg!(target_endian = "little")
        && let Ok(values) = bytemuck::try_cast_slice::<u8, f32>(data)
    {
        return values.to_vec();
    }
    data.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn capture<'h>(pattern: &Regex, header: &'h str, key: &str) -> Result<&'h str, LoadError> {
    pattern
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| corrupt(&format!("header has no `{key}` entry")))
}

fn corrupt(reason: &str) -> LoadError {
    LoadError::Corrupt {
        artifact: ARTIFACT,
        reason: reason.to_string(),
    }
}

fn schema(reason: &str) -> LoadError {
    LoadError::SchemaMismatch {
        artifact: ARTIFACT,
        reason: reason.to_string(),
    }
}
