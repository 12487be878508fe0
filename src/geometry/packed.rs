//! Compact row transfer: little-endian integer arrays, base64-encoded
//!
//! Large layers produce hundreds of thousands of rows; packing them keeps the
//! JSON response small and cheap to parse on the caller side.

use base64::{engine::general_purpose, Engine as _};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::types::Row;
use crate::error::PackError;

/// Rows as three parallel arrays
///
/// `ys[i]` is the row coordinate, `counts[i]` the number of x values that
/// row owns in `xs` (always even).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedRows {
    pub ys: String,
    pub counts: String,
    pub xs: String,
}

pub fn pack_rows(rows: &[Row]) -> PackedRows {
    let ys: Vec<i32> = rows.iter().map(|r| r.y).collect();
    let counts: Vec<u32> = rows.iter().map(|r| r.xs.len() as u32).collect();
    let xs: Vec<i32> = rows.iter().flat_map(|r| r.xs.iter().copied()).collect();

    PackedRows {
        ys: encode_i32s(&ys),
        counts: encode_u32s(&counts),
        xs: encode_i32s(&xs),
    }
}

pub fn unpack_rows(packed: &PackedRows) -> Result<Vec<Row>, PackError> {
    let ys = decode_i32s(&packed.ys, "ys")?;
    let counts = decode_u32s(&packed.counts, "counts")?;
    let xs = decode_i32s(&packed.xs, "xs")?;

    if ys.len() != counts.len() {
        return Err(PackError::Inconsistent(format!(
            "{} row coordinates but {} row counts",
            ys.len(),
            counts.len()
        )));
    }
    let total: usize = counts.iter().map(|&c| c as usize).sum();
    if total != xs.len() {
        return Err(PackError::Inconsistent(format!(
            "row counts sum to {} but {} x values were sent",
            total,
            xs.len()
        )));
    }

    let mut rows = Vec::with_capacity(ys.len());
    let mut offset = 0;
    for (&y, &count) in ys.iter().zip(&counts) {
        let count = count as usize;
        rows.push(Row { y, xs: xs[offset..offset + count].to_vec() });
        offset += count;
    }
    Ok(rows)
}

fn encode_i32s(values: &[i32]) -> String {
    let mut bytes = vec![0u8; values.len() * 4];
    LittleEndian::write_i32_into(values, &mut bytes);
    general_purpose::STANDARD.encode(bytes)
}

fn encode_u32s(values: &[u32]) -> String {
    let mut bytes = vec![0u8; values.len() * 4];
    LittleEndian::write_u32_into(values, &mut bytes);
    general_purpose::STANDARD.encode(bytes)
}

fn decode_bytes(text: &str, field: &'static str) -> Result<Vec<u8>, PackError> {
    let bytes = general_purpose::STANDARD.decode(text)?;
    if bytes.len() % 4 != 0 {
        return Err(PackError::Misaligned { field, len: bytes.len() });
    }
    Ok(bytes)
}

fn decode_i32s(text: &str, field: &'static str) -> Result<Vec<i32>, PackError> {
    let bytes = decode_bytes(text, field)?;
    let mut out = vec![0i32; bytes.len() / 4];
    LittleEndian::read_i32_into(&bytes, &mut out);
    Ok(out)
}

fn decode_u32s(text: &str, field: &'static str) -> Result<Vec<u32>, PackError> {
    let bytes = decode_bytes(text, field)?;
    let mut out = vec![0u32; bytes.len() / 4];
    LittleEndian::read_u32_into(&bytes, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_preserves_row_order_and_negative_coordinates() {
        let rows = vec![
            Row { y: -3, xs: vec![-10, -2, 4, 8] },
            Row { y: 0, xs: vec![1, 2] },
            Row { y: 12, xs: vec![] },
        ];
        let packed = pack_rows(&rows);
        assert_eq!(unpack_rows(&packed).unwrap(), rows);
    }

    #[test]
    fn test_unpack_rejects_inconsistent_counts() {
        let mut packed = pack_rows(&[Row { y: 1, xs: vec![0, 5] }]);
        packed.xs = encode_i32s(&[0]);
        assert!(matches!(unpack_rows(&packed), Err(PackError::Inconsistent(_))));
    }

    #[test]
    fn test_unpack_rejects_misaligned_payload() {
        let packed = PackedRows {
            ys: general_purpose::STANDARD.encode([1u8, 2, 3]),
            counts: String::new(),
            xs: String::new(),
        };
        assert!(matches!(unpack_rows(&packed), Err(PackError::Misaligned { field: "ys", .. })));
    }
}
