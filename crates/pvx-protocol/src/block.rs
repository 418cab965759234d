//! # Serialized Value Blocks
//!
//! The coordinator ships constants (literal expressions and range bounds) as
//! single-position columnar blocks, serialized and base64-encoded. A [`Block`] keeps
//! that encoded text as-is. [`Block::decode`] reads the first position back into a
//! [`BlockValue`], and [`Block::encode`] produces the same wire form from a value.
//!
//! ## Wire Layout
//!
//! ```text
//! i32 name length | encoding name (UTF-8) | encoding body
//! ```
//!
//! All integers are little-endian. The supported encodings are:
//!
//! - **Fixed width** (`LONG_ARRAY`, `INT_ARRAY`, `SHORT_ARRAY`, `BYTE_ARRAY`): the
//!   position count, the null flags, then the values of the non-null positions.
//! - **`VARIABLE_WIDTH`**: the position count, the end offsets, the null flags, the
//!   total byte length, then the bytes.
//! - **`RLE`**: the position count, then a nested block holding the single
//!   repeated value. The nested block may not itself be `RLE`.
//!
//! Null flags are one "may have nulls" byte. If it is set, a bitmap follows with one
//! bit per position, most significant bit first.
//!
//! The value's logical type is not part of the block. The caller pairs the decoded
//! [`BlockValue`] with the declared type to build a constant.

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

const LONG_ARRAY: &str = "LONG_ARRAY";
const INT_ARRAY: &str = "INT_ARRAY";
const SHORT_ARRAY: &str = "SHORT_ARRAY";
const BYTE_ARRAY: &str = "BYTE_ARRAY";
const VARIABLE_WIDTH: &str = "VARIABLE_WIDTH";
const RLE: &str = "RLE";

/// Levels of `RLE` wrapping accepted around a value block.
const MAX_RLE_DEPTH: usize = 1;

/// Base64 text of a serialized single-value block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(String);

/// The first value of a decoded block, in its physical representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockValue {
    Null,
    Long(i64),
    Int(i32),
    Short(i16),
    Byte(i8),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    #[error("Invalid base64 in value block: {0}")]
    Base64(String),
    #[error("Value block is truncated")]
    Truncated,
    #[error("Value block has no positions")]
    Empty,
    #[error("Unsupported block encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("RLE block wraps another RLE block")]
    NestedRle,
}

impl Block {
    pub fn new(base64: impl Into<String>) -> Self {
        Block(base64.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the value at position 0.
    pub fn decode(&self) -> Result<BlockValue, BlockError> {
        let bytes =
            Base64::decode_vec(&self.0).map_err(|e| BlockError::Base64(e.to_string()))?;
        let mut reader = Reader { bytes: &bytes, pos: 0 };
        read_block(&mut reader, 0)
    }

    /// Serialize a single value using the encoding the coordinator uses for it.
    pub fn encode(value: &BlockValue) -> Block {
        let mut out = Vec::new();
        write_block(&mut out, value);
        Block(Base64::encode_string(&out))
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], BlockError> {
        let end = self.pos.checked_add(n).ok_or(BlockError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(BlockError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BlockError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn i32(&mut self) -> Result<i32, BlockError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn length(&mut self) -> Result<usize, BlockError> {
        usize::try_from(self.i32()?).map_err(|_| BlockError::Truncated)
    }

    /// Null flag of position 0, consuming the whole null section.
    fn first_is_null(&mut self, positions: usize) -> Result<bool, BlockError> {
        let may_have_null = self.take(1)?[0] != 0;
        if !may_have_null {
            return Ok(false);
        }
        let bitmap = self.take(positions.div_ceil(8))?;
        Ok(bitmap[0] & 0x80 != 0)
    }
}

fn read_block(reader: &mut Reader<'_>, rle_depth: usize) -> Result<BlockValue, BlockError> {
    let name_len = reader.length()?;
    let name = String::from_utf8_lossy(reader.take(name_len)?).into_owned();
    let positions = reader.length()?;
    if positions == 0 {
        return Err(BlockError::Empty);
    }

    match name.as_str() {
        RLE if rle_depth >= MAX_RLE_DEPTH => Err(BlockError::NestedRle),
        RLE => read_block(reader, rle_depth + 1),
        LONG_ARRAY | INT_ARRAY | SHORT_ARRAY | BYTE_ARRAY => {
            if reader.first_is_null(positions)? {
                return Ok(BlockValue::Null);
            }
            let value = match name.as_str() {
                LONG_ARRAY => BlockValue::Long(i64::from_le_bytes(reader.array()?)),
                INT_ARRAY => BlockValue::Int(i32::from_le_bytes(reader.array()?)),
                SHORT_ARRAY => BlockValue::Short(i16::from_le_bytes(reader.array()?)),
                _ => BlockValue::Byte(i8::from_le_bytes(reader.array()?)),
            };
            Ok(value)
        }
        VARIABLE_WIDTH => {
            let first_end = reader.length()?;
            reader.take((positions - 1) * 4)?;
            if reader.first_is_null(positions)? {
                return Ok(BlockValue::Null);
            }
            let total = reader.length()?;
            let data = reader.take(total)?;
            let value = data.get(..first_end).ok_or(BlockError::Truncated)?;
            Ok(BlockValue::Bytes(value.to_vec()))
        }
        other => Err(BlockError::UnsupportedEncoding(other.to_string())),
    }
}

fn write_block(out: &mut Vec<u8>, value: &BlockValue) {
    let name = match value {
        BlockValue::Null | BlockValue::Byte(_) => BYTE_ARRAY,
        BlockValue::Long(_) => LONG_ARRAY,
        BlockValue::Int(_) => INT_ARRAY,
        BlockValue::Short(_) => SHORT_ARRAY,
        BlockValue::Bytes(_) => VARIABLE_WIDTH,
    };
    out.extend_from_slice(&(name.len() as i32).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&1i32.to_le_bytes());

    match value {
        BlockValue::Null => out.extend_from_slice(&[1, 0x80]),
        BlockValue::Long(v) => {
            out.push(0);
            out.extend_from_slice(&v.to_le_bytes());
        }
        BlockValue::Int(v) => {
            out.push(0);
            out.extend_from_slice(&v.to_le_bytes());
        }
        BlockValue::Short(v) => {
            out.push(0);
            out.extend_from_slice(&v.to_le_bytes());
        }
        BlockValue::Byte(v) => {
            out.push(0);
            out.extend_from_slice(&v.to_le_bytes());
        }
        BlockValue::Bytes(bytes) => {
            out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            out.push(0);
            out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
    }
}
