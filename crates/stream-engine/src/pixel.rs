//! Pixel types and typed pixel buffers
//!
//! Buffers store pixels in their native type. Reads and writes through the
//! `f64` accessors convert with `as` semantics: float to integer conversion
//! truncates toward zero and saturates, NaN becomes zero.

use serde::{Deserialize, Serialize};

/// Scalar type of the pixels in a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelType {
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl PixelType {
    /// Size of one pixel in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// Contiguous pixel storage in the dataset's native type
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_buffer {
    ($buffer:expr, $values:ident => $body:expr) => {
        match $buffer {
            PixelBuffer::U8($values) => $body,
            PixelBuffer::I16($values) => $body,
            PixelBuffer::U16($values) => $body,
            PixelBuffer::I32($values) => $body,
            PixelBuffer::U32($values) => $body,
            PixelBuffer::F32($values) => $body,
            PixelBuffer::F64($values) => $body,
        }
    };
}

impl PixelBuffer {
    /// Zero-filled buffer of `len` pixels
    pub fn zeros(pixel_type: PixelType, len: usize) -> Self {
        match pixel_type {
            PixelType::U8 => Self::U8(vec![0; len]),
            PixelType::I16 => Self::I16(vec![0; len]),
            PixelType::U16 => Self::U16(vec![0; len]),
            PixelType::I32 => Self::I32(vec![0; len]),
            PixelType::U32 => Self::U32(vec![0; len]),
            PixelType::F32 => Self::F32(vec![0.0; len]),
            PixelType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// Buffer of `pixel_type` holding `values` converted from f64
    pub fn from_f64(pixel_type: PixelType, values: &[f64]) -> Self {
        let mut buffer = Self::zeros(pixel_type, values.len());
        for (i, v) in values.iter().enumerate() {
            buffer.set(i, *v);
        }
        buffer
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            Self::U8(_) => PixelType::U8,
            Self::I16(_) => PixelType::I16,
            Self::U16(_) => PixelType::U16,
            Self::I32(_) => PixelType::I32,
            Self::U32(_) => PixelType::U32,
            Self::F32(_) => PixelType::F32,
            Self::F64(_) => PixelType::F64,
        }
    }

    pub fn len(&self) -> usize {
        for_each_buffer!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel at `offset` as f64
    pub fn get(&self, offset: usize) -> Option<f64> {
        for_each_buffer!(self, values => values.get(offset).map(|v| *v as f64))
    }

    /// Store `value` at `offset`, converting to the buffer's type
    ///
    /// Returns false when `offset` is out of range.
    pub fn set(&mut self, offset: usize, value: f64) -> bool {
        match self {
            Self::U8(values) => store(values, offset, value as u8),
            Self::I16(values) => store(values, offset, value as i16),
            Self::U16(values) => store(values, offset, value as u16),
            Self::I32(values) => store(values, offset, value as i32),
            Self::U32(values) => store(values, offset, value as u32),
            Self::F32(values) => store(values, offset, value as f32),
            Self::F64(values) => store(values, offset, value),
        }
    }

    /// All pixels converted to f64
    pub fn to_f64(&self) -> Vec<f64> {
        for_each_buffer!(self, values => values.iter().map(|v| *v as f64).collect())
    }

    /// Copy `len` pixels starting at `from` in `source` to `to` in this buffer
    ///
    /// Pixels are converted when the two buffers have different types.
    pub fn copy_span(&mut self, to: usize, source: &PixelBuffer, from: usize, len: usize) -> bool {
        if to + len > self.len() || from + len > source.len() {
            return false;
        }
        match (self, source) {
            (Self::U8(dst), Self::U8(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (Self::I16(dst), Self::I16(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (Self::U16(dst), Self::U16(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (Self::I32(dst), Self::I32(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (Self::U32(dst), Self::U32(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (Self::F32(dst), Self::F32(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (Self::F64(dst), Self::F64(src)) => dst[to..to + len].copy_from_slice(&src[from..from + len]),
            (dst, src) => {
                for i in 0..len {
                    if let Some(v) = src.get(from + i) {
                        dst.set(to + i, v);
                    }
                }
            }
        }
        true
    }
}

fn store<T>(values: &mut [T], offset: usize, value: T) -> bool {
    match values.get_mut(offset) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}
