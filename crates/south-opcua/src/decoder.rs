// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire value decoding.
//!
//! A data change notification carries a tagged [`WireValue`]. The decoder
//! collapses it into a [`NormalizedValue`], the only value shape the host
//! reading model accepts:
//!
//! ```text
//! Boolean, Int16/32/64, UInt16/32/64  ──▶ Integer(i64)   (UInt64 wraps)
//! Float, Double                       ──▶ Float(f64)
//! everything else, arrays included    ──▶ Integer(0)
//! ```
//!
//! Decoding is total. There is exactly one dispatch ([`dispatch`]) and it
//! names every wire tag, so adding a tag to [`WireValue`] fails to compile
//! until it is classified.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

// =============================================================================
// WireValue
// =============================================================================

/// A value as delivered by the transport, tagged with its OPC UA type.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// No value.
    Empty,
    /// Boolean.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// String.
    String(String),
    /// Date and time.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Array or matrix of values.
    Array(Vec<WireValue>),
    /// Any other built-in or structured type, by type name.
    Other(String),
}

impl WireValue {
    /// Returns `true` for single (non-array) values.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array(_))
    }

    /// Returns the OPC UA type name of this value.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Empty => "Null",
            Self::Boolean(_) => "Boolean",
            Self::SByte(_) => "SByte",
            Self::Byte(_) => "Byte",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::Array(_) => "Array",
            Self::Other(name) => name,
        }
    }
}

// =============================================================================
// NormalizedValue
// =============================================================================

/// The value carried by a reading datapoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// String.
    String(String),
}

impl Default for NormalizedValue {
    /// The placeholder used for values that are not decoded.
    fn default() -> Self {
        Self::Integer(0)
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Outcome of classifying one wire value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    /// Decoded into the integer variant.
    Integer(i64),
    /// Decoded into the floating-point variant.
    Float(f64),
    /// Not decoded.
    Unsupported,
}

/// Classifies a wire value. Non-scalar values are always unsupported.
pub fn dispatch(value: &WireValue) -> Dispatch {
    match value {
        WireValue::Boolean(v) => Dispatch::Integer(i64::from(*v)),
        WireValue::Int16(v) => Dispatch::Integer(i64::from(*v)),
        WireValue::Int32(v) => Dispatch::Integer(i64::from(*v)),
        WireValue::Int64(v) => Dispatch::Integer(*v),
        WireValue::UInt16(v) => Dispatch::Integer(i64::from(*v)),
        WireValue::UInt32(v) => Dispatch::Integer(i64::from(*v)),
        // Reinterpreted as two's complement: values above i64::MAX go negative.
        WireValue::UInt64(v) => Dispatch::Integer(*v as i64),
        WireValue::Float(v) => Dispatch::Float(f64::from(*v)),
        WireValue::Double(v) => Dispatch::Float(*v),
        WireValue::Empty
        | WireValue::SByte(_)
        | WireValue::Byte(_)
        | WireValue::String(_)
        | WireValue::DateTime(_)
        | WireValue::Guid(_)
        | WireValue::ByteString(_)
        | WireValue::Array(_)
        | WireValue::Other(_) => Dispatch::Unsupported,
    }
}

/// Decodes a wire value into the normalized value forwarded to the host.
///
/// Unsupported and non-scalar values decode to [`NormalizedValue::default`].
pub fn decode(value: &WireValue) -> NormalizedValue {
    match dispatch(value) {
        Dispatch::Integer(v) => NormalizedValue::Integer(v),
        Dispatch::Float(v) => NormalizedValue::Float(v),
        Dispatch::Unsupported => {
            trace!(wire_type = value.type_name(), "Unsupported value type, using default");
            NormalizedValue::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_tags() {
        assert_eq!(decode(&WireValue::Boolean(true)), NormalizedValue::Integer(1));
        assert_eq!(decode(&WireValue::Boolean(false)), NormalizedValue::Integer(0));
        assert_eq!(decode(&WireValue::Int16(-7)), NormalizedValue::Integer(-7));
        assert_eq!(decode(&WireValue::Int32(42)), NormalizedValue::Integer(42));
        assert_eq!(
            decode(&WireValue::Int64(i64::MIN)),
            NormalizedValue::Integer(i64::MIN)
        );
        assert_eq!(decode(&WireValue::UInt16(65535)), NormalizedValue::Integer(65535));
        assert_eq!(
            decode(&WireValue::UInt32(u32::MAX)),
            NormalizedValue::Integer(i64::from(u32::MAX))
        );
        assert_eq!(decode(&WireValue::UInt64(12)), NormalizedValue::Integer(12));
    }

    #[test]
    fn test_uint64_wraps_above_i64_max() {
        assert_eq!(decode(&WireValue::UInt64(u64::MAX)), NormalizedValue::Integer(-1));
        assert_eq!(
            decode(&WireValue::UInt64(1 << 63)),
            NormalizedValue::Integer(i64::MIN)
        );
        assert_eq!(
            decode(&WireValue::UInt64(i64::MAX as u64)),
            NormalizedValue::Integer(i64::MAX)
        );
    }

    #[test]
    fn test_float_tags() {
        assert_eq!(decode(&WireValue::Float(1.5)), NormalizedValue::Float(1.5));
        assert_eq!(decode(&WireValue::Double(-2.25)), NormalizedValue::Float(-2.25));
    }

    #[test]
    fn test_unsupported_tags_use_default() {
        let unsupported = [
            WireValue::Empty,
            WireValue::SByte(-1),
            WireValue::Byte(200),
            WireValue::String("text".into()),
            WireValue::DateTime(Utc::now()),
            WireValue::Guid(Uuid::nil()),
            WireValue::ByteString(vec![1, 2, 3]),
            WireValue::Other("LocalizedText".into()),
        ];

        for value in &unsupported {
            assert_eq!(dispatch(value), Dispatch::Unsupported, "{}", value.type_name());
            assert_eq!(decode(value), NormalizedValue::Integer(0));
        }
    }

    #[test]
    fn test_non_scalar_uses_default() {
        let array = WireValue::Array(vec![WireValue::Int32(1), WireValue::Int32(2)]);
        assert!(!array.is_scalar());
        assert_eq!(decode(&array), NormalizedValue::default());
    }

    #[test]
    fn test_normalized_display() {
        assert_eq!(NormalizedValue::Integer(42).to_string(), "42");
        assert_eq!(NormalizedValue::Float(0.5).to_string(), "0.5");
        assert_eq!(NormalizedValue::String("on".into()).to_string(), "\"on\"");
    }
}
