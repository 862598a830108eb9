use crate::ty::Type;

/// A numeric value of any width.
#[derive(
    Clone, Copy, PartialEq, PartialOrd, Debug, derive_more::From, serde::Serialize, serde::Deserialize,
)]
pub enum Number {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

impl Number {
    pub fn ty(&self) -> Type {
        match self {
            Number::Int8(_) => Type::Int8,
            Number::UInt8(_) => Type::UInt8,
            Number::Int16(_) => Type::Int16,
            Number::UInt16(_) => Type::UInt16,
            Number::Int32(_) => Type::Int32,
            Number::UInt32(_) => Type::UInt32,
            Number::Int64(_) => Type::Int64,
            Number::UInt64(_) => Type::UInt64,
            Number::Float32(_) => Type::Float32,
            Number::Float64(_) => Type::Float64,
        }
    }

    /// Widens to a signed 64-bit integer when the value is an integer that
    /// fits.
    pub fn as_int64(&self) -> Option<i64> {
        match *self {
            Number::Int8(n) => Some(n.into()),
            Number::UInt8(n) => Some(n.into()),
            Number::Int16(n) => Some(n.into()),
            Number::UInt16(n) => Some(n.into()),
            Number::Int32(n) => Some(n.into()),
            Number::UInt32(n) => Some(n.into()),
            Number::Int64(n) => Some(n),
            Number::UInt64(n) => i64::try_from(n).ok(),
            Number::Float32(_) | Number::Float64(_) => None,
        }
    }

    pub fn as_float64(&self) -> Option<f64> {
        match *self {
            Number::Float32(n) => Some(n.into()),
            Number::Float64(n) => Some(n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int8(n) => n.fmt(f),
            Number::UInt8(n) => n.fmt(f),
            Number::Int16(n) => n.fmt(f),
            Number::UInt16(n) => n.fmt(f),
            Number::Int32(n) => n.fmt(f),
            Number::UInt32(n) => n.fmt(f),
            Number::Int64(n) => n.fmt(f),
            Number::UInt64(n) => n.fmt(f),
            Number::Float32(n) => n.fmt(f),
            Number::Float64(n) => n.fmt(f),
        }
    }
}
