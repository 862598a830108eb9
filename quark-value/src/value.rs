//! Type-erased values.

use crate::{map::Map, number::Number, ty::Type};
use bytes::Bytes;

/// A value of any type of the `quark` type system.
#[derive(Clone, PartialEq, Debug, derive_more::From, serde::Serialize, serde::Deserialize)]
pub enum AnyValue {
    Unit,
    #[from]
    Bool(bool),
    #[from(forward)]
    Number(Number),
    #[from]
    String(String),
    #[from]
    Raw(Bytes),
    #[from]
    List(Vec<AnyValue>),
    Map(Map<AnyValue, AnyValue>),
    Tuple(Vec<AnyValue>),
}

impl AnyValue {
    /// The runtime type of this value.
    ///
    /// Containers whose element type cannot be derived from their content
    /// (empty, or heterogeneous) are typed with dynamic elements.
    pub fn ty(&self) -> Type {
        match self {
            AnyValue::Unit => Type::Unit,
            AnyValue::Bool(_) => Type::Bool,
            AnyValue::Number(n) => n.ty(),
            AnyValue::String(_) => Type::String,
            AnyValue::Raw(_) => Type::Raw,
            AnyValue::List(elements) => Type::List(common_type(elements).map(Box::new)),
            AnyValue::Map(map) => Type::Map {
                key: common_type_iter(map.keys()).map(Box::new),
                value: common_type_iter(map.values()).map(Box::new),
            },
            AnyValue::Tuple(elements) => {
                Type::Tuple(elements.iter().map(|e| Some(e.ty())).collect())
            }
        }
    }

    /// Checks this value against a declared type. `None` is the dynamic type
    /// and admits every value.
    pub fn conforms_to(&self, ty: Option<&Type>) -> bool {
        let ty = match ty {
            None => return true,
            Some(ty) => ty,
        };
        match (self, ty) {
            (AnyValue::Unit, Type::Unit) => true,
            (AnyValue::Bool(_), Type::Bool) => true,
            (AnyValue::Number(n), ty) => &n.ty() == ty,
            (AnyValue::String(_), Type::String) => true,
            (AnyValue::Raw(_), Type::Raw) => true,
            (AnyValue::List(elements), Type::List(t)) => elements
                .iter()
                .all(|element| element.conforms_to(t.as_deref())),
            (AnyValue::Map(map), Type::Map { key, value }) => map.iter().all(|(k, v)| {
                k.conforms_to(key.as_deref()) && v.conforms_to(value.as_deref())
            }),
            (AnyValue::Tuple(elements), Type::Tuple(types)) => {
                elements.len() == types.len()
                    && elements
                        .iter()
                        .zip(types)
                        .all(|(element, t)| element.conforms_to(t.as_ref()))
            }
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            AnyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            AnyValue::Number(Number::Int32(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AnyValue]> {
        match self {
            AnyValue::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[AnyValue]> {
        match self {
            AnyValue::Tuple(elements) => Some(elements),
            _ => None,
        }
    }
}

impl Default for AnyValue {
    fn default() -> Self {
        Self::Unit
    }
}

impl From<&str> for AnyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<()> for AnyValue {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

impl From<Map<AnyValue, AnyValue>> for AnyValue {
    fn from(map: Map<AnyValue, AnyValue>) -> Self {
        Self::Map(map)
    }
}

fn common_type(elements: &[AnyValue]) -> Option<Type> {
    common_type_iter(elements.iter())
}

// The common type of a sequence, or dynamic when the sequence is empty or
// heterogeneous.
fn common_type_iter<'a, I>(mut elements: I) -> Option<Type>
where
    I: Iterator<Item = &'a AnyValue>,
{
    let first = elements.next()?.ty();
    elements.all(|e| e.ty() == first).then_some(first)
}

impl std::fmt::Display for AnyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyValue::Unit => f.write_str("()"),
            AnyValue::Bool(b) => b.fmt(f),
            AnyValue::Number(n) => n.fmt(f),
            AnyValue::String(s) => write!(f, "{s:?}"),
            AnyValue::Raw(bytes) => write!(f, "raw[{len}]", len = bytes.len()),
            AnyValue::List(elements) => {
                f.write_str("[")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    element.fmt(f)?;
                }
                f.write_str("]")
            }
            AnyValue::Map(map) => {
                f.write_str("{")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            AnyValue::Tuple(elements) => {
                f.write_str("(")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    element.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}
