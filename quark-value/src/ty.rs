//! Runtime descriptions of value types.

/// The type of a value.
///
/// The absence of a type (an `Option<Type>` that is `None`) denotes the
/// *dynamic* type, which is the set of all types.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Type {
    Unit,
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Raw,
    Object,
    List(Option<Box<Type>>),
    Map {
        key: Option<Box<Type>>,
        value: Option<Box<Type>>,
    },
    Tuple(Vec<Option<Type>>),
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn write_opt(t: Option<&Type>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match t {
                Some(t) => t.fmt(f),
                None => f.write_str("dynamic"),
            }
        }
        match self {
            Type::Unit => f.write_str("unit"),
            Type::Bool => f.write_str("bool"),
            Type::Int8 => f.write_str("int8"),
            Type::UInt8 => f.write_str("uint8"),
            Type::Int16 => f.write_str("int16"),
            Type::UInt16 => f.write_str("uint16"),
            Type::Int32 => f.write_str("int32"),
            Type::UInt32 => f.write_str("uint32"),
            Type::Int64 => f.write_str("int64"),
            Type::UInt64 => f.write_str("uint64"),
            Type::Float32 => f.write_str("float32"),
            Type::Float64 => f.write_str("float64"),
            Type::String => f.write_str("string"),
            Type::Raw => f.write_str("raw"),
            Type::Object => f.write_str("object"),
            Type::List(t) => {
                f.write_str("[")?;
                write_opt(t.as_deref(), f)?;
                f.write_str("]")
            }
            Type::Map { key, value } => {
                f.write_str("{")?;
                write_opt(key.as_deref(), f)?;
                f.write_str(": ")?;
                write_opt(value.as_deref(), f)?;
                f.write_str("}")
            }
            Type::Tuple(elements) => {
                f.write_str("(")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write_opt(element.as_ref(), f)?;
                }
                f.write_str(")")
            }
        }
    }
}
