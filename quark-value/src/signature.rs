//! Textual encoding of value types.
//!
//! A signature is the compact, single-pass-parseable string under which a
//! type description travels in metadata records: `i` is a 32-bit integer,
//! `[s]` a list of strings, `{is}` a map from 32-bit integers to strings,
//! `(iI)` a pair, `m` the dynamic type.

use crate::ty::Type;

#[derive(
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Clone,
    Hash,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub struct Signature(pub(crate) Option<Type>);

impl Signature {
    pub fn new(t: Option<Type>) -> Self {
        Self(t)
    }

    /// The signature of the dynamic type.
    pub fn dynamic() -> Self {
        Self(None)
    }

    pub fn to_type(&self) -> Option<&Type> {
        self.0.as_ref()
    }

    pub fn into_type(self) -> Option<Type> {
        self.0
    }
}

impl From<Type> for Signature {
    fn from(t: Type) -> Self {
        Self(Some(t))
    }
}

impl From<Option<Type>> for Signature {
    fn from(t: Option<Type>) -> Self {
        Self(t)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_type(self.0.as_ref(), f)
    }
}

impl std::str::FromStr for Signature {
    type Err = ParseError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let mut iter = src.chars();
        let t = parse_type(&mut iter)?;
        match iter.next() {
            Some(c) => Err(ParseError::UnexpectedChar(c, src.to_owned())),
            None => Ok(Self(t)),
        }
    }
}

const CHAR_VOID: char = 'v';
const CHAR_BOOL: char = 'b';
const CHAR_INT8: char = 'c';
const CHAR_UINT8: char = 'C';
const CHAR_INT16: char = 'w';
const CHAR_UINT16: char = 'W';
const CHAR_INT32: char = 'i';
const CHAR_UINT32: char = 'I';
const CHAR_INT64: char = 'l';
const CHAR_UINT64: char = 'L';
const CHAR_FLOAT: char = 'f';
const CHAR_DOUBLE: char = 'd';
const CHAR_STRING: char = 's';
const CHAR_RAW: char = 'r';
const CHAR_OBJECT: char = 'o';
const CHAR_DYNAMIC: char = 'm';
const CHAR_LIST_BEGIN: char = '[';
const CHAR_LIST_END: char = ']';
const CHAR_MAP_BEGIN: char = '{';
const CHAR_MAP_END: char = '}';
const CHAR_TUPLE_BEGIN: char = '(';
const CHAR_TUPLE_END: char = ')';

fn write_type(t: Option<&Type>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    use std::fmt::Write;
    match t {
        None => f.write_char(CHAR_DYNAMIC),
        Some(t) => match t {
            Type::Unit => f.write_char(CHAR_VOID),
            Type::Bool => f.write_char(CHAR_BOOL),
            Type::Int8 => f.write_char(CHAR_INT8),
            Type::UInt8 => f.write_char(CHAR_UINT8),
            Type::Int16 => f.write_char(CHAR_INT16),
            Type::UInt16 => f.write_char(CHAR_UINT16),
            Type::Int32 => f.write_char(CHAR_INT32),
            Type::UInt32 => f.write_char(CHAR_UINT32),
            Type::Int64 => f.write_char(CHAR_INT64),
            Type::UInt64 => f.write_char(CHAR_UINT64),
            Type::Float32 => f.write_char(CHAR_FLOAT),
            Type::Float64 => f.write_char(CHAR_DOUBLE),
            Type::String => f.write_char(CHAR_STRING),
            Type::Raw => f.write_char(CHAR_RAW),
            Type::Object => f.write_char(CHAR_OBJECT),
            Type::List(t) => {
                f.write_char(CHAR_LIST_BEGIN)?;
                write_type(t.as_deref(), f)?;
                f.write_char(CHAR_LIST_END)
            }
            Type::Map { key, value } => {
                f.write_char(CHAR_MAP_BEGIN)?;
                write_type(key.as_deref(), f)?;
                write_type(value.as_deref(), f)?;
                f.write_char(CHAR_MAP_END)
            }
            Type::Tuple(elements) => {
                f.write_char(CHAR_TUPLE_BEGIN)?;
                for element in elements {
                    write_type(element.as_ref(), f)?;
                }
                f.write_char(CHAR_TUPLE_END)
            }
        },
    }
}

fn advance_once<I>(mut iter: I)
where
    I: Iterator,
{
    if iter.next().is_none() {
        unreachable!(
            "the precondition over the presence of an element in the iterator is not verified"
        )
    }
}

fn parse_type(iter: &mut std::str::Chars) -> Result<Option<Type>, ParseError> {
    let type_str = iter.as_str();
    // Container types are parsed from their opening character, so peek
    // through a clone first and only hand the iterator to the subparser when
    // one is detected.
    let c = iter.clone().next().ok_or(ParseError::EndOfInput)?;
    match c {
        CHAR_LIST_BEGIN => return Ok(Some(parse_list(iter)?)),
        CHAR_MAP_BEGIN => return Ok(Some(parse_map(iter)?)),
        CHAR_TUPLE_BEGIN => return Ok(Some(parse_tuple(iter)?)),
        _ => (),
    };
    advance_once(iter.by_ref());
    let t = match c {
        CHAR_VOID => Some(Type::Unit),
        CHAR_BOOL => Some(Type::Bool),
        CHAR_INT8 => Some(Type::Int8),
        CHAR_UINT8 => Some(Type::UInt8),
        CHAR_INT16 => Some(Type::Int16),
        CHAR_UINT16 => Some(Type::UInt16),
        CHAR_INT32 => Some(Type::Int32),
        CHAR_UINT32 => Some(Type::UInt32),
        CHAR_INT64 => Some(Type::Int64),
        CHAR_UINT64 => Some(Type::UInt64),
        CHAR_FLOAT => Some(Type::Float32),
        CHAR_DOUBLE => Some(Type::Float64),
        CHAR_STRING => Some(Type::String),
        CHAR_RAW => Some(Type::Raw),
        CHAR_OBJECT => Some(Type::Object),
        CHAR_DYNAMIC => None,
        c => return Err(ParseError::UnexpectedChar(c, type_str.to_owned())),
    };
    Ok(t)
}

fn parse_list(iter: &mut std::str::Chars) -> Result<Type, ParseError> {
    let list_str = iter.as_str();
    advance_once(iter.by_ref());
    let value_type = match parse_type(iter) {
        Ok(t) => t,
        Err(err) => {
            return Err(match err {
                ParseError::UnexpectedChar(CHAR_LIST_END, _) | ParseError::EndOfInput => {
                    ParseError::MissingListValueType(list_str.to_owned())
                }
                _ => ParseError::ListValueTypeParsing(Box::new(err)),
            })
        }
    };
    if iter.clone().next() != Some(CHAR_LIST_END) {
        return Err(ParseError::MissingListEnd(list_str.to_owned()));
    }
    advance_once(iter);
    Ok(Type::List(value_type.map(Box::new)))
}

fn parse_map(iter: &mut std::str::Chars) -> Result<Type, ParseError> {
    let map_str = iter.as_str();
    advance_once(iter.by_ref());
    let key_type = match parse_type(iter) {
        Ok(t) => t,
        Err(err) => {
            return Err(match err {
                ParseError::UnexpectedChar(CHAR_MAP_END, _) | ParseError::EndOfInput => {
                    ParseError::MissingMapKeyType(map_str.to_owned())
                }
                _ => ParseError::MapKeyTypeParsing(Box::new(err)),
            })
        }
    };
    let value_type = match parse_type(iter) {
        Ok(t) => t,
        Err(err) => {
            return Err(match err {
                ParseError::UnexpectedChar(CHAR_MAP_END, _) => {
                    ParseError::MissingMapValueType(map_str.to_owned())
                }
                _ => ParseError::MapValueTypeParsing(Box::new(err)),
            })
        }
    };
    if iter.clone().next() != Some(CHAR_MAP_END) {
        return Err(ParseError::MissingMapEnd(map_str.to_owned()));
    }
    advance_once(iter.by_ref());
    Ok(Type::Map {
        key: key_type.map(Box::new),
        value: value_type.map(Box::new),
    })
}

fn parse_tuple(iter: &mut std::str::Chars) -> Result<Type, ParseError> {
    let tuple_str = iter.as_str();
    advance_once(iter.by_ref());
    let mut elements = Vec::new();
    let elements = loop {
        match parse_type(iter) {
            Ok(element) => elements.push(element),
            Err(err) => match err {
                ParseError::UnexpectedChar(CHAR_TUPLE_END, _) => break elements,
                ParseError::EndOfInput => {
                    return Err(ParseError::MissingTupleEnd(tuple_str.to_owned()))
                }
                _ => return Err(ParseError::TupleElementTypeParsing(Box::new(err))),
            },
        }
    };
    Ok(Type::Tuple(elements))
}

#[derive(thiserror::Error, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum ParseError {
    #[error("end of input reached")]
    EndOfInput,

    #[error("unexpected character \'{0}\' in input \"{1}\"")]
    UnexpectedChar(char, String),

    #[error("value type of list starting at input \"{0}\" is missing")]
    MissingListValueType(String),

    #[error("parsing of list value type failed")]
    ListValueTypeParsing(#[source] Box<ParseError>),

    #[error("end of list starting at input \"{0}\" is missing")]
    MissingListEnd(String),

    #[error("key type of map starting at input \"{0}\" is missing")]
    MissingMapKeyType(String),

    #[error("parsing of map key type failed")]
    MapKeyTypeParsing(#[source] Box<ParseError>),

    #[error("value type of map starting at input \"{0}\" is missing")]
    MissingMapValueType(String),

    #[error("parsing of map value type failed")]
    MapValueTypeParsing(#[source] Box<ParseError>),

    #[error("end of map starting at input \"{0}\" is missing")]
    MissingMapEnd(String),

    #[error("parsing of a tuple element type failed")]
    TupleElementTypeParsing(#[source] Box<ParseError>),

    #[error("end of tuple starting at input \"{0}\" is missing")]
    MissingTupleEnd(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(src: &str) -> String {
        src.parse::<Signature>().unwrap().to_string()
    }

    #[test]
    fn test_signature_parse_simple_types() {
        assert_eq!("i".parse::<Signature>().unwrap(), Type::Int32.into());
        assert_eq!("s".parse::<Signature>().unwrap(), Type::String.into());
        assert_eq!("m".parse::<Signature>().unwrap(), Signature::dynamic());
        assert_eq!("v".parse::<Signature>().unwrap(), Type::Unit.into());
    }

    #[test]
    fn test_signature_parse_containers() {
        assert_eq!(
            "[s]".parse::<Signature>().unwrap(),
            Type::List(Some(Box::new(Type::String))).into()
        );
        assert_eq!(
            "{is}".parse::<Signature>().unwrap(),
            Type::Map {
                key: Some(Box::new(Type::Int32)),
                value: Some(Box::new(Type::String)),
            }
            .into()
        );
        assert_eq!(
            "(iI[m])".parse::<Signature>().unwrap(),
            Type::Tuple(vec![
                Some(Type::Int32),
                Some(Type::UInt32),
                Some(Type::List(None)),
            ])
            .into()
        );
    }

    #[test]
    fn test_signature_display_roundtrip() {
        for src in [
            "v", "b", "c", "C", "w", "W", "i", "I", "l", "L", "f", "d", "s", "r", "o", "m", "[i]",
            "{sm}", "(i(sb)[{il}])", "()",
        ] {
            assert_eq!(roundtrip(src), src);
        }
    }

    #[test]
    fn test_signature_parse_errors() {
        assert_eq!("".parse::<Signature>(), Err(ParseError::EndOfInput));
        assert!(matches!(
            "x".parse::<Signature>(),
            Err(ParseError::UnexpectedChar('x', _))
        ));
        assert!(matches!(
            "[i".parse::<Signature>(),
            Err(ParseError::MissingListEnd(_))
        ));
        assert!(matches!(
            "{i}".parse::<Signature>(),
            Err(ParseError::MissingMapValueType(_))
        ));
        assert!(matches!(
            "(is".parse::<Signature>(),
            Err(ParseError::MissingTupleEnd(_))
        ));
        // Trailing garbage is rejected.
        assert!(matches!(
            "iv".parse::<Signature>(),
            Err(ParseError::UnexpectedChar('v', _))
        ));
    }
}
