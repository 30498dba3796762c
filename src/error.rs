use std::fmt;

use serde::{de, ser};

use crate::value_type::ValueType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A compound value was opened, or an iterator copied, where only an array member may go.
    NeedOpenArray,
    /// A key or key/value pair was added outside of an open object.
    NeedOpenObject,
    /// The builder has no open array or object.
    NeedOpenCompound,
    /// A key was added while the previous key still waits for its value.
    KeyAlreadyWritten,
    /// An object expected a key, but the value added was not a string.
    KeyMustBeString,
    /// `remove_last` was called on a compound value with no members.
    NeedSubValue,
    /// A getter was called on a value of the wrong type.
    InvalidType {
        expected: &'static str,
        actual: ValueType,
    },
    /// A value of this type can't be added to a builder.
    UnexpectedType(ValueType),
    /// Number doesn't fit in the requested integer type.
    NumberOutOfRange,
    /// Member index past the end of an array or object.
    IndexOutOfBounds { index: u64, length: u64 },
    /// String bytes are not valid UTF-8.
    InvalidUtf8Sequence,
    /// Object closed with the same key twice while uniqueness checking is on.
    DuplicateAttributeName(String),
    /// An integer object key was found but no attribute translator is configured, or the
    /// translator doesn't know the ID.
    NeedAttributeTranslator,
    /// The builder still has open compound values.
    BuilderNotSealed,
    /// Encoded data ended before the value it describes.
    LengthTooShort {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// Decoding hit the nesting depth limit.
    ParseLimit(String),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
    /// Broken invariant inside the codec, or data no builder could have produced.
    Internal(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::NeedOpenArray => f.write_str("Need open array"),
            Error::NeedOpenObject => f.write_str("Need open object"),
            Error::NeedOpenCompound => f.write_str("Need open array or object"),
            Error::KeyAlreadyWritten => f.write_str("Key already written"),
            Error::KeyMustBeString => f.write_str("Object key must be a string"),
            Error::NeedSubValue => f.write_str("Need a sub-value to remove"),
            Error::InvalidType { expected, actual } => {
                write!(f, "Expected {} but value is {}", expected, actual)
            }
            Error::UnexpectedType(ty) => write!(f, "Unexpected value type {}", ty),
            Error::NumberOutOfRange => f.write_str("Number out of range"),
            Error::IndexOutOfBounds { index, length } => write!(
                f,
                "Index {} out of bounds for compound value of length {}",
                index, length
            ),
            Error::InvalidUtf8Sequence => f.write_str("Invalid UTF-8 sequence"),
            Error::DuplicateAttributeName(ref name) => {
                write!(f, "Duplicate attribute name \"{}\"", name)
            }
            Error::NeedAttributeTranslator => f.write_str("Need attribute translator"),
            Error::BuilderNotSealed => f.write_str("Builder value not yet sealed"),
            Error::LengthTooShort {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected data length {}, but got {} on step [{}]",
                expected, actual, step
            ),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}
