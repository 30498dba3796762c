//! vpack is a compact, self-describing binary format with zero-copy random access. It encodes
//! the usual JSON data model plus a few extras:
//!
//! - Signed and unsigned integers up to 64 bits, stored in as few bytes as they need
//! - Doubles, UTC timestamps in milliseconds, and raw binary values
//! - Min and max key markers that sort below and above everything else
//! - Arrays and objects with an offset index, so any member can be reached without decoding the
//! 	ones before it
//! - Objects whose keys are sorted on close, making key lookups a binary search
//! - A compact layout for arrays and objects, trading the index for size
//! - Attribute translation, replacing frequently used object keys with small integers
//!
//! Values are written with a [`Builder`] and read back with a [`Slice`], which is just a view
//! over the encoded bytes. [`Value`] holds a decoded tree when owning the data is more
//! convenient, and [`to_vec`] and [`from_slice`] map any serde type to and from the format.
//!
//! ```
//! # use vpack::*;
//! # fn main() -> Result<()> {
//! let mut b = Builder::new();
//! b.open_array()?;
//! b.add_uint(1)?;
//! b.add_string("two")?;
//! b.add_double(3.0)?;
//! b.close()?;
//!
//! let s = b.slice()?;
//! assert_eq!(s.length()?, 3);
//! assert_eq!(s.at(1)?.get_string()?, "two");
//! # Ok(())
//! # }
//! ```

mod builder;
mod de;
mod depth_tracking;
mod error;
mod integer;
mod iterator;
mod ser;
mod slice;
mod translator;
mod value;
mod value_type;
mod varint;

pub use self::builder::{Builder, BuilderOptions};
pub use self::de::{from_encoded, from_slice};
pub use self::error::{Error, Result};
pub use self::integer::Integer;
pub use self::iterator::{ArrayIterator, ObjectIterator};
pub use self::ser::{serialize_into, to_vec, to_vec_with_options};
pub use self::slice::Slice;
pub use self::translator::{AttributeIdTranslator, AttributeTranslator};
pub use self::value::Value;
pub use self::value_type::ValueType;

/// The maximum nesting depth of arrays and objects that decoding to [`Value`], serde
/// deserialization, and serde serialization will follow. Deeper data fails with
/// [`Error::ParseLimit`].
pub const MAX_DEPTH: usize = 100;
