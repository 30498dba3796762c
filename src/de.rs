//! Deserialization.
//!
//! [`from_slice`] reads the first value of a buffer into any [`Deserialize`] type, following the
//! same mapping as [`to_vec`](crate::to_vec). Strings, binary values, and object keys are
//! borrowed straight from the buffer where the target type allows it. Keys written as
//! attribute IDs need the slice to carry a translator; use [`from_encoded`] for those.

use std::borrow::Cow;

use serde::de::Error as DeError;
use serde::de::*;

use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::integer::{get_int_internal, IntPriv};
use crate::iterator::{ArrayIterator, ObjectIterator};
use crate::slice::Slice;
use crate::value_type::ValueType;

/// Deserialize the first value encoded in `buf`. Trailing bytes are ignored.
pub fn from_slice<'de, T: Deserialize<'de>>(buf: &'de [u8]) -> Result<T> {
    from_encoded(Slice::new(buf))
}

/// Deserialize an already located value, resolving translated keys through the slice's
/// translator.
pub fn from_encoded<'de, T: Deserialize<'de>>(slice: Slice<'de>) -> Result<T> {
    T::deserialize(VpackDeserializer::new(slice, DepthTracker::new()))
}

struct VpackDeserializer<'de> {
    slice: Slice<'de>,
    depth_tracking: DepthTracker,
}

impl<'de> VpackDeserializer<'de> {
    fn new(slice: Slice<'de>, depth_tracking: DepthTracker) -> Self {
        Self {
            slice,
            depth_tracking,
        }
    }

    fn unexpected(&self) -> Unexpected<'de> {
        match self.slice.value_type() {
            ValueType::Null => Unexpected::Unit,
            ValueType::Bool => Unexpected::Other("bool"),
            ValueType::Array => Unexpected::Seq,
            ValueType::Object => Unexpected::Map,
            ValueType::String => Unexpected::Other("string"),
            ValueType::Binary => Unexpected::Other("binary"),
            _ => Unexpected::Other(self.slice.value_type().name()),
        }
    }
}

impl<'de> serde::Deserializer<'de> for VpackDeserializer<'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let slice = self.slice;
        match slice.value_type() {
            ValueType::Null => visitor.visit_unit(),
            ValueType::Bool => visitor.visit_bool(slice.get_bool()?),
            ValueType::Int | ValueType::UInt | ValueType::SmallInt => {
                match get_int_internal(&slice.get_integer()?) {
                    IntPriv::PosInt(v) => visitor.visit_u64(v),
                    IntPriv::NegInt(v) => visitor.visit_i64(v),
                }
            }
            ValueType::Double => visitor.visit_f64(slice.get_double()?),
            ValueType::UtcDate => visitor.visit_i64(slice.get_utc_date()?),
            ValueType::String => visitor.visit_borrowed_str(slice.get_string()?),
            ValueType::Binary => visitor.visit_borrowed_bytes(slice.get_binary()?),
            ValueType::Array => {
                let depth_tracking = self.depth_tracking.enter()?;
                visitor.visit_seq(SeqAccess {
                    iter: slice.array_iter()?,
                    depth_tracking,
                })
            }
            ValueType::Object => {
                let depth_tracking = self.depth_tracking.enter()?;
                visitor.visit_map(MapAccess {
                    iter: slice.object_iter()?,
                    value: None,
                    depth_tracking,
                })
            }
            other => Err(Error::UnexpectedType(other)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.slice.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.slice.value_type() {
            ValueType::String => visitor.visit_enum(EnumAccess {
                variant: self.slice.make_key()?,
                content: None,
                depth_tracking: self.depth_tracking,
            }),
            ValueType::Object => {
                if self.slice.length()? != 1 {
                    return Err(DeError::invalid_length(
                        usize::try_from(self.slice.length()?).unwrap_or(usize::MAX),
                        &"an object with exactly one member",
                    ));
                }
                let depth_tracking = self.depth_tracking.enter()?;
                let (key, content) = self
                    .slice
                    .object_iter()?
                    .next()
                    .ok_or(Error::Internal("object member count mismatch"))??;
                visitor.visit_enum(EnumAccess {
                    variant: key.make_key()?,
                    content: Some(content),
                    depth_tracking,
                })
            }
            _ => Err(DeError::invalid_type(
                self.unexpected(),
                &"variant name or single-member object",
            )),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str
        string bytes byte_buf unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct SeqAccess<'de> {
    iter: ArrayIterator<'de>,
    depth_tracking: DepthTracker,
}

impl<'de> serde::de::SeqAccess<'de> for SeqAccess<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(item) => seed
                .deserialize(VpackDeserializer::new(item?, self.depth_tracking))
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapAccess<'de> {
    iter: ObjectIterator<'de>,
    value: Option<Slice<'de>>,
    depth_tracking: DepthTracker,
}

impl<'de> serde::de::MapAccess<'de> for MapAccess<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(member) => {
                let (key, value) = member?;
                self.value = Some(value);
                seed.deserialize(KeyDeserializer(key.make_key()?)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .value
            .take()
            .ok_or_else(|| Error::SerdeFail("value requested before its key".to_string()))?;
        seed.deserialize(VpackDeserializer::new(value, self.depth_tracking))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// Integer map keys are written as decimal strings and parsed back here.
macro_rules! deserialize_numeric_key {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            match self.0.parse::<$ty>() {
                Ok(v) => visitor.$visit(v),
                Err(_) => Err(DeError::invalid_value(
                    Unexpected::Str(&self.0),
                    &stringify!($ty),
                )),
            }
        }
    };
}

/// An object key or enum variant name. Borrowed from the buffer unless it came from a
/// translator.
struct KeyDeserializer<'de>(Cow<'de, str>);

impl<'de> serde::Deserializer<'de> for KeyDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Cow::Borrowed(s) => visitor.visit_borrowed_str(s),
            Cow::Owned(s) => visitor.visit_string(s),
        }
    }

    deserialize_numeric_key!(deserialize_i8, visit_i8, i8);
    deserialize_numeric_key!(deserialize_i16, visit_i16, i16);
    deserialize_numeric_key!(deserialize_i32, visit_i32, i32);
    deserialize_numeric_key!(deserialize_i64, visit_i64, i64);
    deserialize_numeric_key!(deserialize_i128, visit_i128, i128);
    deserialize_numeric_key!(deserialize_u8, visit_u8, u8);
    deserialize_numeric_key!(deserialize_u16, visit_u16, u16);
    deserialize_numeric_key!(deserialize_u32, visit_u32, u32);
    deserialize_numeric_key!(deserialize_u64, visit_u64, u64);
    deserialize_numeric_key!(deserialize_u128, visit_u128, u128);

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(DeError::invalid_value(Unexpected::Str(&self.0), &"a single character")),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        bool f32 f64 str string bytes byte_buf option unit unit_struct
        seq tuple tuple_struct map struct enum identifier ignored_any
    }
}

struct EnumAccess<'de> {
    variant: Cow<'de, str>,
    content: Option<Slice<'de>>,
    depth_tracking: DepthTracker,
}

impl<'de> EnumAccess<'de> {
    fn content(&self, expected: &'static str) -> Result<VpackDeserializer<'de>> {
        match self.content {
            Some(content) => Ok(VpackDeserializer::new(content, self.depth_tracking)),
            None => Err(DeError::invalid_type(Unexpected::UnitVariant, &expected)),
        }
    }
}

impl<'de> serde::de::EnumAccess<'de> for EnumAccess<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(mut self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = std::mem::take(&mut self.variant);
        let value = seed.deserialize(KeyDeserializer(variant))?;
        Ok((value, self))
    }
}

impl<'de> serde::de::VariantAccess<'de> for EnumAccess<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.content {
            None => Ok(()),
            Some(content) => {
                Deserialize::deserialize(VpackDeserializer::new(content, self.depth_tracking))
            }
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self.content("newtype variant")?)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        serde::Deserializer::deserialize_any(self.content("tuple variant")?, visitor)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        serde::Deserializer::deserialize_any(self.content("struct variant")?, visitor)
    }
}
