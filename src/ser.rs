//! Serialization.
//!
//! Any [`Serialize`] type can be encoded through [`to_vec`], which drives a [`Builder`]. Structs
//! and maps become objects, sequences and tuples become arrays, and byte slices become binary
//! values. Map keys must serialize as strings, chars, or integers; integers are written out in
//! decimal.
//!
//! Enum variants, when mapped, are:
//! - Unit - Just the variant name as a string
//! - Newtype - Object with one member. Key is variant name, content is the value
//! - Tuple - Object with one member. Key is variant name, content is the tuple as an array
//! - Struct - Object with one member. Key is variant name, content is the struct
//!
//! [`Slice`] implements [`Serialize`] as well, so encoded data can be dumped into any other
//! serde format. Human-readable formats get binary values as base64 strings.

use base64::Engine;
use serde::ser::Error as SerError;
use serde::ser::*;

use crate::builder::{Builder, BuilderOptions};
use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::slice::Slice;
use crate::value_type::ValueType;
use crate::MAX_DEPTH;

/// Serialize `value` into a freshly allocated buffer.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    to_vec_with_options(value, BuilderOptions::default())
}

/// Serialize `value`, closing compounds according to `options`.
pub fn to_vec_with_options<T: Serialize + ?Sized>(
    value: &T,
    options: BuilderOptions,
) -> Result<Vec<u8>> {
    let mut builder = Builder::with_options(options);
    serialize_into(&mut builder, value)?;
    builder.into_bytes()
}

/// Serialize `value` as the next value of `builder`. This can be a member of an array the
/// builder has open, or the value following a key.
pub fn serialize_into<T: Serialize + ?Sized>(builder: &mut Builder, value: &T) -> Result<()> {
    let mut se = VpackSerializer { builder };
    value.serialize(&mut se)
}

struct VpackSerializer<'b> {
    builder: &'b mut Builder,
}

impl<'b> VpackSerializer<'b> {
    fn check_depth(&self) -> Result<()> {
        if self.builder.depth() >= MAX_DEPTH {
            return Err(Error::ParseLimit(format!(
                "nesting deeper than {} levels",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn open_array(&mut self) -> Result<()> {
        self.check_depth()?;
        self.builder.open_array()
    }

    fn open_object(&mut self) -> Result<()> {
        self.check_depth()?;
        self.builder.open_object()
    }

    /// Open the single-member object wrapping a non-unit enum variant.
    fn open_variant(&mut self, variant: &str) -> Result<()> {
        self.open_object()?;
        self.builder.add_key(variant)
    }
}

impl<'a, 'b> Serializer for &'a mut VpackSerializer<'b> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Compound<'a, 'b>;
    type SerializeTuple = Compound<'a, 'b>;
    type SerializeTupleStruct = Compound<'a, 'b>;
    type SerializeTupleVariant = Compound<'a, 'b>;
    type SerializeMap = MapSerializer<'a, 'b>;
    type SerializeStruct = Compound<'a, 'b>;
    type SerializeStructVariant = Compound<'a, 'b>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.builder.add_bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.builder.add_int(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.builder.add_uint(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.builder.add_double(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.builder.add_string(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.builder.add_string(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.builder.add_binary(v)
    }

    fn serialize_none(self) -> Result<()> {
        self.builder.add_null()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.builder.add_null()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.builder.add_string(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.open_variant(variant)?;
        value.serialize(&mut *self)?;
        self.builder.close()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.open_array()?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        self.open_array()?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        // Tuple structs usually just discard the name
        self.open_array()?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.open_variant(variant)?;
        self.open_array()?;
        Ok(Compound::new(self, 2))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.open_object()?;
        Ok(MapSerializer {
            se: self,
            key: String::new(),
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.open_object()?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.open_variant(variant)?;
        self.open_object()?;
        Ok(Compound::new(self, 2))
    }
}

/// Members of an array or object being serialized. Variants wrap their content in an extra
/// object, so they have two compounds to close at the end.
struct Compound<'a, 'b> {
    se: &'a mut VpackSerializer<'b>,
    closes: usize,
}

impl<'a, 'b> Compound<'a, 'b> {
    fn new(se: &'a mut VpackSerializer<'b>, closes: usize) -> Self {
        Self { se, closes }
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.se.builder.add_key(key)?;
        value.serialize(&mut *self.se)
    }

    fn finish(self) -> Result<()> {
        for _ in 0..self.closes {
            self.se.builder.close()?;
        }
        Ok(())
    }
}

impl<'a, 'b> SerializeSeq for Compound<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'b> SerializeTuple for Compound<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'b> SerializeTupleStruct for Compound<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'b> SerializeTupleVariant for Compound<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'b> SerializeStruct for Compound<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.field(key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'b> SerializeStructVariant for Compound<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.field(key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

struct MapSerializer<'a, 'b> {
    se: &'a mut VpackSerializer<'b>,
    key: String,
}

impl<'a, 'b> SerializeMap for MapSerializer<'a, 'b> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        key.serialize(KeySerializer::new(&mut self.key))?;
        self.se.builder.add_key(&self.key)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.se.builder.close()
    }
}

/// Turns a map key into the string it will be stored as.
struct KeySerializer<'a> {
    s: &'a mut String,
}

impl<'a> KeySerializer<'a> {
    fn new(s: &'a mut String) -> Self {
        s.clear();
        Self { s }
    }

    fn ser_fail(&self, received: &'static str) -> Error {
        Error::SerdeFail(format!("map keys must be strings, received {}", received))
    }

    fn push_display(self, v: impl std::fmt::Display) -> Result<()> {
        use std::fmt::Write;
        write!(self.s, "{}", v).map_err(|_| Error::Internal("formatting key failed"))
    }
}

impl<'a> Serializer for KeySerializer<'a> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.s.push(v);
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.s.push_str(v);
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.s.push_str(variant);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.push_display(v)
    }

    fn serialize_bool(self, _: bool) -> Result<()> {
        Err(self.ser_fail("bool"))
    }

    fn serialize_f32(self, _: f32) -> Result<()> {
        Err(self.ser_fail("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<()> {
        Err(self.ser_fail("f64"))
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<()> {
        Err(self.ser_fail("bytes"))
    }

    fn serialize_none(self) -> Result<()> {
        Err(self.ser_fail("None"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _: &T) -> Result<()> {
        Err(self.ser_fail("Some"))
    }

    fn serialize_unit(self) -> Result<()> {
        Err(self.ser_fail("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<()> {
        Err(self.ser_fail("unit_struct"))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(self.ser_fail("newtype_variant"))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(self.ser_fail("seq"))
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        Err(self.ser_fail("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(self.ser_fail("tuple_struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(self.ser_fail("tuple_variant"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(self.ser_fail("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(self.ser_fail("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(self.ser_fail("struct_variant"))
    }
}

impl<'a> Serialize for Slice<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SliceDump {
            slice: *self,
            depth: DepthTracker::new(),
        }
        .serialize(serializer)
    }
}

/// A slice being written out to another format, with the nesting depth reached so far.
struct SliceDump<'a> {
    slice: Slice<'a>,
    depth: DepthTracker,
}

impl<'a> Serialize for SliceDump<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fail = |e: Error| <S::Error as SerError>::custom(e);
        let slice = self.slice;
        match slice.value_type() {
            ValueType::Null => serializer.serialize_unit(),
            ValueType::Bool => serializer.serialize_bool(slice.get_bool().map_err(fail)?),
            ValueType::Double => serializer.serialize_f64(slice.get_double().map_err(fail)?),
            ValueType::UtcDate => serializer.serialize_i64(slice.get_utc_date().map_err(fail)?),
            ValueType::Int | ValueType::UInt | ValueType::SmallInt => {
                slice.get_integer().map_err(fail)?.serialize(serializer)
            }
            ValueType::String => serializer.serialize_str(slice.get_string().map_err(fail)?),
            ValueType::Binary => {
                let bytes = slice.get_binary().map_err(fail)?;
                if serializer.is_human_readable() {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                    serializer.serialize_str(&encoded)
                } else {
                    serializer.serialize_bytes(bytes)
                }
            }
            ValueType::Array => {
                let depth = self.depth.enter().map_err(fail)?;
                let iter = slice.array_iter().map_err(fail)?;
                let mut seq = serializer.serialize_seq(Some(iter.len()))?;
                for item in iter {
                    seq.serialize_element(&SliceDump {
                        slice: item.map_err(fail)?,
                        depth,
                    })?;
                }
                seq.end()
            }
            ValueType::Object => {
                let depth = self.depth.enter().map_err(fail)?;
                let iter = slice.object_iter().map_err(fail)?;
                let mut map = serializer.serialize_map(Some(iter.len()))?;
                for member in iter {
                    let (key, value) = member.map_err(fail)?;
                    let key = key.make_key().map_err(fail)?;
                    map.serialize_entry(&*key, &SliceDump { slice: value, depth })?;
                }
                map.end()
            }
            other => Err(<S::Error as SerError>::custom(format!(
                "{} values have no serde representation",
                other
            ))),
        }
    }
}
