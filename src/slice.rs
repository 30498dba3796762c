//! Zero-copy reading of encoded values.
//!
//! A [`Slice`] is a view over bytes that start with an encoded value. Its extent is not stored;
//! it is always derived from the tag byte and the length fields that follow it, so a `Slice`
//! can point into the middle of a larger buffer.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::integer::{sign_extend, Integer};
use crate::iterator::{ArrayIterator, ObjectIterator};
use crate::translator::AttributeTranslator;
use crate::value_type::*;
use crate::varint;

/// A borrowed, read-only view of one encoded value.
#[derive(Clone, Copy)]
pub struct Slice<'a> {
    data: &'a [u8],
    translator: Option<&'a dyn AttributeTranslator>,
}

pub(crate) fn to_usize(v: u64) -> Result<usize> {
    usize::try_from(v).map_err(|_| Error::NumberOutOfRange)
}

impl<'a> Slice<'a> {
    /// View the value starting at the first byte of `data`. Bytes past the end of the value are
    /// ignored.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            translator: None,
        }
    }

    /// Attach a translator used to resolve integer object keys.
    pub fn with_translator(mut self, translator: &'a dyn AttributeTranslator) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn translator(&self) -> Option<&'a dyn AttributeTranslator> {
        self.translator
    }

    pub fn none() -> Slice<'static> {
        Slice::new(&[0x00])
    }

    pub fn null() -> Slice<'static> {
        Slice::new(&[0x18])
    }

    pub fn true_slice() -> Slice<'static> {
        Slice::new(&[0x1a])
    }

    pub fn false_slice() -> Slice<'static> {
        Slice::new(&[0x19])
    }

    pub fn empty_array() -> Slice<'static> {
        Slice::new(&[0x01])
    }

    pub fn empty_object() -> Slice<'static> {
        Slice::new(&[0x0a])
    }

    pub fn min_key() -> Slice<'static> {
        Slice::new(&[0x1e])
    }

    pub fn max_key() -> Slice<'static> {
        Slice::new(&[0x1f])
    }

    /// The tag byte. An empty view reads as `0x00`, the None tag.
    #[inline]
    pub fn head(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    #[inline]
    pub fn value_type(&self) -> ValueType {
        ValueType::from_u8(self.head())
    }

    /// The child value starting `offset` bytes into this one.
    pub(crate) fn slice_at(&self, offset: u64) -> Result<Slice<'a>> {
        let offset = to_usize(offset)?;
        let data = self.data.get(offset..).ok_or(Error::LengthTooShort {
            step: "locate member",
            actual: self.data.len(),
            expected: offset,
        })?;
        Ok(Slice {
            data,
            translator: self.translator,
        })
    }

    /// Offset just past a member of `size` bytes starting at `offset`. Sizes come from untrusted
    /// length fields, so the sum may not fit.
    pub(crate) fn offset_after(&self, offset: u64, size: u64) -> Result<u64> {
        offset.checked_add(size).ok_or(Error::LengthTooShort {
            step: "skip member",
            actual: self.data.len(),
            expected: usize::MAX,
        })
    }

    fn invalid(&self, expected: &'static str) -> Error {
        Error::InvalidType {
            expected,
            actual: self.value_type(),
        }
    }

    fn bytes_at(&self, start: usize, len: u64) -> Result<&'a [u8]> {
        let end = start
            .checked_add(to_usize(len)?)
            .ok_or(Error::NumberOutOfRange)?;
        self.data.get(start..end).ok_or(Error::LengthTooShort {
            step: "read payload",
            actual: self.data.len(),
            expected: end,
        })
    }

    /// Total number of bytes taken by this value, tag included.
    pub fn byte_size(&self) -> Result<u64> {
        let h = self.head();
        let fixed = FIXED_TYPE_LENGTHS[h as usize];
        if fixed != 0 {
            return Ok(fixed as u64);
        }
        let prefixed = |width: usize| -> Result<u64> {
            let len = varint::read_uint_le(self.data, 1, width)?;
            Ok(len.saturating_add(1 + width as u64))
        };
        match self.value_type() {
            ValueType::Array | ValueType::Object => {
                if is_compact_tag(h) {
                    varint::read(self.data, 1)
                } else {
                    varint::read_uint_le(self.data, 1, WIDTH_MAP[h as usize] as usize)
                }
            }
            // Only the long string tag is left over once fixed lengths are handled
            ValueType::String => prefixed(8),
            ValueType::Binary => prefixed((h - 0xbf) as usize),
            ValueType::Bcd => {
                if h <= 0xcf {
                    prefixed((h - 0xc7) as usize)
                } else {
                    prefixed((h - 0xcf) as usize)
                }
            }
            ValueType::Custom => match h {
                0xf4..=0xf6 => prefixed(1),
                0xf7..=0xf9 => prefixed(2),
                0xfa..=0xfc => prefixed(4),
                _ => prefixed(8),
            },
            _ => Err(Error::Internal("tag has no byte size")),
        }
    }

    /// The bytes of exactly this value.
    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        let size = self.byte_size()?;
        self.bytes_at(0, size)
    }

    /// Offset of the first member of a non-empty, non-compact array or object. The builder
    /// leaves zero padding between a short header and the first member, and no member starts
    /// with a zero byte.
    pub(crate) fn find_data_offset(&self, h: u8) -> u64 {
        let fsm = FIRST_SUB_MAP[h as usize];
        let at = |i: usize| self.data.get(i).copied().unwrap_or(0);
        if fsm <= 2 && at(2) != 0 {
            2
        } else if fsm <= 3 && at(3) != 0 {
            3
        } else if fsm <= 5 && at(5) != 0 {
            5
        } else {
            9
        }
    }

    /// Offset of the first member of a compact array or object.
    pub(crate) fn compact_data_offset(&self) -> Result<u64> {
        let end = varint::read(self.data, 1)?;
        Ok(1 + varint::encoded_len(end) as u64)
    }

    fn compact_length(&self) -> Result<u64> {
        let end = to_usize(varint::read(self.data, 1)?)?;
        let last = end
            .checked_sub(1)
            .ok_or(Error::Internal("compact value with zero length"))?;
        varint::read_reversed(self.data, last)
    }

    /// Member count of an array without offset table, from the first member's size.
    fn uniform_length(&self, h: u8, end: u64) -> Result<(u64, u64)> {
        let first = self.find_data_offset(h);
        let size = self.slice_at(first)?.byte_size()?;
        if size == 0 {
            return Err(Error::Internal("zero byte size member"));
        }
        Ok((end.saturating_sub(first) / size, first))
    }

    /// Number of members of an array or object.
    pub fn length(&self) -> Result<u64> {
        let h = self.head();
        if !is_array_tag(h) && !is_object_tag(h) {
            return Err(self.invalid("array or object"));
        }
        if h == 0x01 || h == 0x0a {
            return Ok(0);
        }
        if is_compact_tag(h) {
            return self.compact_length();
        }
        let width = WIDTH_MAP[h as usize] as usize;
        let end = varint::read_uint_le(self.data, 1, width)?;
        if h <= 0x05 {
            Ok(self.uniform_length(h, end)?.0)
        } else if width < 8 {
            varint::read_uint_le(self.data, 1 + width, width)
        } else {
            let pos = to_usize(end)?
                .checked_sub(width)
                .ok_or(Error::Internal("count field outside value"))?;
            varint::read_uint_le(self.data, pos, width)
        }
    }

    /// Offset of member `index`, relative to the start of this value.
    pub(crate) fn nth_offset(&self, index: u64) -> Result<u64> {
        let h = self.head();
        if is_compact_tag(h) {
            return self.nth_offset_compact(index);
        }
        if h == 0x01 || h == 0x0a {
            return Err(Error::IndexOutOfBounds { index, length: 0 });
        }
        let width = WIDTH_MAP[h as usize] as usize;
        let end = varint::read_uint_le(self.data, 1, width)?;
        let mut data_offset = 0;
        let n = if h <= 0x05 {
            let (n, first) = self.uniform_length(h, end)?;
            data_offset = first;
            n
        } else if width < 8 {
            varint::read_uint_le(self.data, 1 + width, width)?
        } else {
            let pos = to_usize(end)?
                .checked_sub(width)
                .ok_or(Error::Internal("count field outside value"))?;
            varint::read_uint_le(self.data, pos, width)?
        };
        if index >= n {
            return Err(Error::IndexOutOfBounds { index, length: n });
        }
        if h <= 0x05 || n == 1 {
            if data_offset == 0 {
                data_offset = self.find_data_offset(h);
            }
            let stride = self.slice_at(data_offset)?.byte_size()?;
            return Ok(data_offset + index * stride);
        }
        let table_len = n
            .checked_mul(width as u64)
            .ok_or(Error::Internal("offset table too long"))?;
        let count_len = if width == 8 { 8 } else { 0 };
        let table = end
            .checked_sub(
                table_len
                    .checked_add(count_len)
                    .ok_or(Error::Internal("offset table too long"))?,
            )
            .ok_or(Error::Internal("offset table outside value"))?;
        let pos = to_usize(table + index * width as u64)?;
        varint::read_uint_le(self.data, pos, width)
    }

    fn nth_offset_compact(&self, index: u64) -> Result<u64> {
        let n = self.compact_length()?;
        if index >= n {
            return Err(Error::IndexOutOfBounds { index, length: n });
        }
        let is_object = self.head() == 0x14;
        let mut offset = self.compact_data_offset()?;
        for _ in 0..index {
            offset = self.offset_after(offset, self.slice_at(offset)?.byte_size()?)?;
            if is_object {
                offset = self.offset_after(offset, self.slice_at(offset)?.byte_size()?)?;
            }
        }
        Ok(offset)
    }

    /// Member `index` of an array.
    pub fn at(&self, index: u64) -> Result<Slice<'a>> {
        if !self.is_array() {
            return Err(self.invalid("array"));
        }
        self.slice_at(self.nth_offset(index)?)
    }

    /// Raw key of member `index` of an object. Keys written through a translator come back as
    /// integer slices; see [`Slice::key_name_at`].
    pub fn key_at(&self, index: u64) -> Result<Slice<'a>> {
        if !self.is_object() {
            return Err(self.invalid("object"));
        }
        self.slice_at(self.nth_offset(index)?)
    }

    /// Key name of member `index` of an object, translating integer keys.
    pub fn key_name_at(&self, index: u64) -> Result<Cow<'a, str>> {
        self.key_at(index)?.make_key()
    }

    /// Value of member `index` of an object.
    pub fn value_at(&self, index: u64) -> Result<Slice<'a>> {
        if !self.is_object() {
            return Err(self.invalid("object"));
        }
        let offset = self.nth_offset(index)?;
        let key = self.slice_at(offset)?;
        self.slice_at(self.offset_after(offset, key.byte_size()?)?)
    }

    /// Interpret this value as an object key: strings as-is, integers through the translator.
    pub fn make_key(&self) -> Result<Cow<'a, str>> {
        match self.value_type() {
            ValueType::String => Ok(Cow::Borrowed(self.get_string()?)),
            ValueType::SmallInt | ValueType::UInt => {
                let name = self.translate_key()?;
                Ok(Cow::Owned(name.to_string()))
            }
            _ => Err(self.invalid("string or attribute ID")),
        }
    }

    fn translate_key(&self) -> Result<std::sync::Arc<str>> {
        let translator = self.translator.ok_or(Error::NeedAttributeTranslator)?;
        let id = self.get_uint()?;
        translator
            .id_to_string(id)
            .ok_or(Error::NeedAttributeTranslator)
    }

    /// Key bytes for comparisons, without UTF-8 validation.
    pub(crate) fn key_bytes(&self) -> Result<Cow<'a, [u8]>> {
        match self.value_type() {
            ValueType::String => Ok(Cow::Borrowed(self.get_string_bytes()?)),
            ValueType::SmallInt | ValueType::UInt => {
                let name = self.translate_key()?;
                Ok(Cow::Owned(name.as_bytes().to_vec()))
            }
            _ => Err(self.invalid("string or attribute ID")),
        }
    }

    /// Look up `key` in an object. Sorted objects are binary searched, all others scanned.
    pub fn get(&self, key: &str) -> Result<Option<Slice<'a>>> {
        let h = self.head();
        if !is_object_tag(h) {
            return Err(self.invalid("object"));
        }
        if h == 0x0a {
            return Ok(None);
        }
        if self.is_sorted() {
            self.search_sorted(key.as_bytes())
        } else {
            self.search_linear(key.as_bytes())
        }
    }

    fn search_sorted(&self, target: &[u8]) -> Result<Option<Slice<'a>>> {
        let mut lo = 0;
        let mut hi = self.length()?;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let offset = self.nth_offset(mid)?;
            let key = self.slice_at(offset)?;
            match key.key_bytes()?.as_ref().cmp(target) {
                Ordering::Equal => {
                    return self
                        .slice_at(self.offset_after(offset, key.byte_size()?)?)
                        .map(Some)
                }
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    fn search_linear(&self, target: &[u8]) -> Result<Option<Slice<'a>>> {
        for member in self.object_iter()? {
            let (key, value) = member?;
            if key.key_bytes()?.as_ref() == target {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Follow a path of keys through nested objects. An empty path returns this value.
    pub fn get_path(&self, path: &[&str]) -> Result<Option<Slice<'a>>> {
        let mut current = *self;
        for key in path {
            match current.get(key)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn array_iter(&self) -> Result<ArrayIterator<'a>> {
        ArrayIterator::new(*self)
    }

    pub fn object_iter(&self) -> Result<ObjectIterator<'a>> {
        ObjectIterator::new(*self)
    }

    pub fn is_none(&self) -> bool {
        self.value_type() == ValueType::None
    }

    pub fn is_illegal(&self) -> bool {
        self.value_type() == ValueType::Illegal
    }

    pub fn is_null(&self) -> bool {
        self.value_type() == ValueType::Null
    }

    pub fn is_bool(&self) -> bool {
        self.value_type() == ValueType::Bool
    }

    pub fn is_true(&self) -> bool {
        self.head() == 0x1a
    }

    pub fn is_false(&self) -> bool {
        self.head() == 0x19
    }

    pub fn is_array(&self) -> bool {
        self.value_type() == ValueType::Array
    }

    pub fn is_object(&self) -> bool {
        self.value_type() == ValueType::Object
    }

    pub fn is_empty_array(&self) -> bool {
        self.head() == 0x01
    }

    pub fn is_empty_object(&self) -> bool {
        self.head() == 0x0a
    }

    pub fn is_double(&self) -> bool {
        self.value_type() == ValueType::Double
    }

    pub fn is_utc_date(&self) -> bool {
        self.value_type() == ValueType::UtcDate
    }

    pub fn is_min_key(&self) -> bool {
        self.value_type() == ValueType::MinKey
    }

    pub fn is_max_key(&self) -> bool {
        self.value_type() == ValueType::MaxKey
    }

    pub fn is_int(&self) -> bool {
        self.value_type() == ValueType::Int
    }

    pub fn is_uint(&self) -> bool {
        self.value_type() == ValueType::UInt
    }

    pub fn is_small_int(&self) -> bool {
        self.value_type() == ValueType::SmallInt
    }

    /// Any of the three integer encodings.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.value_type(),
            ValueType::Int | ValueType::UInt | ValueType::SmallInt
        )
    }

    pub fn is_number(&self) -> bool {
        self.is_integer() || self.is_double()
    }

    pub fn is_string(&self) -> bool {
        self.value_type() == ValueType::String
    }

    pub fn is_binary(&self) -> bool {
        self.value_type() == ValueType::Binary
    }

    /// True for indexed objects whose offset table is sorted by key.
    pub fn is_sorted(&self) -> bool {
        (0x0b..=0x0e).contains(&self.head())
    }

    pub fn get_bool(&self) -> Result<bool> {
        match self.head() {
            0x19 => Ok(false),
            0x1a => Ok(true),
            _ => Err(self.invalid("bool")),
        }
    }

    pub fn get_double(&self) -> Result<f64> {
        if !self.is_double() {
            return Err(self.invalid("double"));
        }
        let bytes = self.bytes_at(1, 8)?;
        Ok(LittleEndian::read_f64(bytes))
    }

    pub fn get_int(&self) -> Result<i64> {
        let h = self.head();
        match h {
            0x20..=0x27 => {
                let width = (h - 0x1f) as usize;
                let raw = varint::read_uint_le(self.data, 1, width)?;
                Ok(sign_extend(raw, width))
            }
            0x28..=0x2f => {
                let v = varint::read_uint_le(self.data, 1, (h - 0x27) as usize)?;
                i64::try_from(v).map_err(|_| Error::NumberOutOfRange)
            }
            0x30..=0x39 => Ok((h - 0x30) as i64),
            0x3a..=0x3f => Ok(h as i64 - 0x40),
            _ => Err(self.invalid("integer")),
        }
    }

    pub fn get_uint(&self) -> Result<u64> {
        let h = self.head();
        match h {
            0x28..=0x2f => varint::read_uint_le(self.data, 1, (h - 0x27) as usize),
            0x20..=0x27 | 0x30..=0x3f => {
                let v = self.get_int()?;
                u64::try_from(v).map_err(|_| Error::NumberOutOfRange)
            }
            _ => Err(self.invalid("integer")),
        }
    }

    /// The value of a small int, or of any other integer that fits an `i64`.
    pub fn get_small_int(&self) -> Result<i64> {
        self.get_int()
    }

    pub fn get_integer(&self) -> Result<Integer> {
        match self.value_type() {
            ValueType::UInt => Ok(Integer::from(self.get_uint()?)),
            ValueType::Int | ValueType::SmallInt => Ok(Integer::from(self.get_int()?)),
            _ => Err(self.invalid("integer")),
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn get_utc_date(&self) -> Result<i64> {
        if !self.is_utc_date() {
            return Err(self.invalid("UTC date"));
        }
        let bytes = self.bytes_at(1, 8)?;
        Ok(LittleEndian::read_i64(bytes))
    }

    /// Raw bytes of a string, without checking that they are UTF-8.
    pub fn get_string_bytes(&self) -> Result<&'a [u8]> {
        let h = self.head();
        match h {
            0x40..=0xbe => self.bytes_at(1, (h - 0x40) as u64),
            0xbf => {
                let len = varint::read_uint_le(self.data, 1, 8)?;
                self.bytes_at(9, len)
            }
            _ => Err(self.invalid("string")),
        }
    }

    pub fn get_string(&self) -> Result<&'a str> {
        let bytes = self.get_string_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8Sequence)
    }

    /// Length of a string in bytes.
    pub fn get_string_length(&self) -> Result<u64> {
        let h = self.head();
        match h {
            0x40..=0xbe => Ok((h - 0x40) as u64),
            0xbf => varint::read_uint_le(self.data, 1, 8),
            _ => Err(self.invalid("string")),
        }
    }

    pub fn get_binary(&self) -> Result<&'a [u8]> {
        let h = self.head();
        if !self.is_binary() {
            return Err(self.invalid("binary"));
        }
        let width = (h - 0xbf) as usize;
        let len = varint::read_uint_le(self.data, 1, width)?;
        self.bytes_at(1 + width, len)
    }

    pub fn get_binary_length(&self) -> Result<u64> {
        if !self.is_binary() {
            return Err(self.invalid("binary"));
        }
        varint::read_uint_le(self.data, 1, (self.head() - 0xbf) as usize)
    }
}

impl<'a> fmt::Debug for Slice<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Slice({}", self.value_type())?;
        let bytes = self.as_bytes().unwrap_or(self.data);
        for b in bytes.iter().take(64) {
            write!(f, " {:02x}", b)?;
        }
        if bytes.len() > 64 {
            f.write_str(" ...")?;
        }
        f.write_str(")")
    }
}

impl<'a, 'b> PartialEq<Slice<'b>> for Slice<'a> {
    fn eq(&self, other: &Slice<'b>) -> bool {
        match (self.as_bytes(), other.as_bytes()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
