//! Incremental encoding of values.
//!
//! A [`Builder`] appends values to a single growing buffer. Arrays and objects are opened,
//! filled, and closed; a compound's header is only written once it is closed, at which point
//! the builder knows its size and member count and can pick the tightest layout for it.
//!
//! ```
//! # use vpack::*;
//! # fn main() -> Result<()> {
//! let mut b = Builder::new();
//! b.open_object()?;
//! b.add_key("name")?;
//! b.add_string("vpack")?;
//! b.add_key("tags")?;
//! b.open_array()?;
//! b.add_uint(1)?;
//! b.add_uint(2)?;
//! b.close()?;
//! b.close()?;
//!
//! let s = b.slice()?;
//! assert_eq!(s.get("name")?.unwrap().get_string()?, "vpack");
//! assert_eq!(s.get_path(&["tags"])?.unwrap().length()?, 2);
//! # Ok(())
//! # }
//! ```

mod buffer;
mod stack;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use self::buffer::BuilderBuffer;
use self::stack::BuilderStack;
use crate::error::{Error, Result};
use crate::integer::{get_int_internal, int_width, uint_width, IntPriv, Integer};
use crate::iterator::{ArrayIterator, ObjectIterator};
use crate::slice::Slice;
use crate::translator::AttributeTranslator;
use crate::value::Value;
use crate::value_type::ValueType;
use crate::varint;

/// Layout choices made when closing compounds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Close every array in the compact layout, not just those opened with
    /// [`Builder::open_compact_array`].
    pub build_unindexed_arrays: bool,
    /// Close every object in the compact layout, not just those opened with
    /// [`Builder::open_compact_object`].
    pub build_unindexed_objects: bool,
    /// Fail [`Builder::close`] on objects holding the same key twice.
    pub check_attribute_uniqueness: bool,
}

// Tags of compounds that are still open.
const OPEN_ARRAY: u8 = 0x06;
const OPEN_OBJECT: u8 = 0x0b;
const OPEN_COMPACT_ARRAY: u8 = 0x13;
const OPEN_COMPACT_OBJECT: u8 = 0x14;

/// Bytes reserved after the tag of an open compound for its length and member count.
const HEADER_RESERVE: usize = 8;

fn is_open_array_tag(h: u8) -> bool {
    h == OPEN_ARRAY || h == OPEN_COMPACT_ARRAY
}

fn is_open_object_tag(h: u8) -> bool {
    h == OPEN_OBJECT || h == OPEN_COMPACT_OBJECT
}

/// Smallest width for the length, count, and offset fields of an indexed compound.
fn offset_width(span: u64, table_len: u64) -> usize {
    if span + 2 * table_len <= 0xffff {
        2
    } else if span + 4 * table_len <= 0xffff_ffff {
        4
    } else {
        8
    }
}

/// Builds encoded values into an owned buffer.
///
/// The builder is *sealed* when no array or object is open; only then can its contents be
/// read back. It may hold several top-level values one after another.
pub struct Builder {
    buf: BuilderBuffer,
    stack: BuilderStack,
    key_written: bool,
    options: BuilderOptions,
    translator: Option<Arc<dyn AttributeTranslator>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Builder")
            .field("len", &self.buf.len())
            .field("depth", &self.stack.depth())
            .field("key_written", &self.key_written)
            .field("options", &self.options)
            .field("translator", &self.translator.is_some())
            .finish()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    pub fn with_options(options: BuilderOptions) -> Self {
        Self {
            buf: BuilderBuffer::new(),
            stack: BuilderStack::new(),
            key_written: false,
            options,
            translator: None,
        }
    }

    /// Write object keys known to `translator` as their integer IDs, and resolve them again
    /// when sorting keys on close.
    pub fn with_translator(mut self, translator: Arc<dyn AttributeTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn translator(&self) -> Option<&Arc<dyn AttributeTranslator>> {
        self.translator.as_ref()
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut BuilderOptions {
        &mut self.options
    }

    /// Drop all content and open compounds. Allocations are kept for reuse.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.stack.clear();
        self.key_written = false;
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True if no array or object is open.
    pub fn is_closed(&self) -> bool {
        self.stack.is_empty()
    }

    /// True if the innermost open compound is an array.
    pub fn is_open_array(&self) -> bool {
        self.open_tag().map_or(false, is_open_array_tag)
    }

    /// True if the innermost open compound is an object.
    pub fn is_open_object(&self) -> bool {
        self.open_tag().map_or(false, is_open_object_tag)
    }

    /// Number of compounds still open.
    pub(crate) fn depth(&self) -> usize {
        self.stack.depth()
    }

    fn open_tag(&self) -> Option<u8> {
        self.stack.tos().map(|tos| self.buf[tos])
    }

    /// The encoded bytes. Fails if a compound is still open.
    pub fn bytes(&self) -> Result<&[u8]> {
        if !self.is_closed() {
            return Err(Error::BuilderNotSealed);
        }
        Ok(&self.buf)
    }

    /// A view of the first encoded value, resolving keys through this builder's translator.
    pub fn slice(&self) -> Result<Slice<'_>> {
        let slice = Slice::new(self.bytes()?);
        Ok(match self.translator.as_deref() {
            Some(t) => slice.with_translator(t),
            None => slice,
        })
    }

    /// Number of encoded bytes. Fails if a compound is still open.
    pub fn size(&self) -> Result<usize> {
        Ok(self.bytes()?.len())
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if !self.is_closed() {
            return Err(Error::BuilderNotSealed);
        }
        Ok(self.buf.into_vec())
    }

    /// Start an array. Its layout is picked on [`close`](Self::close).
    pub fn open_array(&mut self) -> Result<()> {
        self.open_compound(OPEN_ARRAY)
    }

    /// Start an array that closes in the compact layout if it can.
    pub fn open_compact_array(&mut self) -> Result<()> {
        self.open_compound(OPEN_COMPACT_ARRAY)
    }

    /// Start an object. Its layout is picked on [`close`](Self::close).
    pub fn open_object(&mut self) -> Result<()> {
        self.open_compound(OPEN_OBJECT)
    }

    /// Start an object that closes in the compact layout if it can.
    pub fn open_compact_object(&mut self) -> Result<()> {
        self.open_compound(OPEN_COMPACT_OBJECT)
    }

    fn open_compound(&mut self, tag: u8) -> Result<()> {
        if let Some(tos) = self.stack.tos() {
            if is_open_object_tag(self.buf[tos]) {
                if !self.key_written {
                    return Err(Error::NeedOpenArray);
                }
                self.key_written = false;
            } else {
                self.stack.report(self.buf.len() - tos);
            }
        }
        let start = self.buf.len();
        self.stack.push(start);
        self.buf.write_byte(tag);
        self.buf.write_bytes(0, HEADER_RESERVE);
        Ok(())
    }

    /// Account for a scalar value about to be appended at the current position.
    ///
    /// Inside an object, a value with no key pending becomes the key and has to be a string.
    fn begin_value(&mut self, is_string: bool) -> Result<()> {
        let tos = match self.stack.tos() {
            Some(tos) => tos,
            None => return Ok(()),
        };
        if is_open_object_tag(self.buf[tos]) {
            if self.key_written {
                self.key_written = false;
                return Ok(());
            }
            if !is_string {
                return Err(Error::KeyMustBeString);
            }
            self.key_written = true;
        }
        self.stack.report(self.buf.len() - tos);
        Ok(())
    }

    pub fn add_null(&mut self) -> Result<()> {
        self.begin_value(false)?;
        self.buf.write_byte(0x18);
        Ok(())
    }

    pub fn add_bool(&mut self, v: bool) -> Result<()> {
        self.begin_value(false)?;
        self.buf.write_byte(if v { 0x1a } else { 0x19 });
        Ok(())
    }

    pub fn add_double(&mut self, v: f64) -> Result<()> {
        self.begin_value(false)?;
        self.buf.write_byte(0x1b);
        self.buf.write(&v.to_le_bytes());
        Ok(())
    }

    /// Add a signed integer, using the small int tags where possible.
    pub fn add_int(&mut self, v: i64) -> Result<()> {
        self.begin_value(false)?;
        self.append_int(v);
        Ok(())
    }

    /// Add an unsigned integer, using the small int tags where possible.
    pub fn add_uint(&mut self, v: u64) -> Result<()> {
        self.begin_value(false)?;
        self.append_uint(v);
        Ok(())
    }

    pub fn add_integer(&mut self, v: Integer) -> Result<()> {
        match get_int_internal(&v) {
            IntPriv::PosInt(v) => self.add_uint(v),
            IntPriv::NegInt(v) => self.add_int(v),
        }
    }

    /// Add a point in time, in milliseconds since the Unix epoch.
    pub fn add_utc_date(&mut self, v: i64) -> Result<()> {
        self.begin_value(false)?;
        self.buf.write_byte(0x1c);
        self.buf.write(&v.to_le_bytes());
        Ok(())
    }

    pub fn add_string(&mut self, v: &str) -> Result<()> {
        self.begin_value(true)?;
        self.append_string(v);
        Ok(())
    }

    pub fn add_binary(&mut self, v: &[u8]) -> Result<()> {
        self.begin_value(false)?;
        let len = v.len() as u64;
        let width = uint_width(len);
        self.buf.write_byte(0xbf + width as u8);
        self.buf.write(&len.to_le_bytes()[..width]);
        self.buf.write(v);
        Ok(())
    }

    pub fn add_min_key(&mut self) -> Result<()> {
        self.begin_value(false)?;
        self.buf.write_byte(0x1e);
        Ok(())
    }

    pub fn add_max_key(&mut self) -> Result<()> {
        self.begin_value(false)?;
        self.buf.write_byte(0x1f);
        Ok(())
    }

    /// Copy an already encoded value.
    pub fn add_slice(&mut self, slice: Slice) -> Result<()> {
        if slice.is_none() {
            return Err(Error::UnexpectedType(ValueType::None));
        }
        let bytes = slice.as_bytes()?;
        self.begin_value(slice.is_string())?;
        self.buf.write(bytes);
        Ok(())
    }

    /// Add an object key. Keys known to the translator are written as their integer ID.
    pub fn add_key(&mut self, key: &str) -> Result<()> {
        let tos = self.stack.tos().ok_or(Error::NeedOpenObject)?;
        if !is_open_object_tag(self.buf[tos]) {
            return Err(Error::NeedOpenObject);
        }
        if self.key_written {
            return Err(Error::KeyAlreadyWritten);
        }
        let id = self.translator.as_ref().and_then(|t| t.string_to_id(key));
        self.stack.report(self.buf.len() - tos);
        match id {
            Some(id) => self.append_uint(id),
            None => self.append_string(key),
        }
        self.key_written = true;
        Ok(())
    }

    pub fn add_key_value(&mut self, key: &str, value: &Value) -> Result<()> {
        self.add_key(key)?;
        self.add_value(value)
    }

    /// Encode a whole value tree.
    pub fn add_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.add_null(),
            Value::Bool(v) => self.add_bool(*v),
            Value::Int(v) => self.add_integer(*v),
            Value::Double(v) => self.add_double(*v),
            Value::UtcDate(v) => self.add_utc_date(*v),
            Value::String(v) => self.add_string(v),
            Value::Binary(v) => self.add_binary(v),
            Value::MinKey => self.add_min_key(),
            Value::MaxKey => self.add_max_key(),
            Value::Array(items) => {
                self.open_array()?;
                for item in items {
                    self.add_value(item)?;
                }
                self.close()
            }
            Value::Object(map) => {
                self.open_object()?;
                for (key, item) in map {
                    self.add_key(key)?;
                    self.add_value(item)?;
                }
                self.close()
            }
        }
    }

    /// Copy every remaining member of an array into the open array.
    pub fn add_values_from_iterator(&mut self, iter: ArrayIterator) -> Result<()> {
        if !self.is_open_array() {
            return Err(Error::NeedOpenArray);
        }
        self.all_or_nothing(|b| {
            for value in iter {
                b.add_slice(value?)?;
            }
            Ok(())
        })
    }

    /// Copy every remaining member of an object into the open object. Integer keys of the
    /// source are resolved through its translator and re-added by name.
    pub fn add_key_values_from_iterator(&mut self, iter: ObjectIterator) -> Result<()> {
        if !self.is_open_object() {
            return Err(Error::NeedOpenObject);
        }
        if self.key_written {
            return Err(Error::KeyAlreadyWritten);
        }
        self.all_or_nothing(|b| {
            for member in iter {
                let (key, value) = member?;
                b.add_key(&key.make_key()?)?;
                b.add_slice(value)?;
            }
            Ok(())
        })
    }

    /// Run a multi-member copy, undoing every member it added if any step fails.
    fn all_or_nothing<F>(&mut self, copy: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let len = self.buf.len();
        let members = self.stack.members().len();
        let key_written = self.key_written;
        let result = copy(self);
        if result.is_err() {
            trace!(dropped = self.stack.members().len().saturating_sub(members), "rolling back partial copy");
            self.buf.truncate(len);
            self.stack.truncate_members(members);
            self.key_written = key_written;
        }
        result
    }

    fn append_int(&mut self, v: i64) {
        match v {
            0..=9 => self.buf.write_byte(0x30 + v as u8),
            -6..=-1 => self.buf.write_byte((0x40 + v) as u8),
            _ => {
                let width = int_width(v);
                self.buf.write_byte(0x1f + width as u8);
                self.buf.write(&v.to_le_bytes()[..width]);
            }
        }
    }

    fn append_uint(&mut self, v: u64) {
        if v <= 9 {
            self.buf.write_byte(0x30 + v as u8);
        } else {
            let width = uint_width(v);
            self.buf.write_byte(0x27 + width as u8);
            self.buf.write(&v.to_le_bytes()[..width]);
        }
    }

    fn append_string(&mut self, v: &str) {
        let len = v.len();
        if len <= 126 {
            self.buf.write_byte(0x40 + len as u8);
        } else {
            self.buf.write_byte(0xbf);
            self.buf.write(&(len as u64).to_le_bytes());
        }
        self.buf.write(v.as_bytes());
    }

    /// Undo the last member added to the innermost open compound. In an object this removes
    /// the key together with its value.
    pub fn remove_last(&mut self) -> Result<()> {
        let tos = self.stack.tos().ok_or(Error::NeedOpenCompound)?;
        let last = self.stack.unreport().ok_or(Error::NeedSubValue)?;
        self.buf.truncate(tos + last);
        self.key_written = false;
        Ok(())
    }

    /// Finish the innermost open compound.
    ///
    /// Fails without changing anything if an object still has a key waiting for its value, or
    /// if duplicate keys are found while [`BuilderOptions::check_attribute_uniqueness`] is set.
    pub fn close(&mut self) -> Result<()> {
        let tos = self.stack.tos().ok_or(Error::NeedOpenCompound)?;
        let head = self.buf[tos];
        let is_array = is_open_array_tag(head);
        if !is_array && self.key_written {
            return Err(Error::KeyAlreadyWritten);
        }
        let mut index = self.stack.take_members();
        let result = self.close_compound(tos, head, is_array, &mut index);
        self.stack.restore_members(index);
        if result.is_ok() {
            self.stack.pop();
        }
        result
    }

    fn close_compound(
        &mut self,
        tos: usize,
        head: u8,
        is_array: bool,
        index: &mut Vec<usize>,
    ) -> Result<()> {
        if index.is_empty() {
            self.buf[tos] = if is_array { 0x01 } else { 0x0a };
            self.buf.truncate(tos + 1);
            trace!(tos, "closed empty compound");
            return Ok(());
        }

        let try_compact = head == OPEN_COMPACT_ARRAY
            || head == OPEN_COMPACT_OBJECT
            || (is_array && self.options.build_unindexed_arrays)
            || (!is_array && (self.options.build_unindexed_objects || index.len() == 1));
        if try_compact {
            if !is_array && index.len() > 1 && self.options.check_attribute_uniqueness {
                self.check_unique_keys(tos, index)?;
            }
            if self.close_compact(tos, is_array, index) {
                return Ok(());
            }
        }

        if is_array {
            self.close_array(tos, index);
            Ok(())
        } else {
            self.close_object(tos, index)
        }
    }

    /// Rewrite the compound in the compact layout. Returns false, leaving the buffer alone, if
    /// its byte length would not fit in 8 LEB128 bytes.
    fn close_compact(&mut self, tos: usize, is_array: bool, index: &[usize]) -> bool {
        let count = index.len() as u64;
        let count_len = varint::encoded_len(count);
        let payload = self.buf.len() - (tos + 1 + HEADER_RESERVE);
        let mut byte_size = (1 + payload + count_len) as u64;
        let mut size_len = varint::encoded_len(byte_size);
        byte_size += size_len as u64;
        if varint::encoded_len(byte_size) != size_len {
            byte_size += 1;
            size_len += 1;
        }
        if size_len > HEADER_RESERVE {
            trace!(tos, byte_size, "compact layout does not fit");
            return false;
        }

        self.buf[tos] = if is_array {
            OPEN_COMPACT_ARRAY
        } else {
            OPEN_COMPACT_OBJECT
        };
        let data = tos + 1 + HEADER_RESERVE;
        if payload > 0 && size_len < HEADER_RESERVE {
            let end = self.buf.len();
            self.buf.copy_within(data..end, tos + 1 + size_len);
        }
        self.buf.shrink(HEADER_RESERVE - size_len);
        varint::store(&mut self.buf[tos + 1..tos + 1 + size_len], byte_size);
        self.buf.write_varint_reversed(count);
        trace!(tos, byte_size, count, "closed compact compound");
        true
    }

    fn close_array(&mut self, tos: usize, index: &mut [usize]) {
        self.buf[tos] = OPEN_ARRAY;
        let n = index.len();
        let span = self.buf.len() - tos;

        // Members of equal size need neither an offset table nor a count
        let uniform = n == 1 || {
            let stride = index[1] - index[0];
            span - index[0] == n * stride
                && span - index[n - 1] == stride
                && index.windows(2).all(|w| w[1] - w[0] == stride)
        };
        let table = !uniform;

        let table_len = if table { n as u64 } else { 0 };
        let saved = if table { 6 } else { 7 };
        let width = if span as u64 + table_len - saved <= 0xff {
            1
        } else {
            offset_width(span as u64, table_len)
        };

        if width == 1 {
            let target = if table { 3 } else { 2 };
            self.move_data(tos, target);
            if table {
                let diff = 1 + HEADER_RESERVE - target;
                index.iter_mut().for_each(|offset| *offset -= diff);
            }
        }

        if table {
            self.write_table(index, width);
        } else {
            self.buf[tos] = 0x02;
        }
        self.buf[tos] += width.trailing_zeros() as u8;
        if width == 8 && table {
            self.buf.write(&(n as u64).to_le_bytes());
        }
        self.write_header(tos, width, if table { Some(n) } else { None });
        trace!(tos, width, count = n, table, "closed indexed array");
    }

    fn close_object(&mut self, tos: usize, index: &mut [usize]) -> Result<()> {
        if index.len() > 1 {
            self.sort_keys(tos, index)?;
        }
        self.buf[tos] = OPEN_OBJECT;
        let n = index.len();
        let span = self.buf.len() - tos;

        let width = if (span + n) as u64 - 6 <= 0xff {
            1
        } else {
            offset_width(span as u64, n as u64)
        };

        if width == 1 {
            self.move_data(tos, 3);
            index.iter_mut().for_each(|offset| *offset -= 6);
        }

        self.write_table(index, width);
        self.buf[tos] += width.trailing_zeros() as u8;
        if width == 8 {
            self.buf.write(&(n as u64).to_le_bytes());
        }
        self.write_header(tos, width, Some(n));
        trace!(tos, width, count = n, "closed indexed object");
        Ok(())
    }

    /// Move the members of the compound at `tos` down so they start `target` bytes in.
    fn move_data(&mut self, tos: usize, target: usize) {
        let data = tos + 1 + HEADER_RESERVE;
        let end = self.buf.len();
        if end > data {
            self.buf.copy_within(data..end, tos + target);
        }
        self.buf.shrink(data - (tos + target));
    }

    fn write_table(&mut self, index: &[usize], width: usize) {
        let table = self.buf.grow(width * index.len());
        for (dst, offset) in table.chunks_exact_mut(width).zip(index) {
            varint::store_uint_le(dst, *offset as u64);
        }
    }

    /// Fill in the byte length, and the member count if there is room for it in the header.
    fn write_header(&mut self, tos: usize, width: usize, count: Option<usize>) {
        let len = (self.buf.len() - tos) as u64;
        varint::store_uint_le(&mut self.buf[tos + 1..tos + 1 + width], len);
        if let Some(count) = count {
            if width < 8 {
                let at = tos + 1 + width;
                varint::store_uint_le(&mut self.buf[at..at + width], count as u64);
            }
        }
    }

    /// View of the open compound at `tos`, for reading back its keys.
    fn frame(&self, tos: usize) -> Slice<'_> {
        let slice = Slice::new(&self.buf[tos..]);
        match self.translator.as_deref() {
            Some(t) => slice.with_translator(t),
            None => slice,
        }
    }

    fn key_at(&self, tos: usize, offset: usize) -> Result<Cow<'_, [u8]>> {
        self.frame(tos).slice_at(offset as u64)?.key_bytes()
    }

    /// Order the member offsets of an object by key, comparing translated keys by name.
    fn sort_keys(&self, tos: usize, index: &mut [usize]) -> Result<()> {
        let mut keyed = index
            .iter()
            .map(|&offset| Ok((self.key_at(tos, offset)?, offset)))
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if self.options.check_attribute_uniqueness {
            if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(duplicate_key(&pair[0].0));
            }
        }
        for (slot, (_, offset)) in index.iter_mut().zip(keyed) {
            *slot = offset;
        }
        Ok(())
    }

    fn check_unique_keys(&self, tos: usize, index: &[usize]) -> Result<()> {
        let mut seen = HashSet::with_capacity(index.len());
        for &offset in index {
            let key = self.key_at(tos, offset)?;
            if seen.contains(&key) {
                return Err(duplicate_key(&key));
            }
            seen.insert(key);
        }
        Ok(())
    }
}

fn duplicate_key(key: &[u8]) -> Error {
    let name = String::from_utf8_lossy(key).into_owned();
    debug!(key = %name, "duplicate attribute name");
    Error::DuplicateAttributeName(name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::translator::AttributeIdTranslator;

    fn build(f: impl FnOnce(&mut Builder) -> Result<()>) -> Vec<u8> {
        let mut b = Builder::new();
        f(&mut b).unwrap();
        b.into_bytes().unwrap()
    }

    fn mixed_members(b: &mut Builder) -> Result<()> {
        b.add_uint(1200)?;
        b.add_double(2.3)?;
        b.add_string("abc")?;
        b.add_bool(true)
    }

    mod scalar {
        use super::*;

        #[test]
        fn constants() {
            assert_eq!(build(|b| b.add_null()), vec![0x18]);
            assert_eq!(build(|b| b.add_bool(false)), vec![0x19]);
            assert_eq!(build(|b| b.add_bool(true)), vec![0x1a]);
            assert_eq!(build(|b| b.add_min_key()), vec![0x1e]);
            assert_eq!(build(|b| b.add_max_key()), vec![0x1f]);
        }

        #[test]
        fn ints() {
            assert_eq!(build(|b| b.add_int(0)), vec![0x30]);
            assert_eq!(build(|b| b.add_int(9)), vec![0x39]);
            assert_eq!(build(|b| b.add_int(-1)), vec![0x3f]);
            assert_eq!(build(|b| b.add_int(-6)), vec![0x3a]);
            assert_eq!(build(|b| b.add_int(-7)), vec![0x20, 0xf9]);
            assert_eq!(build(|b| b.add_int(10)), vec![0x20, 0x0a]);
            assert_eq!(build(|b| b.add_int(-129)), vec![0x21, 0x7f, 0xff]);
            assert_eq!(build(|b| b.add_int(0x4223)), vec![0x21, 0x23, 0x42]);
            let mut expected = vec![0x27];
            expected.extend_from_slice(&i64::MIN.to_le_bytes());
            assert_eq!(build(|b| b.add_int(i64::MIN)), expected);
        }

        #[test]
        fn uints() {
            assert_eq!(build(|b| b.add_uint(5)), vec![0x35]);
            assert_eq!(build(|b| b.add_uint(10)), vec![0x28, 0x0a]);
            assert_eq!(build(|b| b.add_uint(300)), vec![0x29, 0x2c, 0x01]);
            let mut expected = vec![0x2f];
            expected.extend_from_slice(&u64::MAX.to_le_bytes());
            assert_eq!(build(|b| b.add_uint(u64::MAX)), expected);
            assert_eq!(
                build(|b| b.add_integer(Integer::from(-3i8))),
                vec![0x3d]
            );
        }

        #[test]
        fn double_and_date() {
            let mut expected = vec![0x1b];
            expected.extend_from_slice(&2.3f64.to_le_bytes());
            assert_eq!(build(|b| b.add_double(2.3)), expected);
            let mut expected = vec![0x1c];
            expected.extend_from_slice(&(-1000i64).to_le_bytes());
            assert_eq!(build(|b| b.add_utc_date(-1000)), expected);
        }

        #[test]
        fn strings() {
            assert_eq!(build(|b| b.add_string("")), vec![0x40]);
            assert_eq!(build(|b| b.add_string("abc")), vec![0x43, 0x61, 0x62, 0x63]);

            let short = "x".repeat(126);
            let bytes = build(|b| b.add_string(&short));
            assert_eq!(bytes[0], 0xbe);
            assert_eq!(bytes.len(), 127);

            let long = "x".repeat(127);
            let bytes = build(|b| b.add_string(&long));
            assert_eq!(&bytes[..9], &[0xbf, 127, 0, 0, 0, 0, 0, 0, 0]);
            assert_eq!(bytes.len(), 136);
            assert_eq!(Slice::new(&bytes).get_string().unwrap(), long);
        }

        #[test]
        fn binary() {
            assert_eq!(build(|b| b.add_binary(&[])), vec![0xc0, 0x00]);
            assert_eq!(build(|b| b.add_binary(&[1, 2])), vec![0xc0, 0x02, 1, 2]);
            let data = vec![7u8; 300];
            let bytes = build(|b| b.add_binary(&data));
            assert_eq!(&bytes[..3], &[0xc1, 0x2c, 0x01]);
            assert_eq!(Slice::new(&bytes).get_binary().unwrap(), &data[..]);
        }

        #[test]
        fn sequence_of_top_level_values() {
            let mut b = Builder::new();
            assert!(b.is_empty());
            assert_eq!(b.size().unwrap(), 0);
            assert!(b.slice().unwrap().is_none());
            b.add_null().unwrap();
            b.add_bool(true).unwrap();
            assert!(b.is_closed());
            assert_eq!(b.bytes().unwrap(), &[0x18, 0x1a]);
            assert!(b.slice().unwrap().is_null());
        }
    }

    mod array {
        use super::*;

        #[test]
        fn empty() {
            assert_eq!(
                build(|b| {
                    b.open_array()?;
                    b.close()
                }),
                vec![0x01]
            );
            assert_eq!(
                build(|b| {
                    b.open_compact_array()?;
                    b.close()
                }),
                vec![0x01]
            );
        }

        #[test]
        fn single_member() {
            let bytes = build(|b| {
                b.open_array()?;
                b.add_int(1)?;
                b.close()
            });
            assert_eq!(bytes, vec![0x02, 0x03, 0x31]);
        }

        #[test]
        fn single_long_member() {
            let value = "x".repeat(282);
            let bytes = build(|b| {
                b.open_array()?;
                b.add_string(&value)?;
                b.close()
            });
            assert_eq!(bytes.len(), 300);
            assert_eq!(&bytes[..12], &[0x03, 0x2c, 0x01, 0, 0, 0, 0, 0, 0, 0xbf, 0x1a, 0x01]);
            let s = Slice::new(&bytes);
            assert_eq!(s.length().unwrap(), 1);
            assert_eq!(s.at(0).unwrap().get_string().unwrap(), value);
        }

        #[test]
        fn same_size_members() {
            let bytes = build(|b| {
                b.open_array()?;
                b.add_uint(1)?;
                b.add_uint(2)?;
                b.add_uint(3)?;
                b.close()
            });
            assert_eq!(bytes, vec![0x02, 0x05, 0x31, 0x32, 0x33]);
        }

        #[test]
        fn mixed_members_indexed() {
            let bytes = build(|b| {
                b.open_array()?;
                mixed_members(b)?;
                b.close()
            });
            let mut expected = vec![0x06, 0x18, 0x04, 0x29, 0xb0, 0x04, 0x1b];
            expected.extend_from_slice(&2.3f64.to_le_bytes());
            expected.extend_from_slice(&[0x43, 0x61, 0x62, 0x63, 0x1a, 0x03, 0x06, 0x0f, 0x13]);
            assert_eq!(bytes, expected);
        }

        #[test]
        fn mixed_members_compact() {
            let bytes = build(|b| {
                b.open_compact_array()?;
                mixed_members(b)?;
                b.close()
            });
            let mut expected = vec![0x13, 0x14, 0x29, 0xb0, 0x04, 0x1b];
            expected.extend_from_slice(&2.3f64.to_le_bytes());
            expected.extend_from_slice(&[0x43, 0x61, 0x62, 0x63, 0x1a, 0x04]);
            assert_eq!(bytes, expected);
        }

        #[test]
        fn unindexed_option() {
            let mut b = Builder::with_options(BuilderOptions {
                build_unindexed_arrays: true,
                ..Default::default()
            });
            b.open_array().unwrap();
            b.add_int(1).unwrap();
            b.add_int(2).unwrap();
            b.close().unwrap();
            assert_eq!(b.bytes().unwrap(), &[0x13, 0x05, 0x31, 0x32, 0x02]);
        }

        #[test]
        fn compact_byte_size_threshold() {
            for (n, len, header) in [(124u64, 127, vec![0x13, 0x7f]), (125, 129, vec![0x13, 0x81, 0x01])] {
                let bytes = build(|b| {
                    b.open_compact_array()?;
                    for i in 0..n {
                        b.add_uint(i % 10)?;
                    }
                    b.close()
                });
                assert_eq!(bytes.len(), len);
                assert_eq!(&bytes[..header.len()], &header[..]);
                for i in 0..n as usize {
                    assert_eq!(bytes[header.len() + i], 0x30 + (i % 10) as u8);
                }
                assert_eq!(bytes[len - 1], n as u8);
            }
        }

        #[test]
        fn compact_count_threshold() {
            let bytes = build(|b| {
                b.open_compact_array()?;
                for _ in 0..127 {
                    b.add_string("aaa")?;
                }
                b.close()
            });
            assert_eq!(bytes.len(), 512);
            assert_eq!(&bytes[..3], &[0x13, 0x80, 0x04]);
            assert_eq!(bytes[511], 0x7f);

            let bytes = build(|b| {
                b.open_compact_array()?;
                for _ in 0..128 {
                    b.add_string("aaa")?;
                }
                b.close()
            });
            assert_eq!(bytes.len(), 517);
            assert_eq!(&bytes[..3], &[0x13, 0x85, 0x04]);
            for i in 0..128 {
                assert_eq!(bytes[3 + i * 4], 0x43);
            }
            assert_eq!(&bytes[515..], &[0x01, 0x80]);
            assert_eq!(Slice::new(&bytes).length().unwrap(), 128);
        }

        #[test]
        fn wide_offsets() {
            // 2 byte offsets
            let bytes = build(|b| {
                b.open_array()?;
                for i in 0..100 {
                    b.add_uint(i * 1000)?;
                }
                b.close()
            });
            assert_eq!(bytes[0], 0x07);
            let s = Slice::new(&bytes);
            assert_eq!(s.length().unwrap(), 100);
            assert_eq!(s.at(99).unwrap().get_uint().unwrap(), 99_000);

            // 4 byte offsets
            let member = "y".repeat(1000);
            let bytes = build(|b| {
                b.open_array()?;
                for i in 0..70 {
                    b.add_string(&member[..1000 - i])?;
                }
                b.close()
            });
            assert_eq!(bytes[0], 0x08);
            let s = Slice::new(&bytes);
            assert_eq!(s.byte_size().unwrap(), bytes.len() as u64);
            assert_eq!(s.length().unwrap(), 70);
            assert_eq!(s.at(69).unwrap().get_string_length().unwrap(), 931);
        }

        #[test]
        fn nested() {
            let bytes = build(|b| {
                b.open_array()?;
                b.open_object()?;
                b.close()?;
                b.open_array()?;
                b.add_int(1)?;
                b.close()?;
                b.close()
            });
            assert_eq!(bytes, vec![0x06, 0x09, 0x02, 0x0a, 0x02, 0x03, 0x31, 0x03, 0x04]);
            let s = Slice::new(&bytes);
            assert_eq!(s.length().unwrap(), 2);
            assert!(s.at(0).unwrap().is_empty_object());
            assert_eq!(s.at(1).unwrap().at(0).unwrap().get_int().unwrap(), 1);
        }
    }

    mod object {
        use super::*;

        fn mixed_object(b: &mut Builder) -> Result<()> {
            b.add_key("d")?;
            b.add_uint(1200)?;
            b.add_key("c")?;
            b.add_double(2.3)?;
            b.add_key("b")?;
            b.add_string("abc")?;
            b.add_key("a")?;
            b.add_bool(true)
        }

        #[test]
        fn empty() {
            assert_eq!(
                build(|b| {
                    b.open_object()?;
                    b.close()
                }),
                vec![0x0a]
            );
            assert_eq!(
                build(|b| {
                    b.open_compact_object()?;
                    b.close()
                }),
                vec![0x0a]
            );
        }

        #[test]
        fn sorted() {
            let bytes = build(|b| {
                b.open_object()?;
                mixed_object(b)?;
                b.close()
            });
            let mut expected = vec![0x0b, 0x20, 0x04, 0x41, 0x64, 0x29, 0xb0, 0x04, 0x41, 0x63, 0x1b];
            expected.extend_from_slice(&2.3f64.to_le_bytes());
            expected.extend_from_slice(&[
                0x41, 0x62, 0x43, 0x61, 0x62, 0x63, 0x41, 0x61, 0x1a, 0x19, 0x13, 0x08, 0x03,
            ]);
            assert_eq!(bytes, expected);
            let s = Slice::new(&bytes);
            assert_eq!(s.key_name_at(0).unwrap(), "a");
            assert_eq!(s.get("d").unwrap().unwrap().get_uint().unwrap(), 1200);
        }

        #[test]
        fn compact() {
            let bytes = build(|b| {
                b.open_compact_object()?;
                mixed_object(b)?;
                b.close()
            });
            let mut expected = vec![0x14, 0x1c, 0x41, 0x64, 0x29, 0xb0, 0x04, 0x41, 0x63, 0x1b];
            expected.extend_from_slice(&2.3f64.to_le_bytes());
            expected.extend_from_slice(&[0x41, 0x62, 0x43, 0x61, 0x62, 0x63, 0x41, 0x61, 0x1a, 0x04]);
            assert_eq!(bytes, expected);
        }

        #[test]
        fn single_member_is_compact() {
            let bytes = build(|b| {
                b.open_object()?;
                b.add_key("foo")?;
                b.add_string("bar")?;
                b.close()
            });
            assert_eq!(bytes[0], 0x14);
            let s = Slice::new(&bytes);
            assert_eq!(s.length().unwrap(), 1);
            assert_eq!(s.get("foo").unwrap().unwrap().get_string().unwrap(), "bar");
        }

        #[test]
        fn string_values_as_keys() {
            let bytes = build(|b| {
                b.open_object()?;
                b.add_string("test")?;
                b.add_uint(77)?;
                b.add_string("soup")?;
                b.add_uint(154)?;
                b.close()
            });
            let s = Slice::new(&bytes);
            assert_eq!(s.length().unwrap(), 2);
            assert_eq!(s.get("test").unwrap().unwrap().get_uint().unwrap(), 77);
            assert_eq!(s.get("soup").unwrap().unwrap().get_uint().unwrap(), 154);
        }

        #[test]
        fn nested_value() {
            let bytes = build(|b| {
                b.open_object()?;
                b.add_key("inner")?;
                b.open_array()?;
                b.add_int(1)?;
                b.add_int(-1)?;
                b.close()?;
                b.add_key("x")?;
                b.add_null()?;
                b.close()
            });
            let s = Slice::new(&bytes);
            let inner = s.get("inner").unwrap().unwrap();
            assert_eq!(inner.at(1).unwrap().get_int().unwrap(), -1);
            assert!(s.get("x").unwrap().unwrap().is_null());
        }

        #[test]
        fn wide_offsets() {
            let bytes = build(|b| {
                b.open_object()?;
                for i in 0..200u64 {
                    b.add_key(&format!("key{:03}", i))?;
                    b.add_uint(i)?;
                }
                b.close()
            });
            assert_eq!(bytes[0], 0x0c);
            let s = Slice::new(&bytes);
            assert_eq!(s.length().unwrap(), 200);
            assert_eq!(s.byte_size().unwrap(), bytes.len() as u64);
            for i in (0..200u64).step_by(17) {
                let v = s.get(&format!("key{:03}", i)).unwrap().unwrap();
                assert_eq!(v.get_uint().unwrap(), i);
            }
            assert!(s.get("key200").unwrap().is_none());
        }

        #[test]
        fn translated_keys() {
            let t = Arc::new(AttributeIdTranslator::new());
            for (key, id) in [
                ("foo", 1),
                ("bar", 2),
                ("baz", 3),
                ("bark", 4),
                ("mötör", 5),
                ("quetzalcoatl", 6),
            ] {
                t.add(key, id);
            }
            let mut b = Builder::new().with_translator(t.clone());
            b.open_object().unwrap();
            b.add_key("foo").unwrap();
            b.add_bool(true).unwrap();
            b.add_key("bar").unwrap();
            b.add_bool(false).unwrap();
            for (key, v) in [
                ("baz", 1),
                ("bart", 2),
                ("bark", 42),
                ("mötör", 19),
                ("mötörhead", 20),
                ("quetzal", 21),
            ] {
                b.add_key(key).unwrap();
                b.add_int(v).unwrap();
            }
            b.close().unwrap();

            let expected = hex::decode(
                "0b3508311a321933314462617274323420\
                 2a3520134b6dc3b674c3b6726865616420\
                 1447717565747a616c2015050f09070312\
                 1523",
            )
            .unwrap();
            assert_eq!(hex::encode(b.bytes().unwrap()), hex::encode(&expected));

            let s = b.slice().unwrap();
            for key in ["foo", "bar", "baz", "bart", "bark", "mötör", "mötörhead", "quetzal"] {
                assert!(s.has_key(key).unwrap(), "missing {}", key);
            }
            assert!(!s.has_key("quetzalcoatl").unwrap());
            assert_eq!(s.key_name_at(0).unwrap(), "bar");
        }

        #[test]
        fn duplicate_keys_sorted() {
            let mut b = Builder::with_options(BuilderOptions {
                check_attribute_uniqueness: true,
                ..Default::default()
            });
            b.open_object().unwrap();
            b.add_key("a").unwrap();
            b.add_int(1).unwrap();
            b.add_key("b").unwrap();
            b.add_int(2).unwrap();
            b.add_key("a").unwrap();
            b.add_int(3).unwrap();
            let before = b.buf.len();
            assert_eq!(
                b.close(),
                Err(Error::DuplicateAttributeName("a".to_string()))
            );
            assert!(b.is_open_object());
            assert_eq!(b.buf.len(), before);
            assert_eq!(b.bytes(), Err(Error::BuilderNotSealed));

            b.remove_last().unwrap();
            b.close().unwrap();
            assert_eq!(b.slice().unwrap().length().unwrap(), 2);
        }

        #[test]
        fn duplicate_keys_compact() {
            let mut b = Builder::with_options(BuilderOptions {
                check_attribute_uniqueness: true,
                ..Default::default()
            });
            b.open_compact_object().unwrap();
            b.add_key("x").unwrap();
            b.add_null().unwrap();
            b.add_key("x").unwrap();
            b.add_null().unwrap();
            assert!(matches!(b.close(), Err(Error::DuplicateAttributeName(_))));
            assert!(!b.is_closed());
        }

        #[test]
        fn duplicate_keys_unchecked() {
            let bytes = build(|b| {
                b.open_object()?;
                b.add_key("a")?;
                b.add_int(1)?;
                b.add_key("a")?;
                b.add_int(2)?;
                b.close()
            });
            assert_eq!(Slice::new(&bytes).length().unwrap(), 2);
        }

        #[test]
        fn options_from_config() {
            let opts: BuilderOptions =
                serde_json::from_str(r#"{"check_attribute_uniqueness": true}"#).unwrap();
            assert!(opts.check_attribute_uniqueness);
            assert!(!opts.build_unindexed_arrays);
            assert!(!opts.build_unindexed_objects);
        }
    }

    mod protocol {
        use super::*;

        #[test]
        fn sealing() {
            let mut b = Builder::new();
            b.open_object().unwrap();
            assert!(!b.is_empty());
            assert_eq!(b.bytes(), Err(Error::BuilderNotSealed));
            assert_eq!(b.size(), Err(Error::BuilderNotSealed));
            assert!(matches!(b.slice(), Err(Error::BuilderNotSealed)));
            b.close().unwrap();
            assert_eq!(b.size().unwrap(), 1);
        }

        #[test]
        fn open_and_closed() {
            let mut b = Builder::new();
            assert!(b.is_closed());
            b.add_null().unwrap();
            assert!(b.is_closed());
            b.open_array().unwrap();
            assert!(b.is_open_array());
            b.add_bool(true).unwrap();
            b.close().unwrap();
            assert!(b.is_closed());
            b.open_object().unwrap();
            b.add_key("baz").unwrap();
            b.open_object().unwrap();
            assert!(b.is_open_object());
            b.close().unwrap();
            assert!(!b.is_closed());
            b.close().unwrap();
            assert!(b.is_closed());
            assert_eq!(b.close(), Err(Error::NeedOpenCompound));
        }

        #[test]
        fn key_rules() {
            let mut b = Builder::new();
            assert_eq!(b.add_key("foo"), Err(Error::NeedOpenObject));
            b.open_array().unwrap();
            assert_eq!(b.add_key("foo"), Err(Error::NeedOpenObject));
            b.open_object().unwrap();
            let len = b.buf.len();
            assert_eq!(b.add_int(1), Err(Error::KeyMustBeString));
            assert_eq!(b.open_array(), Err(Error::NeedOpenArray));
            assert_eq!(b.buf.len(), len);
            b.add_key("foo").unwrap();
            assert_eq!(b.add_key("bar"), Err(Error::KeyAlreadyWritten));
            assert_eq!(b.close(), Err(Error::KeyAlreadyWritten));
            b.add_int(1).unwrap();
            b.close().unwrap();
            b.close().unwrap();
        }

        #[test]
        fn remove_last() {
            let mut b = Builder::new();
            assert_eq!(b.remove_last(), Err(Error::NeedOpenCompound));
            b.add_bool(true).unwrap();
            assert_eq!(b.remove_last(), Err(Error::NeedOpenCompound));

            let mut b = Builder::new();
            b.open_object().unwrap();
            assert_eq!(b.remove_last(), Err(Error::NeedSubValue));
            b.add_key("foo").unwrap();
            b.add_bool(true).unwrap();
            b.add_key("bar").unwrap();
            b.add_bool(false).unwrap();
            b.remove_last().unwrap();
            b.close().unwrap();
            let s = b.slice().unwrap();
            assert_eq!(s.length().unwrap(), 1);
            assert!(s.get("foo").unwrap().unwrap().get_bool().unwrap());
            assert!(!s.has_key("bar").unwrap());
        }

        #[test]
        fn remove_dangling_key() {
            let mut b = Builder::new();
            b.open_object().unwrap();
            b.add_key("foo").unwrap();
            b.remove_last().unwrap();
            assert_eq!(b.remove_last(), Err(Error::NeedSubValue));
            b.close().unwrap();
            assert_eq!(b.bytes().unwrap(), &[0x0a]);
        }

        #[test]
        fn none_slice() {
            let mut b = Builder::new();
            assert_eq!(
                b.add_slice(Slice::none()),
                Err(Error::UnexpectedType(ValueType::None))
            );
            assert!(b.is_empty());
        }

        #[test]
        fn clear_keeps_working() {
            let mut b = Builder::new();
            b.open_array().unwrap();
            b.add_int(3).unwrap();
            b.clear();
            assert!(b.is_empty());
            assert!(b.is_closed());
            b.add_int(4).unwrap();
            assert_eq!(b.bytes().unwrap(), &[0x34]);
        }
    }

    mod copying {
        use super::*;

        fn source_object() -> Vec<u8> {
            build(|b| {
                b.open_object()?;
                b.add_key("1-one")?;
                b.add_int(1)?;
                b.add_key("2-two")?;
                b.add_int(2)?;
                b.add_key("3-three")?;
                b.add_int(3)?;
                b.close()
            })
        }

        #[test]
        fn values_from_iterator() {
            let src = build(|b| {
                b.open_array()?;
                mixed_members(b)?;
                b.close()
            });
            let slice = Slice::new(&src);

            let mut b = Builder::new();
            assert_eq!(
                b.add_values_from_iterator(slice.array_iter().unwrap()),
                Err(Error::NeedOpenArray)
            );
            b.open_object().unwrap();
            assert_eq!(
                b.add_values_from_iterator(slice.array_iter().unwrap()),
                Err(Error::NeedOpenArray)
            );

            let mut b = Builder::new();
            b.open_compact_array().unwrap();
            b.add_values_from_iterator(slice.array_iter().unwrap()).unwrap();
            b.close().unwrap();
            let copy = b.slice().unwrap();
            assert_eq!(copy.head(), 0x13);
            assert_eq!(copy.length().unwrap(), 4);
            assert_eq!(copy.at(2).unwrap().get_string().unwrap(), "abc");
        }

        #[test]
        fn key_values_from_iterator() {
            let src = source_object();
            let slice = Slice::new(&src);

            let mut b = Builder::new();
            assert_eq!(
                b.add_key_values_from_iterator(slice.object_iter().unwrap()),
                Err(Error::NeedOpenObject)
            );
            b.open_array().unwrap();
            assert_eq!(
                b.add_key_values_from_iterator(slice.object_iter().unwrap()),
                Err(Error::NeedOpenObject)
            );

            let mut b = Builder::new();
            b.open_object().unwrap();
            b.add_string("foo").unwrap();
            assert_eq!(
                b.add_key_values_from_iterator(slice.object_iter().unwrap()),
                Err(Error::KeyAlreadyWritten)
            );
            assert!(!b.is_closed());
        }

        #[test]
        fn failed_copy_leaves_no_members() {
            // {"a": 1, 5: 2, "c": 3}, the middle key is an attribute ID
            let src = [0x14, 0x0b, 0x41, 0x61, 0x31, 0x35, 0x32, 0x41, 0x63, 0x33, 0x03];
            let slice = Slice::new(&src);
            let mut b = Builder::new();
            b.open_object().unwrap();
            b.add_key("z").unwrap();
            b.add_int(9).unwrap();
            assert_eq!(
                b.add_key_values_from_iterator(slice.object_iter().unwrap()),
                Err(Error::NeedAttributeTranslator)
            );
            b.add_key("y").unwrap();
            b.add_int(8).unwrap();
            b.close().unwrap();
            let expected = build(|b| {
                b.open_object()?;
                b.add_key("z")?;
                b.add_int(9)?;
                b.add_key("y")?;
                b.add_int(8)?;
                b.close()
            });
            assert_eq!(b.bytes().unwrap(), &expected[..]);

            // Second member runs past the end of the source buffer
            let src = [0x13, 0x06, 0x31, 0x45, 0x61, 0x02];
            let slice = Slice::new(&src);
            let mut b = Builder::new();
            b.open_array().unwrap();
            b.add_int(7).unwrap();
            assert!(b
                .add_values_from_iterator(slice.array_iter().unwrap())
                .is_err());
            b.close().unwrap();
            let expected = build(|b| {
                b.open_array()?;
                b.add_int(7)?;
                b.close()
            });
            assert_eq!(b.bytes().unwrap(), &expected[..]);
        }

        #[test]
        fn key_values_into_nested_object() {
            let src = source_object();
            let slice = Slice::new(&src);

            let mut b = Builder::new();
            b.open_object().unwrap();
            b.add_key("1-something").unwrap();
            b.add_string("tennis").unwrap();
            b.add_string("2-values").unwrap();
            b.open_object().unwrap();
            b.add_key_values_from_iterator(slice.object_iter().unwrap())
                .unwrap();
            b.close().unwrap();
            b.add_key("3-bark").unwrap();
            b.add_string("qux").unwrap();
            b.close().unwrap();

            let s = b.slice().unwrap();
            assert_eq!(s.length().unwrap(), 3);
            let inner = s.get("2-values").unwrap().unwrap();
            assert_eq!(inner.length().unwrap(), 3);
            assert_eq!(inner.get("3-three").unwrap().unwrap().get_int().unwrap(), 3);
            assert_eq!(
                s.get_path(&["2-values", "1-one"]).unwrap().unwrap().get_int().unwrap(),
                1
            );
            assert_eq!(s.get("3-bark").unwrap().unwrap().get_string().unwrap(), "qux");
        }

        #[test]
        fn slices_keep_their_bytes() {
            let src = source_object();
            let mut b = Builder::new();
            b.open_array().unwrap();
            b.add_slice(Slice::new(&src)).unwrap();
            b.add_slice(Slice::new(&src)).unwrap();
            b.close().unwrap();
            let s = b.slice().unwrap();
            assert_eq!(s.at(0).unwrap(), Slice::new(&src));
            assert_eq!(s.at(1).unwrap().as_bytes().unwrap(), &src[..]);
        }
    }

    mod lookup {
        use super::*;
        use rand::distributions::Alphanumeric;
        use rand::prelude::*;

        fn random_keys(rng: &mut impl Rng, n: usize) -> Vec<String> {
            let mut keys = HashSet::new();
            while keys.len() < n {
                let len = rng.gen_range(1..24);
                let key: String = (&mut *rng)
                    .sample_iter(Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect();
                keys.insert(key);
            }
            keys.into_iter().collect()
        }

        #[test]
        fn random_objects() {
            let mut rng = thread_rng();
            for n in [1usize, 2, 7, 60, 400] {
                let keys = random_keys(&mut rng, n);
                for compact in [false, true] {
                    let mut b = Builder::new();
                    if compact {
                        b.open_compact_object().unwrap();
                    } else {
                        b.open_object().unwrap();
                    }
                    for (i, key) in keys.iter().enumerate() {
                        b.add_key(key).unwrap();
                        b.add_uint(i as u64).unwrap();
                    }
                    b.close().unwrap();

                    let s = b.slice().unwrap();
                    assert_eq!(s.length().unwrap(), n as u64);
                    for (i, key) in keys.iter().enumerate() {
                        let found = s.get(key).unwrap().unwrap();
                        assert_eq!(found.get_uint().unwrap(), i as u64);
                    }
                    assert!(s.get("not-a-key").unwrap().is_none());

                    if compact || n == 1 {
                        continue;
                    }
                    assert!(s.is_sorted());
                    let mut previous = s.key_at(0).unwrap().get_string_bytes().unwrap();
                    for i in 1..n as u64 {
                        let key = s.key_at(i).unwrap().get_string_bytes().unwrap();
                        assert!(previous < key, "keys {} and {} out of order", i - 1, i);
                        previous = key;
                    }
                }
            }
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ints(v in any::<i64>()) {
                let enc = build(|b| b.add_int(v));
                let s = Slice::new(&enc);
                prop_assert_eq!(s.byte_size().unwrap(), enc.len() as u64);
                prop_assert_eq!(s.get_int().unwrap(), v);
            }

            #[test]
            fn uints(v in any::<u64>()) {
                let enc = build(|b| b.add_uint(v));
                let s = Slice::new(&enc);
                prop_assert_eq!(s.byte_size().unwrap(), enc.len() as u64);
                prop_assert_eq!(s.get_uint().unwrap(), v);
            }

            #[test]
            fn arrays(items in prop::collection::vec(any::<i64>(), 0..300), compact in any::<bool>()) {
                let enc = build(|b| {
                    if compact {
                        b.open_compact_array()?;
                    } else {
                        b.open_array()?;
                    }
                    for v in &items {
                        b.add_int(*v)?;
                    }
                    b.close()
                });
                let s = Slice::new(&enc);
                prop_assert_eq!(s.byte_size().unwrap(), enc.len() as u64);
                prop_assert_eq!(s.length().unwrap(), items.len() as u64);
                for (i, v) in items.iter().enumerate() {
                    prop_assert_eq!(s.at(i as u64).unwrap().get_int().unwrap(), *v);
                }
            }
        }
    }
}
