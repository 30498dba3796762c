use crate::error::{Error, Result};
use crate::slice::Slice;
use crate::value_type::ValueType;

/// Iterates over the members of an array.
///
/// Compact arrays and arrays without offset table are walked member by member; indexed arrays
/// go through the offset table.
#[derive(Clone, Debug)]
pub struct ArrayIterator<'a> {
    slice: Slice<'a>,
    position: u64,
    size: u64,
    current: Option<u64>,
}

impl<'a> ArrayIterator<'a> {
    pub fn new(slice: Slice<'a>) -> Result<Self> {
        if !slice.is_array() {
            return Err(Error::InvalidType {
                expected: "array",
                actual: slice.value_type(),
            });
        }
        let size = slice.length()?;
        let h = slice.head();
        let current = if size == 0 {
            None
        } else if h == 0x13 {
            Some(slice.compact_data_offset()?)
        } else if h <= 0x05 {
            Some(slice.find_data_offset(h))
        } else {
            None
        };
        Ok(Self {
            slice,
            position: 0,
            size,
            current,
        })
    }

    /// The array being iterated.
    pub fn array(&self) -> Slice<'a> {
        self.slice
    }

    fn value(&self) -> Result<Slice<'a>> {
        match self.current {
            Some(offset) => self.slice.slice_at(offset),
            None => self.slice.at(self.position),
        }
    }
}

impl<'a> Iterator for ArrayIterator<'a> {
    type Item = Result<Slice<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.size {
            return None;
        }
        let value = self.value().and_then(|v| {
            if let Some(offset) = self.current {
                self.current = Some(self.slice.offset_after(offset, v.byte_size()?)?);
            }
            Ok(v)
        });
        self.position = if value.is_ok() {
            self.position + 1
        } else {
            self.size
        };
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.size - self.position).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for ArrayIterator<'a> {}

/// Iterates over the raw `(key, value)` pairs of an object, in stored order.
///
/// Keys written through an attribute translator come back as integer slices; use
/// [`Slice::make_key`] to resolve them.
#[derive(Clone, Debug)]
pub struct ObjectIterator<'a> {
    slice: Slice<'a>,
    position: u64,
    size: u64,
    current: Option<u64>,
}

impl<'a> ObjectIterator<'a> {
    pub fn new(slice: Slice<'a>) -> Result<Self> {
        if slice.value_type() != ValueType::Object {
            return Err(Error::InvalidType {
                expected: "object",
                actual: slice.value_type(),
            });
        }
        let size = slice.length()?;
        let current = if size > 0 && slice.head() == 0x14 {
            Some(slice.compact_data_offset()?)
        } else {
            None
        };
        Ok(Self {
            slice,
            position: 0,
            size,
            current,
        })
    }

    /// The object being iterated.
    pub fn object(&self) -> Slice<'a> {
        self.slice
    }

    fn member(&mut self) -> Result<(Slice<'a>, Slice<'a>)> {
        let offset = match self.current {
            Some(offset) => offset,
            None => self.slice.nth_offset(self.position)?,
        };
        let key = self.slice.slice_at(offset)?;
        let value_offset = self.slice.offset_after(offset, key.byte_size()?)?;
        let value = self.slice.slice_at(value_offset)?;
        if self.current.is_some() {
            self.current = Some(self.slice.offset_after(value_offset, value.byte_size()?)?);
        }
        Ok((key, value))
    }
}

impl<'a> Iterator for ObjectIterator<'a> {
    type Item = Result<(Slice<'a>, Slice<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.size {
            return None;
        }
        let member = self.member();
        self.position = if member.is_ok() {
            self.position + 1
        } else {
            self.size
        };
        Some(member)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.size - self.position).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for ObjectIterator<'a> {}
