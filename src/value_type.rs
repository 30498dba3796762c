use std::fmt;

/// The type of an encoded value, as selected by its tag byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    None,
    Illegal,
    Null,
    Bool,
    Array,
    Object,
    Double,
    UtcDate,
    External,
    MinKey,
    MaxKey,
    Int,
    UInt,
    SmallInt,
    String,
    Binary,
    Bcd,
    Custom,
}

impl ValueType {
    /// Look up the type selected by a tag byte.
    #[inline]
    pub fn from_u8(tag: u8) -> ValueType {
        TYPE_MAP[tag as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::None => "None",
            ValueType::Illegal => "Illegal",
            ValueType::Null => "Null",
            ValueType::Bool => "Bool",
            ValueType::Array => "Array",
            ValueType::Object => "Object",
            ValueType::Double => "Double",
            ValueType::UtcDate => "UTCDate",
            ValueType::External => "External",
            ValueType::MinKey => "MinKey",
            ValueType::MaxKey => "MaxKey",
            ValueType::Int => "Int",
            ValueType::UInt => "UInt",
            ValueType::SmallInt => "SmallInt",
            ValueType::String => "String",
            ValueType::Binary => "Binary",
            ValueType::Bcd => "BCD",
            ValueType::Custom => "Custom",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

const fn type_of(tag: u8) -> ValueType {
    match tag {
        0x01..=0x09 | 0x13 => ValueType::Array,
        0x0a..=0x12 | 0x14 => ValueType::Object,
        0x17 => ValueType::Illegal,
        0x18 => ValueType::Null,
        0x19 | 0x1a => ValueType::Bool,
        0x1b => ValueType::Double,
        0x1c => ValueType::UtcDate,
        0x1d => ValueType::External,
        0x1e => ValueType::MinKey,
        0x1f => ValueType::MaxKey,
        0x20..=0x27 => ValueType::Int,
        0x28..=0x2f => ValueType::UInt,
        0x30..=0x3f => ValueType::SmallInt,
        0x40..=0xbf => ValueType::String,
        0xc0..=0xc7 => ValueType::Binary,
        0xc8..=0xd7 => ValueType::Bcd,
        0xf0..=0xff => ValueType::Custom,
        _ => ValueType::None,
    }
}

const fn fixed_length_of(tag: u8) -> u8 {
    match tag {
        0x00 | 0x01 | 0x0a => 1,
        0x17..=0x1a => 1,
        0x1b..=0x1d => 9,
        0x1e | 0x1f => 1,
        0x20..=0x27 => tag - 0x1f + 1,
        0x28..=0x2f => tag - 0x27 + 1,
        0x30..=0x3f => 1,
        0x40..=0xbe => tag - 0x40 + 1,
        0xf0 => 2,
        0xf1 => 3,
        0xf2 => 5,
        0xf3 => 9,
        _ => 0,
    }
}

const fn width_of(tag: u8) -> u8 {
    match tag {
        0x02 | 0x06 | 0x0b | 0x0f => 1,
        0x03 | 0x07 | 0x0c | 0x10 => 2,
        0x04 | 0x08 | 0x0d | 0x11 => 4,
        0x05 | 0x09 | 0x0e | 0x12 => 8,
        _ => 0,
    }
}

const fn first_sub_of(tag: u8) -> u8 {
    match tag {
        0x01 | 0x0a => 1,
        0x02 | 0x13 | 0x14 => 2,
        0x03 | 0x06 | 0x0b | 0x0f => 3,
        0x04 | 0x07 | 0x0c | 0x10 => 5,
        0x05 | 0x08 | 0x09 | 0x0d | 0x0e | 0x11 | 0x12 => 9,
        _ => 0,
    }
}

const fn build_type_map() -> [ValueType; 256] {
    let mut map = [ValueType::None; 256];
    let mut i = 0;
    while i < 256 {
        map[i] = type_of(i as u8);
        i += 1;
    }
    map
}

macro_rules! build_u8_map {
    ($f:ident) => {{
        let mut map = [0u8; 256];
        let mut i = 0;
        while i < 256 {
            map[i] = $f(i as u8);
            i += 1;
        }
        map
    }};
}

/// Tag byte to value type.
pub static TYPE_MAP: [ValueType; 256] = build_type_map();

/// Tag byte to total byte size, for types whose size is fixed by the tag alone. Zero means the
/// size must be read from the value.
pub static FIXED_TYPE_LENGTHS: [u8; 256] = build_u8_map!(fixed_length_of);

/// Width in bytes of the length field and offset table entries of indexed compound values.
pub static WIDTH_MAP: [u8; 256] = build_u8_map!(width_of);

/// Earliest offset at which the first member of a compound value can start.
pub static FIRST_SUB_MAP: [u8; 256] = build_u8_map!(first_sub_of);

/// True for every array tag, empty and compact included.
#[inline]
pub fn is_array_tag(tag: u8) -> bool {
    matches!(tag, 0x01..=0x09 | 0x13)
}

/// True for every object tag, empty and compact included.
#[inline]
pub fn is_object_tag(tag: u8) -> bool {
    matches!(tag, 0x0a..=0x12 | 0x14)
}

#[inline]
pub fn is_compact_tag(tag: u8) -> bool {
    tag == 0x13 || tag == 0x14
}
