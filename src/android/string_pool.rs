use crate::android::chunk::{ChunkHeader, ChunkReader, RES_STRING_POOL_TYPE};
use crate::android::error::{ResError, ResErrorKind, ResResult};
use bitflags::bitflags;
use log::warn;
use serde::Serialize;

/// Index value used throughout the formats for "no string".
pub const NO_STRING: u32 = 0xFFFF_FFFF;

const SPAN_END: u32 = 0xFFFF_FFFF;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct PoolFlags: u32 {
        const SORTED = 0x0000_0001;
        const UTF8 = 0x0000_0100;
    }
}

/// One styled run: the tag named by `name` covers characters `first..=last`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StringSpan {
    pub name: u32,
    pub first_char: u32,
    pub last_char: u32,
}

/// A decoded `ResStringPool` chunk.
///
/// Style spans are kept as-is next to the string they belong to; nothing in
/// this crate renders them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringPool {
    flags: PoolFlags,
    strings: Vec<String>,
    styles: Vec<Vec<StringSpan>>,
}

impl StringPool {
    /// Decodes the string pool chunk described by `header`. `reader` must
    /// cover at least the whole chunk.
    pub fn parse(reader: &ChunkReader<'_>, header: &ChunkHeader) -> ResResult<Self> {
        if header.chunk_type != RES_STRING_POOL_TYPE {
            return Err(malformed!(
                header.offset,
                "expected string pool chunk, found type 0x{:04x}",
                header.chunk_type
            ));
        }
        Self::parse_chunk(reader, header)
            .map_err(|err| err.in_chunk(header.chunk_type, header.offset))
    }

    fn parse_chunk(reader: &ChunkReader<'_>, header: &ChunkHeader) -> ResResult<Self> {
        let mut fields = reader.header_fields(header)?;
        let string_count = fields.read_u32()? as usize;
        let style_count = fields.read_u32()? as usize;
        let flags = PoolFlags::from_bits_retain(fields.read_u32()?);
        let strings_start = fields.read_u32()? as usize;
        let styles_start = fields.read_u32()? as usize;

        let chunk = reader.window(header.offset, header.end())?;
        let mut offsets = chunk.window(header.body_start(), header.end())?;
        let mut string_offsets = Vec::with_capacity(string_count.min(offsets.remaining() / 4));
        for _ in 0..string_count {
            string_offsets.push(offsets.read_u32()? as usize);
        }
        let mut style_offsets = Vec::with_capacity(style_count.min(offsets.remaining() / 4));
        for _ in 0..style_count {
            style_offsets.push(offsets.read_u32()? as usize);
        }

        let mut strings = Vec::with_capacity(string_offsets.len());
        if string_count > 0 {
            // Style data, when present, follows the string data.
            let strings_end = if style_count > 0 && styles_start > strings_start {
                header.offset + styles_start
            } else {
                header.end()
            };
            let data = chunk.window(header.offset + strings_start, strings_end)?;
            let utf8 = flags.contains(PoolFlags::UTF8);
            for offset in string_offsets {
                let mut cursor = data;
                cursor.seek(data.start() + offset)?;
                let text = if utf8 {
                    read_utf8_string(&mut cursor)?
                } else {
                    read_utf16_string(&mut cursor)?
                };
                strings.push(text);
            }
        }

        let mut styles = Vec::with_capacity(style_offsets.len());
        if style_count > 0 {
            let data = chunk.window(header.offset + styles_start, header.end())?;
            for offset in style_offsets {
                let mut cursor = data;
                cursor.seek(data.start() + offset)?;
                let mut spans = Vec::new();
                loop {
                    let name = cursor.read_u32()?;
                    if name == SPAN_END {
                        break;
                    }
                    spans.push(StringSpan {
                        name,
                        first_char: cursor.read_u32()?,
                        last_char: cursor.read_u32()?,
                    });
                }
                styles.push(spans);
            }
        }

        Ok(StringPool {
            flags,
            strings,
            styles,
        })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn flags(&self) -> PoolFlags {
        self.flags
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(PoolFlags::UTF8)
    }

    pub fn get(&self, index: u32) -> ResResult<&str> {
        self.strings
            .get(index as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                ResError::new(ResErrorKind::InvalidPoolIndex {
                    index,
                    count: self.strings.len(),
                })
            })
    }

    /// Like [`get`](Self::get), but treats [`NO_STRING`] as an absent value.
    pub fn get_optional(&self, index: u32) -> ResResult<Option<&str>> {
        if index == NO_STRING {
            Ok(None)
        } else {
            self.get(index).map(Some)
        }
    }

    /// Style spans of the string at `index`; unstyled strings have none.
    pub fn spans(&self, index: u32) -> ResResult<&[StringSpan]> {
        if index as usize >= self.strings.len() {
            return Err(ResError::new(ResErrorKind::InvalidPoolIndex {
                index,
                count: self.strings.len(),
            }));
        }
        Ok(self
            .styles
            .get(index as usize)
            .map(|spans| spans.as_slice())
            .unwrap_or(&[]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }
}

fn read_utf8_length(reader: &mut ChunkReader<'_>) -> ResResult<usize> {
    let first = reader.read_u8()?;
    if (first & 0x80) == 0 {
        Ok(first as usize)
    } else {
        let second = reader.read_u8()?;
        Ok((((first & 0x7F) as usize) << 8) | second as usize)
    }
}

fn read_utf16_length(reader: &mut ChunkReader<'_>) -> ResResult<usize> {
    let first = reader.read_u16()?;
    if (first & 0x8000) == 0 {
        Ok(first as usize)
    } else {
        let second = reader.read_u16()?;
        Ok((((first & 0x7FFF) as usize) << 16) | second as usize)
    }
}

fn read_utf8_string(reader: &mut ChunkReader<'_>) -> ResResult<String> {
    let start = reader.position();
    // UTF-16 length first; only the byte length matters for decoding.
    let _utf16_len = read_utf8_length(reader)?;
    let byte_len = read_utf8_length(reader)?;
    if byte_len > reader.remaining() {
        return Err(ResError::new(ResErrorKind::StringTooLong {
            length: byte_len,
            available: reader.remaining(),
        })
        .at(start));
    }
    let bytes = reader.read_bytes(byte_len)?;
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => cesu8::from_java_cesu8(bytes)
            .map(|text| text.into_owned())
            .map_err(|_| malformed!(start, "string is neither UTF-8 nor modified UTF-8")),
    }
}

fn read_utf16_string(reader: &mut ChunkReader<'_>) -> ResResult<String> {
    let start = reader.position();
    let char_count = read_utf16_length(reader)?;
    let byte_len = char_count.checked_mul(2).unwrap_or(usize::MAX);
    if byte_len > reader.remaining() {
        return Err(ResError::new(ResErrorKind::StringTooLong {
            length: char_count,
            available: reader.remaining(),
        })
        .at(start));
    }
    let bytes = reader.read_bytes(byte_len)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
        .collect();
    match String::from_utf16(&units) {
        Ok(text) => Ok(text),
        Err(_) => {
            warn!("[arsc] unpaired surrogate in UTF-16 string at 0x{:x}", start);
            Ok(String::from_utf16_lossy(&units))
        }
    }
}
