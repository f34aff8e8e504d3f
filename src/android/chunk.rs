use crate::android::error::{ResError, ResResult};

pub const RES_NULL_TYPE: u16 = 0x0000;
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;

pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;
pub const RES_TABLE_LIBRARY_TYPE: u16 = 0x0203;
pub const RES_TABLE_OVERLAYABLE_TYPE: u16 = 0x0204;
pub const RES_TABLE_OVERLAYABLE_POLICY_TYPE: u16 = 0x0205;
pub const RES_TABLE_STAGED_ALIAS_TYPE: u16 = 0x0206;

/// Size of the `ResChunk_header` shared by every chunk.
pub const CHUNK_HEADER_SIZE: u16 = 8;

/// Smallest header a chunk of the given type can legally declare.
pub fn minimum_header_size(chunk_type: u16) -> u16 {
    match chunk_type {
        RES_STRING_POOL_TYPE => 28,
        RES_TABLE_TYPE => 12,
        RES_XML_START_NAMESPACE_TYPE
        | RES_XML_END_NAMESPACE_TYPE
        | RES_XML_START_ELEMENT_TYPE
        | RES_XML_END_ELEMENT_TYPE
        | RES_XML_CDATA_TYPE => 16,
        RES_TABLE_PACKAGE_TYPE => 284,
        // id, flags, reserved, entryCount, entriesStart and the config size field
        RES_TABLE_TYPE_TYPE => 24,
        RES_TABLE_TYPE_SPEC_TYPE => 16,
        RES_TABLE_LIBRARY_TYPE => 12,
        _ => CHUNK_HEADER_SIZE,
    }
}

/// A decoded `ResChunk_header` and the absolute offset it was read at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub size: u32,
    pub offset: usize,
}

impl ChunkHeader {
    /// First byte past the header, where the chunk's body begins.
    pub fn body_start(&self) -> usize {
        self.offset + self.header_size as usize
    }

    pub fn end(&self) -> usize {
        self.offset + self.size as usize
    }

    /// Where the next chunk at the same nesting level starts.
    pub fn next_sibling(&self) -> usize {
        self.end()
    }
}

/// Little-endian cursor over a window `[start, end)` of a byte buffer.
///
/// Positions are always absolute offsets into the whole buffer so that errors
/// can be located in a hex dump directly.
#[derive(Clone, Copy, Debug)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    start: usize,
    pos: usize,
    end: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ChunkReader {
            data,
            start: 0,
            pos: 0,
            end: data.len(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> ResResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ResError::truncated(self.pos, len, self.remaining()));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> ResResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> ResResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> ResResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> ResResult<&'a [u8]> {
        self.take(len)
    }

    /// Moves to an absolute offset inside this reader's window.
    pub fn seek(&mut self, offset: usize) -> ResResult<()> {
        if offset < self.start || offset > self.end {
            return Err(ResError::truncated(
                offset,
                offset.saturating_sub(self.start),
                self.end - self.start,
            ));
        }
        self.pos = offset;
        Ok(())
    }

    /// A reader over `[start, end)`, which must lie inside this reader's window.
    pub fn window(&self, start: usize, end: usize) -> ResResult<ChunkReader<'a>> {
        if start > end || start < self.start || end > self.end {
            return Err(ResError::truncated(
                start,
                end.saturating_sub(start),
                self.end.saturating_sub(start.max(self.start)),
            ));
        }
        Ok(ChunkReader {
            data: self.data,
            start,
            pos: start,
            end,
        })
    }

    /// Reads the chunk header at the current position and checks it against
    /// this reader's bounds. On success the cursor sits just after the 8-byte
    /// header.
    pub fn read_chunk_header(&mut self) -> ResResult<ChunkHeader> {
        let offset = self.pos;
        let chunk_type = self.read_u16()?;
        let header_size = self.read_u16()?;
        let size = self.read_u32()?;

        let minimum = minimum_header_size(chunk_type);
        if header_size < minimum {
            return Err(malformed!(
                offset,
                "header size {} below minimum {} for chunk type 0x{:04x}",
                header_size,
                minimum,
                chunk_type
            ));
        }
        if size < header_size as u32 {
            return Err(malformed!(
                offset,
                "chunk size {} smaller than its header size {}",
                size,
                header_size
            ));
        }
        let end = offset.checked_add(size as usize).ok_or_else(|| {
            malformed!(offset, "chunk size {} overflows", size)
        })?;
        if end > self.end {
            return Err(malformed!(
                offset,
                "chunk of {} bytes extends past its container ({} bytes available)",
                size,
                self.end - offset
            ));
        }
        Ok(ChunkHeader {
            chunk_type,
            header_size,
            size,
            offset,
        })
    }

    /// Cursor restricted to the chunk body, `[offset + headerSize, offset + size)`.
    pub fn bounded(&self, chunk: &ChunkHeader) -> ResResult<ChunkReader<'a>> {
        self.window(chunk.body_start(), chunk.end())
    }

    /// Cursor over the chunk-specific header fields that follow the common 8 bytes.
    pub fn header_fields(&self, chunk: &ChunkHeader) -> ResResult<ChunkReader<'a>> {
        self.window(chunk.offset + CHUNK_HEADER_SIZE as usize, chunk.body_start())
    }

    /// Iterates the sibling chunks that fill the rest of this reader's window.
    pub fn chunks(&self) -> ChunkIter<'a> {
        ChunkIter {
            reader: *self,
            done: false,
        }
    }
}

/// Forward-only iteration over sibling chunks. Stops after the first error.
pub struct ChunkIter<'a> {
    reader: ChunkReader<'a>,
    done: bool,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = ResResult<ChunkHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }
        let result = self
            .reader
            .read_chunk_header()
            .and_then(|header| self.reader.seek(header.next_sibling()).map(|_| header));
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
