use std::fmt;
use std::io;

/// Builds a positioned [`ResErrorKind::MalformedChunk`] error.
macro_rules! malformed {
    ($offset:expr, $msg:literal) => {
        $crate::android::error::ResError::new(
            $crate::android::error::ResErrorKind::MalformedChunk($msg.to_string()),
        )
        .at($offset)
    };
    ($offset:expr, $fmtstr:literal, $($args:tt)*) => {
        $crate::android::error::ResError::new(
            $crate::android::error::ResErrorKind::MalformedChunk(format!($fmtstr, $($args)*)),
        )
        .at($offset)
    };
}

/// Result alias for resource table and binary XML decoding.
pub type ResResult<T> = Result<T, ResError>;

/// What went wrong while decoding.
#[derive(Debug)]
pub enum ResErrorKind {
    /// Header fields or structure violate the format's invariants.
    MalformedChunk(String),
    /// A read went past the end of the enclosing chunk or buffer.
    TruncatedChunk { wanted: usize, available: usize },
    /// A string or style index outside of the pool.
    InvalidPoolIndex { index: u32, count: usize },
    /// A `Res_value` data type this decoder does not know.
    UnsupportedValueType(u8),
    /// A pooled string whose declared length does not fit its pool.
    StringTooLong { length: usize, available: usize },
    Io(io::Error),
    Xml(String),
}

impl fmt::Display for ResErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResErrorKind::MalformedChunk(msg) => write!(f, "malformed chunk: {msg}"),
            ResErrorKind::TruncatedChunk { wanted, available } => write!(
                f,
                "truncated chunk: wanted {wanted} bytes, {available} available"
            ),
            ResErrorKind::InvalidPoolIndex { index, count } => {
                write!(f, "string pool index {index} out of range (pool holds {count})")
            }
            ResErrorKind::UnsupportedValueType(data_type) => {
                write!(f, "unsupported value type 0x{data_type:02x}")
            }
            ResErrorKind::StringTooLong { length, available } => write!(
                f,
                "string of length {length} exceeds the {available} bytes left in its pool"
            ),
            ResErrorKind::Io(err) => write!(f, "I/O error: {err}"),
            ResErrorKind::Xml(msg) => write!(f, "XML error: {msg}"),
        }
    }
}

/// A decoding error along with where in the input it happened.
#[derive(Debug)]
pub struct ResError {
    kind: ResErrorKind,
    offset: Option<usize>,
    chunk: Option<(u16, usize)>,
    resource_id: Option<u32>,
}

impl ResError {
    pub fn new(kind: ResErrorKind) -> Self {
        ResError {
            kind,
            offset: None,
            chunk: None,
            resource_id: None,
        }
    }

    pub(crate) fn truncated(offset: usize, wanted: usize, available: usize) -> Self {
        ResError::new(ResErrorKind::TruncatedChunk { wanted, available }).at(offset)
    }

    /// Records the byte offset of the failure unless an inner frame already did.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset.get_or_insert(offset);
        self
    }

    /// Records the innermost chunk the failure happened in.
    pub fn in_chunk(mut self, chunk_type: u16, chunk_offset: usize) -> Self {
        self.chunk.get_or_insert((chunk_type, chunk_offset));
        self
    }

    pub fn for_resource(mut self, resource_id: u32) -> Self {
        self.resource_id.get_or_insert(resource_id);
        self
    }

    pub fn kind(&self) -> &ResErrorKind {
        &self.kind
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn chunk_type(&self) -> Option<u16> {
        self.chunk.map(|(chunk_type, _)| chunk_type)
    }

    pub fn resource_id(&self) -> Option<u32> {
        self.resource_id
    }
}

impl fmt::Display for ResError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(offset) = self.offset {
            write!(f, " at offset 0x{offset:x}")?;
        }
        if let Some((chunk_type, chunk_offset)) = self.chunk {
            write!(f, " in chunk 0x{chunk_type:04x} starting at 0x{chunk_offset:x}")?;
        }
        if let Some(id) = self.resource_id {
            write!(f, " for resource 0x{id:08x}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ResErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ResError {
    fn from(value: io::Error) -> Self {
        ResError::new(ResErrorKind::Io(value))
    }
}

impl From<quick_xml::Error> for ResError {
    fn from(value: quick_xml::Error) -> Self {
        ResError::new(ResErrorKind::Xml(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn inner_context_wins() {
        let err = malformed!(0x10, "bad header size {}", 4)
            .at(0x20)
            .in_chunk(0x0201, 0x08)
            .in_chunk(0x0200, 0x00)
            .for_resource(0x7f01_0000);
        assert_eq!(err.offset(), Some(0x10));
        assert_eq!(err.chunk_type(), Some(0x0201));
        assert_eq!(
            err.to_string(),
            "malformed chunk: bad header size 4 at offset 0x10 in chunk 0x0201 starting at 0x8 for resource 0x7f010000"
        );
    }
}
