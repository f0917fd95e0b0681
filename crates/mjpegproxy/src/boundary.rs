use {
    crate::ProxyError,
    bytes::Bytes,
    futures_core::Stream,
    multer::{Field, Multipart},
};

/// Extract the multipart boundary token from a `Content-Type` header value.
///
/// Takes the `boundary=` parameter up to the next `;`, removes surrounding quotes
/// and strips at most one trailing `--`, which some cameras append to the token.
/// Returns `None` if there is no usable token.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    const KEY: &str = "boundary=";
    let start = content_type.to_ascii_lowercase().find(KEY)? + KEY.len();
    let value = content_type[start..].split(';').next()?.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    let value = value.strip_suffix("--").unwrap_or(value);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Successive parts of a multipart byte stream.
///
/// Wraps the `multer` decoder. Parts must be consumed one at a time: a `Part`
/// has to be dropped before the next one is requested.
pub struct BoundaryStreamReader {
    multipart: Multipart<'static>,
    chunk_size: usize,
}

impl BoundaryStreamReader {
    /// Decode `stream` as parts separated by `boundary`, handing out chunks of at
    /// most `chunk_size` bytes.
    pub fn new<S, O, E>(stream: S, boundary: impl Into<String>, chunk_size: usize) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self {
            multipart: Multipart::new(stream, boundary),
            chunk_size: chunk_size.max(1),
        }
    }

    /// The next part, or `None` once the closing boundary was read.
    pub async fn next_part(&mut self) -> Result<Option<Part>, ProxyError> {
        let field = self.multipart.next_field().await?;
        Ok(field.map(|field| Part {
            field,
            pending: Bytes::new(),
            chunk_size: self.chunk_size,
        }))
    }
}

/// One part of the stream, read chunk by chunk.
pub struct Part {
    field: Field<'static>,
    pending: Bytes,
    chunk_size: usize,
}

impl Part {
    /// Content type declared in the part headers, if any.
    pub fn content_type(&self) -> Option<String> {
        self.field.content_type().map(|mime| mime.to_string())
    }

    /// The next chunk of at most `chunk_size` bytes, `None` at the end of the part.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ProxyError> {
        if self.pending.is_empty() {
            match self.field.chunk().await? {
                Some(bytes) => self.pending = bytes,
                None => return Ok(None),
            }
        }
        let len = self.pending.len().min(self.chunk_size);
        Ok(Some(self.pending.split_to(len)))
    }
}
