//! Incremental UTF-8 decoding for chunked byte streams.

use encoding_rs::{CoderResult, Decoder, UTF_8};

/// Decodes a byte stream chunk by chunk.
///
/// Wraps an `encoding_rs` streaming decoder, so a multi-byte sequence split
/// across chunk boundaries is held back until the rest arrives, and malformed
/// input decodes to U+FFFD instead of failing the stream.
pub struct Utf8ChunkDecoder {
    inner: Decoder,
}

impl Default for Utf8ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Utf8ChunkDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utf8ChunkDecoder").finish_non_exhaustive()
    }
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self {
            inner: UTF_8.new_decoder_without_bom_handling(),
        }
    }

    /// Decode `chunk`, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        decode_into(&mut self.inner, chunk, false)
    }

    /// Flush at end of stream. A dangling partial sequence becomes one U+FFFD.
    ///
    /// The decoder is reset afterwards and can be reused for a new stream.
    pub fn finish(&mut self) -> String {
        let mut finished =
            std::mem::replace(&mut self.inner, UTF_8.new_decoder_without_bom_handling());
        decode_into(&mut finished, &[], true)
    }
}

fn decode_into(decoder: &mut Decoder, mut src: &[u8], last: bool) -> String {
    let capacity = decoder
        .max_utf8_buffer_length(src.len())
        .unwrap_or(src.len().saturating_mul(3).saturating_add(4));
    let mut out = String::with_capacity(capacity);
    loop {
        let (result, read, _had_errors) = decoder.decode_to_string(src, &mut out, last);
        src = &src[read..];
        match result {
            CoderResult::InputEmpty => return out,
            CoderResult::OutputFull => out.reserve(src.len().saturating_mul(3).saturating_add(4)),
        }
    }
}
