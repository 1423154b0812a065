//! Incremental UTF-8 decoding
//!
//! Transport chunks are cut wherever the network cuts them, so a multi-byte
//! character regularly arrives in two pieces. [`Utf8Decoder`] carries the
//! incomplete tail of one chunk over to the next.

/// Replacement for byte sequences that can never become valid UTF-8
const REPLACEMENT: char = '\u{FFFD}';

/// Streaming UTF-8 decoder with explicit carry state
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Leading bytes of a character whose remaining bytes have not arrived
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with no carried bytes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, prefixed by any bytes carried from the previous call
    ///
    /// Invalid sequences become U+FFFD. An incomplete sequence at the end of
    /// the input is held back until the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Number of bytes waiting for the rest of their character
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush the carry state at end of input
    ///
    /// Returns a replacement character if an incomplete sequence was pending.
    pub fn finish(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(REPLACEMENT)
        }
    }
}
