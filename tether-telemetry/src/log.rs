//! Log bodies are free-form text.

/// Decode a log body. Invalid UTF-8 is replaced; an empty body is `None`.
pub fn decode_log(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}
