use std::fmt::Write;

/// Encodes a string per RFC 5987 `value-chars`, as used by the
/// `filename*` parameter of `content-disposition`. Operates on the UTF-8
/// bytes of the input: control bytes, high bytes, `%`, `\` and `/` become
/// `%XX`; everything else (including space) passes through.
pub fn encode_value_chars(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            0x00..=0x1f | 0x7f..=0xff | b'%' | b'\\' | b'/' => {
                let _ = write!(encoded, "%{byte:02X}");
            }
            _ => encoded.push(byte as char),
        }
    }
    encoded
}
