//! BBC name \<-\> host filename escaping (§3 "Name escaping").

/// Windows stems that must never appear verbatim as a host path component.
const RESERVED_STEMS: &[&str] =
    &["CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3", "LPT4"];

/// Bytes outside the printable ASCII range, or within it but unsafe on a
/// host filesystem, are escaped as `#HH` (two uppercase hex digits).
fn must_escape(byte: u8) -> bool {
    if !(33..=126).contains(&byte) {
        return true;
    }
    matches!(byte, b'/' | b'<' | b'>' | b':' | b'"' | b'\\' | b'|' | b'?' | b'*' | b'.' | b' ' | b'#')
}

/// Converts a BBC-visible name into a host-safe path component.
///
/// Bytes outside `[33..126] \ {/ < > : " \ | ? * . space #}` are escaped as
/// `#HH`; if the result collides with a Windows-reserved stem (`CON`,
/// `PRN`, …) its first character is escaped too so the stem never appears
/// verbatim on disk.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        if must_escape(byte) {
            out.push_str(&format!("#{byte:02X}"));
        } else {
            out.push(byte as char);
        }
    }

    let stem = out.split('.').next().unwrap_or(&out);
    if RESERVED_STEMS.iter().any(|reserved| reserved.eq_ignore_ascii_case(stem)) {
        let mut chars = out.chars();
        if let Some(first) = chars.next() {
            out = format!("#{:02X}{}", first as u8, chars.as_str());
        }
    }
    out
}

/// Reverses [`escape_name`], recovering the original BBC-visible name.
pub fn unescape_name(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && i + 2 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(&escaped[i + 1..i + 3], 16) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
