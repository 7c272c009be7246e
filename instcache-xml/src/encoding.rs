//! Character encoding detection for raw XML bytes.
//!
//! The encoding is taken from the byte order mark if there is one, then from
//! the first bytes of a UTF-16 document without a mark, then from the
//! `encoding` pseudo-attribute of the XML declaration. Anything else is read
//! as UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use instcache_core::error::{InstanceCacheError, Result};

/// Upper bound on how far into the document the declaration is searched for.
const DECLARATION_SCAN_LIMIT: usize = 1024;

/// Decodes `bytes` to UTF-8 text, honouring the BOM and the XML declaration.
///
/// Undecodable input is a `ParseFailed` error; nothing is replaced.
pub(crate) fn decode<'a>(bytes: &'a [u8], base_uri: &str) -> Result<Cow<'a, str>> {
    let (encoding, body) = detect(bytes, base_uri)?;

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| InstanceCacheError::ParseFailed {
            uri: base_uri.to_string(),
            reason: format!("document is not valid {}", encoding.name()),
        })
}

/// Picks the encoding and returns the bytes that follow any BOM.
fn detect<'a>(bytes: &'a [u8], base_uri: &str) -> Result<(&'static Encoding, &'a [u8])> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return Ok((encoding, &bytes[bom_len..]));
    }

    // '<?' in UTF-16 without a mark
    match bytes {
        [0x00, b'<', 0x00, b'?', ..] => return Ok((UTF_16BE, bytes)),
        [b'<', 0x00, b'?', 0x00, ..] => return Ok((UTF_16LE, bytes)),
        _ => {}
    }

    let Some(label) = declared_label(bytes) else {
        return Ok((UTF_8, bytes));
    };

    let encoding = Encoding::for_label(label).ok_or_else(|| InstanceCacheError::ParseFailed {
        uri: base_uri.to_string(),
        reason: format!("unsupported encoding '{}'", String::from_utf8_lossy(label)),
    })?;

    // An ASCII-compatible prefix cannot really be UTF-16.
    Ok((encoding.output_encoding(), bytes))
}

/// Returns the raw `encoding` value of a leading `<?xml ...?>` declaration.
fn declared_label(bytes: &[u8]) -> Option<&[u8]> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }

    let window = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    let end = find(window, b"?>")?;
    let declaration = &window[..end];

    let after_name = &declaration[find(declaration, b"encoding")? + b"encoding".len()..];
    let after_eq = trim_start(after_name).strip_prefix(b"=")?;
    let value = trim_start(after_eq);

    let (&quote, rest) = value.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = rest.iter().position(|&b| b == quote)?;
    Some(&rest[..close])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[skip..]
}
