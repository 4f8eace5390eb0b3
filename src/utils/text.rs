/// Returns at most `max` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Renders the first `max` bytes of a body for logs and probe output.
pub fn lossy_preview(bytes: &[u8], max: usize) -> String {
    let end = bytes.len().min(max);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Decodes an HTML body to UTF-8.
///
/// Order: BOM sniff, `charset=` from the Content-Type, then chardetng detection.
/// Landing pages are only scanned for links, so decoding errors fall back to lossy UTF-8.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some((enc, offset)) = encoding_rs::Encoding::for_bom(bytes) {
        let (cow, _had_errors) = enc.decode_without_bom_handling(&bytes[offset..]);
        return cow.into_owned();
    }

    if let Some(label) = extract_charset_label(content_type) {
        if let Some(enc) = encoding_rs::Encoding::for_label_no_replacement(label.as_bytes()) {
            let (cow, _used, had_errors) = enc.decode(bytes);
            if !had_errors {
                return cow.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    let (cow, _used, had_errors) = enc.decode(bytes);
    if had_errors {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    cow.into_owned()
}

/// Extracts charset=... value from Content-Type header (case-insensitive) if present.
fn extract_charset_label(content_type: Option<&str>) -> Option<String> {
    let ct = content_type?;
    for part in ct.split(';').skip(1) {
        let kv = part.trim();
        if kv.to_ascii_lowercase().starts_with("charset=") {
            let v = kv[8..].trim().trim_matches('"').trim_matches('\'');
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }
    None
}
