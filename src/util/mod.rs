pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Convert a UTF-16 offset (what the browser reports for text carets) into a byte index.
///
/// Offsets past the end clamp to `s.len()`; an offset that splits a surrogate pair
/// resolves to the start of that character.
pub(crate) fn utf16_to_byte_idx(s: &str, pos_utf16: usize) -> usize {
    if pos_utf16 == 0 {
        return 0;
    }
    let mut acc: usize = 0;
    for (i, ch) in s.char_indices() {
        let w = ch.len_utf16();
        if acc + w > pos_utf16 {
            return i;
        }
        acc += w;
        if acc == pos_utf16 {
            return i + ch.len_utf8();
        }
    }
    s.len()
}

pub(crate) fn byte_idx_to_utf16(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx.min(s.len())].encode_utf16().count()
}

pub(crate) fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}
