//! Length-capped string helpers
//!
//! Every user-supplied string that ends up inside a session slot, a cluster or
//! a caller buffer passes through here. Truncation is silent and always lands on
//! a UTF-8 character boundary.

/// Largest index `<= max_len` that is a char boundary of `s`
pub fn floor_char_boundary(s: &str, max_len: usize) -> usize {
    if max_len >= s.len() {
        return s.len();
    }
    let mut idx = max_len;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Borrow at most `max_len` bytes of `s`
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    &s[..floor_char_boundary(s, max_len)]
}

/// Owned copy of at most `max_len` bytes of `s`
pub fn bounded_string(s: &str, max_len: usize) -> String {
    truncate_str(s, max_len).to_owned()
}

/// Copy `src` into `buf`, leaving room for a trailing NUL byte.
///
/// Returns the number of text bytes written (the terminator is not counted).
/// A zero-length buffer receives nothing and 0 is returned.
pub fn copy_nul_terminated(src: &str, buf: &mut [u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }
    let text = truncate_str(src, buf.len() - 1);
    let n = text.len();
    buf[..n].copy_from_slice(text.as_bytes());
    buf[n] = 0;
    n
}
