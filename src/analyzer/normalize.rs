//! Query text normalization and signatures
//!
//! Two query texts land in the same cluster when they normalize to the same
//! string: comments removed, case folded, whitespace collapsed, trailing
//! semicolons dropped. With literal parameterization on, numbers and
//! single-quoted strings become `?` so `WHERE id = 1` and `WHERE id = 2` match.

use rustc_hash::FxHasher;
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};
use std::iter::Peekable;
use std::str::Chars;

/// Normalize `text` for clustering
pub fn normalize(text: &str, parameterize_literals: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
                pending_space = true;
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            c if c.is_whitespace() => pending_space = true,
            '\'' => {
                push_separator(&mut out, &mut pending_space);
                let literal = take_string_literal(&mut chars);
                if parameterize_literals {
                    out.push('?');
                } else {
                    out.push('\'');
                    out.extend(literal.chars().flat_map(char::to_lowercase));
                }
            }
            c if c.is_ascii_digit() && parameterize_literals && !continues_identifier(&out, pending_space) => {
                push_separator(&mut out, &mut pending_space);
                while matches!(chars.peek(), Some(d) if d.is_ascii_digit() || *d == '.') {
                    chars.next();
                }
                out.push('?');
            }
            c => {
                push_separator(&mut out, &mut pending_space);
                out.extend(c.to_lowercase());
            }
        }
    }

    while out.ends_with(';') || out.ends_with(' ') {
        out.pop();
    }
    out
}

fn push_separator(out: &mut String, pending_space: &mut bool) {
    if *pending_space && !out.is_empty() {
        out.push(' ');
    }
    *pending_space = false;
}

// Digits directly after an identifier character belong to the identifier (table_1, t2)
fn continues_identifier(out: &str, pending_space: bool) -> bool {
    !pending_space && out.chars().next_back().is_some_and(|p| p.is_alphanumeric() || p == '_')
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            return;
        }
    }
}

/// Consume a single-quoted literal after its opening quote, honouring `''` escapes.
/// Returns the literal including the closing quote when one was found.
fn take_string_literal(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut literal = String::new();
    while let Some(c) = chars.next() {
        literal.push(c);
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                literal.push('\'');
                chars.next();
            } else {
                break;
            }
        }
    }
    literal
}

/// Cluster key for a normalized query
pub fn signature(normalized: &str) -> u64 {
    let mut hasher = FxHasher::default();
    normalized.hash(&mut hasher);
    hasher.finish()
}

/// Stable SHA-256 hex fingerprint, safe to persist across processes
pub fn fingerprint(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}
