//! Content checksums for embedding staleness
//!
//! The checksum is taken over the exact text handed to the embedding
//! provider, so "same checksum" means "same embedding input".

use xxhash_rust::xxh3::xxh3_64;

/// Collapse whitespace runs to single spaces, trim, cap at `max_chars` characters
pub fn normalize_text(text: &str, max_chars: usize) -> String {
    let mut normalized = String::with_capacity(text.len().min(max_chars.saturating_mul(4)));
    let mut count = 0;

    for word in text.split_whitespace() {
        if count > 0 {
            if count == max_chars {
                break;
            }
            normalized.push(' ');
            count += 1;
        }
        for c in word.chars() {
            if count == max_chars {
                break;
            }
            normalized.push(c);
            count += 1;
        }
    }

    normalized.truncate(normalized.trim_end().len());
    normalized
}

/// 16 hex chars of xxh3-64 over already-normalized text
pub fn content_checksum(normalized: &str) -> String {
    format!("{:016x}", xxh3_64(normalized.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  hello \n\n world\t!  ", 100), "hello world !");
        assert_eq!(normalize_text("", 100), "");
        assert_eq!(normalize_text(" \n\t ", 100), "");
    }

    #[test]
    fn test_normalize_truncates_by_chars() {
        assert_eq!(normalize_text("abcdef", 3), "abc");
        assert_eq!(normalize_text("ab cd ef", 4), "ab c");
        // never ends on the separator
        assert_eq!(normalize_text("ab cd", 3), "ab");
        assert_eq!(normalize_text("한국어 테스트", 4), "한국어");
    }

    #[test]
    fn test_checksum_deterministic() {
        let a = content_checksum("machine learning ethics");
        let b = content_checksum("machine learning ethics");
        let c = content_checksum("machine learning");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_whitespace_only_edits_keep_checksum() {
        let before = content_checksum(&normalize_text("Notes on\nRust", 8000));
        let after = content_checksum(&normalize_text("Notes  on Rust\n", 8000));
        assert_eq!(before, after);
    }
}
