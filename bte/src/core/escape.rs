//! Escape handling for `write` payloads.

/// Translate the two-character sequence `\n` into a newline byte.
///
/// No other escapes are recognized; a lone backslash is copied through.
pub fn translate_newlines(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_escaped_newlines() {
        assert_eq!(translate_newlines(r"hello\n"), b"hello\n".to_vec());
        assert_eq!(translate_newlines(r"a\nb\n"), b"a\nb\n".to_vec());
    }

    #[test]
    fn leaves_other_backslashes_alone() {
        assert_eq!(translate_newlines(r"a\tb"), br"a\tb".to_vec());
        assert_eq!(translate_newlines("trailing\\"), b"trailing\\".to_vec());
        assert_eq!(translate_newlines("real\nnewline"), b"real\nnewline".to_vec());
    }
}
