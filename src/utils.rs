//! Utility functions shared by workloads and the engine.
//!

use anyhow::Result;
use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Lines of an input split, decoded lossily.
///
/// Input splits come straight from user files, so a stray invalid byte
/// must not fail the whole task. `\r\n` endings are handled by [`str::lines`].
pub fn split_lines(buf: &Bytes) -> Vec<String> {
    String::from_utf8_lossy(buf)
        .lines()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_from_bytes() {
        let b = Bytes::from_static(b"Willem Dafoe|1998");
        assert_eq!(string_from_bytes(b).unwrap(), "Willem Dafoe|1998");
        assert!(string_from_bytes(Bytes::from_static(b"\xff")).is_err());
    }

    #[test]
    fn lines_tolerate_bad_bytes_and_crlf() {
        let lines = split_lines(&Bytes::from_static(b"a\tb\r\nc\xff\n\nd"));
        assert_eq!(lines, vec!["a\tb", "c\u{fffd}", "", "d"]);
    }
}
