// Byte → text decoding shared by both readers.

use std::borrow::Cow;

/// Decode bytes as UTF-8, falling back to Windows-1252 (common for exported
/// registry dumps) instead of failing.
pub(crate) fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded
        }
    }
}

/// Owned variant for whole-file reads.
pub(crate) fn decode_owned(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        assert_eq!(decode("ACME TRUCKING".as_bytes()), "ACME TRUCKING");
    }

    #[test]
    fn latin1_byte_is_recovered() {
        // 0xC9 = 'É' in Windows-1252, invalid as a lone UTF-8 byte
        let bytes = b"CAF\xC9 FREIGHT".to_vec();
        assert_eq!(decode(&bytes), "CAFÉ FREIGHT");
        assert_eq!(decode_owned(bytes), "CAFÉ FREIGHT");
    }
}
