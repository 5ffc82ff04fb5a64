/// Encodes a plaintext password into the `unicodePwd` format: the password
/// wrapped in double quotes, as UTF-16LE.
///
/// The directory only accepts this attribute over an encrypted connection.
pub fn encode_password(plaintext: &str) -> Vec<u8> {
    let quoted = format!("\"{}\"", plaintext);
    quoted.encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::encode_password;

    #[test]
    fn test_ascii() {
        assert_eq!(encode_password("new"), b"\"\x00n\x00e\x00w\x00\"\x00");
    }

    #[test]
    fn test_non_ascii() {
        let encoded = encode_password("H\u{e4}mmerli-dk23#");
        assert_eq!(&encoded[..6], b"\"\x00H\x00\xE4\x00");
        assert_eq!(encoded.len(), 2 * "\"H\u{e4}mmerli-dk23#\"".chars().count());
    }

    #[test]
    fn test_astral_plane() {
        // surrogate pair for U+1F511
        assert_eq!(encode_password("\u{1F511}"), b"\"\x00\x3D\xD8\x11\xDD\"\x00");
    }
}
