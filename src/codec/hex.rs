use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HexError {
    #[error("token {index} ({token:?}) is not a 0x-prefixed byte")]
    InvalidToken { index: usize, token: String },
}

/// Renders bytes as space separated lowercase tokens: `0x86 0xa2 0x00`.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_hex(text: &str) -> Result<Vec<u8>, HexError> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, token)| {
            let invalid = || HexError::InvalidToken {
                index,
                token: token.to_string(),
            };
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .ok_or_else(invalid)?;
            if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            u8::from_str_radix(digits, 16).map_err(|_| invalid())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_lowercase_tokens() {
        assert_eq!(format_hex(&[0x86, 0xA2, 0x00, 0xff]), "0x86 0xa2 0x00 0xff");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn parses_text_with_trailing_space() {
        // older link clients emit a trailing space after every token
        let bytes = parse_hex("0x86 0xa2 0x86 0xa2 ").unwrap();
        assert_eq!(bytes, vec![0x86, 0xa2, 0x86, 0xa2]);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(
            parse_hex("0x86 a2"),
            Err(HexError::InvalidToken {
                index: 1,
                token: "a2".into()
            })
        );
        assert!(parse_hex("0x8").is_err());
        assert!(parse_hex("0xzz").is_err());
        assert!(parse_hex("hello world").is_err());
    }

    #[test]
    fn empty_text_is_empty_payload() {
        assert_eq!(parse_hex("   ").unwrap(), Vec::<u8>::new());
    }
}
