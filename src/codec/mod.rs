mod hex;
mod kiss;

pub use hex::{format_hex, parse_hex, HexError};
#[cfg(test)]
pub use kiss::encode;
pub use kiss::{KissDecoder, DEFAULT_MAX_FRAME};

/// Serde adapter that carries frame bytes as hex text (`0x86 0xa2 ...`).
pub mod hex_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_hex(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}
