//! Shared primitive types and serde helpers.

/// A 32-byte SSZ chunk or hash tree root.
pub type Root = [u8; 32];

/// Amount in Gwei.
pub type Gwei = u64;

/// Position of a validator in the beacon state's validator list.
pub type ValidatorIndex = u64;

/// 20-byte execution-layer address.
pub type Address = [u8; 20];

/// `0x`-prefixed hex encoding of arbitrary bytes.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Serde for a `[u8; 32]` as a `0x` hex string.
pub mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_hex(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Serde for `Vec<[u8; 32]>` as an array of `0x` hex strings.
pub mod proof_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(data: &Vec<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data.iter().map(|h| super::to_hex(h)).collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .into_iter()
            .map(|s| {
                let s = s.strip_prefix("0x").unwrap_or(&s);
                let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
            })
            .collect()
    }
}

/// Serde for `Vec<Vec<[u8; 32]>>` (one hex array per validator or withdrawal).
pub mod nested_proof_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(data: &Vec<Vec<[u8; 32]>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nested: Vec<Vec<String>> = data
            .iter()
            .map(|inner| inner.iter().map(|h| super::to_hex(h)).collect())
            .collect();
        nested.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<[u8; 32]>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nested: Vec<Vec<String>> = Vec::deserialize(deserializer)?;
        nested
            .into_iter()
            .map(|inner| {
                inner
                    .into_iter()
                    .map(|s| {
                        let s = s.strip_prefix("0x").unwrap_or(&s);
                        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                        bytes
                            .try_into()
                            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
                    })
                    .collect()
            })
            .collect()
    }
}
