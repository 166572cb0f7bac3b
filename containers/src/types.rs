use hex::FromHex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 32-byte content identifier used for block and transaction hashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl FromStr for Hash32 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 32] = <[u8; 32]>::from_hex(s)?;
        Ok(Hash32(bytes))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl TryFrom<&[u8]> for Hash32 {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Hash32(<[u8; 32]>::try_from(value)?))
    }
}

// Hashes travel as CBOR byte strings, not integer sequences.
impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Hash32Visitor;

        impl<'de> Visitor<'de> for Hash32Visitor {
            type Value = Hash32;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 32-byte hash")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Hash32, E> {
                Hash32::try_from(v).map_err(|_| E::invalid_length(v.len(), &self))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Hash32, A::Error> {
                let mut bytes = Vec::with_capacity(32);
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Hash32::try_from(bytes.as_slice())
                    .map_err(|_| de::Error::invalid_length(bytes.len(), &self))
            }
        }

        deserializer.deserialize_bytes(Hash32Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash32([0xab; 32]);
        let encoded = hash.to_string();
        assert_eq!(encoded.len(), 64);
        assert_eq!(Hash32::from_str(&encoded).unwrap(), hash);
    }

    #[test]
    fn test_rejects_short_hex() {
        assert!(Hash32::from_str("abcd").is_err());
    }

    #[test]
    fn test_cbor_round_trip() {
        let hash = Hash32([7; 32]);
        let bytes = crate::to_cbor(&hash).unwrap();
        let decoded: Hash32 = crate::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn test_zero() {
        assert!(Hash32::ZERO.is_zero());
        assert!(!Hash32([1; 32]).is_zero());
    }
}
