use serde::Serialize;
use serde::de::DeserializeOwned;

/// Canonical binary encoding for persisted entities and peer RPC payloads.
///
/// CBOR with struct fields in declaration order, so a stored record
/// round-trips to byte-identical output.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cbor encode failed: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    #[error("cbor decode failed: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)?;
    Ok(buf)
}

pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(ciborium::de::from_reader(bytes)?)
}
