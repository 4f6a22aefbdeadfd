//! CBOR encoding shared by stored records, payloads and signable content.

use crate::Error;
use serde::{Serialize, de::DeserializeOwned};

/// Encode a value as CBOR.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)?;
    Ok(buf)
}

/// Decode a CBOR value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(ciborium::from_reader(bytes)?)
}
