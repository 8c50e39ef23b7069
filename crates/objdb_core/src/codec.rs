//! CBOR encoding of record payloads.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a payload to CBOR bytes.
pub(crate) fn encode<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a payload from CBOR bytes.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Row, Value};

    #[test]
    fn row_survives_encoding() {
        let row = Row::new()
            .with("name", "ada")
            .with("age", 36)
            .with("tags", Value::Array(vec!["x".into()]));
        let bytes = encode(&row).unwrap();
        let decoded: Row = decode(&bytes).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let result: CoreResult<Row> = decode(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CoreError::Codec { .. })));
    }
}
