//! Storage encoding for governance records (bincode).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GovernanceError;

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GovernanceError> {
    bincode::serialize(value).map_err(|e| GovernanceError::Codec(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GovernanceError> {
    bincode::deserialize(bytes).map_err(|e| GovernanceError::Codec(e.to_string()))
}
