pub mod dto;

use std::result::Result as DefaultResult;

use serde::de::{DeserializeOwned, Error as DeError, Expected, Unexpected};
use serde::{Deserialize, Deserializer, Serializer};

use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

// identifiers may exceed the safe-integer range of javascript clients,
// they always travel as decimal strings
struct ExpectedIdentifier;

impl Expected for ExpectedIdentifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("unsigned integer in decimal string")
    }
}

fn decode_id<E: DeError>(raw: &str) -> DefaultResult<u64, E> {
    raw.parse::<u64>()
        .map_err(|_e| E::invalid_value(Unexpected::Str(raw), &ExpectedIdentifier))
}

pub fn jsn_serialize_id<S>(val: &u64, ser: S) -> DefaultResult<S::Ok, S::Error>
where
    S: Serializer,
{
    ser.serialize_str(val.to_string().as_str())
}

pub fn jsn_deserialize_id<'de, D>(raw: D) -> DefaultResult<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(raw)?;
    decode_id(s.as_str())
}

pub fn jsn_serialize_opt_id<S>(val: &Option<u64>, ser: S) -> DefaultResult<S::Ok, S::Error>
where
    S: Serializer,
{
    match val {
        Some(v) => jsn_serialize_id(v, ser),
        None => ser.serialize_none(),
    }
}

pub fn jsn_deserialize_opt_id<'de, D>(raw: D) -> DefaultResult<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(raw)?;
    s.map(|v| decode_id(v.as_str())).transpose()
}

/// Identifier given in path or query of a request
pub fn parse_id(raw: &str) -> DefaultResult<u64, AppError> {
    raw.parse::<u64>().map_err(|_e| AppError {
        code: AppErrorCode::InvalidInput,
        detail: Some(format!("identifier:{raw}")),
    })
}

/// Decode request body, any malformed field rejects the whole request
pub fn parse_json<T: DeserializeOwned>(raw: &[u8]) -> DefaultResult<T, AppError> {
    serde_json::from_slice::<T>(raw).map_err(|e| AppError {
        code: AppErrorCode::InvalidInput,
        detail: Some(e.to_string()),
    })
}

pub fn parse_json_value<T: DeserializeOwned>(raw: serde_json::Value) -> DefaultResult<T, AppError> {
    serde_json::from_value::<T>(raw).map_err(|e| AppError {
        code: AppErrorCode::InvalidInput,
        detail: Some(e.to_string()),
    })
}
