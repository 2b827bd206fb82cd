pub(super) mod address;
pub(super) mod cart;
pub(super) mod coupon;
pub(super) mod order;
pub(super) mod product;
pub(super) mod stock_level;

use std::collections::HashSet;
use std::fmt::Display;
use std::result::Result as DefaultResult;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AbsDStoreFilterKeyOp;
use crate::error::AppError;

// each row is a list of stringified columns, optional column is saved
// as empty string
pub(super) fn col_from_opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

pub(super) fn col_from_time(v: &DateTime<FixedOffset>) -> String {
    v.to_rfc3339()
}

fn col_raw<'a>(row: &'a [String], idx: usize, table: &str) -> DefaultResult<&'a str, AppError> {
    row.get(idx).map(String::as_str).ok_or_else(|| AppError {
        code: AppErrorCode::DataCorruption,
        detail: Some(format!("table:{table}, missing-column:{idx}")),
    })
}

pub(super) fn col_parse<T>(row: &[String], idx: usize, table: &str) -> DefaultResult<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = col_raw(row, idx, table)?;
    raw.parse::<T>().map_err(|e| AppError {
        code: AppErrorCode::DataCorruption,
        detail: Some(format!("table:{table}, column:{idx}, {e}")),
    })
}

pub(super) fn col_parse_opt<T>(
    row: &[String],
    idx: usize,
    table: &str,
) -> DefaultResult<Option<T>, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    if col_raw(row, idx, table)?.is_empty() {
        Ok(None)
    } else {
        col_parse(row, idx, table).map(Some)
    }
}

pub(super) fn col_string(row: &[String], idx: usize, table: &str) -> DefaultResult<String, AppError> {
    col_raw(row, idx, table).map(ToString::to_string)
}

pub(super) fn col_string_opt(
    row: &[String],
    idx: usize,
    table: &str,
) -> DefaultResult<Option<String>, AppError> {
    let raw = col_raw(row, idx, table)?;
    Ok(if raw.is_empty() { None } else { Some(raw.to_string()) })
}

pub(super) fn col_time(
    row: &[String],
    idx: usize,
    table: &str,
) -> DefaultResult<DateTime<FixedOffset>, AppError> {
    let raw = col_raw(row, idx, table)?;
    DateTime::parse_from_rfc3339(raw).map_err(|e| AppError {
        code: AppErrorCode::DataCorruption,
        detail: Some(format!("table:{table}, column:{idx}, {e}")),
    })
}

pub(super) fn col_time_opt(
    row: &[String],
    idx: usize,
    table: &str,
) -> DefaultResult<Option<DateTime<FixedOffset>>, AppError> {
    if col_raw(row, idx, table)?.is_empty() {
        Ok(None)
    } else {
        col_time(row, idx, table).map(Some)
    }
}

pub(super) fn col_from_bool(v: bool) -> String {
    if v { "1" } else { "0" }.to_string()
}

pub(super) fn col_bool(row: &[String], idx: usize, table: &str) -> DefaultResult<bool, AppError> {
    Ok(col_raw(row, idx, table)? == "1")
}

/// Select rows whose key starts with `<prefix>-` for any of the prefixes,
/// e.g. all lines of several orders.
pub(super) struct KeyPrefixFilter(pub(super) HashSet<String>);

impl AbsDStoreFilterKeyOp for KeyPrefixFilter {
    fn filter(&self, k: &String, _v: &Vec<String>) -> bool {
        k.split_once('-')
            .map_or(false, |(prefix, _)| self.0.contains(prefix))
    }
}

/// Select rows whose column at `idx` equals `value`.
pub(super) struct ColumnEqFilter {
    pub(super) idx: usize,
    pub(super) value: String,
}

impl AbsDStoreFilterKeyOp for ColumnEqFilter {
    fn filter(&self, _k: &String, v: &Vec<String>) -> bool {
        v.get(self.idx).map_or(false, |c| c == &self.value)
    }
}

pub(super) fn key_suffix<T>(key: &str, table: &str) -> DefaultResult<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    key.split_once('-')
        .map(|(_, s)| s)
        .ok_or_else(|| format!("malformed-key:{key}"))
        .and_then(|s| s.parse::<T>().map_err(|e| e.to_string()))
        .map_err(|detail| AppError {
            code: AppErrorCode::DataCorruption,
            detail: Some(format!("table:{table}, {detail}")),
        })
}

pub(super) fn malformed_key(table: &str, key: &str) -> AppError {
    AppError {
        code: AppErrorCode::DataCorruption,
        detail: Some(format!("table:{table}, malformed-key:{key}")),
    }
}
