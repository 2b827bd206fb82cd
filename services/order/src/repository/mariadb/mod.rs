pub(super) mod address;
pub(super) mod cart;
pub(super) mod coupon;
pub(super) mod order;
pub(super) mod product;
pub(super) mod stock;

use std::io::ErrorKind;
use std::ops::DerefMut;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use sqlx::error::Error;
use sqlx::mysql::{MySqlArguments, MySqlQueryResult};
use sqlx::query::Query;
use sqlx::{MySql, Transaction};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;

pub(super) type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

impl From<Error> for AppError {
    fn from(value: Error) -> Self {
        let (code, detail) = match value {
            Error::Configuration(e) => (
                AppErrorCode::InvalidInput,
                e.to_string() + " invalid-db-config",
            ),
            Error::InvalidArgument(e) => (AppErrorCode::InvalidInput, e),
            Error::Io(e) => (
                AppErrorCode::IOerror(e.kind()),
                e.to_string() + " io-err-mariadb",
            ),
            Error::Database(e) => (AppErrorCode::RemoteDbServerFailure, e.to_string()),
            Error::Protocol(errmsg) => (AppErrorCode::IOerror(ErrorKind::InvalidData), errmsg),
            Error::Encode(e) => (AppErrorCode::InvalidInput, e.to_string()),
            Error::Decode(e) => (AppErrorCode::DataCorruption, e.to_string()),
            Error::ColumnDecode { index, source } => (
                AppErrorCode::DataCorruption,
                source.to_string() + ", when decoding column at idx " + index.as_str(),
            ),
            Error::Tls(e) => (
                AppErrorCode::IOerror(ErrorKind::NotConnected),
                e.to_string(),
            ),
            Error::TypeNotFound { type_name } => {
                (AppErrorCode::InvalidInput, type_name + " wrong-col-typ")
            }
            Error::ColumnNotFound(col_name) => (
                AppErrorCode::IOerror(ErrorKind::NotFound),
                col_name + " no-col",
            ),
            Error::RowNotFound => (
                AppErrorCode::IOerror(ErrorKind::NotFound),
                "no-row".to_string(),
            ),
            Error::ColumnIndexOutOfBounds { index, len } => (
                AppErrorCode::InvalidInput,
                format!("req-idx:{}, limit:{}", index, len),
            ),
            Error::PoolTimedOut => (AppErrorCode::DatabaseServerBusy, "no-conn-avail".to_string()),
            Error::PoolClosed => (AppErrorCode::Unknown, "pool-closed".to_string()),
            Error::WorkerCrashed => (
                AppErrorCode::Unknown,
                "low-level-db-worker-crashed".to_string(),
            ),
            _others => (
                AppErrorCode::Unknown,
                "internal-implementation-issue".to_string(),
            ),
        };
        Self {
            code,
            detail: Some(detail),
        }
    } // end of fn from
} // end of impl AppError

pub(super) fn first_db(
    dbs: Vec<Arc<AppMariaDbStore>>,
    label: &str,
) -> DefaultResult<Arc<AppMariaDbStore>, AppError> {
    dbs.into_iter().next().ok_or_else(|| AppError {
        code: AppErrorCode::MissingDataStore,
        detail: Some(format!("mariadb, {label}")),
    })
}

// time columns are stored in UTC without zone info
pub(super) fn to_db_time(t: &DateTime<FixedOffset>) -> NaiveDateTime {
    t.naive_utc()
}

pub(super) fn from_db_time(t: NaiveDateTime) -> DateTime<FixedOffset> {
    t.and_utc().fixed_offset()
}

/// e.g. `(?,?,?),(?,?,?)` for 2 rows with 3 columns
pub(super) fn placeholder_rows(num_rows: usize, num_cols: usize) -> String {
    let row = format!("({})", vec!["?"; num_cols].join(","));
    vec![row; num_rows].join(",")
}

pub(super) fn placeholder_list(num: usize) -> String {
    vec!["?"; num].join(",")
}

pub(super) fn parse_col<T>(raw: &str, col: &str) -> DefaultResult<T, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    raw.parse::<T>().map_err(|e| AppError {
        code: AppErrorCode::DataCorruption,
        detail: Some(format!("col:{col}, {e}")),
    })
}

pub(super) async fn run_query_once(
    tx: &mut Transaction<'_, MySql>,
    query: MySqlQuery<'_>,
    maybe_num_batch: Option<usize>,
) -> DefaultResult<MySqlQueryResult, AppError> {
    let resultset = query.execute(tx.deref_mut()).await?;
    if let Some(num_batch) = maybe_num_batch {
        let num_affected = resultset.rows_affected() as usize;
        if num_affected == num_batch {
            Ok(resultset)
        } else {
            let detail = format!(
                "num_affected, actual:{}, expect:{}",
                num_affected, num_batch
            );
            Err(AppError {
                code: AppErrorCode::DataCorruption,
                detail: Some(detail),
            })
        }
    } else {
        Ok(resultset)
    }
}
