use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, Row};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;
use crate::model::AddressModel;
use crate::repository::AbsAddressRepo;

use super::{first_db, run_query_once};

const SQL_UPSERT: &str = "INSERT INTO `address`(`id`,`usr_id`,`recipient`,`phone`,`postcode`,\
    `address1`,`address2`) VALUES (?,?,?,?,?,?,?) ON DUPLICATE KEY UPDATE \
    `recipient`=VALUES(`recipient`), `phone`=VALUES(`phone`), `postcode`=VALUES(`postcode`), \
    `address1`=VALUES(`address1`), `address2`=VALUES(`address2`)";

const SQL_FETCH: &str = "SELECT `id`,`usr_id`,`recipient`,`phone`,`postcode`,`address1`,\
    `address2` FROM `address` WHERE `id`=?";

impl TryFrom<MySqlRow> for AddressModel {
    type Error = AppError;
    fn try_from(row: MySqlRow) -> DefaultResult<Self, Self::Error> {
        Ok(Self {
            id: row.try_get::<u64, usize>(0)?,
            usr_id: row.try_get::<u64, usize>(1)?,
            recipient: row.try_get::<String, usize>(2)?,
            phone: row.try_get::<String, usize>(3)?,
            postcode: row.try_get::<String, usize>(4)?,
            address1: row.try_get::<String, usize>(5)?,
            address2: row.try_get::<Option<String>, usize>(6)?,
        })
    }
}

pub(crate) struct AddressMariaDbRepo {
    _db: Arc<AppMariaDbStore>,
}

impl AddressMariaDbRepo {
    pub fn new(dbs: Vec<Arc<AppMariaDbStore>>) -> DefaultResult<Self, AppError> {
        let _db = first_db(dbs, "address")?;
        Ok(Self { _db })
    }
}

#[async_trait]
impl AbsAddressRepo for AddressMariaDbRepo {
    async fn save(&self, addr: AddressModel) -> DefaultResult<(), AppError> {
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        let query = sqlx::query(SQL_UPSERT)
            .bind(addr.id)
            .bind(addr.usr_id)
            .bind(addr.recipient)
            .bind(addr.phone)
            .bind(addr.postcode)
            .bind(addr.address1)
            .bind(addr.address2);
        let _rs = run_query_once(&mut tx, query, None).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch(&self, id: u64) -> DefaultResult<AddressModel, AppError> {
        let mut conn = self._db.acquire().await?;
        let query = sqlx::query(SQL_FETCH).bind(id);
        let exec = &mut *conn;
        let maybe_row = query.fetch_optional(exec).await?;
        let row = maybe_row.ok_or(AppError {
            code: AppErrorCode::AddressNotFound,
            detail: Some(id.to_string()),
        })?;
        AddressModel::try_from(row)
    }
}
