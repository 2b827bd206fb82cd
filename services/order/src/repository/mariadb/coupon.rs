use std::ops::DerefMut;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySql, MySqlConnection, Row, Transaction};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;
use crate::model::{CouponModel, UserCouponModel};
use crate::repository::AbsCouponRepo;

use super::{
    first_db, from_db_time, parse_col, placeholder_rows, run_query_once, to_db_time, MySqlQuery,
};

const SQL_UPSERT_COUPON: &str = "INSERT INTO `coupon`(`id`,`name`,`mode`,`discount`,\
    `discount_max`,`min_order_amount`,`valid_from`,`valid_to`) VALUES (?,?,?,?,?,?,?,?) \
    ON DUPLICATE KEY UPDATE `name`=VALUES(`name`), `mode`=VALUES(`mode`), \
    `discount`=VALUES(`discount`), `discount_max`=VALUES(`discount_max`), \
    `min_order_amount`=VALUES(`min_order_amount`), `valid_from`=VALUES(`valid_from`), \
    `valid_to`=VALUES(`valid_to`)";

const SQL_FETCH_COUPON: &str = "SELECT `id`,`name`,`mode`,`discount`,`discount_max`,\
    `min_order_amount`,`valid_from`,`valid_to` FROM `coupon` WHERE `id`=?";

const GRANT_COLS: &str = "`id`,`usr_id`,`coupon_id`,`used`,`used_at`";

struct UpsertGrantArg<'a>(&'a [UserCouponModel]);

impl<'a> UpsertGrantArg<'a> {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "INSERT INTO `coupon_grant`({}) VALUES {} ON DUPLICATE KEY UPDATE \
             `used`=VALUES(`used`), `used_at`=VALUES(`used_at`)",
            GRANT_COLS,
            placeholder_rows(num_batch, 5)
        )
    }
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        self.0.iter().fold(query, |q, g| {
            q.bind(g.id)
                .bind(g.usr_id)
                .bind(g.coupon_id)
                .bind(g.used)
                .bind(g.used_at.as_ref().map(to_db_time))
        })
    }
}

fn coupon_from_row(row: MySqlRow) -> DefaultResult<CouponModel, AppError> {
    let mode = row.try_get::<String, usize>(2)?;
    Ok(CouponModel {
        id: row.try_get::<u64, usize>(0)?,
        name: row.try_get::<String, usize>(1)?,
        mode: parse_col(mode.as_str(), "coupon.mode")?,
        discount: row.try_get::<Decimal, usize>(3)?,
        discount_max: row.try_get::<Option<Decimal>, usize>(4)?,
        min_order_amount: row.try_get::<Decimal, usize>(5)?,
        valid_from: from_db_time(row.try_get::<NaiveDateTime, usize>(6)?),
        valid_to: from_db_time(row.try_get::<NaiveDateTime, usize>(7)?),
    })
}

fn grant_from_row(row: MySqlRow) -> DefaultResult<UserCouponModel, AppError> {
    let used_at = row.try_get::<Option<NaiveDateTime>, usize>(4)?;
    Ok(UserCouponModel {
        id: row.try_get::<u64, usize>(0)?,
        usr_id: row.try_get::<u64, usize>(1)?,
        coupon_id: row.try_get::<u64, usize>(2)?,
        used: row.try_get::<bool, usize>(3)?,
        used_at: used_at.map(from_db_time),
    })
}

pub(super) async fn load_coupon(
    conn: &mut MySqlConnection,
    id: u64,
) -> DefaultResult<Option<CouponModel>, AppError> {
    let query = sqlx::query(SQL_FETCH_COUPON).bind(id);
    let maybe_row = query.fetch_optional(&mut *conn).await?;
    maybe_row.map(coupon_from_row).transpose()
}

async fn load_grants(
    conn: &mut MySqlConnection,
    cond: &str,
    for_update: bool,
    query_binder: impl FnOnce(MySqlQuery<'_>) -> MySqlQuery<'_>,
) -> DefaultResult<Vec<UserCouponModel>, AppError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql_patt = format!(
        "SELECT {} FROM `coupon_grant` WHERE {} ORDER BY `id` ASC{}",
        GRANT_COLS, cond, lock
    );
    let query = query_binder(sqlx::query(sql_patt.as_str()));
    let rows = query.fetch_all(&mut *conn).await?;
    rows.into_iter()
        .map(grant_from_row)
        .collect::<DefaultResult<Vec<_>, AppError>>()
}

/// unused grants of a coupon owned by a user, locked within the
/// enclosing transaction
pub(super) async fn load_unused_grants(
    conn: &mut MySqlConnection,
    usr_id: u64,
    coupon_id: u64,
) -> DefaultResult<Vec<UserCouponModel>, AppError> {
    let cond = "`usr_id`=? AND `coupon_id`=? AND `used`=FALSE";
    load_grants(conn, cond, true, |q| q.bind(usr_id).bind(coupon_id)).await
}

pub(super) async fn load_grant(
    conn: &mut MySqlConnection,
    id: u64,
) -> DefaultResult<Option<UserCouponModel>, AppError> {
    let mut found = load_grants(conn, "`id`=?", true, |q| q.bind(id)).await?;
    Ok(found.pop())
}

pub(super) async fn save_grant_rows(
    tx: &mut Transaction<'_, MySql>,
    grants: &[UserCouponModel],
) -> DefaultResult<(), AppError> {
    if grants.is_empty() {
        return Ok(());
    }
    let sql_patt = UpsertGrantArg::sql_pattern(grants.len());
    let query = UpsertGrantArg(grants).bind_to(sqlx::query(sql_patt.as_str()));
    let _rs = run_query_once(tx, query, None).await?;
    Ok(())
}

pub(crate) struct CouponMariaDbRepo {
    _db: Arc<AppMariaDbStore>,
}

impl CouponMariaDbRepo {
    pub fn new(dbs: Vec<Arc<AppMariaDbStore>>) -> DefaultResult<Self, AppError> {
        let _db = first_db(dbs, "coupon")?;
        Ok(Self { _db })
    }
}

#[async_trait]
impl AbsCouponRepo for CouponMariaDbRepo {
    async fn save_coupon(&self, c: CouponModel) -> DefaultResult<(), AppError> {
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        let query = sqlx::query(SQL_UPSERT_COUPON)
            .bind(c.id)
            .bind(c.name)
            .bind(c.mode.as_str())
            .bind(c.discount)
            .bind(c.discount_max)
            .bind(c.min_order_amount)
            .bind(to_db_time(&c.valid_from))
            .bind(to_db_time(&c.valid_to));
        let _rs = run_query_once(&mut tx, query, None).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_coupon(&self, id: u64) -> DefaultResult<CouponModel, AppError> {
        let mut conn = self._db.acquire().await?;
        load_coupon(conn.deref_mut(), id).await?.ok_or(AppError {
            code: AppErrorCode::CouponNotFound,
            detail: Some(id.to_string()),
        })
    }

    async fn save_grants(&self, grants: Vec<UserCouponModel>) -> DefaultResult<(), AppError> {
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        save_grant_rows(&mut tx, &grants).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_grants(&self, usr_id: u64) -> DefaultResult<Vec<UserCouponModel>, AppError> {
        let mut conn = self._db.acquire().await?;
        load_grants(conn.deref_mut(), "`usr_id`=?", false, |q| q.bind(usr_id)).await
    }
}
