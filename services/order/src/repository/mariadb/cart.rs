use std::collections::HashSet;
use std::ops::DerefMut;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySql, MySqlConnection, Row, Transaction};

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;
use crate::model::{CartLineModel, CartModel, StockTarget};
use crate::repository::{AbsCartRepo, AppCartRepoEditUserFunc, CartEditReq};

use super::stock::{load_stock, save_stock};
use super::{
    first_db, from_db_time, placeholder_list, placeholder_rows, run_query_once, to_db_time,
    MySqlQuery,
};

struct FetchLinesArg(u64);
struct UpsertLineArg<'a>(&'a CartModel);
struct DiscardLineArg(u64, Vec<u64>);

impl FetchLinesArg {
    fn sql_pattern(for_update: bool) -> String {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        format!(
            "SELECT `line_id`,`product_id`,`sku_id`,`qty`,`price`,`created_at` FROM `cart_line` \
             WHERE `owner`=? ORDER BY `created_at` ASC, `line_id` ASC{}",
            lock
        )
    }
    fn bind_to<'q>(&self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        query.bind(self.0)
    }
}

impl<'a> UpsertLineArg<'a> {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "INSERT INTO `cart_line`(`owner`,`line_id`,`product_id`,`sku_id`,`qty`,`price`,`created_at`) \
             VALUES {} ON DUPLICATE KEY UPDATE `qty`=VALUES(`qty`)",
            placeholder_rows(num_batch, 7)
        )
    }
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        let owner = self.0.owner;
        self.0.lines.iter().fold(query, |q, l| {
            q.bind(owner)
                .bind(l.id)
                .bind(l.product_id)
                .bind(l.sku_id)
                .bind(l.qty)
                .bind(l.price)
                .bind(to_db_time(&l.created_at))
        })
    }
}

impl DiscardLineArg {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "DELETE FROM `cart_line` WHERE `owner`=? AND `line_id` IN ({})",
            placeholder_list(num_batch)
        )
    }
    fn bind_to(self, query: MySqlQuery<'_>) -> MySqlQuery<'_> {
        let query = query.bind(self.0);
        self.1.into_iter().fold(query, |q, id| q.bind(id))
    }
}

fn line_from_row(row: MySqlRow) -> DefaultResult<CartLineModel, AppError> {
    Ok(CartLineModel {
        id: row.try_get::<u64, usize>(0)?,
        product_id: row.try_get::<u64, usize>(1)?,
        sku_id: row.try_get::<Option<u64>, usize>(2)?,
        qty: row.try_get::<u32, usize>(3)?,
        price: row.try_get::<Decimal, usize>(4)?,
        created_at: from_db_time(row.try_get::<NaiveDateTime, usize>(5)?),
    })
}

pub(super) async fn load_cart(
    conn: &mut MySqlConnection,
    owner: u64,
    for_update: bool,
) -> DefaultResult<CartModel, AppError> {
    let sql_patt = FetchLinesArg::sql_pattern(for_update);
    let query = FetchLinesArg(owner).bind_to(sqlx::query(sql_patt.as_str()));
    let rows = query.fetch_all(&mut *conn).await?;
    let lines = rows
        .into_iter()
        .map(line_from_row)
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    Ok(CartModel { owner, lines })
}

/// Delete lines no longer present in the edited cart, then save the rest.
pub(super) async fn save_cart(
    tx: &mut Transaction<'_, MySql>,
    before: &[CartLineModel],
    after: &CartModel,
) -> DefaultResult<(), AppError> {
    let remain = after.lines.iter().map(|l| l.id).collect::<HashSet<_>>();
    let discarding = before
        .iter()
        .filter(|l| !remain.contains(&l.id))
        .map(|l| l.id)
        .collect::<Vec<_>>();
    if !discarding.is_empty() {
        let num_batch = discarding.len();
        let sql_patt = DiscardLineArg::sql_pattern(num_batch);
        let query = DiscardLineArg(after.owner, discarding).bind_to(sqlx::query(sql_patt.as_str()));
        let _rs = run_query_once(tx, query, Some(num_batch)).await?;
    }
    if !after.lines.is_empty() {
        let sql_patt = UpsertLineArg::sql_pattern(after.lines.len());
        let query = UpsertLineArg(after).bind_to(sqlx::query(sql_patt.as_str()));
        let _rs = run_query_once(tx, query, None).await?;
    }
    Ok(())
}

pub(crate) struct CartMariaDbRepo {
    _db: Arc<AppMariaDbStore>,
}

impl CartMariaDbRepo {
    pub fn new(dbs: Vec<Arc<AppMariaDbStore>>) -> DefaultResult<Self, AppError> {
        let _db = first_db(dbs, "cart")?;
        Ok(Self { _db })
    }
}

#[async_trait]
impl AbsCartRepo for CartMariaDbRepo {
    async fn fetch_cart(&self, owner: u64) -> DefaultResult<CartModel, AppError> {
        let mut conn = self._db.acquire().await?;
        load_cart(conn.deref_mut(), owner, false).await
    }

    async fn try_edit(
        &self,
        owner: u64,
        req: CartEditReq,
        cb: AppCartRepoEditUserFunc,
    ) -> DefaultResult<Vec<u64>, AppError> {
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        let mut cart = load_cart(tx.deref_mut(), owner, true).await?;
        let saved_lines = cart.lines.clone();
        let mut targets = cart.stock_targets();
        if let CartEditReq::Add(r) = &req {
            targets.push(StockTarget::resolve(r.product_id, r.sku_id));
        }
        let mut stock = load_stock(tx.deref_mut(), &targets, true).await?;
        let affected = cb(&mut cart, &mut stock, req)?;
        save_cart(&mut tx, &saved_lines, &cart).await?;
        save_stock(&mut tx, &stock).await?;
        tx.commit().await?;
        Ok(affected)
    }
}
