use std::ops::DerefMut;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySql, MySqlConnection, Row, Transaction};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;
use crate::model::{StockLedgerReq, StockLevelModel, StockLevelModelSet, StockTarget};
use crate::repository::{AbsStockRepo, AppStockRepoEditUserFunc};

use super::{first_db, placeholder_rows, run_query_once, MySqlQuery};

const KIND_SINGLE: &str = "single";
const KIND_SKU: &str = "sku";

fn target_columns(target: &StockTarget) -> (&'static str, u64) {
    match target {
        StockTarget::Single { product_id } => (KIND_SINGLE, *product_id),
        StockTarget::Sku { sku_id } => (KIND_SKU, *sku_id),
    }
}

struct FetchStockArg(Vec<StockTarget>);
struct UpsertStockArg<'a>(&'a [StockLevelModel]);

impl FetchStockArg {
    fn sql_pattern(&self, for_update: bool) -> String {
        let conds = vec!["(`target_kind`=? AND `target_id`=?)"; self.0.len()].join(" OR ");
        let lock = if for_update { " FOR UPDATE" } else { "" };
        format!(
            "SELECT `target_kind`,`target_id`,`total`,`reserved`,`active` FROM `stock_level` \
             WHERE {} ORDER BY `target_kind`,`target_id`{}",
            conds, lock
        )
    }
    fn bind_to<'q>(&self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        self.0.iter().fold(query, |q, t| {
            let (kind, id) = target_columns(t);
            q.bind(kind).bind(id)
        })
    }
}

impl<'a> UpsertStockArg<'a> {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "INSERT INTO `stock_level`(`target_kind`,`target_id`,`total`,`reserved`,`active`) \
             VALUES {} ON DUPLICATE KEY UPDATE `total`=VALUES(`total`), \
             `reserved`=VALUES(`reserved`), `active`=VALUES(`active`)",
            placeholder_rows(num_batch, 5)
        )
    }
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        self.0.iter().fold(query, |q, s| {
            let (kind, id) = target_columns(&s.target);
            q.bind(kind)
                .bind(id)
                .bind(s.total)
                .bind(s.reserved)
                .bind(s.active)
        })
    }
}

fn stock_from_row(row: MySqlRow) -> DefaultResult<StockLevelModel, AppError> {
    let kind = row.try_get::<String, usize>(0)?;
    let id = row.try_get::<u64, usize>(1)?;
    let target = match kind.as_str() {
        KIND_SINGLE => StockTarget::Single { product_id: id },
        KIND_SKU => StockTarget::Sku { sku_id: id },
        _others => {
            return Err(AppError {
                code: AppErrorCode::DataCorruption,
                detail: Some(format!("stock-target-kind:{kind}")),
            })
        }
    };
    Ok(StockLevelModel {
        target,
        total: row.try_get::<u32, usize>(2)?,
        reserved: row.try_get::<u32, usize>(3)?,
        active: row.try_get::<bool, usize>(4)?,
    })
}

/// Stock entries which don't exist are skipped. Rows are locked until
/// the enclosing transaction ends when `for_update` is set.
pub(super) async fn load_stock(
    conn: &mut MySqlConnection,
    targets: &[StockTarget],
    for_update: bool,
) -> DefaultResult<StockLevelModelSet, AppError> {
    let mut targets = targets.to_vec();
    targets.sort_by_key(target_columns);
    targets.dedup();
    if targets.is_empty() {
        return Ok(StockLevelModelSet::default());
    }
    let arg = FetchStockArg(targets);
    let sql_patt = arg.sql_pattern(for_update);
    let query = arg.bind_to(sqlx::query(sql_patt.as_str()));
    let rows = query.fetch_all(&mut *conn).await?;
    let items = rows
        .into_iter()
        .map(stock_from_row)
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    Ok(StockLevelModelSet { items })
}

pub(super) async fn save_stock(
    tx: &mut Transaction<'_, MySql>,
    slset: &StockLevelModelSet,
) -> DefaultResult<(), AppError> {
    if slset.items.is_empty() {
        return Ok(());
    }
    let sql_patt = UpsertStockArg::sql_pattern(slset.items.len());
    let query = UpsertStockArg(&slset.items).bind_to(sqlx::query(sql_patt.as_str()));
    let _rs = run_query_once(tx, query, None).await?;
    Ok(())
}

pub(crate) struct StockMariaDbRepo {
    _db: Arc<AppMariaDbStore>,
}

impl StockMariaDbRepo {
    pub fn new(dbs: Vec<Arc<AppMariaDbStore>>) -> DefaultResult<Self, AppError> {
        let _db = first_db(dbs, "stock")?;
        Ok(Self { _db })
    }
}

#[async_trait]
impl AbsStockRepo for StockMariaDbRepo {
    async fn save(&self, slset: StockLevelModelSet) -> DefaultResult<(), AppError> {
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        save_stock(&mut tx, &slset).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch(&self, targets: Vec<StockTarget>) -> DefaultResult<StockLevelModelSet, AppError> {
        let mut conn = self._db.acquire().await?;
        load_stock(conn.deref_mut(), &targets, false).await
    }

    async fn try_edit(
        &self,
        reqs: Vec<StockLedgerReq>,
        cb: AppStockRepoEditUserFunc,
    ) -> DefaultResult<StockLevelModelSet, AppError> {
        let targets = reqs.iter().map(|r| r.target).collect::<Vec<_>>();
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        let mut slset = load_stock(tx.deref_mut(), &targets, true).await?;
        // transaction rolled back on drop if the callback fails
        cb(&mut slset, &reqs)?;
        save_stock(&mut tx, &slset).await?;
        tx.commit().await?;
        Ok(slset)
    }
}
