use std::collections::HashSet;
use std::ops::DerefMut;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySqlConnection, Row};

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;
use crate::model::{ProductModel, ProductModelSet, SkuModel};
use crate::repository::AbsProductRepo;

use super::{first_db, placeholder_list, placeholder_rows, run_query_once, MySqlQuery};

struct UpsertProductArg<'a>(&'a [ProductModel]);
struct InsertSkuArg(Vec<SkuModel>);
struct DiscardSkuArg<'a>(&'a [u64]);
struct FetchProductArg<'a>(&'a [u64]);

impl<'a> UpsertProductArg<'a> {
    fn sql_pattern(num_batch: usize) -> String {
        let col_seq = "`id`,`seller_id`,`name`,`single`,`original_price`,`sale_price`";
        format!(
            "INSERT INTO `product`({}) VALUES {} ON DUPLICATE KEY UPDATE `seller_id`=VALUES(`seller_id`), \
             `name`=VALUES(`name`), `single`=VALUES(`single`), `original_price`=VALUES(`original_price`), \
             `sale_price`=VALUES(`sale_price`)",
            col_seq,
            placeholder_rows(num_batch, 6)
        )
    }
    fn bind_to<'q>(self, mut query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        for p in self.0 {
            query = query
                .bind(p.id)
                .bind(p.seller_id)
                .bind(p.name.clone())
                .bind(p.single)
                .bind(p.original_price)
                .bind(p.sale_price);
        }
        query
    }
}

impl InsertSkuArg {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "INSERT INTO `product_sku`(`id`,`product_id`,`label`,`sale_price`) VALUES {}",
            placeholder_rows(num_batch, 4)
        )
    }
    fn bind_to(self, mut query: MySqlQuery<'_>) -> MySqlQuery<'_> {
        for s in self.0 {
            query = query
                .bind(s.id)
                .bind(s.product_id)
                .bind(s.label)
                .bind(s.sale_price);
        }
        query
    }
}

impl<'a> DiscardSkuArg<'a> {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "DELETE FROM `product_sku` WHERE `product_id` IN ({})",
            placeholder_list(num_batch)
        )
    }
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        self.0.iter().fold(query, |q, id| q.bind(*id))
    }
}

impl<'a> FetchProductArg<'a> {
    fn sql_pattern_toplvl(num_batch: usize) -> String {
        format!(
            "SELECT `id`,`seller_id`,`name`,`single`,`original_price`,`sale_price` \
             FROM `product` WHERE `id` IN ({})",
            placeholder_list(num_batch)
        )
    }
    fn sql_pattern_sku(num_batch: usize) -> String {
        format!(
            "SELECT `id`,`product_id`,`label`,`sale_price` FROM `product_sku` \
             WHERE `product_id` IN ({}) ORDER BY `id` ASC",
            placeholder_list(num_batch)
        )
    }
    fn bind_to<'q>(&self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        self.0.iter().fold(query, |q, id| q.bind(*id))
    }
}

fn product_from_row(row: MySqlRow) -> DefaultResult<ProductModel, AppError> {
    Ok(ProductModel {
        id: row.try_get::<u64, usize>(0)?,
        seller_id: row.try_get::<u64, usize>(1)?,
        name: row.try_get::<String, usize>(2)?,
        single: row.try_get::<bool, usize>(3)?,
        original_price: row.try_get::<Decimal, usize>(4)?,
        sale_price: row.try_get::<Decimal, usize>(5)?,
        skus: Vec::new(),
    })
}

fn sku_from_row(row: MySqlRow) -> DefaultResult<SkuModel, AppError> {
    Ok(SkuModel {
        id: row.try_get::<u64, usize>(0)?,
        product_id: row.try_get::<u64, usize>(1)?,
        label: row.try_get::<String, usize>(2)?,
        sale_price: row.try_get::<Decimal, usize>(3)?,
    })
}

/// Load products with their SKUs through a connection, or a transaction
/// already started by caller.
pub(super) async fn load_products(
    conn: &mut MySqlConnection,
    ids: &[u64],
) -> DefaultResult<ProductModelSet, AppError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(ProductModelSet::default());
    }
    let arg = FetchProductArg(&ids);
    let sql_patt = FetchProductArg::sql_pattern_toplvl(ids.len());
    let query = arg.bind_to(sqlx::query(sql_patt.as_str()));
    let rows = query.fetch_all(&mut *conn).await?;
    let mut items = rows
        .into_iter()
        .map(product_from_row)
        .collect::<DefaultResult<Vec<_>, AppError>>()?;

    let sql_patt = FetchProductArg::sql_pattern_sku(ids.len());
    let query = arg.bind_to(sqlx::query(sql_patt.as_str()));
    let rows = query.fetch_all(&mut *conn).await?;
    let skus = rows
        .into_iter()
        .map(sku_from_row)
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    for product in items.iter_mut() {
        product.skus = skus
            .iter()
            .filter(|s| s.product_id == product.id)
            .cloned()
            .collect();
    }
    Ok(ProductModelSet { items })
}

pub(crate) struct ProductMariaDbRepo {
    _db: Arc<AppMariaDbStore>,
}

impl ProductMariaDbRepo {
    pub fn new(dbs: Vec<Arc<AppMariaDbStore>>) -> DefaultResult<Self, AppError> {
        let _db = first_db(dbs, "product")?;
        Ok(Self { _db })
    }
}

#[async_trait]
impl AbsProductRepo for ProductMariaDbRepo {
    async fn save(&self, ms: ProductModelSet) -> DefaultResult<(), AppError> {
        if ms.items.is_empty() {
            return Ok(());
        }
        let pids = ms.items.iter().map(|p| p.id).collect::<HashSet<_>>();
        let pids = pids.into_iter().collect::<Vec<_>>();
        let skus = ms
            .items
            .iter()
            .flat_map(|p| p.skus.iter().cloned())
            .collect::<Vec<_>>();
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        // `INSERT ON DUPLICATE KEY UPDATE` reports 1 affected row on insert
        // and 2 on update, the number is not checked
        let sql_patt = UpsertProductArg::sql_pattern(ms.items.len());
        let query = UpsertProductArg(&ms.items).bind_to(sqlx::query(sql_patt.as_str()));
        let _rs = run_query_once(&mut tx, query, None).await?;
        // SKUs dropped from a product are removed
        let sql_patt = DiscardSkuArg::sql_pattern(pids.len());
        let query = DiscardSkuArg(&pids).bind_to(sqlx::query(sql_patt.as_str()));
        let _rs = run_query_once(&mut tx, query, None).await?;
        if !skus.is_empty() {
            let num_skus = skus.len();
            let sql_patt = InsertSkuArg::sql_pattern(num_skus);
            let query = InsertSkuArg(skus).bind_to(sqlx::query(sql_patt.as_str()));
            let _rs = run_query_once(&mut tx, query, Some(num_skus)).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch(&self, ids: Vec<u64>) -> DefaultResult<ProductModelSet, AppError> {
        let mut conn = self._db.acquire().await?;
        load_products(conn.deref_mut(), &ids).await
    }
}
