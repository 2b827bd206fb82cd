use std::boxed::Box;
use std::collections::{HashMap, HashSet};
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;

use crate::datastore::{AbstInMemoryDStore, AppInMemDstoreLock};
use crate::error::AppError;
use crate::model::{CartLineModel, CartModel, StockTarget};
use crate::repository::{AbsCartRepo, AppCartRepoEditUserFunc, CartEditReq};

use super::stock_level::{_stockm, load_stock, to_rows as stock_to_rows};
use super::KeyPrefixFilter;

#[allow(non_snake_case)]
pub(super) mod CartLineTable {
    use super::super::{
        col_from_opt, col_from_time, col_parse, col_parse_opt, col_time, key_suffix,
    };
    use super::{AppError, CartLineModel, CartModel, DefaultResult};
    use crate::datastore::AppInMemFetchedSingleTable;

    pub(in super::super) const LABEL: &str = "cart_line";
    enum InMemColIdx {
        ProductId,
        SkuId,
        Qty,
        Price,
        CreatedAt,
    }
    impl From<InMemColIdx> for usize {
        fn from(value: InMemColIdx) -> usize {
            match value {
                InMemColIdx::ProductId => 0,
                InMemColIdx::SkuId => 1,
                InMemColIdx::Qty => 2,
                InMemColIdx::Price => 3,
                InMemColIdx::CreatedAt => 4,
            }
        }
    }

    pub(in super::super) fn pkey(owner: u64, line_id: u64) -> String {
        format!("{owner}-{line_id}")
    }

    pub(in super::super) fn to_rows(cart: &CartModel) -> AppInMemFetchedSingleTable {
        cart.lines
            .iter()
            .map(|l| {
                let row = vec![
                    l.product_id.to_string(),
                    col_from_opt(l.sku_id),
                    l.qty.to_string(),
                    l.price.to_string(),
                    col_from_time(&l.created_at),
                ];
                (pkey(cart.owner, l.id), row)
            })
            .collect()
    }

    pub(super) fn from_row(key: &str, row: &[String]) -> DefaultResult<CartLineModel, AppError> {
        Ok(CartLineModel {
            id: key_suffix(key, LABEL)?,
            product_id: col_parse(row, InMemColIdx::ProductId.into(), LABEL)?,
            sku_id: col_parse_opt(row, InMemColIdx::SkuId.into(), LABEL)?,
            qty: col_parse(row, InMemColIdx::Qty.into(), LABEL)?,
            price: col_parse(row, InMemColIdx::Price.into(), LABEL)?,
            created_at: col_time(row, InMemColIdx::CreatedAt.into(), LABEL)?,
        })
    }
} // end of inner-mod CartLineTable

pub(super) fn load_cart(lock: &AppInMemDstoreLock, owner: u64) -> DefaultResult<CartModel, AppError> {
    let op = KeyPrefixFilter(HashSet::from([owner.to_string()]));
    let keys = lock.filter_keys(CartLineTable::LABEL, &op)?;
    let info = HashMap::from([(CartLineTable::LABEL.to_string(), keys)]);
    let rows = lock
        .fetch(info)?
        .remove(CartLineTable::LABEL)
        .unwrap_or_default();
    let mut lines = rows
        .iter()
        .map(|(k, row)| CartLineTable::from_row(k, row))
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    lines.sort_by_key(|l| (l.created_at, l.id));
    Ok(CartModel { owner, lines })
}

/// keys of cart lines which no longer exist in the edited cart
pub(super) fn removed_line_keys(owner: u64, before: &[CartLineModel], after: &CartModel) -> Vec<String> {
    let remain = after.lines.iter().map(|l| l.id).collect::<HashSet<_>>();
    before
        .iter()
        .filter(|l| !remain.contains(&l.id))
        .map(|l| CartLineTable::pkey(owner, l.id))
        .collect()
}

pub struct CartInMemRepo {
    datastore: Arc<Box<dyn AbstInMemoryDStore>>,
}

impl CartInMemRepo {
    pub async fn new(m: Arc<Box<dyn AbstInMemoryDStore>>) -> DefaultResult<Self, AppError> {
        m.create_table(CartLineTable::LABEL).await?;
        m.create_table(_stockm::TABLE_LABEL).await?;
        Ok(Self { datastore: m })
    }
}

#[async_trait]
impl AbsCartRepo for CartInMemRepo {
    async fn fetch_cart(&self, owner: u64) -> DefaultResult<CartModel, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        load_cart(&lock, owner)
    }

    async fn try_edit(
        &self,
        owner: u64,
        req: CartEditReq,
        cb: AppCartRepoEditUserFunc,
    ) -> DefaultResult<Vec<u64>, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        let mut cart = load_cart(&lock, owner)?;
        let saved_lines = cart.lines.clone();
        let mut targets = cart.stock_targets();
        if let CartEditReq::Add(r) = &req {
            targets.push(StockTarget::resolve(r.product_id, r.sku_id));
        }
        let mut stock = load_stock(&lock, &targets)?;
        let affected = cb(&mut cart, &mut stock, req)?;
        let deleting = HashMap::from([(
            CartLineTable::LABEL.to_string(),
            removed_line_keys(owner, &saved_lines, &cart),
        )]);
        let data = HashMap::from([
            (CartLineTable::LABEL.to_string(), CartLineTable::to_rows(&cart)),
            (_stockm::TABLE_LABEL.to_string(), stock_to_rows(&stock)),
        ]);
        let _num = self.datastore.commit_release(data, deleting, lock)?;
        Ok(affected)
    }
}
