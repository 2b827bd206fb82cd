use std::boxed::Box;
use std::collections::HashMap;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;

use crate::datastore::{AbstInMemoryDStore, AppInMemDstoreLock, AppInMemFetchedSingleTable};
use crate::error::AppError;
use crate::model::{StockLedgerReq, StockLevelModel, StockLevelModelSet, StockTarget};
use crate::repository::{AbsStockRepo, AppStockRepoEditUserFunc};

use super::{col_bool, col_from_bool, col_parse, malformed_key};

pub(super) mod _stockm {
    pub(in super::super) const TABLE_LABEL: &str = "stock_level";
    pub(super) enum InMemColIdx {
        Total,
        Reserved,
        Active,
    }
    impl From<InMemColIdx> for usize {
        fn from(value: InMemColIdx) -> usize {
            match value {
                InMemColIdx::Total => 0,
                InMemColIdx::Reserved => 1,
                InMemColIdx::Active => 2,
            }
        }
    }
}

fn parse_key(key: &str) -> DefaultResult<StockTarget, AppError> {
    let label = _stockm::TABLE_LABEL;
    let (kind, id_) = key.split_once('-').ok_or_else(|| malformed_key(label, key))?;
    let id_ = id_.parse::<u64>().map_err(|_e| malformed_key(label, key))?;
    match kind {
        "single" => Ok(StockTarget::Single { product_id: id_ }),
        "sku" => Ok(StockTarget::Sku { sku_id: id_ }),
        _others => Err(malformed_key(label, key)),
    }
}

fn from_row(key: &str, row: &[String]) -> DefaultResult<StockLevelModel, AppError> {
    let label = _stockm::TABLE_LABEL;
    Ok(StockLevelModel {
        target: parse_key(key)?,
        total: col_parse(row, _stockm::InMemColIdx::Total.into(), label)?,
        reserved: col_parse(row, _stockm::InMemColIdx::Reserved.into(), label)?,
        active: col_bool(row, _stockm::InMemColIdx::Active.into(), label)?,
    })
}

pub(super) fn to_rows(slset: &StockLevelModelSet) -> AppInMemFetchedSingleTable {
    slset
        .items
        .iter()
        .map(|s| {
            let row = vec![
                s.total.to_string(),
                s.reserved.to_string(),
                col_from_bool(s.active),
            ];
            (s.target.to_string(), row)
        })
        .collect()
}

/// stock entries which don't exist are skipped
pub(super) fn load_stock(
    lock: &AppInMemDstoreLock,
    targets: &[StockTarget],
) -> DefaultResult<StockLevelModelSet, AppError> {
    let mut keys = targets.iter().map(ToString::to_string).collect::<Vec<_>>();
    keys.sort();
    keys.dedup();
    let info = HashMap::from([(_stockm::TABLE_LABEL.to_string(), keys)]);
    let rows = lock
        .fetch(info)?
        .remove(_stockm::TABLE_LABEL)
        .unwrap_or_default();
    let items = rows
        .iter()
        .map(|(k, row)| from_row(k, row))
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    Ok(StockLevelModelSet { items })
}

pub struct StockLvlInMemRepo {
    datastore: Arc<Box<dyn AbstInMemoryDStore>>,
}

impl StockLvlInMemRepo {
    pub async fn new(m: Arc<Box<dyn AbstInMemoryDStore>>) -> DefaultResult<Self, AppError> {
        m.create_table(_stockm::TABLE_LABEL).await?;
        Ok(Self { datastore: m })
    }
}

#[async_trait]
impl AbsStockRepo for StockLvlInMemRepo {
    async fn save(&self, slset: StockLevelModelSet) -> DefaultResult<(), AppError> {
        let data = HashMap::from([(_stockm::TABLE_LABEL.to_string(), to_rows(&slset))]);
        let _num = self.datastore.save(data).await?;
        Ok(())
    }

    async fn fetch(&self, targets: Vec<StockTarget>) -> DefaultResult<StockLevelModelSet, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        load_stock(&lock, &targets)
    }

    async fn try_edit(
        &self,
        reqs: Vec<StockLedgerReq>,
        cb: AppStockRepoEditUserFunc,
    ) -> DefaultResult<StockLevelModelSet, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        let targets = reqs.iter().map(|r| r.target).collect::<Vec<_>>();
        let mut slset = load_stock(&lock, &targets)?;
        // lock dropped without commit on error, nothing is saved
        cb(&mut slset, &reqs)?;
        let data = HashMap::from([(_stockm::TABLE_LABEL.to_string(), to_rows(&slset))]);
        let _num = self.datastore.save_release(data, lock)?;
        Ok(slset)
    }
}
