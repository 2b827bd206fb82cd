use std::boxed::Box;
use std::collections::HashMap;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;

use ecommerce_common::error::AppErrorCode;

use crate::datastore::{AbstInMemoryDStore, AppInMemDstoreLock, AppInMemFetchedSingleTable};
use crate::error::AppError;
use crate::model::{CouponModel, UserCouponModel};
use crate::repository::AbsCouponRepo;

use super::{
    col_bool, col_from_bool, col_from_opt, col_from_time, col_parse, col_parse_opt, col_string,
    col_time, col_time_opt, malformed_key, ColumnEqFilter,
};

pub(super) mod _coupon {
    pub(in super::super) const TABLE_LABEL: &str = "coupon";
    pub(super) const COL_NAME: usize = 0;
    pub(super) const COL_MODE: usize = 1;
    pub(super) const COL_DISCOUNT: usize = 2;
    pub(super) const COL_DISCOUNT_MAX: usize = 3;
    pub(super) const COL_MIN_ORDER: usize = 4;
    pub(super) const COL_VALID_FROM: usize = 5;
    pub(super) const COL_VALID_TO: usize = 6;
}

pub(super) mod _grant {
    pub(in super::super) const TABLE_LABEL: &str = "coupon_grant";
    pub(super) const COL_USR_ID: usize = 0;
    pub(super) const COL_COUPON_ID: usize = 1;
    pub(super) const COL_USED: usize = 2;
    pub(super) const COL_USED_AT: usize = 3;
}

fn coupon_from_row(key: &str, row: &[String]) -> DefaultResult<CouponModel, AppError> {
    let label = _coupon::TABLE_LABEL;
    let mode = col_string(row, _coupon::COL_MODE, label)?;
    Ok(CouponModel {
        id: key.parse().map_err(|_e| malformed_key(label, key))?,
        name: col_string(row, _coupon::COL_NAME, label)?,
        mode: mode.parse()?,
        discount: col_parse(row, _coupon::COL_DISCOUNT, label)?,
        discount_max: col_parse_opt(row, _coupon::COL_DISCOUNT_MAX, label)?,
        min_order_amount: col_parse(row, _coupon::COL_MIN_ORDER, label)?,
        valid_from: col_time(row, _coupon::COL_VALID_FROM, label)?,
        valid_to: col_time(row, _coupon::COL_VALID_TO, label)?,
    })
}

fn grant_from_row(key: &str, row: &[String]) -> DefaultResult<UserCouponModel, AppError> {
    let label = _grant::TABLE_LABEL;
    Ok(UserCouponModel {
        id: key.parse().map_err(|_e| malformed_key(label, key))?,
        usr_id: col_parse(row, _grant::COL_USR_ID, label)?,
        coupon_id: col_parse(row, _grant::COL_COUPON_ID, label)?,
        used: col_bool(row, _grant::COL_USED, label)?,
        used_at: col_time_opt(row, _grant::COL_USED_AT, label)?,
    })
}

pub(super) fn grant_rows(grants: &[UserCouponModel]) -> AppInMemFetchedSingleTable {
    grants
        .iter()
        .map(|g| {
            let row = vec![
                g.usr_id.to_string(),
                g.coupon_id.to_string(),
                col_from_bool(g.used),
                col_from_opt(g.used_at.as_ref().map(col_from_time)),
            ];
            (g.id.to_string(), row)
        })
        .collect()
}

pub(super) fn load_coupon(
    lock: &AppInMemDstoreLock,
    id: u64,
) -> DefaultResult<Option<CouponModel>, AppError> {
    let info = HashMap::from([(_coupon::TABLE_LABEL.to_string(), vec![id.to_string()])]);
    let rows = lock.fetch(info)?.remove(_coupon::TABLE_LABEL).unwrap_or_default();
    rows.into_iter()
        .next()
        .map(|(k, row)| coupon_from_row(k.as_str(), &row))
        .transpose()
}

fn load_grants_by_keys(
    lock: &AppInMemDstoreLock,
    keys: Vec<String>,
) -> DefaultResult<Vec<UserCouponModel>, AppError> {
    let info = HashMap::from([(_grant::TABLE_LABEL.to_string(), keys)]);
    let rows = lock.fetch(info)?.remove(_grant::TABLE_LABEL).unwrap_or_default();
    let mut out = rows
        .iter()
        .map(|(k, row)| grant_from_row(k, row))
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    out.sort_by_key(|g| g.id);
    Ok(out)
}

pub(super) fn load_user_grants(
    lock: &AppInMemDstoreLock,
    usr_id: u64,
) -> DefaultResult<Vec<UserCouponModel>, AppError> {
    let op = ColumnEqFilter {
        idx: _grant::COL_USR_ID,
        value: usr_id.to_string(),
    };
    let keys = lock.filter_keys(_grant::TABLE_LABEL, &op)?;
    load_grants_by_keys(lock, keys)
}

pub(super) fn load_grant(
    lock: &AppInMemDstoreLock,
    id: u64,
) -> DefaultResult<Option<UserCouponModel>, AppError> {
    let mut found = load_grants_by_keys(lock, vec![id.to_string()])?;
    Ok(found.pop())
}

pub struct CouponInMemRepo {
    datastore: Arc<Box<dyn AbstInMemoryDStore>>,
}

impl CouponInMemRepo {
    pub async fn new(m: Arc<Box<dyn AbstInMemoryDStore>>) -> DefaultResult<Self, AppError> {
        m.create_table(_coupon::TABLE_LABEL).await?;
        m.create_table(_grant::TABLE_LABEL).await?;
        Ok(Self { datastore: m })
    }
}

#[async_trait]
impl AbsCouponRepo for CouponInMemRepo {
    async fn save_coupon(&self, c: CouponModel) -> DefaultResult<(), AppError> {
        let row = vec![
            c.name.clone(),
            c.mode.as_str().to_string(),
            c.discount.to_string(),
            col_from_opt(c.discount_max),
            c.min_order_amount.to_string(),
            col_from_time(&c.valid_from),
            col_from_time(&c.valid_to),
        ];
        let table = HashMap::from([(c.id.to_string(), row)]);
        let data = HashMap::from([(_coupon::TABLE_LABEL.to_string(), table)]);
        let _num = self.datastore.save(data).await?;
        Ok(())
    }

    async fn fetch_coupon(&self, id: u64) -> DefaultResult<CouponModel, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        load_coupon(&lock, id)?.ok_or(AppError {
            code: AppErrorCode::CouponNotFound,
            detail: Some(id.to_string()),
        })
    }

    async fn save_grants(&self, grants: Vec<UserCouponModel>) -> DefaultResult<(), AppError> {
        let data = HashMap::from([(_grant::TABLE_LABEL.to_string(), grant_rows(&grants))]);
        let _num = self.datastore.save(data).await?;
        Ok(())
    }

    async fn fetch_grants(&self, usr_id: u64) -> DefaultResult<Vec<UserCouponModel>, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        load_user_grants(&lock, usr_id)
    }
}
