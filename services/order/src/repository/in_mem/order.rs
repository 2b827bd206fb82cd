use std::boxed::Box;
use std::collections::{HashMap, HashSet};
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::{
    AbstInMemoryDStore, AppInMemDstoreLock, AppInMemFetchedSingleTable, AppInMemUpdateData,
};
use crate::error::AppError;
use crate::model::{
    CartModel, OrderCouponModel, OrderLineModel, OrderModel, PaymentStatus, ShippingSnapshotModel,
    StockTarget,
};
use crate::repository::{
    AbsOrderRepo, AppOrderRepoCreateUserFunc, AppOrderRepoUpdateUserFunc, OrderCreateReqModel,
    OrderCreateTxModel, OrderPayEventModel, OrderPayTxModel, OrderSourceModel,
};

use super::cart::{load_cart, removed_line_keys, CartLineTable};
use super::coupon::{_coupon, _grant, grant_rows, load_coupon, load_grant, load_user_grants};
use super::product::{load_products, ProductTable, SkuTable};
use super::stock_level::{_stockm, load_stock, to_rows as stock_to_rows};
use super::{
    col_from_opt, col_from_time, col_parse, col_parse_opt, col_string, col_string_opt, col_time,
    col_time_opt, key_suffix, malformed_key, ColumnEqFilter, KeyPrefixFilter,
};

mod _order {
    pub(super) const TOPLVL_LABEL: &str = "order_toplvl";
    pub(super) const LINE_LABEL: &str = "order_line";

    #[derive(Clone, Copy)]
    pub(super) enum TopLvlColIdx {
        Number,
        Owner,
        Recipient,
        Phone,
        Postcode,
        Address1,
        Address2,
        TotalAmount,
        DiscountAmount,
        DeliveryFee,
        FinalAmount,
        Status,
        PayStatus,
        PayMethod,
        PaymentId,
        CouponId,
        GrantId,
        PaidAt,
        RefundedAmount,
        Memo,
        Reason,
        CreatedAt,
        UpdatedAt,
    }
    impl From<TopLvlColIdx> for usize {
        fn from(value: TopLvlColIdx) -> usize {
            value as usize
        }
    }

    #[derive(Clone, Copy)]
    pub(super) enum LineColIdx {
        ProductId,
        SkuId,
        ProductName,
        Qty,
        UnitPrice,
        TotalPrice,
    }
    impl From<LineColIdx> for usize {
        fn from(value: LineColIdx) -> usize {
            value as usize
        }
    }
} // end of inner-mod _order

use _order::{LineColIdx, TopLvlColIdx};

fn toplvl_row(o: &OrderModel) -> Vec<String> {
    let sh = &o.shipping;
    vec![
        o.number.clone(),
        o.owner.to_string(),
        sh.recipient.clone(),
        sh.phone.clone(),
        sh.postcode.clone(),
        sh.address1.clone(),
        col_from_opt(sh.address2.as_ref()),
        o.total_amount.to_string(),
        o.discount_amount.to_string(),
        o.delivery_fee.to_string(),
        o.final_amount.to_string(),
        o.status.as_str().to_string(),
        o.pay_status.as_str().to_string(),
        o.pay_method.as_str().to_string(),
        col_from_opt(o.payment_id.as_ref()),
        col_from_opt(o.coupon.map(|c| c.coupon_id)),
        col_from_opt(o.coupon.map(|c| c.grant_id)),
        col_from_opt(o.paid_at.as_ref().map(col_from_time)),
        col_from_opt(o.refunded_amount),
        col_from_opt(o.memo.as_ref()),
        col_from_opt(o.reason.as_ref()),
        col_from_time(&o.created_at),
        col_from_time(&o.updated_at),
    ]
}

fn line_rows(o: &OrderModel) -> AppInMemFetchedSingleTable {
    o.lines
        .iter()
        .map(|l| {
            let row = vec![
                l.product_id.to_string(),
                col_from_opt(l.sku_id),
                l.product_name.clone(),
                l.qty.to_string(),
                l.unit_price.to_string(),
                l.total_price.to_string(),
            ];
            (format!("{}-{}", o.id, l.id), row)
        })
        .collect()
}

fn order_update_data(o: &OrderModel, with_lines: bool) -> AppInMemUpdateData {
    let toplvl = HashMap::from([(o.id.to_string(), toplvl_row(o))]);
    let mut out = HashMap::from([(_order::TOPLVL_LABEL.to_string(), toplvl)]);
    if with_lines {
        out.insert(_order::LINE_LABEL.to_string(), line_rows(o));
    }
    out
}

fn line_from_row(key: &str, row: &[String]) -> DefaultResult<OrderLineModel, AppError> {
    let label = _order::LINE_LABEL;
    let c = |i: LineColIdx| -> usize { i.into() };
    Ok(OrderLineModel {
        id: key_suffix(key, label)?,
        product_id: col_parse(row, c(LineColIdx::ProductId), label)?,
        sku_id: col_parse_opt(row, c(LineColIdx::SkuId), label)?,
        product_name: col_string(row, c(LineColIdx::ProductName), label)?,
        qty: col_parse(row, c(LineColIdx::Qty), label)?,
        unit_price: col_parse(row, c(LineColIdx::UnitPrice), label)?,
        total_price: col_parse(row, c(LineColIdx::TotalPrice), label)?,
    })
}

fn order_from_row(
    key: &str,
    row: &[String],
    lines: Vec<OrderLineModel>,
) -> DefaultResult<OrderModel, AppError> {
    let label = _order::TOPLVL_LABEL;
    let c = |i: TopLvlColIdx| -> usize { i.into() };
    let coupon_id: Option<u64> = col_parse_opt(row, c(TopLvlColIdx::CouponId), label)?;
    let grant_id: Option<u64> = col_parse_opt(row, c(TopLvlColIdx::GrantId), label)?;
    let coupon = match (coupon_id, grant_id) {
        (Some(coupon_id), Some(grant_id)) => Some(OrderCouponModel {
            coupon_id,
            grant_id,
        }),
        _others => None,
    };
    let shipping = ShippingSnapshotModel {
        recipient: col_string(row, c(TopLvlColIdx::Recipient), label)?,
        phone: col_string(row, c(TopLvlColIdx::Phone), label)?,
        postcode: col_string(row, c(TopLvlColIdx::Postcode), label)?,
        address1: col_string(row, c(TopLvlColIdx::Address1), label)?,
        address2: col_string_opt(row, c(TopLvlColIdx::Address2), label)?,
    };
    Ok(OrderModel {
        id: key.parse().map_err(|_e| malformed_key(label, key))?,
        number: col_string(row, c(TopLvlColIdx::Number), label)?,
        owner: col_parse(row, c(TopLvlColIdx::Owner), label)?,
        shipping,
        lines,
        total_amount: col_parse(row, c(TopLvlColIdx::TotalAmount), label)?,
        discount_amount: col_parse(row, c(TopLvlColIdx::DiscountAmount), label)?,
        delivery_fee: col_parse(row, c(TopLvlColIdx::DeliveryFee), label)?,
        final_amount: col_parse(row, c(TopLvlColIdx::FinalAmount), label)?,
        status: col_string(row, c(TopLvlColIdx::Status), label)?.parse()?,
        pay_status: col_string(row, c(TopLvlColIdx::PayStatus), label)?.parse()?,
        pay_method: col_string(row, c(TopLvlColIdx::PayMethod), label)?.parse()?,
        payment_id: col_string_opt(row, c(TopLvlColIdx::PaymentId), label)?,
        coupon,
        paid_at: col_time_opt(row, c(TopLvlColIdx::PaidAt), label)?,
        refunded_amount: col_parse_opt(row, c(TopLvlColIdx::RefundedAmount), label)?,
        memo: col_string_opt(row, c(TopLvlColIdx::Memo), label)?,
        reason: col_string_opt(row, c(TopLvlColIdx::Reason), label)?,
        created_at: col_time(row, c(TopLvlColIdx::CreatedAt), label)?,
        updated_at: col_time(row, c(TopLvlColIdx::UpdatedAt), label)?,
    })
} // end of fn order_from_row

fn load_orders(
    lock: &AppInMemDstoreLock,
    keys: Vec<String>,
) -> DefaultResult<Vec<OrderModel>, AppError> {
    let op = KeyPrefixFilter(keys.iter().cloned().collect::<HashSet<_>>());
    let line_keys = lock.filter_keys(_order::LINE_LABEL, &op)?;
    let info = HashMap::from([
        (_order::TOPLVL_LABEL.to_string(), keys),
        (_order::LINE_LABEL.to_string(), line_keys),
    ]);
    let mut fetched = lock.fetch(info)?;
    let toplvl_rows = fetched.remove(_order::TOPLVL_LABEL).unwrap_or_default();
    let line_rows = fetched.remove(_order::LINE_LABEL).unwrap_or_default();
    let mut out = toplvl_rows
        .iter()
        .map(|(oid, row)| {
            let prefix = format!("{oid}-");
            let mut lines = line_rows
                .iter()
                .filter(|(k, _)| k.starts_with(prefix.as_str()))
                .map(|(k, lrow)| line_from_row(k, lrow))
                .collect::<DefaultResult<Vec<_>, AppError>>()?;
            lines.sort_by_key(|l| l.id);
            order_from_row(oid, row, lines)
        })
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    out.sort_by_key(|o| (o.created_at, o.id));
    Ok(out)
}

fn order_keys_by_column(
    lock: &AppInMemDstoreLock,
    col: TopLvlColIdx,
    value: &str,
) -> DefaultResult<Vec<String>, AppError> {
    let op = ColumnEqFilter {
        idx: col.into(),
        value: value.to_string(),
    };
    lock.filter_keys(_order::TOPLVL_LABEL, &op)
}

fn not_found(detail: String) -> AppError {
    AppError {
        code: AppErrorCode::OrderNotFound,
        detail: Some(detail),
    }
}

pub struct OrderInMemRepo {
    datastore: Arc<Box<dyn AbstInMemoryDStore>>,
}

impl OrderInMemRepo {
    pub async fn new(m: Arc<Box<dyn AbstInMemoryDStore>>) -> DefaultResult<Self, AppError> {
        let labels = [
            _order::TOPLVL_LABEL,
            _order::LINE_LABEL,
            CartLineTable::LABEL,
            ProductTable::LABEL,
            SkuTable::LABEL,
            _stockm::TABLE_LABEL,
            _coupon::TABLE_LABEL,
            _grant::TABLE_LABEL,
        ];
        for label in labels {
            m.create_table(label).await?;
        }
        Ok(Self { datastore: m })
    }

    async fn fetch_by_column(
        &self,
        col: TopLvlColIdx,
        value: &str,
    ) -> DefaultResult<Vec<OrderModel>, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        let keys = order_keys_by_column(&lock, col, value)?;
        load_orders(&lock, keys)
    }
}

#[async_trait]
impl AbsOrderRepo for OrderInMemRepo {
    async fn create(
        &self,
        req: OrderCreateReqModel,
        cb: AppOrderRepoCreateUserFunc,
    ) -> DefaultResult<OrderModel, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        let owner = req.args.owner;
        let dup = order_keys_by_column(&lock, TopLvlColIdx::Number, req.args.number.as_str())?;
        if !dup.is_empty() {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("duplicate-order-number:{}", req.args.number)),
            });
        }
        let (cart, product_ids, targets) = match &req.source {
            OrderSourceModel::Cart => {
                let cart = load_cart(&lock, owner)?;
                let pids = cart.lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
                let targets = cart.stock_targets();
                (cart, pids, targets)
            }
            OrderSourceModel::Direct {
                product_id, sku_id, ..
            } => {
                let target = StockTarget::resolve(*product_id, *sku_id);
                (CartModel::new(owner), vec![*product_id], vec![target])
            }
        };
        let coupon = match req.coupon_id {
            Some(cid) => load_coupon(&lock, cid)?,
            None => None,
        };
        let grants = match coupon.as_ref() {
            Some(c) => load_user_grants(&lock, owner)?
                .into_iter()
                .filter(|g| g.coupon_id == c.id && !g.used)
                .collect(),
            None => Vec::new(),
        };
        let saved_cartlines = cart.lines.clone();
        let mut tx = OrderCreateTxModel {
            products: load_products(&lock, &product_ids)?,
            stock: load_stock(&lock, &targets)?,
            cart,
            coupon,
            grants,
        };
        let order = cb(req, &mut tx)?;

        let mut data = order_update_data(&order, true);
        data.insert(_stockm::TABLE_LABEL.to_string(), stock_to_rows(&tx.stock));
        data.insert(_grant::TABLE_LABEL.to_string(), grant_rows(&tx.grants));
        data.insert(CartLineTable::LABEL.to_string(), CartLineTable::to_rows(&tx.cart));
        let deleting = HashMap::from([(
            CartLineTable::LABEL.to_string(),
            removed_line_keys(owner, &saved_cartlines, &tx.cart),
        )]);
        let _num = self.datastore.commit_release(data, deleting, lock)?;
        Ok(order)
    } // end of fn create

    async fn fetch_by_id(&self, order_id: u64) -> DefaultResult<OrderModel, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        load_orders(&lock, vec![order_id.to_string()])?
            .pop()
            .ok_or_else(|| not_found(order_id.to_string()))
    }

    async fn fetch_by_number(&self, number: &str) -> DefaultResult<OrderModel, AppError> {
        self.fetch_by_column(TopLvlColIdx::Number, number)
            .await?
            .pop()
            .ok_or_else(|| not_found(number.to_string()))
    }

    async fn fetch_by_owner(&self, owner: u64) -> DefaultResult<Vec<OrderModel>, AppError> {
        self.fetch_by_column(TopLvlColIdx::Owner, owner.to_string().as_str())
            .await
    }

    async fn fetch_paid_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> DefaultResult<Vec<OrderModel>, AppError> {
        let completed = PaymentStatus::Completed.as_str();
        let out = self
            .fetch_by_column(TopLvlColIdx::PayStatus, completed)
            .await?
            .into_iter()
            .filter(|o| o.paid_at.map_or(false, |t| t >= start && t < end))
            .collect();
        Ok(out)
    }

    async fn try_update(
        &self,
        order_id: u64,
        event: OrderPayEventModel,
        now: DateTime<FixedOffset>,
        cb: AppOrderRepoUpdateUserFunc,
    ) -> DefaultResult<OrderModel, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        let order = load_orders(&lock, vec![order_id.to_string()])?
            .pop()
            .ok_or_else(|| not_found(order_id.to_string()))?;
        let targets = order.lines.iter().map(OrderLineModel::target).collect::<Vec<_>>();
        let grant = match order.coupon.as_ref() {
            Some(c) => load_grant(&lock, c.grant_id)?,
            None => None,
        };
        let payment_claimed_by = if let OrderPayEventModel::Approve { payment_id, .. } = &event {
            order_keys_by_column(&lock, TopLvlColIdx::PaymentId, payment_id.as_str())?
                .into_iter()
                .filter_map(|k| k.parse::<u64>().ok())
                .find(|oid| *oid != order_id)
        } else {
            None
        };
        let mut tx = OrderPayTxModel {
            stock: load_stock(&lock, &targets)?,
            order,
            grant,
            payment_claimed_by,
        };
        cb(&mut tx, event, now)?;

        let mut data = order_update_data(&tx.order, false);
        data.insert(_stockm::TABLE_LABEL.to_string(), stock_to_rows(&tx.stock));
        if let Some(g) = tx.grant.as_ref() {
            data.insert(
                _grant::TABLE_LABEL.to_string(),
                grant_rows(std::slice::from_ref(g)),
            );
        }
        let _num = self.datastore.save_release(data, lock)?;
        Ok(tx.order)
    } // end of fn try_update
} // end of impl OrderInMemRepo
