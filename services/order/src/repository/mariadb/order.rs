use std::ops::DerefMut;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use futures_util::stream::StreamExt;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySqlConnection, Row};

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AppMariaDbStore;
use crate::error::AppError;
use crate::model::{
    CartModel, OrderCouponModel, OrderLineModel, OrderModel, PaymentStatus, ShippingSnapshotModel,
    StockTarget,
};
use crate::repository::{
    AbsOrderRepo, AppOrderRepoCreateUserFunc, AppOrderRepoUpdateUserFunc, OrderCreateReqModel,
    OrderCreateTxModel, OrderPayEventModel, OrderPayTxModel, OrderSourceModel,
};

use super::cart::{load_cart, save_cart};
use super::coupon::{load_coupon, load_grant, load_unused_grants, save_grant_rows};
use super::product::load_products;
use super::stock::{load_stock, save_stock};
use super::{
    first_db, from_db_time, parse_col, placeholder_list, placeholder_rows, run_query_once,
    to_db_time, MySqlQuery,
};

const TOPLVL_COLS: &str = "`id`,`number`,`owner`,`recipient`,`phone`,`postcode`,`address1`,\
    `address2`,`total_amount`,`discount_amount`,`delivery_fee`,`final_amount`,`status`,\
    `pay_status`,`pay_method`,`payment_id`,`coupon_id`,`grant_id`,`paid_at`,`refunded_amount`,\
    `memo`,`reason`,`created_at`,`updated_at`";
const NUM_TOPLVL_COLS: usize = 24;

const LINE_COLS: &str = "`order_id`,`line_id`,`product_id`,`sku_id`,`product_name`,`qty`,\
    `unit_price`,`total_price`";
const NUM_LINE_COLS: usize = 8;

const SQL_UPDATE_PAYMENT: &str = "UPDATE `order_toplvl` SET `status`=?, `pay_status`=?, \
    `payment_id`=?, `paid_at`=?, `refunded_amount`=?, `reason`=?, `updated_at`=? WHERE `id`=?";

struct InsertTopLvlArg<'a>(&'a OrderModel);
struct InsertLineArg<'a>(&'a OrderModel);
struct UpdatePaymentArg<'a>(&'a OrderModel);
struct FetchLinesArg(Vec<u64>);

impl<'a> InsertTopLvlArg<'a> {
    fn sql_pattern() -> String {
        format!(
            "INSERT INTO `order_toplvl`({}) VALUES {}",
            TOPLVL_COLS,
            placeholder_rows(1, NUM_TOPLVL_COLS)
        )
    }
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        let o = self.0;
        let sh = &o.shipping;
        query
            .bind(o.id)
            .bind(o.number.clone())
            .bind(o.owner)
            .bind(sh.recipient.clone())
            .bind(sh.phone.clone())
            .bind(sh.postcode.clone())
            .bind(sh.address1.clone())
            .bind(sh.address2.clone())
            .bind(o.total_amount)
            .bind(o.discount_amount)
            .bind(o.delivery_fee)
            .bind(o.final_amount)
            .bind(o.status.as_str())
            .bind(o.pay_status.as_str())
            .bind(o.pay_method.as_str())
            .bind(o.payment_id.clone())
            .bind(o.coupon.map(|c| c.coupon_id))
            .bind(o.coupon.map(|c| c.grant_id))
            .bind(o.paid_at.as_ref().map(to_db_time))
            .bind(o.refunded_amount)
            .bind(o.memo.clone())
            .bind(o.reason.clone())
            .bind(to_db_time(&o.created_at))
            .bind(to_db_time(&o.updated_at))
    }
}

impl<'a> InsertLineArg<'a> {
    fn sql_pattern(num_batch: usize) -> String {
        format!(
            "INSERT INTO `order_line`({}) VALUES {}",
            LINE_COLS,
            placeholder_rows(num_batch, NUM_LINE_COLS)
        )
    }
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        let oid = self.0.id;
        self.0.lines.iter().fold(query, |q, l| {
            q.bind(oid)
                .bind(l.id)
                .bind(l.product_id)
                .bind(l.sku_id)
                .bind(l.product_name.clone())
                .bind(l.qty)
                .bind(l.unit_price)
                .bind(l.total_price)
        })
    }
}

impl<'a> UpdatePaymentArg<'a> {
    fn bind_to<'q>(self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        let o = self.0;
        query
            .bind(o.status.as_str())
            .bind(o.pay_status.as_str())
            .bind(o.payment_id.clone())
            .bind(o.paid_at.as_ref().map(to_db_time))
            .bind(o.refunded_amount)
            .bind(o.reason.clone())
            .bind(to_db_time(&o.updated_at))
            .bind(o.id)
    }
}

impl FetchLinesArg {
    fn sql_pattern(&self) -> String {
        format!(
            "SELECT {} FROM `order_line` WHERE `order_id` IN ({}) ORDER BY `order_id`,`line_id`",
            LINE_COLS,
            placeholder_list(self.0.len())
        )
    }
    fn bind_to<'q>(&self, query: MySqlQuery<'q>) -> MySqlQuery<'q> {
        self.0.iter().fold(query, |q, id| q.bind(*id))
    }
}

fn toplvl_from_row(row: MySqlRow) -> DefaultResult<OrderModel, AppError> {
    let coupon_id = row.try_get::<Option<u64>, usize>(16)?;
    let grant_id = row.try_get::<Option<u64>, usize>(17)?;
    let coupon = match (coupon_id, grant_id) {
        (Some(coupon_id), Some(grant_id)) => Some(OrderCouponModel {
            coupon_id,
            grant_id,
        }),
        _others => None,
    };
    let shipping = ShippingSnapshotModel {
        recipient: row.try_get::<String, usize>(3)?,
        phone: row.try_get::<String, usize>(4)?,
        postcode: row.try_get::<String, usize>(5)?,
        address1: row.try_get::<String, usize>(6)?,
        address2: row.try_get::<Option<String>, usize>(7)?,
    };
    let status = row.try_get::<String, usize>(12)?;
    let pay_status = row.try_get::<String, usize>(13)?;
    let pay_method = row.try_get::<String, usize>(14)?;
    let paid_at = row.try_get::<Option<NaiveDateTime>, usize>(18)?;
    Ok(OrderModel {
        id: row.try_get::<u64, usize>(0)?,
        number: row.try_get::<String, usize>(1)?,
        owner: row.try_get::<u64, usize>(2)?,
        shipping,
        lines: Vec::new(),
        total_amount: row.try_get::<Decimal, usize>(8)?,
        discount_amount: row.try_get::<Decimal, usize>(9)?,
        delivery_fee: row.try_get::<Decimal, usize>(10)?,
        final_amount: row.try_get::<Decimal, usize>(11)?,
        status: parse_col(status.as_str(), "order.status")?,
        pay_status: parse_col(pay_status.as_str(), "order.pay_status")?,
        pay_method: parse_col(pay_method.as_str(), "order.pay_method")?,
        payment_id: row.try_get::<Option<String>, usize>(15)?,
        coupon,
        paid_at: paid_at.map(from_db_time),
        refunded_amount: row.try_get::<Option<Decimal>, usize>(19)?,
        memo: row.try_get::<Option<String>, usize>(20)?,
        reason: row.try_get::<Option<String>, usize>(21)?,
        created_at: from_db_time(row.try_get::<NaiveDateTime, usize>(22)?),
        updated_at: from_db_time(row.try_get::<NaiveDateTime, usize>(23)?),
    })
} // end of fn toplvl_from_row

// the first column is order ID which the line belongs to
fn line_from_row(row: MySqlRow) -> DefaultResult<(u64, OrderLineModel), AppError> {
    let oid = row.try_get::<u64, usize>(0)?;
    let line = OrderLineModel {
        id: row.try_get::<u64, usize>(1)?,
        product_id: row.try_get::<u64, usize>(2)?,
        sku_id: row.try_get::<Option<u64>, usize>(3)?,
        product_name: row.try_get::<String, usize>(4)?,
        qty: row.try_get::<u32, usize>(5)?,
        unit_price: row.try_get::<Decimal, usize>(6)?,
        total_price: row.try_get::<Decimal, usize>(7)?,
    };
    Ok((oid, line))
}

async fn load_orders(
    conn: &mut MySqlConnection,
    cond: &str,
    for_update: bool,
    query_binder: impl FnOnce(MySqlQuery<'_>) -> MySqlQuery<'_>,
) -> DefaultResult<Vec<OrderModel>, AppError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql_patt = format!(
        "SELECT {} FROM `order_toplvl` WHERE {} ORDER BY `created_at` ASC, `id` ASC{}",
        TOPLVL_COLS, cond, lock
    );
    let query = query_binder(sqlx::query(sql_patt.as_str()));
    let mut orders = Vec::new();
    let mut rs_stream = query.fetch(&mut *conn);
    while let Some(result) = rs_stream.next().await {
        orders.push(toplvl_from_row(result?)?);
    }
    drop(rs_stream);
    if orders.is_empty() {
        return Ok(orders);
    }
    let arg = FetchLinesArg(orders.iter().map(|o| o.id).collect());
    let sql_patt = arg.sql_pattern();
    let query = arg.bind_to(sqlx::query(sql_patt.as_str()));
    let mut rs_stream = query.fetch(&mut *conn);
    while let Some(result) = rs_stream.next().await {
        let (oid, line) = line_from_row(result?)?;
        if let Some(o) = orders.iter_mut().find(|o| o.id == oid) {
            o.lines.push(line);
        }
    }
    Ok(orders)
} // end of fn load_orders

fn not_found(detail: String) -> AppError {
    AppError {
        code: AppErrorCode::OrderNotFound,
        detail: Some(detail),
    }
}

pub(crate) struct OrderMariaDbRepo {
    _db: Arc<AppMariaDbStore>,
}

impl OrderMariaDbRepo {
    pub fn new(dbs: Vec<Arc<AppMariaDbStore>>) -> DefaultResult<Self, AppError> {
        let _db = first_db(dbs, "order")?;
        Ok(Self { _db })
    }
}

#[async_trait]
impl AbsOrderRepo for OrderMariaDbRepo {
    async fn create(
        &self,
        req: OrderCreateReqModel,
        cb: AppOrderRepoCreateUserFunc,
    ) -> DefaultResult<OrderModel, AppError> {
        let owner = req.args.owner;
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        let query = sqlx::query("SELECT COUNT(*) FROM `order_toplvl` WHERE `number`=?")
            .bind(req.args.number.clone());
        let row = query.fetch_one(tx.deref_mut()).await?;
        if row.try_get::<i64, usize>(0)? > 0 {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("duplicate-order-number:{}", req.args.number)),
            });
        }
        // rows are locked in the same order as other transactions do,
        // cart lines first, then stock levels, coupon grants last
        let (cart, product_ids, targets) = match &req.source {
            OrderSourceModel::Cart => {
                let cart = load_cart(tx.deref_mut(), owner, true).await?;
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
        let products = load_products(tx.deref_mut(), &product_ids).await?;
        let stock = load_stock(tx.deref_mut(), &targets, true).await?;
        let coupon = match req.coupon_id {
            Some(cid) => load_coupon(tx.deref_mut(), cid).await?,
            None => None,
        };
        let grants = match coupon.as_ref() {
            Some(c) => load_unused_grants(tx.deref_mut(), owner, c.id).await?,
            None => Vec::new(),
        };
        let saved_cartlines = cart.lines.clone();
        let mut txm = OrderCreateTxModel {
            cart,
            products,
            stock,
            coupon,
            grants,
        };
        let order = cb(req, &mut txm)?;

        let sql_patt = InsertTopLvlArg::sql_pattern();
        let query = InsertTopLvlArg(&order).bind_to(sqlx::query(sql_patt.as_str()));
        let _rs = run_query_once(&mut tx, query, Some(1)).await?;
        let num_lines = order.lines.len();
        let sql_patt = InsertLineArg::sql_pattern(num_lines);
        let query = InsertLineArg(&order).bind_to(sqlx::query(sql_patt.as_str()));
        let _rs = run_query_once(&mut tx, query, Some(num_lines)).await?;
        save_stock(&mut tx, &txm.stock).await?;
        save_grant_rows(&mut tx, &txm.grants).await?;
        save_cart(&mut tx, &saved_cartlines, &txm.cart).await?;
        tx.commit().await?;
        Ok(order)
    } // end of fn create

    async fn fetch_by_id(&self, order_id: u64) -> DefaultResult<OrderModel, AppError> {
        let mut conn = self._db.acquire().await?;
        load_orders(conn.deref_mut(), "`id`=?", false, |q| q.bind(order_id))
            .await?
            .pop()
            .ok_or_else(|| not_found(order_id.to_string()))
    }

    async fn fetch_by_number(&self, number: &str) -> DefaultResult<OrderModel, AppError> {
        let mut conn = self._db.acquire().await?;
        let n = number.to_string();
        load_orders(conn.deref_mut(), "`number`=?", false, |q| q.bind(n))
            .await?
            .pop()
            .ok_or_else(|| not_found(number.to_string()))
    }

    async fn fetch_by_owner(&self, owner: u64) -> DefaultResult<Vec<OrderModel>, AppError> {
        let mut conn = self._db.acquire().await?;
        load_orders(conn.deref_mut(), "`owner`=?", false, |q| q.bind(owner)).await
    }

    async fn fetch_paid_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> DefaultResult<Vec<OrderModel>, AppError> {
        let mut conn = self._db.acquire().await?;
        let cond = "`pay_status`=? AND `paid_at`>=? AND `paid_at`<?";
        let completed = PaymentStatus::Completed.as_str();
        let (start, end) = (to_db_time(&start), to_db_time(&end));
        load_orders(conn.deref_mut(), cond, false, |q| {
            q.bind(completed).bind(start).bind(end)
        })
        .await
    }

    async fn try_update(
        &self,
        order_id: u64,
        event: OrderPayEventModel,
        now: DateTime<FixedOffset>,
        cb: AppOrderRepoUpdateUserFunc,
    ) -> DefaultResult<OrderModel, AppError> {
        let mut conn = self._db.acquire().await?;
        let mut tx = conn.begin().await?;
        let order = load_orders(tx.deref_mut(), "`id`=?", true, |q| q.bind(order_id))
            .await?
            .pop()
            .ok_or_else(|| not_found(order_id.to_string()))?;
        let targets = order.lines.iter().map(OrderLineModel::target).collect::<Vec<_>>();
        let stock = load_stock(tx.deref_mut(), &targets, true).await?;
        let grant = match order.coupon.as_ref() {
            Some(c) => load_grant(tx.deref_mut(), c.grant_id).await?,
            None => None,
        };
        let payment_claimed_by = if let OrderPayEventModel::Approve { payment_id, .. } = &event {
            let sql = "SELECT `id` FROM `order_toplvl` WHERE `payment_id`=? AND `id`<>? LIMIT 1";
            let query = sqlx::query(sql).bind(payment_id.clone()).bind(order_id);
            let maybe_row = query.fetch_optional(tx.deref_mut()).await?;
            maybe_row
                .map(|row| row.try_get::<u64, usize>(0))
                .transpose()?
        } else {
            None
        };
        let mut txm = OrderPayTxModel {
            order,
            stock,
            grant,
            payment_claimed_by,
        };
        cb(&mut txm, event, now)?;

        let query = UpdatePaymentArg(&txm.order).bind_to(sqlx::query(SQL_UPDATE_PAYMENT));
        let _rs = run_query_once(&mut tx, query, None).await?;
        save_stock(&mut tx, &txm.stock).await?;
        if let Some(g) = txm.grant.as_ref() {
            save_grant_rows(&mut tx, std::slice::from_ref(g)).await?;
        }
        tx.commit().await?;
        Ok(txm.order)
    } // end of fn try_update
} // end of impl OrderMariaDbRepo
