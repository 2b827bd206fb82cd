use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;
use std::vec::Vec;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;
use crate::model::{
    AddressModel, CartLineAddReq, CartModel, CouponModel, OrderCreateArgs, OrderModel,
    OrderPricingPolicy, OrderStatus, ProductModelSet, StockLedgerReq, StockLevelModelSet,
    StockTarget, UserCouponModel,
};
use crate::AppDataStoreContext;

mod in_mem;
// make in-memory repo visible only for testing purpose
pub use in_mem::address::AddressInMemRepo;
pub use in_mem::cart::CartInMemRepo;
pub use in_mem::coupon::CouponInMemRepo;
pub use in_mem::order::OrderInMemRepo;
pub use in_mem::product::ProductInMemRepo;
pub use in_mem::stock_level::StockLvlInMemRepo;

#[cfg(feature = "mariadb")]
mod mariadb;

#[cfg(feature = "mariadb")]
use mariadb::address::AddressMariaDbRepo;
#[cfg(feature = "mariadb")]
use mariadb::cart::CartMariaDbRepo;
#[cfg(feature = "mariadb")]
use mariadb::coupon::CouponMariaDbRepo;
#[cfg(feature = "mariadb")]
use mariadb::order::OrderMariaDbRepo;
#[cfg(feature = "mariadb")]
use mariadb::product::ProductMariaDbRepo;
#[cfg(feature = "mariadb")]
use mariadb::stock::StockMariaDbRepo;

// the repository instance may be used across an await,
// the future created by app callers has to be able to pass to different threads
// , it is the reason to add `Send` and `Sync` as super-traits
#[async_trait]
pub trait AbsProductRepo: Sync + Send {
    async fn save(&self, ms: ProductModelSet) -> DefaultResult<(), AppError>;
    // products which don't exist are skipped
    async fn fetch(&self, ids: Vec<u64>) -> DefaultResult<ProductModelSet, AppError>;
}

// business rules run in the callback, the repository loads the rows it
// needs and saves the result within the same transaction
pub type AppStockRepoEditUserFunc =
    fn(&mut StockLevelModelSet, &[StockLedgerReq]) -> DefaultResult<(), AppError>;

#[async_trait]
pub trait AbsStockRepo: Sync + Send {
    async fn save(&self, slset: StockLevelModelSet) -> DefaultResult<(), AppError>;
    async fn fetch(&self, targets: Vec<StockTarget>) -> DefaultResult<StockLevelModelSet, AppError>;
    /// returns the stock levels after edit
    async fn try_edit(
        &self,
        reqs: Vec<StockLedgerReq>,
        cb: AppStockRepoEditUserFunc,
    ) -> DefaultResult<StockLevelModelSet, AppError>;
}

pub enum CartEditReq {
    Add(CartLineAddReq),
    Update { line_id: u64, qty: u32 },
    Remove { line_id: u64 },
    Clear,
}

// returns IDs of the affected cart lines
pub type AppCartRepoEditUserFunc =
    fn(&mut CartModel, &mut StockLevelModelSet, CartEditReq) -> DefaultResult<Vec<u64>, AppError>;

#[async_trait]
pub trait AbsCartRepo: Sync + Send {
    async fn fetch_cart(&self, owner: u64) -> DefaultResult<CartModel, AppError>;

    async fn try_edit(
        &self,
        owner: u64,
        req: CartEditReq,
        cb: AppCartRepoEditUserFunc,
    ) -> DefaultResult<Vec<u64>, AppError>;
}

pub enum OrderSourceModel {
    Cart,
    Direct {
        line_id: u64,
        product_id: u64,
        sku_id: Option<u64>,
        qty: u32,
    },
}

pub struct OrderCreateReqModel {
    pub args: OrderCreateArgs,
    pub source: OrderSourceModel,
    pub coupon_id: Option<u64>,
    pub policy: OrderPricingPolicy,
}

/// Rows loaded for order creation within one transaction, the lines
/// left in `cart` after the callback returns are kept, the others are
/// removed from the cart.
pub struct OrderCreateTxModel {
    pub cart: CartModel,
    pub products: ProductModelSet,
    pub stock: StockLevelModelSet,
    pub coupon: Option<CouponModel>,
    // unused grants of the chosen coupon owned by the buyer
    pub grants: Vec<UserCouponModel>,
}

pub type AppOrderRepoCreateUserFunc =
    fn(OrderCreateReqModel, &mut OrderCreateTxModel) -> DefaultResult<OrderModel, AppError>;

pub enum OrderPayEventModel {
    Approve {
        payment_id: String,
        paid: Decimal,
        tolerance: Decimal,
    },
    Fail {
        reason: String,
    },
    Refund {
        amount: Decimal,
        reason: String,
    },
    Cancel {
        reason: String,
    },
    Advance {
        next: OrderStatus,
    },
}

pub struct OrderPayTxModel {
    pub order: OrderModel,
    pub stock: StockLevelModelSet,
    pub grant: Option<UserCouponModel>,
    // order which already claimed the payment ID of an approval event
    pub payment_claimed_by: Option<u64>,
}

pub type AppOrderRepoUpdateUserFunc = fn(
    &mut OrderPayTxModel,
    OrderPayEventModel,
    DateTime<FixedOffset>,
) -> DefaultResult<(), AppError>;

#[async_trait]
pub trait AbsOrderRepo: Sync + Send {
    async fn create(
        &self,
        req: OrderCreateReqModel,
        cb: AppOrderRepoCreateUserFunc,
    ) -> DefaultResult<OrderModel, AppError>;

    async fn fetch_by_id(&self, order_id: u64) -> DefaultResult<OrderModel, AppError>;

    async fn fetch_by_number(&self, number: &str) -> DefaultResult<OrderModel, AppError>;

    async fn fetch_by_owner(&self, owner: u64) -> DefaultResult<Vec<OrderModel>, AppError>;

    /// orders whose payment completed within the time range
    async fn fetch_paid_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> DefaultResult<Vec<OrderModel>, AppError>;

    async fn try_update(
        &self,
        order_id: u64,
        event: OrderPayEventModel,
        now: DateTime<FixedOffset>,
        cb: AppOrderRepoUpdateUserFunc,
    ) -> DefaultResult<OrderModel, AppError>;
} // end of trait AbsOrderRepo

#[async_trait]
pub trait AbsCouponRepo: Sync + Send {
    async fn save_coupon(&self, coupon: CouponModel) -> DefaultResult<(), AppError>;
    async fn fetch_coupon(&self, id: u64) -> DefaultResult<CouponModel, AppError>;
    async fn save_grants(&self, grants: Vec<UserCouponModel>) -> DefaultResult<(), AppError>;
    async fn fetch_grants(&self, usr_id: u64) -> DefaultResult<Vec<UserCouponModel>, AppError>;
}

#[async_trait]
pub trait AbsAddressRepo: Sync + Send {
    async fn save(&self, addr: AddressModel) -> DefaultResult<(), AppError>;
    async fn fetch(&self, id: u64) -> DefaultResult<AddressModel, AppError>;
}

macro_rules! app_repo_factory {
    ($fn_name:ident, $trait_:ident, $inmem:ident, $mariadb:ident) => {
        pub async fn $fn_name(
            ds: Arc<AppDataStoreContext>,
        ) -> DefaultResult<Box<dyn $trait_>, AppError> {
            #[cfg(feature = "mariadb")]
            if let Some(dbs) = ds.sql_dbs.as_ref() {
                let obj = $mariadb::new(dbs.clone())?;
                return Ok(Box::new(obj));
            }
            if let Some(m) = ds.in_mem.as_ref() {
                let obj = $inmem::new(m.clone()).await?;
                Ok(Box::new(obj))
            } else {
                Err(AppError {
                    code: AppErrorCode::MissingDataStore,
                    detail: Some(stringify!($fn_name).to_string()),
                })
            }
        }
    };
}

app_repo_factory!(app_repo_product, AbsProductRepo, ProductInMemRepo, ProductMariaDbRepo);
app_repo_factory!(app_repo_stock, AbsStockRepo, StockLvlInMemRepo, StockMariaDbRepo);
app_repo_factory!(app_repo_cart, AbsCartRepo, CartInMemRepo, CartMariaDbRepo);
app_repo_factory!(app_repo_order, AbsOrderRepo, OrderInMemRepo, OrderMariaDbRepo);
app_repo_factory!(app_repo_coupon, AbsCouponRepo, CouponInMemRepo, CouponMariaDbRepo);
app_repo_factory!(app_repo_address, AbsAddressRepo, AddressInMemRepo, AddressMariaDbRepo);
