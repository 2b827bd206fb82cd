mod edit_catalog;
mod manage_cart;
mod manage_order;
mod settlement;
mod stock_ledger;

use rust_decimal::Decimal;

use marketplace_order::api::dto::{CartLineAddReqDto, OrderCreateDirectReqDto, OrderDto};
use marketplace_order::model::{
    AddressModel, OrderPricingPolicy, PaymentMethod, ProductModelSet, StockLevelModel,
    StockLevelModelSet, StockTarget,
};
use marketplace_order::repository::{
    app_repo_address, app_repo_cart, app_repo_coupon, app_repo_order, app_repo_product,
    app_repo_stock,
};
use marketplace_order::usecase::{AddCartLineUseCase, CreateOrderUseCase, OrderPaymentUseCase};
use marketplace_order::AppSharedState;

use crate::model::{ut_coupon_flat, ut_grant, ut_product_single, ut_product_with_skus};
use crate::{ut_setup_share_state, MockConfidential};

// seeded catalog
// - product 80 with SKUs 801 (18000, 50 units), 802 (19500, 1 unit)
// - product 90 without option (10000, 4 units)
// - address 3301 of the buyer, 3302 of another user
// - flat coupon 44 (2000 off above 10000), granted once to the buyer
pub(crate) const UT_USR_ID: u64 = 126;
pub(crate) const UT_OTHER_USR_ID: u64 = 127;
pub(crate) const UT_SELLER_ID: u64 = 3;
pub(crate) const UT_ADDR_ID: u64 = 3301;
pub(crate) const UT_COUPON_ID: u64 = 44;
pub(crate) const UT_GRANT_ID: u64 = 4401;

fn ut_address(id: u64, usr_id: u64) -> AddressModel {
    AddressModel {
        id,
        usr_id,
        recipient: "Jeanette".to_string(),
        phone: "0912-345-678".to_string(),
        postcode: "10617".to_string(),
        address1: "No. 1, Roosevelt Rd.".to_string(),
        address2: None,
    }
}

pub(crate) async fn ut_setup_seeded() -> AppSharedState {
    let shr_state = ut_setup_share_state("config_ok.json", Box::new(MockConfidential {}));
    let ds = shr_state.datastore();
    let items = vec![
        ut_product_with_skus(
            80,
            UT_SELLER_ID,
            &[(801, "M / white", 18000), (802, "L / navy", 19500)],
        ),
        ut_product_single(90, UT_SELLER_ID, 10000),
    ];
    let repo = app_repo_product(ds.clone()).await.unwrap();
    repo.save(ProductModelSet { items }).await.unwrap();
    let items = vec![
        StockLevelModel::new(StockTarget::Sku { sku_id: 801 }, 50),
        StockLevelModel::new(StockTarget::Sku { sku_id: 802 }, 1),
        StockLevelModel::new(StockTarget::Single { product_id: 90 }, 4),
    ];
    let repo = app_repo_stock(ds.clone()).await.unwrap();
    repo.save(StockLevelModelSet { items }).await.unwrap();
    let repo = app_repo_address(ds.clone()).await.unwrap();
    repo.save(ut_address(UT_ADDR_ID, UT_USR_ID)).await.unwrap();
    repo.save(ut_address(3302, UT_OTHER_USR_ID)).await.unwrap();
    let repo = app_repo_coupon(ds).await.unwrap();
    repo.save_coupon(ut_coupon_flat(UT_COUPON_ID, 2000, 10000))
        .await
        .unwrap();
    repo.save_grants(vec![ut_grant(UT_GRANT_ID, UT_USR_ID, UT_COUPON_ID)])
        .await
        .unwrap();
    shr_state
}

pub(crate) async fn ut_stock_of(shr_state: &AppSharedState, target: StockTarget) -> (u32, u32) {
    let repo = app_repo_stock(shr_state.datastore()).await.unwrap();
    let ms = repo.fetch(vec![target]).await.unwrap();
    let s = ms.find(&target).unwrap();
    (s.total, s.reserved)
}

pub(crate) async fn ut_cart_add(
    shr_state: &AppSharedState,
    usr_id: u64,
    product_id: u64,
    sku_id: Option<u64>,
    quantity: u32,
) -> u64 {
    let ds = shr_state.datastore();
    let uc = AddCartLineUseCase {
        repo_cart: app_repo_cart(ds.clone()).await.unwrap(),
        repo_product: app_repo_product(ds).await.unwrap(),
        id_gen: shr_state.id_generator(),
        logctx: shr_state.log_context().clone(),
        usr_id,
    };
    let data = CartLineAddReqDto {
        product_id,
        sku_id,
        quantity,
        price_override: None,
    };
    uc.execute(data).await.unwrap()
}

pub(crate) async fn ut_create_order_uc(shr_state: &AppSharedState, usr_id: u64) -> CreateOrderUseCase {
    let ds = shr_state.datastore();
    CreateOrderUseCase {
        repo_order: app_repo_order(ds.clone()).await.unwrap(),
        repo_address: app_repo_address(ds).await.unwrap(),
        id_gen: shr_state.id_generator(),
        policy: OrderPricingPolicy::from(&shr_state.config().service.checkout),
        logctx: shr_state.log_context().clone(),
        usr_id,
    }
}

/// buy-now order of the single-option product, 10000 plus delivery fee
pub(crate) async fn ut_direct_order_13000(shr_state: &AppSharedState) -> OrderDto {
    let uc = ut_create_order_uc(shr_state, UT_USR_ID).await;
    let data = OrderCreateDirectReqDto {
        product_id: 90,
        sku_id: None,
        quantity: 1,
        address_id: UT_ADDR_ID,
        pay_method: PaymentMethod::Card,
        coupon_id: None,
        memo: None,
    };
    uc.direct(data).await.unwrap()
}

pub(crate) async fn ut_payment_uc(shr_state: &AppSharedState) -> OrderPaymentUseCase {
    let cfg = &shr_state.config().service.checkout;
    OrderPaymentUseCase {
        repo: app_repo_order(shr_state.datastore()).await.unwrap(),
        tolerance: Decimal::from(cfg.amount_tolerance),
        logctx: shr_state.log_context().clone(),
    }
}
