use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use marketplace_order::api::dto::{OrderCreateDirectReqDto, OrderCreateReqDto};
use marketplace_order::model::{OrderStatus, PaymentMethod, PaymentStatus, StockTarget};
use marketplace_order::repository::{
    app_repo_cart, app_repo_coupon, app_repo_order, app_repo_stock,
};
use marketplace_order::usecase::{RetrieveOrderUseCase, StockLedgerUseCase};
use marketplace_order::AppSharedState;

use super::{
    ut_cart_add, ut_create_order_uc, ut_direct_order_13000, ut_setup_seeded, ut_stock_of,
    UT_ADDR_ID, UT_COUPON_ID, UT_GRANT_ID, UT_OTHER_USR_ID, UT_USR_ID,
};

fn ut_from_cart_req(coupon_id: Option<u64>) -> OrderCreateReqDto {
    OrderCreateReqDto {
        address_id: UT_ADDR_ID,
        pay_method: PaymentMethod::Card,
        coupon_id,
        memo: Some("leave at the front desk".to_string()),
    }
}

async fn ut_grant_used(shr_state: &AppSharedState, usr_id: u64) -> bool {
    let repo = app_repo_coupon(shr_state.datastore()).await.unwrap();
    let grants = repo.fetch_grants(usr_id).await.unwrap();
    grants.iter().find(|g| g.id == UT_GRANT_ID).unwrap().used
}

#[tokio::test]
async fn from_cart_with_coupon() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 2).await;
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let order = uc.from_cart(ut_from_cart_req(Some(UT_COUPON_ID))).await.unwrap();
    assert_eq!(order.total_amount, Decimal::from(36000));
    assert_eq!(order.discount_amount, Decimal::from(2000));
    assert_eq!(order.delivery_fee, Decimal::ZERO);
    assert_eq!(order.final_amount, Decimal::from(34000));
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.coupon_id, Some(UT_COUPON_ID));
    assert_eq!(order.owner, UT_USR_ID);
    assert_eq!(order.shipping.recipient, "Jeanette");
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].unit_price, Decimal::from(18000));
    assert_eq!(order.lines[0].total_price, Decimal::from(36000));
    assert!(ut_grant_used(&shr_state, UT_USR_ID).await);
    // reservation handed over to the order, the cart becomes empty
    let target = StockTarget::Sku { sku_id: 801 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 2));
    let repo = app_repo_cart(shr_state.datastore()).await.unwrap();
    let cart = repo.fetch_cart(UT_USR_ID).await.unwrap();
    assert!(cart.is_empty());

    let uc = RetrieveOrderUseCase {
        repo: app_repo_order(shr_state.datastore()).await.unwrap(),
        usr_id: UT_USR_ID,
    };
    let saved = uc.execute(order.order_id).await.unwrap();
    assert_eq!(saved.order_number, order.order_number);
    assert_eq!(saved.final_amount, Decimal::from(34000));
}

#[tokio::test]
async fn direct_order_delivery_fee() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 1).await;
    let order = ut_direct_order_13000(&shr_state).await;
    assert_eq!(order.total_amount, Decimal::from(10000));
    assert_eq!(order.delivery_fee, Decimal::from(3000));
    assert_eq!(order.final_amount, Decimal::from(13000));
    assert_eq!(order.lines[0].product_id, 90);
    assert!(order.lines[0].sku_id.is_none());
    // cart untouched by the buy-now path
    let repo = app_repo_cart(shr_state.datastore()).await.unwrap();
    let cart = repo.fetch_cart(UT_USR_ID).await.unwrap();
    assert_eq!(cart.lines.len(), 1);

    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let data = OrderCreateDirectReqDto {
        product_id: 80,
        sku_id: Some(802),
        quantity: 1,
        address_id: UT_ADDR_ID,
        pay_method: PaymentMethod::EasyPay,
        coupon_id: None,
        memo: None,
    };
    let order = uc.direct(data).await.unwrap();
    assert_eq!(order.final_amount, Decimal::from(19500 + 3000));
    let target = StockTarget::Sku { sku_id: 802 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 1));
}

#[tokio::test]
async fn direct_order_insufficient_stock() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let data = OrderCreateDirectReqDto {
        product_id: 80,
        sku_id: Some(802),
        quantity: 2,
        address_id: UT_ADDR_ID,
        pay_method: PaymentMethod::Card,
        coupon_id: None,
        memo: None,
    };
    let result = uc.direct(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InsufficientStock);
    let target = StockTarget::Sku { sku_id: 802 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 0));

    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let data = OrderCreateDirectReqDto {
        product_id: 90,
        sku_id: None,
        quantity: 0,
        address_id: UT_ADDR_ID,
        pay_method: PaymentMethod::Card,
        coupon_id: None,
        memo: None,
    };
    let result = uc.direct(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
}

#[tokio::test]
async fn empty_cart_checked_before_coupon() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let result = uc.from_cart(ut_from_cart_req(Some(UT_COUPON_ID))).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::EmptyCart);
    // even when the coupon does not exist
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let result = uc.from_cart(ut_from_cart_req(Some(9876))).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::EmptyCart);
    assert!(!ut_grant_used(&shr_state, UT_USR_ID).await);
}

#[tokio::test]
async fn address_of_other_user() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 1).await;
    for address_id in [3302, 3399] {
        let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
        let data = OrderCreateReqDto {
            address_id,
            pay_method: PaymentMethod::Card,
            coupon_id: None,
            memo: None,
        };
        let result = uc.from_cart(data).await;
        assert_eq!(result.unwrap_err().code, AppErrorCode::AddressNotFound);
    }
    let repo = app_repo_cart(shr_state.datastore()).await.unwrap();
    let cart = repo.fetch_cart(UT_USR_ID).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
}

#[tokio::test]
async fn coupon_rejected_keeps_cart() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_OTHER_USR_ID, 80, Some(801), 2).await;
    // coupon granted to another user
    let uc = ut_create_order_uc(&shr_state, UT_OTHER_USR_ID).await;
    let data = OrderCreateReqDto {
        address_id: 3302,
        pay_method: PaymentMethod::Card,
        coupon_id: Some(UT_COUPON_ID),
        memo: None,
    };
    let result = uc.from_cart(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::CouponNotOwned);

    let uc = ut_create_order_uc(&shr_state, UT_OTHER_USR_ID).await;
    let data = OrderCreateReqDto {
        address_id: 3302,
        pay_method: PaymentMethod::Card,
        coupon_id: Some(9876),
        memo: None,
    };
    let result = uc.from_cart(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::CouponNotFound);
    let repo = app_repo_cart(shr_state.datastore()).await.unwrap();
    let cart = repo.fetch_cart(UT_OTHER_USR_ID).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    let target = StockTarget::Sku { sku_id: 801 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 2));
}

#[tokio::test]
async fn coupon_used_only_once() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 1).await;
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    uc.from_cart(ut_from_cart_req(Some(UT_COUPON_ID))).await.unwrap();
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 1).await;
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let result = uc.from_cart(ut_from_cart_req(Some(UT_COUPON_ID))).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::CouponNotOwned);
}

#[tokio::test]
async fn single_option_checked_again() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 1).await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 90, None, 3).await;
    let ledger = StockLedgerUseCase {
        repo: app_repo_stock(shr_state.datastore()).await.unwrap(),
        logctx: shr_state.log_context().clone(),
    };
    ledger
        .consume(StockTarget::Single { product_id: 90 }, 2)
        .await
        .unwrap();
    let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
    let result = uc.from_cart(ut_from_cart_req(None)).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InsufficientStock);
    // nothing handed over
    let repo = app_repo_cart(shr_state.datastore()).await.unwrap();
    let cart = repo.fetch_cart(UT_USR_ID).await.unwrap();
    assert_eq!(cart.lines.len(), 2);
    let target = StockTarget::Sku { sku_id: 801 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 1));
}

#[tokio::test]
async fn retrieve_own_orders_only() {
    let shr_state = ut_setup_seeded().await;
    let first = ut_direct_order_13000(&shr_state).await;
    let second = ut_direct_order_13000(&shr_state).await;
    assert_ne!(first.order_number, second.order_number);

    let uc = RetrieveOrderUseCase {
        repo: app_repo_order(shr_state.datastore()).await.unwrap(),
        usr_id: UT_OTHER_USR_ID,
    };
    let result = uc.execute(first.order_id).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::OrderNotFound);
    let uc = RetrieveOrderUseCase {
        repo: app_repo_order(shr_state.datastore()).await.unwrap(),
        usr_id: UT_OTHER_USR_ID,
    };
    assert!(uc.list().await.unwrap().is_empty());
    let uc = RetrieveOrderUseCase {
        repo: app_repo_order(shr_state.datastore()).await.unwrap(),
        usr_id: UT_USR_ID,
    };
    let orders = uc.list().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders[0].created_at >= orders[1].created_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn direct_orders_race_for_last_unit() {
    let shr_state = ut_setup_seeded().await;
    let mut handles = Vec::new();
    for _ in 0..6 {
        let uc = ut_create_order_uc(&shr_state, UT_USR_ID).await;
        let data = OrderCreateDirectReqDto {
            product_id: 80,
            sku_id: Some(802),
            quantity: 1,
            address_id: UT_ADDR_ID,
            pay_method: PaymentMethod::Card,
            coupon_id: None,
            memo: None,
        };
        handles.push(tokio::spawn(uc.direct(data)));
    }
    let mut created = Vec::new();
    for h in handles {
        match h.await.unwrap() {
            Ok(o) => created.push(o),
            Err(e) => assert_eq!(e.code, AppErrorCode::InsufficientStock),
        }
    }
    assert_eq!(created.len(), 1);
    let target = StockTarget::Sku { sku_id: 802 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 1));
    let uc = RetrieveOrderUseCase {
        repo: app_repo_order(shr_state.datastore()).await.unwrap(),
        usr_id: UT_USR_ID,
    };
    let orders = uc.list().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, created[0].order_id);
}
