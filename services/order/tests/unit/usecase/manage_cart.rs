use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use marketplace_order::api::dto::{CartLineAddReqDto, CartMultiAddReqDto, CartSelectionReqDto};
use marketplace_order::model::{ProductModelSet, StockTarget};
use marketplace_order::repository::{app_repo_cart, app_repo_product, app_repo_stock};
use marketplace_order::usecase::{
    AddCartLineUseCase, ModifyCartLineUseCase, RetrieveCartUseCase, StockLedgerUseCase,
};
use marketplace_order::AppSharedState;

use super::{ut_cart_add, ut_setup_seeded, ut_stock_of, UT_OTHER_USR_ID, UT_SELLER_ID, UT_USR_ID};
use crate::model::ut_product_with_skus;

async fn ut_add_uc(shr_state: &AppSharedState, usr_id: u64) -> AddCartLineUseCase {
    let ds = shr_state.datastore();
    AddCartLineUseCase {
        repo_cart: app_repo_cart(ds.clone()).await.unwrap(),
        repo_product: app_repo_product(ds).await.unwrap(),
        id_gen: shr_state.id_generator(),
        logctx: shr_state.log_context().clone(),
        usr_id,
    }
}

async fn ut_modify_uc(shr_state: &AppSharedState, usr_id: u64) -> ModifyCartLineUseCase {
    ModifyCartLineUseCase {
        repo: app_repo_cart(shr_state.datastore()).await.unwrap(),
        logctx: shr_state.log_context().clone(),
        usr_id,
    }
}

async fn ut_retrieve_uc(shr_state: &AppSharedState, usr_id: u64) -> RetrieveCartUseCase {
    let ds = shr_state.datastore();
    RetrieveCartUseCase {
        repo_cart: app_repo_cart(ds.clone()).await.unwrap(),
        repo_product: app_repo_product(ds.clone()).await.unwrap(),
        repo_stock: app_repo_stock(ds).await.unwrap(),
        usr_id,
    }
}

#[tokio::test]
async fn add_reserves_stock() {
    let shr_state = ut_setup_seeded().await;
    let line_id = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 2).await;
    let target = StockTarget::Sku { sku_id: 801 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 2));
    // same selection merged into the existing line
    let merged = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 3).await;
    assert_eq!(merged, line_id);
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 5));
    // product without option is checked but never reserved
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 90, None, 3).await;
    let target = StockTarget::Single { product_id: 90 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (4, 0));

    let cart = ut_retrieve_uc(&shr_state, UT_USR_ID).await.execute().await.unwrap();
    assert_eq!(cart.lines.len(), 2);
    assert_eq!(cart.total_amount, Decimal::from(18000 * 5 + 10000 * 3));
    assert!(cart.lines.iter().all(|l| l.stock_available && !l.price_changed));
}

#[tokio::test]
async fn add_invalid_selection() {
    let shr_state = ut_setup_seeded().await;
    let cases = [
        (80, None, 1, AppErrorCode::InvalidSelection),
        (90, Some(801), 1, AppErrorCode::InvalidSelection),
        (80, Some(809), 1, AppErrorCode::SkuNotExist),
        (81, None, 1, AppErrorCode::ProductNotExist),
        (80, Some(801), 0, AppErrorCode::InvalidInput),
        (80, Some(802), 2, AppErrorCode::InsufficientStock),
        (90, None, 5, AppErrorCode::InsufficientStock),
    ];
    for (product_id, sku_id, quantity, expect) in cases {
        let uc = ut_add_uc(&shr_state, UT_USR_ID).await;
        let data = CartLineAddReqDto {
            product_id,
            sku_id,
            quantity,
            price_override: None,
        };
        let result = uc.execute(data).await;
        assert_eq!(result.unwrap_err().code, expect);
    }
    let cart = ut_retrieve_uc(&shr_state, UT_USR_ID).await.execute().await.unwrap();
    assert!(cart.lines.is_empty());
    let target = StockTarget::Sku { sku_id: 802 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 0));
}

#[tokio::test]
async fn add_with_price_override() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_add_uc(&shr_state, UT_USR_ID).await;
    let data = CartLineAddReqDto {
        product_id: 80,
        sku_id: Some(801),
        quantity: 1,
        price_override: Some(Decimal::from(-1)),
    };
    let result = uc.execute(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);

    let uc = ut_add_uc(&shr_state, UT_USR_ID).await;
    let data = CartLineAddReqDto {
        product_id: 80,
        sku_id: Some(801),
        quantity: 1,
        price_override: Some(Decimal::from(16500)),
    };
    uc.execute(data).await.unwrap();
    let cart = ut_retrieve_uc(&shr_state, UT_USR_ID).await.execute().await.unwrap();
    let line = &cart.lines[0];
    assert_eq!(line.price, Decimal::from(16500));
    assert_eq!(line.current_price, Some(Decimal::from(18000)));
    assert!(line.price_changed);
}

#[tokio::test]
async fn add_multi_partial_failure() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_add_uc(&shr_state, UT_USR_ID).await;
    let data = CartMultiAddReqDto {
        product_id: 80,
        selections: vec![
            CartSelectionReqDto {
                sku_id: Some(801),
                quantity: 1,
            },
            CartSelectionReqDto {
                sku_id: Some(802),
                quantity: 2,
            },
            CartSelectionReqDto {
                sku_id: Some(809),
                quantity: 1,
            },
        ],
    };
    let out = uc.execute_multi(data).await.unwrap();
    assert_eq!(out.len(), 3);
    assert!(out[0].line_id.is_some());
    assert!(out[0].error.is_none());
    let e = out[1].error.as_ref().unwrap();
    assert_eq!(e.code.as_str(), "InsufficientStock");
    let e = out[2].error.as_ref().unwrap();
    assert_eq!(e.code.as_str(), "SkuNotExist");
    // succeeded selection is kept
    let cart = ut_retrieve_uc(&shr_state, UT_USR_ID).await.execute().await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].sku_id, Some(801));

    let uc = ut_add_uc(&shr_state, UT_USR_ID).await;
    let data = CartMultiAddReqDto {
        product_id: 80,
        selections: Vec::new(),
    };
    let result = uc.execute_multi(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
}

#[tokio::test]
async fn modify_lines() {
    let shr_state = ut_setup_seeded().await;
    let line_a = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 2).await;
    let line_b = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(802), 1).await;
    let target_a = StockTarget::Sku { sku_id: 801 };
    let target_b = StockTarget::Sku { sku_id: 802 };

    let uc = ut_modify_uc(&shr_state, UT_USR_ID).await;
    uc.update(line_a, 6).await.unwrap();
    assert_eq!(ut_stock_of(&shr_state, target_a).await, (50, 6));
    let uc = ut_modify_uc(&shr_state, UT_USR_ID).await;
    uc.update(line_a, 1).await.unwrap();
    assert_eq!(ut_stock_of(&shr_state, target_a).await, (50, 1));
    let uc = ut_modify_uc(&shr_state, UT_USR_ID).await;
    let result = uc.update(line_b, 2).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InsufficientStock);
    assert_eq!(ut_stock_of(&shr_state, target_b).await, (1, 1));

    // lines of other users are invisible
    let uc = ut_modify_uc(&shr_state, UT_OTHER_USR_ID).await;
    let result = uc.remove(line_b).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::CartLineNotExist);

    let uc = ut_modify_uc(&shr_state, UT_USR_ID).await;
    uc.remove(line_b).await.unwrap();
    assert_eq!(ut_stock_of(&shr_state, target_b).await, (1, 0));
    let uc = ut_modify_uc(&shr_state, UT_USR_ID).await;
    let result = uc.remove(line_b).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::CartLineNotExist);

    let _ = ut_cart_add(&shr_state, UT_USR_ID, 90, None, 1).await;
    let uc = ut_modify_uc(&shr_state, UT_USR_ID).await;
    let removed = uc.clear().await.unwrap();
    assert_eq!(removed.len(), 2);
    assert!(removed.contains(&line_a));
    assert_eq!(ut_stock_of(&shr_state, target_a).await, (50, 0));
    let cart = ut_retrieve_uc(&shr_state, UT_USR_ID).await.execute().await.unwrap();
    assert!(cart.lines.is_empty());
    assert_eq!(cart.total_amount, Decimal::ZERO);
}

#[tokio::test]
async fn retrieve_flags_price_and_stock() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 2).await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 90, None, 3).await;
    // seller lowers the price
    let product = ut_product_with_skus(
        80,
        UT_SELLER_ID,
        &[(801, "M / white", 17500), (802, "L / navy", 19500)],
    );
    let repo = app_repo_product(shr_state.datastore()).await.unwrap();
    repo.save(ProductModelSet { items: vec![product] }).await.unwrap();
    // units of the single-option product sold elsewhere
    let ledger = StockLedgerUseCase {
        repo: app_repo_stock(shr_state.datastore()).await.unwrap(),
        logctx: shr_state.log_context().clone(),
    };
    ledger
        .consume(StockTarget::Single { product_id: 90 }, 2)
        .await
        .unwrap();

    let cart = ut_retrieve_uc(&shr_state, UT_USR_ID).await.execute().await.unwrap();
    assert_eq!(cart.owner, UT_USR_ID);
    let line = cart.lines.iter().find(|l| l.product_id == 80).unwrap();
    assert_eq!(line.price, Decimal::from(18000));
    assert_eq!(line.current_price, Some(Decimal::from(17500)));
    assert!(line.price_changed);
    assert!(line.stock_available);
    let line = cart.lines.iter().find(|l| l.product_id == 90).unwrap();
    assert!(!line.price_changed);
    assert!(!line.stock_available);
    // amount of the cart follows prices captured at the time of adding
    assert_eq!(cart.total_amount, Decimal::from(18000 * 2 + 10000 * 3));
}

#[tokio::test]
async fn carts_isolated_per_user() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 2).await;
    let _ = ut_cart_add(&shr_state, UT_OTHER_USR_ID, 80, Some(801), 4).await;
    let target = StockTarget::Sku { sku_id: 801 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 6));
    let cart = ut_retrieve_uc(&shr_state, UT_OTHER_USR_ID).await.execute().await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shoppers_race_for_last_unit() {
    let shr_state = ut_setup_seeded().await;
    let mut handles = Vec::new();
    for usr_id in 200..210u64 {
        let uc = ut_add_uc(&shr_state, usr_id).await;
        let data = CartLineAddReqDto {
            product_id: 80,
            sku_id: Some(802),
            quantity: 1,
            price_override: None,
        };
        handles.push(tokio::spawn(uc.execute(data)));
    }
    let mut num_ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_line_id) => num_ok += 1,
            Err(e) => assert_eq!(e.code, AppErrorCode::InsufficientStock),
        }
    }
    assert_eq!(num_ok, 1);
    let target = StockTarget::Sku { sku_id: 802 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 1));
    // only the winner holds the unit in the cart
    let mut num_lines = 0;
    for usr_id in 200..210u64 {
        let repo = app_repo_cart(shr_state.datastore()).await.unwrap();
        num_lines += repo.fetch_cart(usr_id).await.unwrap().lines.len();
    }
    assert_eq!(num_lines, 1);
}
