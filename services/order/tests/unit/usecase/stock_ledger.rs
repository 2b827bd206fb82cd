use ecommerce_common::error::AppErrorCode;
use marketplace_order::api::dto::StockLevelEditReqDto;
use marketplace_order::model::{ProductModelSet, StockTarget};
use marketplace_order::repository::{app_repo_product, app_repo_stock};
use marketplace_order::usecase::{StockLedgerUseCase, StockLevelEditUseCase};
use marketplace_order::AppSharedState;

use super::{ut_setup_seeded, ut_stock_of, UT_SELLER_ID};
use crate::model::ut_product_with_skus;

async fn ut_ledger_uc(shr_state: &AppSharedState) -> StockLedgerUseCase {
    StockLedgerUseCase {
        repo: app_repo_stock(shr_state.datastore()).await.unwrap(),
        logctx: shr_state.log_context().clone(),
    }
}

#[tokio::test]
async fn reserve_consume_restore() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_ledger_uc(&shr_state).await;
    let target = StockTarget::Sku { sku_id: 801 };
    assert!(uc.check_available(target, 50).await.unwrap());
    assert!(!uc.check_available(target, 51).await.unwrap());

    let s = uc.reserve(target, 3).await.unwrap();
    assert_eq!((s.total, s.reserved, s.available), (50, 3, 47));
    let s = uc.release(target, 1).await.unwrap();
    assert_eq!(s.reserved, 2);
    let s = uc.consume(target, 2).await.unwrap();
    assert_eq!((s.total, s.reserved), (48, 0));
    let s = uc.restore(target, 2).await.unwrap();
    assert_eq!((s.total, s.reserved), (50, 0));
    assert_eq!(ut_stock_of(&shr_state, target).await, (50, 0));
}

#[tokio::test]
async fn reserve_insufficient_unchanged() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_ledger_uc(&shr_state).await;
    let target = StockTarget::Sku { sku_id: 802 };
    uc.reserve(target, 1).await.unwrap();
    let result = uc.reserve(target, 1).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InsufficientStock);
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 1));
    // consuming more than the total fails as well
    let result = uc.consume(target, 2).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InsufficientStock);
    assert_eq!(ut_stock_of(&shr_state, target).await, (1, 1));
}

#[tokio::test]
async fn unknown_target() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_ledger_uc(&shr_state).await;
    let result = uc.reserve(StockTarget::Sku { sku_id: 9999 }, 1).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::SkuNotExist);
    let result = uc
        .check_available(StockTarget::Single { product_id: 91 }, 1)
        .await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::ProductNotExist);
}

async fn ut_edit_uc(shr_state: &AppSharedState) -> StockLevelEditUseCase {
    let ds = shr_state.datastore();
    StockLevelEditUseCase {
        repo_stock: app_repo_stock(ds.clone()).await.unwrap(),
        repo_product: app_repo_product(ds).await.unwrap(),
        logctx: shr_state.log_context().clone(),
    }
}

#[tokio::test]
async fn edit_register_and_add() {
    let shr_state = ut_setup_seeded().await;
    // seller adds a new option to the product, without stock yet
    let product = ut_product_with_skus(
        80,
        UT_SELLER_ID,
        &[(801, "M / white", 18000), (802, "L / navy", 19500), (803, "XL / navy", 19500)],
    );
    let repo = app_repo_product(shr_state.datastore()).await.unwrap();
    repo.save(ProductModelSet { items: vec![product] }).await.unwrap();
    let repo = app_repo_stock(shr_state.datastore()).await.unwrap();
    let saved = repo
        .fetch(vec![StockTarget::Sku { sku_id: 803 }])
        .await
        .unwrap();
    assert!(saved.items.is_empty());

    let uc = ut_edit_uc(&shr_state).await;
    let data = vec![
        StockLevelEditReqDto {
            product_id: 80,
            sku_id: Some(801),
            qty_add: 7,
        },
        StockLevelEditReqDto {
            product_id: 90,
            sku_id: None,
            qty_add: 6,
        },
        StockLevelEditReqDto {
            product_id: 80,
            sku_id: Some(803),
            qty_add: 12,
        },
    ];
    let out = uc.execute(data).await.unwrap();
    assert_eq!(out.len(), 3);
    let target = StockTarget::Sku { sku_id: 803 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (12, 0));
    let target = StockTarget::Sku { sku_id: 801 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (57, 0));
    let target = StockTarget::Single { product_id: 90 };
    assert_eq!(ut_stock_of(&shr_state, target).await, (10, 0));
}

#[tokio::test]
async fn edit_invalid_input() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_edit_uc(&shr_state).await;
    let result = uc.execute(Vec::new()).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::EmptyInputData);

    let uc = ut_edit_uc(&shr_state).await;
    let data = vec![StockLevelEditReqDto {
        product_id: 1234,
        sku_id: None,
        qty_add: 1,
    }];
    let result = uc.execute(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::ProductNotExist);

    let uc = ut_edit_uc(&shr_state).await;
    let data = vec![StockLevelEditReqDto {
        product_id: 80,
        sku_id: None,
        qty_add: 1,
    }];
    let result = uc.execute(data).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidSelection);
}
