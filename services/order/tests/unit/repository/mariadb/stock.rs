use ecommerce_common::error::AppErrorCode;
use marketplace_order::model::{StockLedgerOp, StockLedgerReq, StockTarget};
use marketplace_order::repository::app_repo_stock;
use marketplace_order::usecase::StockLedgerUseCase;

use super::{ut_setup_db_seeded, ut_setup_db_state};
use crate::usecase::ut_stock_of;

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn save_fetch_edit_rollback() {
    let seeded = ut_setup_db_seeded().await;
    let shr_state = &seeded.shr_state;
    let repo = app_repo_stock(shr_state.datastore()).await.unwrap();
    let (sku_t, single_t) = (seeded.sku_target(0), seeded.single_target());
    let reqs = vec![
        StockLedgerReq {
            target: sku_t,
            qty: 3,
            op: StockLedgerOp::Reserve,
        },
        StockLedgerReq {
            target: single_t,
            qty: 5,
            op: StockLedgerOp::Consume,
        },
    ];
    let result = repo.try_edit(reqs, |ms, reqs| ms.apply_all(reqs)).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InsufficientStock);
    // the reservation applied before the failure is not committed
    assert_eq!(ut_stock_of(shr_state, sku_t).await, (50, 0));
    assert_eq!(ut_stock_of(shr_state, single_t).await, (4, 0));

    let reqs = vec![
        StockLedgerReq {
            target: sku_t,
            qty: 3,
            op: StockLedgerOp::Reserve,
        },
        StockLedgerReq {
            target: single_t,
            qty: 4,
            op: StockLedgerOp::Consume,
        },
    ];
    let ms = repo
        .try_edit(reqs, |ms, reqs| ms.apply_all(reqs))
        .await
        .unwrap();
    assert_eq!(ms.items.len(), 2);
    assert_eq!(ut_stock_of(shr_state, sku_t).await, (50, 3));
    assert_eq!(ut_stock_of(shr_state, single_t).await, (0, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn fetch_unknown_target() {
    let shr_state = ut_setup_db_state();
    let repo = app_repo_stock(shr_state.datastore()).await.unwrap();
    let sku_id = shr_state.id_generator().next_id();
    let target = StockTarget::Sku { sku_id };
    let ms = repo.fetch(vec![target]).await.unwrap();
    assert!(ms.items.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reservations_race_for_stock() {
    let seeded = ut_setup_db_seeded().await;
    let target = seeded.sku_target(1);
    let mut handles = Vec::new();
    for _ in 0..6 {
        let uc = StockLedgerUseCase {
            repo: app_repo_stock(seeded.shr_state.datastore()).await.unwrap(),
            logctx: seeded.shr_state.log_context().clone(),
        };
        handles.push(tokio::spawn(async move { uc.reserve(target, 1).await }));
    }
    let mut num_ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_v) => {
                num_ok += 1;
            }
            Err(e) => assert_eq!(e.code, AppErrorCode::InsufficientStock),
        }
    }
    assert_eq!(num_ok, 1);
    assert_eq!(ut_stock_of(&seeded.shr_state, target).await, (1, 1));
}
