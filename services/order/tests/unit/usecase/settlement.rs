use chrono::{Duration, Local as LocalTime};
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use marketplace_order::repository::{app_repo_order, app_repo_product};
use marketplace_order::usecase::SettlementReplicaUseCase;
use marketplace_order::AppSharedState;

use super::{ut_cart_add, ut_direct_order_13000, ut_payment_uc, ut_setup_seeded, UT_SELLER_ID, UT_USR_ID};

async fn ut_settlement_uc(shr_state: &AppSharedState) -> SettlementReplicaUseCase {
    let ds = shr_state.datastore();
    SettlementReplicaUseCase {
        repo_order: app_repo_order(ds.clone()).await.unwrap(),
        repo_product: app_repo_product(ds).await.unwrap(),
    }
}

#[tokio::test]
async fn paid_orders_in_range() {
    let shr_state = ut_setup_seeded().await;
    let _ = ut_cart_add(&shr_state, UT_USR_ID, 80, Some(801), 1).await;
    let paid = ut_direct_order_13000(&shr_state).await;
    let _pending = ut_direct_order_13000(&shr_state).await;
    let failed = ut_direct_order_13000(&shr_state).await;
    let paysm = ut_payment_uc(&shr_state).await;
    paysm
        .approve(paid.order_id, "tx-20".to_string(), Decimal::from(13000))
        .await
        .unwrap();
    paysm
        .fail(failed.order_id, "declined".to_string())
        .await
        .unwrap();

    let now = LocalTime::now().fixed_offset();
    let uc = ut_settlement_uc(&shr_state).await;
    let out = uc
        .execute(now - Duration::hours(1), now + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    let o = &out[0];
    assert_eq!(o.order_id, paid.order_id);
    assert_eq!(o.order_number, paid.order_number);
    assert_eq!(o.final_amount, Decimal::from(13000));
    assert!(o.paid_at.is_some());
    assert_eq!(o.lines.len(), 1);
    assert_eq!(o.lines[0].seller_id, Some(UT_SELLER_ID));
    assert_eq!(o.lines[0].product_id, 90);
    assert_eq!(o.lines[0].total_price, Decimal::from(10000));

    // time range excludes the payment
    let uc = ut_settlement_uc(&shr_state).await;
    let out = uc
        .execute(now + Duration::hours(1), now + Duration::hours(2))
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn invalid_range() {
    let shr_state = ut_setup_seeded().await;
    let now = LocalTime::now().fixed_offset();
    let uc = ut_settlement_uc(&shr_state).await;
    let result = uc.execute(now, now).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
    let uc = ut_settlement_uc(&shr_state).await;
    let result = uc.execute(now, now - Duration::minutes(5)).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
}
