use chrono::Duration;
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use marketplace_order::model::{AddressModel, CouponDiscountMode};
use marketplace_order::repository::{app_repo_address, app_repo_coupon, app_repo_product};
use marketplace_order::usecase::{DefineCouponUseCase, EditProductUseCase, SaveAddressUseCase};
use marketplace_order::AppSharedState;

use super::{ut_setup_seeded, UT_OTHER_USR_ID, UT_SELLER_ID, UT_USR_ID};
use crate::model::{ut_coupon_flat, ut_product_single, ut_product_with_skus};

async fn ut_product_uc(shr_state: &AppSharedState, seller_id: u64) -> EditProductUseCase {
    EditProductUseCase {
        repo: app_repo_product(shr_state.datastore()).await.unwrap(),
        logctx: shr_state.log_context().clone(),
        seller_id,
    }
}

#[tokio::test]
async fn edit_products() {
    let shr_state = ut_setup_seeded().await;
    let uc = ut_product_uc(&shr_state, UT_SELLER_ID).await;
    let items = vec![
        ut_product_single(91, UT_SELLER_ID, 2500),
        ut_product_with_skus(92, UT_SELLER_ID, &[(921, "250ml", 890), (922, "500ml", 1490)]),
    ];
    uc.execute(items).await.unwrap();
    let repo = app_repo_product(shr_state.datastore()).await.unwrap();
    let ms = repo.fetch(vec![91, 92]).await.unwrap();
    assert_eq!(ms.items.len(), 2);
    assert_eq!(ms.find(92).unwrap().skus.len(), 2);

    let uc = ut_product_uc(&shr_state, UT_SELLER_ID).await;
    let result = uc.execute(Vec::new()).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::EmptyInputData);
}

#[tokio::test]
async fn edit_products_rejected() {
    let shr_state = ut_setup_seeded().await;
    // product of another seller
    let uc = ut_product_uc(&shr_state, UT_SELLER_ID).await;
    let items = vec![
        ut_product_single(91, UT_SELLER_ID, 2500),
        ut_product_single(93, 4, 2500),
    ];
    let result = uc.execute(items).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
    // single-option product carrying SKUs
    let mut invalid = ut_product_with_skus(94, UT_SELLER_ID, &[(941, "S", 300)]);
    invalid.single = true;
    let uc = ut_product_uc(&shr_state, UT_SELLER_ID).await;
    let result = uc.execute(vec![invalid]).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
    // nothing saved
    let repo = app_repo_product(shr_state.datastore()).await.unwrap();
    let ms = repo.fetch(vec![91, 93, 94]).await.unwrap();
    assert!(ms.items.is_empty());
}

#[tokio::test]
async fn define_coupon() {
    let shr_state = ut_setup_seeded().await;
    let mut coupon = ut_coupon_flat(45, 15, 20000);
    coupon.mode = CouponDiscountMode::Percent;
    coupon.discount_max = Some(Decimal::from(5000));
    let uc = DefineCouponUseCase {
        repo: app_repo_coupon(shr_state.datastore()).await.unwrap(),
    };
    uc.execute(coupon.clone()).await.unwrap();
    let repo = app_repo_coupon(shr_state.datastore()).await.unwrap();
    let saved = repo.fetch_coupon(45).await.unwrap();
    assert_eq!(saved, coupon);

    let mut invalid = ut_coupon_flat(46, 2000, 0);
    invalid.valid_to = invalid.valid_from - Duration::days(1);
    let uc = DefineCouponUseCase {
        repo: app_repo_coupon(shr_state.datastore()).await.unwrap(),
    };
    let result = uc.execute(invalid).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
    let mut invalid = ut_coupon_flat(47, 120, 0);
    invalid.mode = CouponDiscountMode::Percent;
    let uc = DefineCouponUseCase {
        repo: app_repo_coupon(shr_state.datastore()).await.unwrap(),
    };
    let result = uc.execute(invalid).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
}

#[tokio::test]
async fn save_address() {
    let shr_state = ut_setup_seeded().await;
    let addr = AddressModel {
        id: 3303,
        usr_id: UT_USR_ID,
        recipient: "Jeanette".to_string(),
        phone: "0912-345-678".to_string(),
        postcode: "40341".to_string(),
        address1: "No. 99, Sec. 2, Taiwan Blvd.".to_string(),
        address2: Some("8F".to_string()),
    };
    let uc = SaveAddressUseCase {
        repo: app_repo_address(shr_state.datastore()).await.unwrap(),
        usr_id: UT_USR_ID,
    };
    uc.execute(addr.clone()).await.unwrap();
    let repo = app_repo_address(shr_state.datastore()).await.unwrap();
    assert_eq!(repo.fetch(3303).await.unwrap(), addr);

    let uc = SaveAddressUseCase {
        repo: app_repo_address(shr_state.datastore()).await.unwrap(),
        usr_id: UT_OTHER_USR_ID,
    };
    let result = uc.execute(addr.clone()).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::AddressNotFound);

    let mut invalid = addr;
    invalid.id = 3304;
    invalid.address1 = "  ".to_string();
    let uc = SaveAddressUseCase {
        repo: app_repo_address(shr_state.datastore()).await.unwrap(),
        usr_id: UT_USR_ID,
    };
    let result = uc.execute(invalid).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::EmptyInputData);
}
