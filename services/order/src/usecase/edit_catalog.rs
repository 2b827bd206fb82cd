use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::error::AppError;
use crate::model::{AddressModel, CouponModel, ProductModel, ProductModelSet};
use crate::repository::{AbsAddressRepo, AbsCouponRepo, AbsProductRepo};

// entities maintained by collaborators (seller catalog, promotion,
// address book), saved here only after validation

pub struct EditProductUseCase {
    pub repo: Box<dyn AbsProductRepo>,
    pub logctx: Arc<AppLogContext>,
    pub seller_id: u64,
}

pub struct DefineCouponUseCase {
    pub repo: Box<dyn AbsCouponRepo>,
}

pub struct SaveAddressUseCase {
    pub repo: Box<dyn AbsAddressRepo>,
    pub usr_id: u64,
}

impl EditProductUseCase {
    pub async fn execute(self, items: Vec<ProductModel>) -> DefaultResult<(), AppError> {
        if items.is_empty() {
            return Err(AppError {
                code: AppErrorCode::EmptyInputData,
                detail: Some("products".to_string()),
            });
        }
        if let Some(p) = items.iter().find(|p| p.seller_id != self.seller_id) {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("product:{}, seller:{}", p.id, p.seller_id)),
            });
        }
        items.iter().try_for_each(ProductModel::validate)?;
        let num = items.len();
        self.repo.save(ProductModelSet { items }).await?;
        let logctx = &self.logctx;
        app_log_event!(logctx, AppLogLevel::INFO, "seller:{}, num-saved:{num}", self.seller_id);
        Ok(())
    }
}

impl DefineCouponUseCase {
    pub async fn execute(self, coupon: CouponModel) -> DefaultResult<(), AppError> {
        coupon.validate()?;
        self.repo.save_coupon(coupon).await
    }
}

impl SaveAddressUseCase {
    pub async fn execute(self, addr: AddressModel) -> DefaultResult<(), AppError> {
        addr.check_owner(self.usr_id)?;
        addr.validate()?;
        self.repo.save(addr).await
    }
}
