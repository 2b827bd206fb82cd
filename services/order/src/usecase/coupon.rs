use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use chrono::Local as LocalTime;
use rust_decimal::Decimal;

use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::api::dto::{CouponIssueReqDto, UserCouponDto};
use crate::api::parse_id;
use crate::error::AppError;
use crate::model::UserCouponModel;
use crate::repository::AbsCouponRepo;
use crate::AppIdGenerator;

pub struct IssueCouponUseCase {
    pub repo: Box<dyn AbsCouponRepo>,
    pub id_gen: Arc<AppIdGenerator>,
    pub logctx: Arc<AppLogContext>,
}

pub struct ListUserCouponUseCase {
    pub repo: Box<dyn AbsCouponRepo>,
    pub usr_id: u64,
}

impl IssueCouponUseCase {
    /// returns IDs of the new grants, one grant per user
    pub async fn execute(self, data: CouponIssueReqDto) -> DefaultResult<Vec<u64>, AppError> {
        let coupon = self.repo.fetch_coupon(data.coupon_id).await?;
        let grants = data
            .usr_ids
            .iter()
            .map(|raw| {
                let usr_id = parse_id(raw.as_str())?;
                Ok(UserCouponModel {
                    id: self.id_gen.next_id(),
                    usr_id,
                    coupon_id: coupon.id,
                    used: false,
                    used_at: None,
                })
            })
            .collect::<DefaultResult<Vec<_>, AppError>>()?;
        let ids = grants.iter().map(|g| g.id).collect::<Vec<_>>();
        self.repo.save_grants(grants).await?;
        let logctx = &self.logctx;
        app_log_event!(logctx, AppLogLevel::INFO, "coupon:{}, num-issued:{}", coupon.id, ids.len());
        Ok(ids)
    }
}

impl ListUserCouponUseCase {
    /// Usability and discount are evaluated against the order total
    /// given by the client, the order builder checks them again.
    pub async fn execute(self, order_total: Decimal) -> DefaultResult<Vec<UserCouponDto>, AppError> {
        let grants = self.repo.fetch_grants(self.usr_id).await?;
        let now = LocalTime::now().fixed_offset();
        let mut out = Vec::with_capacity(grants.len());
        for g in grants {
            let coupon = self.repo.fetch_coupon(g.coupon_id).await?;
            let usable = !g.used && coupon.check_usable(order_total, now).is_ok();
            let discount = if usable {
                coupon.discount_for(order_total)
            } else {
                Decimal::ZERO
            };
            out.push(UserCouponDto {
                grant_id: g.id,
                coupon_id: coupon.id,
                name: coupon.name,
                used: g.used,
                used_at: g.used_at,
                usable,
                discount,
            });
        }
        Ok(out)
    }
}
