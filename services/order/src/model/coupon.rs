use std::result::Result as DefaultResult;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rust_decimal::{Decimal, RoundingStrategy};

use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponDiscountMode {
    Amount,
    Percent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouponModel {
    pub id: u64,
    pub name: String,
    pub mode: CouponDiscountMode,
    pub discount: Decimal,
    // cap of the discount, only applied in percent mode
    pub discount_max: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub valid_from: DateTime<FixedOffset>,
    pub valid_to: DateTime<FixedOffset>,
}

/// Grant of a coupon to a specific user, usable once.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCouponModel {
    pub id: u64,
    pub usr_id: u64,
    pub coupon_id: u64,
    pub used: bool,
    pub used_at: Option<DateTime<FixedOffset>>,
}

impl CouponDiscountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Percent => "percent",
        }
    }
}

impl FromStr for CouponDiscountMode {
    type Err = AppError;
    fn from_str(s: &str) -> DefaultResult<Self, Self::Err> {
        match s {
            "amount" => Ok(Self::Amount),
            "percent" => Ok(Self::Percent),
            _others => Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("coupon-mode:{s}")),
            }),
        }
    }
}

impl CouponModel {
    pub fn validate(&self) -> DefaultResult<(), AppError> {
        let pct_limit = Decimal::ONE_HUNDRED;
        let invalid = self.discount <= Decimal::ZERO
            || self.min_order_amount.is_sign_negative()
            || self.valid_from >= self.valid_to
            || (self.mode == CouponDiscountMode::Percent && self.discount > pct_limit)
            || self.discount_max.map_or(false, |m| m <= Decimal::ZERO);
        if invalid {
            Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("coupon:{}", self.id)),
            })
        } else {
            Ok(())
        }
    }

    pub fn check_usable(
        &self,
        total: Decimal,
        now: DateTime<FixedOffset>,
    ) -> DefaultResult<(), AppError> {
        if now < self.valid_from || now > self.valid_to {
            let detail = format!(
                "coupon:{}, from:{}, to:{}",
                self.id,
                self.valid_from.to_rfc3339(),
                self.valid_to.to_rfc3339()
            );
            Err(AppError {
                code: AppErrorCode::CouponExpired,
                detail: Some(detail),
            })
        } else if total < self.min_order_amount {
            let detail = format!(
                "coupon:{}, total:{}, minimum:{}",
                self.id, total, self.min_order_amount
            );
            Err(AppError {
                code: AppErrorCode::MinOrderAmountNotMet,
                detail: Some(detail),
            })
        } else {
            Ok(())
        }
    }

    /// The discount never exceeds the order total.
    pub fn discount_for(&self, total: Decimal) -> Decimal {
        let amount = match self.mode {
            CouponDiscountMode::Amount => self.discount,
            CouponDiscountMode::Percent => {
                let raw = (total * self.discount / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(0, RoundingStrategy::ToNegativeInfinity);
                match self.discount_max {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
        };
        amount.min(total)
    }
} // end of impl CouponModel

impl UserCouponModel {
    pub fn consume(&mut self, now: DateTime<FixedOffset>) -> DefaultResult<(), AppError> {
        if self.used {
            Err(AppError {
                code: AppErrorCode::CouponNotOwned,
                detail: Some(format!("grant:{}, used", self.id)),
            })
        } else {
            self.used = true;
            self.used_at = Some(now);
            Ok(())
        }
    }

    pub fn reset(&mut self) {
        self.used = false;
        self.used_at = None;
    }
}
