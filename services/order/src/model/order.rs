use std::result::Result as DefaultResult;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ecommerce_common::config::AppCheckoutCfg;
use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

use super::{
    CouponModel, ProductModel, StockLedgerOp, StockLedgerReq, StockTarget, UserCouponModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    VirtualAccount,
    MobilePhone,
    EasyPay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingSnapshotModel {
    pub recipient: String,
    pub phone: String,
    pub postcode: String,
    pub address1: String,
    pub address2: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineModel {
    pub id: u64,
    pub product_id: u64,
    pub sku_id: Option<u64>,
    pub product_name: String,
    pub qty: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCouponModel {
    pub coupon_id: u64,
    pub grant_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderModel {
    pub id: u64,
    pub number: String,
    pub owner: u64,
    pub shipping: ShippingSnapshotModel,
    pub lines: Vec<OrderLineModel>,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub delivery_fee: Decimal,
    pub final_amount: Decimal,
    pub status: OrderStatus,
    pub pay_status: PaymentStatus,
    pub pay_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub coupon: Option<OrderCouponModel>,
    pub paid_at: Option<DateTime<FixedOffset>>,
    pub refunded_amount: Option<Decimal>,
    pub memo: Option<String>,
    // reason of the latest failure, cancellation or refund
    pub reason: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
pub struct OrderPricingPolicy {
    pub free_delivery_threshold: Decimal,
    pub delivery_fee: Decimal,
    pub amount_tolerance: Decimal,
}

pub struct OrderCreateArgs {
    pub id: u64,
    pub number: String,
    pub owner: u64,
    pub shipping: ShippingSnapshotModel,
    pub pay_method: PaymentMethod,
    pub memo: Option<String>,
    pub now: DateTime<FixedOffset>,
}

macro_rules! impl_status_str {
    ($typ:ty, $($variant:ident => $label:literal),+) => {
        impl $typ {
            pub fn as_str(&self) -> &'static str {
                match self { $(Self::$variant => $label),+ }
            }
        }
        impl FromStr for $typ {
            type Err = AppError;
            fn from_str(s: &str) -> DefaultResult<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _others => Err(AppError {
                        code: AppErrorCode::InvalidInput,
                        detail: Some(format!("{}:{}", stringify!($typ), s)),
                    }),
                }
            }
        }
    };
}

impl_status_str!(OrderStatus,
    Pending => "PENDING", Confirmed => "CONFIRMED", Preparing => "PREPARING",
    Shipped => "SHIPPED", Delivered => "DELIVERED", Cancelled => "CANCELLED",
    Refunded => "REFUNDED"
);
impl_status_str!(PaymentStatus,
    Pending => "PENDING", Completed => "COMPLETED", Failed => "FAILED",
    Refunded => "REFUNDED", Cancelled => "CANCELLED"
);
impl_status_str!(PaymentMethod,
    Card => "card", BankTransfer => "bank_transfer", VirtualAccount => "virtual_account",
    MobilePhone => "mobile_phone", EasyPay => "easy_pay"
);

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    fn next_fulfillment(&self) -> Option<Self> {
        match self {
            Self::Confirmed => Some(Self::Preparing),
            Self::Preparing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            _others => None,
        }
    }
}

impl From<&AppCheckoutCfg> for OrderPricingPolicy {
    fn from(value: &AppCheckoutCfg) -> Self {
        Self {
            free_delivery_threshold: Decimal::from(value.free_delivery_threshold),
            delivery_fee: Decimal::from(value.delivery_fee),
            amount_tolerance: Decimal::from(value.amount_tolerance),
        }
    }
}

impl OrderPricingPolicy {
    pub fn delivery_fee_for(&self, total: Decimal) -> Decimal {
        if total >= self.free_delivery_threshold {
            Decimal::ZERO
        } else {
            self.delivery_fee
        }
    }
}

impl OrderLineModel {
    pub fn new(
        id: u64,
        product: &ProductModel,
        sku_id: Option<u64>,
        qty: u32,
        unit_price: Decimal,
    ) -> Self {
        let label = sku_id.and_then(|sid| product.skus.iter().find(|s| s.id == sid));
        let product_name = match label {
            Some(s) => format!("{} / {}", product.name, s.label),
            None => product.name.clone(),
        };
        Self {
            id,
            product_id: product.id,
            sku_id,
            product_name,
            qty,
            unit_price,
            total_price: unit_price * Decimal::from(qty),
        }
    }

    pub fn target(&self) -> StockTarget {
        StockTarget::resolve(self.product_id, self.sku_id)
    }
}

impl OrderModel {
    /// Price the order lines, apply the coupon grant if given and mark
    /// it used. The caller persists the order and the grant together.
    pub fn try_build(
        args: OrderCreateArgs,
        lines: Vec<OrderLineModel>,
        coupon: Option<(&CouponModel, &mut UserCouponModel)>,
        policy: &OrderPricingPolicy,
    ) -> DefaultResult<Self, AppError> {
        if lines.is_empty() {
            return Err(AppError {
                code: AppErrorCode::EmptyCart,
                detail: Some(format!("owner:{}", args.owner)),
            });
        }
        let total_amount = lines.iter().map(|l| l.total_price).sum::<Decimal>();
        let (discount_amount, coupon) = if let Some((c, grant)) = coupon {
            c.check_usable(total_amount, args.now)?;
            grant.consume(args.now)?;
            let applied = OrderCouponModel {
                coupon_id: c.id,
                grant_id: grant.id,
            };
            (c.discount_for(total_amount), Some(applied))
        } else {
            (Decimal::ZERO, None)
        };
        let delivery_fee = policy.delivery_fee_for(total_amount);
        let final_amount = total_amount - discount_amount + delivery_fee;
        Ok(Self {
            id: args.id,
            number: args.number,
            owner: args.owner,
            shipping: args.shipping,
            lines,
            total_amount,
            discount_amount,
            delivery_fee,
            final_amount,
            status: OrderStatus::Pending,
            pay_status: PaymentStatus::Pending,
            pay_method: args.pay_method,
            payment_id: None,
            coupon,
            paid_at: None,
            refunded_amount: None,
            memo: args.memo,
            reason: None,
            created_at: args.now,
            updated_at: args.now,
        })
    } // end of fn try_build

    fn status_error(&self, code: AppErrorCode, action: &str) -> AppError {
        let detail = format!(
            "order:{}, action:{}, status:{}, payment:{}",
            self.id,
            action,
            self.status.as_str(),
            self.pay_status.as_str()
        );
        AppError {
            code,
            detail: Some(detail),
        }
    }

    /// Stock reserved for the order, still waiting for payment.
    pub fn holds_reservation(&self) -> bool {
        self.status == OrderStatus::Pending && self.pay_status == PaymentStatus::Pending
    }

    pub fn stock_reqs(&self, op: StockLedgerOp) -> Vec<StockLedgerReq> {
        self.lines
            .iter()
            .map(|l| StockLedgerReq {
                target: l.target(),
                qty: l.qty,
                op,
            })
            .collect()
    }

    pub fn approve(
        &mut self,
        payment_id: String,
        paid: Decimal,
        tolerance: Decimal,
        now: DateTime<FixedOffset>,
    ) -> DefaultResult<(), AppError> {
        if self.pay_status == PaymentStatus::Completed {
            return Err(self.status_error(AppErrorCode::AlreadyCompleted, "approve"));
        }
        if !self.holds_reservation() {
            return Err(self.status_error(AppErrorCode::InvalidStatusTransition, "approve"));
        }
        if (self.final_amount - paid).abs() > tolerance {
            let detail = format!(
                "order:{}, expect:{}, paid:{}",
                self.id, self.final_amount, paid
            );
            return Err(AppError {
                code: AppErrorCode::AmountMismatch,
                detail: Some(detail),
            });
        }
        self.pay_status = PaymentStatus::Completed;
        self.status = OrderStatus::Confirmed;
        self.payment_id = Some(payment_id);
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self, reason: String, now: DateTime<FixedOffset>) -> DefaultResult<(), AppError> {
        if self.pay_status == PaymentStatus::Completed {
            return Err(self.status_error(AppErrorCode::AlreadyCompleted, "fail"));
        }
        if !self.holds_reservation() {
            return Err(self.status_error(AppErrorCode::InvalidStatusTransition, "fail"));
        }
        self.pay_status = PaymentStatus::Failed;
        self.status = OrderStatus::Cancelled;
        self.reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    pub fn refund(
        &mut self,
        amount: Decimal,
        reason: String,
        now: DateTime<FixedOffset>,
    ) -> DefaultResult<(), AppError> {
        if self.pay_status != PaymentStatus::Completed {
            return Err(self.status_error(AppErrorCode::NotCompleted, "refund"));
        }
        if amount <= Decimal::ZERO {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("order:{}, refund:{}", self.id, amount)),
            });
        }
        if amount > self.final_amount {
            let detail = format!(
                "order:{}, refund:{}, paid:{}",
                self.id, amount, self.final_amount
            );
            return Err(AppError {
                code: AppErrorCode::RefundExceedsPaid,
                detail: Some(detail),
            });
        }
        self.pay_status = PaymentStatus::Refunded;
        self.status = OrderStatus::Refunded;
        self.refunded_amount = Some(amount);
        self.reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Returns payment status prior to the cancellation, which tells
    /// whether the stock should be released or restored.
    pub fn cancel(
        &mut self,
        reason: String,
        now: DateTime<FixedOffset>,
    ) -> DefaultResult<PaymentStatus, AppError> {
        if self.status.is_terminal() {
            return Err(self.status_error(AppErrorCode::NotCancellable, "cancel"));
        }
        let prev = self.pay_status;
        self.status = OrderStatus::Cancelled;
        self.pay_status = PaymentStatus::Cancelled;
        self.reason = Some(reason);
        self.updated_at = now;
        Ok(prev)
    }

    pub fn advance_fulfillment(
        &mut self,
        next: OrderStatus,
        now: DateTime<FixedOffset>,
    ) -> DefaultResult<(), AppError> {
        if self.status.next_fulfillment() == Some(next) {
            self.status = next;
            self.updated_at = now;
            Ok(())
        } else {
            let action = format!("advance-to-{}", next.as_str());
            Err(self.status_error(AppErrorCode::InvalidStatusTransition, action.as_str()))
        }
    }
} // end of impl OrderModel
