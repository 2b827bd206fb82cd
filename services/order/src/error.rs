use std::fmt::{Debug, Display, Formatter, Result as DefaultResult};

use ecommerce_common::error::{AppConfidentialityError, AppErrorCode};

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub detail: Option<String>,
}

/// Failure classes callers branch on, e.g. whether a compensating
/// network-cancel towards the payment gateway is worth trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorClass {
    Validation,
    NotFound,
    InsufficientStock,
    CouponInvalid,
    Conflict,
    Gateway,
    Internal,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> DefaultResult {
        let dp = self.detail.as_deref().unwrap_or("none");
        write!(f, "code:{:?}, detail:{}", self.code, dp)
    }
}

impl From<(AppErrorCode, String)> for AppError {
    fn from(value: (AppErrorCode, String)) -> Self {
        Self {
            code: value.0,
            detail: Some(value.1),
        }
    }
}

impl From<AppConfidentialityError> for AppError {
    fn from(value: AppConfidentialityError) -> Self {
        Self {
            code: value.code,
            detail: Some(value.detail),
        }
    }
}

impl AppError {
    pub fn class(&self) -> AppErrorClass {
        match &self.code {
            AppErrorCode::InvalidInput
            | AppErrorCode::EmptyInputData
            | AppErrorCode::InvalidSelection
            | AppErrorCode::EmptyCart
            | AppErrorCode::UnsupportedEvent => AppErrorClass::Validation,
            AppErrorCode::ProductNotExist
            | AppErrorCode::SkuNotExist
            | AppErrorCode::CartLineNotExist
            | AppErrorCode::AddressNotFound
            | AppErrorCode::OrderNotFound
            | AppErrorCode::CouponNotFound => AppErrorClass::NotFound,
            AppErrorCode::InsufficientStock => AppErrorClass::InsufficientStock,
            AppErrorCode::CouponNotOwned
            | AppErrorCode::CouponExpired
            | AppErrorCode::MinOrderAmountNotMet => AppErrorClass::CouponInvalid,
            AppErrorCode::AmountMismatch
            | AppErrorCode::AlreadyCompleted
            | AppErrorCode::NotCompleted
            | AppErrorCode::NotCancellable
            | AppErrorCode::RefundExceedsPaid
            | AppErrorCode::InvalidStatusTransition
            | AppErrorCode::DuplicateTransaction => AppErrorClass::Conflict,
            AppErrorCode::GatewayTimeout
            | AppErrorCode::GatewayOriginRejected
            | AppErrorCode::GatewayFailure
            | AppErrorCode::HttpHandshakeFailure => AppErrorClass::Gateway,
            _others => AppErrorClass::Internal,
        }
    }
}
