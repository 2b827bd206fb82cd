use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, PartialEq)]
pub enum AppErrorCode {
    Unknown,
    NotImplemented,
    MissingSysBasePath,
    MissingAppBasePath,
    MissingConfigPath,
    MissingDataStore,
    InvalidJsonFormat,
    MissingAliasLogHdlerCfg,
    MissingAliasLoggerCfg,
    NoLogHandlerCfg,
    NoLoggerCfg,
    NoHandlerInLoggerCfg,
    InvalidHandlerLoggerCfg,
    InvalidCheckoutCfg,
    InvalidGatewayCfg,
    FeatureDisabled,
    EmptyInputData, // for internal server error, do NOT dump detail to clients
    InvalidInput,   // for client error, e.g. malformed identifier
    CryptoFailure,
    HttpHandshakeFailure,
    NoConfidentialityCfg,
    NoDatabaseCfg,
    RemoteDbServerFailure,
    ExceedingMaxLimit,
    AcquireLockFailure,
    DatabaseServerBusy,
    DataTableNotExist,
    DataCorruption,
    // --- not-found family
    ProductNotExist,
    SkuNotExist,
    CartLineNotExist,
    AddressNotFound,
    OrderNotFound,
    CouponNotFound,
    // --- stock ledger
    InsufficientStock,
    // --- cart / order builder
    InvalidSelection,
    EmptyCart,
    CouponNotOwned,
    CouponExpired,
    MinOrderAmountNotMet,
    // --- payment state machine
    AmountMismatch,
    AlreadyCompleted,
    NotCompleted,
    NotCancellable,
    RefundExceedsPaid,
    InvalidStatusTransition,
    DuplicateTransaction,
    UnsupportedEvent,
    // --- payment gateway
    GatewayTimeout,
    GatewayOriginRejected,
    GatewayFailure,
    IOerror(std::io::ErrorKind),
} // end of AppErrorCode

pub struct AppCfgError {
    pub code: AppErrorCode,
    pub detail: Option<String>,
}

impl Debug for AppCfgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let dp = self.detail.as_deref().unwrap_or("none");
        write!(f, "code:{:?}, detail:{}", self.code, dp)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfidentialityError {
    pub code: AppErrorCode,
    pub detail: String,
}

impl Display for AppConfidentialityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "code:{:?}, detail:{}", self.code, self.detail)
    }
}
