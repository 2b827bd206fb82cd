mod base_client;
mod remote;
mod sandbox;

use std::boxed::Box;
use std::result::Result;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use hyper::Uri;
use rust_decimal::Decimal;

use ecommerce_common::confidentiality::AbstractConfidentiality;
use ecommerce_common::config::{AppPayGatewayAccessCfg, AppPayGatewayCfg};
use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::AppLogContext;

use crate::error::AppError;
use crate::model::{OrderModel, PaymentMethod};

pub use remote::AppRemotePaymentGateway;
pub use sandbox::AppSandboxPaymentGateway;

/// Parameters a client needs to start payment on the gateway page.
#[derive(Debug, Clone)]
pub struct GatewayPayParamsModel {
    pub gateway: String,
    pub merchant_id: String,
    pub order_number: String,
    pub goods_name: String,
    pub amount: Decimal,
    pub buyer_name: String,
    pub buyer_tel: String,
    pub pay_method: PaymentMethod,
    pub return_url: String,
    pub close_url: String,
    pub timestamp: i64,
}

/// Raw callback sent by the gateway once a buyer finished the payment
/// page, nothing in it is trusted before the origin check.
#[derive(Debug, Clone)]
pub struct GatewayCallbackModel {
    pub result_code: String,
    pub result_msg: String,
    pub order_number: String,
    pub auth_url: String,
    pub net_cancel_url: String,
    pub auth_token: String,
}

#[derive(Debug, Clone)]
pub struct GatewayAuthResultModel {
    pub success: bool,
    pub tid: Option<String>,
    pub amount: Option<Decimal>,
    pub method: Option<String>,
    pub auth_time: Option<DateTime<FixedOffset>>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct GatewayNetCancelReqModel {
    pub tid: String,
    pub amount: Decimal,
    pub order_number: String,
    // endpoint given by the callback, already checked against the allow-list
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayNetCancelResultModel {
    pub success: bool,
    pub status: String,
    pub message: String,
}

#[async_trait]
pub trait AbstractPaymentGateway: Send + Sync {
    fn label(&self) -> &str;

    fn allowed_origins(&self) -> &[String];

    fn create_payment_request(
        &self,
        order: &OrderModel,
        now: DateTime<FixedOffset>,
    ) -> Result<GatewayPayParamsModel, AppError>;

    /// Complete the authorization of a callback, a callback with failure
    /// result code is reported as unsuccessful without contacting the gateway.
    async fn parse_callback(
        &self,
        payload: &GatewayCallbackModel,
    ) -> Result<GatewayAuthResultModel, AppError>;

    async fn request_network_cancel(
        &self,
        req: GatewayNetCancelReqModel,
    ) -> Result<GatewayNetCancelResultModel, AppError>;
}

/// Accept only `https` URLs whose host exactly matches one of the
/// allowed origins.
pub fn check_origin(allowed: &[String], url: &str) -> Result<Uri, AppError> {
    let reject = |reason: &str| AppError {
        code: AppErrorCode::GatewayOriginRejected,
        detail: Some(format!("{reason}, url:{url}")),
    };
    let uri = url.parse::<Uri>().map_err(|_e| reject("malformed"))?;
    if uri.scheme_str() != Some("https") {
        return Err(reject("scheme"));
    }
    let host = uri.host().ok_or_else(|| reject("host-missing"))?;
    if allowed.iter().any(|a| a.as_str() == host) {
        Ok(uri)
    } else {
        Err(reject("host-not-allowed"))
    }
}

pub(crate) fn app_gateway_context(
    cfg: &AppPayGatewayCfg,
    logctx: Arc<AppLogContext>,
    cfdntl: Arc<Box<dyn AbstractConfidentiality>>,
) -> Result<Box<dyn AbstractPaymentGateway>, AppError> {
    let obj: Box<dyn AbstractPaymentGateway> = match &cfg.access {
        AppPayGatewayAccessCfg::dev { .. } => {
            Box::new(AppRemotePaymentGateway::try_build(cfg, cfdntl, logctx)?)
        }
        AppPayGatewayAccessCfg::test => Box::new(AppSandboxPaymentGateway::new(cfg)),
    };
    Ok(obj)
}
