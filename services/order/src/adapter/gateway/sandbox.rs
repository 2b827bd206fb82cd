use std::result::Result;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use rust_decimal::Decimal;

use ecommerce_common::config::AppPayGatewayCfg;
use ecommerce_common::error::AppErrorCode;

use super::remote::goods_name;
use super::{
    AbstractPaymentGateway, GatewayAuthResultModel, GatewayCallbackModel,
    GatewayNetCancelReqModel, GatewayNetCancelResultModel, GatewayPayParamsModel,
};
use crate::error::AppError;
use crate::model::OrderModel;

const SANDBOX_MERCHANT: &str = "SANDBOX";

/// In-process gateway for development and testing, nothing leaves the
/// process. The authorization token of a successful callback carries
/// the transaction result in the form `<tid>:<amount>[:<method>]`.
pub struct AppSandboxPaymentGateway {
    label: String,
    allowed_origins: Vec<String>,
    success_code: String,
}

impl AppSandboxPaymentGateway {
    pub fn new(cfg: &AppPayGatewayCfg) -> Self {
        Self {
            label: cfg.name.clone(),
            allowed_origins: cfg.allowed_origins.clone(),
            success_code: cfg.success_code.clone(),
        }
    }
}

#[async_trait]
impl AbstractPaymentGateway for AppSandboxPaymentGateway {
    fn label(&self) -> &str {
        self.label.as_str()
    }

    fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    fn create_payment_request(
        &self,
        order: &OrderModel,
        now: DateTime<FixedOffset>,
    ) -> Result<GatewayPayParamsModel, AppError> {
        Ok(GatewayPayParamsModel {
            gateway: self.label.clone(),
            merchant_id: SANDBOX_MERCHANT.to_string(),
            order_number: order.number.clone(),
            goods_name: goods_name(order),
            amount: order.final_amount,
            buyer_name: order.shipping.recipient.clone(),
            buyer_tel: order.shipping.phone.clone(),
            pay_method: order.pay_method,
            return_url: String::new(),
            close_url: String::new(),
            timestamp: now.timestamp_millis(),
        })
    }

    async fn parse_callback(
        &self,
        payload: &GatewayCallbackModel,
    ) -> Result<GatewayAuthResultModel, AppError> {
        let message = format!("{}, {}", payload.result_code, payload.result_msg);
        if payload.result_code != self.success_code {
            return Ok(GatewayAuthResultModel {
                success: false,
                tid: None,
                amount: None,
                method: None,
                auth_time: None,
                message,
            });
        }
        let malformed = || AppError {
            code: AppErrorCode::GatewayFailure,
            detail: Some(format!("sandbox-auth-token:{}", payload.auth_token)),
        };
        let mut parts = payload.auth_token.split(':');
        let tid = parts.next().filter(|t| !t.is_empty()).ok_or_else(malformed)?;
        let amount = parts
            .next()
            .and_then(|a| Decimal::from_str(a).ok())
            .ok_or_else(malformed)?;
        let method = parts.next().map(ToString::to_string);
        Ok(GatewayAuthResultModel {
            success: true,
            tid: Some(tid.to_string()),
            amount: Some(amount),
            method,
            auth_time: Some(Local::now().fixed_offset()),
            message,
        })
    }

    async fn request_network_cancel(
        &self,
        req: GatewayNetCancelReqModel,
    ) -> Result<GatewayNetCancelResultModel, AppError> {
        Ok(GatewayNetCancelResultModel {
            success: true,
            status: self.success_code.clone(),
            message: format!("sandbox-cancelled, tid:{}, oid:{}", req.tid, req.order_number),
        })
    }
}
