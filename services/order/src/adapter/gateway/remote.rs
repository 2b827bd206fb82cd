use std::future::Future;
use std::result::Result;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_native_tls::{native_tls, TlsConnector};

use ecommerce_common::confidentiality::AbstractConfidentiality;
use ecommerce_common::config::{AppPayGatewayAccessCfg, AppPayGatewayCfg};
use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use super::base_client::GatewayHttpClient;
use super::{
    check_origin, AbstractPaymentGateway, GatewayAuthResultModel, GatewayCallbackModel,
    GatewayNetCancelReqModel, GatewayNetCancelResultModel, GatewayPayParamsModel,
};
use crate::error::AppError;
use crate::model::OrderModel;

const DEFAULT_NET_CANCEL_PATH: &str = "/api/v1/netcancel";
const AUTH_TIME_FMT: &str = "%Y%m%d%H%M%S";

#[derive(Deserialize)]
struct GatewaySecret {
    mid: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthReqBody<'a> {
    mid: &'a str,
    api_key: &'a str,
    auth_token: &'a str,
    timestamp: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthRespBody {
    result_code: String,
    result_msg: String,
    tid: Option<String>,
    tot_price: Option<String>,
    pay_method: Option<String>,
    appl_date: Option<String>,
    appl_time: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NetCancelReqBody<'a> {
    mid: &'a str,
    api_key: &'a str,
    tid: &'a str,
    price: String,
    oid: &'a str,
    timestamp: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetCancelRespBody {
    result_code: String,
    result_msg: String,
}

pub struct AppRemotePaymentGateway {
    label: String,
    allowed_origins: Vec<String>,
    success_code: String,
    timeout: Duration,
    host: String,
    port: u16,
    return_url: String,
    close_url: String,
    secret: GatewaySecret,
    secure_connector: TlsConnector,
    logctx: Arc<AppLogContext>,
}

impl AppRemotePaymentGateway {
    pub(super) fn try_build(
        cfg: &AppPayGatewayCfg,
        cfdntl: Arc<Box<dyn AbstractConfidentiality>>,
        logctx: Arc<AppLogContext>,
    ) -> Result<Self, AppError> {
        let (host, port, confidentiality_path, return_url, close_url) = match &cfg.access {
            AppPayGatewayAccessCfg::dev {
                host,
                port,
                confidentiality_path,
                return_url,
                close_url,
            } => (host, *port, confidentiality_path, return_url, close_url),
            AppPayGatewayAccessCfg::test => {
                return Err(AppError {
                    code: AppErrorCode::InvalidGatewayCfg,
                    detail: Some(format!("remote-gateway, mode:test, name:{}", cfg.name)),
                });
            }
        };
        let serial = cfdntl.try_get_payload(confidentiality_path.as_str())?;
        let secret = serde_json::from_str::<GatewaySecret>(serial.as_str()).map_err(|e| AppError {
            code: AppErrorCode::DataCorruption,
            detail: Some(format!("gateway-credential, {e}")),
        })?;
        let secure_connector = {
            let mut builder = native_tls::TlsConnector::builder();
            builder.min_protocol_version(Some(native_tls::Protocol::Tlsv12));
            let sc = builder.build().map_err(|e| AppError {
                code: AppErrorCode::CryptoFailure,
                detail: Some(e.to_string()),
            })?;
            sc.into()
        };
        Ok(Self {
            label: cfg.name.clone(),
            allowed_origins: cfg.allowed_origins.clone(),
            success_code: cfg.success_code.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs as u64),
            host: host.clone(),
            port,
            return_url: return_url.clone(),
            close_url: close_url.clone(),
            secret,
            secure_connector,
            logctx,
        })
    } // end of fn try_build

    async fn bounded<T, F>(&self, action: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_elapsed| {
                let logctx = &self.logctx;
                app_log_event!(
                    logctx,
                    AppLogLevel::ERROR,
                    "gateway:{}, action:{}, timeout-secs:{}",
                    self.label,
                    action,
                    self.timeout.as_secs()
                );
                AppError {
                    code: AppErrorCode::GatewayTimeout,
                    detail: Some(format!("{}, {}", self.label, action)),
                }
            })?
    }

    async fn post(&self, host: &str, port: u16, path: &str, body: Vec<u8>) -> Result<Vec<u8>, AppError> {
        let mut client =
            GatewayHttpClient::try_connect(host, port, &self.secure_connector, self.logctx.clone())
                .await?;
        let (rawbody, status) = client.post_json(path, body).await?;
        if status.is_success() {
            Ok(rawbody)
        } else {
            Err(AppError {
                code: AppErrorCode::GatewayFailure,
                detail: Some(format!("host:{host}:{port}, status:{}", status.as_u16())),
            })
        }
    }

    fn parse_auth_time(date: Option<String>, time: Option<String>) -> Option<DateTime<FixedOffset>> {
        let combined = date? + time?.as_str();
        // the gateway reports time without zone offset
        NaiveDateTime::parse_from_str(combined.as_str(), AUTH_TIME_FMT)
            .ok()
            .map(|t| t.and_utc().fixed_offset())
    }
} // end of impl AppRemotePaymentGateway

fn serialize_body<T: Serialize>(body: &T) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec(body).map_err(|e| AppError {
        code: AppErrorCode::DataCorruption,
        detail: Some(e.to_string()),
    })
}

fn deserialize_body<'a, T: Deserialize<'a>>(raw: &'a [u8]) -> Result<T, AppError> {
    serde_json::from_slice::<T>(raw).map_err(|e| AppError {
        code: AppErrorCode::GatewayFailure,
        detail: Some(format!("malformed-response, {e}")),
    })
}

pub(super) fn goods_name(order: &OrderModel) -> String {
    let first = order
        .lines
        .first()
        .map(|l| l.product_name.as_str())
        .unwrap_or_default();
    match order.lines.len() {
        0 | 1 => first.to_string(),
        n => format!("{} and {} more", first, n - 1),
    }
}

#[async_trait]
impl AbstractPaymentGateway for AppRemotePaymentGateway {
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
            merchant_id: self.secret.mid.clone(),
            order_number: order.number.clone(),
            goods_name: goods_name(order),
            amount: order.final_amount,
            buyer_name: order.shipping.recipient.clone(),
            buyer_tel: order.shipping.phone.clone(),
            pay_method: order.pay_method,
            return_url: self.return_url.clone(),
            close_url: self.close_url.clone(),
            timestamp: now.timestamp_millis(),
        })
    }

    async fn parse_callback(
        &self,
        payload: &GatewayCallbackModel,
    ) -> Result<GatewayAuthResultModel, AppError> {
        if payload.result_code != self.success_code {
            return Ok(GatewayAuthResultModel {
                success: false,
                tid: None,
                amount: None,
                method: None,
                auth_time: None,
                message: format!("{}, {}", payload.result_code, payload.result_msg),
            });
        }
        let uri = check_origin(&self.allowed_origins, payload.auth_url.as_str())?;
        let host = uri.host().unwrap_or_default();
        let port = uri.port_u16().unwrap_or(443);
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let body = serialize_body(&AuthReqBody {
            mid: self.secret.mid.as_str(),
            api_key: self.secret.api_key.as_str(),
            auth_token: payload.auth_token.as_str(),
            timestamp: chrono::Local::now().timestamp_millis(),
        })?;
        let raw = self.bounded("auth", self.post(host, port, path, body)).await?;
        let resp = deserialize_body::<AuthRespBody>(raw.as_slice())?;
        let success = resp.result_code == self.success_code;
        let amount = resp
            .tot_price
            .as_deref()
            .map(Decimal::from_str)
            .transpose()
            .map_err(|e| AppError {
                code: AppErrorCode::GatewayFailure,
                detail: Some(format!("tot-price, {e}")),
            })?;
        if success && (resp.tid.is_none() || amount.is_none()) {
            return Err(AppError {
                code: AppErrorCode::GatewayFailure,
                detail: Some("auth-resp-incomplete".to_string()),
            });
        }
        Ok(GatewayAuthResultModel {
            success,
            tid: resp.tid,
            amount,
            method: resp.pay_method,
            auth_time: Self::parse_auth_time(resp.appl_date, resp.appl_time),
            message: format!("{}, {}", resp.result_code, resp.result_msg),
        })
    } // end of fn parse_callback

    async fn request_network_cancel(
        &self,
        req: GatewayNetCancelReqModel,
    ) -> Result<GatewayNetCancelResultModel, AppError> {
        let (host, port, path) = match req.endpoint.as_deref() {
            Some(url) => {
                let uri = check_origin(&self.allowed_origins, url)?;
                let host = uri.host().unwrap_or_default().to_string();
                let port = uri.port_u16().unwrap_or(443);
                let path = uri.path_and_query().map(|p| p.to_string());
                (host, port, path.unwrap_or_else(|| "/".to_string()))
            }
            None => (self.host.clone(), self.port, DEFAULT_NET_CANCEL_PATH.to_string()),
        };
        let body = serialize_body(&NetCancelReqBody {
            mid: self.secret.mid.as_str(),
            api_key: self.secret.api_key.as_str(),
            tid: req.tid.as_str(),
            price: req.amount.to_string(),
            oid: req.order_number.as_str(),
            timestamp: chrono::Local::now().timestamp_millis(),
        })?;
        let fut = self.post(host.as_str(), port, path.as_str(), body);
        let raw = self.bounded("net-cancel", fut).await?;
        let resp = deserialize_body::<NetCancelRespBody>(raw.as_slice())?;
        Ok(GatewayNetCancelResultModel {
            success: resp.result_code == self.success_code,
            status: resp.result_code,
            message: resp.result_msg,
        })
    }
} // end of impl AppRemotePaymentGateway
