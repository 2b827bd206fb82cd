use std::convert::Infallible;
use std::result::Result;
use std::sync::Arc;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes as HyperBytes;
use hyper::client::conn::http1::{handshake, SendRequest};
use hyper::header::{HeaderValue, ACCEPT, CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;

use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::error::AppError;

/// One HTTP/1.1 connection over TLS to the payment gateway, each
/// request sends a JSON body and collects the whole response body.
pub(super) struct GatewayHttpClient {
    req_sender: SendRequest<BoxBody<HyperBytes, Infallible>>,
    host: String,
    port: u16,
    logctx: Arc<AppLogContext>,
}

impl GatewayHttpClient {
    pub(super) async fn try_connect(
        host: &str,
        port: u16,
        secure_connector: &TlsConnector,
        logctx: Arc<AppLogContext>,
    ) -> Result<Self, AppError> {
        let tcp_stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| AppError {
                code: AppErrorCode::IOerror(e.kind()),
                detail: Some(format!("{e}, host:{host}:{port}")),
            })?;
        let tls_stream = secure_connector
            .connect(host, tcp_stream)
            .await
            .map_err(|e| AppError {
                code: AppErrorCode::CryptoFailure,
                detail: Some(e.to_string()),
            })?;
        let (req_sender, connector) =
            handshake(TokioIo::new(tls_stream))
                .await
                .map_err(|e| AppError {
                    code: AppErrorCode::HttpHandshakeFailure,
                    detail: Some(e.to_string()),
                })?;
        let logctx_p = logctx.clone();
        let _handle = tokio::task::spawn(async move {
            if let Err(e) = connector.await {
                app_log_event!(logctx_p, AppLogLevel::ERROR, "gateway-conn: {:?}", e);
            }
        });
        Ok(Self {
            req_sender,
            host: host.to_string(),
            port,
            logctx,
        })
    } // end of fn try_connect

    pub(super) async fn post_json(
        &mut self,
        resource_path: &str,
        body: Vec<u8>,
    ) -> Result<(Vec<u8>, StatusCode), AppError> {
        let host_hdr = HeaderValue::from_str(self.host.as_str()).map_err(|e| AppError {
            code: AppErrorCode::InvalidInput,
            detail: Some(e.to_string()),
        })?;
        let mut req = Request::builder()
            .uri(resource_path)
            .method(Method::POST)
            .body(BoxBody::new(Full::new(HyperBytes::from(body))))
            .map_err(|e| AppError {
                code: AppErrorCode::HttpHandshakeFailure,
                detail: Some(e.to_string()),
            })?;
        let hdrs = req.headers_mut();
        let json_mime = HeaderValue::from_static("application/json");
        hdrs.insert(HOST, host_hdr);
        hdrs.insert(CONTENT_TYPE, json_mime.clone());
        hdrs.insert(ACCEPT, json_mime);
        self.send(req).await
    }

    async fn send(
        &mut self,
        req: Request<BoxBody<HyperBytes, Infallible>>,
    ) -> Result<(Vec<u8>, StatusCode), AppError> {
        let logctx_p = self.logctx.clone();
        let mut resp = self.req_sender.send_request(req).await.map_err(|e| {
            let detail = e.to_string();
            app_log_event!(
                logctx_p,
                AppLogLevel::WARNING,
                "host: {}, port:{}, detail:{}",
                &self.host,
                self.port,
                &detail
            );
            AppError {
                code: AppErrorCode::GatewayFailure,
                detail: Some(detail),
            }
        })?;
        let body = resp.body_mut();
        let mut raw_collected = Vec::new();
        while let Some(frm) = body.frame().await {
            let rawblk = frm
                .map_err(|e| AppError {
                    code: AppErrorCode::DataCorruption,
                    detail: Some(e.to_string()),
                })?
                .into_data()
                .map_err(|_frm| AppError {
                    code: AppErrorCode::DataCorruption,
                    detail: Some(format!("frame2data, {}:{}", &self.host, self.port)),
                })?;
            raw_collected.extend(rawblk.to_vec());
        }
        let status = resp.status();
        app_log_event!(
            logctx_p,
            AppLogLevel::DEBUG,
            "host: {}, port:{}, resp-status:{}",
            &self.host,
            self.port,
            status.as_u16()
        );
        Ok((raw_collected, status))
    } // end of fn send
} // end of impl GatewayHttpClient
