use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local as LocalTime};
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::api::dto::{
    GatewayCallbackReqDto, GatewayCallbackRespDto, NetCancelDto, OrderDto, PaymentRequestDto,
    WebhookPayApprovedDto, WebhookPayFailedDto, WebhookReqDto,
};
use crate::api::parse_json_value;
use crate::constant::{limit, webhook_event};
use crate::error::{AppError, AppErrorClass};
use crate::gateway::{
    check_origin, AbstractPaymentGateway, GatewayCallbackModel, GatewayNetCancelReqModel,
    GatewayNetCancelResultModel,
};
use crate::model::{OrderModel, OrderStatus, PaymentStatus, StockLedgerOp};
use crate::repository::{AbsOrderRepo, OrderPayEventModel, OrderPayTxModel};

/// State transitions of orders after creation, each one runs in a
/// single transaction of the order repository along with the stock
/// and coupon-grant changes it implies.
pub struct OrderPaymentUseCase {
    pub repo: Box<dyn AbsOrderRepo>,
    pub tolerance: Decimal,
    pub logctx: Arc<AppLogContext>,
}

pub struct PaymentRequestUseCase {
    pub repo: Box<dyn AbsOrderRepo>,
    pub gateway: Arc<Box<dyn AbstractPaymentGateway>>,
    pub usr_id: u64,
}

pub struct GatewayCallbackUseCase {
    pub repo: Box<dyn AbsOrderRepo>,
    pub gateway: Arc<Box<dyn AbstractPaymentGateway>>,
    pub tolerance: Decimal,
    pub logctx: Arc<AppLogContext>,
}

pub struct PaymentWebhookUseCase {
    pub repo: Box<dyn AbsOrderRepo>,
    pub tolerance: Decimal,
    pub logctx: Arc<AppLogContext>,
}

pub enum PayCallbackUsKsErr {
    // origin not allowed or unknown order, nothing changed
    Rejected(AppError),
    // gateway unreachable or malformed reply, nothing changed
    Gateway(AppError),
    // paid at gateway side but the order could not be confirmed
    Compensated {
        reason: AppError,
        net_cancel: DefaultResult<GatewayNetCancelResultModel, AppError>,
    },
    Server(AppError),
}

impl PayCallbackUsKsErr {
    // conflicts and lookup failures change nothing, persistence failures do abort
    fn from_unpaid(e: AppError) -> Self {
        match e.class() {
            AppErrorClass::Internal => Self::Server(e),
            _others => Self::Rejected(e),
        }
    }
}

fn check_reason(reason: &str) -> DefaultResult<(), AppError> {
    if reason.len() > limit::MAX_REASON_LEN {
        Err(AppError {
            code: AppErrorCode::InvalidInput,
            detail: Some(format!("reason-len:{}", reason.len())),
        })
    } else {
        Ok(())
    }
}

fn reset_grant(tx: &mut OrderPayTxModel) {
    if let Some(g) = tx.grant.as_mut() {
        g.reset();
    }
}

fn order_pay_update_cb(
    tx: &mut OrderPayTxModel,
    event: OrderPayEventModel,
    now: DateTime<FixedOffset>,
) -> DefaultResult<(), AppError> {
    match event {
        OrderPayEventModel::Approve {
            payment_id,
            paid,
            tolerance,
        } => {
            if let Some(other) = tx.payment_claimed_by {
                let detail = format!("payment:{payment_id}, claimed-by:{other}");
                return Err(AppError {
                    code: AppErrorCode::DuplicateTransaction,
                    detail: Some(detail),
                });
            }
            tx.order.approve(payment_id, paid, tolerance, now)?;
            let reqs = tx.order.stock_reqs(StockLedgerOp::Consume);
            tx.stock.apply_all(&reqs)?;
        }
        OrderPayEventModel::Fail { reason } => {
            tx.order.fail(reason, now)?;
            let reqs = tx.order.stock_reqs(StockLedgerOp::Release);
            tx.stock.apply_all(&reqs)?;
            reset_grant(tx);
        }
        OrderPayEventModel::Refund { amount, reason } => {
            tx.order.refund(amount, reason, now)?;
            let reqs = tx.order.stock_reqs(StockLedgerOp::Restore);
            tx.stock.apply_all(&reqs)?;
            reset_grant(tx);
        }
        OrderPayEventModel::Cancel { reason } => {
            let prev = tx.order.cancel(reason, now)?;
            let op = match prev {
                PaymentStatus::Pending => Some(StockLedgerOp::Release),
                PaymentStatus::Completed => Some(StockLedgerOp::Restore),
                _others => None,
            };
            if let Some(op) = op {
                let reqs = tx.order.stock_reqs(op);
                tx.stock.apply_all(&reqs)?;
            }
            reset_grant(tx);
        }
        OrderPayEventModel::Advance { next } => {
            tx.order.advance_fulfillment(next, now)?;
        }
    }
    Ok(())
} // end of fn order_pay_update_cb

impl OrderPaymentUseCase {
    pub async fn approve(
        &self,
        order_id: u64,
        payment_id: String,
        paid: Decimal,
    ) -> DefaultResult<OrderModel, AppError> {
        if payment_id.is_empty() {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some("payment-id-empty".to_string()),
            });
        }
        let event = OrderPayEventModel::Approve {
            payment_id,
            paid,
            tolerance: self.tolerance,
        };
        self.update(order_id, event, "approve").await
    }

    pub async fn fail(&self, order_id: u64, reason: String) -> DefaultResult<OrderModel, AppError> {
        check_reason(reason.as_str())?;
        self.update(order_id, OrderPayEventModel::Fail { reason }, "fail")
            .await
    }

    pub async fn refund(
        &self,
        order_id: u64,
        amount: Decimal,
        reason: String,
    ) -> DefaultResult<OrderModel, AppError> {
        check_reason(reason.as_str())?;
        let event = OrderPayEventModel::Refund { amount, reason };
        self.update(order_id, event, "refund").await
    }

    pub async fn cancel(&self, order_id: u64, reason: String) -> DefaultResult<OrderModel, AppError> {
        check_reason(reason.as_str())?;
        self.update(order_id, OrderPayEventModel::Cancel { reason }, "cancel")
            .await
    }

    /// seller side, one step at a time towards delivery
    pub async fn advance_fulfillment(
        &self,
        order_id: u64,
        next: OrderStatus,
    ) -> DefaultResult<OrderModel, AppError> {
        self.update(order_id, OrderPayEventModel::Advance { next }, "advance")
            .await
    }

    async fn update(
        &self,
        order_id: u64,
        event: OrderPayEventModel,
        action: &str,
    ) -> DefaultResult<OrderModel, AppError> {
        let now = LocalTime::now().fixed_offset();
        let result = self
            .repo
            .try_update(order_id, event, now, order_pay_update_cb)
            .await;
        let logctx = &self.logctx;
        match result.as_ref() {
            Ok(o) => app_log_event!(
                logctx,
                AppLogLevel::INFO,
                "order:{order_id}, action:{action}, status:{}, payment:{}",
                o.status.as_str(),
                o.pay_status.as_str()
            ),
            Err(e) if e.class() == AppErrorClass::Internal => {
                app_log_event!(logctx, AppLogLevel::ERROR, "order:{order_id}, action:{action}, {e}")
            }
            Err(e) => {
                app_log_event!(logctx, AppLogLevel::WARNING, "order:{order_id}, action:{action}, {e}")
            }
        }
        result
    }
} // end of impl OrderPaymentUseCase

impl PaymentRequestUseCase {
    pub async fn execute(self, order_id: u64) -> DefaultResult<PaymentRequestDto, AppError> {
        let order = self.repo.fetch_by_id(order_id).await?;
        if order.owner != self.usr_id {
            return Err(AppError {
                code: AppErrorCode::OrderNotFound,
                detail: Some(order_id.to_string()),
            });
        }
        if order.pay_status == PaymentStatus::Completed {
            return Err(AppError {
                code: AppErrorCode::AlreadyCompleted,
                detail: Some(order.number),
            });
        }
        if !order.holds_reservation() {
            let detail = format!(
                "order:{}, status:{}, payment:{}",
                order.id,
                order.status.as_str(),
                order.pay_status.as_str()
            );
            return Err(AppError {
                code: AppErrorCode::InvalidStatusTransition,
                detail: Some(detail),
            });
        }
        let now = LocalTime::now().fixed_offset();
        let params = self.gateway.create_payment_request(&order, now)?;
        Ok(params.into())
    }
}

impl GatewayCallbackUseCase {
    pub async fn execute(
        self,
        data: GatewayCallbackReqDto,
    ) -> DefaultResult<OrderDto, PayCallbackUsKsErr> {
        let payload = GatewayCallbackModel::from(data);
        let logctx = &self.logctx;
        // nothing in the payload is trusted before the origin check
        let allowed = self.gateway.allowed_origins();
        let checked = check_origin(allowed, payload.auth_url.as_str())
            .and_then(|_| check_origin(allowed, payload.net_cancel_url.as_str()));
        if let Err(e) = checked {
            app_log_event!(logctx, AppLogLevel::WARNING, "order-number:{}, {e}", payload.order_number);
            return Err(PayCallbackUsKsErr::Rejected(e));
        }
        let order = self
            .repo
            .fetch_by_number(payload.order_number.as_str())
            .await
            .map_err(PayCallbackUsKsErr::from_unpaid)?;
        let auth = self.gateway.parse_callback(&payload).await.map_err(|e| {
            app_log_event!(logctx, AppLogLevel::ERROR, "order:{}, gateway:{}, {e}", order.id, self.gateway.label());
            PayCallbackUsKsErr::Gateway(e)
        })?;
        let paysm = OrderPaymentUseCase {
            repo: self.repo,
            tolerance: self.tolerance,
            logctx: self.logctx.clone(),
        };
        if !auth.success {
            return paysm
                .fail(order.id, auth.message)
                .await
                .map(OrderDto::from)
                .map_err(PayCallbackUsKsErr::from_unpaid);
        }
        let (tid, paid) = match (auth.tid, auth.amount) {
            (Some(t), Some(a)) => (t, a),
            _others => {
                let e = AppError {
                    code: AppErrorCode::GatewayFailure,
                    detail: Some(format!("auth-incomplete, order:{}", order.id)),
                };
                return Err(PayCallbackUsKsErr::Gateway(e));
            }
        };
        // amount paid is verified against the order again in the approval
        match paysm.approve(order.id, tid.clone(), paid).await {
            Ok(o) => Ok(o.into()),
            Err(e) if e.code == AppErrorCode::AlreadyCompleted
                && order.payment_id.as_deref() == Some(tid.as_str()) =>
            {
                // replayed callback of a confirmed payment, never cancel it
                Err(PayCallbackUsKsErr::Rejected(e))
            }
            Err(e) => {
                let req = GatewayNetCancelReqModel {
                    tid,
                    amount: paid,
                    order_number: order.number.clone(),
                    endpoint: Some(payload.net_cancel_url.clone()),
                };
                let net_cancel = self.gateway.request_network_cancel(req).await;
                match net_cancel.as_ref() {
                    Ok(r) => app_log_event!(
                        logctx,
                        AppLogLevel::WARNING,
                        "order:{}, net-cancel, success:{}, status:{}, reason:{e}",
                        order.id,
                        r.success,
                        r.status
                    ),
                    Err(ne) => app_log_event!(
                        logctx,
                        AppLogLevel::ERROR,
                        "order:{}, net-cancel-failure:{ne}, reason:{e}",
                        order.id
                    ),
                }
                Err(PayCallbackUsKsErr::Compensated {
                    reason: e,
                    net_cancel,
                })
            }
        }
    } // end of fn execute
} // end of impl GatewayCallbackUseCase

impl From<DefaultResult<OrderDto, PayCallbackUsKsErr>> for GatewayCallbackRespDto {
    fn from(value: DefaultResult<OrderDto, PayCallbackUsKsErr>) -> Self {
        match value {
            Ok(o) => Self {
                order: Some(o),
                error: None,
                net_cancel: None,
            },
            Err(PayCallbackUsKsErr::Compensated { reason, net_cancel }) => Self {
                order: None,
                error: Some(reason.into()),
                // failure of the net cancel itself is only logged
                net_cancel: net_cancel.ok().map(NetCancelDto::from),
            },
            Err(PayCallbackUsKsErr::Rejected(e))
            | Err(PayCallbackUsKsErr::Gateway(e))
            | Err(PayCallbackUsKsErr::Server(e)) => Self {
                order: None,
                error: Some(e.into()),
                net_cancel: None,
            },
        }
    }
}

impl PaymentWebhookUseCase {
    /// dispatch the event onto approval or failure of the order
    pub async fn execute(self, data: WebhookReqDto) -> DefaultResult<OrderDto, AppError> {
        let WebhookReqDto { event_type, data } = data;
        let paysm = OrderPaymentUseCase {
            repo: self.repo,
            tolerance: self.tolerance,
            logctx: self.logctx.clone(),
        };
        let order = match event_type.as_str() {
            webhook_event::PAYMENT_APPROVED => {
                let d = parse_json_value::<WebhookPayApprovedDto>(data)?;
                paysm.approve(d.order_id, d.payment_id, d.paid_amount).await?
            }
            webhook_event::PAYMENT_FAILED => {
                let d = parse_json_value::<WebhookPayFailedDto>(data)?;
                paysm.fail(d.order_id, d.reason).await?
            }
            _others => {
                let logctx = &self.logctx;
                app_log_event!(logctx, AppLogLevel::WARNING, "event:{event_type}");
                return Err(AppError {
                    code: AppErrorCode::UnsupportedEvent,
                    detail: Some(event_type),
                });
            }
        };
        Ok(order.into())
    }
}
