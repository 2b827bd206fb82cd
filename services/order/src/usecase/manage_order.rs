use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use chrono::Local as LocalTime;

use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::api::dto::{OrderCreateDirectReqDto, OrderCreateReqDto, OrderDto};
use crate::constant::limit;
use crate::error::{AppError, AppErrorClass};
use crate::model::{
    OrderCreateArgs, OrderLineModel, OrderModel, OrderPricingPolicy, PaymentMethod, StockTarget,
};
use crate::repository::{
    AbsAddressRepo, AbsOrderRepo, OrderCreateReqModel, OrderCreateTxModel, OrderSourceModel,
};
use crate::AppIdGenerator;

pub struct CreateOrderUseCase {
    pub repo_order: Box<dyn AbsOrderRepo>,
    pub repo_address: Box<dyn AbsAddressRepo>,
    pub id_gen: Arc<AppIdGenerator>,
    pub policy: OrderPricingPolicy,
    pub logctx: Arc<AppLogContext>,
    pub usr_id: u64,
}

pub struct RetrieveOrderUseCase {
    pub repo: Box<dyn AbsOrderRepo>,
    pub usr_id: u64,
}

struct OrderCreateCommon {
    address_id: u64,
    pay_method: PaymentMethod,
    coupon_id: Option<u64>,
    memo: Option<String>,
}

fn insufficient_single(target: &StockTarget, qty: u32) -> AppError {
    AppError {
        code: AppErrorCode::InsufficientStock,
        detail: Some(format!("target:{target}, requested:{qty}")),
    }
}

impl CreateOrderUseCase {
    pub async fn from_cart(self, data: OrderCreateReqDto) -> DefaultResult<OrderDto, AppError> {
        let common = OrderCreateCommon {
            address_id: data.address_id,
            pay_method: data.pay_method,
            coupon_id: data.coupon_id,
            memo: data.memo,
        };
        self.create(common, OrderSourceModel::Cart).await
    }

    /// buy-now path, bypass the cart of the user
    pub async fn direct(self, data: OrderCreateDirectReqDto) -> DefaultResult<OrderDto, AppError> {
        if data.quantity == 0 || data.quantity > limit::MAX_QTY_PER_LINE {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("quantity:{}", data.quantity)),
            });
        }
        let source = OrderSourceModel::Direct {
            line_id: self.id_gen.next_id(),
            product_id: data.product_id,
            sku_id: data.sku_id,
            qty: data.quantity,
        };
        let common = OrderCreateCommon {
            address_id: data.address_id,
            pay_method: data.pay_method,
            coupon_id: data.coupon_id,
            memo: data.memo,
        };
        self.create(common, source).await
    }

    async fn create(
        self,
        common: OrderCreateCommon,
        source: OrderSourceModel,
    ) -> DefaultResult<OrderDto, AppError> {
        let logctx = &self.logctx;
        if common.memo.as_ref().map_or(0, String::len) > limit::MAX_ORDER_MEMO_LEN {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some("memo-too-long".to_string()),
            });
        }
        // address of other users is reported as not found
        let addr = self
            .repo_address
            .fetch(common.address_id)
            .await
            .and_then(|a| a.check_owner(self.usr_id).map(|()| a));
        let addr = match addr {
            Ok(v) => v,
            Err(e) => {
                app_log_event!(logctx, AppLogLevel::WARNING, "usr:{}, {e}", self.usr_id);
                return Err(e);
            }
        };
        let now = LocalTime::now().fixed_offset();
        let args = OrderCreateArgs {
            id: self.id_gen.next_id(),
            number: self.id_gen.order_number(now),
            owner: self.usr_id,
            shipping: addr.into(),
            pay_method: common.pay_method,
            memo: common.memo,
            now,
        };
        let req = OrderCreateReqModel {
            args,
            source,
            coupon_id: common.coupon_id,
            policy: self.policy.clone(),
        };
        match self.repo_order.create(req, Self::create_cb).await {
            Ok(o) => {
                app_log_event!(
                    logctx,
                    AppLogLevel::INFO,
                    "usr:{}, order:{}, number:{}, final:{}",
                    o.owner,
                    o.id,
                    o.number,
                    o.final_amount
                );
                Ok(o.into())
            }
            Err(e) => {
                if e.class() == AppErrorClass::Internal {
                    app_log_event!(logctx, AppLogLevel::ERROR, "usr:{}, {e}", self.usr_id);
                } else {
                    app_log_event!(logctx, AppLogLevel::WARNING, "usr:{}, {e}", self.usr_id);
                }
                Err(e)
            }
        }
    } // end of fn create

    // runs within the transaction of the order repository
    fn create_cb(
        req: OrderCreateReqModel,
        tx: &mut OrderCreateTxModel,
    ) -> DefaultResult<OrderModel, AppError> {
        let OrderCreateReqModel {
            args,
            source,
            coupon_id,
            policy,
        } = req;
        let lines = match source {
            OrderSourceModel::Cart => {
                // reservations held by SKU lines are handed over to the order,
                // the cart lines are removed without releasing them
                let taken = tx.cart.lines.drain(..).collect::<Vec<_>>();
                taken
                    .into_iter()
                    .map(|cl| {
                        let (product, target, _) = tx.products.resolve(cl.product_id, cl.sku_id)?;
                        // single-option product holds nothing, check it again
                        if let StockTarget::Single { .. } = target {
                            if !tx.stock.check_available(&target, cl.qty)? {
                                return Err(insufficient_single(&target, cl.qty));
                            }
                        }
                        Ok(OrderLineModel::new(cl.id, product, cl.sku_id, cl.qty, cl.price))
                    })
                    .collect::<DefaultResult<Vec<_>, AppError>>()?
            }
            OrderSourceModel::Direct {
                line_id,
                product_id,
                sku_id,
                qty,
            } => {
                let (product, target, price) = tx.products.resolve(product_id, sku_id)?;
                tx.stock.rehold(&target, 0, qty)?;
                vec![OrderLineModel::new(line_id, product, sku_id, qty, price)]
            }
        };
        // empty order is rejected by `try_build` before any coupon check
        let coupon = match coupon_id {
            Some(cid) if !lines.is_empty() => {
                let c = tx.coupon.as_ref().ok_or_else(|| AppError {
                    code: AppErrorCode::CouponNotFound,
                    detail: Some(cid.to_string()),
                })?;
                let grant = tx.grants.iter_mut().find(|g| !g.used).ok_or_else(|| AppError {
                    code: AppErrorCode::CouponNotOwned,
                    detail: Some(format!("usr:{}, coupon:{}", args.owner, cid)),
                })?;
                Some((c, grant))
            }
            _others => None,
        };
        OrderModel::try_build(args, lines, coupon, &policy)
    } // end of fn create_cb
} // end of impl CreateOrderUseCase

impl RetrieveOrderUseCase {
    pub async fn execute(self, order_id: u64) -> DefaultResult<OrderDto, AppError> {
        let order = self.repo.fetch_by_id(order_id).await?;
        if order.owner == self.usr_id {
            Ok(order.into())
        } else {
            Err(AppError {
                code: AppErrorCode::OrderNotFound,
                detail: Some(order_id.to_string()),
            })
        }
    }

    /// latest order first
    pub async fn list(self) -> DefaultResult<Vec<OrderDto>, AppError> {
        let mut orders = self.repo.fetch_by_owner(self.usr_id).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders.into_iter().map(OrderDto::from).collect())
    }
}
