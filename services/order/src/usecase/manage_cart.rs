use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use chrono::Local as LocalTime;
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::api::dto::{
    CartDto, CartLineAddReqDto, CartLineAddResultDto, CartLineDto, CartMultiAddReqDto,
};
use crate::constant::limit;
use crate::error::AppError;
use crate::model::{CartLineAddReq, CartModel, StockLevelModelSet};
use crate::repository::{AbsCartRepo, AbsProductRepo, AbsStockRepo, CartEditReq};
use crate::AppIdGenerator;

pub struct AddCartLineUseCase {
    pub repo_cart: Box<dyn AbsCartRepo>,
    pub repo_product: Box<dyn AbsProductRepo>,
    pub id_gen: Arc<AppIdGenerator>,
    pub logctx: Arc<AppLogContext>,
    pub usr_id: u64,
}
pub struct ModifyCartLineUseCase {
    pub repo: Box<dyn AbsCartRepo>,
    pub logctx: Arc<AppLogContext>,
    pub usr_id: u64,
}
pub struct RetrieveCartUseCase {
    pub repo_cart: Box<dyn AbsCartRepo>,
    pub repo_product: Box<dyn AbsProductRepo>,
    pub repo_stock: Box<dyn AbsStockRepo>,
    pub usr_id: u64,
}

// reservation and cart content evolve within the same transaction
fn cart_edit_cb(
    cart: &mut CartModel,
    stock: &mut StockLevelModelSet,
    req: CartEditReq,
) -> DefaultResult<Vec<u64>, AppError> {
    match req {
        CartEditReq::Add(r) => cart.add_line(r, stock).map(|id| vec![id]),
        CartEditReq::Update { line_id, qty } => {
            cart.update_qty(line_id, qty, stock)?;
            Ok(vec![line_id])
        }
        CartEditReq::Remove { line_id } => cart.remove_line(line_id, stock).map(|l| vec![l.id]),
        CartEditReq::Clear => Ok(cart.clear(stock).into_iter().map(|l| l.id).collect()),
    }
}

impl AddCartLineUseCase {
    pub async fn execute(self, data: CartLineAddReqDto) -> DefaultResult<u64, AppError> {
        let CartLineAddReqDto {
            product_id,
            sku_id,
            quantity,
            price_override,
        } = data;
        self.add_one(product_id, sku_id, quantity, price_override)
            .await
    }

    /// Each selection is added independently, a failed selection does
    /// not roll back those which succeeded before it.
    pub async fn execute_multi(
        self,
        data: CartMultiAddReqDto,
    ) -> DefaultResult<Vec<CartLineAddResultDto>, AppError> {
        let num = data.selections.len();
        if num == 0 || num > limit::MAX_SELECTIONS_PER_REQ {
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("num-selections:{num}")),
            });
        }
        let mut out = Vec::with_capacity(num);
        for sel in data.selections {
            let result = self
                .add_one(data.product_id, sel.sku_id, sel.quantity, None)
                .await;
            let item = match result {
                Ok(line_id) => CartLineAddResultDto {
                    sku_id: sel.sku_id,
                    line_id: Some(line_id),
                    error: None,
                },
                Err(e) => CartLineAddResultDto {
                    sku_id: sel.sku_id,
                    line_id: None,
                    error: Some(e.into()),
                },
            };
            out.push(item);
        }
        Ok(out)
    }

    async fn add_one(
        &self,
        product_id: u64,
        sku_id: Option<u64>,
        qty: u32,
        price_override: Option<Decimal>,
    ) -> DefaultResult<u64, AppError> {
        let products = self.repo_product.fetch(vec![product_id]).await?;
        let (_product, _target, sale_price) = products.resolve(product_id, sku_id)?;
        let price = match price_override {
            Some(p) if p.is_sign_negative() => {
                return Err(AppError {
                    code: AppErrorCode::InvalidInput,
                    detail: Some(format!("price-override:{p}")),
                });
            }
            Some(p) => p,
            None => sale_price,
        };
        let req = CartLineAddReq {
            new_line_id: self.id_gen.next_id(),
            product_id,
            sku_id,
            qty,
            price,
            now: LocalTime::now().fixed_offset(),
        };
        let result = self
            .repo_cart
            .try_edit(self.usr_id, CartEditReq::Add(req), cart_edit_cb)
            .await;
        let logctx = &self.logctx;
        match result {
            Ok(mut ids) => {
                app_log_event!(logctx, AppLogLevel::DEBUG, "usr:{}, product:{product_id}, sku:{sku_id:?}, qty:{qty}", self.usr_id);
                ids.pop().ok_or_else(|| AppError {
                    code: AppErrorCode::DataCorruption,
                    detail: Some("cart-add-no-line".to_string()),
                })
            }
            Err(e) => {
                app_log_event!(logctx, AppLogLevel::WARNING, "usr:{}, product:{product_id}, {e}", self.usr_id);
                Err(e)
            }
        }
    } // end of fn add_one
} // end of impl AddCartLineUseCase

impl ModifyCartLineUseCase {
    pub async fn update(self, line_id: u64, qty: u32) -> DefaultResult<(), AppError> {
        let req = CartEditReq::Update { line_id, qty };
        self.edit(req).await.map(|_ids| ())
    }

    pub async fn remove(self, line_id: u64) -> DefaultResult<(), AppError> {
        let req = CartEditReq::Remove { line_id };
        self.edit(req).await.map(|_ids| ())
    }

    /// returns IDs of the removed lines
    pub async fn clear(self) -> DefaultResult<Vec<u64>, AppError> {
        self.edit(CartEditReq::Clear).await
    }

    async fn edit(&self, req: CartEditReq) -> DefaultResult<Vec<u64>, AppError> {
        let result = self.repo.try_edit(self.usr_id, req, cart_edit_cb).await;
        if let Err(e) = result.as_ref() {
            let logctx = &self.logctx;
            app_log_event!(logctx, AppLogLevel::WARNING, "usr:{}, {e}", self.usr_id);
        }
        result
    }
}

impl RetrieveCartUseCase {
    pub async fn execute(self) -> DefaultResult<CartDto, AppError> {
        let cart = self.repo_cart.fetch_cart(self.usr_id).await?;
        let mut pids = cart.lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        pids.sort_unstable();
        pids.dedup();
        let products = self.repo_product.fetch(pids).await?;
        // always read from the ledger, never cached with the cart
        let stock = self.repo_stock.fetch(cart.stock_targets()).await?;
        let lines = cart
            .lines
            .into_iter()
            .map(|l| {
                let target = l.target();
                let current_price = products
                    .find(l.product_id)
                    .and_then(|p| p.current_price(&target));
                let stock_available = stock
                    .find(&target)
                    .map_or(false, |s| s.check_held(l.qty));
                CartLineDto {
                    line_id: l.id,
                    product_id: l.product_id,
                    sku_id: l.sku_id,
                    quantity: l.qty,
                    price: l.price,
                    price_changed: current_price != Some(l.price),
                    current_price,
                    stock_available,
                }
            })
            .collect::<Vec<_>>();
        let total_amount = lines
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum();
        Ok(CartDto {
            owner: cart.owner,
            lines,
            total_amount,
        })
    } // end of fn execute
} // end of impl RetrieveCartUseCase
