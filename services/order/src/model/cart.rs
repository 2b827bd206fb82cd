use std::result::Result as DefaultResult;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;

use crate::constant::limit;
use crate::error::AppError;

use super::{StockLevelModelSet, StockTarget};

#[derive(Debug, Clone, PartialEq)]
pub struct CartLineModel {
    pub id: u64,
    pub product_id: u64,
    pub sku_id: Option<u64>,
    pub qty: u32,
    pub price: Decimal, // unit price captured when the line was added
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
pub struct CartModel {
    pub owner: u64,
    pub lines: Vec<CartLineModel>,
}

pub struct CartLineAddReq {
    pub new_line_id: u64,
    pub product_id: u64,
    pub sku_id: Option<u64>,
    pub qty: u32,
    pub price: Decimal,
    pub now: DateTime<FixedOffset>,
}

fn check_qty(qty: u32) -> DefaultResult<(), AppError> {
    if qty == 0 || qty > limit::MAX_QTY_PER_LINE {
        Err(AppError {
            code: AppErrorCode::InvalidInput,
            detail: Some(format!("quantity:{qty}")),
        })
    } else {
        Ok(())
    }
}

impl CartLineModel {
    pub fn target(&self) -> StockTarget {
        StockTarget::resolve(self.product_id, self.sku_id)
    }
}

impl CartModel {
    pub fn new(owner: u64) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn line_not_found(&self, line_id: u64) -> AppError {
        AppError {
            code: AppErrorCode::CartLineNotExist,
            detail: Some(format!("owner:{}, line:{}", self.owner, line_id)),
        }
    }

    /// Add a selection to the cart, or increase the quantity of the line
    /// holding the same selection. Availability is verified against the
    /// new total quantity of the line, returns ID of the affected line.
    pub fn add_line(
        &mut self,
        req: CartLineAddReq,
        stock: &mut StockLevelModelSet,
    ) -> DefaultResult<u64, AppError> {
        check_qty(req.qty)?;
        let target = StockTarget::resolve(req.product_id, req.sku_id);
        let found = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == req.product_id && l.sku_id == req.sku_id);
        if let Some(line) = found {
            let wanted = line.qty.saturating_add(req.qty);
            check_qty(wanted)?;
            stock.rehold(&target, line.qty, wanted)?;
            line.qty = wanted;
            Ok(line.id)
        } else {
            if self.lines.len() >= limit::MAX_CART_LINES {
                let detail = format!("owner:{}, num-lines:{}", self.owner, self.lines.len());
                return Err(AppError {
                    code: AppErrorCode::ExceedingMaxLimit,
                    detail: Some(detail),
                });
            }
            stock.rehold(&target, 0, req.qty)?;
            self.lines.push(CartLineModel {
                id: req.new_line_id,
                product_id: req.product_id,
                sku_id: req.sku_id,
                qty: req.qty,
                price: req.price,
                created_at: req.now,
            });
            Ok(req.new_line_id)
        }
    } // end of fn add_line

    pub fn update_qty(
        &mut self,
        line_id: u64,
        qty: u32,
        stock: &mut StockLevelModelSet,
    ) -> DefaultResult<(), AppError> {
        check_qty(qty)?;
        let err = self.line_not_found(line_id);
        let line = self.lines.iter_mut().find(|l| l.id == line_id).ok_or(err)?;
        stock.rehold(&line.target(), line.qty, qty)?;
        line.qty = qty;
        Ok(())
    }

    pub fn remove_line(
        &mut self,
        line_id: u64,
        stock: &mut StockLevelModelSet,
    ) -> DefaultResult<CartLineModel, AppError> {
        let pos = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| self.line_not_found(line_id))?;
        let line = self.lines.remove(pos);
        // stock entry could be deleted by seller after the line was added
        if let Ok(s) = stock.find_mut(&line.target()) {
            s.rehold(line.qty, 0)?;
        }
        Ok(line)
    }

    pub fn clear(&mut self, stock: &mut StockLevelModelSet) -> Vec<CartLineModel> {
        let removed = self.lines.drain(..).collect::<Vec<_>>();
        removed.iter().for_each(|line| {
            if let Ok(s) = stock.find_mut(&line.target()) {
                s.release(line.qty);
            }
        });
        removed
    }

    pub fn stock_targets(&self) -> Vec<StockTarget> {
        self.lines.iter().map(CartLineModel::target).collect()
    }
} // end of impl CartModel
