use std::cmp::min;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::result::Result as DefaultResult;
use std::vec::Vec;

use serde::{Deserialize, Serialize};

use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

/// The entity whose stock is counted. A single-option product keeps
/// its quantity on the product itself, a product with options keeps
/// one quantity per SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockTarget {
    Single { product_id: u64 },
    Sku { sku_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLedgerOp {
    Reserve,
    Release,
    Consume,
    Restore,
}

#[derive(Debug, Clone)]
pub struct StockLedgerReq {
    pub target: StockTarget,
    pub qty: u32,
    pub op: StockLedgerOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockLevelModel {
    pub target: StockTarget,
    pub total: u32,
    pub reserved: u32,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct StockLevelModelSet {
    pub items: Vec<StockLevelModel>,
}

impl StockTarget {
    pub fn resolve(product_id: u64, sku_id: Option<u64>) -> Self {
        match sku_id {
            Some(sku_id) => Self::Sku { sku_id },
            None => Self::Single { product_id },
        }
    }

    pub fn not_found_error(&self) -> AppError {
        let code = match self {
            Self::Single { .. } => AppErrorCode::ProductNotExist,
            Self::Sku { .. } => AppErrorCode::SkuNotExist,
        };
        AppError {
            code,
            detail: Some(self.to_string()),
        }
    }
}

impl Display for StockTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Single { product_id } => write!(f, "single-{product_id}"),
            Self::Sku { sku_id } => write!(f, "sku-{sku_id}"),
        }
    }
}

impl StockLevelModel {
    pub fn new(target: StockTarget, total: u32) -> Self {
        Self {
            target,
            total,
            reserved: 0,
            active: true,
        }
    }

    pub fn num_avail(&self) -> u32 {
        self.total.saturating_sub(self.reserved)
    }

    pub fn check_available(&self, qty: u32) -> bool {
        self.active && self.num_avail() >= qty
    }

    fn insufficient(&self, requested: u32) -> AppError {
        let detail = format!(
            "target:{}, requested:{}, available:{}, active:{}",
            self.target,
            requested,
            self.num_avail(),
            self.active
        );
        AppError {
            code: AppErrorCode::InsufficientStock,
            detail: Some(detail),
        }
    }

    pub fn reserve(&mut self, qty: u32) -> DefaultResult<(), AppError> {
        match self.target {
            StockTarget::Single { .. } => Ok(()),
            StockTarget::Sku { .. } => {
                if self.check_available(qty) {
                    self.reserved += qty;
                    Ok(())
                } else {
                    Err(self.insufficient(qty))
                }
            }
        }
    }

    // callers may release more than currently held, e.g. after an admin
    // lowered the total, the counter never goes below zero
    pub fn release(&mut self, qty: u32) {
        if let StockTarget::Sku { .. } = self.target {
            self.reserved = self.reserved.saturating_sub(qty);
        }
    }

    pub fn consume(&mut self, qty: u32) -> DefaultResult<(), AppError> {
        if self.total < qty {
            return Err(self.insufficient(qty));
        }
        self.total -= qty;
        self.reserved -= min(qty, self.reserved);
        Ok(())
    }

    pub fn restore(&mut self, qty: u32) -> DefaultResult<(), AppError> {
        self.total = self.total.checked_add(qty).ok_or_else(|| AppError {
            code: AppErrorCode::ExceedingMaxLimit,
            detail: Some(format!("target:{}, total:{}, restore:{}", self.target, self.total, qty)),
        })?;
        Ok(())
    }

    /// Move the quantity held by a cart line from `held` to `wanted`.
    /// For SKUs only the difference is reserved or released, a
    /// single-option product is only re-checked against its total.
    pub fn rehold(&mut self, held: u32, wanted: u32) -> DefaultResult<(), AppError> {
        match self.target {
            StockTarget::Single { .. } => {
                if wanted == 0 || self.check_available(wanted) {
                    Ok(())
                } else {
                    Err(self.insufficient(wanted))
                }
            }
            StockTarget::Sku { .. } => {
                if wanted > held {
                    self.reserve(wanted - held)
                } else {
                    self.release(held - wanted);
                    Ok(())
                }
            }
        }
    }

    /// whether the quantity already held by a cart line can still be
    /// fulfilled from current counters
    pub fn check_held(&self, held: u32) -> bool {
        match self.target {
            StockTarget::Single { .. } => self.check_available(held),
            StockTarget::Sku { .. } => {
                self.active && self.reserved >= held && self.total >= self.reserved
            }
        }
    }
} // end of impl StockLevelModel

impl StockLevelModelSet {
    pub fn find(&self, target: &StockTarget) -> Option<&StockLevelModel> {
        self.items.iter().find(|s| &s.target == target)
    }

    pub fn find_mut(&mut self, target: &StockTarget) -> DefaultResult<&mut StockLevelModel, AppError> {
        self.items
            .iter_mut()
            .find(|s| &s.target == target)
            .ok_or_else(|| target.not_found_error())
    }

    pub fn check_available(&self, target: &StockTarget, qty: u32) -> DefaultResult<bool, AppError> {
        self.find(target)
            .map(|s| s.check_available(qty))
            .ok_or_else(|| target.not_found_error())
    }

    pub fn apply(&mut self, req: &StockLedgerReq) -> DefaultResult<(), AppError> {
        let item = self.find_mut(&req.target)?;
        match req.op {
            StockLedgerOp::Reserve => item.reserve(req.qty),
            StockLedgerOp::Release => {
                item.release(req.qty);
                Ok(())
            }
            StockLedgerOp::Consume => item.consume(req.qty),
            StockLedgerOp::Restore => item.restore(req.qty),
        }
    }

    // the first failure aborts the batch, the repository discards every
    // change made in memory so far
    pub fn apply_all(&mut self, reqs: &[StockLedgerReq]) -> DefaultResult<(), AppError> {
        reqs.iter().try_for_each(|r| self.apply(r))
    }

    pub fn rehold(
        &mut self,
        target: &StockTarget,
        held: u32,
        wanted: u32,
    ) -> DefaultResult<(), AppError> {
        self.find_mut(target)?.rehold(held, wanted)
    }
}
