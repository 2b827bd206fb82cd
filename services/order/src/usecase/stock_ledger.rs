use std::boxed::Box;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use ecommerce_common::error::AppErrorCode;
use ecommerce_common::logging::{app_log_event, AppLogContext, AppLogLevel};

use crate::api::dto::{StockLevelDto, StockLevelEditReqDto};
use crate::error::AppError;
use crate::model::{
    StockLedgerOp, StockLedgerReq, StockLevelModel, StockLevelModelSet, StockTarget,
};
use crate::repository::{AbsProductRepo, AbsStockRepo};

/// Standalone ledger operations, each one runs in its own transaction.
/// Cart, order and payment flows embed the same operations in their
/// own transactions instead of calling this use case.
pub struct StockLedgerUseCase {
    pub repo: Box<dyn AbsStockRepo>,
    pub logctx: Arc<AppLogContext>,
}

pub struct StockLevelEditUseCase {
    pub repo_stock: Box<dyn AbsStockRepo>,
    pub repo_product: Box<dyn AbsProductRepo>,
    pub logctx: Arc<AppLogContext>,
}

impl StockLedgerUseCase {
    pub async fn check_available(
        &self,
        target: StockTarget,
        qty: u32,
    ) -> DefaultResult<bool, AppError> {
        let ms = self.repo.fetch(vec![target]).await?;
        ms.check_available(&target, qty)
    }

    pub async fn reserve(&self, target: StockTarget, qty: u32) -> DefaultResult<StockLevelDto, AppError> {
        self.edit(target, qty, StockLedgerOp::Reserve).await
    }

    pub async fn release(&self, target: StockTarget, qty: u32) -> DefaultResult<StockLevelDto, AppError> {
        self.edit(target, qty, StockLedgerOp::Release).await
    }

    pub async fn consume(&self, target: StockTarget, qty: u32) -> DefaultResult<StockLevelDto, AppError> {
        self.edit(target, qty, StockLedgerOp::Consume).await
    }

    pub async fn restore(&self, target: StockTarget, qty: u32) -> DefaultResult<StockLevelDto, AppError> {
        self.edit(target, qty, StockLedgerOp::Restore).await
    }

    async fn edit(
        &self,
        target: StockTarget,
        qty: u32,
        op: StockLedgerOp,
    ) -> DefaultResult<StockLevelDto, AppError> {
        let req = StockLedgerReq { target, qty, op };
        match self.repo.try_edit(vec![req], Self::edit_cb).await {
            Ok(ms) => ms
                .find(&target)
                .map(StockLevelDto::from)
                .ok_or_else(|| target.not_found_error()),
            Err(e) => {
                let logctx = &self.logctx;
                app_log_event!(logctx, AppLogLevel::WARNING, "target:{target}, op:{op:?}, qty:{qty}, {e}");
                Err(e)
            }
        }
    }

    fn edit_cb(ms: &mut StockLevelModelSet, reqs: &[StockLedgerReq]) -> DefaultResult<(), AppError> {
        ms.apply_all(reqs)
    }
} // end of impl StockLedgerUseCase

impl StockLevelEditUseCase {
    /// Register stock of new products or SKUs, or add units to the
    /// existing counters.
    pub async fn execute(
        self,
        data: Vec<StockLevelEditReqDto>,
    ) -> DefaultResult<Vec<StockLevelDto>, AppError> {
        if data.is_empty() {
            return Err(AppError {
                code: AppErrorCode::EmptyInputData,
                detail: Some("stock-level-edit".to_string()),
            });
        }
        let pids = data.iter().map(|d| d.product_id).collect::<Vec<_>>();
        let products = self.repo_product.fetch(pids).await?;
        let targets = data
            .iter()
            .map(|d| {
                let (_, target, _) = products.resolve(d.product_id, d.sku_id)?;
                Ok((target, d.qty_add))
            })
            .collect::<DefaultResult<Vec<_>, AppError>>()?;

        let saved = self
            .repo_stock
            .fetch(targets.iter().map(|t| t.0).collect())
            .await?;
        let (existing, fresh): (Vec<_>, Vec<_>) =
            targets.into_iter().partition(|(t, _)| saved.find(t).is_some());

        let mut out = Vec::new();
        if !fresh.is_empty() {
            let items = fresh
                .into_iter()
                .map(|(t, qty)| StockLevelModel::new(t, qty))
                .collect::<Vec<_>>();
            out.extend(items.iter().map(StockLevelDto::from));
            let num = items.len();
            self.repo_stock.save(StockLevelModelSet { items }).await?;
            let logctx = &self.logctx;
            app_log_event!(logctx, AppLogLevel::INFO, "registered:{num}");
        }
        if !existing.is_empty() {
            let reqs = existing
                .into_iter()
                .map(|(target, qty)| StockLedgerReq {
                    target,
                    qty,
                    op: StockLedgerOp::Restore,
                })
                .collect();
            let ms = self.repo_stock.try_edit(reqs, StockLedgerUseCase::edit_cb).await?;
            out.extend(ms.items.iter().map(StockLevelDto::from));
        }
        Ok(out)
    } // end of fn execute
} // end of impl StockLevelEditUseCase
