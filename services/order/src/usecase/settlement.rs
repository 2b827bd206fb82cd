use std::boxed::Box;
use std::result::Result as DefaultResult;

use chrono::{DateTime, FixedOffset};

use ecommerce_common::error::AppErrorCode;

use crate::api::dto::{SettlementLineDto, SettlementOrderDto};
use crate::error::AppError;
use crate::repository::{AbsOrderRepo, AbsProductRepo};

/// Read-only replica of payment-completed orders for the settlement
/// service, the seller of each line is resolved through its product.
pub struct SettlementReplicaUseCase {
    pub repo_order: Box<dyn AbsOrderRepo>,
    pub repo_product: Box<dyn AbsProductRepo>,
}

impl SettlementReplicaUseCase {
    pub async fn execute(
        self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> DefaultResult<Vec<SettlementOrderDto>, AppError> {
        if start >= end {
            let detail = format!("start:{}, end:{}", start.to_rfc3339(), end.to_rfc3339());
            return Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(detail),
            });
        }
        let mut orders = self.repo_order.fetch_paid_between(start, end).await?;
        orders.sort_by_key(|o| o.paid_at);
        let mut pids = orders
            .iter()
            .flat_map(|o| o.lines.iter().map(|l| l.product_id))
            .collect::<Vec<_>>();
        pids.sort_unstable();
        pids.dedup();
        let products = self.repo_product.fetch(pids).await?;
        let out = orders
            .into_iter()
            .map(|o| {
                let lines = o
                    .lines
                    .into_iter()
                    .map(|l| SettlementLineDto {
                        seller_id: products.find(l.product_id).map(|p| p.seller_id),
                        product_id: l.product_id,
                        sku_id: l.sku_id,
                        quantity: l.qty,
                        total_price: l.total_price,
                    })
                    .collect();
                SettlementOrderDto {
                    order_id: o.id,
                    order_number: o.number,
                    final_amount: o.final_amount,
                    paid_at: o.paid_at,
                    created_at: o.created_at,
                    lines,
                }
            })
            .collect();
        Ok(out)
    } // end of fn execute
}
