use std::result::Result as DefaultResult;

use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

use super::StockTarget;

#[derive(Debug, Clone, PartialEq)]
pub struct SkuModel {
    pub id: u64,
    pub product_id: u64,
    pub label: String,
    pub sale_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductModel {
    pub id: u64,
    pub seller_id: u64,
    pub name: String,
    pub single: bool,
    pub original_price: Decimal,
    pub sale_price: Decimal,
    pub skus: Vec<SkuModel>,
}

#[derive(Debug, Default)]
pub struct ProductModelSet {
    pub items: Vec<ProductModel>,
}

impl ProductModel {
    /// Validate the option chosen by a buyer and return the entity whose
    /// stock is counted, along with its current unit price.
    pub fn resolve(&self, sku_id: Option<u64>) -> DefaultResult<(StockTarget, Decimal), AppError> {
        match (self.single, sku_id) {
            (true, None) => Ok((StockTarget::Single { product_id: self.id }, self.sale_price)),
            (false, Some(sku_id)) => self
                .skus
                .iter()
                .find(|s| s.id == sku_id)
                .map(|s| (StockTarget::Sku { sku_id }, s.sale_price))
                .ok_or_else(|| AppError {
                    code: AppErrorCode::SkuNotExist,
                    detail: Some(format!("product:{}, sku:{}", self.id, sku_id)),
                }),
            (single, sku_id) => {
                let detail = format!("product:{}, single:{}, sku:{:?}", self.id, single, sku_id);
                Err(AppError {
                    code: AppErrorCode::InvalidSelection,
                    detail: Some(detail),
                })
            }
        }
    }

    pub fn current_price(&self, target: &StockTarget) -> Option<Decimal> {
        match target {
            StockTarget::Single { product_id } if *product_id == self.id => Some(self.sale_price),
            StockTarget::Single { .. } => None,
            StockTarget::Sku { sku_id } => self
                .skus
                .iter()
                .find(|s| s.id == *sku_id)
                .map(|s| s.sale_price),
        }
    }

    pub fn validate(&self) -> DefaultResult<(), AppError> {
        let detail = if self.name.trim().is_empty() {
            Some("empty-name")
        } else if self.sale_price.is_sign_negative() || self.original_price.is_sign_negative() {
            Some("negative-price")
        } else if self.single && !self.skus.is_empty() {
            Some("single-product-with-sku")
        } else if !self.single && self.skus.is_empty() {
            Some("missing-sku")
        } else if self
            .skus
            .iter()
            .any(|s| s.product_id != self.id || s.sale_price.is_sign_negative())
        {
            Some("invalid-sku")
        } else {
            None
        };
        if let Some(d) = detail {
            Err(AppError {
                code: AppErrorCode::InvalidInput,
                detail: Some(format!("product:{}, {}", self.id, d)),
            })
        } else {
            Ok(())
        }
    }
} // end of impl ProductModel

impl ProductModelSet {
    pub fn find(&self, product_id: u64) -> Option<&ProductModel> {
        self.items.iter().find(|p| p.id == product_id)
    }

    pub fn resolve(
        &self,
        product_id: u64,
        sku_id: Option<u64>,
    ) -> DefaultResult<(&ProductModel, StockTarget, Decimal), AppError> {
        let product = self.find(product_id).ok_or_else(|| AppError {
            code: AppErrorCode::ProductNotExist,
            detail: Some(product_id.to_string()),
        })?;
        let (target, price) = product.resolve(sku_id)?;
        Ok((product, target, price))
    }
}
