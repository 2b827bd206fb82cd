use std::boxed::Box;
use std::collections::{HashMap, HashSet};
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;

use crate::datastore::{AbstInMemoryDStore, AppInMemDstoreLock, AppInMemFetchedSingleTable};
use crate::error::AppError;
use crate::model::{ProductModel, ProductModelSet, SkuModel};
use crate::repository::AbsProductRepo;

use super::KeyPrefixFilter;

#[allow(non_snake_case)]
pub(super) mod ProductTable {
    use super::super::{col_bool, col_from_bool, col_parse, col_string};
    use super::{AppError, AppInMemFetchedSingleTable, DefaultResult, ProductModel};

    pub(in super::super) const LABEL: &str = "product";
    enum InMemColIdx {
        SellerId,
        Name,
        Single,
        OriginalPrice,
        SalePrice,
    }
    impl From<InMemColIdx> for usize {
        fn from(value: InMemColIdx) -> usize {
            match value {
                InMemColIdx::SellerId => 0,
                InMemColIdx::Name => 1,
                InMemColIdx::Single => 2,
                InMemColIdx::OriginalPrice => 3,
                InMemColIdx::SalePrice => 4,
            }
        }
    }

    pub(super) fn to_rows(items: &[ProductModel]) -> AppInMemFetchedSingleTable {
        items
            .iter()
            .map(|p| {
                let row = vec![
                    p.seller_id.to_string(),
                    p.name.clone(),
                    col_from_bool(p.single),
                    p.original_price.to_string(),
                    p.sale_price.to_string(),
                ];
                (p.id.to_string(), row)
            })
            .collect()
    }

    pub(super) fn from_row(key: &str, row: &[String]) -> DefaultResult<ProductModel, AppError> {
        Ok(ProductModel {
            id: key.parse().map_err(|_e| super::super::malformed_key(LABEL, key))?,
            seller_id: col_parse(row, InMemColIdx::SellerId.into(), LABEL)?,
            name: col_string(row, InMemColIdx::Name.into(), LABEL)?,
            single: col_bool(row, InMemColIdx::Single.into(), LABEL)?,
            original_price: col_parse(row, InMemColIdx::OriginalPrice.into(), LABEL)?,
            sale_price: col_parse(row, InMemColIdx::SalePrice.into(), LABEL)?,
            skus: Vec::new(),
        })
    }
} // end of inner-mod ProductTable

#[allow(non_snake_case)]
pub(super) mod SkuTable {
    use super::super::{col_parse, col_string, key_suffix};
    use super::{AppError, AppInMemFetchedSingleTable, DefaultResult, SkuModel};

    pub(in super::super) const LABEL: &str = "product_sku";
    const COL_LABEL: usize = 0;
    const COL_SALE_PRICE: usize = 1;

    pub(super) fn pkey(product_id: u64, sku_id: u64) -> String {
        format!("{product_id}-{sku_id}")
    }

    pub(super) fn to_rows(items: &[SkuModel]) -> AppInMemFetchedSingleTable {
        items
            .iter()
            .map(|s| {
                let row = vec![s.label.clone(), s.sale_price.to_string()];
                (pkey(s.product_id, s.id), row)
            })
            .collect()
    }

    pub(super) fn from_row(
        product_id: u64,
        key: &str,
        row: &[String],
    ) -> DefaultResult<SkuModel, AppError> {
        Ok(SkuModel {
            id: key_suffix(key, LABEL)?,
            product_id,
            label: col_string(row, COL_LABEL, LABEL)?,
            sale_price: col_parse(row, COL_SALE_PRICE, LABEL)?,
        })
    }
} // end of inner-mod SkuTable

fn sku_keys(lock: &AppInMemDstoreLock, product_ids: &[u64]) -> DefaultResult<Vec<String>, AppError> {
    let prefixes = product_ids.iter().map(u64::to_string).collect::<HashSet<_>>();
    lock.filter_keys(SkuTable::LABEL, &KeyPrefixFilter(prefixes))
}

/// Load products with their SKUs through a lock already held by caller.
pub(super) fn load_products(
    lock: &AppInMemDstoreLock,
    ids: &[u64],
) -> DefaultResult<ProductModelSet, AppError> {
    let skeys = sku_keys(lock, ids)?;
    let info = HashMap::from([
        (
            ProductTable::LABEL.to_string(),
            ids.iter().map(u64::to_string).collect(),
        ),
        (SkuTable::LABEL.to_string(), skeys),
    ]);
    let mut fetched = lock.fetch(info)?;
    let prows = fetched.remove(ProductTable::LABEL).unwrap_or_default();
    let skurows = fetched.remove(SkuTable::LABEL).unwrap_or_default();
    let mut items = prows
        .iter()
        .map(|(k, row)| ProductTable::from_row(k, row))
        .collect::<DefaultResult<Vec<_>, AppError>>()?;
    for product in items.iter_mut() {
        let prefix = format!("{}-", product.id);
        product.skus = skurows
            .iter()
            .filter(|(k, _)| k.starts_with(prefix.as_str()))
            .map(|(k, row)| SkuTable::from_row(product.id, k, row))
            .collect::<DefaultResult<Vec<_>, AppError>>()?;
        product.skus.sort_by_key(|s| s.id);
    }
    Ok(ProductModelSet { items })
}

pub struct ProductInMemRepo {
    datastore: Arc<Box<dyn AbstInMemoryDStore>>,
}

impl ProductInMemRepo {
    pub async fn new(m: Arc<Box<dyn AbstInMemoryDStore>>) -> DefaultResult<Self, AppError> {
        m.create_table(ProductTable::LABEL).await?;
        m.create_table(SkuTable::LABEL).await?;
        Ok(Self { datastore: m })
    }
}

#[async_trait]
impl AbsProductRepo for ProductInMemRepo {
    async fn save(&self, ms: ProductModelSet) -> DefaultResult<(), AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        let pids = ms.items.iter().map(|p| p.id).collect::<Vec<_>>();
        let new_skukeys = ms
            .items
            .iter()
            .flat_map(|p| p.skus.iter().map(|s| SkuTable::pkey(s.product_id, s.id)))
            .collect::<HashSet<_>>();
        // SKUs dropped from a product are removed
        let discarding = sku_keys(&lock, &pids)?
            .into_iter()
            .filter(|k| !new_skukeys.contains(k))
            .collect::<Vec<_>>();
        let skus = ms
            .items
            .iter()
            .flat_map(|p| p.skus.iter().cloned())
            .collect::<Vec<_>>();
        let data = HashMap::from([
            (ProductTable::LABEL.to_string(), ProductTable::to_rows(&ms.items)),
            (SkuTable::LABEL.to_string(), SkuTable::to_rows(&skus)),
        ]);
        let deleting = HashMap::from([(SkuTable::LABEL.to_string(), discarding)]);
        let _num = self.datastore.commit_release(data, deleting, lock)?;
        Ok(())
    }

    async fn fetch(&self, ids: Vec<u64>) -> DefaultResult<ProductModelSet, AppError> {
        let (_, lock) = self.datastore.fetch_acquire(HashMap::new()).await?;
        load_products(&lock, &ids)
    }
}
