use std::boxed::Box;
use std::collections::HashMap;
use std::result::Result as DefaultResult;
use std::sync::Arc;

use async_trait::async_trait;

use ecommerce_common::error::AppErrorCode;

use crate::datastore::AbstInMemoryDStore;
use crate::error::AppError;
use crate::model::AddressModel;
use crate::repository::AbsAddressRepo;

use super::{col_from_opt, col_parse, col_string, col_string_opt, malformed_key};

const TABLE_LABEL: &str = "address";

enum InMemColIdx {
    UsrId,
    Recipient,
    Phone,
    Postcode,
    Address1,
    Address2,
}
impl From<InMemColIdx> for usize {
    fn from(value: InMemColIdx) -> usize {
        match value {
            InMemColIdx::UsrId => 0,
            InMemColIdx::Recipient => 1,
            InMemColIdx::Phone => 2,
            InMemColIdx::Postcode => 3,
            InMemColIdx::Address1 => 4,
            InMemColIdx::Address2 => 5,
        }
    }
}

pub struct AddressInMemRepo {
    datastore: Arc<Box<dyn AbstInMemoryDStore>>,
}

impl AddressInMemRepo {
    pub async fn new(m: Arc<Box<dyn AbstInMemoryDStore>>) -> DefaultResult<Self, AppError> {
        m.create_table(TABLE_LABEL).await?;
        Ok(Self { datastore: m })
    }
}

#[async_trait]
impl AbsAddressRepo for AddressInMemRepo {
    async fn save(&self, addr: AddressModel) -> DefaultResult<(), AppError> {
        let row = vec![
            addr.usr_id.to_string(),
            addr.recipient,
            addr.phone,
            addr.postcode,
            addr.address1,
            col_from_opt(addr.address2),
        ];
        let table = HashMap::from([(addr.id.to_string(), row)]);
        let data = HashMap::from([(TABLE_LABEL.to_string(), table)]);
        let _num = self.datastore.save(data).await?;
        Ok(())
    }

    async fn fetch(&self, id: u64) -> DefaultResult<AddressModel, AppError> {
        let info = HashMap::from([(TABLE_LABEL.to_string(), vec![id.to_string()])]);
        let rows = self
            .datastore
            .fetch(info)
            .await?
            .remove(TABLE_LABEL)
            .unwrap_or_default();
        let (key, row) = rows.into_iter().next().ok_or(AppError {
            code: AppErrorCode::AddressNotFound,
            detail: Some(id.to_string()),
        })?;
        Ok(AddressModel {
            id: key.parse().map_err(|_e| malformed_key(TABLE_LABEL, key.as_str()))?,
            usr_id: col_parse(&row, InMemColIdx::UsrId.into(), TABLE_LABEL)?,
            recipient: col_string(&row, InMemColIdx::Recipient.into(), TABLE_LABEL)?,
            phone: col_string(&row, InMemColIdx::Phone.into(), TABLE_LABEL)?,
            postcode: col_string(&row, InMemColIdx::Postcode.into(), TABLE_LABEL)?,
            address1: col_string(&row, InMemColIdx::Address1.into(), TABLE_LABEL)?,
            address2: col_string_opt(&row, InMemColIdx::Address2.into(), TABLE_LABEL)?,
        })
    }
}
