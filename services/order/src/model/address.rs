use std::result::Result as DefaultResult;

use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

use super::ShippingSnapshotModel;

#[derive(Debug, Clone, PartialEq)]
pub struct AddressModel {
    pub id: u64,
    pub usr_id: u64,
    pub recipient: String,
    pub phone: String,
    pub postcode: String,
    pub address1: String,
    pub address2: Option<String>,
}

impl AddressModel {
    pub fn validate(&self) -> DefaultResult<(), AppError> {
        let empty_field = [
            ("recipient", &self.recipient),
            ("phone", &self.phone),
            ("postcode", &self.postcode),
            ("address1", &self.address1),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k);
        if let Some(label) = empty_field {
            Err(AppError {
                code: AppErrorCode::EmptyInputData,
                detail: Some(format!("address:{}, field:{}", self.id, label)),
            })
        } else {
            Ok(())
        }
    }

    // address owned by other users is reported as absent
    pub fn check_owner(&self, usr_id: u64) -> DefaultResult<(), AppError> {
        if self.usr_id == usr_id {
            Ok(())
        } else {
            Err(AppError {
                code: AppErrorCode::AddressNotFound,
                detail: Some(format!("address:{}, usr:{}", self.id, usr_id)),
            })
        }
    }
}

impl From<AddressModel> for ShippingSnapshotModel {
    fn from(value: AddressModel) -> Self {
        Self {
            recipient: value.recipient,
            phone: value.phone,
            postcode: value.postcode,
            address1: value.address1,
            address2: value.address2,
        }
    }
}
