use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::{
    jsn_deserialize_id, jsn_deserialize_opt_id, jsn_serialize_id, jsn_serialize_opt_id,
};
use crate::error::AppError;
use crate::gateway::{GatewayCallbackModel, GatewayNetCancelResultModel, GatewayPayParamsModel};
use crate::model::{
    OrderLineModel, OrderModel, OrderStatus, PaymentMethod, PaymentStatus, ShippingSnapshotModel,
    StockLevelModel, StockTarget,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct AppErrorDto {
    pub code: String,
    pub detail: Option<String>,
}

impl From<AppError> for AppErrorDto {
    fn from(value: AppError) -> Self {
        Self {
            code: format!("{:?}", value.code),
            detail: value.detail,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CartLineAddReqDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    #[serde(
        default,
        deserialize_with = "jsn_deserialize_opt_id",
        serialize_with = "jsn_serialize_opt_id"
    )]
    pub sku_id: Option<u64>,
    pub quantity: u32,
    // price applied by promotion flows, sale price of the product is used if absent
    #[serde(default)]
    pub price_override: Option<Decimal>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CartSelectionReqDto {
    #[serde(
        default,
        deserialize_with = "jsn_deserialize_opt_id",
        serialize_with = "jsn_serialize_opt_id"
    )]
    pub sku_id: Option<u64>,
    pub quantity: u32,
}

/// several option combinations of the same product added at once
#[derive(Debug, Deserialize, Serialize)]
pub struct CartMultiAddReqDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    pub selections: Vec<CartSelectionReqDto>,
}

#[derive(Debug, Serialize)]
pub struct CartLineAddResultDto {
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub sku_id: Option<u64>,
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub line_id: Option<u64>,
    pub error: Option<AppErrorDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CartLineUpdateReqDto {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartLineDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub line_id: u64,
    #[serde(serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub sku_id: Option<u64>,
    pub quantity: u32,
    pub price: Decimal,
    // none if the product or the SKU was removed by seller
    pub current_price: Option<Decimal>,
    pub price_changed: bool,
    pub stock_available: bool,
}

#[derive(Debug, Serialize)]
pub struct CartDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub owner: u64,
    pub lines: Vec<CartLineDto>,
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrderCreateReqDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub address_id: u64,
    pub pay_method: PaymentMethod,
    #[serde(
        default,
        deserialize_with = "jsn_deserialize_opt_id",
        serialize_with = "jsn_serialize_opt_id"
    )]
    pub coupon_id: Option<u64>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrderCreateDirectReqDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    #[serde(
        default,
        deserialize_with = "jsn_deserialize_opt_id",
        serialize_with = "jsn_serialize_opt_id"
    )]
    pub sku_id: Option<u64>,
    pub quantity: u32,
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub address_id: u64,
    pub pay_method: PaymentMethod,
    #[serde(
        default,
        deserialize_with = "jsn_deserialize_opt_id",
        serialize_with = "jsn_serialize_opt_id"
    )]
    pub coupon_id: Option<u64>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShippingDto {
    pub recipient: String,
    pub phone: String,
    pub postcode: String,
    pub address1: String,
    pub address2: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub sku_id: Option<u64>,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub order_id: u64,
    pub order_number: String,
    #[serde(serialize_with = "jsn_serialize_id")]
    pub owner: u64,
    pub shipping: ShippingDto,
    pub lines: Vec<OrderLineDto>,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub delivery_fee: Decimal,
    pub final_amount: Decimal,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub pay_method: PaymentMethod,
    pub payment_id: Option<String>,
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub coupon_id: Option<u64>,
    pub paid_at: Option<DateTime<FixedOffset>>,
    pub refunded_amount: Option<Decimal>,
    pub memo: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrderRefundReqDto {
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrderCancelReqDto {
    pub reason: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrderFulfillmentReqDto {
    pub next: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct PaymentRequestDto {
    pub gateway: String,
    pub merchant_id: String,
    pub order_number: String,
    pub goods_name: String,
    pub amount: Decimal,
    pub buyer_name: String,
    pub buyer_tel: String,
    pub pay_method: PaymentMethod,
    pub return_url: String,
    pub close_url: String,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallbackReqDto {
    pub result_code: String,
    #[serde(default)]
    pub result_msg: String,
    pub order_number: String,
    pub auth_url: String,
    pub net_cancel_url: String,
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct NetCancelDto {
    pub success: bool,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct GatewayCallbackRespDto {
    pub order: Option<OrderDto>,
    pub error: Option<AppErrorDto>,
    // present only when a compensating network cancel was attempted
    pub net_cancel: Option<NetCancelDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookReqDto {
    pub event_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookPayApprovedDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub order_id: u64,
    pub payment_id: String,
    pub paid_amount: Decimal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookPayFailedDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub order_id: u64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SettlementLineDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub sku_id: Option<u64>,
    // none if the product was removed after the order was paid
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub seller_id: Option<u64>,
    pub quantity: u32,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SettlementOrderDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub order_id: u64,
    pub order_number: String,
    pub final_amount: Decimal,
    pub paid_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
    pub lines: Vec<SettlementLineDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StockLevelEditReqDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub product_id: u64,
    #[serde(
        default,
        deserialize_with = "jsn_deserialize_opt_id",
        serialize_with = "jsn_serialize_opt_id"
    )]
    pub sku_id: Option<u64>,
    // number of units added to the total stock
    pub qty_add: u32,
}

#[derive(Debug, Serialize)]
pub struct StockLevelDto {
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub product_id: Option<u64>,
    #[serde(serialize_with = "jsn_serialize_opt_id")]
    pub sku_id: Option<u64>,
    pub total: u32,
    pub reserved: u32,
    pub available: u32,
    pub active: bool,
}

impl From<ShippingSnapshotModel> for ShippingDto {
    fn from(value: ShippingSnapshotModel) -> Self {
        Self {
            recipient: value.recipient,
            phone: value.phone,
            postcode: value.postcode,
            address1: value.address1,
            address2: value.address2,
        }
    }
}

impl From<OrderLineModel> for OrderLineDto {
    fn from(value: OrderLineModel) -> Self {
        Self {
            product_id: value.product_id,
            sku_id: value.sku_id,
            product_name: value.product_name,
            quantity: value.qty,
            unit_price: value.unit_price,
            total_price: value.total_price,
        }
    }
}

impl From<OrderModel> for OrderDto {
    fn from(value: OrderModel) -> Self {
        Self {
            order_id: value.id,
            order_number: value.number,
            owner: value.owner,
            shipping: value.shipping.into(),
            lines: value.lines.into_iter().map(OrderLineDto::from).collect(),
            total_amount: value.total_amount,
            discount_amount: value.discount_amount,
            delivery_fee: value.delivery_fee,
            final_amount: value.final_amount,
            order_status: value.status,
            payment_status: value.pay_status,
            pay_method: value.pay_method,
            payment_id: value.payment_id,
            coupon_id: value.coupon.map(|c| c.coupon_id),
            paid_at: value.paid_at,
            refunded_amount: value.refunded_amount,
            memo: value.memo,
            reason: value.reason,
            created_at: value.created_at,
        }
    }
}

impl From<GatewayPayParamsModel> for PaymentRequestDto {
    fn from(value: GatewayPayParamsModel) -> Self {
        Self {
            gateway: value.gateway,
            merchant_id: value.merchant_id,
            order_number: value.order_number,
            goods_name: value.goods_name,
            amount: value.amount,
            buyer_name: value.buyer_name,
            buyer_tel: value.buyer_tel,
            pay_method: value.pay_method,
            return_url: value.return_url,
            close_url: value.close_url,
            timestamp: value.timestamp,
        }
    }
}

impl From<GatewayCallbackReqDto> for GatewayCallbackModel {
    fn from(value: GatewayCallbackReqDto) -> Self {
        Self {
            result_code: value.result_code,
            result_msg: value.result_msg,
            order_number: value.order_number,
            auth_url: value.auth_url,
            net_cancel_url: value.net_cancel_url,
            auth_token: value.auth_token,
        }
    }
}

impl From<GatewayNetCancelResultModel> for NetCancelDto {
    fn from(value: GatewayNetCancelResultModel) -> Self {
        Self {
            success: value.success,
            status: value.status,
            message: value.message,
        }
    }
}

impl From<&StockLevelModel> for StockLevelDto {
    fn from(value: &StockLevelModel) -> Self {
        let (product_id, sku_id) = match value.target {
            StockTarget::Single { product_id } => (Some(product_id), None),
            StockTarget::Sku { sku_id } => (None, Some(sku_id)),
        };
        Self {
            product_id,
            sku_id,
            total: value.total,
            reserved: value.reserved,
            available: value.num_avail(),
            active: value.active,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CouponIssueReqDto {
    #[serde(deserialize_with = "jsn_deserialize_id", serialize_with = "jsn_serialize_id")]
    pub coupon_id: u64,
    // decimal strings, parsed one by one
    pub usr_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserCouponDto {
    #[serde(serialize_with = "jsn_serialize_id")]
    pub grant_id: u64,
    #[serde(serialize_with = "jsn_serialize_id")]
    pub coupon_id: u64,
    pub name: String,
    pub used: bool,
    pub used_at: Option<DateTime<FixedOffset>>,
    // evaluated against the order total given by the client
    pub usable: bool,
    pub discount: Decimal,
}
