mod address;
mod cart;
mod coupon;
mod order;
mod product;
mod stock_level;

pub use address::AddressModel;
pub use cart::{CartLineAddReq, CartLineModel, CartModel};
pub use coupon::{CouponDiscountMode, CouponModel, UserCouponModel};
pub use order::{
    OrderCouponModel, OrderCreateArgs, OrderLineModel, OrderModel, OrderPricingPolicy,
    OrderStatus, PaymentMethod, PaymentStatus, ShippingSnapshotModel,
};
pub use product::{ProductModel, ProductModelSet, SkuModel};
pub use stock_level::{
    StockLedgerOp, StockLedgerReq, StockLevelModel, StockLevelModelSet, StockTarget,
};
