mod coupon;
mod edit_catalog;
mod manage_cart;
mod manage_order;
mod payment;
mod settlement;
mod stock_ledger;

pub use coupon::{IssueCouponUseCase, ListUserCouponUseCase};
pub use edit_catalog::{DefineCouponUseCase, EditProductUseCase, SaveAddressUseCase};
pub use manage_cart::{AddCartLineUseCase, ModifyCartLineUseCase, RetrieveCartUseCase};
pub use manage_order::{CreateOrderUseCase, RetrieveOrderUseCase};
pub use payment::{
    GatewayCallbackUseCase, OrderPaymentUseCase, PayCallbackUsKsErr, PaymentRequestUseCase,
    PaymentWebhookUseCase,
};
pub use settlement::SettlementReplicaUseCase;
pub use stock_ledger::{StockLedgerUseCase, StockLevelEditUseCase};
