pub mod limit {
    pub const MAX_QTY_PER_LINE: u32 = 9999;
    pub const MAX_CART_LINES: usize = 150;
    pub const MAX_SELECTIONS_PER_REQ: usize = 30;
    pub const MAX_ORDER_MEMO_LEN: usize = 500;
    pub const MAX_REASON_LEN: usize = 300;
}

pub mod webhook_event {
    pub const PAYMENT_APPROVED: &str = "payment.approved";
    pub const PAYMENT_FAILED: &str = "payment.failed";
}

pub(crate) const ORDER_NUMBER_DATE_FMT: &str = "%Y%m%d";
// custom epoch of generated identifiers, 2024-01-01T00:00:00Z
pub(crate) const ID_EPOCH_MILLIS: i64 = 1_704_067_200_000;
