use chrono::Duration;
use rust_decimal::Decimal;

use ecommerce_common::error::AppErrorCode;
use marketplace_order::model::{
    OrderCreateArgs, OrderLineModel, OrderModel, OrderPricingPolicy, OrderStatus,
    PaymentMethod, PaymentStatus, StockLedgerOp, StockTarget,
};

use super::{
    ut_coupon_flat_at, ut_grant, ut_product_single, ut_product_with_skus, ut_shipping, ut_time,
};

fn ut_policy() -> OrderPricingPolicy {
    OrderPricingPolicy {
        free_delivery_threshold: Decimal::from(30000),
        delivery_fee: Decimal::from(3000),
        amount_tolerance: Decimal::ONE,
    }
}

fn ut_create_args(id: u64) -> OrderCreateArgs {
    OrderCreateArgs {
        id,
        number: format!("20240501-{id}"),
        owner: 126,
        shipping: ut_shipping(),
        pay_method: PaymentMethod::Card,
        memo: Some("leave at the door".to_string()),
        now: ut_time(),
    }
}

fn ut_order_13000() -> OrderModel {
    let product = ut_product_single(90, 3, 10000);
    let lines = vec![OrderLineModel::new(501, &product, None, 1, product.sale_price)];
    OrderModel::try_build(ut_create_args(7701), lines, None, &ut_policy()).unwrap()
}

#[test]
fn build_with_flat_coupon() {
    let product = ut_product_with_skus(80, 3, &[(801, "M / white", 18000)]);
    let lines = vec![OrderLineModel::new(501, &product, Some(801), 2, Decimal::from(18000))];
    assert_eq!(lines[0].product_name, "linen-shirt-80 / M / white");
    let coupon = ut_coupon_flat_at(44, 2000, 10000, ut_time());
    let mut grant = ut_grant(4401, 126, 44);
    let order = OrderModel::try_build(
        ut_create_args(7700),
        lines,
        Some((&coupon, &mut grant)),
        &ut_policy(),
    )
    .unwrap();
    assert_eq!(order.total_amount, Decimal::from(36000));
    assert_eq!(order.discount_amount, Decimal::from(2000));
    assert_eq!(order.delivery_fee, Decimal::ZERO);
    assert_eq!(order.final_amount, Decimal::from(34000));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.pay_status, PaymentStatus::Pending);
    assert_eq!(order.coupon.map(|c| c.grant_id), Some(4401));
    assert!(grant.used);
    assert!(grant.used_at.is_some());
    assert!(order.holds_reservation());
    let reqs = order.stock_reqs(StockLedgerOp::Consume);
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].target, StockTarget::Sku { sku_id: 801 });
    assert_eq!(reqs[0].qty, 2);
}

#[test]
fn build_delivery_fee_below_threshold() {
    let order = ut_order_13000();
    assert_eq!(order.total_amount, Decimal::from(10000));
    assert_eq!(order.delivery_fee, Decimal::from(3000));
    assert_eq!(order.final_amount, Decimal::from(13000));
    assert!(order.coupon.is_none());
}

#[test]
fn build_empty_lines() {
    let result = OrderModel::try_build(ut_create_args(7702), Vec::new(), None, &ut_policy());
    assert_eq!(result.unwrap_err().code, AppErrorCode::EmptyCart);
}

#[test]
fn build_coupon_min_amount_not_met() {
    let product = ut_product_single(90, 3, 8000);
    let lines = vec![OrderLineModel::new(501, &product, None, 1, product.sale_price)];
    let coupon = ut_coupon_flat_at(44, 2000, 10000, ut_time());
    let mut grant = ut_grant(4401, 126, 44);
    let result = OrderModel::try_build(
        ut_create_args(7703),
        lines,
        Some((&coupon, &mut grant)),
        &ut_policy(),
    );
    assert_eq!(result.unwrap_err().code, AppErrorCode::MinOrderAmountNotMet);
    assert!(!grant.used);
}

#[test]
fn build_coupon_outside_window() {
    let product = ut_product_single(90, 3, 12000);
    // window anchored 40 days before the order time, already closed
    let anchor = ut_time() - Duration::days(40);
    let coupon = ut_coupon_flat_at(44, 2000, 10000, anchor);
    let mut grant = ut_grant(4401, 126, 44);
    let lines = vec![OrderLineModel::new(501, &product, None, 1, product.sale_price)];
    let result = OrderModel::try_build(
        ut_create_args(7704),
        lines,
        Some((&coupon, &mut grant)),
        &ut_policy(),
    );
    assert_eq!(result.unwrap_err().code, AppErrorCode::CouponExpired);
    assert!(!grant.used);
    // same coupon, order placed inside the window
    let coupon = ut_coupon_flat_at(44, 2000, 10000, ut_time());
    let lines = vec![OrderLineModel::new(502, &product, None, 1, product.sale_price)];
    let order = OrderModel::try_build(
        ut_create_args(7705),
        lines,
        Some((&coupon, &mut grant)),
        &ut_policy(),
    )
    .unwrap();
    assert_eq!(order.discount_amount, Decimal::from(2000));
    assert_eq!(order.final_amount, Decimal::from(13000));
}

#[test]
fn approve_amount_check() {
    let mut order = ut_order_13000();
    let tolerance = Decimal::ONE;
    let result = order.approve("tx-19".to_string(), Decimal::from(15000), tolerance, ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::AmountMismatch);
    assert_eq!(order.pay_status, PaymentStatus::Pending);
    assert!(order.payment_id.is_none());
    // within tolerance
    order
        .approve("tx-19".to_string(), Decimal::from(13001), tolerance, ut_time())
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.pay_status, PaymentStatus::Completed);
    assert_eq!(order.payment_id.as_deref(), Some("tx-19"));
    assert!(order.paid_at.is_some());
    let result = order.approve("tx-20".to_string(), Decimal::from(13000), tolerance, ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::AlreadyCompleted);
    let result = order.fail("late-failure".to_string(), ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::AlreadyCompleted);
}

#[test]
fn fail_then_approve_rejected() {
    let mut order = ut_order_13000();
    order.fail("card-declined".to_string(), ut_time()).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.pay_status, PaymentStatus::Failed);
    assert_eq!(order.reason.as_deref(), Some("card-declined"));
    let result = order.approve("tx-1".to_string(), Decimal::from(13000), Decimal::ONE, ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidStatusTransition);
}

#[test]
fn refund_rules() {
    let mut order = ut_order_13000();
    let result = order.refund(Decimal::from(100), "changed-mind".to_string(), ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::NotCompleted);
    order
        .approve("tx-3".to_string(), Decimal::from(13000), Decimal::ONE, ut_time())
        .unwrap();
    let result = order.refund(Decimal::ZERO, "changed-mind".to_string(), ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
    let result = order.refund(Decimal::from(13001), "changed-mind".to_string(), ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::RefundExceedsPaid);
    order
        .refund(Decimal::from(13000), "changed-mind".to_string(), ut_time())
        .unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(order.pay_status, PaymentStatus::Refunded);
    assert_eq!(order.refunded_amount, Some(Decimal::from(13000)));
}

#[test]
fn cancel_reports_prior_payment() {
    let mut order = ut_order_13000();
    let prev = order.cancel("out-of-budget".to_string(), ut_time()).unwrap();
    assert_eq!(prev, PaymentStatus::Pending);
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.pay_status, PaymentStatus::Cancelled);
    let result = order.cancel("again".to_string(), ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::NotCancellable);

    let mut order = ut_order_13000();
    order
        .approve("tx-5".to_string(), Decimal::from(13000), Decimal::ONE, ut_time())
        .unwrap();
    let prev = order.cancel("wrong-size".to_string(), ut_time()).unwrap();
    assert_eq!(prev, PaymentStatus::Completed);
}

#[test]
fn fulfillment_one_step_at_a_time() {
    let mut order = ut_order_13000();
    let result = order.advance_fulfillment(OrderStatus::Preparing, ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidStatusTransition);
    order
        .approve("tx-8".to_string(), Decimal::from(13000), Decimal::ONE, ut_time())
        .unwrap();
    let result = order.advance_fulfillment(OrderStatus::Shipped, ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidStatusTransition);
    for next in [OrderStatus::Preparing, OrderStatus::Shipped, OrderStatus::Delivered] {
        order.advance_fulfillment(next, ut_time()).unwrap();
        assert_eq!(order.status, next);
    }
    let result = order.cancel("too-late".to_string(), ut_time());
    assert_eq!(result.unwrap_err().code, AppErrorCode::NotCancellable);
}

#[test]
fn status_label_roundtrip_invalid() {
    let result = "SHIPPING".parse::<OrderStatus>();
    assert_eq!(result.unwrap_err().code, AppErrorCode::InvalidInput);
    assert_eq!("REFUNDED".parse::<PaymentStatus>().unwrap(), PaymentStatus::Refunded);
    assert_eq!("easy_pay".parse::<PaymentMethod>().unwrap(), PaymentMethod::EasyPay);
}
