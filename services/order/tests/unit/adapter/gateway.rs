use std::result::Result as DefaultResult;

use rust_decimal::Decimal;

use ecommerce_common::confidentiality::AbstractConfidentiality;
use ecommerce_common::config::{AppPayGatewayAccessCfg, AppPayGatewayCfg};
use ecommerce_common::error::{AppConfidentialityError, AppErrorCode};
use marketplace_order::gateway::{
    check_origin, AbstractPaymentGateway, AppSandboxPaymentGateway, GatewayCallbackModel,
    GatewayNetCancelReqModel,
};
use marketplace_order::model::{
    OrderCreateArgs, OrderLineModel, OrderModel, OrderPricingPolicy, PaymentMethod,
};

use crate::model::{ut_product_single, ut_product_with_skus, ut_shipping, ut_time};
use crate::{ut_setup_share_state, MockConfidential};

struct MockMerchantSecret;

impl AbstractConfidentiality for MockMerchantSecret {
    fn try_get_payload(&self, _id: &str) -> DefaultResult<String, AppConfidentialityError> {
        Ok(r#"{"mid": "alpha-shop-0019", "api_key": "unit-test-key"}"#.to_string())
    }
}

fn ut_allowed() -> Vec<String> {
    vec!["stdpay.pg-alpha.com".to_string(), "fcstdpay.pg-alpha.com".to_string()]
}

fn ut_sandbox() -> AppSandboxPaymentGateway {
    let cfg = AppPayGatewayCfg {
        name: "pg-sandbox".to_string(),
        allowed_origins: ut_allowed(),
        success_code: "0000".to_string(),
        timeout_secs: 5,
        access: AppPayGatewayAccessCfg::test,
    };
    AppSandboxPaymentGateway::new(&cfg)
}

fn ut_order() -> OrderModel {
    let p1 = ut_product_with_skus(80, 3, &[(801, "M / white", 18000)]);
    let p2 = ut_product_single(90, 3, 2500);
    let lines = vec![
        OrderLineModel::new(501, &p1, Some(801), 2, Decimal::from(18000)),
        OrderLineModel::new(502, &p2, None, 1, Decimal::from(2500)),
    ];
    let args = OrderCreateArgs {
        id: 7710,
        number: "20240501-7710".to_string(),
        owner: 126,
        shipping: ut_shipping(),
        pay_method: PaymentMethod::Card,
        memo: None,
        now: ut_time(),
    };
    let policy = OrderPricingPolicy {
        free_delivery_threshold: Decimal::from(30000),
        delivery_fee: Decimal::from(3000),
        amount_tolerance: Decimal::ONE,
    };
    OrderModel::try_build(args, lines, None, &policy).unwrap()
}

fn ut_callback(result_code: &str, auth_token: &str) -> GatewayCallbackModel {
    GatewayCallbackModel {
        result_code: result_code.to_string(),
        result_msg: "ut-message".to_string(),
        order_number: "20240501-7710".to_string(),
        auth_url: "https://stdpay.pg-alpha.com/api/payAuth".to_string(),
        net_cancel_url: "https://stdpay.pg-alpha.com/api/netCancel".to_string(),
        auth_token: auth_token.to_string(),
    }
}

#[test]
fn origin_check() {
    let allowed = ut_allowed();
    let uri = check_origin(&allowed, "https://fcstdpay.pg-alpha.com/api/payAuth?v=1").unwrap();
    assert_eq!(uri.path(), "/api/payAuth");
    let cases = [
        "http://stdpay.pg-alpha.com/api/payAuth",
        "https://stdpay.pg-alpha.com.evil.io/api/payAuth",
        "https://evil.io/stdpay.pg-alpha.com",
        "https://pg-alpha.com/api",
        "not a url",
    ];
    for url in cases {
        let result = check_origin(&allowed, url);
        assert_eq!(result.unwrap_err().code, AppErrorCode::GatewayOriginRejected);
    }
}

#[tokio::test]
async fn sandbox_callback_success() {
    let gw = ut_sandbox();
    let auth = gw
        .parse_callback(&ut_callback("0000", "tx-8830:38500:card"))
        .await
        .unwrap();
    assert!(auth.success);
    assert_eq!(auth.tid.as_deref(), Some("tx-8830"));
    assert_eq!(auth.amount, Some(Decimal::from(38500)));
    assert_eq!(auth.method.as_deref(), Some("card"));
    assert!(auth.auth_time.is_some());
}

#[tokio::test]
async fn sandbox_callback_failure_code() {
    let gw = ut_sandbox();
    let auth = gw
        .parse_callback(&ut_callback("V801", "tx-8830:38500"))
        .await
        .unwrap();
    assert!(!auth.success);
    assert!(auth.tid.is_none());
    assert!(auth.message.starts_with("V801"));
}

#[tokio::test]
async fn sandbox_callback_malformed_token() {
    let gw = ut_sandbox();
    for token in ["", ":38500", "tx-8830", "tx-8830:abc"] {
        let result = gw.parse_callback(&ut_callback("0000", token)).await;
        assert_eq!(result.unwrap_err().code, AppErrorCode::GatewayFailure);
    }
}

#[tokio::test]
async fn sandbox_payment_request_and_cancel() {
    let gw = ut_sandbox();
    let order = ut_order();
    let params = gw.create_payment_request(&order, ut_time()).unwrap();
    assert_eq!(params.gateway, "pg-sandbox");
    assert_eq!(params.order_number, "20240501-7710");
    assert_eq!(params.amount, Decimal::from(38500));
    assert_eq!(params.goods_name, "linen-shirt-80 / M / white and 1 more");
    assert_eq!(params.buyer_name, "Jeanette");
    let req = GatewayNetCancelReqModel {
        tid: "tx-8830".to_string(),
        amount: Decimal::from(38500),
        order_number: order.number.clone(),
        endpoint: None,
    };
    let result = gw.request_network_cancel(req).await.unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn shared_state_builds_sandbox() {
    let shr_state = ut_setup_share_state("config_ok.json", Box::new(MockConfidential {}));
    let gw = shr_state.gateway();
    assert_eq!(gw.label(), "pg-sandbox");
    assert_eq!(gw.allowed_origins().len(), 2);
}

#[tokio::test]
async fn remote_gateway_without_network() {
    let shr_state =
        ut_setup_share_state("config_gateway_remote.json", Box::new(MockMerchantSecret));
    let gw = shr_state.gateway();
    assert_eq!(gw.label(), "pg-alpha");
    let params = gw.create_payment_request(&ut_order(), ut_time()).unwrap();
    assert_eq!(params.merchant_id, "alpha-shop-0019");
    assert_eq!(params.return_url, "https://shop.example.com/payment/return");
    // failure code is reported without contacting the gateway
    let auth = gw
        .parse_callback(&ut_callback("V102", "opaque-token"))
        .await
        .unwrap();
    assert!(!auth.success);
    // endpoint outside the allow-list is never contacted
    let req = GatewayNetCancelReqModel {
        tid: "tx-8830".to_string(),
        amount: Decimal::from(38500),
        order_number: "20240501-7710".to_string(),
        endpoint: Some("https://evil.io/api/netCancel".to_string()),
    };
    let result = gw.request_network_cancel(req).await;
    assert_eq!(result.unwrap_err().code, AppErrorCode::GatewayOriginRejected);
}
