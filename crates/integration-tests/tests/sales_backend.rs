//! Integration tests for the HTTP sales backend client.
//!
//! Each test starts a fake sales server and drives `HttpBackend` against it.

use axum::http::StatusCode;
use serde_json::json;
use till_core::{Cart, CategoryId, PaymentMethod, Price, ProductId};
use till_integration_tests::{FakeSalesServer, Reply, SESSION_COOKIE};
use till_register::backend::{
    AddToCartRequest, BackendError, CheckoutRequest, HttpBackend, SalesBackend,
};

async fn backend() -> (FakeSalesServer, HttpBackend) {
    let server = FakeSalesServer::start().await;
    let backend = HttpBackend::new(&server.config()).unwrap();
    (server, backend)
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_list_products_parses_listing() {
    let (server, backend) = backend().await;
    server.stock(
        3,
        json!([
            {"id": 1, "name": "Milk", "price": 60.0, "stock": 12},
            {"id": 2, "name": "Bread", "price": 55.5, "stock": 0}
        ]),
    );

    let products = backend.list_products(CategoryId::new(3)).await.unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].id, ProductId::new(1));
    assert_eq!(products[0].price, Price::from_shillings(60));
    assert_eq!(products[1].price, Price::from_cents(5550));
    assert!(!products[1].in_stock());
}

#[tokio::test]
async fn test_list_products_forwards_session_cookie() {
    let (server, backend) = backend().await;
    server.stock(1, json!([]));

    backend.list_products(CategoryId::new(1)).await.unwrap();

    assert_eq!(server.cookies(), vec![Some(SESSION_COOKIE.to_string())]);
}

#[tokio::test]
async fn test_unknown_category_is_status_error() {
    let (_server, backend) = backend().await;

    let err = backend.list_products(CategoryId::new(404)).await.unwrap_err();

    assert!(matches!(err, BackendError::Status { status: 404, .. }));
}

// =============================================================================
// Add to cart
// =============================================================================

#[tokio::test]
async fn test_add_to_cart_sends_single_unit() {
    let (server, backend) = backend().await;

    let ack = backend
        .add_to_cart(AddToCartRequest::one(ProductId::new(9)))
        .await
        .unwrap();

    assert!(ack.success);
    assert_eq!(ack.message.as_deref(), Some("Item added to cart"));
    assert_eq!(
        server.add_requests(),
        vec![json!({"product_id": 9, "quantity": 1})]
    );
}

#[tokio::test]
async fn test_business_failure_under_400_is_acknowledgement() {
    let (server, backend) = backend().await;
    server.reply_to_add(Reply::Json(
        StatusCode::BAD_REQUEST,
        json!({"success": false, "message": "Insufficient stock"}),
    ));

    let ack = backend
        .add_to_cart(AddToCartRequest::one(ProductId::new(1)))
        .await
        .unwrap();

    assert!(!ack.success);
    assert_eq!(ack.message.as_deref(), Some("Insufficient stock"));
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let (server, backend) = backend().await;
    server.reply_to_add(Reply::RateLimited { retry_after: 7 });

    let err = backend
        .add_to_cart(AddToCartRequest::one(ProductId::new(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::RateLimited(7)));
}

#[tokio::test]
async fn test_html_error_page_is_transport_failure() {
    let (server, backend) = backend().await;
    server.reply_to_add(Reply::Text(StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>"));

    let err = backend
        .add_to_cart(AddToCartRequest::one(ProductId::new(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Status { status: 502, .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let server = FakeSalesServer::start().await;
    let mut config = server.config();
    config.base_url = "http://127.0.0.1:1/".parse().unwrap();
    let backend = HttpBackend::new(&config).unwrap();

    let err = backend
        .add_to_cart(AddToCartRequest::one(ProductId::new(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Http(_)));
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_body() {
    let (server, backend) = backend().await;
    let mut cart = Cart::new();
    cart.add_unit(ProductId::new(1), "A", Price::from_shillings(100));
    cart.add_unit(ProductId::new(1), "A", Price::from_shillings(100));
    cart.add_unit(ProductId::new(2), "B", Price::from_shillings(50));

    let ack = backend
        .checkout(CheckoutRequest {
            cart: cart.items().to_vec(),
            payment_method: PaymentMethod::Credit,
            customer_name: Some("Njeri".to_string()),
        })
        .await
        .unwrap();

    assert!(ack.success);
    let requests = server.checkout_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["payment_method"], "credit");
    assert_eq!(requests[0]["customer_name"], "Njeri");

    let lines = requests[0]["cart"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[0]["product_id"], 1);
    assert_eq!(lines[0]["quantity"], 2);
    assert_eq!(lines[0]["total_price"], 200.0);
    assert_eq!(lines[1]["product_name"], "B");
}

#[tokio::test]
async fn test_checkout_without_customer_sends_null() {
    let (server, backend) = backend().await;
    let mut cart = Cart::new();
    cart.add_unit(ProductId::new(1), "A", Price::from_shillings(100));

    backend
        .checkout(CheckoutRequest {
            cart: cart.items().to_vec(),
            payment_method: PaymentMethod::Cash,
            customer_name: None,
        })
        .await
        .unwrap();

    assert!(server.checkout_requests()[0]["customer_name"].is_null());
}
