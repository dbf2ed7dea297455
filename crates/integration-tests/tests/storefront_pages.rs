//! Integration tests for catalog pages and the ambient middleware.

#![allow(clippy::unwrap_used)]

use milkrun_integration_tests::TestApp;
use reqwest::StatusCode;

#[tokio::test]
async fn test_product_listing() {
    let app = TestApp::spawn().await;
    let resp = TestApp::client().get(app.url("/products")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Whole milk"));
    assert!(body.contains("Free-range eggs"));
    assert!(body.contains("$2.50"));
}

#[tokio::test]
async fn test_product_description_is_sanitized() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();

    let body = client
        .get(app.url("/products/whole-milk"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("<p>Creamy <b>whole</b> milk.</p>"));
    assert!(!body.contains("alert(1)"));
    assert!(body.contains("2 litres ($4.50)"));
    assert!(body.contains("1 litre ($2.50)"));

    let body = client
        .get(app.url("/products/eggs"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Six eggs.<br>Laid this week."));
}

#[tokio::test]
async fn test_rich_text_kill_switch_escapes_markup() {
    let app = TestApp::spawn_with(&[("STOREFRONT_RICH_TEXT_PARSING", "false")]).await;

    let body = TestApp::client()
        .get(app.url("/products/whole-milk"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("&lt;b&gt;whole&lt;/b&gt;"));
    assert!(!body.contains("<b>whole</b>"));
}

#[tokio::test]
async fn test_unknown_pages_are_not_found() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();

    let resp = client.get(app.url("/products/butter")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client.get(app.url("/no-such-page")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.text().await.unwrap().contains("Page not found"));
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::spawn().await;

    let resp = TestApp::client()
        .get(app.url("/"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert!(
        headers
            .get("content-security-policy")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("script-src 'self'")
    );
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
}
