use httpmock::prelude::*;
use infortisa_tools::{
    encode_utf16,
    parse_status_response,
    BlockRequest,
    InfortisaApi,
    InfortisaApiError,
    InfortisaConfig,
    OPERATION_NAMESPACE,
};

fn api_for(server: &MockServer, key: &str) -> InfortisaApi {
    let _ = env_logger::try_init();
    InfortisaApi::new(InfortisaConfig::new(&server.base_url(), key)).expect("Could not create client")
}

#[tokio::test]
async fn create_order_sends_utf16_with_provider_headers() {
    let server = MockServer::start_async().await;
    let body = encode_utf16("<Order/>");
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/order/create")
                .header("authorization-token", "secret-key")
                .header("accept", "text/xml")
                .header("content-type", "text/xml; charset=utf-16");
            then.status(201).body("<OrderResponse><HasErrors>false</HasErrors></OrderResponse>");
        })
        .await;
    let api = api_for(&server, "secret-key");
    let response = api.create_order(body).await.unwrap();
    mock.assert_async().await;
    assert_eq!(response.status, 201);
    assert!(response.ensure_status(&[200, 201]).is_ok());
    assert!(response.ensure_status(&[200]).is_err());
}

#[tokio::test]
async fn status_is_queried_by_customer_reference() {
    let server = MockServer::start_async().await;
    let body = format!(
        r#"<OrderStatusResponse xmlns="{OPERATION_NAMESPACE}"><Operation><Code>VR/9</Code><Status>Preparing</Status></Operation></OrderStatusResponse>"#
    );
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/order/status").query_param("CustomerReference", "SO0042");
            then.status(200).body(body);
        })
        .await;
    let api = api_for(&server, "k");
    let response = api.order_status("SO0042").await.unwrap();
    mock.assert_async().await;
    let report = parse_status_response(&response.body);
    assert_eq!(report.status, "Preparing");
    assert_eq!(report.operation.unwrap().code.as_deref(), Some("VR/9"));
}

#[tokio::test]
async fn error_statuses_keep_the_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/order/blockorder");
            then.status(500).body("boom");
        })
        .await;
    let api = api_for(&server, "k");
    let xml = BlockRequest::block("SO0042").to_xml().unwrap();
    let response = api.block_order(encode_utf16(&xml)).await.unwrap();
    assert_eq!(response.body, "boom");
    match response.ensure_status(&[200]) {
        Err(InfortisaApiError::QueryError { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        },
        other => panic!("Unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn missing_api_key_never_reaches_the_server() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;
    let api = api_for(&server, "   ");
    let err = api.order_status("SO0042").await.unwrap_err();
    assert!(matches!(err, InfortisaApiError::MissingApiKey));
    mock.assert_hits_async(0).await;
}

#[test]
fn debug_output_hides_the_api_key() {
    let api = InfortisaApi::new(InfortisaConfig::new("https://api.infortisa.test", "s3cr3t-key")).unwrap();
    let text = format!("{api:?}");
    assert!(text.starts_with("InfortisaApi("));
    assert!(text.contains("https://api.infortisa.test"));
    assert!(text.contains("****"));
    assert!(!text.contains("s3cr3t-key"));
}
