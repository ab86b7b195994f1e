use mast_mcp_server::ServerConfig;
use mast_test_support::McpConnection;
use mast_test_support::demo_server;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn mixed_batch_preserves_order_and_omits_notifications() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    client
        .send_value(&json!([
            {"jsonrpc": "2.0", "id": 101, "method": "tools/list"},
            {"jsonrpc": "2.0", "id": 102, "method": "prompts/list"},
            {"jsonrpc": "2.0", "method": "notifications/ping"},
        ]))
        .await
        .expect("send batch");

    let response = client.read_value().await.expect("batch response");
    let responses = response.as_array().expect("array response");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], json!(101));
    assert!(responses[0]["result"]["tools"].is_array());
    assert_eq!(responses[1]["id"], json!(102));
    assert!(responses[1]["result"]["prompts"].is_array());

    client.close().await.expect("close");
}

#[tokio::test]
async fn all_notification_batch_produces_no_output() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    client
        .send_value(&json!([
            {"jsonrpc": "2.0", "method": "notifications/ping"},
            {"jsonrpc": "2.0", "method": "notifications/ping"},
        ]))
        .await
        .expect("send batch");

    // The next frame on the wire must be the fence response, not
    // anything batch-related.
    let fence = client.send_request("ping", None).await.expect("fence");
    let response = client.read_value().await.expect("fence response");
    assert_eq!(response["id"], json!(fence));

    client.close().await.expect("close");
}

#[tokio::test]
async fn empty_batch_is_invalid_request_with_null_id() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    client.send_value(&json!([])).await.expect("send empty batch");
    let response = client.read_value().await.expect("error response");

    assert_eq!(response["id"], json!(null));
    assert_eq!(response["error"]["code"], json!(-32600));

    client.close().await.expect("close");
}

#[tokio::test]
async fn malformed_batch_element_gets_its_own_error() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    client
        .send_value(&json!([
            {"jsonrpc": "2.0", "id": 7, "method": "ping"},
            {"jsonrpc": "2.0", "id": null, "method": "ping"},
        ]))
        .await
        .expect("send batch");

    let response = client.read_value().await.expect("batch response");
    let responses = response.as_array().expect("array response");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], json!(7));
    assert_eq!(responses[0]["result"], json!({}));
    assert_eq!(responses[1]["id"], json!(null));
    assert_eq!(responses[1]["error"]["code"], json!(-32600));

    client.close().await.expect("close");
}

#[tokio::test]
async fn unparseable_input_is_a_single_parse_error() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    client.send_raw(b"{definitely not json").await.expect("send");
    let response = client.read_value().await.expect("error response");

    assert_eq!(response["id"], json!(null));
    assert_eq!(response["error"]["code"], json!(-32700));

    client.close().await.expect("close");
}
