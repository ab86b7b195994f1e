use mast_mcp_server::ServerConfig;
use mast_test_support::McpConnection;
use mast_test_support::demo_server;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn shutdown_transitions_and_blocks_further_requests() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client.send_request("shutdown", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["result"], json!({}));

    let id = client.send_request("tools/list", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["error"]["code"], json!(-32002));

    // Ping stays available so the peer can close down gracefully.
    let id = client.send_request("ping", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["result"], json!({}));

    client.close().await.expect("close");
}

#[tokio::test]
async fn shutdown_before_ready_is_a_lifecycle_error() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    let id = client.send_request("shutdown", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["error"]["code"], json!(-32002));

    client.close().await.expect("close");
}

#[tokio::test]
async fn initialized_before_initialize_is_ignored_on_the_wire() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    // A lifecycle violation in a notification produces no response...
    client
        .send_notification("notifications/initialized", None)
        .await
        .expect("send");

    // ...and the session is still not ready.
    let id = client.send_request("tools/list", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["error"]["code"], json!(-32002));

    client.close().await.expect("close");
}

#[tokio::test]
async fn two_connections_have_independent_lifecycles() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut first = McpConnection::connect(&server);
    let mut second = McpConnection::connect(&server);

    first.initialize().await.expect("handshake");

    // The first connection being ready must not unlock the second.
    let id = second.send_request("tools/list", None).await.expect("send");
    let response = second.read_response(id).await.expect("response");
    assert_eq!(response["error"]["code"], json!(-32002));

    let id = first.send_request("tools/list", None).await.expect("send");
    let response = first.read_response(id).await.expect("response");
    assert!(response["result"]["tools"].is_array());

    first.close().await.expect("close first");
    second.close().await.expect("close second");
}
