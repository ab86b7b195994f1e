use mast_mcp_server::ServerConfig;
use mast_test_support::McpConnection;
use mast_test_support::demo_server;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn initialize_handshake_returns_server_info() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    let id = client
        .send_request(
            "initialize",
            Some(json!({"protocolVersion": "2024-11-05", "capabilities": {}})),
        )
        .await
        .expect("send initialize");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(response["id"], json!(id));
    assert_eq!(response["result"]["protocolVersion"], json!("2024-11-05"));
    let name = response["result"]["serverInfo"]["name"]
        .as_str()
        .expect("serverInfo.name");
    assert!(!name.is_empty());
    assert_eq!(
        response["result"]["capabilities"]["resources"]["subscribe"],
        json!(false)
    );

    client.close().await.expect("close");
}

#[tokio::test]
async fn initialize_called_twice_is_a_lifecycle_error() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    client.initialize().await.expect("handshake");
    let id = client
        .send_request(
            "initialize",
            Some(json!({"protocolVersion": "2024-11-05", "capabilities": {}})),
        )
        .await
        .expect("send second initialize");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(response["error"]["code"], json!(-32002));
    client.close().await.expect("close");
}

#[tokio::test]
async fn requests_before_ready_are_rejected() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    let id = client.send_request("tools/list", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["error"]["code"], json!(-32002));
    assert_eq!(
        response["error"]["message"],
        json!("server not initialized")
    );

    client.close().await.expect("close");
}

#[tokio::test]
async fn ping_is_accepted_in_every_phase() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    let id = client.send_request("ping", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["result"], json!({}));

    client.initialize().await.expect("handshake");
    let id = client.send_request("ping", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["result"], json!({}));

    client.close().await.expect("close");
}

#[tokio::test]
async fn request_ids_echo_strings_byte_identically() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);

    client
        .send_value(&json!({
            "jsonrpc": "2.0",
            "id": "weird-id-7",
            "method": "ping",
        }))
        .await
        .expect("send");
    let response = client.read_value().await.expect("response");
    assert_eq!(response["id"], json!("weird-id-7"));

    client.close().await.expect("close");
}

#[tokio::test]
async fn unknown_method_after_ready_is_method_not_found() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client.send_request("tools/rename", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");
    assert_eq!(response["error"]["code"], json!(-32601));

    client.close().await.expect("close");
}
