use mast_mcp_server::ServerConfig;
use mast_test_support::McpConnection;
use mast_test_support::demo_server;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn tools_list_returns_registered_descriptors() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client.send_request("tools/list", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");

    let tools = response["result"]["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], json!("echo"));
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["text"]));

    client.close().await.expect("close");
}

#[tokio::test]
async fn call_echo_round_trips_text() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client
        .send_request(
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"text": "hi"}})),
        )
        .await
        .expect("send");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(
        response["result"]["content"],
        json!([{"type": "text", "text": "hi"}])
    );
    assert_eq!(response["result"]["isError"], json!(false));

    client.close().await.expect("close");
}

#[tokio::test]
async fn unknown_tool_is_invalid_params_naming_the_tool() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client
        .send_request(
            "tools/call",
            Some(json!({"name": "does-not-exist", "arguments": {}})),
        )
        .await
        .expect("send");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(response["error"]["code"], json!(-32602));
    let message = response["error"]["message"].as_str().expect("message");
    assert!(message.contains("does-not-exist"), "got: {message}");

    client.close().await.expect("close");
}

#[tokio::test]
async fn missing_required_argument_is_invalid_params() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client
        .send_request("tools/call", Some(json!({"name": "echo", "arguments": {}})))
        .await
        .expect("send");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(response["error"]["code"], json!(-32602));

    client.close().await.expect("close");
}

#[tokio::test]
async fn responses_come_back_in_request_order() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let first = client
        .send_request(
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"text": "one"}})),
        )
        .await
        .expect("send first");
    let second = client
        .send_request(
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"text": "two"}})),
        )
        .await
        .expect("send second");

    let response = client.read_value().await.expect("first response");
    assert_eq!(response["id"], json!(first));
    let response = client.read_value().await.expect("second response");
    assert_eq!(response["id"], json!(second));

    client.close().await.expect("close");
}
