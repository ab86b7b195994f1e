use mast_mcp_server::ServerConfig;
use mast_test_support::McpConnection;
use mast_test_support::demo_server;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn prompts_list_returns_descriptors_with_arguments() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client.send_request("prompts/list", None).await.expect("send");
    let response = client.read_response(id).await.expect("response");

    let prompts = response["result"]["prompts"].as_array().expect("prompts");
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0]["name"], json!("greeting"));
    assert_eq!(prompts[0]["arguments"][0]["name"], json!("who"));

    client.close().await.expect("close");
}

#[tokio::test]
async fn prompts_get_expands_the_template() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client
        .send_request(
            "prompts/get",
            Some(json!({"name": "greeting", "arguments": {"who": "Ada"}})),
        )
        .await
        .expect("send");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(
        response["result"]["description"],
        json!("Greets someone by name")
    );
    assert_eq!(
        response["result"]["messages"],
        json!([{
            "role": "user",
            "content": {"type": "text", "text": "Say hello to Ada"},
        }])
    );

    client.close().await.expect("close");
}

#[tokio::test]
async fn missing_required_prompt_argument_is_invalid_params() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client
        .send_request("prompts/get", Some(json!({"name": "greeting", "arguments": {}})))
        .await
        .expect("send");
    let response = client.read_response(id).await.expect("response");

    assert_eq!(response["error"]["code"], json!(-32602));
    let message = response["error"]["message"].as_str().expect("message");
    assert!(message.contains("who"), "got: {message}");

    client.close().await.expect("close");
}

#[tokio::test]
async fn unknown_prompt_argument_is_tolerated() {
    let server = demo_server(ServerConfig::default()).expect("server");
    let mut client = McpConnection::connect(&server);
    client.initialize().await.expect("handshake");

    let id = client
        .send_request(
            "prompts/get",
            Some(json!({"name": "greeting", "arguments": {"who": "Ada", "volume": "loud"}})),
        )
        .await
        .expect("send");
    let response = client.read_response(id).await.expect("response");
    assert!(response.get("error").is_none(), "got: {response}");

    client.close().await.expect("close");
}
