use mcp_types::ClientNotification;
use mcp_types::JSONRPCMessage;
use mcp_types::ProgressNotificationParams;
use mcp_types::ProgressToken;
use pretty_assertions::assert_eq;

#[test]
fn deserialize_progress_notification() {
    let raw = r#"{
        "jsonrpc": "2.0",
        "method": "$/progress",
        "params": {
            "message": "Half way there",
            "progress": 0.5,
            "progressToken": 99,
            "total": 1.0
        }
    }"#;

    // Deserialize the full JSONRPCMessage first.
    let msg: JSONRPCMessage = serde_json::from_str(raw).expect("invalid JSONRPCMessage");

    // Extract the notification variant.
    let JSONRPCMessage::Notification(notif) = msg else {
        unreachable!()
    };

    let client_notif: ClientNotification =
        ClientNotification::try_from(notif).expect("conversion must succeed");

    let ClientNotification::Progress(params) = client_notif else {
        unreachable!()
    };

    let expected_params = ProgressNotificationParams {
        message: Some("Half way there".into()),
        progress: 0.5,
        progress_token: ProgressToken::Integer(99),
        total: Some(1.0),
    };

    assert_eq!(params, expected_params);
}

#[test]
fn serialize_progress_notification_omits_absent_fields() {
    let params = ProgressNotificationParams {
        progress_token: ProgressToken::String("tok".into()),
        progress: 3.0,
        total: None,
        message: None,
    };

    let value = serde_json::to_value(&params).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({"progressToken": "tok", "progress": 3.0})
    );
}
