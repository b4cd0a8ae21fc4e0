use serde_json::json;
use symbion_console::config::ApiConf;
use symbion_console::{AddNodeError, CommandClient, CommandError, ValidationError};
use symbion_devkit::{ClusterMessageBuilder, StubNodeApi, StubReply};

fn client_for(stub: &StubNodeApi) -> CommandClient {
    CommandClient::new(&ApiConf {
        base_url: stub.base_url(),
        ..ApiConf::default()
    })
    .unwrap()
}

#[tokio::test]
async fn add_node_returns_server_node_id() {
    let stub = StubNodeApi::start(StubReply::Success { node_id: "node-42".into() }).await.unwrap();
    let added = client_for(&stub).add_node(4).await.unwrap();

    assert_eq!(added.node_id, "node-42");
    assert_eq!(stub.add_node_requests(), vec![json!({"cpu_cores": 4})]);
}

#[tokio::test]
async fn add_node_understands_original_server_reply() {
    let stub = StubNodeApi::start(StubReply::Created).await.unwrap();
    let added = client_for(&stub).add_node(2).await.unwrap();
    assert_eq!(added.node_id, "simulated_node_1");
    assert_eq!(added.cpu_cores, Some(2));
    assert!(added.simulated);
}

#[tokio::test]
async fn invalid_cores_never_reach_the_network() {
    let stub = StubNodeApi::start(StubReply::Created).await.unwrap();
    let client = client_for(&stub);

    for cores in [0, -1] {
        let err = client.add_node(cores).await.unwrap_err();
        assert!(matches!(
            err,
            AddNodeError::Validation(ValidationError::NonPositiveCores(n)) if n == cores
        ));
    }
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn server_errors_surface_as_command_errors() {
    let stub = StubNodeApi::start(StubReply::Json(200, json!({"status": "error"}))).await.unwrap();
    let client = client_for(&stub);
    assert!(matches!(
        client.add_node(1).await.unwrap_err(),
        AddNodeError::Command(CommandError::Rejected { .. })
    ));

    stub.set_reply(StubReply::Json(400, json!({"error": "CPU cores must be positive"})));
    match client.add_node(1).await.unwrap_err() {
        AddNodeError::Command(CommandError::Rejected { status, message }) => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(message, "CPU cores must be positive");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    stub.set_reply(StubReply::Text(500, "boom".into()));
    assert!(matches!(
        client.add_node(1).await.unwrap_err(),
        AddNodeError::Command(CommandError::Rejected { ref message, .. }) if message == "boom"
    ));

    stub.set_reply(StubReply::Text(200, "ok".into()));
    assert!(matches!(
        client.add_node(1).await.unwrap_err(),
        AddNodeError::Command(CommandError::InvalidResponse(_))
    ));

    // every failure was a single request, no retry
    assert_eq!(stub.request_count(), 4);
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let client = CommandClient::new(&ApiConf {
        base_url: "http://127.0.0.1:1".into(),
        timeout_secs: 2,
        ..ApiConf::default()
    })
    .unwrap();
    assert!(matches!(
        client.add_node(4).await.unwrap_err(),
        AddNodeError::Command(CommandError::Transport(_))
    ));
}

#[tokio::test]
async fn api_key_is_sent_when_configured() {
    let stub = StubNodeApi::start(StubReply::Created).await.unwrap();
    let client = CommandClient::new(&ApiConf {
        base_url: stub.base_url(),
        api_key: Some("s3cret".into()),
        ..ApiConf::default()
    })
    .unwrap();
    client.add_node(1).await.unwrap();
    client_for(&stub).add_node(1).await.unwrap();
    assert_eq!(stub.api_keys_seen(), vec![Some("s3cret".to_string()), None]);
}

#[tokio::test]
async fn fetch_nodes_is_validated() {
    let stub = StubNodeApi::start(StubReply::Created).await.unwrap();
    let client = client_for(&stub);

    stub.set_nodes(ClusterMessageBuilder::reference_cluster().build());
    let snapshot = client.fetch_nodes().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.contains("n1"));

    stub.set_nodes(ClusterMessageBuilder::new().node("bad", "healthy", 1.0, 2.0, &[], 0.0).build());
    assert!(matches!(
        client.fetch_nodes().await.unwrap_err(),
        CommandError::InvalidNodeList(_)
    ));
}

#[tokio::test]
async fn server_status_reports_node_count() {
    let stub = StubNodeApi::start(StubReply::Created).await.unwrap();
    stub.set_nodes(ClusterMessageBuilder::new().idle_node("a", 2.0).build());
    let status = client_for(&stub).server_status().await.unwrap();
    assert_eq!(status.status, "API Server running");
    assert_eq!(status.node_count, 1);
}
