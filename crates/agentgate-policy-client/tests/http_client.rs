// agentgate-policy-client/tests/http_client.rs
// ============================================================================
// Module: HTTP Policy Client Integration Tests
// Description: Exercises HttpPolicyEngineClient against a local tiny_http fixture.
// Purpose: Validate the success path and the retry-once transport behavior.
// Dependencies: agentgate-policy-client, agentgate-core, tiny_http
// ============================================================================

use std::num::NonZeroU64;
use std::thread;

use agentgate_core::PolicyEngineClient;
use agentgate_core::PolicyQuery;
use agentgate_core::SessionId;
use agentgate_core::TenantId;
use agentgate_core::ToolName;
use agentgate_policy_client::HttpPolicyClientConfig;
use agentgate_policy_client::HttpPolicyEngineClient;
use tiny_http::Response;
use tiny_http::Server;

fn sample_query() -> PolicyQuery {
    PolicyQuery {
        tenant_id: TenantId::new(NonZeroU64::new(7).expect("non-zero")),
        session_id: SessionId::new("session-under-test"),
        tool_name: ToolName::new("search"),
        approval_presented: false,
        arguments: serde_json::json!({"q": "weather"}),
        policy_version: agentgate_core::PolicyVersion::new("v1"),
    }
}

#[test]
fn evaluate_parses_a_successful_response() {
    let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
    let port = server.server_addr().to_ip().expect("ip address").port();
    let handle = thread::spawn(move || {
        let request = server.recv().expect("receive one request");
        let body = r#"{"decision":"allow","reason":"matched allowlist","matched_rule":null}"#;
        let response = Response::from_string(body).with_status_code(200);
        request.respond(response).expect("respond to request");
    });

    let client = HttpPolicyEngineClient::new(HttpPolicyClientConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        timeout_millis: 2_000,
        mtls: None,
    })
    .expect("client builds");

    let verdict = client.evaluate(&sample_query()).expect("evaluation succeeds");
    assert_eq!(verdict.reason, "matched allowlist");
    handle.join().expect("server thread joins");
}

#[test]
fn non_success_status_is_a_transport_error() {
    let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
    let port = server.server_addr().to_ip().expect("ip address").port();
    let handle = thread::spawn(move || {
        for _ in 0..2 {
            let request = server.recv().expect("receive a request");
            let response = Response::from_string("internal error").with_status_code(500);
            request.respond(response).expect("respond to request");
        }
    });

    let client = HttpPolicyEngineClient::new(HttpPolicyClientConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        timeout_millis: 2_000,
        mtls: None,
    })
    .expect("client builds");

    let result = client.evaluate(&sample_query());
    assert!(result.is_err());
    handle.join().expect("server thread joins");
}
