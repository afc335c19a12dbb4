use std::sync::Arc;

use lbsweep_compute::{ComputeApi, ComputeClient, ComputeClientConfig, ComputeError, StaticToken};
use lbsweep_core::{ProxyProtocol, ResourceKind, ResourceRef, Scope};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "builderscon-1248";

fn client(server: &MockServer) -> ComputeClient {
    ComputeClient::new(
        ComputeClientConfig::new(PROJECT).with_endpoint(format!("{}/compute/v1", server.uri())),
        Arc::new(StaticToken::new("test-token")),
    )
    .unwrap()
}

fn api(rest: &str) -> String {
    format!("/compute/v1/projects/{PROJECT}/{rest}")
}

#[tokio::test]
async fn test_get_url_map_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("global/urlMaps/k8s-um-default-app")))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "k8s-um-default-app",
            "defaultService": "https://x/global/backendServices/k8s-be-30001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let um = client(&server)
        .get_url_map(&ResourceRef::global(ResourceKind::UrlMap, "k8s-um-default-app"))
        .await
        .unwrap();
    assert_eq!(um.backend_service_links().len(), 1);
}

#[tokio::test]
async fn test_not_found_is_distinguishable() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(api("global/targetHttpProxies/k8s-tp-gone")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "The resource was not found"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .delete(&ResourceRef::global(ResourceKind::TargetHttpProxy, "k8s-tp-gone"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_api_error_carries_google_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(api("global/urlMaps/k8s-um-in-use")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "The url_map resource is already being used"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .delete(&ResourceRef::global(ResourceKind::UrlMap, "k8s-um-in-use"))
        .await
        .unwrap_err();
    match err {
        ComputeError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("already being used"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_regional_delete_path() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(api("regions/us-east1/forwardingRules/k8s-fw-a")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operation-1"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete(&ResourceRef::new(
            ResourceKind::ForwardingRule,
            Scope::location("us-east1"),
            "k8s-fw-a",
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("global/targetHttpsProxies")))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "k8s-tps-a"}],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("global/targetHttpsProxies")))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "k8s-tps-b"}]
        })))
        .mount(&server)
        .await;

    let proxies = client(&server)
        .list_target_proxies(ProxyProtocol::Https)
        .await
        .unwrap();
    let names: Vec<_> = proxies.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["k8s-tps-a", "k8s-tps-b"]);
}

#[tokio::test]
async fn test_aggregated_forwarding_rules_flatten_scopes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("aggregated/forwardingRules")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": {
                "global": {"forwardingRules": [
                    {"name": "k8s-fw-default-app", "selfLink": "https://x/projects/p/global/forwardingRules/k8s-fw-default-app"}
                ]},
                "regions/asia-northeast1": {"forwardingRules": [
                    {"name": "a1b2c3", "selfLink": "https://x/projects/p/regions/asia-northeast1/forwardingRules/a1b2c3"}
                ]},
                "regions/us-east1": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
            }
        })))
        .mount(&server)
        .await;

    let rules = client(&server).aggregated_forwarding_rules().await.unwrap();
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().any(|r| r.name == "k8s-fw-default-app"));
}

#[tokio::test]
async fn test_group_members_request_all_states() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("zones/us-central1-a/instanceGroups/k8s-ig/listInstances")))
        .and(body_json(json!({"instanceState": "ALL"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"instance": "https://x/zones/us-central1-a/instances/n1", "status": "RUNNING"},
                {"instance": "https://x/zones/us-central1-a/instances/n2", "status": "TERMINATED"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let members = client(&server)
        .list_group_members(&ResourceRef::new(
            ResourceKind::InstanceGroup,
            Scope::location("us-central1-a"),
            "k8s-ig",
        ))
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_empty_list_has_no_items_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("zones/us-central1-a/instances")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"kind": "compute#instanceList"})),
        )
        .mount(&server)
        .await;

    let instances = client(&server).list_instances("us-central1-a").await.unwrap();
    assert!(instances.is_empty());
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("global/firewalls")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).list_firewalls().await.unwrap_err();
    assert!(matches!(err, ComputeError::Decode { .. }));
}
