//! Pact contract tests for the Yandex Container Registry API
//!
//! These tests define the contract between the controller's registry adapter
//! and the Container Registry REST API. Pact provides a mock server that
//! answers the way the real API does.

mod common;

use cloud_connectors::crd::YandexContainerRegistrySpec;
use cloud_connectors::provider::registry::{ContainerRegistryAdapter, ATTRIBUTE_FOLDER_ID};
use cloud_connectors::provider::{CloudResourceAdapter, Credentials, ProviderError};
use common::init_rustls;
use pact_consumer::prelude::*;
use serde_json::json;

const CONSUMER: &str = "Cloud-Connectors-Controller";
const PROVIDER: &str = "Yandex-Container-Registry";

fn credentials() -> Credentials {
    Credentials::IamToken {
        token: "test-token".to_string(),
    }
}

fn params() -> YandexContainerRegistrySpec {
    YandexContainerRegistrySpec {
        name: "team-images".to_string(),
        folder_id: "b1gfolder".to_string(),
    }
}

/// Base URL of the mock server without the trailing slash
fn base_url(url: impl std::fmt::Display) -> String {
    url.to_string().trim_end_matches('/').to_string()
}

fn list_interaction(builder: &mut PactBuilder, state: &str, registries: serde_json::Value) {
    builder.interaction(format!("list registries ({state})"), String::new(), |mut i| {
        i.given(state);
        i.request
            .method("GET")
            .path("/registries")
            .query_param("folderId", "b1gfolder")
            .query_param("pageSize", "1000")
            .header("authorization", "Bearer test-token");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "registries": registries }));
        i
    });
}

#[tokio::test]
async fn test_list_registries_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    list_interaction(
        &mut pact_builder,
        "a folder with one registry",
        json!([{
            "id": "crpabc123",
            "folderId": "b1gfolder",
            "name": "team-images",
            "status": "ACTIVE",
            "createdAt": "2024-03-01T10:15:00Z",
            "labels": { "team": "platform" }
        }]),
    );

    let mock_server = pact_builder.start_mock_server(None, None);
    let adapter =
        ContainerRegistryAdapter::with_base_url(&base_url(mock_server.url())).expect("adapter");

    let registries = adapter
        .list(&credentials(), &params())
        .await
        .expect("list registries");

    assert_eq!(registries.len(), 1);
    let registry = &registries[0];
    assert_eq!(registry.id, "crpabc123");
    assert_eq!(registry.name, "team-images");
    assert_eq!(
        registry.attributes.get(ATTRIBUTE_FOLDER_ID).map(String::as_str),
        Some("b1gfolder")
    );
    assert_eq!(registry.labels.get("team").map(String::as_str), Some("platform"));
}

#[tokio::test]
async fn test_get_missing_registry_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    list_interaction(&mut pact_builder, "an empty folder", json!([]));

    let mock_server = pact_builder.start_mock_server(None, None);
    let adapter =
        ContainerRegistryAdapter::with_base_url(&base_url(mock_server.url())).expect("adapter");

    let registry = adapter
        .get(&credentials(), "team-images", &params())
        .await
        .expect("get registry");
    assert!(registry.is_none());
}

#[tokio::test]
async fn test_create_registry_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create a registry", "", |mut i| {
        i.given("a folder without the registry");
        i.request
            .method("POST")
            .path("/registries")
            .header("authorization", "Bearer test-token")
            .header("content-type", "application/json")
            .json_body(json!({
                "folderId": "b1gfolder",
                "name": "team-images"
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": "opcreate1",
                "description": "Create registry",
                "done": false,
                "metadata": { "registryId": "crpabc123" }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let adapter =
        ContainerRegistryAdapter::with_base_url(&base_url(mock_server.url())).expect("adapter");

    adapter
        .create(&credentials(), "team-images", &params())
        .await
        .expect("create registry");
}

#[tokio::test]
async fn test_create_registry_permission_denied_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create a registry without permission", "", |mut i| {
        i.given("the service account lacks container-registry.admin");
        i.request
            .method("POST")
            .path("/registries")
            .header("authorization", "Bearer test-token")
            .json_body(json!({
                "folderId": "b1gfolder",
                "name": "team-images"
            }));
        i.response
            .status(403)
            .header("content-type", "application/json")
            .json_body(json!({
                "code": 7,
                "message": "Permission denied"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let adapter =
        ContainerRegistryAdapter::with_base_url(&base_url(mock_server.url())).expect("adapter");

    let err = adapter
        .create(&credentials(), "team-images", &params())
        .await
        .expect_err("permission denied");
    match err {
        ProviderError::Fatal(e) => assert!(e.to_string().contains("Permission denied")),
        other => panic!("expected fatal error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_registry_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    list_interaction(
        &mut pact_builder,
        "a folder with the registry to delete",
        json!([{
            "id": "crpabc123",
            "folderId": "b1gfolder",
            "name": "team-images",
            "status": "ACTIVE"
        }]),
    );

    pact_builder.interaction("delete a registry by id", "", |mut i| {
        i.given("the registry crpabc123 exists");
        i.request
            .method("DELETE")
            .path("/registries/crpabc123")
            .header("authorization", "Bearer test-token");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": "opdelete1",
                "description": "Delete registry",
                "done": false
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let adapter =
        ContainerRegistryAdapter::with_base_url(&base_url(mock_server.url())).expect("adapter");

    adapter
        .delete(&credentials(), "team-images", &params())
        .await
        .expect("delete registry");
}

#[tokio::test]
async fn test_delete_missing_registry_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    list_interaction(&mut pact_builder, "a folder without the registry", json!([]));

    let mock_server = pact_builder.start_mock_server(None, None);
    let adapter =
        ContainerRegistryAdapter::with_base_url(&base_url(mock_server.url())).expect("adapter");

    let err = adapter
        .delete(&credentials(), "team-images", &params())
        .await
        .expect_err("registry is gone");
    assert!(matches!(err, ProviderError::NotFound(_)));
}
