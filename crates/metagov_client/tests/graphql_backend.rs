//! GraphQlBackend against a mock server.

use metagov_client::{BackendConfig, GraphQlBackend};
use metagov_core::error::{BackendError, GovError};
use metagov_core::ports::{DeleteOutcome, MetadataBackend};
use metagov_core::sync_status::SyncStatus;
use metagov_core::types::*;
use metagov_core::urn::Urn;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> GraphQlBackend {
    let config = BackendConfig::new(&server.uri()).unwrap().with_token("secret");
    GraphQlBackend::new(&config).unwrap()
}

fn urn(s: &str) -> Urn {
    Urn::parse(s).unwrap()
}

fn tag_result(id: &str, name: &str) -> serde_json::Value {
    json!({
        "entity": {
            "urn": format!("urn:li:tag:{id}"),
            "type": "TAG",
            "name": id,
            "properties": {"name": name, "colorHex": "#abcdef"},
            "ownership": {"owners": [{
                "owner": {"urn": "urn:li:corpuser:alice"},
                "ownershipType": {"urn": "urn:li:ownershipType:__system__technical_owner"}
            }]}
        }
    })
}

#[tokio::test]
async fn list_follows_pages_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/graphql"))
        .and(header("authorization", "Bearer secret"))
        .and(body_string_contains("\"start\":0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"search": {"start": 0, "count": 2, "total": 3,
                "searchResults": [tag_result("a", "A"), tag_result("b", "B")]}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/graphql"))
        .and(body_string_contains("\"start\":2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"search": {"start": 2, "count": 1, "total": 3,
                "searchResults": [tag_result("c", "C")]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tags = backend(&server).list(EntityKind::Tag).await.unwrap();
    assert_eq!(tags.len(), 3);
    assert_eq!(tags[2].urn, urn("urn:li:tag:c"));
    assert_eq!(tags[2].name, "C");
    assert_eq!(tags[0].sync_status, SyncStatus::RemoteOnly);
    assert_eq!(tags[0].owners.len(), 1);
    match &tags[0].body {
        EntityBody::Tag(a) => assert_eq!(a.color_hex.as_deref(), Some("#abcdef")),
        other => panic!("unexpected body {other:?}"),
    }
}

#[tokio::test]
async fn get_missing_entity_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"entity": {"urn": "urn:li:tag:gone", "type": "TAG", "name": null, "properties": null}}
        })))
        .mount(&server)
        .await;

    let got = backend(&server)
        .get(EntityKind::Tag, &urn("urn:li:tag:gone"))
        .await
        .unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn http_error_status_maps_to_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = backend(&server).list(EntityKind::Domain).await.unwrap_err();
    match err {
        GovError::Backend(BackendError::Http { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn html_response_is_not_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>login</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let err = backend(&server).list(EntityKind::Tag).await.unwrap_err();
    assert!(matches!(
        err,
        GovError::Backend(BackendError::NotJson { ref content_type }) if content_type == "text/html"
    ));
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn graphql_errors_are_collected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Unauthorized"}, {"message": "try again"}],
            "data": null
        })))
        .mount(&server)
        .await;

    let err = backend(&server).list(EntityKind::Tag).await.unwrap_err();
    assert_eq!(err.to_string(), "backend: graphql error: Unauthorized; try again");
}

#[tokio::test]
async fn delete_not_found_is_already_absent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("deleteDomain"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Domain urn:li:domain:x does not exist"}]
        })))
        .mount(&server)
        .await;

    let outcome = backend(&server)
        .delete(EntityKind::Domain, &urn("urn:li:domain:x"))
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
}

#[tokio::test]
async fn delete_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("deleteGlossaryEntity"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"deleteGlossaryEntity": true}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server)
        .delete(EntityKind::GlossaryTerm, &urn("urn:li:glossaryTerm:t"))
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
}

#[tokio::test]
async fn upsert_creates_missing_tag_with_color_and_owners() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("query entity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"entity": null}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("mutation createTag"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"createTag": "urn:li:tag:pii"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("mutation setTagColor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"setTagColor": true}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("mutation batchAddOwners"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"batchAddOwners": true}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut tag = Entity::remote(
        urn("urn:li:tag:pii"),
        "PII",
        EntityBody::Tag(TagAttrs {
            color_hex: Some("#ff0000".into()),
        }),
    );
    tag.owners = vec![OwnershipRecord {
        owner_urn: urn("urn:li:corpuser:alice"),
        ownership_type_urn: urn("urn:li:ownershipType:__system__technical_owner"),
    }];

    let got = backend(&server).upsert(&tag).await.unwrap();
    assert_eq!(got, urn("urn:li:tag:pii"));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let config = BackendConfig::new("http://127.0.0.1:1").unwrap();
    let backend = GraphQlBackend::new(&config).unwrap();
    let err = backend.list(EntityKind::Tag).await.unwrap_err();
    assert!(matches!(err, GovError::Backend(BackendError::Transport(_))));
}

async fn mount_existing(server: &MockServer, raw: serde_json::Value) {
    let urn = raw["urn"].as_str().unwrap().to_string();
    Mock::given(method("POST"))
        .and(body_string_contains("query entity"))
        .and(body_string_contains(urn.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"entity": raw}})))
        .mount(server)
        .await;
}

async fn mount_mutation(server: &MockServer, name: &str, times: u64) {
    let mut data = serde_json::Map::new();
    data.insert(name.to_string(), json!(true));
    Mock::given(method("POST"))
        .and(body_string_contains(format!("mutation {name}(").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn upsert_existing_sends_kind_specific_updates() {
    let server = MockServer::start().await;
    mount_existing(&server, json!({"urn": "urn:li:tag:pii", "properties": {"name": "Old"}})).await;
    mount_existing(&server, json!({"urn": "urn:li:domain:d1", "properties": {"name": "Old"}})).await;
    mount_existing(&server, json!({"urn": "urn:li:glossaryNode:n1", "properties": {"name": "Old"}})).await;
    mount_existing(&server, json!({"urn": "urn:li:glossaryTerm:t1", "properties": {"name": "Old"}})).await;
    mount_existing(
        &server,
        json!({"urn": "urn:li:structuredProperty:io.tier",
               "definition": {"qualifiedName": "io.tier", "displayName": "Old"}}),
    )
    .await;

    mount_mutation(&server, "updateTag", 1).await;
    mount_mutation(&server, "setTagColor", 1).await;
    // domain, node and term
    mount_mutation(&server, "updateName", 3).await;
    mount_mutation(&server, "updateDescription", 3).await;
    mount_mutation(&server, "moveDomain", 1).await;
    mount_mutation(&server, "updateParentNode", 2).await;
    mount_mutation(&server, "updateStructuredProperty", 1).await;
    mount_mutation(&server, "batchAddOwners", 0).await;

    let entities = vec![
        Entity::remote(
            urn("urn:li:tag:pii"),
            "PII",
            EntityBody::Tag(TagAttrs {
                color_hex: Some("#ff0000".into()),
            }),
        ),
        Entity::remote(
            urn("urn:li:domain:d1"),
            "Finance",
            EntityBody::Domain(DomainAttrs::default()),
        ),
        Entity::remote(
            urn("urn:li:glossaryNode:n1"),
            "Node",
            EntityBody::GlossaryNode(GlossaryNodeAttrs::default()),
        ),
        Entity::remote(
            urn("urn:li:glossaryTerm:t1"),
            "Term",
            EntityBody::GlossaryTerm(GlossaryTermAttrs::default()),
        ),
        Entity::remote(
            urn("urn:li:structuredProperty:io.tier"),
            "Tier",
            EntityBody::StructuredProperty(StructuredPropertyAttrs {
                qualified_name: "io.tier".into(),
                value_type: urn("urn:li:dataType:datahub.string"),
                cardinality: Cardinality::Single,
                allowed_values: vec![],
                entity_types: vec![],
                immutable: false,
            }),
        ),
    ];

    let backend = backend(&server);
    for entity in &entities {
        let got = backend.upsert(entity).await.unwrap();
        assert_eq!(&got, &entity.urn);
    }
}
