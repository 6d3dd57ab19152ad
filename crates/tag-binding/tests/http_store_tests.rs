//! Integration tests for the HTTP tag store against a mock tagging API.

use serde_json::json;
use tag_binding::{
    HttpTagStore, Presence, StoreError, Tag, TagBinding, TagController, TagError, TagFilter,
    TagStore,
};
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn store(server: &MockServer) -> HttpTagStore {
    HttpTagStore::new(&server.uri(), Some("t0ken".to_string())).unwrap()
}

#[tokio::test]
async fn test_add_tag_posts_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/resources/i-12345/tags"))
        .and(bearer_token("t0ken"))
        .and(body_json(json!({"tags": [{"key": "Name", "value": "web-1"}]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .await
        .add_tag(&Tag::new("i-12345", "Name", "web-1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_tags_sends_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .and(query_param("resource-id", "i-12345"))
        .and(query_param("key", "Name"))
        .and(query_param("value", "web 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [{"resource_id": "i-12345", "key": "Name", "value": "web 1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tags = store(&server)
        .await
        .list_tags(
            &TagFilter::resource("i-12345")
                .with_key("Name")
                .with_value("web 1"),
        )
        .await
        .unwrap();

    assert_eq!(tags, vec![Tag::new("i-12345", "Name", "web 1")]);
}

#[tokio::test]
async fn test_list_tags_drops_rows_outside_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [
                {"resource_id": "i-12345", "key": "Name", "value": "web-1"},
                {"resource_id": "i-12345", "key": "env", "value": "prod"}
            ]
        })))
        .mount(&server)
        .await;

    let tags = store(&server)
        .await
        .list_tags(&TagFilter::resource("i-12345").with_key("env"))
        .await
        .unwrap();

    assert_eq!(tags, vec![Tag::new("i-12345", "env", "prod")]);
}

#[tokio::test]
async fn test_remove_tag_treats_not_found_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/resources/i-12345/tags"))
        .and(query_param("key", "Name"))
        .and(query_param("value", ""))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .await
        .remove_tag(&Tag::new("i-12345", "Name", ""))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_throttling_maps_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .add_tag(&Tag::new("i-1", "env", "prod"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Throttled {
            retry_after_secs: Some(7)
        }
    ));
}

#[tokio::test]
async fn test_api_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"message": "not authorized to tag i-1"})),
        )
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .add_tag(&Tag::new("i-1", "env", "prod"))
        .await
        .unwrap_err();

    match err {
        StoreError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "not authorized to tag i-1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_resource_on_add_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such resource"))
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .add_tag(&Tag::new("i-404", "env", "prod"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound(ref m) if m == "no such resource"));
}

#[tokio::test]
async fn test_malformed_list_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .list_tags(&TagFilter::resource("i-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Serialization(_)));
}

#[tokio::test]
async fn test_controller_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/resources/vpc-0a1b/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .and(query_param("resource-id", "vpc-0a1b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": []})))
        .mount(&server)
        .await;

    let controller = TagController::new(store(&server).await);
    let binding = TagBinding::new("vpc-0a1b", "Name", "test_tag").unwrap();

    // Write accepted but not yet listed
    let created = controller.create(&binding).await.unwrap();
    assert!(created.record.is_present());
    assert!(!created.record.confirmed);

    assert_eq!(controller.read(&binding).await.unwrap(), Presence::Absent);
}

#[tokio::test]
async fn test_controller_wraps_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let controller = TagController::new(store(&server).await);
    let binding = TagBinding::new("i-1", "env", "prod").unwrap();
    let mut record = tag_binding::TagRecord::absent(binding.clone());
    record.mark_present(true);

    let err = controller.delete(&mut record).await.unwrap_err();
    assert!(matches!(err, TagError::Remote { .. }));
    assert!(err.is_retryable());
    assert_eq!(record.id, Some(binding.id()));
}
