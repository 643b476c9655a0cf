//! End-to-end tests of the slot issuer and the local storage routes over real HTTP.

use axum::body::Body;
use axum::http::Request;
use regcomment_core::attachment::encode_name_metadata;
use regcomment_core::paths::normalize_prefix;
use regcomment_core::{AttachmentPolicy, UploadSlot};
use regcomment_server::build_router;
use regcomment_server::test_helpers::{spawn_test_server, spawn_test_server_with, test_state};
use regcomment_store::ObjectStore;
use tower::ServiceExt;

async fn request_slot(base_url: &str, name: &str, size: u64, mime: &str) -> UploadSlot {
    let resp = reqwest::Client::new()
        .get(format!("{base_url}comments/attachment"))
        .query(&[("size", size.to_string()), ("name", name.into()), ("type", mime.into())])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "slot request failed: {}", resp.status());
    resp.json().await.unwrap()
}

#[tokio::test]
async fn slot_then_put_then_get() {
    let server = spawn_test_server().await;
    let body = vec![7u8; 2000];
    let slot = request_slot(&server.base_url, "notice.pdf", 2000, "application/pdf").await;

    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "application/pdf")
        .header("x-amz-meta-name", "notice.pdf")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let stored = server
        .store
        .get(&regcomment_store::upload_key(&slot.key))
        .await
        .unwrap();
    assert_eq!(stored.as_ref(), body.as_slice());

    let resp = reqwest::get(slot.get_url()).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"notice.pdf\"; filename*=UTF-8''notice.pdf"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), body.as_slice());
}

#[tokio::test]
async fn slot_is_consumed_by_a_successful_put() {
    let server = spawn_test_server().await;
    let slot = request_slot(&server.base_url, "a.txt", 4, "text/plain").await;
    assert_eq!(server.state.bindings.len(), 1);

    let put = || {
        reqwest::Client::new()
            .put(slot.put_url())
            .header("content-type", "text/plain")
            .header("x-amz-meta-name", "a.txt")
            .body("abcd")
            .send()
    };
    assert_eq!(put().await.unwrap().status(), 200);
    assert!(server.state.bindings.is_empty());
    assert_eq!(put().await.unwrap().status(), 403);
}

#[tokio::test]
async fn non_ascii_name_uploads_and_downloads() {
    let server = spawn_test_server().await;
    let slot = request_slot(&server.base_url, "résumé.pdf", 3, "application/pdf").await;

    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "application/pdf")
        .header("x-amz-meta-name", encode_name_metadata("résumé.pdf"))
        .body("pdf")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(slot.get_url()).await.unwrap();
    let disposition = resp.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
}

#[tokio::test]
async fn quoted_name_yields_a_valid_disposition() {
    let server = spawn_test_server().await;
    let name = "say \"hi\".txt";
    let slot = request_slot(&server.base_url, name, 2, "text/plain").await;

    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "text/plain")
        .header("x-amz-meta-name", encode_name_metadata(name))
        .body("hi")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(slot.get_url()).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"say _hi_.txt\";"));
}

#[tokio::test]
async fn download_metadata_survives_restart() {
    let server = spawn_test_server().await;
    let slot = request_slot(&server.base_url, "notice.pdf", 4, "application/pdf").await;
    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "application/pdf")
        .header("x-amz-meta-name", "notice.pdf")
        .body("abcd")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Same storage, fresh in-memory state.
    let prefix = normalize_prefix("/");
    let restarted = test_state(
        &server.base_url,
        AttachmentPolicy::default(),
        server.store.clone(),
    );
    assert!(restarted.bindings.is_empty());
    let resp = build_router(restarted, &prefix)
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/{}", slot.key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("filename=\"notice.pdf\""));
}

#[tokio::test]
async fn put_with_wrong_name_is_rejected() {
    let server = spawn_test_server().await;
    let slot = request_slot(&server.base_url, "notice.pdf", 4, "application/pdf").await;

    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "application/pdf")
        .header("x-amz-meta-name", "renamed.pdf")
        .body("abcd")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert!(server.store.is_empty());
    assert_eq!(server.state.bindings.len(), 1);
}

#[tokio::test]
async fn put_with_wrong_content_type_is_rejected() {
    let server = spawn_test_server().await;
    let slot = request_slot(&server.base_url, "notice.pdf", 4, "application/pdf").await;

    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "text/plain")
        .header("x-amz-meta-name", "notice.pdf")
        .body("abcd")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn put_with_wrong_length_is_rejected() {
    let server = spawn_test_server().await;
    let slot = request_slot(&server.base_url, "notice.pdf", 4, "application/pdf").await;

    let resp = reqwest::Client::new()
        .put(slot.put_url())
        .header("content-type", "application/pdf")
        .header("x-amz-meta-name", "notice.pdf")
        .body("abcdef")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn oversized_slot_request_is_rejected() {
    let server = spawn_test_server_with(
        "/eregs",
        AttachmentPolicy {
            max_size: 100,
            ..Default::default()
        },
    )
    .await;
    assert!(server.base_url.ends_with("/eregs/"));

    let resp = reqwest::Client::new()
        .get(format!("{}comments/attachment", server.base_url))
        .query(&[("size", "101"), ("name", "big.pdf")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["message"], "Invalid attachment size");
    assert!(server.state.bindings.is_empty());
}
