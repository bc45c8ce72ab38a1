use super::*;
use crate::{
    config::Verify,
    error::FALLBACK_MESSAGE,
    hmac::{HmacToken, HmacUpload},
};
use httptest::{all_of, matchers::*, responders::*, Expectation, Server};
use serde_json::json;

const AUTHORIZATION: &str = "Basic dXNlckBleGFtcGxlLmNvbTpodW50ZXIy";

fn client_for(server: &Server) -> VWflow {
    VWflow::with_config(config_for(server))
}

fn config_for(server: &Server) -> ClientConfig {
    ClientConfig::new("user@example.com", "hunter2")
        .with_ssl(false)
        .with_custom_host(server.addr())
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("./snapshots/inputs/vwflow/{}.json", name)).unwrap()
}

fn upload_file(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("vwflow-{}-{}", std::process::id(), name));
    std::fs::write(&path, b"not really a video").unwrap();
    path
}

#[tokio::test]
async fn list_items_asks_for_first_page() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/"),
            request::query(eq("type=video&privacy=public&page=1")),
            request::headers(contains(("authorization", AUTHORIZATION))),
            request::headers(contains(("user-agent", "VWflow 1.0"))),
        ])
        .respond_with(status_code(200).body(fixture("items_page2"))),
    );

    let query = ItemsQuery::new().kind("video").privacy("public");
    let list = client_for(&server).list_items(&query).await.unwrap();

    assert_eq!(list.count, 1);
    assert_eq!(list.next, None);
    assert_eq!(list.results[0].id, "9c01f7b2");
}

#[tokio::test]
async fn list_items_keeps_callers_page() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/"),
            request::query(eq("search=bunny&Page=3")),
        ])
        .respond_with(status_code(200).body(fixture("items_page2"))),
    );

    let query = ItemsQuery::new().search("bunny").param("Page", 3);
    client_for(&server).list_items(&query).await.unwrap();
}

#[tokio::test]
async fn list_items_defaults_go_first() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/"),
            request::query(eq("workflow_status=Completed&tags=news,scoop&page=1")),
        ])
        .respond_with(status_code(200).body(fixture("items_page2"))),
    );

    let config = config_for(&server).with_default_query(vec![("workflow_status", "Completed")]);
    let query = ItemsQuery::new().tags("news,scoop");
    VWflow::with_config(config).list_items(&query).await.unwrap();
}

#[tokio::test]
async fn list_items_default_page_is_kept() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/"),
            request::query(eq("page=2")),
        ])
        .respond_with(status_code(200).body(fixture("items_page2"))),
    );

    let config = config_for(&server).with_default_query(vec![("page", "2")]);
    VWflow::with_config(config)
        .list_items(&ItemsQuery::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn pages_follow_next_until_exhausted() {
    let server = Server::run();
    let next = server.url_str("/api/v1/items/?type=video&page=2");

    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/"),
            request::query(eq("type=video&page=1")),
        ])
        .respond_with(status_code(200).body(fixture("items_page1").replace("{next}", &next))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/"),
            request::query(eq("type=video&page=2")),
            request::headers(contains(("authorization", AUTHORIZATION))),
        ])
        .respond_with(
            status_code(200).body(fixture("items_page2").replace("{previous}", &next)),
        ),
    );

    let client = client_for(&server);
    let query = ItemsQuery::new().kind("video");
    let pages = client.pages(&query).collect::<Vec<_>>().await;

    assert_eq!(pages.len(), 2);
    let ids = pages
        .into_iter()
        .map(Result::unwrap)
        .flat_map(|page| page.results)
        .map(|item| item.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["7f3b9a2c", "81aa0d3e", "9c01f7b2"]);
}

#[tokio::test]
async fn pages_stop_at_first_error() {
    let server = Server::run();
    let next = server.url_str("/api/v1/items/?page=2");

    server.expect(
        Expectation::matching(request::query(eq("page=1")))
            .respond_with(status_code(200).body(fixture("items_page1").replace("{next}", &next))),
    );
    server.expect(
        Expectation::matching(request::query(eq("page=2")))
            .respond_with(status_code(500)),
    );

    let client = client_for(&server);
    let query = ItemsQuery::new();
    let pages = client.pages(&query).collect::<Vec<_>>().await;

    assert_eq!(pages.len(), 2);
    assert!(pages[0].is_ok());
    let err = pages[1].as_ref().unwrap_err();
    assert_eq!(err.message, FALLBACK_MESSAGE);
    assert_eq!(err.status, Some(500));
}

#[tokio::test]
async fn create_item_sends_file_and_data() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/v1/items/"),
            request::headers(contains(("authorization", AUTHORIZATION))),
            request::body(matches(
                r#"(?s)name="src"; filename="vwflow-\d+-video\.mp4"\r\nContent-Type: video/mp4\r\n\r\nnot really a video\r\n"#
            )),
            request::body(matches(r#"(?s)name="name"\r\n\r\nVideo Title\r\n"#)),
            request::body(matches(
                r#"(?s)name="data"\r\n\r\n\{"tags":\["Tag 1","Tag 2"\]\}\r\n"#
            )),
            request::body(not(matches(r#"name="description""#))),
            request::body(not(matches(r#"name="client_data""#))),
        ])
        .times(1)
        .respond_with(status_code(201).body(fixture("item"))),
    );

    let path = upload_file("video.mp4");
    let new_item = NewItem::new(&path)
        .name("Video Title")
        .tags(vec!["Tag 1", "Tag 2"]);

    let item = client_for(&server).create_item(&new_item).await.unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(item.id, "7f3b9a2c");
    assert_eq!(item.name(), Some("Video Title"));
}

#[tokio::test]
async fn create_item_without_data() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/v1/items/"),
            request::body(matches(r#"name="src""#)),
            request::body(matches(r#"(?s)name="wprofile_id"\r\n\r\nwp-42\r\n"#)),
            request::body(matches(r#"(?s)name="client_data"\r\n\r\n\{"order":7\}\r\n"#)),
            request::body(not(matches(r#"name="data""#))),
        ])
        .respond_with(status_code(201).body(fixture("item"))),
    );

    let path = upload_file("clip.mov");
    let new_item = NewItem::new(&path)
        .wprofile_id("wp-42")
        .client_data(r#"{"order":7}"#);

    client_for(&server).create_item(&new_item).await.unwrap();
    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn create_item_missing_file() {
    // nothing should reach the server
    let server = Server::run();

    let new_item = NewItem::new("/this/does/not/exist.mp4").name("nope");
    let err = client_for(&server).create_item(&new_item).await.unwrap_err();

    assert_eq!(err.status, None);
    assert!(err.message.contains("/this/does/not/exist.mp4"), "{}", err);
}

#[tokio::test]
async fn get_item() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/v1/items/7f3b9a2c/"),
            request::headers(contains(("authorization", AUTHORIZATION))),
        ])
        .respond_with(status_code(200).body(fixture("item"))),
    );

    let item = client_for(&server).get_item("7f3b9a2c").await.unwrap();

    assert_eq!(item.kind(), Some("video"));
    assert_eq!(item.duration(), Some(152.4));
    assert!(item.is_finished());
    assert_eq!(
        item.selected_snapshot().and_then(|s| s.download()),
        Some("https://cdn01.vwflow.com/items/7f3b9a2c/snapshot_1041.jpg")
    );
}

#[tokio::test]
async fn update_item_round_trip() {
    let server = Server::run();

    let mut expected: serde_json::Value = serde_json::from_str(&fixture("item")).unwrap();
    expected["name"] = json!("My Title");
    expected["description"] = json!("My Description");
    expected["tags"] = json!(["My First Tag", "My Second Tag"]);

    server.expect(
        Expectation::matching(request::method_path("GET", "/api/v1/items/7f3b9a2c/"))
            .respond_with(status_code(200).body(fixture("item"))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", "/api/v1/items/7f3b9a2c/"),
            request::headers(contains(("content-type", "application/json"))),
            request::body(json_decoded(eq(expected.clone()))),
        ])
        .respond_with(json_encoded(expected)),
    );

    let client = client_for(&server);
    let mut item = client.get_item("7f3b9a2c").await.unwrap();
    item.set_name("My Title".to_string());
    item.set_description("My Description".to_string());
    item.set_tags(vec!["My First Tag".to_string(), "My Second Tag".to_string()]);

    let updated = client.update_item(&item).await.unwrap();
    assert_eq!(updated.id, "7f3b9a2c");
    assert_eq!(updated.name(), Some("My Title"));
    assert_eq!(updated.description(), Some("My Description"));
    assert_eq!(updated.tags, item.tags);
    assert_eq!(updated.extra, item.extra);
}

#[tokio::test]
async fn update_item_sends_back_what_it_got() {
    let server = Server::run();
    let expected: serde_json::Value = serde_json::from_str(&fixture("item_sparse")).unwrap();

    server.expect(
        Expectation::matching(request::method_path("GET", "/api/v1/items/3d5e0a71/"))
            .respond_with(status_code(200).body(fixture("item_sparse"))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", "/api/v1/items/3d5e0a71/"),
            request::body(json_decoded(eq(expected.clone()))),
        ])
        .respond_with(json_encoded(expected)),
    );

    let client = client_for(&server);
    let item = client.get_item("3d5e0a71").await.unwrap();
    let updated = client.update_item(&item).await.unwrap();
    assert_eq!(updated, item);
}

#[tokio::test]
async fn set_item_snapshot() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", "/api/v1/items/7f3b9a2c/"),
            request::body(json_decoded(eq(json!({ "snapshot_id": 1042 })))),
        ])
        .respond_with(status_code(200).body(fixture("item"))),
    );

    client_for(&server)
        .set_item_snapshot("7f3b9a2c", 1042)
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_item() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("DELETE", "/api/v1/items/7f3b9a2c/"),
            request::headers(contains(("authorization", AUTHORIZATION))),
        ])
        .respond_with(status_code(204)),
    );

    client_for(&server).delete_item("7f3b9a2c").await.unwrap();
}

#[tokio::test]
async fn error_messages() {
    let tests = vec![
        (400, r#"{"detail":"Invalid profile"}"#, "Invalid profile"),
        (403, "plain text error", "plain text error"),
        (500, "", FALLBACK_MESSAGE),
    ];

    for (status, body, expected) in tests {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/api/v1/items/abc/"))
                .respond_with(status_code(status).body(body)),
        );

        let err = client_for(&server).delete_item("abc").await.unwrap_err();
        assert_eq!(err.message, expected);
        assert_eq!(err.status, Some(status));
    }
}

#[tokio::test]
async fn not_found_is_a_remote_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/v1/items/missing/"))
            .respond_with(status_code(404).body(r#"{"detail":"Not found."}"#)),
    );

    let err = client_for(&server).get_item("missing").await.unwrap_err();
    assert_eq!(err.message, "Not found.");
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn undecodable_body() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/v1/items/abc/"))
            .respond_with(status_code(200).body("<html>maintenance</html>")),
    );

    let err = client_for(&server).get_item("abc").await.unwrap_err();
    assert_eq!(err.status, Some(200));
    assert!(err.message.starts_with("cannot decode response"), "{}", err);
}

#[tokio::test]
async fn connection_refused() {
    let config = ClientConfig::new("user", "pass")
        .with_ssl(false)
        .with_custom_host("127.0.0.1:1");

    let err = VWflow::with_config(config).get_item("abc").await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(!err.message.is_empty());
}

#[tokio::test]
async fn bad_ca_file_fails_on_first_request() {
    let config = ClientConfig::new("user", "pass")
        .with_verify(Verify::CaFile("/this/does/not/exist.pem".into()));

    let client = VWflow::with_config(config);
    assert_eq!(client.base_url(), "https://vwflow.com/api/v1/");

    let err = client.get_item("abc").await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(err.message.starts_with("cannot read ca file"), "{}", err);
}

#[tokio::test]
async fn hmac_upload() {
    let server = Server::run();
    let token = HmacToken::new("secret", "nonce", 1_457_100_118).client_data("abc");

    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/v1/items-hmac/acc-1/wp-42/"),
            request::headers(contains((
                "x-vwflow-hmac",
                "30bac89ce216dac0562a39a14b1307dc"
            ))),
            request::headers(contains((
                "x-vwflow-info",
                r#"{"msg_data":"nonce","msg_timestamp":"1457100118","client_data":"abc"}"#
            ))),
            request::headers(not(contains(key("authorization")))),
            request::body(matches(r#"name="src"; filename="vwflow-\d+-hmac\.mp4""#)),
        ])
        .respond_with(json_encoded(json!({
            "url": "https://vwflow.com/api/v1/items/7f3b9a2c/"
        }))),
    );

    let path = upload_file("hmac.mp4");
    let upload = HmacUpload::new(&path, "acc-1", "wp-42", "secret").client_data("abc");
    let resp = client_for(&server)
        .upload_with_token(&upload, &token)
        .await
        .unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(resp["url"], "https://vwflow.com/api/v1/items/7f3b9a2c/");
}

#[tokio::test]
async fn hmac_upload_generates_token() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/v1/items-hmac/acc-1/wp-42/"),
            request::headers(contains(key("x-vwflow-hmac"))),
            request::headers(contains(key("x-vwflow-info"))),
        ])
        .respond_with(status_code(400).body(r#"{"detail":"HMAC expired"}"#)),
    );

    let path = upload_file("hmac-fresh.mp4");
    let upload = HmacUpload::new(&path, "acc-1", "wp-42", "secret");
    let err = client_for(&server)
        .create_item_with_hmac(&upload)
        .await
        .unwrap_err();
    std::fs::remove_file(path).unwrap();

    assert_eq!(err.message, "HMAC expired");
}

#[test]
fn hmac_redirect_url() {
    let client = VWflow::new("user", "pass");
    assert_eq!(
        client.hmac_redirect_url("acc-1", "wp-42"),
        "https://vwflow.com/api/v1/items-hmac-redirect/acc-1/wp-42/"
    );
}
