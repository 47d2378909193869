mod common;

use request_baskets::{
    config::AppConfig,
    forward::Forwarder,
    handlers::{router, AppState},
    registry::MemoryRegistry,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

const MASTER: &str = "master-secret";

async fn spawn_service() -> String {
    let config = AppConfig {
        default_capacity: 3,
        max_capacity: 10,
        master_token: MASTER.to_string(),
        ..Default::default()
    };
    let state = AppState {
        config: Arc::new(config),
        registry: Arc::new(MemoryRegistry::new()),
        forwarder: Arc::new(Forwarder::new(Duration::from_secs(5)).unwrap()),
    };
    let addr = common::spawn_server(router(state)).await;
    format!("http://{}", addr)
}

async fn create(client: &Client, base: &str, name: &str, config: Value) -> String {
    let response = client
        .post(format!("{}/api/baskets/{}", base, name))
        .json(&config)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let auth: Value = response.json().await.unwrap();
    auth["token"].as_str().unwrap().to_string()
}

#[test_log::test(tokio::test)]
async fn captures_and_lists_requests() {
    let base = spawn_service().await;
    let client = Client::new();
    let token = create(&client, &base, "b1", json!({})).await;

    for body in ["A", "B", "C", "D"] {
        let response = client
            .post(format!("{}/b1/orders?id={}", base, body))
            .header("x-source", "test")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let page: Value = client
        .get(format!("{}/api/baskets/b1/requests?max=10", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(page["count"], 3);
    assert_eq!(page["total_count"], 3);
    assert_eq!(page["has_more"], false);
    let requests = page["requests"].as_array().unwrap();
    assert_eq!(requests[0]["body"], "B");
    assert_eq!(requests[2]["body"], "D");
    assert_eq!(requests[2]["path"], "/b1/orders");
    assert_eq!(requests[2]["query"], "id=D");
    assert_eq!(requests[2]["method"], "POST");
    assert_eq!(requests[2]["headers"]["x-source"], json!(["test"]));
}

#[test_log::test(tokio::test)]
async fn clamps_negative_paging_to_zero() {
    let base = spawn_service().await;
    let client = Client::new();
    let token = create(&client, &base, "neg", json!({})).await;
    client.post(format!("{}/neg", base)).body("A").send().await.unwrap();

    let response = client
        .get(format!("{}/api/baskets/neg/requests?max=-1", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["count"], 0);
    assert_eq!(page["total_count"], 1);
    assert_eq!(page["has_more"], true);

    let page: Value = client
        .get(format!("{}/api/baskets/neg/requests?max=5&skip=-3", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 1);
    assert_eq!(page["requests"][0]["body"], "A");

    let names = client
        .get(format!("{}/api/baskets?max=-10&skip=-1", base))
        .header("Authorization", MASTER)
        .send()
        .await
        .unwrap();
    assert_eq!(names.status(), StatusCode::OK);
    let names: Value = names.json().await.unwrap();
    assert_eq!(names["count"], 0);
}

#[test_log::test(tokio::test)]
async fn searches_requests() {
    let base = spawn_service().await;
    let client = Client::new();
    let token = create(&client, &base, "search", json!({"capacity": 10})).await;

    for body in ["needle one", "hay", "needle two"] {
        client
            .put(format!("{}/search", base))
            .body(body)
            .send()
            .await
            .unwrap();
    }

    let page: Value = client
        .get(format!("{}/api/baskets/search/requests?q=needle&in=body&max=1", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(page["requests"].as_array().unwrap().len(), 1);
    assert_eq!(page["requests"][0]["body"], "needle one");
    assert_eq!(page["has_more"], true);
    assert!(page.get("total_count").is_none());
}

#[test_log::test(tokio::test)]
async fn rejects_bad_tokens_and_unknown_baskets() {
    let base = spawn_service().await;
    let client = Client::new();
    create(&client, &base, "private", json!({})).await;

    let response = client
        .get(format!("{}/api/baskets/private/requests", base))
        .header("Authorization", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/api/baskets/private", base))
        .header("Authorization", MASTER)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get(format!("{}/nowhere", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn create_reports_conflicts_and_invalid_config() {
    let base = spawn_service().await;
    let client = Client::new();
    create(&client, &base, "taken", json!({})).await;

    let duplicate = client
        .post(format!("{}/api/baskets/taken", base))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    for config in [
        json!({"capacity": 0}),
        json!({"capacity": 11}),
        json!({"forward_url": "nope"}),
    ] {
        let response = client
            .post(format!("{}/api/baskets/invalid", base))
            .json(&config)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", config);
    }

    let reserved = client
        .post(format!("{}/api/baskets/api", base))
        .send()
        .await
        .unwrap();
    assert_eq!(reserved.status(), StatusCode::FORBIDDEN);

    let names: Value = client
        .get(format!("{}/api/baskets", base))
        .header("Authorization", MASTER)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names["names"], json!(["taken"]));
    assert_eq!(names["count"], 1);
}

#[test_log::test(tokio::test)]
async fn replies_with_configured_response() {
    let base = spawn_service().await;
    let client = Client::new();
    let token = create(&client, &base, "mock", json!({})).await;

    let response = client
        .put(format!("{}/api/baskets/mock/responses/GET", base))
        .header("Authorization", &token)
        .json(&json!({
            "status": 418,
            "headers": {"x-mock": ["yes"]},
            "body": "short and stout"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let reply = client.get(format!("{}/mock/tea", base)).send().await.unwrap();
    assert_eq!(reply.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(reply.headers()["x-mock"], "yes");
    assert_eq!(reply.text().await.unwrap(), "short and stout");

    let other = client.post(format!("{}/mock", base)).send().await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
    assert_eq!(other.text().await.unwrap(), "");
}

#[test_log::test(tokio::test)]
async fn updates_clears_and_deletes_basket() {
    let base = spawn_service().await;
    let client = Client::new();
    let token = create(&client, &base, "life", json!({"capacity": 5})).await;

    for body in ["1", "2", "3", "4"] {
        client.post(format!("{}/life", base)).body(body).send().await.unwrap();
    }

    let response = client
        .put(format!("{}/api/baskets/life", base))
        .header("Authorization", &token)
        .json(&json!({"capacity": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let page: Value = client
        .get(format!("{}/api/baskets/life/requests", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total_count"], 2);
    assert_eq!(page["requests"][0]["body"], "3");

    let response = client
        .delete(format!("{}/api/baskets/life/requests", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .delete(format!("{}/api/baskets/life", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{}/api/baskets/life", base))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn forwards_captured_requests() {
    let base = spawn_service().await;
    let client = Client::new();

    let upstream_token = create(&client, &base, "upstream", json!({})).await;
    create(
        &client,
        &base,
        "relay",
        json!({"forward_url": format!("{}/upstream/in?a=1", base), "expand_path": true}),
    )
    .await;

    let response = client
        .post(format!("{}/relay/deep/path?b=2", base))
        .body("relayed")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut forwarded = Value::Null;
    for _ in 0..50 {
        let page: Value = client
            .get(format!("{}/api/baskets/upstream/requests", base))
            .header("Authorization", &upstream_token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if page["count"] == 1 {
            forwarded = page["requests"][0].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(forwarded["path"], "/upstream/in/deep/path");
    assert_eq!(forwarded["query"], "a=1&b=2");
    assert_eq!(forwarded["body"], "relayed");
}
