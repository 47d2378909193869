#![allow(dead_code)]

use axum::Router;
use bytes::Bytes;
use request_baskets::model::{Headers, RequestRecord};
use std::net::SocketAddr;

pub fn record(body: &str) -> RequestRecord {
    RequestRecord {
        date: chrono::Utc::now().timestamp_millis(),
        headers: Headers::new(),
        content_length: body.len() as i64,
        body: Bytes::copy_from_slice(body.as_bytes()),
        method: "POST".to_string(),
        path: "/test".to_string(),
        query: String::new(),
    }
}

pub fn record_with_header(body: &str, name: &str, value: &str) -> RequestRecord {
    let mut record = record(body);
    record
        .headers
        .insert(name.to_string(), vec![value.to_string()]);
    record
}

pub fn bodies(records: &[RequestRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|r| std::str::from_utf8(&r.body).expect("text body"))
        .collect()
}

/// Serves `app` on an ephemeral local port.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}
