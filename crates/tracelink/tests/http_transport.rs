// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use mockito::{Matcher, Server};
use tracelink::{Config, FlushOutcome, LogRecord, Reporter, RequestContext, Severity};

fn config(base_url: String) -> Config {
    Config {
        base_url,
        ..common::config()
    }
}

fn record(reporter: &Reporter) {
    let context = RequestContext::new("hi1", "hi2").unwrap();
    reporter.record_log_with_context(LogRecord::new(Severity::Info, "Hi1"), &context);
}

#[tokio::test]
async fn test_batch_is_put_to_ingest_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/api/ingest/be")
        .match_header("x-tracelink-private-key", "private")
        .match_header("content-type", "application/x-protobuf")
        .match_header("x-tracelink-recursive", Matcher::Missing)
        .match_header("user-agent", tracelink::transport::user_agent().as_str())
        .match_body(Matcher::Any)
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let reporter = Reporter::from_config(config(server.url())).unwrap();
    record(&reporter);

    assert_eq!(reporter.flush().await, FlushOutcome::Delivered(1));
    assert_eq!(reporter.flush().await, FlushOutcome::Empty);
    mock.assert_async().await;
}

#[test]
fn test_user_agent_names_the_library() {
    assert_eq!(
        tracelink::transport::user_agent(),
        format!("tracelink-rust/{}", env!("CARGO_PKG_VERSION"))
    );
}

#[tokio::test]
async fn test_recursive_reporter_marks_its_calls() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/api/ingest/be")
        .match_header("x-tracelink-recursive", "1")
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let reporter = Reporter::from_config(Config {
        recursive: true,
        ..config(server.url())
    })
    .unwrap();
    record(&reporter);

    assert_eq!(reporter.flush().await, FlushOutcome::Delivered(1));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_keeps_batch_for_retry() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/api/ingest/be")
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(2)
        .create_async()
        .await;

    let reporter = Reporter::from_config(config(server.url())).unwrap();
    record(&reporter);

    assert_eq!(
        reporter.flush().await,
        FlushOutcome::Rejected(http::StatusCode::INTERNAL_SERVER_ERROR)
    );
    assert_eq!(reporter.pending_len(), 1);
    reporter.flush().await;
    assert_eq!(reporter.pending_len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_backend_keeps_batch() {
    let reporter = Reporter::from_config(config("http://127.0.0.1:1".to_string())).unwrap();
    record(&reporter);

    assert_eq!(reporter.flush().await, FlushOutcome::Failed);
    assert_eq!(reporter.pending_len(), 1);
}
