// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::header::HeaderValue;
use http::{HeaderMap, StatusCode};
use tracelink::transport::{Transport, TransportError};
use tracelink::{Config, Reporter};
use tracelink_proto::{Message, SendBackendEventsRequest};

/// Scripted reply of the recording transport.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(StatusCode),
    NetworkError,
}

#[derive(Debug, Clone)]
pub struct SentBatch {
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl SentBatch {
    pub fn decode(&self) -> SendBackendEventsRequest {
        SendBackendEventsRequest::decode(self.body.as_slice()).unwrap()
    }
}

/// Records every batch and answers from a script, then with 200.
#[derive(Default)]
pub struct RecordingTransport {
    replies: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<SentBatch>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<SentBatch> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, body: Vec<u8>, headers: HeaderMap) -> Result<StatusCode, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        self.sent.lock().unwrap().push(SentBatch { body, headers });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.replies.lock().unwrap().pop_front();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply.unwrap_or(Reply::Status(StatusCode::OK)) {
            Reply::Status(status) => Ok(status),
            Reply::NetworkError => Err(TransportError::InvalidHeader(
                HeaderValue::from_str("\n").unwrap_err(),
            )),
        }
    }
}

pub fn config() -> Config {
    Config {
        private_key: "private".to_string(),
        version: "1.2.3".to_string(),
        system_name: "checkout".to_string(),
        ..Default::default()
    }
}

pub fn reporter(transport: Arc<RecordingTransport>) -> Reporter {
    Reporter::new(config(), transport).unwrap()
}
