//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use tour_server::config::{AppConfig, Environment};
use tour_server::payments::{CheckoutEvent, WebhookError, WebhookVerifier};
use tour_server::store::{
    Collection, Document, DocumentQuery, DocumentStore, InMemoryStore, StoreError,
};
use tour_server::{AppState, HttpServer, Shutdown};

/// A running server bound to an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Default configuration with the static directory pointed at nothing.
pub fn test_config(environment: Environment) -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = environment;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.assets.static_dir = "tests/no-such-public-dir".to_string();
    config
}

pub async fn spawn_app(state: AppState) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::from_state(state).unwrap();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        shutdown,
    }
}

pub async fn spawn_default(environment: Environment) -> TestApp {
    spawn_app(AppState::new(test_config(environment))).await
}

/// POST `body` with chunked transfer encoding and no `Content-Length`.
///
/// Returns the status line of the response.
pub async fn post_chunked(addr: SocketAddr, path: &str, content_type: &str, body: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: {content_type}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(head.as_bytes()).await.unwrap();

    // A rejected upload may be cut off before the last chunk is written.
    let mut encoded = Vec::with_capacity(body.len() + 64);
    for chunk in body.chunks(1024) {
        encoded.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        encoded.extend_from_slice(chunk);
        encoded.extend_from_slice(b"\r\n");
    }
    encoded.extend_from_slice(b"0\r\n\r\n");
    let _ = stream.write_all(&encoded).await;

    // The server may reset the connection after answering.
    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&response)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Store wrapper that counts every call reaching it.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl DocumentStore for CountingStore {
    fn find(
        &self,
        collection: Collection,
        query: DocumentQuery,
    ) -> BoxFuture<'_, Result<Vec<Document>, StoreError>> {
        self.hit();
        self.inner.find(collection, query)
    }

    fn get(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>> {
        self.hit();
        self.inner.get(collection, id)
    }

    fn insert(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Document, StoreError>> {
        self.hit();
        self.inner.insert(collection, fields)
    }

    fn update(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>> {
        self.hit();
        self.inner.update(collection, id, fields)
    }

    fn delete(&self, collection: Collection, id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.hit();
        self.inner.delete(collection, id)
    }
}

/// How a [`BrokenStore`] fails.
#[derive(Debug, Clone, Copy)]
pub enum Breakage {
    Unavailable,
    Panic,
}

/// Store whose every call fails.
pub struct BrokenStore(pub Breakage);

impl BrokenStore {
    fn fail<T: Send + 'static>(&self) -> BoxFuture<'_, Result<T, StoreError>> {
        match self.0 {
            Breakage::Unavailable => {
                future::ready(Err(StoreError::Unavailable("disk on fire".to_string()))).boxed()
            }
            Breakage::Panic => panic!("store exploded"),
        }
    }
}

impl DocumentStore for BrokenStore {
    fn find(&self, _: Collection, _: DocumentQuery) -> BoxFuture<'_, Result<Vec<Document>, StoreError>> {
        self.fail()
    }

    fn get(&self, _: Collection, _: Uuid) -> BoxFuture<'_, Result<Option<Document>, StoreError>> {
        self.fail()
    }

    fn insert(&self, _: Collection, _: Map<String, Value>) -> BoxFuture<'_, Result<Document, StoreError>> {
        self.fail()
    }

    fn update(
        &self,
        _: Collection,
        _: Uuid,
        _: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>> {
        self.fail()
    }

    fn delete(&self, _: Collection, _: Uuid) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.fail()
    }
}

/// Verifier that accepts everything and keeps the bytes it was given.
#[derive(Default)]
pub struct RecordingVerifier {
    pub payloads: Mutex<Vec<Vec<u8>>>,
    pub signatures: Mutex<Vec<String>>,
}

impl WebhookVerifier for RecordingVerifier {
    fn verify(&self, payload: &[u8], signature: &str) -> Result<CheckoutEvent, WebhookError> {
        self.payloads.lock().unwrap().push(payload.to_vec());
        self.signatures.lock().unwrap().push(signature.to_string());
        Ok(CheckoutEvent {
            id: None,
            kind: "payment_intent.created".to_string(),
            data: tour_server::payments::types::EventData {
                object: Default::default(),
            },
        })
    }
}

/// Shorthand for building a store handle the tests can still inspect.
pub fn shared<T: DocumentStore + 'static>(store: T) -> (Arc<T>, Arc<dyn DocumentStore>) {
    let store = Arc::new(store);
    let dynamic: Arc<dyn DocumentStore> = store.clone();
    (store, dynamic)
}
