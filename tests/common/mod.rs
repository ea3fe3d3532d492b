//! In-memory registry used by the integration tests
//!
//! Implements just enough of the OCI Distribution endpoints to drive the
//! client end to end, and records every request it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use oci_transfer::digest::ContentDigest;
use oci_transfer::registry::{RegistryClient, RegistryTransport, TransportRequest, TransportResponse};
use oci_transfer::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

pub const BASE: &str = "http://fake.registry";

/// Canned reply used by overrides
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn into_response(self) -> TransportResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            headers.append(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value).unwrap(),
            );
        }
        TransportResponse::from_bytes(self.status, headers, self.body)
    }
}

type Override = Box<dyn Fn(&TransportRequest) -> Option<Reply> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct State {
    requests: Vec<Recorded>,
    uploads: HashMap<u64, Vec<u8>>,
    blobs: HashMap<String, Bytes>,
    manifests: HashMap<String, (String, Bytes)>,
    next_session: u64,
    next_location: u64,
}

#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
    /// Value of `OCI-Chunk-Min-Length` on session start
    pub min_chunk_size: Option<u64>,
    /// Hand out absolute upload locations on another host
    pub absolute_locations: bool,
    overrides: Vec<Override>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_chunk_size(mut self, size: u64) -> Self {
        self.min_chunk_size = Some(size);
        self
    }

    pub fn with_absolute_locations(mut self) -> Self {
        self.absolute_locations = true;
        self
    }

    /// Answer matching requests with a canned reply instead of the registry logic
    pub fn with_override<F>(mut self, f: F) -> Self
    where
        F: Fn(&TransportRequest) -> Option<Reply> + Send + Sync + 'static,
    {
        self.overrides.push(Box::new(f));
        self
    }

    pub fn into_client(self) -> (Arc<FakeRegistry>, RegistryClient) {
        let registry = Arc::new(self);
        let client = RegistryClient::builder(BASE)
            .with_default_chunk_size(1024)
            .with_transport(registry.clone())
            .build()
            .unwrap();
        (registry, client)
    }

    pub fn insert_blob(&self, data: &[u8]) -> ContentDigest {
        let digest = ContentDigest::of(data);
        self.state
            .lock()
            .unwrap()
            .blobs
            .insert(digest.to_string(), Bytes::copy_from_slice(data));
        digest
    }

    pub fn insert_manifest(&self, name: &str, reference: &str, media_type: &str, body: &[u8]) -> ContentDigest {
        let digest = ContentDigest::of(body);
        let entry = (media_type.to_string(), Bytes::copy_from_slice(body));
        let mut state = self.state.lock().unwrap();
        state.manifests.insert(format!("{}:{}", name, reference), entry.clone());
        state.manifests.insert(format!("{}:{}", name, digest), entry);
        digest
    }

    pub fn blob(&self, digest: &ContentDigest) -> Option<Bytes> {
        self.state.lock().unwrap().blobs.get(&digest.to_string()).cloned()
    }

    pub fn manifest(&self, name: &str, reference: &str) -> Option<(String, Bytes)> {
        self.state
            .lock()
            .unwrap()
            .manifests
            .get(&format!("{}:{}", name, reference))
            .cloned()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.method == method).collect()
    }

    fn location(&self, state: &mut State, path: &str) -> String {
        state.next_location += 1;
        let relative = format!("{}?step={}", path, state.next_location);
        if self.absolute_locations {
            format!("https://uploads.elsewhere{}", relative)
        } else {
            relative
        }
    }

    fn handle(&self, request: &TransportRequest) -> Reply {
        let path = request.url.path().to_string();
        let Some(rest) = path.strip_prefix("/v2/") else {
            return Reply::new(StatusCode::NOT_FOUND);
        };
        let mut state = self.state.lock().unwrap();
        let body = request.body.clone().unwrap_or_default();

        if let Some(name) = rest.strip_suffix("/blobs/uploads/") {
            if request.method != Method::POST {
                return Reply::new(StatusCode::METHOD_NOT_ALLOWED);
            }
            state.next_session += 1;
            let id = state.next_session;
            state.uploads.insert(id, Vec::new());
            let location = self.location(&mut state, &format!("/v2/{}/blobs/uploads/{}", name, id));
            let mut reply = Reply::new(StatusCode::ACCEPTED).header("location", &location);
            if let Some(min) = self.min_chunk_size {
                reply = reply.header("oci-chunk-min-length", &min.to_string());
            }
            return reply;
        }

        if let Some((name, id)) = rest.split_once("/blobs/uploads/") {
            let Ok(id) = id.parse::<u64>() else {
                return Reply::new(StatusCode::NOT_FOUND);
            };
            let Some(received) = state.uploads.get(&id).map(|b| b.len()) else {
                return Reply::new(StatusCode::NOT_FOUND);
            };

            if request.method == Method::PATCH {
                // without a range the chunk continues where the last one ended
                let start = match request.headers.get("content-range").and_then(|v| v.to_str().ok()) {
                    Some(range) => range.split('-').next().unwrap_or("x").parse().unwrap_or(usize::MAX),
                    None => received,
                };
                if start != received {
                    return Reply::new(StatusCode::RANGE_NOT_SATISFIABLE);
                }
                state.uploads.get_mut(&id).unwrap().extend_from_slice(&body);
                let location = self.location(&mut state, &format!("/v2/{}/blobs/uploads/{}", name, id));
                return Reply::new(StatusCode::ACCEPTED).header("location", &location);
            }

            if request.method == Method::PUT {
                let digest = request
                    .url
                    .query_pairs()
                    .find(|(k, _)| k == "digest")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                let mut data = state.uploads.remove(&id).unwrap_or_default();
                data.extend_from_slice(&body);
                if ContentDigest::of(&data).to_string() != digest {
                    return Reply::new(StatusCode::BAD_REQUEST)
                        .body(r#"{"errors":[{"code":"DIGEST_INVALID"}]}"#);
                }
                state.blobs.insert(digest.clone(), Bytes::from(data));
                return Reply::new(StatusCode::CREATED)
                    .header("location", &format!("/v2/{}/blobs/{}", name, digest));
            }

            return Reply::new(StatusCode::METHOD_NOT_ALLOWED);
        }

        if let Some((_, digest)) = rest.split_once("/blobs/") {
            return match state.blobs.get(digest) {
                Some(_) if request.method == Method::HEAD => Reply::new(StatusCode::OK),
                Some(data) if request.method == Method::GET => Reply::new(StatusCode::OK).body(data.to_vec()),
                _ => Reply::new(StatusCode::NOT_FOUND),
            };
        }

        if let Some((name, reference)) = rest.split_once("/manifests/") {
            let key = format!("{}:{}", name, reference);
            if request.method == Method::GET {
                return match state.manifests.get(&key) {
                    Some((media_type, data)) => Reply::new(StatusCode::OK)
                        .header("content-type", media_type)
                        .body(data.to_vec()),
                    None => Reply::new(StatusCode::NOT_FOUND).body(r#"{"errors":[{"code":"MANIFEST_UNKNOWN"}]}"#),
                };
            }
            if request.method == Method::PUT {
                let media_type = request
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let digest = ContentDigest::of(&body);
                state.manifests.insert(key, (media_type.clone(), body.clone()));
                state
                    .manifests
                    .insert(format!("{}:{}", name, digest), (media_type, body));
                return Reply::new(StatusCode::CREATED)
                    .header("location", &format!("/v2/{}/manifests/{}", name, digest));
            }
        }

        Reply::new(StatusCode::NOT_FOUND)
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.state.lock().unwrap().requests.push(Recorded {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone().unwrap_or_default(),
        });

        for hook in &self.overrides {
            if let Some(reply) = hook(&request) {
                return Ok(reply.into_response());
            }
        }
        Ok(self.handle(&request).into_response())
    }
}
