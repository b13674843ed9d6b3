//! Test doubles: a scripted HTTP server plus in-memory API and launcher fakes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::api::AccountApi;
use crate::auth::{AuthError, AuthResult, AuthSession, BrowserLauncher, LaunchMode};
use crate::lifecycle::{LifecycleEvent, LifecycleHub};
use crate::models::{Retailer, StoreLocation};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct ScriptedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedServer {
    /// Serve each `(status, body)` pair to one connection, in order, then stop listening.
    pub async fn spawn(responses: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let address = listener.local_addr().expect("local address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                if let Some(request) = read_request(&mut socket).await {
                    recorded.lock().expect("request log").push(request);
                }
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{address}"),
            requests,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log").clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let body_end = buffer.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buffer[header_end..body_end]).to_string();

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// In-memory [`AccountApi`] recording every call.
#[derive(Default)]
pub struct FakeAccountApi {
    verify_result: Mutex<Option<bool>>,
    fail_remote: Mutex<bool>,
    store_location: Mutex<Option<StoreLocation>>,
    preference_updates: Mutex<Vec<Map<String, Value>>>,
    store_lookups: Mutex<Vec<Option<String>>>,
    disconnects: Mutex<usize>,
}

impl FakeAccountApi {
    /// `None` makes `verify_auth` fail with an API error.
    pub fn set_verify_result(&self, result: Option<bool>) {
        *self.verify_result.lock().expect("fake state") = result;
    }

    pub fn fail_remote(&self, fail: bool) {
        *self.fail_remote.lock().expect("fake state") = fail;
    }

    pub fn set_store_location(&self, location: Option<StoreLocation>) {
        *self.store_location.lock().expect("fake state") = location;
    }

    pub fn preference_updates(&self) -> Vec<Map<String, Value>> {
        self.preference_updates.lock().expect("fake state").clone()
    }

    pub fn store_lookups(&self) -> Vec<Option<String>> {
        self.store_lookups.lock().expect("fake state").clone()
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().expect("fake state")
    }

    fn remote_result(&self) -> AuthResult<()> {
        if *self.fail_remote.lock().expect("fake state") {
            Err(AuthError::Api("backend unavailable (503)".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AccountApi for FakeAccountApi {
    async fn verify_auth(&self, _retailer: Retailer, _session: &AuthSession) -> AuthResult<bool> {
        (*self.verify_result.lock().expect("fake state"))
            .ok_or_else(|| AuthError::Api("verify unavailable (503)".to_string()))
    }

    async fn update_preferences(&self, preferences: &Map<String, Value>) -> AuthResult<()> {
        self.preference_updates
            .lock()
            .expect("fake state")
            .push(preferences.clone());
        self.remote_result()
    }

    async fn find_store_location(
        &self,
        _retailer: Retailer,
        zip_code: Option<&str>,
    ) -> AuthResult<Option<StoreLocation>> {
        self.store_lookups
            .lock()
            .expect("fake state")
            .push(zip_code.map(str::to_string));
        self.remote_result()?;
        Ok(self.store_location.lock().expect("fake state").clone())
    }

    async fn disconnect(&self, _retailer: Retailer) -> AuthResult<()> {
        *self.disconnects.lock().expect("fake state") += 1;
        self.remote_result()
    }
}

/// Records launches; refuses listed modes. With a hub attached, a successful
/// launch immediately publishes a deep link carrying `code` and the request state.
#[derive(Default)]
pub struct FakeLauncher {
    refused: Vec<LaunchMode>,
    launches: Mutex<Vec<(LaunchMode, String)>>,
    deliver: Option<(LifecycleHub, String, String)>,
}

impl FakeLauncher {
    pub fn refusing(refused: Vec<LaunchMode>) -> Self {
        Self {
            refused,
            ..Self::default()
        }
    }

    pub fn delivering(hub: LifecycleHub, redirect_uri: &str, code: &str) -> Self {
        Self {
            deliver: Some((hub, redirect_uri.to_string(), code.to_string())),
            ..Self::default()
        }
    }

    pub fn launches(&self) -> Vec<(LaunchMode, String)> {
        self.launches.lock().expect("fake state").clone()
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self, mode: LaunchMode, url: &str) -> AuthResult<()> {
        self.launches
            .lock()
            .expect("fake state")
            .push((mode, url.to_string()));
        if self.refused.contains(&mode) {
            return Err(AuthError::Launch(format!("{mode} unavailable")));
        }
        if let Some((hub, redirect_uri, code)) = &self.deliver {
            let state = url::Url::parse(url)
                .ok()
                .and_then(|parsed| {
                    parsed
                        .query_pairs()
                        .find(|(key, _)| key == "state")
                        .map(|(_, value)| value.into_owned())
                })
                .unwrap_or_default();
            hub.publish(LifecycleEvent::DeepLink(format!(
                "{redirect_uri}?code={code}&state={state}"
            )));
        }
        Ok(())
    }
}
