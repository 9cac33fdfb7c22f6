//! In-process stub of the Dropbox HTTP API for integration tests.
//!
//! Serves the files RPC endpoints, the content endpoints and the oauth2
//! token endpoint over an in-memory tree. Listings page two entries at a
//! time so continuation-cursor handling is exercised.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use dropbox_connector::config::{AuthConfig, DropboxConnectorConfig};
use dropbox_connector::DropboxConnector;

const PAGE_SIZE: usize = 2;
const STUB_TIMESTAMP: &str = "2024-01-15T09:30:00Z";

#[derive(Clone)]
enum Node {
    File(Vec<u8>),
    Folder,
}

struct NodeEntry {
    display: String,
    node: Node,
}

#[derive(Default)]
struct State {
    /// path_lower -> entry; BTreeMap keeps listing order deterministic
    nodes: BTreeMap<String, NodeEntry>,
    /// continuation cursor -> remaining path_lower keys
    cursors: HashMap<String, Vec<String>>,
    next_cursor: u64,
    token_requests: u64,
}

/// Handle to a running stub server.
pub struct StubDropbox {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl StubDropbox {
    pub async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state: Arc<Mutex<State>> = Arc::new(Mutex::new(State::default()));

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service =
                        service_fn(move |req| handle_request(req, conn_state.clone()));
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Connector wired to this stub with a static access token.
    pub fn connector(&self) -> DropboxConnector {
        DropboxConnector::new(self.config(AuthConfig::AccessToken {
            access_token: "sl.stub-static".to_string(),
        }))
        .unwrap()
    }

    /// Connector wired to this stub using the refresh-token flow.
    pub fn refresh_connector(&self) -> DropboxConnector {
        DropboxConnector::new(self.config(AuthConfig::RefreshToken {
            refresh_token: "rt.stub".to_string(),
            app_key: "stub-key".to_string(),
            app_secret: "stub-secret".to_string(),
        }))
        .unwrap()
    }

    fn config(&self, auth: AuthConfig) -> DropboxConnectorConfig {
        DropboxConnectorConfig {
            auth,
            api_endpoint: Some(self.base_url()),
            content_endpoint: Some(self.base_url()),
            token_endpoint: Some(format!("{}/oauth2/token", self.base_url())),
        }
    }

    pub fn token_requests(&self) -> u64 {
        self.state.lock().token_requests
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.state.lock().nodes.contains_key(&path.to_lowercase())
    }

    /// Seed a file directly into the tree, creating parent folders.
    pub fn seed_file(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        insert_parents(&mut state, path);
        state.nodes.insert(
            path.to_lowercase(),
            NodeEntry {
                display: path.to_string(),
                node: Node::File(content.to_vec()),
            },
        );
    }

    pub fn seed_folder(&self, path: &str) {
        let mut state = self.state.lock();
        insert_parents(&mut state, path);
        state.nodes.insert(
            path.to_lowercase(),
            NodeEntry {
                display: path.to_string(),
                node: Node::Folder,
            },
        );
    }
}

fn insert_parents(state: &mut State, path: &str) {
    let mut current = String::new();
    let components: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    for component in &components[..components.len().saturating_sub(1)] {
        current.push('/');
        current.push_str(component);
        let lower = current.to_lowercase();
        state.nodes.entry(lower).or_insert_with(|| NodeEntry {
            display: current.clone(),
            node: Node::Folder,
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<Mutex<State>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let api_arg: Option<Value> = req
        .headers()
        .get("Dropbox-API-Arg")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| serde_json::from_str(s).ok());

    let body = req.into_body().collect().await.unwrap().to_bytes();
    let json_body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let mut state = state.lock();
    let response = match path.as_str() {
        "/oauth2/token" => {
            state.token_requests += 1;
            ok_json(json!({
                "access_token": "sl.stub-refreshed",
                "token_type": "bearer",
                "expires_in": 14400
            }))
        }
        "/2/files/get_metadata" => get_metadata(&state, &json_body),
        "/2/files/list_folder" => list_folder(&mut state, &json_body),
        "/2/files/list_folder/continue" => list_folder_continue(&mut state, &json_body),
        "/2/files/move_v2" => move_entry(&mut state, &json_body),
        "/2/files/delete_v2" => delete_entry(&mut state, &json_body),
        "/2/files/create_folder_v2" => create_folder(&mut state, &json_body),
        "/2/files/download" => download(&state, api_arg.as_ref()),
        "/2/files/upload" => upload(&mut state, api_arg.as_ref(), &body),
        _ => error_json(StatusCode::BAD_REQUEST, "unknown_endpoint/.."),
    };

    Ok(response)
}

fn arg_str<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("")
}

fn get_metadata(state: &State, body: &Value) -> Response<Full<Bytes>> {
    let path = arg_str(body, "path").to_lowercase();
    match state.nodes.get(&path) {
        Some(entry) => ok_json(metadata_value(&path, entry)),
        None => error_json(StatusCode::CONFLICT, "path/not_found/.."),
    }
}

fn list_folder(state: &mut State, body: &Value) -> Response<Full<Bytes>> {
    let base = arg_str(body, "path").to_lowercase();
    let recursive = body
        .get("recursive")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if !base.is_empty() && !state.nodes.contains_key(&base) {
        return error_json(StatusCode::CONFLICT, "path/not_found/..");
    }

    let mut keys: Vec<String> = Vec::new();
    // Recursive listings echo the requested folder itself, as the live
    // provider does
    if recursive && !base.is_empty() {
        keys.push(base.clone());
    }

    for key in state.nodes.keys() {
        if key == &base {
            continue;
        }
        let under = if base.is_empty() {
            true
        } else {
            key.starts_with(&format!("{}/", base))
        };
        if !under {
            continue;
        }
        if !recursive {
            let rel = if base.is_empty() {
                &key[1..]
            } else {
                &key[base.len() + 1..]
            };
            if rel.contains('/') {
                continue;
            }
        }
        keys.push(key.clone());
    }

    page_response(state, keys)
}

fn list_folder_continue(state: &mut State, body: &Value) -> Response<Full<Bytes>> {
    let cursor = arg_str(body, "cursor").to_string();
    match state.cursors.remove(&cursor) {
        Some(remaining) => page_response(state, remaining),
        None => error_json(StatusCode::CONFLICT, "reset/.."),
    }
}

fn page_response(state: &mut State, keys: Vec<String>) -> Response<Full<Bytes>> {
    let (page, rest) = if keys.len() > PAGE_SIZE {
        let rest = keys[PAGE_SIZE..].to_vec();
        (keys[..PAGE_SIZE].to_vec(), rest)
    } else {
        (keys, Vec::new())
    };

    let entries: Vec<Value> = page
        .iter()
        .filter_map(|key| state.nodes.get(key).map(|entry| metadata_value(key, entry)))
        .collect();

    let has_more = !rest.is_empty();
    let cursor = format!("cursor-{}", state.next_cursor);
    state.next_cursor += 1;
    if has_more {
        state.cursors.insert(cursor.clone(), rest);
    }

    ok_json(json!({
        "entries": entries,
        "cursor": cursor,
        "has_more": has_more
    }))
}

fn move_entry(state: &mut State, body: &Value) -> Response<Full<Bytes>> {
    let from = arg_str(body, "from_path").to_lowercase();
    let to_display = arg_str(body, "to_path").to_string();
    let to = to_display.to_lowercase();

    if !state.nodes.contains_key(&from) {
        return error_json(StatusCode::CONFLICT, "from_lookup/not_found/..");
    }
    if state.nodes.contains_key(&to) {
        return error_json(StatusCode::CONFLICT, "to/conflict/file/..");
    }

    let moved: Vec<(String, NodeEntry)> = {
        let prefix = format!("{}/", from);
        let keys: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| *k == &from || k.starts_with(&prefix))
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|k| state.nodes.remove_entry(&k))
            .collect()
    };

    for (key, entry) in moved {
        let new_key = format!("{}{}", to, &key[from.len()..]);
        let new_display = format!("{}{}", to_display, &entry.display[from.len()..]);
        state.nodes.insert(
            new_key,
            NodeEntry {
                display: new_display,
                node: entry.node,
            },
        );
    }

    let entry = state.nodes.get(&to).unwrap();
    ok_json(json!({ "metadata": metadata_value(&to, entry) }))
}

fn delete_entry(state: &mut State, body: &Value) -> Response<Full<Bytes>> {
    let path = arg_str(body, "path").to_lowercase();
    if path.is_empty() || !state.nodes.contains_key(&path) {
        return error_json(StatusCode::CONFLICT, "path_lookup/not_found/..");
    }

    let entry = state.nodes.get(&path).unwrap();
    let metadata = metadata_value(&path, entry);

    let prefix = format!("{}/", path);
    let to_remove: Vec<String> = state
        .nodes
        .keys()
        .filter(|k| *k == &path || k.starts_with(&prefix))
        .cloned()
        .collect();
    for key in to_remove {
        state.nodes.remove(&key);
    }

    ok_json(json!({ "metadata": metadata }))
}

fn create_folder(state: &mut State, body: &Value) -> Response<Full<Bytes>> {
    let display = arg_str(body, "path").to_string();
    let path = display.to_lowercase();

    if state.nodes.contains_key(&path) {
        return error_json(StatusCode::CONFLICT, "path/conflict/folder/..");
    }

    insert_parents(state, &display);
    state.nodes.insert(
        path.clone(),
        NodeEntry {
            display,
            node: Node::Folder,
        },
    );

    let entry = state.nodes.get(&path).unwrap();
    ok_json(json!({ "metadata": metadata_value(&path, entry) }))
}

fn download(state: &State, arg: Option<&Value>) -> Response<Full<Bytes>> {
    let Some(arg) = arg else {
        return error_json(StatusCode::BAD_REQUEST, "missing_arg/..");
    };
    let path = arg_str(arg, "path").to_lowercase();

    match state.nodes.get(&path) {
        Some(entry) => match &entry.node {
            Node::File(content) => {
                let metadata = metadata_value(&path, entry).to_string();
                Response::builder()
                    .status(StatusCode::OK)
                    .header("Dropbox-API-Result", metadata)
                    .header("Content-Type", "application/octet-stream")
                    .body(Full::new(Bytes::from(content.clone())))
                    .unwrap()
            }
            Node::Folder => error_json(StatusCode::CONFLICT, "path/not_file/.."),
        },
        None => error_json(StatusCode::CONFLICT, "path/not_found/.."),
    }
}

fn upload(state: &mut State, arg: Option<&Value>, body: &[u8]) -> Response<Full<Bytes>> {
    let Some(arg) = arg else {
        return error_json(StatusCode::BAD_REQUEST, "missing_arg/..");
    };
    let display = arg_str(arg, "path").to_string();
    let path = display.to_lowercase();
    let mode = arg_str(arg, "mode");

    if mode != "overwrite" && state.nodes.contains_key(&path) {
        return error_json(StatusCode::CONFLICT, "path/conflict/file/..");
    }
    if matches!(state.nodes.get(&path), Some(NodeEntry { node: Node::Folder, .. })) {
        return error_json(StatusCode::CONFLICT, "path/conflict/folder/..");
    }

    insert_parents(state, &display);
    state.nodes.insert(
        path.clone(),
        NodeEntry {
            display,
            node: Node::File(body.to_vec()),
        },
    );

    let entry = state.nodes.get(&path).unwrap();
    ok_json(metadata_value(&path, entry))
}

fn metadata_value(path_lower: &str, entry: &NodeEntry) -> Value {
    let name = entry
        .display
        .rsplit('/')
        .next()
        .unwrap_or(&entry.display)
        .to_string();

    match &entry.node {
        Node::File(content) => json!({
            ".tag": "file",
            "name": name,
            "id": format!("id:stub-{}", stub_hash_short(path_lower.as_bytes())),
            "path_lower": path_lower,
            "path_display": entry.display,
            "client_modified": STUB_TIMESTAMP,
            "server_modified": STUB_TIMESTAMP,
            "rev": "0123456789abcdef",
            "size": content.len(),
            "content_hash": stub_content_hash(content)
        }),
        Node::Folder => json!({
            ".tag": "folder",
            "name": name,
            "id": format!("id:stub-{}", stub_hash_short(path_lower.as_bytes())),
            "path_lower": path_lower,
            "path_display": entry.display
        }),
    }
}

fn stub_hash_short(data: &[u8]) -> String {
    format!("{:016x}", fnv1a(data))
}

/// Deterministic 64-hex stand-in for the provider content hash.
pub fn stub_content_hash(data: &[u8]) -> String {
    let h = fnv1a(data);
    format!("{:016x}", h).repeat(4)
}

fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn ok_json(value: Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

fn error_json(status: StatusCode, summary: &str) -> Response<Full<Bytes>> {
    let body = json!({
        "error_summary": summary,
        "error": { ".tag": summary.split('/').next().unwrap_or("unknown") }
    });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
