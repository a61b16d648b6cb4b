//! HTTP backend for the Penpot RPC API.
//!
//! Requests go to `{base}/rpc/command/<name>` (or `rpc/query/<name>`) as
//! JSON with kebab-case keys. `update-file`, login and exports use the
//! Transit dialect. After login every request carries
//! `Authorization: Token <token>` and the `auth-token` cookie.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::penpot::codec::{self, KEYWORD_TAG, UUID_TAG};
use crate::penpot::error::{PenpotError, PenpotResult};
use crate::penpot::model::Id;
use crate::penpot::platform::{with_reauth, Platform};

/// Public Penpot instance.
pub const DEFAULT_API_URL: &str = "https://design.penpot.app/api";

/// Browser-like agent; the public instance challenges unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const TRANSIT_JSON: &str = "application/transit+json";
const ACCEPT_ANY_JSON: &str = "application/json, application/transit+json";
const AUTH_COOKIE: &str = "auth-token";
const AUTH_DATA_COOKIE: &str = "auth-data";

/// Lowercased fragments of a CloudFlare interstitial page.
const CLOUDFLARE_MARKERS: &[&str] = &[
    "cloudflare",
    "cf-ray",
    "attention required",
    "checking your browser",
    "ddos protection",
    "security check",
    "cf-browser-verification",
    "cf-challenge-running",
    "please wait while we are checking your browser",
    "enable cookies and reload the page",
    "this process is automatic",
];

/// Login credentials. `Debug` never shows the password.
#[derive(Clone)]
pub struct Credentials {
    /// Account e-mail.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Default)]
struct AuthState {
    token: Option<String>,
    profile_id: Option<String>,
}

/// Formats accepted by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Raster PNG.
    Png,
    /// Raster JPEG.
    Jpeg,
    /// Vector SVG.
    Svg,
    /// PDF document.
    Pdf,
}

impl ExportFormat {
    /// Keyword used by the exporter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    /// Parses a format name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "svg" => Some(Self::Svg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// MIME type to assume when the exporter does not send one.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }
}

/// A rendered export.
#[derive(Debug, Clone)]
pub struct Export {
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// MIME type reported by the exporter.
    pub content_type: String,
}

/// [`Platform`] backed by a Penpot instance over HTTP.
pub struct HttpPlatform {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    auth: RwLock<AuthState>,
}

impl std::fmt::Debug for HttpPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPlatform")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl HttpPlatform {
    /// Creates a client. Nothing is sent until the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (for example an
    /// invalid user agent).
    pub fn new(
        base_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
        user_agent: &str,
    ) -> PenpotResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_ANY_JSON));
        let http = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            auth: RwLock::new(AuthState::default()),
        })
    }

    /// API root, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logs in with the configured credentials and stores the session token.
    ///
    /// # Errors
    ///
    /// - [`PenpotError::MissingCredentials`] when none are configured
    /// - [`PenpotError::CloudFlare`] when the request was challenged
    /// - [`PenpotError::Format`] when the response carries no token
    pub async fn login(&self) -> PenpotResult<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(PenpotError::MissingCredentials)?;
        let url = format!("{}/rpc/command/login-with-password", self.base_url);
        let body = json!({
            "~:email": credentials.username,
            "~:password": credentials.password,
        });
        let response = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, TRANSIT_JSON)
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;
        let response = check_response(response).await?;

        let mut token = None;
        let mut profile_from_cookie = None;
        for cookie in response.cookies() {
            match cookie.name() {
                AUTH_COOKIE => token = Some(cookie.value().to_string()),
                AUTH_DATA_COOKIE => profile_from_cookie = profile_id_from_auth_data(cookie.value()),
                _ => {}
            }
        }
        let text = response.text().await?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        let token = token
            .or_else(|| {
                codec::strip_transit(&body)
                    .get(AUTH_COOKIE)
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            })
            .ok_or_else(|| PenpotError::format("login", "no auth token in login response"))?;
        let profile_id = profile_id_from_login(&body).or(profile_from_cookie);

        info!(has_profile = profile_id.is_some(), "Logged in to Penpot");
        *self.auth.write().await = AuthState {
            token: Some(token),
            profile_id,
        };
        Ok(())
    }

    /// Logs in if no token is held and credentials are configured.
    async fn ensure_login(&self) -> PenpotResult<()> {
        if self.auth.read().await.token.is_none() && self.credentials.is_some() {
            self.login().await?;
        }
        Ok(())
    }

    /// Runs `op` with a session; retries once after re-login on 401/403.
    async fn authenticated<T, Op, Fut>(&self, retry: bool, mut op: Op) -> PenpotResult<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = PenpotResult<T>>,
    {
        self.ensure_login().await?;
        if !retry || self.credentials.is_none() {
            return op().await;
        }
        with_reauth(op, || self.login()).await
    }

    /// One POST; non-success statuses become errors.
    async fn send(&self, url: &str, body: &Value, transit: bool) -> PenpotResult<Response> {
        let content_type = if transit {
            TRANSIT_JSON
        } else {
            "application/json"
        };
        let mut request = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(serde_json::to_vec(body)?);
        if let Some(token) = self.auth.read().await.token.as_deref() {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        debug!(url, transit, "POST");
        check_response(request.send().await?).await
    }

    async fn post_json(&self, url: &str, body: &Value, transit: bool) -> PenpotResult<Value> {
        let text = self.send(url, body, transit).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Calls an RPC method such as `command/get-teams` with a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn rpc(&self, method: &str, payload: Value) -> PenpotResult<Value> {
        let url = format!("{}/rpc/{method}", self.base_url);
        let retry = method != "command/get-profile";
        self.authenticated(retry, || self.post_json(&url, &payload, false))
            .await
    }

    /// Like [`Self::rpc`], but an empty response becomes `{success, id}`.
    async fn rpc_or_ack(&self, method: &str, payload: Value, id: &str) -> PenpotResult<Value> {
        match self.rpc(method, payload).await? {
            Value::Null => Ok(json!({ "success": true, "id": id })),
            other => Ok(other),
        }
    }

    /// Profile of the logged-in user. Never retried after re-login.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn get_profile(&self) -> PenpotResult<Value> {
        self.rpc("command/get-profile", json!({})).await
    }

    /// Teams the user belongs to.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn list_teams(&self) -> PenpotResult<Value> {
        self.rpc("command/get-teams", json!({})).await
    }

    /// Every project visible to the user.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn list_projects(&self) -> PenpotResult<Value> {
        self.rpc("command/get-all-projects", json!({})).await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn create_project(&self, name: &str, team_id: &str) -> PenpotResult<Value> {
        self.rpc(
            "command/create-project",
            json!({ "name": name, "team-id": team_id }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn rename_project(&self, project_id: &str, name: &str) -> PenpotResult<Value> {
        self.rpc_or_ack(
            "command/rename-project",
            json!({ "id": project_id, "name": name }),
            project_id,
        )
        .await
    }

    /// Deletes a project and every file in it.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn delete_project(&self, project_id: &str) -> PenpotResult<Value> {
        self.rpc_or_ack("command/delete-project", json!({ "id": project_id }), project_id)
            .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn get_project_files(&self, project_id: &str) -> PenpotResult<Value> {
        self.rpc(
            "command/get-project-files",
            json!({ "project-id": project_id }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn create_file(
        &self,
        name: &str,
        project_id: &str,
        is_shared: bool,
    ) -> PenpotResult<Value> {
        self.rpc(
            "command/create-file",
            json!({ "name": name, "project-id": project_id, "is-shared": is_shared }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn rename_file(&self, file_id: &str, name: &str) -> PenpotResult<Value> {
        self.rpc_or_ack(
            "command/rename-file",
            json!({ "id": file_id, "name": name }),
            file_id,
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn delete_file(&self, file_id: &str) -> PenpotResult<Value> {
        self.rpc_or_ack("command/delete-file", json!({ "id": file_id }), file_id)
            .await
    }

    /// Publishes (`true`) or unpublishes a file as a shared library.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn set_file_shared(&self, file_id: &str, is_shared: bool) -> PenpotResult<Value> {
        self.rpc_or_ack(
            "command/set-file-shared",
            json!({ "id": file_id, "is-shared": is_shared }),
            file_id,
        )
        .await
    }

    /// Opens a comment thread at a canvas position.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn create_comment_thread(
        &self,
        file_id: &str,
        page_id: &str,
        position: (f64, f64),
        content: &str,
        frame_id: Option<&str>,
    ) -> PenpotResult<Value> {
        let mut payload = json!({
            "file-id": file_id,
            "page-id": page_id,
            "position": { "x": position.0, "y": position.1 },
            "content": content,
        });
        if let Some(frame_id) = frame_id {
            payload["frame-id"] = json!(frame_id);
        }
        self.rpc("command/create-comment-thread", payload).await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn add_comment(&self, thread_id: &str, content: &str) -> PenpotResult<Value> {
        self.rpc(
            "command/add-comment",
            json!({ "thread-id": thread_id, "content": content }),
        )
        .await
    }

    /// Comment threads of a file, optionally restricted to one page.
    ///
    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn get_comment_threads(
        &self,
        file_id: &str,
        page_id: Option<&str>,
    ) -> PenpotResult<Value> {
        let mut payload = json!({ "file-id": file_id });
        if let Some(page_id) = page_id {
            payload["page-id"] = json!(page_id);
        }
        self.rpc("query/comment-threads", payload).await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn update_comment_thread(
        &self,
        thread_id: &str,
        is_resolved: bool,
    ) -> PenpotResult<Value> {
        self.rpc_or_ack(
            "command/update-comment-thread",
            json!({ "id": thread_id, "is-resolved": is_resolved }),
            thread_id,
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn get_file_libraries(&self, file_id: &str) -> PenpotResult<Value> {
        self.rpc("query/file-libraries", json!({ "file-id": file_id }))
            .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn link_file_to_library(&self, file_id: &str, library_id: &str) -> PenpotResult<Value> {
        self.rpc_or_ack(
            "command/link-file-to-library",
            json!({ "file-id": file_id, "library-id": library_id }),
            file_id,
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn get_library_components(&self, library_id: &str) -> PenpotResult<Value> {
        self.rpc(
            "query/library-components",
            json!({ "library-id": library_id }),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns transport, authentication and API errors.
    pub async fn sync_file_library(&self, file_id: &str, library_id: &str) -> PenpotResult<Value> {
        self.rpc_or_ack(
            "command/sync-file",
            json!({ "file-id": file_id, "library-id": library_id }),
            file_id,
        )
        .await
    }

    /// Renders one object through the exporter and downloads the result.
    ///
    /// # Errors
    ///
    /// - [`PenpotError::MissingCredentials`] when not logged in
    /// - [`PenpotError::Format`] when the exporter returns no resource id
    /// - transport, authentication and API errors
    pub async fn export_object(
        &self,
        file_id: &Id,
        page_id: &Id,
        object_id: &Id,
        format: ExportFormat,
        scale: f64,
    ) -> PenpotResult<Export> {
        self.ensure_login().await?;
        let profile_id = self
            .auth
            .read()
            .await
            .profile_id
            .clone()
            .ok_or(PenpotError::MissingCredentials)?;
        let url = format!("{}/export", self.base_url);
        let create = json!({
            "~:wait": true,
            "~:exports": [{
                "~:type": format!("{KEYWORD_TAG}{}", format.as_str()),
                "~:suffix": "",
                "~:scale": scale,
                "~:page-id": format!("{UUID_TAG}{page_id}"),
                "~:file-id": format!("{UUID_TAG}{file_id}"),
                "~:name": "",
                "~:object-id": format!("{UUID_TAG}{object_id}"),
            }],
            "~:profile-id": format!("{UUID_TAG}{profile_id}"),
            "~:cmd": "~:export-shapes",
        });
        let created = self
            .authenticated(true, || self.post_json(&url, &create, true))
            .await?;
        let resource_id = codec::as_map(&created)
            .and_then(|m| m.get("~:id").or_else(|| m.get("id")).cloned())
            .filter(|v| !v.is_null())
            .ok_or_else(|| PenpotError::format("export.id", "exporter returned no resource id"))?;
        debug!(object_id = %object_id, format = format.as_str(), "Export created");

        let fetch = json!({
            "~:wait": false,
            "~:cmd": "~:get-resource",
            "~:id": resource_id,
        });
        let response = self
            .authenticated(true, || self.send(&url, &fetch, true))
            .await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| format.mime_type().to_string(), ToString::to_string);
        let data = response.bytes().await?.to_vec();
        info!(object_id = %object_id, bytes = data.len(), "Export downloaded");
        Ok(Export { data, content_type })
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn fetch_file(&self, file_id: &Id) -> PenpotResult<Value> {
        self.rpc("command/get-file", json!({ "id": file_id.as_str() }))
            .await
    }

    async fn update_file(&self, request: Value) -> PenpotResult<Value> {
        let url = format!("{}/rpc/command/update-file", self.base_url);
        match self
            .authenticated(true, || self.post_json(&url, &request, true))
            .await
        {
            Err(e) if is_conflict(&e) => {
                let plain = codec::strip_transit(&request);
                Err(PenpotError::revision_conflict(
                    plain["id"].as_str().unwrap_or_default(),
                    plain["revn"].as_u64().unwrap_or_default(),
                ))
            }
            other => other,
        }
    }
}

fn is_conflict(error: &PenpotError) -> bool {
    match error {
        PenpotError::Api { status, body } => {
            *status == StatusCode::CONFLICT.as_u16() || body.contains("revn-conflict")
        }
        _ => false,
    }
}

/// Passes a successful response through; turns anything else into an error.
async fn check_response(response: Response) -> PenpotResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let headers = response.headers();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let cloudflare_edge = headers.contains_key("cf-ray")
        || headers
            .get(header::SERVER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|s| s.to_ascii_lowercase().contains("cloudflare"));
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(
        status.as_u16(),
        &content_type,
        cloudflare_edge,
        &body,
    ))
}

/// Maps a non-success response to an error.
///
/// A CloudFlare challenge is recognised by an HTML body carrying one of the
/// interstitial markers, or by an HTML 403/429/503 served from the
/// CloudFlare edge. JSON bodies are Penpot's own errors. Remaining 401/403
/// responses are authentication failures.
#[must_use]
pub fn classify_failure(
    status: u16,
    content_type: &str,
    cloudflare_edge: bool,
    body: &str,
) -> PenpotError {
    if !content_type.contains("json") {
        let lowered = body.to_lowercase();
        let marked = CLOUDFLARE_MARKERS.iter().any(|m| lowered.contains(m));
        let html = content_type.contains("html");
        let blocking_status = matches!(status, 403 | 429 | 503);
        if marked || (blocking_status && html && cloudflare_edge) {
            return PenpotError::CloudFlare { status };
        }
    }
    match status {
        401 | 403 => PenpotError::Unauthenticated { status },
        _ => PenpotError::api(status, body),
    }
}

/// Profile id from a login response, in either map form.
fn profile_id_from_login(body: &Value) -> Option<String> {
    let map = codec::as_map(body)?;
    let id = map.get("~:id").or_else(|| map.get("id"))?.as_str()?;
    let id = id.strip_prefix(UUID_TAG).unwrap_or(id);
    (!id.is_empty()).then(|| id.to_string())
}

/// Profile id from the `auth-data` cookie (`profile-id=<uuid>`).
fn profile_id_from_auth_data(cookie: &str) -> Option<String> {
    cookie
        .split(['&', ';'])
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == "profile-id")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
