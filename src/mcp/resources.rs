//! Read-only MCP resources: server status and the file cache.

use serde_json::{json, Value};

use crate::mcp::protocol::SERVER_NAME;
use crate::mcp::tools::Backend;
use crate::penpot::codec;

/// Server status and the Penpot instance it talks to.
pub const SERVER_INFO_URI: &str = "server://info";
/// Files currently held in the read cache.
pub const CACHED_FILES_URI: &str = "penpot://cached-files";

const JSON_MIME: &str = "application/json";

/// Resource catalogue for `resources/list`.
#[must_use]
pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "uri": SERVER_INFO_URI,
            "name": "Server info",
            "description": "Server status, version and the Penpot API it is connected to",
            "mimeType": JSON_MIME,
        }),
        json!({
            "uri": CACHED_FILES_URI,
            "name": "Cached files",
            "description": "Penpot files currently held in the read cache, with their revisions",
            "mimeType": JSON_MIME,
        }),
    ]
}

/// Reads a resource as a `resources/read` result. `None` for an unknown URI.
#[must_use]
pub fn read(backend: &Backend, uri: &str) -> Option<Value> {
    let body = match uri {
        SERVER_INFO_URI => server_info(backend),
        CACHED_FILES_URI => cached_files(backend),
        _ => return None,
    };
    Some(json!({
        "contents": [{ "uri": uri, "mimeType": JSON_MIME, "text": body.to_string() }],
    }))
}

fn server_info(backend: &Backend) -> Value {
    json!({
        "status": "online",
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "api_url": backend.api_url(),
        "connected": backend.api_url().is_some(),
    })
}

fn cached_files(backend: &Backend) -> Value {
    let files: Vec<Value> = backend
        .cache()
        .entries()
        .iter()
        .map(|(id, document)| match codec::decode_file(document) {
            Ok(file) => json!({
                "id": id.as_str(),
                "name": file.name,
                "revn": file.revision,
                "pages": file.pages.len(),
            }),
            // Still listed so the entry can be refreshed with get_file.
            Err(_) => json!({ "id": id.as_str() }),
        })
        .collect();
    json!({ "count": files.len(), "files": files })
}
