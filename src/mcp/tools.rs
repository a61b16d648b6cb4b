//! Tool catalogue and handlers.
//!
//! Every handler is a thin wrapper: workspace tools call the HTTP API
//! directly, design tools turn their arguments into intents and go through
//! [`Editor::apply`]. Results are JSON text with `"status": "success"`;
//! failures are error results carrying an `error_type`.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use regex::RegexBuilder;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::mcp::protocol::{ToolCallResult, ToolDefinition};
use crate::penpot::cache::FileCache;
use crate::penpot::changes::{self, Intent, Payload};
use crate::penpot::client::{ExportFormat, HttpPlatform};
use crate::penpot::codec::{self, Dialect};
use crate::penpot::editor::{ApplyOutcome, Editor};
use crate::penpot::error::{PenpotError, PenpotResult};
use crate::penpot::model::{Attribute, File, Id, Page};
use crate::penpot::platform::Platform;

/// Fields returned by `get_object_tree` when none are requested.
const DEFAULT_TREE_FIELDS: [&str; 7] = ["id", "name", "type", "x", "y", "width", "height"];

/// What the tools talk to.
#[derive(Clone)]
pub struct Backend {
    platform: Arc<dyn Platform>,
    api: Option<Arc<HttpPlatform>>,
    cache: FileCache,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("api", &self.api)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// A backend over a Penpot instance.
    #[must_use]
    pub fn http(api: Arc<HttpPlatform>, cache: FileCache) -> Self {
        Self {
            platform: api.clone(),
            api: Some(api),
            cache,
        }
    }

    /// A backend with design tools only, over any platform.
    #[must_use]
    pub fn offline(platform: Arc<dyn Platform>, cache: FileCache) -> Self {
        Self {
            platform,
            api: None,
            cache,
        }
    }

    /// API root of the connected Penpot instance, if any.
    #[must_use]
    pub fn api_url(&self) -> Option<&str> {
        self.api.as_deref().map(HttpPlatform::base_url)
    }

    /// The shared read cache.
    #[must_use]
    pub const fn cache(&self) -> &FileCache {
        &self.cache
    }

    fn api(&self) -> PenpotResult<&HttpPlatform> {
        self.api.as_deref().ok_or_else(|| {
            PenpotError::validation("backend", "this tool needs a connection to a Penpot instance")
        })
    }

    fn editor(&self) -> Editor<'_> {
        Editor::new(self.platform.as_ref()).with_cache(Some(&self.cache))
    }

    /// The raw file document, from the cache unless `refresh` is set.
    async fn raw_file(&self, file_id: &Id, refresh: bool) -> PenpotResult<Arc<Value>> {
        if !refresh {
            if let Some(cached) = self.cache.get(file_id) {
                debug!(file_id = %file_id, "File served from cache");
                return Ok(cached);
            }
        }
        let raw = self.platform.fetch_file(file_id).await?;
        Ok(self.cache.insert(file_id, raw))
    }

    async fn file(&self, file_id: &Id) -> PenpotResult<File> {
        codec::decode_file(&*self.raw_file(file_id, false).await?)
    }

    async fn apply(&self, file_id: &Id, intents: Vec<Intent>) -> PenpotResult<ApplyOutcome> {
        self.editor().apply(file_id, &intents).await
    }
}

/// Typed access to tool arguments.
#[derive(Clone, Copy)]
struct Args<'a>(&'a Map<String, Value>);

impl<'a> Args<'a> {
    fn opt_str(self, key: &str) -> PenpotResult<Option<&'a str>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(PenpotError::validation(key, format!("'{key}' must be a string"))),
        }
    }

    fn str(self, key: &str) -> PenpotResult<&'a str> {
        self.opt_str(key)?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PenpotError::missing_field(key))
    }

    fn id(self, key: &str) -> PenpotResult<Id> {
        self.str(key).map(Id::from)
    }

    fn opt_id(self, key: &str) -> PenpotResult<Option<Id>> {
        Ok(self.opt_str(key)?.filter(|s| !s.is_empty()).map(Id::from))
    }

    fn opt_f64(self, key: &str) -> PenpotResult<Option<f64>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| PenpotError::validation(key, format!("'{key}' must be a number"))),
        }
    }

    fn f64(self, key: &str) -> PenpotResult<f64> {
        self.opt_f64(key)?
            .ok_or_else(|| PenpotError::missing_field(key))
    }

    fn opt_bool(self, key: &str) -> PenpotResult<Option<bool>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(PenpotError::validation(key, format!("'{key}' must be a boolean"))),
        }
    }

    fn list(self, key: &str) -> PenpotResult<&'a Vec<Value>> {
        self.0
            .get(key)
            .ok_or_else(|| PenpotError::missing_field(key))?
            .as_array()
            .ok_or_else(|| PenpotError::validation(key, format!("'{key}' must be a list")))
    }

    /// Everything except `skip`, as an intent payload.
    fn payload(self, skip: &[&str]) -> Payload {
        self.0
            .iter()
            .filter(|(k, _)| !skip.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Wraps a success payload.
fn success(fields: Value) -> ToolCallResult {
    let mut body = Map::new();
    body.insert("status".to_string(), json!("success"));
    if let Value::Object(fields) = fields {
        body.extend(fields);
    }
    ToolCallResult::json(&Value::Object(body))
}

/// Success payload of an edit, plus `extra` fields.
fn edited(outcome: &ApplyOutcome, extra: Map<String, Value>) -> ToolCallResult {
    let mut fields = extra;
    fields.insert("revn".to_string(), json!(outcome.revision));
    fields.insert("changes_applied".to_string(), json!(outcome.changes_applied));
    fields.insert("warning".to_string(), json!(outcome.warning.to_string()));
    success(Value::Object(fields))
}

fn one(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Error result naming the offending field or identifier.
#[must_use]
pub fn error_result(error: &PenpotError) -> ToolCallResult {
    let mut body = json!({
        "status": "error",
        "error_type": error.error_type(),
        "error": error.to_string(),
    });
    match error {
        PenpotError::Validation { field, .. } => body["field"] = json!(field),
        PenpotError::Format { path, .. } => body["path"] = json!(path),
        PenpotError::ObjectNotFound { object_id } => body["object_id"] = json!(object_id),
        PenpotError::RevisionConflict { file_id, revision } => {
            body["file_id"] = json!(file_id);
            body["revision"] = json!(revision);
            body["hint"] = json!("the file changed since it was read; read it again and retry");
        }
        _ => {}
    }
    if let Some(status) = error.status() {
        body["status_code"] = json!(status);
    }
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| error.to_string());
    ToolCallResult::error(text)
}

/// Runs a tool by name.
pub async fn call(backend: &Backend, name: &str, arguments: &Value) -> ToolCallResult {
    let empty = Map::new();
    let args = match arguments {
        Value::Object(map) => Args(map),
        Value::Null => Args(&empty),
        _ => return ToolCallResult::error("Tool arguments must be an object"),
    };
    debug!(tool = name, "Tool call");

    let result = match name {
        // Teams and projects
        "list_teams" => list_teams(backend).await,
        "list_projects" => list_projects(backend).await,
        "create_project" => create_project(backend, args).await,
        "rename_project" => rename_project(backend, args).await,
        "delete_project" => delete_project(backend, args).await,
        "get_project_files" => get_project_files(backend, args).await,
        // Files
        "get_file" => get_file(backend, args).await,
        "create_file" => create_file(backend, args).await,
        "rename_file" => rename_file(backend, args).await,
        "delete_file" => delete_file(backend, args).await,
        "search_object" => search_object(backend, args).await,
        "get_object_tree" => get_object_tree(backend, args).await,
        "analyze_file_structure" => analyze_file_structure(backend, args).await,
        "export_object" => export_object(backend, args).await,
        // Shapes
        "add_rectangle" => add_shape(backend, args, "rect", "objectId").await,
        "add_circle" => add_shape(backend, args, "circle", "objectId").await,
        "add_text" => add_shape(backend, args, "text", "objectId").await,
        "add_frame" => add_shape(backend, args, "frame", "frameId").await,
        "create_path" => add_shape(backend, args, "path", "objectId").await,
        "create_group" => add_shape(backend, args, "group", "groupId").await,
        "create_boolean_shape" => add_shape(backend, args, "bool", "objectId").await,
        "add_object_to_group" => add_object_to_group(backend, args).await,
        // Edits
        "move_object" => move_object(backend, args).await,
        "resize_object" => resize_object(backend, args).await,
        "rotate_object" => rotate_object(backend, args).await,
        "change_object_color" => change_object_color(backend, args).await,
        "apply_gradient" => apply_gradient(backend, args).await,
        "add_stroke" => add_stroke(backend, args).await,
        "add_shadow" => add_shadow(backend, args).await,
        "apply_blur" => apply_blur(backend, args).await,
        "delete_object" => delete_object(backend, args).await,
        "apply_design_changes" => apply_design_changes(backend, args).await,
        // Comments
        "add_design_comment" => add_design_comment(backend, args).await,
        "reply_to_comment" => reply_to_comment(backend, args).await,
        "get_file_comments" => get_file_comments(backend, args).await,
        "resolve_comment_thread" => resolve_comment_thread(backend, args).await,
        // Libraries
        "get_file_libraries" => get_file_libraries(backend, args).await,
        "link_library" => link_library(backend, args).await,
        "list_library_components" => list_library_components(backend, args).await,
        "sync_library" => sync_library(backend, args).await,
        "publish_as_library" => set_library_shared(backend, args, true).await,
        "unpublish_library" => set_library_shared(backend, args, false).await,
        _ => return ToolCallResult::error(format!("Unknown tool: {name}")),
    };

    result.unwrap_or_else(|e| {
        warn!(tool = name, error = %e, "Tool call failed");
        error_result(&e)
    })
}

// ==================== Teams and projects ====================

async fn list_teams(backend: &Backend) -> PenpotResult<ToolCallResult> {
    let teams = backend.api()?.list_teams().await?;
    Ok(success(json!({ "teams": teams })))
}

async fn list_projects(backend: &Backend) -> PenpotResult<ToolCallResult> {
    let projects = backend.api()?.list_projects().await?;
    Ok(success(json!({ "projects": projects })))
}

async fn create_project(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let (name, team_id) = (args.str("name")?, args.str("team_id")?);
    let project = backend.api()?.create_project(name, team_id).await?;
    Ok(success(json!({ "project": project })))
}

async fn rename_project(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let (project_id, name) = (args.str("project_id")?, args.str("name")?);
    let project = backend.api()?.rename_project(project_id, name).await?;
    Ok(success(json!({ "project": project })))
}

async fn delete_project(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let project_id = args.str("project_id")?;
    let result = backend.api()?.delete_project(project_id).await?;
    Ok(success(json!({ "result": result })))
}

async fn get_project_files(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let project_id = args.str("project_id")?;
    let files = backend.api()?.get_project_files(project_id).await?;
    Ok(success(json!({ "files": files })))
}

// ==================== Files ====================

async fn get_file(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let refresh = args.opt_bool("refresh")?.unwrap_or(false);
    let file = backend.raw_file(&file_id, refresh).await?;
    Ok(success(json!({ "file": *file })))
}

async fn create_file(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let (project_id, name) = (args.str("project_id")?, args.str("name")?);
    let is_shared = args.opt_bool("is_shared")?.unwrap_or(false);
    let file = backend.api()?.create_file(name, project_id, is_shared).await?;
    Ok(success(json!({ "file": file })))
}

async fn rename_file(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let (file_id, name) = (args.id("file_id")?, args.str("name")?);
    let file = backend.api()?.rename_file(file_id.as_str(), name).await?;
    backend.cache.invalidate(&file_id);
    Ok(success(json!({ "file": file })))
}

async fn delete_file(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let result = backend.api()?.delete_file(file_id.as_str()).await?;
    backend.cache.invalidate(&file_id);
    Ok(success(json!({ "result": result })))
}

async fn search_object(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let query = args.str("query")?;
    let pattern = RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .map_err(|e| PenpotError::validation("query", format!("invalid pattern: {e}")))?;

    let file = backend.file(&file_id).await?;
    let objects: Vec<Value> = file
        .pages
        .values()
        .flat_map(|page| page.objects.values().map(move |object| (page, object)))
        .filter(|(_, object)| object.name.as_deref().is_some_and(|n| pattern.is_match(n)))
        .map(|(page, object)| {
            json!({
                "id": object.id,
                "name": object.name,
                "page_id": page.id,
                "page_name": page.name,
                "object_type": object.kind.wire_name(),
            })
        })
        .collect();
    Ok(success(json!({ "count": objects.len(), "objects": objects })))
}

async fn get_object_tree(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let object_id = args.id("object_id")?;
    let fields: Vec<String> = match args.0.get("fields") {
        None | Some(Value::Null) => DEFAULT_TREE_FIELDS.iter().map(ToString::to_string).collect(),
        Some(_) => args
            .list("fields")?
            .iter()
            .map(|f| {
                f.as_str()
                    .map(codec::canonical_name)
                    .ok_or_else(|| PenpotError::validation("fields", "'fields' must be a list of names"))
            })
            .collect::<PenpotResult<_>>()?,
    };
    let depth = match args.opt_f64("depth")? {
        #[allow(clippy::cast_possible_truncation)]
        Some(d) => d as i64,
        None => -1,
    };

    let file = backend.file(&file_id).await?;
    let (page, _) = file
        .find_object(&object_id)
        .ok_or_else(|| PenpotError::object_not_found(object_id.as_str()))?;
    let tree = object_tree(page, &object_id, &fields, depth);
    Ok(success(json!({
        "page_id": page.id,
        "page_name": page.name,
        "tree": tree,
    })))
}

/// An object with the requested fields and, down to `depth` (negative for
/// unlimited), its children.
fn object_tree(page: &Page, id: &Id, fields: &[String], depth: i64) -> Value {
    let Some(object) = page.objects.get(id) else {
        return Value::Null;
    };
    let mut node = Map::new();
    if let Value::Object(encoded) = codec::encode_object(object, Dialect::Json) {
        for (key, value) in encoded {
            let name = codec::canonical_name(&key);
            if fields.contains(&name) {
                node.insert(name, value);
            }
        }
    }

    if depth != 0 {
        let children: Vec<Id> = match &object.shapes {
            Some(shapes) => shapes.clone(),
            None => page
                .objects
                .values()
                .filter(|o| o.id != *id && o.parent_id.as_ref() == Some(id))
                .map(|o| o.id.clone())
                .collect(),
        };
        let children: Vec<Value> = children
            .iter()
            .filter(|child| *child != id)
            .map(|child| object_tree(page, child, fields, depth - 1))
            .filter(|v| !v.is_null())
            .collect();
        if !children.is_empty() {
            node.insert("children".to_string(), Value::Array(children));
        }
    }
    Value::Object(node)
}

async fn analyze_file_structure(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let file = backend.file(&file_id).await?;

    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    let pages: Vec<Value> = file
        .pages
        .values()
        .map(|page| {
            let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
            for object in page.objects.values().filter(|o| !o.id.is_root_frame()) {
                *kinds.entry(object.kind.wire_name().to_string()).or_default() += 1;
                *totals.entry(object.kind.wire_name().to_string()).or_default() += 1;
            }
            json!({
                "id": page.id,
                "name": page.name,
                "object_count": kinds.values().sum::<usize>(),
                "object_types": kinds,
            })
        })
        .collect();

    Ok(success(json!({
        "file_id": file.id,
        "name": file.name,
        "revn": file.revision,
        "page_count": pages.len(),
        "object_count": totals.values().sum::<usize>(),
        "object_types": totals,
        "pages": pages,
    })))
}

async fn export_object(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let page_id = args.id("page_id")?;
    let object_id = args.id("object_id")?;
    let format_name = args.opt_str("export_type")?.unwrap_or("png");
    let format = ExportFormat::parse(format_name).ok_or_else(|| {
        PenpotError::validation(
            "export_type",
            format!("unsupported export type '{format_name}'; must be one of png, jpeg, svg, pdf"),
        )
    })?;
    let scale = args.opt_f64("scale")?.unwrap_or(1.0);
    if scale <= 0.0 {
        return Err(PenpotError::validation("scale", "'scale' must be positive"));
    }

    let export = backend
        .api()?
        .export_object(&file_id, &page_id, &object_id, format, scale)
        .await?;
    Ok(ToolCallResult::image(
        BASE64_STANDARD.encode(&export.data),
        export.content_type,
    ))
}

// ==================== Shapes ====================

/// Adds one object of `kind`; the remaining arguments are its fields.
async fn add_shape(
    backend: &Backend,
    args: Args<'_>,
    kind: &str,
    id_key: &str,
) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let page_id = args.id("page_id")?;
    let parent_id = match args.opt_id("parent_id")? {
        Some(parent) => Some(parent),
        None => args.opt_id("frame_id")?,
    };
    let mut payload = args.payload(&["file_id", "page_id", "parent_id", "frame_id", "kind", "type"]);
    payload.insert("kind".to_string(), json!(kind));

    let outcome = backend
        .apply(
            &file_id,
            vec![Intent::Add {
                page_id,
                parent_id,
                payload,
            }],
        )
        .await?;
    let created = outcome.created_ids.first().map_or(Value::Null, |id| json!(id));
    Ok(edited(&outcome, one(id_key, created)))
}

async fn restyle(
    backend: &Backend,
    args: Args<'_>,
    attributes: Vec<Attribute>,
) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let object_id = args.id("object_id")?;
    let outcome = backend
        .apply(
            &file_id,
            vec![Intent::Restyle {
                object_id: object_id.clone(),
                attributes,
            }],
        )
        .await?;
    Ok(edited(&outcome, one("objectId", json!(object_id))))
}

async fn add_object_to_group(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let group_id = args.id("group_id")?;
    restyle(backend, args, vec![Attribute::ParentId(group_id)]).await
}

// ==================== Edits ====================

async fn move_object(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let (x, y) = (args.f64("x")?, args.f64("y")?);
    restyle(backend, args, vec![Attribute::X(x), Attribute::Y(y)]).await
}

async fn resize_object(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let (width, height) = (args.f64("width")?, args.f64("height")?);
    if width <= 0.0 {
        return Err(PenpotError::validation("width", "'width' must be positive"));
    }
    if height <= 0.0 {
        return Err(PenpotError::validation("height", "'height' must be positive"));
    }
    restyle(
        backend,
        args,
        vec![Attribute::Width(width), Attribute::Height(height)],
    )
    .await
}

async fn rotate_object(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let rotation = args.f64("rotation")?;
    restyle(backend, args, vec![Attribute::Rotation(rotation.rem_euclid(360.0))]).await
}

async fn change_object_color(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let color = args.str("color")?;
    let opacity = args.opt_f64("opacity")?.unwrap_or(1.0);
    let fill = changes::solid_fill(color, opacity)?;
    restyle(backend, args, vec![Attribute::Fills(vec![fill])]).await
}

async fn apply_gradient(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let fill = changes::gradient_fill(
        args.str("gradient_type")?,
        args.str("start_color")?,
        args.str("end_color")?,
        args.opt_f64("angle")?.unwrap_or(0.0),
    )?;
    restyle(backend, args, vec![Attribute::Fills(vec![fill])]).await
}

async fn add_stroke(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let stroke = changes::stroke(
        args.str("color")?,
        args.opt_f64("width")?.unwrap_or(1.0),
        args.opt_str("style")?.unwrap_or("solid"),
        args.opt_str("alignment")?.unwrap_or("center"),
    )?;
    restyle(backend, args, vec![Attribute::Strokes(vec![stroke])]).await
}

async fn add_shadow(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let shadow = changes::drop_shadow(
        args.str("color")?,
        args.f64("offset_x")?,
        args.f64("offset_y")?,
        args.f64("blur")?,
        args.opt_f64("spread")?.unwrap_or(0.0),
    )?;
    restyle(backend, args, vec![Attribute::Shadows(vec![shadow])]).await
}

async fn apply_blur(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let blur = changes::blur(
        args.opt_str("blur_type")?.unwrap_or("layer-blur"),
        args.f64("blur_amount")?,
    )?;
    restyle(backend, args, vec![Attribute::Blur(Some(blur))]).await
}

async fn delete_object(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let object_id = args.id("object_id")?;
    let page_id = args.opt_id("page_id")?;
    let outcome = backend
        .apply(
            &file_id,
            vec![Intent::Delete {
                object_id: object_id.clone(),
                page_id,
            }],
        )
        .await?;
    Ok(edited(&outcome, one("objectId", json!(object_id))))
}

async fn apply_design_changes(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let intents = args
        .list("changes")?
        .iter()
        .enumerate()
        .map(|(i, item)| parse_intent(item, i))
        .collect::<PenpotResult<Vec<_>>>()?;
    let outcome = backend.apply(&file_id, intents).await?;
    Ok(edited(&outcome, one("created_ids", json!(outcome.created_ids))))
}

/// An intent (`action`: add, modify, delete) or a raw change (`type`: add-obj, ...).
fn parse_intent(item: &Value, index: usize) -> PenpotResult<Intent> {
    let field = format!("changes[{index}]");
    let map = item
        .as_object()
        .ok_or_else(|| PenpotError::validation(&field, "each change must be an object"))?;
    if map.contains_key("action") {
        return serde_json::from_value(item.clone())
            .map_err(|e| PenpotError::validation(&field, e.to_string()));
    }
    codec::decode_change(item)
        .map(Intent::Raw)
        .map_err(|e| match e {
            PenpotError::Format { message, .. } => PenpotError::validation(&field, message),
            other => other,
        })
}

// ==================== Comments ====================

async fn add_design_comment(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let thread = backend
        .api()?
        .create_comment_thread(
            args.str("file_id")?,
            args.str("page_id")?,
            (args.f64("x")?, args.f64("y")?),
            args.str("content")?,
            args.opt_str("frame_id")?,
        )
        .await?;
    Ok(success(json!({ "thread": thread })))
}

async fn reply_to_comment(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let comment = backend
        .api()?
        .add_comment(args.str("thread_id")?, args.str("content")?)
        .await?;
    Ok(success(json!({ "comment": comment })))
}

async fn get_file_comments(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let threads = backend
        .api()?
        .get_comment_threads(args.str("file_id")?, args.opt_str("page_id")?)
        .await?;
    Ok(success(json!({ "threads": threads })))
}

async fn resolve_comment_thread(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let resolved = args.opt_bool("resolved")?.unwrap_or(true);
    let thread = backend
        .api()?
        .update_comment_thread(args.str("thread_id")?, resolved)
        .await?;
    Ok(success(json!({ "thread": thread, "resolved": resolved })))
}

// ==================== Libraries ====================

async fn get_file_libraries(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let libraries = backend.api()?.get_file_libraries(args.str("file_id")?).await?;
    Ok(success(json!({ "libraries": libraries })))
}

async fn link_library(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let result = backend
        .api()?
        .link_file_to_library(args.str("file_id")?, args.str("library_id")?)
        .await?;
    Ok(success(json!({ "result": result })))
}

async fn list_library_components(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let components = backend
        .api()?
        .get_library_components(args.str("library_id")?)
        .await?;
    Ok(success(json!({ "components": components })))
}

async fn sync_library(backend: &Backend, args: Args<'_>) -> PenpotResult<ToolCallResult> {
    let file_id = args.id("file_id")?;
    let result = backend
        .api()?
        .sync_file_library(file_id.as_str(), args.str("library_id")?)
        .await?;
    backend.cache.invalidate(&file_id);
    Ok(success(json!({ "result": result })))
}

async fn set_library_shared(
    backend: &Backend,
    args: Args<'_>,
    shared: bool,
) -> PenpotResult<ToolCallResult> {
    let result = backend
        .api()?
        .set_file_shared(args.str("file_id")?, shared)
        .await?;
    Ok(success(json!({ "result": result, "is_shared": shared })))
}

// ==================== Catalogue ====================

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn number(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

fn boolean(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

/// Properties shared by the shape tools.
fn shape_properties(extra: Value) -> Value {
    let mut properties = json!({
        "file_id": string("ID of the Penpot file"),
        "page_id": string("ID of the page to add the object to"),
        "parent_id": string("Optional frame or group to place the object in"),
        "name": string("Optional layer name"),
        "opacity": number("Optional opacity, 0 to 1"),
        "rotation": number("Optional rotation in degrees"),
    });
    if let (Some(properties), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        properties.extend(extra);
    }
    properties
}

fn object_properties(extra: Value) -> Value {
    let mut properties = json!({
        "file_id": string("ID of the Penpot file"),
        "object_id": string("ID of the object to change"),
    });
    if let (Some(properties), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        properties.extend(extra);
    }
    properties
}

/// Returns every tool this server offers.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        // === Teams and projects ===
        tool("list_teams", "List the teams the logged-in user belongs to.", json!({}), &[]),
        tool("list_projects", "List every project visible to the logged-in user.", json!({}), &[]),
        tool(
            "create_project",
            "Create a project in a team.",
            json!({ "name": string("Project name"), "team_id": string("ID of the owning team") }),
            &["name", "team_id"],
        ),
        tool(
            "rename_project",
            "Rename a project.",
            json!({ "project_id": string("ID of the project"), "name": string("New name") }),
            &["project_id", "name"],
        ),
        tool(
            "delete_project",
            "Delete a project and every file in it. This cannot be undone.",
            json!({ "project_id": string("ID of the project") }),
            &["project_id"],
        ),
        tool(
            "get_project_files",
            "List the files of a project.",
            json!({ "project_id": string("ID of the project") }),
            &["project_id"],
        ),
        // === Files ===
        tool(
            "get_file",
            "Read a file. Served from a short-lived cache unless refresh is true.",
            json!({
                "file_id": string("ID of the file"),
                "refresh": boolean("Bypass the cache"),
            }),
            &["file_id"],
        ),
        tool(
            "create_file",
            "Create a design file in a project.",
            json!({
                "project_id": string("ID of the project"),
                "name": string("File name"),
                "is_shared": boolean("Publish as a shared library (default false)"),
            }),
            &["project_id", "name"],
        ),
        tool(
            "rename_file",
            "Rename a design file.",
            json!({ "file_id": string("ID of the file"), "name": string("New name") }),
            &["file_id", "name"],
        ),
        tool(
            "delete_file",
            "Delete a design file. This cannot be undone.",
            json!({ "file_id": string("ID of the file") }),
            &["file_id"],
        ),
        tool(
            "search_object",
            "Find objects whose name matches a case-insensitive regular expression.",
            json!({
                "file_id": string("ID of the file"),
                "query": string("Regular expression matched against object names"),
            }),
            &["file_id", "query"],
        ),
        tool(
            "get_object_tree",
            "Return an object and its descendants with selected fields.",
            json!({
                "file_id": string("ID of the file"),
                "object_id": string("ID of the root object"),
                "fields": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Fields to include (default id, name, type, x, y, width, height)",
                },
                "depth": number("Levels of children to include; -1 for all (default)"),
            }),
            &["file_id", "object_id"],
        ),
        tool(
            "analyze_file_structure",
            "Summarise a file: pages and object counts per type.",
            json!({ "file_id": string("ID of the file") }),
            &["file_id"],
        ),
        tool(
            "export_object",
            "Render an object and return it as an image.",
            json!({
                "file_id": string("ID of the file"),
                "page_id": string("ID of the page holding the object"),
                "object_id": string("ID of the object"),
                "export_type": { "type": "string", "enum": ["png", "jpeg", "svg", "pdf"] },
                "scale": number("Scale factor (default 1)"),
            }),
            &["file_id", "page_id", "object_id"],
        ),
        // === Shapes ===
        tool(
            "add_rectangle",
            "Add a rectangle. Coordinates are in canvas pixels.",
            shape_properties(json!({
                "x": number("Left edge"),
                "y": number("Top edge"),
                "width": number("Width"),
                "height": number("Height"),
                "fill_color": string("Hex colour (default #000000)"),
                "fill_opacity": number("Fill opacity, 0 to 1"),
                "stroke_color": string("Optional stroke colour"),
                "stroke_width": number("Stroke width"),
                "radius": number("Corner radius"),
            })),
            &["file_id", "page_id", "x", "y", "width", "height"],
        ),
        tool(
            "add_circle",
            "Add a circle centred on (cx, cy).",
            shape_properties(json!({
                "cx": number("Centre x"),
                "cy": number("Centre y"),
                "radius": number("Radius"),
                "fill_color": string("Hex colour (default #000000)"),
                "fill_opacity": number("Fill opacity, 0 to 1"),
                "stroke_color": string("Optional stroke colour"),
                "stroke_width": number("Stroke width"),
            })),
            &["file_id", "page_id", "cx", "cy", "radius"],
        ),
        tool(
            "add_text",
            "Add a text box.",
            shape_properties(json!({
                "x": number("Left edge"),
                "y": number("Top edge"),
                "text": string("Text to show"),
                "font_size": number("Font size (default 16)"),
                "font_family": string("Font family (default Work Sans)"),
                "font_weight": string("Font weight (default normal)"),
                "fill_color": string("Text colour (default #000000)"),
                "width": number("Optional box width"),
                "height": number("Optional box height"),
            })),
            &["file_id", "page_id", "x", "y", "text"],
        ),
        tool(
            "add_frame",
            "Add a frame (board) that can hold other objects.",
            shape_properties(json!({
                "x": number("Left edge"),
                "y": number("Top edge"),
                "width": number("Width"),
                "height": number("Height"),
                "background_color": string("Optional background colour"),
            })),
            &["file_id", "page_id", "x", "y", "width", "height"],
        ),
        tool(
            "create_path",
            "Add a vector path through a list of points.",
            shape_properties(json!({
                "points": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "x": { "type": "number" }, "y": { "type": "number" } },
                        "required": ["x", "y"],
                    },
                    "description": "At least two points",
                },
                "closed": boolean("Close the path (default true)"),
                "fill_color": string("Optional fill colour"),
                "stroke_color": string("Optional stroke colour"),
                "stroke_width": number("Stroke width"),
            })),
            &["file_id", "page_id", "points"],
        ),
        tool(
            "create_group",
            "Create an empty group. Use add_object_to_group to fill it.",
            shape_properties(json!({})),
            &["file_id", "page_id"],
        ),
        tool(
            "create_boolean_shape",
            "Combine shapes with a boolean operation.",
            shape_properties(json!({
                "bool_type": {
                    "type": "string",
                    "enum": ["union", "difference", "intersection", "exclusion"],
                },
                "shapes": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "IDs of at least two shapes",
                },
            })),
            &["file_id", "page_id", "bool_type", "shapes"],
        ),
        tool(
            "add_object_to_group",
            "Move an object into a group or frame.",
            object_properties(json!({ "group_id": string("ID of the group or frame") })),
            &["file_id", "object_id", "group_id"],
        ),
        // === Edits ===
        tool(
            "move_object",
            "Move an object to an absolute position.",
            object_properties(json!({ "x": number("New left edge"), "y": number("New top edge") })),
            &["file_id", "object_id", "x", "y"],
        ),
        tool(
            "resize_object",
            "Resize an object.",
            object_properties(json!({ "width": number("New width"), "height": number("New height") })),
            &["file_id", "object_id", "width", "height"],
        ),
        tool(
            "rotate_object",
            "Set an object's rotation.",
            object_properties(json!({ "rotation": number("Rotation in degrees") })),
            &["file_id", "object_id", "rotation"],
        ),
        tool(
            "change_object_color",
            "Replace an object's fill with a solid colour. Text keeps the colour on every run.",
            object_properties(json!({
                "color": string("Hex colour such as #FF0000"),
                "opacity": number("Fill opacity, 0 to 1"),
            })),
            &["file_id", "object_id", "color"],
        ),
        tool(
            "apply_gradient",
            "Replace an object's fill with a two-stop gradient.",
            object_properties(json!({
                "gradient_type": { "type": "string", "enum": ["linear", "radial"] },
                "start_color": string("Hex colour at the start"),
                "end_color": string("Hex colour at the end"),
                "angle": number("Direction in degrees; 0 runs left to right"),
            })),
            &["file_id", "object_id", "gradient_type", "start_color", "end_color"],
        ),
        tool(
            "add_stroke",
            "Set an object's stroke (border).",
            object_properties(json!({
                "color": string("Hex colour"),
                "width": number("Width (default 1)"),
                "style": { "type": "string", "enum": ["solid", "dashed", "dotted", "mixed"] },
                "alignment": { "type": "string", "enum": ["center", "inner", "outer"] },
            })),
            &["file_id", "object_id", "color"],
        ),
        tool(
            "add_shadow",
            "Set a drop shadow on an object.",
            object_properties(json!({
                "color": string("Hex colour, optionally with alpha (#RRGGBBAA)"),
                "offset_x": number("Horizontal offset"),
                "offset_y": number("Vertical offset"),
                "blur": number("Blur radius"),
                "spread": number("Spread (default 0)"),
            })),
            &["file_id", "object_id", "color", "offset_x", "offset_y", "blur"],
        ),
        tool(
            "apply_blur",
            "Blur an object or what lies behind it.",
            object_properties(json!({
                "blur_amount": number("Blur value"),
                "blur_type": { "type": "string", "enum": ["layer-blur", "background-blur"] },
            })),
            &["file_id", "object_id", "blur_amount"],
        ),
        tool(
            "delete_object",
            "Delete an object and everything inside it.",
            object_properties(json!({ "page_id": string("Optional page ID; looked up when absent") })),
            &["file_id", "object_id"],
        ),
        tool(
            "apply_design_changes",
            "Apply several edits in one update. Each item is either an intent \
             ({\"action\": \"add\" | \"modify\" | \"delete\", ...}) or a raw change \
             ({\"type\": \"add-obj\" | \"mod-obj\" | \"del-obj\", ...}). \
             Nothing is written if any item is invalid.",
            json!({
                "file_id": string("ID of the file"),
                "changes": { "type": "array", "items": { "type": "object" } },
            }),
            &["file_id", "changes"],
        ),
        // === Comments ===
        tool(
            "add_design_comment",
            "Start a comment thread at a canvas position.",
            json!({
                "file_id": string("ID of the file"),
                "page_id": string("ID of the page"),
                "x": number("Marker x"),
                "y": number("Marker y"),
                "content": string("Comment text"),
                "frame_id": string("Optional frame the comment belongs to"),
            }),
            &["file_id", "page_id", "x", "y", "content"],
        ),
        tool(
            "reply_to_comment",
            "Reply to a comment thread.",
            json!({ "thread_id": string("ID of the thread"), "content": string("Reply text") }),
            &["thread_id", "content"],
        ),
        tool(
            "get_file_comments",
            "List the comment threads of a file, optionally for one page.",
            json!({ "file_id": string("ID of the file"), "page_id": string("Optional page ID") }),
            &["file_id"],
        ),
        tool(
            "resolve_comment_thread",
            "Mark a comment thread resolved (or reopen it).",
            json!({
                "thread_id": string("ID of the thread"),
                "resolved": boolean("Resolved state (default true)"),
            }),
            &["thread_id"],
        ),
        // === Libraries ===
        tool(
            "get_file_libraries",
            "List the shared libraries linked to a file.",
            json!({ "file_id": string("ID of the file") }),
            &["file_id"],
        ),
        tool(
            "link_library",
            "Link a shared library to a file.",
            json!({ "file_id": string("ID of the file"), "library_id": string("ID of the library file") }),
            &["file_id", "library_id"],
        ),
        tool(
            "list_library_components",
            "List the components of a shared library.",
            json!({ "library_id": string("ID of the library file") }),
            &["library_id"],
        ),
        tool(
            "sync_library",
            "Pull the latest library changes into a file.",
            json!({ "file_id": string("ID of the file"), "library_id": string("ID of the library file") }),
            &["file_id", "library_id"],
        ),
        tool(
            "publish_as_library",
            "Publish a file as a shared library.",
            json!({ "file_id": string("ID of the file") }),
            &["file_id"],
        ),
        tool(
            "unpublish_library",
            "Stop sharing a file as a library.",
            json!({ "file_id": string("ID of the file") }),
            &["file_id"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::ToolContent;
    use crate::penpot::memory::InMemoryPlatform;
    use std::time::Duration;

    fn text_of(result: &ToolCallResult) -> Value {
        match &result.content[0] {
            ToolContent::Text { text } => serde_json::from_str(text).unwrap(),
            ToolContent::Image { .. } => panic!("expected text content"),
        }
    }

    async fn offline() -> (Arc<InMemoryPlatform>, Backend, Id, Id) {
        let platform = Arc::new(InMemoryPlatform::new());
        let (file_id, page_id) = platform.create_file("Tools").await;
        let backend = Backend::offline(
            platform.clone(),
            FileCache::new(Duration::from_secs(60), 8),
        );
        (platform, backend, file_id, page_id)
    }

    #[test]
    fn definitions_are_well_formed_and_unique() {
        let tools = definitions();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
        for tool in &tools {
            assert!(tool.input_schema["properties"].is_object(), "{}", tool.name);
            for required in tool.input_schema["required"].as_array().unwrap() {
                let key = required.as_str().unwrap();
                assert!(
                    tool.input_schema["properties"].get(key).is_some(),
                    "{} requires undeclared {key}",
                    tool.name
                );
            }
        }
    }

    #[tokio::test]
    async fn every_listed_tool_is_dispatched() {
        let (_, backend, _, _) = offline().await;
        for tool in definitions() {
            let result = call(&backend, &tool.name, &json!({})).await;
            let text = match &result.content[0] {
                ToolContent::Text { text } => text.clone(),
                ToolContent::Image { .. } => String::new(),
            };
            assert!(!text.starts_with("Unknown tool"), "{} is not dispatched", tool.name);
        }
    }

    #[tokio::test]
    async fn add_rectangle_then_recolour() {
        let (platform, backend, file_id, page_id) = offline().await;
        let added = call(
            &backend,
            "add_rectangle",
            &json!({
                "file_id": file_id, "page_id": page_id,
                "x": 10, "y": 10, "width": 100, "height": 50, "name": "Card",
            }),
        )
        .await;
        assert!(!added.is_error);
        let body = text_of(&added);
        assert_eq!(body["status"], "success");
        assert_eq!(body["revn"], 1);
        let object_id = body["objectId"].as_str().unwrap().to_string();

        let recoloured = call(
            &backend,
            "change_object_color",
            &json!({ "file_id": file_id, "object_id": object_id, "color": "#FF0000" }),
        )
        .await;
        assert!(!recoloured.is_error, "{recoloured:?}");
        assert_eq!(text_of(&recoloured)["revn"], 2);

        let file = platform.file(&file_id).await.unwrap();
        let (_, rect) = file.find_object(&Id::from(object_id)).unwrap();
        let fills = rect.fills.as_ref().unwrap();
        assert_eq!(fills[0].color.as_deref(), Some("#FF0000"));
    }

    #[tokio::test]
    async fn missing_argument_names_the_field() {
        let (platform, backend, file_id, page_id) = offline().await;
        let result = call(
            &backend,
            "add_rectangle",
            &json!({ "file_id": file_id, "page_id": page_id, "x": 0, "y": 0, "height": 10 }),
        )
        .await;
        assert!(result.is_error);
        let body = text_of(&result);
        assert_eq!(body["error_type"], "validation_error");
        assert_eq!(body["field"], "width");
        assert_eq!(platform.update_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_object_is_reported() {
        let (_, backend, file_id, _) = offline().await;
        let result = call(
            &backend,
            "move_object",
            &json!({ "file_id": file_id, "object_id": "nope", "x": 1, "y": 2 }),
        )
        .await;
        let body = text_of(&result);
        assert_eq!(body["error_type"], "object_not_found");
        assert_eq!(body["object_id"], "nope");
    }

    #[tokio::test]
    async fn search_and_tree_and_analysis() {
        let (_, backend, file_id, page_id) = offline().await;
        let frame = text_of(
            &call(
                &backend,
                "add_frame",
                &json!({
                    "file_id": file_id, "page_id": page_id, "name": "Hero Section",
                    "x": 0, "y": 0, "width": 400, "height": 300,
                }),
            )
            .await,
        );
        let frame_id = frame["frameId"].as_str().unwrap().to_string();
        let circle = call(
            &backend,
            "add_circle",
            &json!({
                "file_id": file_id, "page_id": page_id, "parent_id": frame_id,
                "name": "Hero Badge", "cx": 50, "cy": 50, "radius": 20,
            }),
        )
        .await;
        assert!(!circle.is_error, "{circle:?}");

        let found = text_of(
            &call(&backend, "search_object", &json!({ "file_id": file_id, "query": "^hero" })).await,
        );
        assert_eq!(found["count"], 2);
        assert_eq!(found["objects"][0]["page_id"], json!(page_id));

        let tree = text_of(
            &call(
                &backend,
                "get_object_tree",
                &json!({ "file_id": file_id, "object_id": frame_id, "fields": ["name", "type"] }),
            )
            .await,
        );
        assert_eq!(tree["tree"]["name"], "Hero Section");
        assert_eq!(tree["tree"]["children"][0]["name"], "Hero Badge");
        assert!(tree["tree"].get("x").is_none());

        let shallow = text_of(
            &call(
                &backend,
                "get_object_tree",
                &json!({ "file_id": file_id, "object_id": frame_id, "depth": 0 }),
            )
            .await,
        );
        assert!(shallow["tree"].get("children").is_none());

        let analysis = text_of(
            &call(&backend, "analyze_file_structure", &json!({ "file_id": file_id })).await,
        );
        assert_eq!(analysis["page_count"], 1);
        assert_eq!(analysis["object_count"], 2);
        assert_eq!(analysis["object_types"]["circle"], 1);
    }

    #[tokio::test]
    async fn batch_accepts_intents_and_raw_changes() {
        let (platform, backend, file_id, page_id) = offline().await;
        let result = call(
            &backend,
            "apply_design_changes",
            &json!({
                "file_id": file_id,
                "changes": [
                    { "action": "add", "page_id": page_id,
                      "payload": { "kind": "rect", "id": "r-1", "x": 0, "y": 0, "width": 5, "height": 5 } },
                    { "action": "modify", "object_id": "r-1", "attributes": { "fill_color": "#00FF00" } },
                    { "type": "del-obj", "id": "r-1", "page-id": page_id },
                ],
            }),
        )
        .await;
        assert!(!result.is_error, "{result:?}");
        let body = text_of(&result);
        assert_eq!(body["changes_applied"], 3);
        assert_eq!(body["created_ids"], json!(["r-1"]));
        assert_eq!(platform.file(&file_id).await.unwrap().object_count(), 1);
    }

    #[tokio::test]
    async fn workspace_tools_need_a_connection() {
        let (_, backend, _, _) = offline().await;
        let body = text_of(&call(&backend, "list_teams", &Value::Null).await);
        assert_eq!(body["field"], "backend");
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments() {
        let (_, backend, _, _) = offline().await;
        assert!(call(&backend, "nope", &json!({})).await.is_error);
        assert!(call(&backend, "get_file", &json!([1, 2])).await.is_error);
    }

    #[tokio::test]
    async fn get_file_is_cached_until_an_edit() {
        let (platform, backend, file_id, page_id) = offline().await;
        call(&backend, "get_file", &json!({ "file_id": file_id })).await;
        assert!(backend.cache.get(&file_id).is_some());

        platform.bump_revision(&file_id).await;
        let cached = text_of(&call(&backend, "get_file", &json!({ "file_id": file_id })).await);
        assert_eq!(cached["file"]["revn"], 0);

        let fresh = text_of(
            &call(&backend, "get_file", &json!({ "file_id": file_id, "refresh": true })).await,
        );
        assert_eq!(fresh["file"]["revn"], 1);

        call(
            &backend,
            "add_text",
            &json!({ "file_id": file_id, "page_id": page_id, "x": 0, "y": 0, "text": "Hi" }),
        )
        .await;
        assert!(backend.cache.get(&file_id).is_none());
    }
}
