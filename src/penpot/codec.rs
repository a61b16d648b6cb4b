//! Transit wire format codec.
//!
//! Penpot's write path speaks Transit+JSON: map keys are keywords written as
//! `~:kebab-case`, identifiers are strings prefixed with `~u` and enumerated
//! values are keywords prefixed with `~:`. Its JSON read path returns plain
//! camelCase keys with untagged values. Text content trees are different again:
//! their keys are plain camelCase even inside a Transit payload, and their
//! structural `type` values stay untagged.
//!
//! All of these casing and tagging decisions live in one rule table,
//! [`CasingRules`], keyed by `(scope, object kind, field)`. Encoding applies
//! the table; decoding accepts every casing variant of every field so that
//! both dialects, and the platform's occasional mixtures, read back to the
//! same canonical value. Fields the model does not know are preserved in the
//! owning struct's `extra` map and written back verbatim.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::penpot::error::{PenpotError, PenpotResult};
use crate::penpot::model::{
    AttrOperation, Attribute, Blur, BoolOperation, Change, Content, DesignObject, Extra, File,
    Fill, Gradient, GradientKind, Id, Matrix, ObjectKind, Page, Paragraph, ParagraphSet,
    PathCommand, Point, Selrect, Shadow, Stroke, TextContent, TextRun, UpdateRequest,
};

/// Prefix of a Transit keyword.
pub const KEYWORD_TAG: &str = "~:";

/// Prefix of a Transit UUID.
pub const UUID_TAG: &str = "~u";

/// Marker opening a Transit map written in array form.
pub const MAP_AS_ARRAY: &str = "^ ";

/// Text content `type` values that stay plain strings on the wire.
pub const UNTAGGED_CONTENT_TYPES: [&str; 4] = ["root", "paragraph-set", "paragraph", "text"];

/// Wire dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Transit+JSON, as accepted by `update-file`.
    Transit,
    /// Plain JSON with camelCase keys, as returned by `get-file`.
    Json,
}

/// Where a field lives; rules may differ per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top level of an update request.
    Envelope,
    /// A change operation.
    Change,
    /// An attribute operation inside a modify change.
    Operation,
    /// A design object.
    Shape,
    /// Selection rectangle, points and transforms.
    Geometry,
    /// Fills and strokes.
    Paint,
    /// Shadows and blur.
    Effect,
    /// A node of a text content tree.
    TextNode,
    /// A path command.
    PathCommand,
    /// File and page documents.
    Document,
}

/// How a field name is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casing {
    /// `fill-color`.
    Kebab,
    /// `fillColor`.
    Camel,
}

/// How a field value is tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// Written as is.
    Plain,
    /// UUID string (or list of them), tagged `~u`.
    Identifier,
    /// Enumerated value, tagged `~:`.
    Keyword,
    /// Number where whole values must be written as integers.
    WholeNumber,
}

/// The resolved encoding of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Key spelling.
    pub casing: Casing,
    /// Whether the key carries the `~:` keyword tag.
    pub tagged_key: bool,
    /// Wire name when it differs from the canonical one.
    pub rename: Option<&'static str>,
    /// Value tagging.
    pub value: ValueRule,
}

/// Which object kinds an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindMatch {
    Any,
    Only(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Override {
    scope: Option<Scope>,
    kind: KindMatch,
    field: &'static str,
    rename: Option<&'static str>,
    value: ValueRule,
}

const fn any(field: &'static str, value: ValueRule) -> Override {
    Override {
        scope: None,
        kind: KindMatch::Any,
        field,
        rename: None,
        value,
    }
}

const fn within(scope: Scope, field: &'static str, value: ValueRule) -> Override {
    Override {
        scope: Some(scope),
        kind: KindMatch::Any,
        field,
        rename: None,
        value,
    }
}

const fn for_kind(kind: &'static str, field: &'static str, value: ValueRule) -> Override {
    Override {
        scope: Some(Scope::Shape),
        kind: KindMatch::Only(kind),
        field,
        rename: None,
        value,
    }
}

/// Casing and tagging rules.
///
/// Default: kebab-case keys tagged `~:` with plain values in the Transit
/// dialect, camelCase untagged keys in the JSON dialect, and camelCase
/// untagged keys inside text content in both dialects. The overrides below
/// are the complete list of fields whose value is tagged, normalised or
/// renamed.
pub struct CasingRules;

impl CasingRules {
    const OVERRIDES: &'static [Override] = &[
        any("id", ValueRule::Identifier),
        any("page_id", ValueRule::Identifier),
        any("frame_id", ValueRule::Identifier),
        any("parent_id", ValueRule::Identifier),
        any("session_id", ValueRule::Identifier),
        any("file_id", ValueRule::Identifier),
        any("project_id", ValueRule::Identifier),
        any("type", ValueRule::Keyword),
        any("opacity", ValueRule::WholeNumber),
        within(Scope::Shape, "shapes", ValueRule::Identifier),
        within(Scope::Document, "pages", ValueRule::Identifier),
        within(Scope::Operation, "attr", ValueRule::Keyword),
        Override {
            scope: Some(Scope::Shape),
            kind: KindMatch::Any,
            field: "shadows",
            rename: Some("shadow"),
            value: ValueRule::Plain,
        },
        within(Scope::Paint, "fill_opacity", ValueRule::WholeNumber),
        within(Scope::Paint, "stroke_opacity", ValueRule::WholeNumber),
        within(Scope::Paint, "stroke_style", ValueRule::Keyword),
        within(Scope::Paint, "stroke_alignment", ValueRule::Keyword),
        within(Scope::Effect, "style", ValueRule::Keyword),
        within(Scope::PathCommand, "command", ValueRule::Plain),
        for_kind("bool", "bool_type", ValueRule::Keyword),
        for_kind("text", "grow_type", ValueRule::Keyword),
    ];

    /// Resolves the rule for a field.
    #[must_use]
    pub fn lookup(
        dialect: Dialect,
        in_text: bool,
        scope: Scope,
        kind: Option<&ObjectKind>,
        field: &str,
    ) -> FieldRule {
        let (casing, tagged_key) = match (dialect, in_text || scope == Scope::TextNode) {
            (Dialect::Transit, false) => (Casing::Kebab, true),
            _ => (Casing::Camel, false),
        };
        let found = Self::OVERRIDES.iter().find(|o| {
            o.field == field
                && o.scope.map_or(true, |s| s == scope)
                && match o.kind {
                    KindMatch::Any => true,
                    KindMatch::Only(name) => kind.is_some_and(|k| k.wire_name() == name),
                }
        });
        FieldRule {
            casing,
            tagged_key,
            rename: found.and_then(|o| o.rename),
            value: found.map_or(ValueRule::Plain, |o| o.value),
        }
    }
}

/// Converts a whole-number value to its integer form; other values pass through.
///
/// Idempotent: integers are returned unchanged.
#[must_use]
pub fn normalize_numeric(value: &Number) -> Number {
    if value.is_i64() || value.is_u64() {
        return value.clone();
    }
    match value.as_f64() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Number::from(f as i64),
        _ => value.clone(),
    }
}

/// `fill_color` -> `fill-color`.
fn kebab(name: &str) -> String {
    name.replace('_', "-")
}

/// `fill_color` -> `fillColor`.
fn camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' || c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Any wire key (`~:fill-color`, `fillColor`, `fill-color`) -> `fill_color`.
#[must_use]
pub fn canonical_name(key: &str) -> String {
    let key = key.strip_prefix(KEYWORD_TAG).unwrap_or(key);
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c == '-' {
            out.push('_');
        } else if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Strips a Transit tag from a string, if present.
fn untag<'a>(value: &'a str, tag: &str) -> &'a str {
    value.strip_prefix(tag).unwrap_or(value)
}

/// Returns the map behind a value, accepting Transit's array form.
#[must_use]
pub fn as_map(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Array(items) if items.first().and_then(Value::as_str) == Some(MAP_AS_ARRAY) => {
            let mut map = Map::new();
            for pair in items[1..].chunks(2) {
                if let [key, value] = pair {
                    let key = key
                        .as_str()
                        .map_or_else(|| key.to_string(), ToString::to_string);
                    map.insert(key, value.clone());
                }
            }
            Some(map)
        }
        _ => None,
    }
}

/// Recursively strips Transit tags from keys and values.
///
/// Used for RPC responses that are returned to tool callers rather than
/// decoded into the model.
#[must_use]
pub fn strip_transit(value: &Value) -> Value {
    if let Some(map) = as_map(value) {
        return Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let key = untag(untag(&k, KEYWORD_TAG), UUID_TAG).to_string();
                    (key, strip_transit(&v))
                })
                .collect(),
        );
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(strip_transit).collect()),
        Value::String(s) => Value::String(untag(untag(s, UUID_TAG), KEYWORD_TAG).to_string()),
        other => other.clone(),
    }
}

fn is_array_map(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_str)
        == Some(MAP_AS_ARRAY)
}

// ==================== Encoding ====================

/// Encoding context: dialect plus whether we are inside a text content tree.
#[derive(Debug, Clone, Copy)]
struct Encoder {
    dialect: Dialect,
    in_text: bool,
}

impl Encoder {
    const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            in_text: false,
        }
    }

    const fn text(self) -> Self {
        Self {
            in_text: true,
            ..self
        }
    }

    fn writer<'k>(self, scope: Scope, kind: Option<&'k ObjectKind>) -> MapWriter<'k> {
        MapWriter {
            enc: self,
            scope,
            kind,
            map: Map::new(),
        }
    }

    fn tag_value(self, rule: &FieldRule, scope: Scope, value: Value) -> Value {
        match (rule.value, value) {
            (ValueRule::WholeNumber, Value::Number(n)) => Value::Number(normalize_numeric(&n)),
            (_, value) if self.dialect == Dialect::Json => value,
            (ValueRule::Identifier, Value::String(s)) => Value::String(format!("{UUID_TAG}{s}")),
            (ValueRule::Identifier, Value::Array(items)) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.tag_value(rule, scope, item))
                    .collect(),
            ),
            (ValueRule::Keyword, Value::String(s)) => {
                let text_scope = self.in_text || scope == Scope::TextNode;
                if text_scope && UNTAGGED_CONTENT_TYPES.contains(&s.as_str()) {
                    Value::String(s)
                } else {
                    Value::String(format!("{KEYWORD_TAG}{s}"))
                }
            }
            (_, value) => value,
        }
    }
}

/// Builds one wire map, applying the rule table to every field.
struct MapWriter<'k> {
    enc: Encoder,
    scope: Scope,
    kind: Option<&'k ObjectKind>,
    map: Map<String, Value>,
}

impl MapWriter<'_> {
    fn put(&mut self, field: &str, value: impl Into<Value>) {
        let rule = CasingRules::lookup(self.enc.dialect, self.enc.in_text, self.scope, self.kind, field);
        let name = rule.rename.unwrap_or(field);
        let mut key = match rule.casing {
            Casing::Kebab => kebab(name),
            Casing::Camel => camel(name),
        };
        if rule.tagged_key {
            key.insert_str(0, KEYWORD_TAG);
        }
        let value = self.enc.tag_value(&rule, self.scope, value.into());
        self.map.insert(key, value);
    }

    fn opt(&mut self, field: &str, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.put(field, value);
        }
    }

    fn extra(&mut self, extra: &Extra) {
        for (key, value) in extra {
            self.map.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    fn finish(self) -> Value {
        Value::Object(self.map)
    }
}

fn encode_point(enc: Encoder, point: &Point) -> Value {
    let mut w = enc.writer(Scope::Geometry, None);
    w.put("x", point.x);
    w.put("y", point.y);
    w.finish()
}

fn encode_selrect(enc: Encoder, r: &Selrect) -> Value {
    let mut w = enc.writer(Scope::Geometry, None);
    for (field, value) in [
        ("x", r.x),
        ("y", r.y),
        ("width", r.width),
        ("height", r.height),
        ("x1", r.x1),
        ("y1", r.y1),
        ("x2", r.x2),
        ("y2", r.y2),
    ] {
        w.put(field, value);
    }
    w.finish()
}

fn encode_matrix(enc: Encoder, m: &Matrix) -> Value {
    let mut w = enc.writer(Scope::Geometry, None);
    for (field, value) in [("a", m.a), ("b", m.b), ("c", m.c), ("d", m.d), ("e", m.e), ("f", m.f)] {
        w.put(field, value);
    }
    w.finish()
}

fn encode_fill(enc: Encoder, fill: &Fill) -> Value {
    let mut w = enc.writer(Scope::Paint, None);
    w.opt("fill_color", fill.color.clone());
    w.opt("fill_opacity", fill.opacity);
    if let Some(g) = &fill.gradient {
        w.put("type", g.kind.wire_name());
        w.put("start_color", g.start_color.clone());
        w.put("end_color", g.end_color.clone());
        w.put("start_x", g.start_x);
        w.put("start_y", g.start_y);
        w.put("end_x", g.end_x);
        w.put("end_y", g.end_y);
    }
    w.extra(&fill.extra);
    w.finish()
}

fn encode_fills(enc: Encoder, fills: &[Fill]) -> Value {
    Value::Array(fills.iter().map(|f| encode_fill(enc, f)).collect())
}

fn encode_stroke(enc: Encoder, stroke: &Stroke) -> Value {
    let mut w = enc.writer(Scope::Paint, None);
    w.opt("stroke_color", stroke.color.clone());
    w.opt("stroke_opacity", stroke.opacity);
    w.opt("stroke_width", stroke.width);
    w.opt("stroke_style", stroke.style.clone());
    w.opt("stroke_alignment", stroke.alignment.clone());
    w.extra(&stroke.extra);
    w.finish()
}

fn encode_shadow(enc: Encoder, shadow: &Shadow) -> Value {
    let mut w = enc.writer(Scope::Effect, None);
    w.opt("style", shadow.style.clone());
    w.opt("color", shadow.color.clone());
    w.opt("offset_x", shadow.offset_x);
    w.opt("offset_y", shadow.offset_y);
    w.opt("blur", shadow.blur);
    w.opt("spread", shadow.spread);
    w.opt("hidden", shadow.hidden);
    w.extra(&shadow.extra);
    w.finish()
}

fn encode_blur(enc: Encoder, blur: &Blur) -> Value {
    let mut w = enc.writer(Scope::Effect, None);
    w.opt("type", blur.kind.clone());
    w.opt("value", blur.value);
    w.opt("hidden", blur.hidden);
    w.extra(&blur.extra);
    w.finish()
}

fn encode_text_run(enc: Encoder, run: &TextRun) -> Value {
    let mut w = enc.writer(Scope::TextNode, None);
    w.put("text", run.text.clone());
    w.opt("font_family", run.font_family.clone());
    w.opt("font_size", run.font_size.clone());
    w.opt("font_weight", run.font_weight.clone());
    if let Some(fills) = &run.fills {
        w.put("fills", encode_fills(enc, fills));
    }
    w.extra(&run.extra);
    w.finish()
}

fn encode_text_node(
    enc: Encoder,
    node_type: &str,
    children: Vec<Value>,
    fills: Option<&Vec<Fill>>,
    extra: &Extra,
) -> Value {
    let mut w = enc.writer(Scope::TextNode, None);
    w.put("type", node_type);
    w.put("children", Value::Array(children));
    if let Some(fills) = fills {
        w.put("fills", encode_fills(enc, fills));
    }
    w.extra(extra);
    w.finish()
}

fn encode_text_content(enc: Encoder, content: &TextContent) -> Value {
    let enc = enc.text();
    let sets = content
        .children
        .iter()
        .map(|set| {
            let paragraphs = set
                .children
                .iter()
                .map(|p| {
                    let runs = p.children.iter().map(|r| encode_text_run(enc, r)).collect();
                    encode_text_node(enc, "paragraph", runs, p.fills.as_ref(), &p.extra)
                })
                .collect();
            encode_text_node(enc, "paragraph-set", paragraphs, set.fills.as_ref(), &set.extra)
        })
        .collect();
    encode_text_node(enc, "root", sets, content.fills.as_ref(), &content.extra)
}

fn encode_path_command(enc: Encoder, command: &PathCommand) -> Value {
    let mut params = enc.writer(Scope::PathCommand, None);
    for (name, value) in &command.params {
        params.put(name, *value);
    }
    let mut w = enc.writer(Scope::PathCommand, None);
    w.put("command", command.command.clone());
    w.put("params", params.finish());
    w.finish()
}

fn encode_content(enc: Encoder, content: &Content) -> Value {
    match content {
        Content::Text(text) => encode_text_content(enc, text),
        Content::Path(commands) => {
            Value::Array(commands.iter().map(|c| encode_path_command(enc, c)).collect())
        }
        Content::Raw(value) => value.clone(),
    }
}

fn ids_value(ids: &[Id]) -> Value {
    Value::Array(ids.iter().map(|id| Value::from(id.as_str())).collect())
}

fn encode_design_object(enc: Encoder, obj: &DesignObject) -> Value {
    let mut w = enc.writer(Scope::Shape, Some(&obj.kind));
    w.put("id", obj.id.as_str());
    w.put("type", obj.kind.wire_name());
    w.opt("name", obj.name.clone());
    w.opt("x", obj.x);
    w.opt("y", obj.y);
    w.opt("width", obj.width);
    w.opt("height", obj.height);
    w.opt("rotation", obj.rotation);
    w.opt("selrect", obj.selrect.as_ref().map(|r| encode_selrect(enc, r)));
    w.opt(
        "points",
        obj.points
            .as_ref()
            .map(|ps| Value::Array(ps.iter().map(|p| encode_point(enc, p)).collect())),
    );
    w.opt("transform", obj.transform.as_ref().map(|m| encode_matrix(enc, m)));
    w.opt(
        "transform_inverse",
        obj.transform_inverse.as_ref().map(|m| encode_matrix(enc, m)),
    );
    w.opt("parent_id", obj.parent_id.as_ref().map(Id::as_str));
    w.opt("frame_id", obj.frame_id.as_ref().map(Id::as_str));
    w.opt("shapes", obj.shapes.as_deref().map(ids_value));
    w.opt("fills", obj.fills.as_deref().map(|f| encode_fills(enc, f)));
    w.opt(
        "strokes",
        obj.strokes
            .as_ref()
            .map(|s| Value::Array(s.iter().map(|x| encode_stroke(enc, x)).collect())),
    );
    w.opt(
        "shadows",
        obj.shadows
            .as_ref()
            .map(|s| Value::Array(s.iter().map(|x| encode_shadow(enc, x)).collect())),
    );
    w.opt("blur", obj.blur.as_ref().map(|b| encode_blur(enc, b)));
    w.opt("opacity", obj.opacity);
    w.opt("hidden", obj.hidden);
    w.opt("rx", obj.rx);
    w.opt("ry", obj.ry);
    w.opt("bool_type", obj.bool_type.map(BoolOperation::as_str));
    w.opt("content", obj.content.as_ref().map(|c| encode_content(enc, c)));
    w.extra(&obj.extra);
    w.finish()
}

fn encode_attribute_value(enc: Encoder, attribute: &Attribute) -> Value {
    match attribute {
        Attribute::X(v)
        | Attribute::Y(v)
        | Attribute::Width(v)
        | Attribute::Height(v)
        | Attribute::Rotation(v)
        | Attribute::Opacity(v) => Value::from(*v),
        Attribute::Name(v) => Value::from(v.as_str()),
        Attribute::Hidden(v) => Value::from(*v),
        Attribute::ParentId(id) | Attribute::FrameId(id) => Value::from(id.as_str()),
        Attribute::Fills(fills) => encode_fills(enc, fills),
        Attribute::Strokes(s) => Value::Array(s.iter().map(|x| encode_stroke(enc, x)).collect()),
        Attribute::Shadows(s) => Value::Array(s.iter().map(|x| encode_shadow(enc, x)).collect()),
        Attribute::Blur(b) => b.as_ref().map_or(Value::Null, |b| encode_blur(enc, b)),
        Attribute::Content(c) => encode_content(enc, c),
        Attribute::Selrect(r) => encode_selrect(enc, r),
        Attribute::Points(ps) => Value::Array(ps.iter().map(|p| encode_point(enc, p)).collect()),
        Attribute::Shapes(ids) => ids_value(ids),
        Attribute::PositionData(v) => v.clone().unwrap_or(Value::Null),
        Attribute::Other { value, .. } => value.clone(),
    }
}

/// Attribute name as a keyword value (`~:parent-id`), honouring renames.
fn attribute_keyword(enc: Encoder, name: &str) -> Value {
    let rule = CasingRules::lookup(enc.dialect, false, Scope::Shape, None, name);
    let wire = kebab(rule.rename.unwrap_or(name));
    match enc.dialect {
        Dialect::Transit => Value::String(format!("{KEYWORD_TAG}{wire}")),
        Dialect::Json => Value::String(wire),
    }
}

fn encode_operation(enc: Encoder, operation: &AttrOperation) -> Value {
    let mut w = enc.writer(Scope::Operation, None);
    match operation {
        AttrOperation::Set(attribute) => {
            w.put("type", "set");
            let rule = CasingRules::lookup(enc.dialect, false, Scope::Shape, None, attribute.name());
            w.map.insert(
                key_for(enc, Scope::Operation, "attr"),
                attribute_keyword(enc, attribute.name()),
            );
            let value = enc.tag_value(&rule, Scope::Shape, encode_attribute_value(enc, attribute));
            w.put("val", value);
        }
        AttrOperation::Assign(attributes) => {
            w.put("type", "assign");
            let mut value = enc.writer(Scope::Shape, None);
            for attribute in attributes {
                value.put(attribute.name(), encode_attribute_value(enc, attribute));
            }
            w.put("value", value.finish());
        }
    }
    w.finish()
}

fn key_for(enc: Encoder, scope: Scope, field: &str) -> String {
    let rule = CasingRules::lookup(enc.dialect, enc.in_text, scope, None, field);
    let name = rule.rename.unwrap_or(field);
    let key = match rule.casing {
        Casing::Kebab => kebab(name),
        Casing::Camel => camel(name),
    };
    if rule.tagged_key {
        format!("{KEYWORD_TAG}{key}")
    } else {
        key
    }
}

fn encode_change_with(enc: Encoder, change: &Change) -> Value {
    let mut w = enc.writer(Scope::Change, None);
    w.put("type", change.wire_type());
    w.put("id", change.object_id().as_str());
    match change {
        Change::AddObject {
            page_id,
            frame_id,
            parent_id,
            object,
            ..
        } => {
            w.put("page_id", page_id.as_str());
            w.put("frame_id", frame_id.as_str());
            w.put("parent_id", parent_id.as_str());
            w.put("obj", encode_design_object(enc, object));
        }
        Change::ModifyObject {
            page_id,
            operations,
            ..
        } => {
            w.opt("page_id", page_id.as_ref().map(Id::as_str));
            w.put(
                "operations",
                Value::Array(operations.iter().map(|op| encode_operation(enc, op)).collect()),
            );
        }
        Change::DeleteObject { page_id, .. } => {
            w.put("page_id", page_id.as_str());
        }
    }
    w.finish()
}

fn encode_page(enc: Encoder, page: &Page) -> Value {
    let mut objects = Map::new();
    for (id, object) in &page.objects {
        objects.insert(map_key_for_id(enc, id), encode_design_object(enc, object));
    }
    let mut w = enc.writer(Scope::Document, None);
    w.put("id", page.id.as_str());
    w.opt("name", page.name.clone());
    w.put("objects", Value::Object(objects));
    w.extra(&page.extra);
    w.finish()
}

fn map_key_for_id(enc: Encoder, id: &Id) -> String {
    match enc.dialect {
        Dialect::Transit => format!("{UUID_TAG}{id}"),
        Dialect::Json => id.to_string(),
    }
}

fn encode_file_with(enc: Encoder, file: &File) -> Value {
    let page_ids: Vec<Id> = file.pages.keys().cloned().collect();
    let mut index = Map::new();
    for (id, page) in &file.pages {
        index.insert(map_key_for_id(enc, id), encode_page(enc, page));
    }
    let mut data = enc.writer(Scope::Document, None);
    data.put("pages", ids_value(&page_ids));
    data.put("pages_index", Value::Object(index));
    data.extra(&file.data_extra);

    let mut w = enc.writer(Scope::Document, None);
    w.put("id", file.id.as_str());
    w.opt("name", file.name.clone());
    w.opt("project_id", file.project_id.as_ref().map(Id::as_str));
    w.put("revn", file.revision);
    w.opt("vern", file.version.clone());
    w.put("data", data.finish());
    w.extra(&file.extra);
    w.finish()
}

// ==================== Decoding ====================

/// Reads one wire map, accepting every casing variant of each field.
///
/// Consumed fields are removed; whatever is left becomes `extra`.
struct MapReader<'k> {
    scope: Scope,
    kind: Option<&'k ObjectKind>,
    map: Map<String, Value>,
    path: String,
}

impl<'k> MapReader<'k> {
    fn new(value: &Value, scope: Scope, path: &str) -> PenpotResult<Self> {
        let map = as_map(value)
            .ok_or_else(|| PenpotError::format(path, format!("expected a map, got {}", type_name(value))))?;
        Ok(Self {
            scope,
            kind: None,
            map,
            path: path.to_string(),
        })
    }

    fn with_kind(mut self, kind: &'k ObjectKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn child_path(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.path)
        }
    }

    fn variants(&self, field: &str) -> Vec<String> {
        let rule = CasingRules::lookup(Dialect::Transit, false, self.scope, self.kind, field);
        let mut names = Vec::with_capacity(8);
        for name in [rule.rename, Some(field)].into_iter().flatten() {
            for base in [kebab(name), camel(name)] {
                for key in [format!("{KEYWORD_TAG}{base}"), base] {
                    if !names.contains(&key) {
                        names.push(key);
                    }
                }
            }
        }
        names
    }

    /// Removes every variant of `field`; returns the first present, non-null one.
    fn take_raw(&mut self, field: &str) -> Option<(String, Value)> {
        let mut found = None;
        for key in self.variants(field) {
            if let Some(value) = self.map.shift_remove(&key) {
                if found.is_none() && !value.is_null() {
                    found = Some((key, value));
                }
            }
        }
        found
    }

    /// Takes a field and strips tags according to its value rule.
    fn take(&mut self, field: &str) -> Option<(String, Value)> {
        let rule = CasingRules::lookup(Dialect::Transit, false, self.scope, self.kind, field);
        self.take_raw(field).map(|(key, value)| (key, untag_value(rule.value, value)))
    }

    /// Takes a field and converts it; a value of the wrong type is kept in `extra`.
    fn take_as<T>(&mut self, field: &str, convert: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let (key, value) = self.take(field)?;
        let converted = convert(&value);
        if converted.is_none() {
            self.map.insert(key, value);
        }
        converted
    }

    fn f64(&mut self, field: &str) -> Option<f64> {
        self.take_as(field, Value::as_f64)
    }

    fn string(&mut self, field: &str) -> Option<String> {
        self.take_as(field, |v| v.as_str().map(ToString::to_string))
    }

    fn bool(&mut self, field: &str) -> Option<bool> {
        self.take_as(field, Value::as_bool)
    }

    fn id(&mut self, field: &str) -> Option<Id> {
        self.take_as(field, |v| v.as_str().map(Id::from))
    }

    fn ids(&mut self, field: &str) -> Option<Vec<Id>> {
        self.take_as(field, |v| {
            v.as_array()?
                .iter()
                .map(|item| item.as_str().map(Id::from))
                .collect()
        })
    }

    fn required_id(&mut self, field: &str) -> PenpotResult<Id> {
        self.id(field).ok_or_else(|| {
            PenpotError::format(self.child_path(field), "required field is missing")
        })
    }

    fn required_string(&mut self, field: &str) -> PenpotResult<String> {
        match self.take(field) {
            Some((_, Value::String(s))) => Ok(s),
            Some((_, other)) => Err(PenpotError::format(
                self.child_path(field),
                format!("expected a string, got {}", type_name(&other)),
            )),
            None => Err(PenpotError::format(
                self.child_path(field),
                "required field is missing",
            )),
        }
    }

    /// Decodes a list field item by item. Decoding errors propagate.
    fn list<T>(
        &mut self,
        field: &str,
        decode: impl Fn(&Value, &str) -> PenpotResult<T>,
    ) -> PenpotResult<Option<Vec<T>>> {
        let Some((key, value)) = self.take(field) else {
            return Ok(None);
        };
        let Some(items) = value.as_array() else {
            self.map.insert(key, value);
            return Ok(None);
        };
        let base = self.child_path(field);
        items
            .iter()
            .enumerate()
            .map(|(i, item)| decode(item, &format!("{base}[{i}]")))
            .collect::<PenpotResult<Vec<T>>>()
            .map(Some)
    }

    fn nested<T>(
        &mut self,
        field: &str,
        decode: impl FnOnce(&Value, &str) -> PenpotResult<T>,
    ) -> PenpotResult<Option<T>> {
        let path = self.child_path(field);
        self.take(field)
            .map(|(_, value)| decode(&value, &path))
            .transpose()
    }

    fn finish(self) -> Extra {
        self.map
    }
}

fn untag_value(rule: ValueRule, value: Value) -> Value {
    match (rule, value) {
        (ValueRule::Identifier, Value::String(s)) => Value::String(untag(&s, UUID_TAG).to_string()),
        (ValueRule::Identifier, Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| untag_value(ValueRule::Identifier, item))
                .collect(),
        ),
        (ValueRule::Keyword, Value::String(s)) => Value::String(untag(&s, KEYWORD_TAG).to_string()),
        (_, value) => value,
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

fn decode_point(value: &Value, path: &str) -> PenpotResult<Point> {
    let mut r = MapReader::new(value, Scope::Geometry, path)?;
    match (r.f64("x"), r.f64("y")) {
        (Some(x), Some(y)) => Ok(Point { x, y }),
        _ => Err(PenpotError::format(path, "point needs numeric x and y")),
    }
}

fn decode_selrect(value: &Value, path: &str) -> PenpotResult<Selrect> {
    let mut r = MapReader::new(value, Scope::Geometry, path)?;
    let x = r.f64("x").unwrap_or_default();
    let y = r.f64("y").unwrap_or_default();
    let width = r.f64("width").unwrap_or_default();
    let height = r.f64("height").unwrap_or_default();
    Ok(Selrect {
        x,
        y,
        width,
        height,
        x1: r.f64("x1").unwrap_or(x),
        y1: r.f64("y1").unwrap_or(y),
        x2: r.f64("x2").unwrap_or(x + width),
        y2: r.f64("y2").unwrap_or(y + height),
    })
}

fn decode_matrix(value: &Value, path: &str) -> PenpotResult<Matrix> {
    let mut r = MapReader::new(value, Scope::Geometry, path)?;
    let id = Matrix::IDENTITY;
    Ok(Matrix {
        a: r.f64("a").unwrap_or(id.a),
        b: r.f64("b").unwrap_or(id.b),
        c: r.f64("c").unwrap_or(id.c),
        d: r.f64("d").unwrap_or(id.d),
        e: r.f64("e").unwrap_or(id.e),
        f: r.f64("f").unwrap_or(id.f),
    })
}

fn decode_fill(value: &Value, path: &str) -> PenpotResult<Fill> {
    let mut r = MapReader::new(value, Scope::Paint, path)?;
    let color = r.string("fill_color");
    let opacity = r.f64("fill_opacity");
    let gradient = match r.take("type") {
        Some((key, kind_value)) => match kind_value.as_str().and_then(GradientKind::from_wire) {
            Some(kind) => Some(Gradient {
                kind,
                start_color: r.string("start_color").unwrap_or_default(),
                end_color: r.string("end_color").unwrap_or_default(),
                start_x: r.f64("start_x").unwrap_or(0.0),
                start_y: r.f64("start_y").unwrap_or(0.0),
                end_x: r.f64("end_x").unwrap_or(1.0),
                end_y: r.f64("end_y").unwrap_or(1.0),
            }),
            None => {
                r.map.insert(key, kind_value);
                None
            }
        },
        None => None,
    };
    Ok(Fill {
        color,
        opacity,
        gradient,
        extra: r.finish(),
    })
}

fn decode_stroke(value: &Value, path: &str) -> PenpotResult<Stroke> {
    let mut r = MapReader::new(value, Scope::Paint, path)?;
    Ok(Stroke {
        color: r.string("stroke_color"),
        opacity: r.f64("stroke_opacity"),
        width: r.f64("stroke_width"),
        style: r.string("stroke_style"),
        alignment: r.string("stroke_alignment"),
        extra: r.finish(),
    })
}

fn decode_shadow(value: &Value, path: &str) -> PenpotResult<Shadow> {
    let mut r = MapReader::new(value, Scope::Effect, path)?;
    Ok(Shadow {
        style: r.string("style"),
        color: r.string("color"),
        offset_x: r.f64("offset_x"),
        offset_y: r.f64("offset_y"),
        blur: r.f64("blur"),
        spread: r.f64("spread"),
        hidden: r.bool("hidden"),
        extra: r.finish(),
    })
}

fn decode_blur(value: &Value, path: &str) -> PenpotResult<Blur> {
    let mut r = MapReader::new(value, Scope::Effect, path)?;
    Ok(Blur {
        kind: r.string("type"),
        value: r.f64("value"),
        hidden: r.bool("hidden"),
        extra: r.finish(),
    })
}

fn decode_text_run(value: &Value, path: &str) -> PenpotResult<TextRun> {
    let mut r = MapReader::new(value, Scope::TextNode, path)?;
    Ok(TextRun {
        text: r.string("text").unwrap_or_default(),
        font_family: r.string("font_family"),
        font_size: r.take_as("font_size", |v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }),
        font_weight: r.take_as("font_weight", |v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }),
        fills: r.list("fills", decode_fill)?,
        extra: r.finish(),
    })
}

/// Checks a text node's `type` when present; returns the reader for the rest.
///
/// A node whose `type` names another level is a format error.
fn text_node<'k>(value: &Value, path: &str, expected: &str) -> PenpotResult<MapReader<'k>> {
    let mut r = MapReader::new(value, Scope::TextNode, path)?;
    if let Some((_, found)) = r.take("type") {
        if found.as_str() != Some(expected) {
            return Err(PenpotError::format(
                r.child_path("type"),
                format!("expected text node type '{expected}', got {found}"),
            ));
        }
    }
    Ok(r)
}

fn decode_paragraph(value: &Value, path: &str) -> PenpotResult<Paragraph> {
    let mut r = text_node(value, path, "paragraph")?;
    Ok(Paragraph {
        children: r.list("children", decode_text_run)?.unwrap_or_default(),
        fills: r.list("fills", decode_fill)?,
        extra: r.finish(),
    })
}

fn decode_paragraph_set(value: &Value, path: &str) -> PenpotResult<ParagraphSet> {
    let mut r = text_node(value, path, "paragraph-set")?;
    Ok(ParagraphSet {
        children: r.list("children", decode_paragraph)?.unwrap_or_default(),
        fills: r.list("fills", decode_fill)?,
        extra: r.finish(),
    })
}

/// Decodes a text content tree.
///
/// # Errors
///
/// Returns a format error when the root `type` is missing or is not `root`.
pub fn decode_text_content(value: &Value, path: &str) -> PenpotResult<TextContent> {
    let mut r = MapReader::new(value, Scope::TextNode, path)?;
    let root_type = r.required_string("type")?;
    if root_type != "root" {
        return Err(PenpotError::format(
            r.child_path("type"),
            format!("text content root must have type 'root', got '{root_type}'"),
        ));
    }
    Ok(TextContent {
        children: r.list("children", decode_paragraph_set)?.unwrap_or_default(),
        fills: r.list("fills", decode_fill)?,
        extra: r.finish(),
    })
}

fn decode_path_command(value: &Value, path: &str) -> PenpotResult<PathCommand> {
    let mut r = MapReader::new(value, Scope::PathCommand, path)?;
    let command = r.required_string("command")?;
    let mut params = IndexMap::new();
    if let Some((_, raw)) = r.take("params") {
        if let Some(map) = as_map(&raw) {
            for (key, value) in map {
                if let Some(number) = value.as_f64() {
                    params.insert(canonical_name(&key), number);
                }
            }
        }
    }
    Ok(PathCommand { command, params })
}

fn decode_content(kind: &ObjectKind, value: &Value, path: &str) -> PenpotResult<Content> {
    match kind {
        ObjectKind::Text if as_map(value).is_some() => {
            decode_text_content(value, path).map(Content::Text)
        }
        ObjectKind::Path | ObjectKind::Bool if value.is_array() && !is_array_map(value) => {
            let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
            let is_commands = items.iter().all(|item| {
                as_map(item).is_some_and(|m| {
                    m.keys().any(|k| canonical_name(k) == "command")
                })
            });
            if is_commands {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| decode_path_command(item, &format!("{path}[{i}]")))
                    .collect::<PenpotResult<Vec<_>>>()
                    .map(Content::Path)
            } else {
                Ok(Content::Raw(value.clone()))
            }
        }
        _ => Ok(Content::Raw(value.clone())),
    }
}

fn decode_design_object(value: &Value, path: &str) -> PenpotResult<DesignObject> {
    let mut probe = MapReader::new(value, Scope::Shape, path)?;
    let kind = ObjectKind::from_wire(&probe.required_string("type")?);
    let mut r = MapReader::new(value, Scope::Shape, path)?.with_kind(&kind);
    r.take_raw("type");

    let id = r.required_id("id")?;
    let content = match r.take("content") {
        Some((_, raw)) => Some(decode_content(&kind, &raw, &r.child_path("content"))?),
        None => None,
    };
    let object = DesignObject {
        name: r.string("name"),
        x: r.f64("x"),
        y: r.f64("y"),
        width: r.f64("width"),
        height: r.f64("height"),
        rotation: r.f64("rotation"),
        selrect: r.nested("selrect", decode_selrect)?,
        points: r.list("points", decode_point)?,
        transform: r.nested("transform", decode_matrix)?,
        transform_inverse: r.nested("transform_inverse", decode_matrix)?,
        parent_id: r.id("parent_id"),
        frame_id: r.id("frame_id"),
        shapes: r.ids("shapes"),
        fills: r.list("fills", decode_fill)?,
        strokes: r.list("strokes", decode_stroke)?,
        shadows: r.list("shadows", decode_shadow)?,
        blur: r.nested("blur", decode_blur)?,
        opacity: r.f64("opacity"),
        hidden: r.bool("hidden"),
        rx: r.f64("rx"),
        ry: r.f64("ry"),
        bool_type: r.take_as("bool_type", |v| v.as_str().and_then(BoolOperation::parse)),
        content,
        extra: Extra::new(),
        id,
        kind: kind.clone(),
    };
    Ok(DesignObject {
        extra: r.finish(),
        ..object
    })
}

/// Decodes one attribute value given its canonical (snake case) name.
///
/// Names the model does not know become [`Attribute::Other`].
///
/// # Errors
///
/// Returns a format error when the value has the wrong shape for the attribute.
pub fn decode_attribute(name: &str, value: &Value, path: &str) -> PenpotResult<Attribute> {
    let wrong = |expected: &str| {
        PenpotError::format(path, format!("attribute '{name}' expects {expected}, got {}", type_name(value)))
    };
    let number = || value.as_f64().ok_or_else(|| wrong("a number"));
    let id = || {
        value
            .as_str()
            .map(|s| Id::from(untag(s, UUID_TAG)))
            .ok_or_else(|| wrong("an id"))
    };
    let items = || value.as_array().ok_or_else(|| wrong("a list"));

    Ok(match name {
        "x" => Attribute::X(number()?),
        "y" => Attribute::Y(number()?),
        "width" => Attribute::Width(number()?),
        "height" => Attribute::Height(number()?),
        "rotation" => Attribute::Rotation(number()?),
        "opacity" => Attribute::Opacity(number()?),
        "name" => Attribute::Name(value.as_str().ok_or_else(|| wrong("a string"))?.to_string()),
        "hidden" => Attribute::Hidden(value.as_bool().ok_or_else(|| wrong("a boolean"))?),
        "parent_id" => Attribute::ParentId(id()?),
        "frame_id" => Attribute::FrameId(id()?),
        "fills" => Attribute::Fills(decode_items(items()?, path, decode_fill)?),
        "strokes" => Attribute::Strokes(decode_items(items()?, path, decode_stroke)?),
        "shadow" | "shadows" => Attribute::Shadows(decode_items(items()?, path, decode_shadow)?),
        "blur" if value.is_null() => Attribute::Blur(None),
        "blur" => Attribute::Blur(Some(decode_blur(value, path)?)),
        "selrect" => Attribute::Selrect(decode_selrect(value, path)?),
        "points" => Attribute::Points(decode_items(items()?, path, decode_point)?),
        "shapes" => Attribute::Shapes(
            items()?
                .iter()
                .map(|v| v.as_str().map(|s| Id::from(untag(s, UUID_TAG))))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| wrong("a list of ids"))?,
        ),
        "position_data" if value.is_null() => Attribute::PositionData(None),
        "position_data" => Attribute::PositionData(Some(value.clone())),
        "content" => {
            // Without the object kind, the shape of the value decides.
            let content = if as_map(value).is_some() {
                Content::Text(decode_text_content(value, path)?)
            } else {
                decode_content(&ObjectKind::Path, value, path)?
            };
            Attribute::Content(content)
        }
        other => Attribute::Other {
            name: other.to_string(),
            value: value.clone(),
        },
    })
}

fn decode_items<T>(
    items: &[Value],
    path: &str,
    decode: fn(&Value, &str) -> PenpotResult<T>,
) -> PenpotResult<Vec<T>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode(item, &format!("{path}[{i}]")))
        .collect()
}

fn decode_operation(value: &Value, path: &str) -> PenpotResult<AttrOperation> {
    let mut r = MapReader::new(value, Scope::Operation, path)?;
    let op_type = r.required_string("type")?;
    match op_type.as_str() {
        "set" => {
            let attr = canonical_name(&r.required_string("attr")?);
            let value = r.take("val").map_or(Value::Null, |(_, v)| v);
            let val_path = r.child_path("val");
            decode_attribute(&attr, &value, &val_path).map(AttrOperation::Set)
        }
        "assign" => {
            let Some((_, value)) = r.take("value") else {
                return Err(PenpotError::format(r.child_path("value"), "required field is missing"));
            };
            let value_path = r.child_path("value");
            let map = as_map(&value)
                .ok_or_else(|| PenpotError::format(&value_path, "expected a map"))?;
            map.iter()
                .map(|(key, v)| {
                    let name = canonical_name(key);
                    decode_attribute(&name, v, &format!("{value_path}.{name}"))
                })
                .collect::<PenpotResult<Vec<_>>>()
                .map(AttrOperation::Assign)
        }
        other => Err(PenpotError::format(
            r.child_path("type"),
            format!("unsupported operation type '{other}'"),
        )),
    }
}

fn decode_change_at(value: &Value, path: &str) -> PenpotResult<Change> {
    let mut r = MapReader::new(value, Scope::Change, path)?;
    let change_type = r.required_string("type")?;
    let id = r.required_id("id")?;
    match change_type.as_str() {
        "add-obj" => {
            let page_id = r.required_id("page_id")?;
            let object = match r.take_raw("obj") {
                Some((_, obj)) => decode_design_object(&obj, &r.child_path("obj"))?,
                None => return Err(PenpotError::format(r.child_path("obj"), "required field is missing")),
            };
            let frame_id = r
                .id("frame_id")
                .or_else(|| object.frame_id.clone())
                .unwrap_or_else(Id::root_frame);
            let parent_id = r
                .id("parent_id")
                .or_else(|| object.parent_id.clone())
                .unwrap_or_else(|| frame_id.clone());
            Ok(Change::AddObject {
                id,
                page_id,
                frame_id,
                parent_id,
                object,
            })
        }
        "mod-obj" => Ok(Change::ModifyObject {
            page_id: r.id("page_id"),
            operations: r.list("operations", decode_operation)?.unwrap_or_default(),
            id,
        }),
        "del-obj" => Ok(Change::DeleteObject {
            page_id: r.required_id("page_id")?,
            id,
        }),
        other => Err(PenpotError::format(
            r.child_path("type"),
            format!("unsupported change type '{other}'"),
        )),
    }
}

fn decode_page(value: &Value, path: &str, fallback_id: &str) -> PenpotResult<Page> {
    let mut r = MapReader::new(value, Scope::Document, path)?;
    let id = r.id("id").unwrap_or_else(|| Id::from(fallback_id));
    let name = r.string("name");
    let mut objects = IndexMap::new();
    if let Some((key, raw)) = r.take_raw("objects") {
        let Some(map) = as_map(&raw) else {
            return Err(PenpotError::format(
                format!("{path}.{}", canonical_name(&key)),
                "expected a map of objects",
            ));
        };
        for (object_key, object_value) in &map {
            let object = decode_design_object(object_value, &format!("{path}.objects.{object_key}"))?;
            objects.insert(object.id.clone(), object);
        }
    }
    Ok(Page {
        id,
        name,
        objects,
        extra: r.finish(),
    })
}

// ==================== Public API ====================

/// Encodes a design object for the Transit write path.
#[must_use]
pub fn encode(object: &DesignObject) -> Value {
    encode_object(object, Dialect::Transit)
}

/// Decodes a design object from either dialect.
///
/// # Errors
///
/// Returns a format error when `id` or `type` is missing, or text content
/// lacks its root type.
pub fn decode(value: &Value) -> PenpotResult<DesignObject> {
    decode_design_object(value, "obj")
}

/// Encodes a design object in the given dialect.
#[must_use]
pub fn encode_object(object: &DesignObject, dialect: Dialect) -> Value {
    encode_design_object(Encoder::new(dialect), object)
}

/// Encodes a text content tree (always plain camelCase keys).
#[must_use]
pub fn encode_text(content: &TextContent, dialect: Dialect) -> Value {
    encode_text_content(Encoder::new(dialect), content)
}

/// Encodes one change operation.
#[must_use]
pub fn encode_change(change: &Change, dialect: Dialect) -> Value {
    encode_change_with(Encoder::new(dialect), change)
}

/// Decodes one change operation.
///
/// # Errors
///
/// Returns a format error for an unknown change type or a missing id.
pub fn decode_change(value: &Value) -> PenpotResult<Change> {
    decode_change_at(value, "change")
}

/// Encodes an `update-file` request body.
#[must_use]
pub fn encode_update(request: &UpdateRequest) -> Value {
    let enc = Encoder::new(Dialect::Transit);
    let mut w = enc.writer(Scope::Envelope, None);
    w.put("id", request.file_id.as_str());
    w.put("session_id", request.session_id.as_str());
    w.put("revn", request.revision);
    w.opt("vern", request.version.clone());
    w.put(
        "changes",
        Value::Array(
            request
                .changes
                .iter()
                .map(|c| encode_change_with(enc, c))
                .collect(),
        ),
    );
    w.finish()
}

/// Decodes an `update-file` request body.
///
/// # Errors
///
/// Returns a format error when the file id, session id or a change is malformed.
pub fn decode_update(value: &Value) -> PenpotResult<UpdateRequest> {
    let mut r = MapReader::new(value, Scope::Envelope, "")?;
    let file_id = r.required_id("id")?;
    let session_id = r.required_id("session_id")?;
    let revision = r.take_as("revn", Value::as_u64).unwrap_or(0);
    let version = r.take("vern").map(|(_, v)| v);
    let changes = r.list("changes", decode_change_at)?.unwrap_or_default();
    Ok(UpdateRequest {
        file_id,
        session_id,
        revision,
        version,
        changes,
    })
}

/// Extracts the new revision from an `update-file` response.
///
/// A map response carries `revn`; a list response (the applied changes) or a
/// map without `revn` means the submission advanced the revision by one.
///
/// # Errors
///
/// Returns a format error for any other response shape.
pub fn decode_update_response(value: &Value, submitted: u64) -> PenpotResult<u64> {
    if let Some(map) = as_map(value) {
        let mut r = MapReader {
            scope: Scope::Envelope,
            kind: None,
            map,
            path: String::new(),
        };
        return Ok(r.take_as("revn", Value::as_u64).unwrap_or(submitted + 1));
    }
    match value {
        Value::Array(_) => Ok(submitted + 1),
        other => Err(PenpotError::format(
            "response",
            format!("unexpected update response: {}", type_name(other)),
        )),
    }
}

/// Encodes a file document.
#[must_use]
pub fn encode_file(file: &File, dialect: Dialect) -> Value {
    encode_file_with(Encoder::new(dialect), file)
}

/// Decodes a file document as returned by `get-file`.
///
/// A missing `revn` is read as 0.
///
/// # Errors
///
/// Returns a format error when the file id is missing or an object is malformed.
pub fn decode_file(value: &Value) -> PenpotResult<File> {
    let mut r = MapReader::new(value, Scope::Document, "file")?;
    let id = r.required_id("id")?;
    let name = r.string("name");
    let project_id = r.id("project_id");
    let revision = r.take_as("revn", Value::as_u64).unwrap_or(0);
    let version = r.take("vern").map(|(_, v)| v);

    let mut pages = IndexMap::new();
    let mut data_extra = Extra::new();
    if let Some((_, data)) = r.take_raw("data") {
        let mut d = MapReader::new(&data, Scope::Document, "file.data")?;
        let order = d.ids("pages").unwrap_or_default();
        let index = d.take_raw("pages_index").and_then(|(_, v)| as_map(&v)).unwrap_or_default();

        let mut decoded: IndexMap<Id, Page> = IndexMap::new();
        for (key, page_value) in &index {
            let fallback = untag(key, UUID_TAG);
            let page = decode_page(page_value, &format!("file.data.pages-index.{fallback}"), fallback)?;
            decoded.insert(page.id.clone(), page);
        }
        for id in order {
            if let Some(page) = decoded.shift_remove(&id) {
                pages.insert(id, page);
            }
        }
        pages.extend(decoded);
        data_extra = d.finish();
    }

    Ok(File {
        id,
        name,
        project_id,
        revision,
        version,
        pages,
        extra: r.finish(),
        data_extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn casing_helpers() {
        assert_eq!(kebab("fill_color"), "fill-color");
        assert_eq!(camel("transform_inverse"), "transformInverse");
        assert_eq!(camel("x1"), "x1");
        assert_eq!(canonical_name("~:fill-color"), "fill_color");
        assert_eq!(canonical_name("fillColor"), "fill_color");
        assert_eq!(canonical_name("positionData"), "position_data");
    }

    #[test]
    fn rule_table_defaults_and_overrides() {
        let rule = CasingRules::lookup(Dialect::Transit, false, Scope::Shape, None, "name");
        assert_eq!(rule.casing, Casing::Kebab);
        assert!(rule.tagged_key);
        assert_eq!(rule.value, ValueRule::Plain);

        let rule = CasingRules::lookup(Dialect::Transit, false, Scope::Shape, None, "shadows");
        assert_eq!(rule.rename, Some("shadow"));

        let text = ObjectKind::Text;
        let rule = CasingRules::lookup(Dialect::Transit, false, Scope::Shape, Some(&text), "bool_type");
        assert_eq!(rule.value, ValueRule::Plain);
        let boolean = ObjectKind::Bool;
        let rule = CasingRules::lookup(Dialect::Transit, false, Scope::Shape, Some(&boolean), "bool_type");
        assert_eq!(rule.value, ValueRule::Keyword);

        let rule = CasingRules::lookup(Dialect::Transit, false, Scope::TextNode, None, "font_family");
        assert_eq!(rule.casing, Casing::Camel);
        assert!(!rule.tagged_key);
    }

    #[test]
    fn normalize_numeric_whole_floats() {
        let whole = Number::from_f64(1.0).unwrap();
        assert_eq!(normalize_numeric(&whole), Number::from(1));
        let fractional = Number::from_f64(0.5).unwrap();
        assert_eq!(normalize_numeric(&fractional), fractional);
        assert_eq!(normalize_numeric(&Number::from(3)), Number::from(3));
    }

    #[test]
    fn array_form_maps_are_accepted() {
        let value = json!(["^ ", "~:id", "~uabc", "~:fullname", "Ada"]);
        let map = as_map(&value).unwrap();
        assert_eq!(map.get("~:id"), Some(&json!("~uabc")));
        assert_eq!(strip_transit(&value), json!({"id": "abc", "fullname": "Ada"}));
    }

    #[test]
    fn text_content_types_stay_untagged() {
        let content = TextContent::single("Hi", TextRun::default(), &[Fill::solid("#111111", 1.0)]);
        let wire = encode_text(&content, Dialect::Transit);
        assert_eq!(wire["type"], json!("root"));
        assert_eq!(wire["children"][0]["type"], json!("paragraph-set"));
        assert_eq!(wire["children"][0]["children"][0]["type"], json!("paragraph"));
        assert_eq!(
            wire["children"][0]["children"][0]["children"][0]["fills"][0]["fillColor"],
            json!("#111111")
        );
    }

    #[test]
    fn object_kind_is_tagged_at_shape_scope() {
        let obj = DesignObject::new(Id::from("t1"), ObjectKind::Text);
        let wire = encode(&obj);
        assert_eq!(wire["~:type"], json!("~:text"));
        assert_eq!(wire["~:id"], json!("~ut1"));
    }

    #[test]
    fn missing_root_type_is_a_format_error() {
        let wire = json!({"~:id": "~ut", "~:type": "~:text", "~:content": {"children": []}});
        let err = decode(&wire).unwrap_err();
        assert!(matches!(err, PenpotError::Format { ref path, .. } if path == "obj.content.type"));
    }

    #[test]
    fn text_node_at_the_wrong_level_is_a_format_error() {
        let content = json!({
            "type": "root",
            "children": [{"type": "paragraph", "children": []}],
        });
        let err = decode_text_content(&content, "content").unwrap_err();
        assert!(matches!(err, PenpotError::Format { ref path, .. } if path.ends_with("type")));
        assert!(err.to_string().contains("paragraph-set"));

        let untyped = json!({"type": "root", "children": [{"children": [{"children": []}]}]});
        assert_eq!(decode_text_content(&untyped, "content").unwrap().children.len(), 1);
    }

    #[test]
    fn missing_object_type_is_a_format_error() {
        let err = decode(&json!({"id": "x"})).unwrap_err();
        assert!(matches!(err, PenpotError::Format { .. }));
        assert!(err.to_string().contains("obj.type"));
    }

    #[test]
    fn wrong_typed_optional_field_is_preserved() {
        let wire = json!({"id": "r", "type": "rect", "x": "ten"});
        let obj = decode(&wire).unwrap();
        assert_eq!(obj.x, None);
        assert_eq!(obj.extra.get("x"), Some(&json!("ten")));
    }

    #[test]
    fn update_response_shapes() {
        assert_eq!(decode_update_response(&json!({"~:revn": 9}), 4).unwrap(), 9);
        assert_eq!(decode_update_response(&json!({"revn": 9}), 4).unwrap(), 9);
        assert_eq!(decode_update_response(&json!([{"x": 1}]), 4).unwrap(), 5);
        assert_eq!(decode_update_response(&json!({}), 4).unwrap(), 5);
        assert!(decode_update_response(&json!("ok"), 4).is_err());
    }

    #[test]
    fn set_operation_encodes_attr_keyword() {
        let op = AttrOperation::Set(Attribute::ParentId(Id::from("g1")));
        let wire = encode_operation(Encoder::new(Dialect::Transit), &op);
        assert_eq!(wire["~:type"], json!("~:set"));
        assert_eq!(wire["~:attr"], json!("~:parent-id"));
        assert_eq!(wire["~:val"], json!("~ug1"));

        let op = AttrOperation::Set(Attribute::Opacity(1.0));
        let wire = encode_operation(Encoder::new(Dialect::Transit), &op);
        assert_eq!(wire["~:val"], json!(1));
        assert_eq!(decode_operation(&wire, "op").unwrap(), op);
    }
}
