//! Change-list construction.
//!
//! Turns declarative intents (loose key/value payloads, as they arrive from
//! tool calls) into typed [`Change`] operations. Required fields are checked
//! here, before anything touches the network. With a file snapshot the
//! builder also resolves page ids and applies the text-aware paint rules.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::penpot::codec;
use crate::penpot::error::{PenpotError, PenpotResult};
use crate::penpot::model::{
    AttrOperation, Attribute, Blur, BoolOperation, Change, Content, DesignObject, File, Fill,
    Gradient, GradientKind, Id, ObjectKind, PathCommand, Point, Selrect, Shadow, Stroke,
    TextContent, TextRun,
};

/// Loose key/value map carried by an intent.
pub type Payload = Map<String, Value>;

/// Default font size of new text objects.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Default font family of new text objects.
pub const DEFAULT_FONT_FAMILY: &str = "Work Sans";

/// Default fill colour of new shapes.
pub const DEFAULT_FILL_COLOR: &str = "#000000";

/// Accepted stroke styles.
pub const STROKE_STYLES: [&str; 4] = ["solid", "dashed", "dotted", "mixed"];

/// Accepted stroke alignments.
pub const STROKE_ALIGNMENTS: [&str; 3] = ["center", "inner", "outer"];

/// Accepted blur types.
pub const BLUR_TYPES: [&str; 2] = ["layer-blur", "background-blur"];

/// A declarative edit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    /// Create an object. `payload.kind` selects the shape kind; `payload.id`
    /// may pin the new id so later intents in the batch can refer to it.
    Add {
        page_id: Id,
        #[serde(default)]
        parent_id: Option<Id>,
        payload: Payload,
    },
    /// Change attributes of an existing object.
    Modify { object_id: Id, attributes: Payload },
    /// Delete an object and its children.
    Delete {
        object_id: Id,
        #[serde(default)]
        page_id: Option<Id>,
    },
    /// Change typed attributes of an existing object.
    #[serde(skip)]
    Restyle {
        object_id: Id,
        attributes: Vec<Attribute>,
    },
    /// An already built change, passed through unchanged.
    #[serde(skip)]
    Raw(Change),
}

/// An object added earlier in the same batch.
#[derive(Debug, Clone)]
struct PendingObject {
    page_id: Id,
    object: DesignObject,
}

/// Builds ordered change lists.
///
/// Changes come out in the order they are built; nothing is reordered and
/// no dependencies are inferred.
#[derive(Debug, Default)]
pub struct ChangeListBuilder<'a> {
    snapshot: Option<&'a File>,
    pending: IndexMap<Id, PendingObject>,
}

impl<'a> ChangeListBuilder<'a> {
    /// A builder with no knowledge of the file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder that resolves objects against a decoded file.
    #[must_use]
    pub fn with_snapshot(file: &'a File) -> Self {
        Self {
            snapshot: Some(file),
            pending: IndexMap::new(),
        }
    }

    /// Ids of the objects created so far, in creation order.
    pub fn created_ids(&self) -> impl Iterator<Item = &Id> {
        self.pending.keys()
    }

    /// Builds the change for one intent.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed intent, or object-not-found
    /// when a snapshot is present and does not contain the target.
    pub fn build(&mut self, intent: &Intent) -> PenpotResult<Change> {
        match intent {
            Intent::Add {
                page_id,
                parent_id,
                payload,
            } => self.build_add(payload, page_id, parent_id.as_ref()),
            Intent::Modify {
                object_id,
                attributes,
            } => self.build_modify(object_id, attributes),
            Intent::Restyle {
                object_id,
                attributes,
            } => self.build_modify_with(object_id, attributes.clone()),
            Intent::Delete { object_id, page_id } => self.build_delete(object_id, page_id.as_ref()),
            Intent::Raw(change) => Ok(change.clone()),
        }
    }

    /// Builds an `add-obj` change.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first missing required field.
    pub fn build_add(
        &mut self,
        payload: &Payload,
        page_id: &Id,
        parent_id: Option<&Id>,
    ) -> PenpotResult<Change> {
        let fields = Fields(payload);
        let kind_name = fields
            .string("kind")?
            .or(fields.string("type")?)
            .ok_or_else(|| PenpotError::missing_field("kind"))?;
        let kind = ObjectKind::from_intent(&kind_name).ok_or_else(|| {
            PenpotError::validation(
                "kind",
                format!(
                    "unsupported kind '{kind_name}'; expected rectangle, circle, text, frame, path, bool or group"
                ),
            )
        })?;

        let id = fields.string("id")?.map_or_else(Id::generate, Id::from);
        let mut object = build_object(id.clone(), &kind, &fields)?;

        let (parent, frame) = self.placement(parent_id);
        object.parent_id = Some(parent.clone());
        object.frame_id = Some(frame.clone());

        self.pending.insert(
            id.clone(),
            PendingObject {
                page_id: page_id.clone(),
                object: object.clone(),
            },
        );
        Ok(Change::AddObject {
            id,
            page_id: page_id.clone(),
            frame_id: frame,
            parent_id: parent,
            object,
        })
    }

    /// Builds a `mod-obj` change from loose attributes.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a wrongly typed attribute, or
    /// object-not-found (with a snapshot) for an unknown id.
    pub fn build_modify(&mut self, object_id: &Id, attributes: &Payload) -> PenpotResult<Change> {
        let attributes = parse_attributes(attributes)?;
        self.build_modify_with(object_id, attributes)
    }

    /// Builds a `mod-obj` change from typed attributes.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_modify`].
    pub fn build_modify_with(
        &mut self,
        object_id: &Id,
        attributes: Vec<Attribute>,
    ) -> PenpotResult<Change> {
        if attributes.is_empty() {
            return Err(PenpotError::validation("attributes", "no attributes to change"));
        }

        if let Some(pending) = self.pending.get_mut(object_id) {
            let change = build_modify_for(&pending.object, Some(&pending.page_id), attributes);
            if let Change::ModifyObject { operations, .. } = &change {
                for attribute in operations.iter().flat_map(AttrOperation::attributes) {
                    pending.object.apply(attribute);
                }
            }
            return Ok(change);
        }

        match self.snapshot {
            Some(file) => {
                let (page, object) = file
                    .find_object(object_id)
                    .ok_or_else(|| PenpotError::object_not_found(object_id.as_str()))?;
                Ok(build_modify_for(object, Some(&page.id), attributes))
            }
            None => Ok(Change::ModifyObject {
                id: object_id.clone(),
                page_id: None,
                operations: vec![AttrOperation::Assign(attributes)],
            }),
        }
    }

    /// Builds a `del-obj` change.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the page cannot be determined or the
    /// target is a page root frame.
    pub fn build_delete(&mut self, object_id: &Id, page_id: Option<&Id>) -> PenpotResult<Change> {
        if object_id.is_root_frame() {
            return Err(PenpotError::validation(
                "object_id",
                "the page root frame cannot be deleted",
            ));
        }
        let known_page = self
            .pending
            .shift_remove(object_id)
            .map(|pending| pending.page_id)
            .or_else(|| {
                self.snapshot
                    .and_then(|file| file.find_object(object_id))
                    .map(|(page, _)| page.id.clone())
            });
        let page_id = match (page_id, known_page) {
            (Some(page_id), _) => page_id.clone(),
            (None, Some(page_id)) => page_id,
            (None, None) if self.snapshot.is_some() => {
                return Err(PenpotError::object_not_found(object_id.as_str()));
            }
            (None, None) => return Err(PenpotError::missing_field("page_id")),
        };
        Ok(Change::DeleteObject {
            id: object_id.clone(),
            page_id,
        })
    }

    fn lookup(&self, id: &Id) -> Option<&DesignObject> {
        self.pending.get(id).map(|p| &p.object).or_else(|| {
            self.snapshot
                .and_then(|file| file.find_object(id))
                .map(|(_, object)| object)
        })
    }

    /// Parent and frame ids for a new object.
    fn placement(&self, parent_id: Option<&Id>) -> (Id, Id) {
        let Some(parent) = parent_id else {
            return (Id::root_frame(), Id::root_frame());
        };
        let frame = match self.lookup(parent) {
            Some(object) if object.kind != ObjectKind::Frame => {
                object.frame_id.clone().unwrap_or_else(Id::root_frame)
            }
            _ => parent.clone(),
        };
        (parent.clone(), frame)
    }
}

/// Builds a `mod-obj` change for an object whose current state is known.
///
/// Text objects keep their colour in the content tree, so a fill change on
/// text also rewrites the content with the fill at every level and clears the
/// cached position data. Geometry changes refresh the selection rectangle and
/// corner points.
#[must_use]
pub fn build_modify_for(
    object: &DesignObject,
    page_id: Option<&Id>,
    attributes: Vec<Attribute>,
) -> Change {
    let mut assigned = Vec::with_capacity(attributes.len() + 2);
    let mut text_ops = Vec::new();

    for attribute in attributes {
        match (&attribute, object.text_content()) {
            (Attribute::Fills(fills), Some(content)) if object.kind == ObjectKind::Text => {
                let mut content = content.clone();
                content.fill_all(fills);
                text_ops.push(AttrOperation::Set(Attribute::Content(Content::Text(content))));
                text_ops.push(AttrOperation::Set(attribute));
                text_ops.push(AttrOperation::Set(Attribute::PositionData(None)));
            }
            _ => assigned.push(attribute),
        }
    }

    if assigned.iter().any(Attribute::is_geometry) {
        let mut moved = object.clone();
        for attribute in &assigned {
            moved.apply(attribute);
        }
        if let (Some(x), Some(y), Some(w), Some(h)) = (moved.x, moved.y, moved.width, moved.height) {
            let selrect = Selrect::from_bounds(x, y, w, h);
            assigned.push(Attribute::Points(selrect.corners()));
            assigned.push(Attribute::Selrect(selrect));
        }
    }

    let mut operations = Vec::with_capacity(1 + text_ops.len());
    if !assigned.is_empty() {
        operations.push(AttrOperation::Assign(assigned));
    }
    operations.extend(text_ops);

    Change::ModifyObject {
        id: object.id.clone(),
        page_id: page_id.cloned(),
        operations,
    }
}

/// Parses loose modify attributes.
///
/// `color`/`fill_color` with an optional `fill_opacity` become a single solid
/// fill; everything else maps onto the attribute of the same name.
///
/// # Errors
///
/// Returns a validation error naming the first wrongly typed attribute.
pub fn parse_attributes(payload: &Payload) -> PenpotResult<Vec<Attribute>> {
    let fields = Fields(payload);
    let mut attributes = Vec::with_capacity(payload.len());
    let color = fields.string("fill_color")?.or(fields.string("color")?);
    let fill_opacity = fields.number("fill_opacity")?;
    let mut fill_added = false;

    for (key, value) in payload {
        let name = codec::canonical_name(key);
        match name.as_str() {
            "color" | "fill_color" | "fill_opacity" => {
                if fill_added {
                    continue;
                }
                let Some(color) = &color else {
                    return Err(PenpotError::validation(
                        "fill_opacity",
                        "'fill_opacity' needs 'fill_color'",
                    ));
                };
                attributes.push(Attribute::Fills(vec![solid_fill(
                    color,
                    fill_opacity.unwrap_or(1.0),
                )?]));
                fill_added = true;
            }
            _ if value.is_null() => {}
            _ => {
                let attribute = codec::decode_attribute(&name, value, &name).map_err(|e| match e {
                    PenpotError::Format { message, .. } => PenpotError::validation(&name, message),
                    other => other,
                })?;
                attributes.push(attribute);
            }
        }
    }
    Ok(attributes)
}

/// Read access to a payload that accepts snake, kebab and camel case keys.
struct Fields<'p>(&'p Payload);

impl Fields<'_> {
    fn get(&self, field: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(key, value)| !value.is_null() && codec::canonical_name(key) == field)
            .map(|(_, value)| value)
    }

    fn number(&self, field: &str) -> PenpotResult<Option<f64>> {
        self.get(field)
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| PenpotError::validation(field, format!("'{field}' must be a number")))
            })
            .transpose()
    }

    fn require_number(&self, field: &str) -> PenpotResult<f64> {
        self.number(field)?
            .ok_or_else(|| PenpotError::missing_field(field))
    }

    fn string(&self, field: &str) -> PenpotResult<Option<String>> {
        self.get(field)
            .map(|v| {
                v.as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| PenpotError::validation(field, format!("'{field}' must be a string")))
            })
            .transpose()
    }

    fn boolean(&self, field: &str) -> PenpotResult<Option<bool>> {
        self.get(field)
            .map(|v| {
                v.as_bool()
                    .ok_or_else(|| PenpotError::validation(field, format!("'{field}' must be a boolean")))
            })
            .transpose()
    }

    /// Checks required fields in order and names the first one missing.
    fn require(&self, required: &[&str]) -> PenpotResult<()> {
        match required.iter().find(|field| self.get(field).is_none()) {
            Some(field) => Err(PenpotError::missing_field(*field)),
            None => Ok(()),
        }
    }

    fn fills(&self, default_color: Option<&str>) -> PenpotResult<Option<Vec<Fill>>> {
        let color = self.string("fill_color")?;
        let Some(color) = color.as_deref().or(default_color) else {
            return Ok(None);
        };
        let opacity = self.number("fill_opacity")?.unwrap_or(1.0);
        Ok(Some(vec![solid_fill(color, opacity)?]))
    }

    fn strokes(&self, default_width: Option<f64>) -> PenpotResult<Option<Vec<Stroke>>> {
        let Some(color) = self.string("stroke_color")? else {
            return Ok(None);
        };
        let Some(width) = self.number("stroke_width")?.or(default_width) else {
            return Ok(None);
        };
        Ok(Some(vec![stroke(&color, width, "solid", "center")?]))
    }
}

fn build_object(id: Id, kind: &ObjectKind, fields: &Fields<'_>) -> PenpotResult<DesignObject> {
    let mut object = DesignObject::new(id, kind.clone());
    match kind {
        ObjectKind::Rect => {
            fields.require(&["x", "y", "width", "height"])?;
            object.set_geometry(
                fields.require_number("x")?,
                fields.require_number("y")?,
                fields.require_number("width")?,
                fields.require_number("height")?,
            );
            object.fills = fields.fills(Some(DEFAULT_FILL_COLOR))?;
            object.strokes = fields.strokes(None)?;
            let rx = fields.number("rx")?.or(fields.number("radius")?);
            let ry = fields.number("ry")?.or(rx);
            if rx.is_some_and(|r| r > 0.0) || ry.is_some_and(|r| r > 0.0) {
                object.rx = rx;
                object.ry = ry;
            }
        }
        ObjectKind::Circle => {
            fields.require(&["cx", "cy", "radius"])?;
            let cx = fields.require_number("cx")?;
            let cy = fields.require_number("cy")?;
            let radius = fields.require_number("radius")?;
            if radius <= 0.0 {
                return Err(PenpotError::validation("radius", "'radius' must be positive"));
            }
            object.set_geometry(cx - radius, cy - radius, radius * 2.0, radius * 2.0);
            object.fills = fields.fills(Some(DEFAULT_FILL_COLOR))?;
            object.strokes = fields.strokes(None)?;
        }
        ObjectKind::Text => build_text(&mut object, fields)?,
        ObjectKind::Frame => {
            fields.require(&["x", "y", "width", "height"])?;
            object.set_geometry(
                fields.require_number("x")?,
                fields.require_number("y")?,
                fields.require_number("width")?,
                fields.require_number("height")?,
            );
            object.shapes = Some(Vec::new());
            object.fills = match fields.string("background_color")? {
                Some(color) => Some(vec![solid_fill(&color, 1.0)?]),
                None => fields.fills(None)?,
            };
        }
        ObjectKind::Path => build_path(&mut object, fields)?,
        ObjectKind::Bool => {
            fields.require(&["bool_type", "shapes"])?;
            let operation = fields.string("bool_type")?.unwrap_or_default();
            object.bool_type = Some(BoolOperation::parse(&operation).ok_or_else(|| {
                let names: Vec<&str> = BoolOperation::ALL.iter().map(|op| op.as_str()).collect();
                PenpotError::validation(
                    "bool_type",
                    format!("invalid operation '{operation}'; must be one of {}", names.join(", ")),
                )
            })?);
            let shapes = id_list(fields, "shapes")?;
            if shapes.len() < 2 {
                return Err(PenpotError::validation(
                    "shapes",
                    "a boolean shape needs at least two shapes",
                ));
            }
            object.shapes = Some(shapes);
        }
        ObjectKind::Group => {
            object.shapes = Some(match fields.get("shapes") {
                Some(_) => id_list(fields, "shapes")?,
                None => Vec::new(),
            });
        }
        ObjectKind::Other(name) => {
            return Err(PenpotError::validation(
                "kind",
                format!("cannot create objects of kind '{name}'"),
            ));
        }
    }

    object.name = Some(
        fields
            .string("name")?
            .unwrap_or_else(|| default_name(kind).to_string()),
    );
    if let Some(opacity) = fields.number("opacity")? {
        object.opacity = Some(opacity);
    }
    if let Some(rotation) = fields.number("rotation")? {
        object.rotation = Some(rotation);
    }
    if let Some(hidden) = fields.boolean("hidden")? {
        object.hidden = Some(hidden);
    }
    Ok(object)
}

const fn default_name(kind: &ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Rect => "Rectangle",
        ObjectKind::Circle => "Circle",
        ObjectKind::Text => "Text",
        ObjectKind::Frame => "Frame",
        ObjectKind::Path => "Path",
        ObjectKind::Bool => "Boolean",
        ObjectKind::Group | ObjectKind::Other(_) => "Group",
    }
}

fn build_text(object: &mut DesignObject, fields: &Fields<'_>) -> PenpotResult<()> {
    fields.require(&["x", "y"])?;
    let x = fields.require_number("x")?;
    let y = fields.require_number("y")?;
    let font_size = fields.number("font_size")?.unwrap_or(DEFAULT_FONT_SIZE);
    let fills = fields
        .fills(Some(DEFAULT_FILL_COLOR))?
        .unwrap_or_default();

    let content = match (fields.get("content"), fields.string("text")?) {
        (Some(raw), _) => {
            let mut content = codec::decode_text_content(raw, "content").map_err(|e| match e {
                PenpotError::Format { message, .. } => PenpotError::validation("content", message),
                other => other,
            })?;
            if content.paragraph_count() == 0 {
                return Err(PenpotError::validation(
                    "content",
                    "text content needs at least one paragraph",
                ));
            }
            if fields.get("fill_color").is_some() {
                content.fill_all(&fills);
            }
            content
        }
        (None, Some(text)) => {
            let run = TextRun {
                font_family: Some(
                    fields
                        .string("font_family")?
                        .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
                ),
                font_size: Some(format_number(font_size)),
                font_weight: Some(
                    fields
                        .string("font_weight")?
                        .unwrap_or_else(|| "normal".to_string()),
                ),
                ..TextRun::default()
            };
            TextContent::single(&text, run, &fills)
        }
        (None, None) => return Err(PenpotError::missing_field("text")),
    };

    #[allow(clippy::cast_precision_loss)]
    let estimated_width = (content.plain_text().chars().count() as f64 * font_size * 0.6).max(10.0);
    let width = fields.number("width")?.unwrap_or(estimated_width);
    let height = fields.number("height")?.unwrap_or(font_size * 1.5);

    object.set_geometry(x, y, width, height);
    object.fills = Some(fills);
    object.content = Some(Content::Text(content));
    Ok(())
}

fn build_path(object: &mut DesignObject, fields: &Fields<'_>) -> PenpotResult<()> {
    fields.require(&["points"])?;
    let points = fields
        .get("points")
        .and_then(Value::as_array)
        .ok_or_else(|| PenpotError::validation("points", "'points' must be a list of {x, y}"))?
        .iter()
        .map(|p| match (p.get("x").and_then(Value::as_f64), p.get("y").and_then(Value::as_f64)) {
            (Some(x), Some(y)) => Ok(Point { x, y }),
            _ => Err(PenpotError::validation("points", "every point needs numeric x and y")),
        })
        .collect::<PenpotResult<Vec<_>>>()?;
    if points.len() < 2 {
        return Err(PenpotError::validation("points", "a path needs at least two points"));
    }

    let mut commands = Vec::with_capacity(points.len() + 1);
    commands.push(PathCommand::move_to(points[0]));
    commands.extend(points[1..].iter().copied().map(PathCommand::line_to));
    if fields.boolean("closed")?.unwrap_or(true) {
        commands.push(PathCommand::close());
    }

    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    let width = if max_x > min_x { max_x - min_x } else { 1.0 };
    let height = if max_y > min_y { max_y - min_y } else { 1.0 };

    object.set_geometry(min_x, min_y, width, height);
    object.content = Some(Content::Path(commands));
    object.fills = fields.fills(None)?;
    object.strokes = fields.strokes(Some(1.0))?;
    Ok(())
}

fn id_list(fields: &Fields<'_>, field: &str) -> PenpotResult<Vec<Id>> {
    fields
        .get(field)
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(|s| Id::from(s.strip_prefix(codec::UUID_TAG).unwrap_or(s))))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| PenpotError::validation(field, format!("'{field}' must be a list of ids")))
}

/// `16.0` -> `"16"`, `12.5` -> `"12.5"`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

// ==================== Paint helpers ====================

fn check_color(field: &str, color: &str, allow_alpha: bool) -> PenpotResult<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    let valid_len = hex.len() == 6 || hex.len() == 3 || (allow_alpha && hex.len() == 8);
    if valid_len && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        let expected = if allow_alpha { "#RRGGBB or #RRGGBBAA" } else { "#RRGGBB" };
        Err(PenpotError::validation(
            field,
            format!("invalid colour '{color}', expected {expected}"),
        ))
    }
}

fn check_unit(field: &str, value: f64) -> PenpotResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PenpotError::validation(
            field,
            format!("'{field}' must be between 0.0 and 1.0, got {value}"),
        ))
    }
}

fn check_choice(field: &str, value: &str, allowed: &[&str]) -> PenpotResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(PenpotError::validation(
            field,
            format!("invalid {field} '{value}'; must be one of {}", allowed.join(", ")),
        ))
    }
}

/// A solid fill.
///
/// # Errors
///
/// Returns a validation error for a malformed colour or an opacity outside 0..=1.
pub fn solid_fill(color: &str, opacity: f64) -> PenpotResult<Fill> {
    check_color("fill_color", color, false)?;
    check_unit("fill_opacity", opacity)?;
    Ok(Fill::solid(color, opacity))
}

/// A gradient fill whose direction is given as an angle in degrees.
///
/// 0 runs left to right, 90 top to bottom.
///
/// # Errors
///
/// Returns a validation error for an unknown gradient type or malformed colour.
pub fn gradient_fill(
    gradient_type: &str,
    start_color: &str,
    end_color: &str,
    angle: f64,
) -> PenpotResult<Fill> {
    let kind = match gradient_type {
        "linear" | "linear-gradient" => GradientKind::Linear,
        "radial" | "radial-gradient" => GradientKind::Radial,
        other => {
            return Err(PenpotError::validation(
                "gradient_type",
                format!("invalid gradient_type '{other}'; must be one of linear, radial"),
            ));
        }
    };
    check_color("start_color", start_color, false)?;
    check_color("end_color", end_color, false)?;

    let (sin, cos) = angle.to_radians().sin_cos();
    Ok(Fill {
        gradient: Some(Gradient {
            kind,
            start_color: start_color.to_string(),
            end_color: end_color.to_string(),
            start_x: 0.5 - 0.5 * cos,
            start_y: 0.5 - 0.5 * sin,
            end_x: 0.5 + 0.5 * cos,
            end_y: 0.5 + 0.5 * sin,
        }),
        ..Fill::default()
    })
}

/// A stroke.
///
/// # Errors
///
/// Returns a validation error for a malformed colour, a negative width or an
/// unknown style or alignment.
pub fn stroke(color: &str, width: f64, style: &str, alignment: &str) -> PenpotResult<Stroke> {
    check_color("stroke_color", color, false)?;
    if width < 0.0 {
        return Err(PenpotError::validation("stroke_width", "'stroke_width' must not be negative"));
    }
    check_choice("style", style, &STROKE_STYLES)?;
    check_choice("alignment", alignment, &STROKE_ALIGNMENTS)?;
    Ok(Stroke {
        color: Some(color.to_string()),
        opacity: Some(1.0),
        width: Some(width),
        style: Some(style.to_string()),
        alignment: Some(alignment.to_string()),
        ..Stroke::default()
    })
}

/// A drop shadow.
///
/// # Errors
///
/// Returns a validation error for a malformed colour or a negative blur.
pub fn drop_shadow(
    color: &str,
    offset_x: f64,
    offset_y: f64,
    blur: f64,
    spread: f64,
) -> PenpotResult<Shadow> {
    check_color("color", color, true)?;
    if blur < 0.0 {
        return Err(PenpotError::validation("blur", "'blur' must not be negative"));
    }
    Ok(Shadow {
        style: Some("drop-shadow".to_string()),
        color: Some(color.to_string()),
        offset_x: Some(offset_x),
        offset_y: Some(offset_y),
        blur: Some(blur),
        spread: Some(spread),
        hidden: Some(false),
        ..Shadow::default()
    })
}

/// A blur effect.
///
/// # Errors
///
/// Returns a validation error for an unknown blur type or negative value.
pub fn blur(blur_type: &str, value: f64) -> PenpotResult<Blur> {
    check_choice("blur_type", blur_type, &BLUR_TYPES)?;
    if value < 0.0 {
        return Err(PenpotError::validation("value", "'value' must not be negative"));
    }
    Ok(Blur {
        kind: Some(blur_type.to_string()),
        value: Some(value),
        hidden: Some(false),
        ..Blur::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penpot::model::Page;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn page() -> Id {
        Id::from("page-1")
    }

    #[test]
    fn rectangle_without_width_names_width() {
        let mut builder = ChangeListBuilder::new();
        let err = builder
            .build_add(&payload(json!({"kind": "rectangle", "x": 0, "y": 0, "height": 5})), &page(), None)
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "width"));
    }

    #[test]
    fn first_missing_field_is_reported() {
        let mut builder = ChangeListBuilder::new();
        let err = builder
            .build_add(&payload(json!({"kind": "rect"})), &page(), None)
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "x"));
    }

    #[test]
    fn rectangle_gets_defaults_and_root_placement() {
        let mut builder = ChangeListBuilder::new();
        let change = builder
            .build_add(
                &payload(json!({"kind": "rect", "x": 10, "y": 20, "width": 30, "height": 40})),
                &page(),
                None,
            )
            .unwrap();
        let Change::AddObject {
            parent_id,
            frame_id,
            object,
            ..
        } = change
        else {
            panic!("expected add-obj");
        };
        assert!(parent_id.is_root_frame());
        assert!(frame_id.is_root_frame());
        assert_eq!(object.name.as_deref(), Some("Rectangle"));
        assert_eq!(object.fills, Some(vec![Fill::solid("#000000", 1.0)]));
        assert_eq!(object.points.as_ref().map(Vec::len), Some(4));
        assert_eq!(object.selrect.map(|r| r.x2), Some(40.0));
    }

    #[test]
    fn circle_is_positioned_by_corner() {
        let mut builder = ChangeListBuilder::new();
        let change = builder
            .build_add(
                &payload(json!({"kind": "ellipse", "cx": 50, "cy": 60, "radius": 10})),
                &page(),
                None,
            )
            .unwrap();
        let Change::AddObject { object, .. } = change else {
            panic!("expected add-obj");
        };
        assert_eq!(object.kind, ObjectKind::Circle);
        assert_eq!((object.x, object.y), (Some(40.0), Some(50.0)));
        assert_eq!((object.width, object.height), (Some(20.0), Some(20.0)));
    }

    #[test]
    fn text_estimates_size_and_fills_every_level() {
        let mut builder = ChangeListBuilder::new();
        let change = builder
            .build_add(
                &payload(json!({"kind": "text", "x": 0, "y": 0, "text": "Hello", "fill_color": "#FF0000"})),
                &page(),
                None,
            )
            .unwrap();
        let Change::AddObject { object, .. } = change else {
            panic!("expected add-obj");
        };
        assert!((object.width.unwrap() - 48.0).abs() < 1e-9);
        assert!((object.height.unwrap() - 24.0).abs() < 1e-9);
        let content = object.text_content().unwrap();
        let red = Some(vec![Fill::solid("#FF0000", 1.0)]);
        assert_eq!(content.fills, red);
        assert_eq!(content.children[0].fills, red);
        assert_eq!(content.children[0].children[0].fills, red);
        let run = &content.children[0].children[0].children[0];
        assert_eq!(run.fills, red);
        assert_eq!(run.font_size.as_deref(), Some("16"));
        assert_eq!(run.font_family.as_deref(), Some("Work Sans"));
    }

    #[test]
    fn text_without_text_or_content_names_text() {
        let mut builder = ChangeListBuilder::new();
        let err = builder
            .build_add(&payload(json!({"kind": "text", "x": 0, "y": 0})), &page(), None)
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "text"));
    }

    #[test]
    fn path_needs_two_points_and_closes_by_default() {
        let mut builder = ChangeListBuilder::new();
        let err = builder
            .build_add(&payload(json!({"kind": "path", "points": [{"x": 0, "y": 0}]})), &page(), None)
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "points"));

        let change = builder
            .build_add(
                &payload(json!({"kind": "path", "points": [{"x": 0, "y": 0}, {"x": 10, "y": 0}]})),
                &page(),
                None,
            )
            .unwrap();
        let Change::AddObject { object, .. } = change else {
            panic!("expected add-obj");
        };
        let Some(Content::Path(commands)) = &object.content else {
            panic!("expected path content");
        };
        let names: Vec<&str> = commands.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(names, ["M", "L", "Z"]);
        assert_eq!(object.height, Some(1.0));
    }

    #[test]
    fn bool_validates_operation_and_shapes() {
        let mut builder = ChangeListBuilder::new();
        let err = builder
            .build_add(
                &payload(json!({"kind": "bool", "bool_type": "merge", "shapes": ["a", "b"]})),
                &page(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "bool_type"));

        let err = builder
            .build_add(
                &payload(json!({"kind": "bool", "bool_type": "union", "shapes": ["a"]})),
                &page(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "shapes"));
    }

    #[test]
    fn modify_without_snapshot_is_one_assign() {
        let mut builder = ChangeListBuilder::new();
        let change = builder
            .build_modify(&Id::from("obj"), &payload(json!({"x": 5, "name": "Moved"})))
            .unwrap();
        let Change::ModifyObject { operations, page_id, .. } = change else {
            panic!("expected mod-obj");
        };
        assert!(page_id.is_none());
        assert_eq!(
            operations,
            vec![AttrOperation::Assign(vec![
                Attribute::X(5.0),
                Attribute::Name("Moved".to_string())
            ])]
        );
    }

    #[test]
    fn modify_rejects_wrong_types() {
        let mut builder = ChangeListBuilder::new();
        let err = builder
            .build_modify(&Id::from("obj"), &payload(json!({"width": "wide"})))
            .unwrap_err();
        assert!(matches!(err, PenpotError::Validation { ref field, .. } if field == "width"));
    }

    fn file_with_text() -> File {
        let page_id = Id::from("p1");
        let mut page = Page::new(page_id.clone(), "Page 1");
        let mut text = DesignObject::new(Id::from("t1"), ObjectKind::Text);
        text.parent_id = Some(Id::root_frame());
        text.set_geometry(0.0, 0.0, 100.0, 20.0);
        text.content = Some(Content::Text(TextContent::single(
            "Hi",
            TextRun::default(),
            &[Fill::solid("#000000", 1.0)],
        )));
        page.objects.insert(text.id.clone(), text);
        let mut file = File::new(Id::from("f1"), "File");
        file.pages.insert(page_id, page);
        file
    }

    #[test]
    fn text_color_change_rewrites_content() {
        let file = file_with_text();
        let mut builder = ChangeListBuilder::with_snapshot(&file);
        let change = builder
            .build_modify(&Id::from("t1"), &payload(json!({"fill_color": "#00FF00"})))
            .unwrap();
        let Change::ModifyObject { operations, page_id, .. } = change else {
            panic!("expected mod-obj");
        };
        assert_eq!(page_id, Some(Id::from("p1")));
        assert_eq!(operations.len(), 3);
        let AttrOperation::Set(Attribute::Content(Content::Text(content))) = &operations[0] else {
            panic!("expected content first");
        };
        let green = Some(vec![Fill::solid("#00FF00", 1.0)]);
        assert_eq!(content.children[0].children[0].children[0].fills, green);
        assert_eq!(operations[2], AttrOperation::Set(Attribute::PositionData(None)));
    }

    #[test]
    fn geometry_change_refreshes_selrect() {
        let file = file_with_text();
        let mut builder = ChangeListBuilder::with_snapshot(&file);
        let change = builder
            .build_modify(&Id::from("t1"), &payload(json!({"x": 50})))
            .unwrap();
        let Change::ModifyObject { operations, .. } = change else {
            panic!("expected mod-obj");
        };
        let attrs = operations[0].attributes();
        assert!(attrs.contains(&Attribute::Selrect(Selrect::from_bounds(50.0, 0.0, 100.0, 20.0))));
    }

    #[test]
    fn unknown_object_with_snapshot_is_not_found() {
        let file = file_with_text();
        let mut builder = ChangeListBuilder::with_snapshot(&file);
        let err = builder
            .build_modify(&Id::from("missing"), &payload(json!({"x": 1})))
            .unwrap_err();
        assert!(matches!(err, PenpotError::ObjectNotFound { .. }));
    }

    #[test]
    fn delete_resolves_page_from_snapshot() {
        let file = file_with_text();
        let mut builder = ChangeListBuilder::with_snapshot(&file);
        let change = builder.build_delete(&Id::from("t1"), None).unwrap();
        assert_eq!(
            change,
            Change::DeleteObject {
                id: Id::from("t1"),
                page_id: Id::from("p1")
            }
        );
        assert!(builder.build_delete(&Id::root_frame(), Some(&page())).is_err());
    }

    #[test]
    fn child_of_group_inherits_group_frame() {
        let mut builder = ChangeListBuilder::new();
        builder
            .build_add(&payload(json!({"kind": "frame", "id": "fr", "x": 0, "y": 0, "width": 10, "height": 10})), &page(), None)
            .unwrap();
        builder
            .build_add(&payload(json!({"kind": "group", "id": "g"})), &page(), Some(&Id::from("fr")))
            .unwrap();
        let change = builder
            .build_add(
                &payload(json!({"kind": "rect", "x": 0, "y": 0, "width": 1, "height": 1})),
                &page(),
                Some(&Id::from("g")),
            )
            .unwrap();
        let Change::AddObject { parent_id, frame_id, .. } = change else {
            panic!("expected add-obj");
        };
        assert_eq!(parent_id, Id::from("g"));
        assert_eq!(frame_id, Id::from("fr"));
    }

    #[test]
    fn paint_helpers_validate() {
        assert!(solid_fill("#FFF", 0.5).is_ok());
        assert!(solid_fill("red", 1.0).is_err());
        assert!(solid_fill("#FF0000", 1.5).is_err());
        assert!(stroke("#000000", 2.0, "wavy", "center").is_err());
        assert!(drop_shadow("#00000080", 2.0, 2.0, 4.0, 0.0).is_ok());
        assert!(blur("motion-blur", 4.0).is_err());

        let fill = gradient_fill("linear", "#FF0000", "#0000FF", 0.0).unwrap();
        let gradient = fill.gradient.unwrap();
        assert!((gradient.start_x - 0.0).abs() < 1e-9);
        assert!((gradient.end_x - 1.0).abs() < 1e-9);
        assert!((gradient.start_y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn intents_deserialize_from_tool_arguments() {
        let intent: Intent = serde_json::from_value(json!({
            "action": "add",
            "page_id": "p1",
            "payload": {"kind": "rect", "x": 0, "y": 0, "width": 1, "height": 1}
        }))
        .unwrap();
        assert!(matches!(intent, Intent::Add { parent_id: None, .. }));

        let intent: Intent =
            serde_json::from_value(json!({"action": "delete", "object_id": "o1"})).unwrap();
        assert_eq!(
            intent,
            Intent::Delete {
                object_id: Id::from("o1"),
                page_id: None
            }
        );
    }
}
