//! Canonical representation of Penpot design data.
//!
//! Everything here is casing-free and untagged. The wire forms are produced
//! and consumed only by [`crate::penpot::codec`].

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::penpot::codec::canonical_name;
use crate::penpot::error::{PenpotError, PenpotResult};

/// Free-form fields preserved across a decode/encode round trip.
pub type Extra = Map<String, Value>;

/// A Penpot identifier (UUID string, without any wire prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// The root frame every page contains.
    pub const ROOT_FRAME: &'static str = "00000000-0000-0000-0000-000000000000";

    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The page root frame id.
    #[must_use]
    pub fn root_frame() -> Self {
        Self(Self::ROOT_FRAME.to_string())
    }

    /// Returns true for the page root frame.
    #[must_use]
    pub fn is_root_frame(&self) -> bool {
        self.0 == Self::ROOT_FRAME
    }

    /// Borrows the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Shape kind of a design object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Rectangle.
    Rect,
    /// Circle or ellipse.
    Circle,
    /// Text box with a content tree.
    Text,
    /// Frame (board).
    Frame,
    /// Vector path.
    Path,
    /// Boolean combination of other shapes.
    Bool,
    /// Group.
    Group,
    /// Any other kind found in a real file (image, svg-raw, ...).
    Other(String),
}

impl ObjectKind {
    /// Name used in the `type` field on the wire.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Text => "text",
            Self::Frame => "frame",
            Self::Path => "path",
            Self::Bool => "bool",
            Self::Group => "group",
            Self::Other(name) => name,
        }
    }

    /// Parses a wire `type` value (without prefix).
    #[must_use]
    pub fn from_wire(name: &str) -> Self {
        match name {
            "rect" => Self::Rect,
            "circle" => Self::Circle,
            "text" => Self::Text,
            "frame" => Self::Frame,
            "path" => Self::Path,
            "bool" => Self::Bool,
            "group" => Self::Group,
            other => Self::Other(other.to_string()),
        }
    }

    /// Parses the friendlier names accepted in intents.
    #[must_use]
    pub fn from_intent(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rect" | "rectangle" => Some(Self::Rect),
            "circle" | "ellipse" => Some(Self::Circle),
            "text" => Some(Self::Text),
            "frame" | "board" | "artboard" => Some(Self::Frame),
            "path" => Some(Self::Path),
            "bool" | "boolean" => Some(Self::Bool),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    /// Kinds that own a child shape list.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Frame | Self::Group | Self::Bool)
    }
}

/// Boolean operation of a `bool` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperation {
    /// Combine shapes.
    Union,
    /// Subtract later shapes from the first.
    Difference,
    /// Keep the overlap.
    Intersection,
    /// Keep the non-overlapping areas.
    Exclusion,
}

impl BoolOperation {
    /// All operations, in documentation order.
    pub const ALL: [Self; 4] = [
        Self::Union,
        Self::Difference,
        Self::Intersection,
        Self::Exclusion,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::Difference => "difference",
            Self::Intersection => "intersection",
            Self::Exclusion => "exclusion",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// Selection rectangle (axis-aligned bounding box).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selrect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Top-left corner; equals (`x`, `y`).
    pub x1: f64,
    pub y1: f64,
    /// Bottom-right corner, (`x + width`, `y + height`).
    pub x2: f64,
    pub y2: f64,
}

impl Selrect {
    /// Builds the box for the given origin and size.
    #[must_use]
    pub fn from_bounds(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    /// Corner points, clockwise from top-left.
    #[must_use]
    pub fn corners(&self) -> Vec<Point> {
        vec![
            Point { x: self.x1, y: self.y1 },
            Point { x: self.x2, y: self.y1 },
            Point { x: self.x2, y: self.y2 },
            Point { x: self.x1, y: self.y2 },
        ]
    }
}

/// 2D affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Horizontal scale.
    pub a: f64,
    /// Vertical shear.
    pub b: f64,
    /// Horizontal shear.
    pub c: f64,
    /// Vertical scale.
    pub d: f64,
    /// Horizontal translation.
    pub e: f64,
    /// Vertical translation.
    pub f: f64,
}

impl Matrix {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };
}

/// Linear or radial gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientKind {
    Linear,
    Radial,
}

impl GradientKind {
    /// Wire `type` of a gradient fill.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Linear => "linear-gradient",
            Self::Radial => "radial-gradient",
        }
    }

    /// Parses a wire `type` value.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "linear-gradient" => Some(Self::Linear),
            "radial-gradient" => Some(Self::Radial),
            _ => None,
        }
    }
}

/// Gradient parameters; positions are relative to the shape (0.0 to 1.0).
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub kind: GradientKind,
    /// Colour at the start point (`#RRGGBB`).
    pub start_color: String,
    /// Colour at the end point (`#RRGGBB`).
    pub end_color: String,
    pub start_x: f64,
    pub start_y: f64,
    /// For radial gradients the end point sets the radius.
    pub end_x: f64,
    pub end_y: f64,
}

/// One entry of a fill list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fill {
    /// Solid colour (`#RRGGBB`).
    pub color: Option<String>,
    /// Fill opacity.
    pub opacity: Option<f64>,
    /// Gradient, when the fill is not solid.
    pub gradient: Option<Gradient>,
    /// Unrecognised fields.
    pub extra: Extra,
}

impl Fill {
    /// A solid fill.
    pub fn solid(color: impl Into<String>, opacity: f64) -> Self {
        Self {
            color: Some(color.into()),
            opacity: Some(opacity),
            ..Self::default()
        }
    }
}

/// One entry of a stroke list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    /// Stroke colour (`#RRGGBB`).
    pub color: Option<String>,
    /// Stroke opacity.
    pub opacity: Option<f64>,
    /// Line width in canvas units.
    pub width: Option<f64>,
    /// `solid`, `dashed`, `dotted` or `mixed`.
    pub style: Option<String>,
    /// `center`, `inner` or `outer`.
    pub alignment: Option<String>,
    /// Unrecognised fields, such as caps and joins.
    pub extra: Extra,
}

/// One entry of a shadow list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shadow {
    /// `drop-shadow` or `inner-shadow`.
    pub style: Option<String>,
    /// Colour with optional alpha (`#RRGGBBAA`).
    pub color: Option<String>,
    pub offset_x: Option<f64>,
    pub offset_y: Option<f64>,
    pub blur: Option<f64>,
    pub spread: Option<f64>,
    pub hidden: Option<bool>,
    pub extra: Extra,
}

/// Blur effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blur {
    /// `layer-blur` or `background-blur`.
    pub kind: Option<String>,
    pub value: Option<f64>,
    pub hidden: Option<bool>,
    pub extra: Extra,
}

/// Root of a text content tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextContent {
    pub children: Vec<ParagraphSet>,
    pub fills: Option<Vec<Fill>>,
    pub extra: Extra,
}

/// Second level of a text content tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphSet {
    pub children: Vec<Paragraph>,
    pub fills: Option<Vec<Fill>>,
    pub extra: Extra,
}

/// A paragraph of text runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub children: Vec<TextRun>,
    pub fills: Option<Vec<Fill>>,
    pub extra: Extra,
}

/// A leaf run of styled text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font_family: Option<String>,
    /// Font size, kept as a string like the platform does.
    pub font_size: Option<String>,
    pub font_weight: Option<String>,
    pub fills: Option<Vec<Fill>>,
    pub extra: Extra,
}

impl TextContent {
    /// A single-paragraph tree holding `text` with the same fills at every level.
    #[must_use]
    pub fn single(text: &str, run: TextRun, fills: &[Fill]) -> Self {
        let run = TextRun {
            text: text.to_string(),
            fills: Some(fills.to_vec()),
            ..run
        };
        Self {
            children: vec![ParagraphSet {
                children: vec![Paragraph {
                    children: vec![run],
                    fills: Some(fills.to_vec()),
                    extra: Extra::new(),
                }],
                fills: Some(fills.to_vec()),
                extra: Extra::new(),
            }],
            fills: Some(fills.to_vec()),
            extra: Extra::new(),
        }
    }

    /// Number of paragraphs across all paragraph sets.
    #[must_use]
    pub fn paragraph_count(&self) -> usize {
        self.children.iter().map(|set| set.children.len()).sum()
    }

    /// Overwrites the fill list at every level of the tree.
    ///
    /// The platform does not inherit fills between levels, so each node gets
    /// its own copy.
    pub fn fill_all(&mut self, fills: &[Fill]) {
        self.fills = Some(fills.to_vec());
        for set in &mut self.children {
            set.fills = Some(fills.to_vec());
            for paragraph in &mut set.children {
                paragraph.fills = Some(fills.to_vec());
                for run in &mut paragraph.children {
                    run.fills = Some(fills.to_vec());
                }
            }
        }
    }

    /// Concatenated text of all runs, paragraphs separated by newlines.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.children
            .iter()
            .flat_map(|set| set.children.iter())
            .map(|p| p.children.iter().map(|r| r.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One path segment command.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    /// SVG-style command letter (`M`, `L`, `C`, `Z`).
    pub command: String,
    /// Command parameters (`x`, `y`, `c1x`, ...).
    pub params: IndexMap<String, f64>,
}

impl PathCommand {
    /// Move-to command.
    #[must_use]
    pub fn move_to(point: Point) -> Self {
        Self::with_point("M", point)
    }

    /// Line-to command.
    #[must_use]
    pub fn line_to(point: Point) -> Self {
        Self::with_point("L", point)
    }

    /// Close-path command.
    #[must_use]
    pub fn close() -> Self {
        Self {
            command: "Z".to_string(),
            params: IndexMap::new(),
        }
    }

    fn with_point(command: &str, point: Point) -> Self {
        let mut params = IndexMap::new();
        params.insert("x".to_string(), point.x);
        params.insert("y".to_string(), point.y);
        Self {
            command: command.to_string(),
            params,
        }
    }
}

/// Kind-specific content of a design object.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Text content tree.
    Text(TextContent),
    /// Path segments.
    Path(Vec<PathCommand>),
    /// Content of any other shape, kept verbatim.
    Raw(Value),
}

/// A typed shape record.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignObject {
    pub id: Id,
    pub kind: ObjectKind,
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub selrect: Option<Selrect>,
    pub points: Option<Vec<Point>>,
    pub transform: Option<Matrix>,
    pub transform_inverse: Option<Matrix>,
    pub parent_id: Option<Id>,
    pub frame_id: Option<Id>,
    /// Child shapes (frames, groups and booleans).
    pub shapes: Option<Vec<Id>>,
    pub fills: Option<Vec<Fill>>,
    pub strokes: Option<Vec<Stroke>>,
    pub shadows: Option<Vec<Shadow>>,
    pub blur: Option<Blur>,
    pub opacity: Option<f64>,
    pub hidden: Option<bool>,
    pub rx: Option<f64>,
    pub ry: Option<f64>,
    pub bool_type: Option<BoolOperation>,
    pub content: Option<Content>,
    /// Unrecognised fields, re-emitted verbatim.
    pub extra: Extra,
}

impl DesignObject {
    /// An object with only its id and kind set.
    #[must_use]
    pub fn new(id: Id, kind: ObjectKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            x: None,
            y: None,
            width: None,
            height: None,
            rotation: None,
            selrect: None,
            points: None,
            transform: None,
            transform_inverse: None,
            parent_id: None,
            frame_id: None,
            shapes: None,
            fills: None,
            strokes: None,
            shadows: None,
            blur: None,
            opacity: None,
            hidden: None,
            rx: None,
            ry: None,
            bool_type: None,
            content: None,
            extra: Extra::new(),
        }
    }

    /// Sets position and size plus the derived selection rectangle,
    /// corner points and identity transforms.
    pub fn set_geometry(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let selrect = Selrect::from_bounds(x, y, width, height);
        self.x = Some(x);
        self.y = Some(y);
        self.width = Some(width);
        self.height = Some(height);
        self.points = Some(selrect.corners());
        self.selrect = Some(selrect);
        self.transform = Some(Matrix::IDENTITY);
        self.transform_inverse = Some(Matrix::IDENTITY);
    }

    /// The text content tree, if this is a text object with content.
    #[must_use]
    pub const fn text_content(&self) -> Option<&TextContent> {
        match &self.content {
            Some(Content::Text(content)) => Some(content),
            _ => None,
        }
    }

    /// Applies one attribute change in place.
    pub fn apply(&mut self, attribute: &Attribute) {
        match attribute {
            Attribute::X(v) => self.x = Some(*v),
            Attribute::Y(v) => self.y = Some(*v),
            Attribute::Width(v) => self.width = Some(*v),
            Attribute::Height(v) => self.height = Some(*v),
            Attribute::Rotation(v) => self.rotation = Some(*v),
            Attribute::Opacity(v) => self.opacity = Some(*v),
            Attribute::Name(v) => self.name = Some(v.clone()),
            Attribute::Hidden(v) => self.hidden = Some(*v),
            Attribute::ParentId(v) => self.parent_id = Some(v.clone()),
            Attribute::FrameId(v) => self.frame_id = Some(v.clone()),
            Attribute::Fills(v) => self.fills = Some(v.clone()),
            Attribute::Strokes(v) => self.strokes = Some(v.clone()),
            Attribute::Shadows(v) => self.shadows = Some(v.clone()),
            Attribute::Blur(v) => self.blur.clone_from(v),
            Attribute::Content(v) => self.content = Some(v.clone()),
            Attribute::Selrect(v) => self.selrect = Some(*v),
            Attribute::Points(v) => self.points = Some(v.clone()),
            Attribute::Shapes(v) => self.shapes = Some(v.clone()),
            Attribute::PositionData(v) => self.set_extra("position_data", v.clone()),
            Attribute::Other { name, value } => {
                self.set_extra(name, Some(value.clone()).filter(|v| !v.is_null()));
            }
        }
    }

    /// Replaces a pass-through field whatever casing it was decoded with.
    /// `None` removes it. An existing key keeps its wire form.
    fn set_extra(&mut self, name: &str, value: Option<Value>) {
        let field = canonical_name(name);
        let existing = self.extra.keys().find(|key| canonical_name(key) == field).cloned();
        self.extra.retain(|key, _| canonical_name(key) != field);
        if let Some(value) = value {
            let key = existing.unwrap_or_else(|| field.replace('_', "-"));
            self.extra.insert(key, value);
        }
    }
}

/// One attribute of a design object, as carried by a modify operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    X(f64),
    Y(f64),
    Width(f64),
    Height(f64),
    Rotation(f64),
    Opacity(f64),
    Name(String),
    Hidden(bool),
    ParentId(Id),
    FrameId(Id),
    Fills(Vec<Fill>),
    Strokes(Vec<Stroke>),
    Shadows(Vec<Shadow>),
    /// `None` removes the blur.
    Blur(Option<Blur>),
    Content(Content),
    Selrect(Selrect),
    Points(Vec<Point>),
    Shapes(Vec<Id>),
    /// Cached text layout; `None` clears it so the platform recomputes it.
    PositionData(Option<Value>),
    /// Any other attribute, by canonical (snake case) name.
    Other {
        name: String,
        value: Value,
    },
}

impl Attribute {
    /// Canonical (snake case) attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::X(_) => "x",
            Self::Y(_) => "y",
            Self::Width(_) => "width",
            Self::Height(_) => "height",
            Self::Rotation(_) => "rotation",
            Self::Opacity(_) => "opacity",
            Self::Name(_) => "name",
            Self::Hidden(_) => "hidden",
            Self::ParentId(_) => "parent_id",
            Self::FrameId(_) => "frame_id",
            Self::Fills(_) => "fills",
            Self::Strokes(_) => "strokes",
            Self::Shadows(_) => "shadows",
            Self::Blur(_) => "blur",
            Self::Content(_) => "content",
            Self::Selrect(_) => "selrect",
            Self::Points(_) => "points",
            Self::Shapes(_) => "shapes",
            Self::PositionData(_) => "position_data",
            Self::Other { name, .. } => name,
        }
    }

    /// Paint attributes that text objects must also carry in their content tree.
    #[must_use]
    pub const fn is_paint(&self) -> bool {
        matches!(self, Self::Fills(_))
    }

    /// Attributes that move or resize the object.
    #[must_use]
    pub const fn is_geometry(&self) -> bool {
        matches!(self, Self::X(_) | Self::Y(_) | Self::Width(_) | Self::Height(_))
    }
}

/// Attribute-level operation inside a modify change.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrOperation {
    /// Set a single attribute.
    Set(Attribute),
    /// Set several attributes at once.
    Assign(Vec<Attribute>),
}

impl AttrOperation {
    /// Attributes touched by this operation.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        match self {
            Self::Set(attribute) => std::slice::from_ref(attribute),
            Self::Assign(attributes) => attributes,
        }
    }
}

/// One typed mutation in an update batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// `add-obj`.
    AddObject {
        id: Id,
        page_id: Id,
        frame_id: Id,
        parent_id: Id,
        object: DesignObject,
    },
    /// `mod-obj`.
    ModifyObject {
        id: Id,
        page_id: Option<Id>,
        operations: Vec<AttrOperation>,
    },
    /// `del-obj`.
    DeleteObject { id: Id, page_id: Id },
}

impl Change {
    /// Wire `type` of the change.
    #[must_use]
    pub const fn wire_type(&self) -> &'static str {
        match self {
            Self::AddObject { .. } => "add-obj",
            Self::ModifyObject { .. } => "mod-obj",
            Self::DeleteObject { .. } => "del-obj",
        }
    }

    /// Id of the object the change targets.
    #[must_use]
    pub const fn object_id(&self) -> &Id {
        match self {
            Self::AddObject { id, .. }
            | Self::ModifyObject { id, .. }
            | Self::DeleteObject { id, .. } => id,
        }
    }
}

/// Body of an `update-file` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub file_id: Id,
    pub session_id: Id,
    pub revision: u64,
    /// Opaque version counter, passed through unchanged.
    pub version: Option<Value>,
    pub changes: Vec<Change>,
}

/// An ordered container of design objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: Id,
    pub name: Option<String>,
    pub objects: IndexMap<Id, DesignObject>,
    pub extra: Extra,
}

impl Page {
    /// An empty page holding only the root frame.
    #[must_use]
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        let root_id = Id::root_frame();
        let mut root = DesignObject::new(root_id.clone(), ObjectKind::Frame);
        root.name = Some("Root Frame".to_string());
        root.parent_id = Some(root_id.clone());
        root.frame_id = Some(root_id.clone());
        root.shapes = Some(Vec::new());
        root.set_geometry(0.0, 0.0, 0.01, 0.01);

        let mut objects = IndexMap::new();
        objects.insert(root_id, root);
        Self {
            id,
            name: Some(name.into()),
            objects,
            extra: Extra::new(),
        }
    }

    /// Checks that every object has one existing parent and that no
    /// parent chain loops.
    ///
    /// # Errors
    ///
    /// Returns a format error naming the first offending object.
    pub fn validate_tree(&self) -> PenpotResult<()> {
        for (id, object) in &self.objects {
            if id.is_root_frame() {
                continue;
            }
            let Some(parent) = &object.parent_id else {
                return Err(PenpotError::format(
                    format!("objects.{id}.parent-id"),
                    "object has no parent",
                ));
            };
            if !self.objects.contains_key(parent) {
                return Err(PenpotError::format(
                    format!("objects.{id}.parent-id"),
                    format!("parent {parent} does not exist"),
                ));
            }

            let mut current = parent;
            let mut steps = 0;
            while !current.is_root_frame() {
                if current == id || steps > self.objects.len() {
                    return Err(PenpotError::format(
                        format!("objects.{id}.parent-id"),
                        "parent chain contains a cycle",
                    ));
                }
                steps += 1;
                match self.objects.get(current).and_then(|o| o.parent_id.as_ref()) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Ids of `root` and everything below it, parents first.
    #[must_use]
    pub fn descendants(&self, root: &Id) -> Vec<Id> {
        let mut out = vec![root.clone()];
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            for (id, object) in &self.objects {
                if id != &current && object.parent_id.as_ref() == Some(&current) {
                    out.push(id.clone());
                }
            }
            i += 1;
        }
        out
    }
}

/// A design file: pages plus revision bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub id: Id,
    pub name: Option<String>,
    pub project_id: Option<Id>,
    /// Server revision used for optimistic concurrency.
    pub revision: u64,
    /// Opaque version counter (`vern`).
    pub version: Option<Value>,
    pub pages: IndexMap<Id, Page>,
    /// Unrecognised top-level fields.
    pub extra: Extra,
    /// Unrecognised fields of the `data` section (components, colours, ...).
    pub data_extra: Extra,
}

impl File {
    /// An empty file at revision 0.
    #[must_use]
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            project_id: None,
            revision: 0,
            version: None,
            pages: IndexMap::new(),
            extra: Extra::new(),
            data_extra: Extra::new(),
        }
    }

    /// Finds an object and the page holding it.
    #[must_use]
    pub fn find_object(&self, object_id: &Id) -> Option<(&Page, &DesignObject)> {
        self.pages
            .values()
            .find_map(|page| page.objects.get(object_id).map(|object| (page, object)))
    }

    /// Total number of objects across pages.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.pages.values().map(|p| p.objects.len()).sum()
    }
}
