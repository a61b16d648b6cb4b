//! Codec properties: round-trips per shape kind, casing tolerance,
//! numeric normalisation and recursive text fills.

use serde_json::{json, Number, Value};

use penpot_mcp::penpot::changes::{build_modify_for, solid_fill};
use penpot_mcp::penpot::codec::{self, Dialect};
use penpot_mcp::penpot::model::{
    Attribute, Blur, BoolOperation, Content, DesignObject, Fill, Gradient, GradientKind, Id,
    Matrix, ObjectKind, PathCommand, Point, Shadow, Stroke, TextContent, TextRun,
};

const KINDS: [ObjectKind; 7] = [
    ObjectKind::Rect,
    ObjectKind::Circle,
    ObjectKind::Text,
    ObjectKind::Frame,
    ObjectKind::Path,
    ObjectKind::Bool,
    ObjectKind::Group,
];

fn bare(kind: &ObjectKind) -> DesignObject {
    DesignObject::new(Id::from("7f1e2d3c-0000-4000-8000-000000000001"), kind.clone())
}

/// An object of `kind` with every optional field populated.
fn populated(kind: &ObjectKind) -> DesignObject {
    let mut object = bare(kind);
    object.name = Some(format!("{} sample", kind.wire_name()));
    object.set_geometry(12.5, 40.0, 200.0, 80.25);
    object.rotation = Some(15.0);
    object.transform = Some(Matrix::IDENTITY);
    object.transform_inverse = Some(Matrix::IDENTITY);
    object.parent_id = Some(Id::root_frame());
    object.frame_id = Some(Id::root_frame());
    object.fills = Some(vec![
        Fill::solid("#336699", 0.5),
        Fill {
            gradient: Some(Gradient {
                kind: GradientKind::Linear,
                start_color: "#FFFFFF".to_string(),
                end_color: "#000000".to_string(),
                start_x: 0.0,
                start_y: 0.5,
                end_x: 1.0,
                end_y: 0.5,
            }),
            opacity: Some(1.0),
            ..Fill::default()
        },
    ]);
    object.strokes = Some(vec![Stroke {
        color: Some("#111111".to_string()),
        opacity: Some(1.0),
        width: Some(2.0),
        style: Some("dashed".to_string()),
        alignment: Some("inner".to_string()),
        ..Stroke::default()
    }]);
    object.shadows = Some(vec![Shadow {
        style: Some("drop-shadow".to_string()),
        color: Some("#00000033".to_string()),
        offset_x: Some(4.0),
        offset_y: Some(6.0),
        blur: Some(10.0),
        spread: Some(0.0),
        hidden: Some(false),
        ..Shadow::default()
    }]);
    object.blur = Some(Blur {
        kind: Some("layer-blur".to_string()),
        value: Some(3.5),
        hidden: Some(false),
        ..Blur::default()
    });
    object.opacity = Some(0.75);
    object.hidden = Some(false);

    match kind {
        ObjectKind::Rect => {
            object.rx = Some(8.0);
            object.ry = Some(8.0);
        }
        ObjectKind::Text => {
            let run = TextRun {
                font_family: Some("Work Sans".to_string()),
                font_size: Some("24".to_string()),
                font_weight: Some("700".to_string()),
                ..TextRun::default()
            };
            object.content = Some(Content::Text(TextContent::single(
                "Hello",
                run,
                &[Fill::solid("#FF0000", 1.0)],
            )));
        }
        ObjectKind::Path | ObjectKind::Bool => {
            object.content = Some(Content::Path(vec![
                PathCommand::move_to(Point { x: 0.0, y: 0.0 }),
                PathCommand::line_to(Point { x: 10.5, y: 20.0 }),
                PathCommand::close(),
            ]));
            if *kind == ObjectKind::Bool {
                object.bool_type = Some(BoolOperation::Difference);
                object.shapes = Some(vec![Id::from("a"), Id::from("b")]);
            }
        }
        ObjectKind::Frame | ObjectKind::Group => {
            object.shapes = Some(vec![Id::from("child-1"), Id::from("child-2")]);
        }
        _ => {}
    }
    object
}

#[test]
fn populated_objects_round_trip_in_both_dialects() {
    for kind in &KINDS {
        let object = populated(kind);
        for dialect in [Dialect::Transit, Dialect::Json] {
            let encoded = codec::encode_object(&object, dialect);
            let decoded = codec::decode(&encoded).unwrap();
            assert_eq!(decoded, object, "{kind:?} in {dialect:?}");
        }
    }
}

#[test]
fn bare_objects_round_trip() {
    for kind in &KINDS {
        let object = bare(kind);
        let decoded = codec::decode(&codec::encode(&object)).unwrap();
        assert_eq!(decoded, object, "{kind:?}");
    }
}

#[test]
fn transit_encoding_tags_keys_ids_and_keywords() {
    let encoded = codec::encode(&populated(&ObjectKind::Bool));
    assert_eq!(encoded["~:type"], "~:bool");
    assert_eq!(encoded["~:id"], "~u7f1e2d3c-0000-4000-8000-000000000001");
    assert_eq!(encoded["~:bool-type"], "~:difference");
    assert_eq!(encoded["~:shapes"], json!(["~ua", "~ub"]));
    assert_eq!(encoded["~:strokes"][0]["~:stroke-style"], "~:dashed");
    assert!(encoded.get("~:shadow").is_some());
    assert_eq!(encoded["~:opacity"], json!(0.75));
}

#[test]
fn text_content_keeps_camel_case_and_untagged_types() {
    let encoded = codec::encode(&populated(&ObjectKind::Text));
    let root = &encoded["~:content"];
    assert_eq!(root["type"], "root");
    assert_eq!(root["children"][0]["type"], "paragraph-set");
    let run = &root["children"][0]["children"][0]["children"][0];
    assert_eq!(run["fontFamily"], "Work Sans");
    assert_eq!(run["fills"][0]["fillColor"], "#FF0000");
}

#[test]
fn decoding_accepts_every_casing_variant() {
    let variants = [
        json!({"~:id": "~ux", "~:type": "~:rect", "~:fills": [{"~:fill-color": "#ABCDEF"}], "~:parent-id": "~uroot"}),
        json!({"id": "x", "type": "rect", "fills": [{"fillColor": "#ABCDEF"}], "parentId": "root"}),
        json!({"id": "x", "type": "rect", "fills": [{"fill-color": "#ABCDEF"}], "parent-id": "root"}),
        json!(["^ ", "~:id", "~ux", "~:type", "~:rect", "~:fills", [["^ ", "~:fill-color", "#ABCDEF"]], "~:parent-id", "~uroot"]),
    ];
    let decoded: Vec<DesignObject> = variants
        .iter()
        .map(|v| {
            let mut object = codec::decode(v).unwrap();
            object.extra.clear();
            object
        })
        .collect();
    for object in &decoded {
        assert_eq!(object, &decoded[1]);
        assert_eq!(object.fills.as_ref().unwrap()[0].color.as_deref(), Some("#ABCDEF"));
        assert_eq!(object.parent_id, Some(Id::from("root")));
    }
}

#[test]
fn numeric_normalisation_is_idempotent() {
    let samples: Vec<Number> = vec![
        Number::from(3),
        Number::from(-7),
        Number::from_f64(3.0).unwrap(),
        Number::from_f64(-0.0).unwrap(),
        Number::from_f64(2.5).unwrap(),
        Number::from_f64(1e15).unwrap(),
    ];
    for n in &samples {
        let once = codec::normalize_numeric(n);
        assert_eq!(codec::normalize_numeric(&once), once, "{n}");
    }
    assert_eq!(
        codec::normalize_numeric(&Number::from_f64(3.0).unwrap()),
        codec::normalize_numeric(&Number::from(3))
    );
}

/// Collects the first fill colour of every node in an encoded text tree.
fn fill_colours(node: &Value, out: &mut Vec<String>) {
    if let Some(colour) = node["fills"][0]["fillColor"].as_str() {
        out.push(colour.to_string());
    } else {
        out.push(String::new());
    }
    if let Some(children) = node["children"].as_array() {
        for child in children {
            fill_colours(child, out);
        }
    }
}

#[test]
fn text_fill_reaches_every_level() {
    let mut text = populated(&ObjectKind::Text);
    if let Some(Content::Text(content)) = &mut text.content {
        let paragraph = content.children[0].children[0].clone();
        content.children[0].children.push(paragraph);
    }
    let fill = solid_fill("#00AA00", 1.0).unwrap();
    let change = build_modify_for(&text, None, vec![Attribute::Fills(vec![fill])]);

    let encoded = codec::encode_change(&change, Dialect::Transit);
    let content_op = encoded["~:operations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|op| op["~:attr"] == "~:content")
        .expect("content operation");

    let mut colours = Vec::new();
    fill_colours(&content_op["~:val"], &mut colours);
    // root, paragraph-set, two paragraphs with one run each
    assert_eq!(colours.len(), 6);
    assert!(colours.iter().all(|c| c == "#00AA00"), "{colours:?}");
}

#[test]
fn modifying_a_transit_object_replaces_pass_through_keys() {
    let wire = json!({
        "~:id": "~ua",
        "~:type": "~:text",
        "~:x": 5,
        "~:position-data": [{"~:x": 1}],
        "~:grow-type": "~:fixed",
        "~:layout-item-margin": {"~:m1": 0},
    });
    let mut text = codec::decode(&wire).unwrap();
    for attribute in [
        Attribute::X(9.5),
        Attribute::PositionData(None),
        Attribute::Other {
            name: "grow_type".to_string(),
            value: json!("~:auto-height"),
        },
    ] {
        text.apply(&attribute);
    }

    let encoded = codec::encode(&text);
    assert_eq!(
        encoded,
        json!({
            "~:id": "~ua",
            "~:type": "~:text",
            "~:x": 9.5,
            "~:layout-item-margin": {"~:m1": 0},
            "~:grow-type": "~:auto-height",
        })
    );
    assert_eq!(codec::decode(&encoded).unwrap(), text);
}
