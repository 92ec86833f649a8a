//! Integration tests for the MapCSS stylesheet compiler.

use std::sync::Arc;

use tessella_common::{Interner, StringTable};
use tessella_css::compiler::{CompileOptions, ParseErrorKind, compile, compile_with};
use tessella_css::selector::{GeometryClass, ObjectType, SelectorTest, ZoomRange};
use tessella_css::{Attribute, AttributeValue, ColorValue, DeclarationValue, LengthValue, TextPosition};

fn literal(value: &DeclarationValue) -> &AttributeValue {
    match value {
        DeclarationValue::Literal(value) => value,
        other => panic!("expected a literal, got {other:?}"),
    }
}

#[test]
fn test_comma_chains_become_separate_rules() {
    let sheet = compile("node[amenity], area[building] { z-index: 3; }\nway { width: 1 }").unwrap();
    assert_eq!(sheet.len(), 3);
    assert_eq!(sheet.rules[0].selector.object_type, ObjectType::Node);
    assert_eq!(sheet.rules[1].selector.object_type, ObjectType::Area);
    assert_eq!(sheet.rules[2].selector.object_type, ObjectType::Way);
    assert!(Arc::ptr_eq(&sheet.rules[0].declarations, &sheet.rules[1].declarations));
}

#[test]
fn test_literal_values() {
    let sheet = compile(
        r#"way {
            width: 2;
            casing-width: 8pt;
            icon-width: 50%;
            color: rgb(255, 128, 0);
            casing-color: #f80;
            fill-color: steelblue;
            z-index: -1;
            text-position: line;
            icon-image: "icons/shop.png";
        }"#,
    )
    .unwrap();
    let values: Vec<_> = sheet.rules[0]
        .declarations
        .iter()
        .map(|d| (d.attribute, literal(&d.value).clone()))
        .collect();
    assert_eq!(
        values,
        vec![
            (Attribute::Width, AttributeValue::Length(LengthValue::Px(2.0))),
            (Attribute::CasingWidth, AttributeValue::Length(LengthValue::Pt(8.0))),
            (Attribute::IconWidth, AttributeValue::Length(LengthValue::Percent(50.0))),
            (Attribute::Color, AttributeValue::Color(ColorValue::rgb(255, 128, 0))),
            (Attribute::CasingColor, AttributeValue::Color(ColorValue::rgb(255, 136, 0))),
            (Attribute::FillColor, AttributeValue::Color(ColorValue::rgb(70, 130, 180))),
            (Attribute::ZIndex, AttributeValue::Number(-1.0)),
            (Attribute::TextPosition, AttributeValue::TextPosition(TextPosition::Line)),
            (Attribute::IconPath, AttributeValue::Text("icons/shop.png".to_string())),
        ]
    );
}

#[test]
fn test_text_interns_tag_key() {
    let interner = StringTable::new();
    let sheet = compile_with("node { text: addr:street }", &CompileOptions::default(), &interner).unwrap();
    let key = interner.get("addr:street").unwrap();
    assert_eq!(sheet.rules[0].declarations[0].value, DeclarationValue::TagText(key));
}

#[test]
fn test_conditions() {
    let interner = StringTable::new();
    let sheet = compile_with(
        r#"way[highway][!tunnel][oneway=yes][access!=private][lanes>=2]["name"=~/^A\/[0-9]+$/] {}"#,
        &CompileOptions::default(),
        &interner,
    )
    .unwrap();
    let tests = &sheet.rules[0].selector.tests;
    assert_eq!(tests.len(), 6);
    let sym = |s: &str| interner.get(s).unwrap();
    assert!(matches!(tests[0], SelectorTest::HasTag(k) if k == sym("highway")));
    assert!(matches!(tests[1], SelectorTest::LacksTag(k) if k == sym("tunnel")));
    assert!(matches!(tests[2], SelectorTest::TagEquals { key, value } if key == sym("oneway") && value == sym("yes")));
    assert!(matches!(tests[3], SelectorTest::TagNotEquals { key, value } if key == sym("access") && value == sym("private")));
    match &tests[4] {
        SelectorTest::TagCompare { value, number, .. } => {
            assert_eq!(value, "2");
            assert_eq!(*number, Some(2.0));
        }
        other => panic!("unexpected test {other:?}"),
    }
    match &tests[5] {
        SelectorTest::TagMatches { pattern, .. } => {
            assert!(pattern.is_match("A/12"));
            assert!(!pattern.is_match("B12"));
        }
        other => panic!("unexpected test {other:?}"),
    }
}

#[test]
fn test_zoom_ranges_intersect_across_chain() {
    let sheet = compile("relation|z10-14 way|z12- { color: red }").unwrap();
    let selector = &sheet.rules[0].selector;
    assert_eq!(selector.zoom, ZoomRange { bottom: 12, top: 14 });
    assert!(matches!(selector.tests[0], SelectorTest::ChildWays));

    let sheet = compile("way|z15 { color: red } node { color: red }").unwrap();
    assert_eq!(sheet.rules[0].selector.zoom, ZoomRange { bottom: 15, top: 15 });
    assert_eq!(sheet.rules[1].selector.zoom, ZoomRange::ALL);
}

#[test]
fn test_descendant_steps() {
    let sheet = compile("relation[type=multipolygon] area { fill-color: tan }").unwrap();
    let tests = &sheet.rules[0].selector.tests;
    assert!(matches!(tests[1], SelectorTest::ChildWays));
    assert!(matches!(tests[2], SelectorTest::Geometry(GeometryClass::Area)));

    let sheet = compile("way node[barrier] { icon-image: gate.png }").unwrap();
    assert!(matches!(sheet.rules[0].selector.tests[0], SelectorTest::ChildNodes));

    let err = compile("way relation { color: red }").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Syntax);
}

#[test]
fn test_canvas_block() {
    let sheet = compile("canvas { fill-color: #f2efe9; }\nway { width: 1 }").unwrap();
    assert_eq!(sheet.len(), 1);
    assert_eq!(
        sheet.canvas.get(Attribute::FillColor),
        Some(&AttributeValue::Color(ColorValue::rgb(0xf2, 0xef, 0xe9)))
    );

    let err = compile("canvas { fill-color: eval(\"red\") }").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MalformedExpression);
}

#[test]
fn test_comments_and_optional_semicolon() {
    let sheet = compile(
        "/* roads */\nway[highway] { // main\n width: 2; color: gray }\n// trailing",
    )
    .unwrap();
    assert_eq!(sheet.rules[0].declarations.len(), 2);
}

#[test]
fn test_unknown_attribute_position() {
    let err = compile("way {\n  dashes: 2;\n}").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnknownAttribute);
    assert_eq!((err.position.line, err.position.column), (2, 3));
    assert!(err.to_string().contains("dashes"));
}

#[test]
fn test_lenient_mode_skips_unknown_attribute() {
    let options = CompileOptions {
        strict_attributes: false,
    };
    let sheet = compile_with("way { dashes: 2; width: 1 }", &options, &StringTable::new()).unwrap();
    assert_eq!(sheet.rules[0].declarations.len(), 1);
    assert_eq!(sheet.rules[0].declarations[0].attribute, Attribute::Width);
}

#[test]
fn test_unknown_unit() {
    let err = compile("way { width: 2em }").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnknownUnit);
    assert_eq!(err.position.column, 14);
}

#[test]
fn test_malformed_expressions() {
    for source in [
        "way { width: eval(frobnicate(1)) }",
        "way { width: eval(cond(1, 2)) }",
        "way { width: eval((1 + 2) }",
        "way { width: eval(1 +) }",
        "way { width: eval(1 2) }",
        "way { width: eval() }",
        "way { width: eval(1) 2 }",
    ] {
        let err = compile(source).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MalformedExpression, "{source}");
    }
}

#[test]
fn test_syntax_errors() {
    for source in [
        "way[highway { width: 1 }",
        "way { width: 1 ",
        "way { width 1 }",
        "bogus { width: 1 }",
        "way|zoom { width: 1 }",
        "way[name=~/(/] { width: 1 }",
        "way { color: notacolor }",
        "way { text-position: above }",
    ] {
        let err = compile(source).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Syntax, "{source}");
    }
}
