//! Cascade evaluation.
//!
//! MapCSS has no specificity: rules apply in source order and the last
//! matching declaration for an attribute wins.
//! [MapCSS 0.2 § Cascading](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Cascading)
//!
//! Evaluation is a pure function of the object, the zoom level, the
//! stylesheet and the store; nothing is cached between calls.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use tessella_common::Interner;
use tessella_common::warning::warn_once;
use tessella_geo::{GeoObject, ObjectId, ObjectStore};

use crate::expression::Value;
use crate::style::{
    Attribute, AttributeKind, AttributeValue, ColorValue, LengthValue, ResolvedAttributes,
    TextPosition,
};
use crate::stylesheet::{Declaration, DeclarationValue, Stylesheet};

/// An object and its resolved style, as handed to a drawing backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledObject {
    /// The styled object.
    pub id: ObjectId,
    /// Its attributes at the evaluated zoom level.
    pub attributes: ResolvedAttributes,
}

/// Compute `object`'s own style at `zoom`.
///
/// Rules whose chain contains a descendant step style children, not the
/// object they start from; see [`evaluate_all`] for those.
#[must_use]
pub fn evaluate(
    object: &GeoObject,
    zoom: u8,
    stylesheet: &Stylesheet,
    store: &dyn ObjectStore,
) -> ResolvedAttributes {
    let interner = store.interner();
    let mut resolved = ResolvedAttributes::new();
    for rule in &stylesheet.rules {
        if rule.selector.matches(object, zoom, interner) {
            apply_declarations(&rule.declarations, object, interner, &mut resolved);
        }
    }
    resolved
}

/// Style a draw list.
///
/// Every rule runs over every input object in rule order. A chain with
/// descendant steps applies its declarations to the matching children,
/// which join the result even when they were not in `ids`. Objects no rule
/// styled are left out. The result is sorted by `z-index`, ties in object
/// id order.
#[must_use]
pub fn evaluate_all(
    ids: &[ObjectId],
    zoom: u8,
    stylesheet: &Stylesheet,
    store: &dyn ObjectStore,
) -> Vec<StyledObject> {
    let interner = store.interner();
    let mut inputs: Vec<&GeoObject> = ids.iter().filter_map(|id| store.resolve(*id)).collect();
    inputs.sort_by_key(|object| object.id());
    inputs.dedup_by_key(|object| object.id());

    let mut styles: BTreeMap<ObjectId, ResolvedAttributes> = BTreeMap::new();
    for rule in &stylesheet.rules {
        for object in &inputs {
            for target in rule.selector.targets(object, zoom, store) {
                let Some(target_object) = store.resolve(target) else {
                    continue;
                };
                apply_declarations(
                    &rule.declarations,
                    target_object,
                    interner,
                    styles.entry(target).or_default(),
                );
            }
        }
    }

    let mut styled: Vec<StyledObject> = styles
        .into_iter()
        .filter(|(_, attributes)| !attributes.is_empty())
        .map(|(id, attributes)| StyledObject { id, attributes })
        .collect();
    styled.sort_by(|a, b| a.attributes.z_index().total_cmp(&b.attributes.z_index()));
    tracing::trace!(zoom, inputs = inputs.len(), styled = styled.len(), "cascade finished");
    styled
}

fn apply_declarations(
    declarations: &[Declaration],
    object: &GeoObject,
    interner: &dyn Interner,
    resolved: &mut ResolvedAttributes,
) {
    for declaration in declarations {
        if let Some(value) = resolve_declaration(declaration, object, interner) {
            resolved.set(declaration.attribute, value);
        }
    }
}

/// `None` leaves any earlier value for the attribute in place.
fn resolve_declaration(
    declaration: &Declaration,
    object: &GeoObject,
    interner: &dyn Interner,
) -> Option<AttributeValue> {
    match &declaration.value {
        DeclarationValue::Literal(value) => Some(value.clone()),
        DeclarationValue::TagText(key) => object
            .tags()
            .get(key)
            .and_then(|value| interner.lookup(*value))
            .map(|text| AttributeValue::Text(text.to_string())),
        DeclarationValue::Eval(expr) => {
            let value = expr.evaluate(object, interner);
            if value.is_undefined() {
                return None;
            }
            let converted = convert(declaration.attribute, &value);
            if converted.is_none() {
                let _ = warn_once(
                    "cascade",
                    &format!("'{value}' is not a valid value for '{}'", declaration.attribute),
                );
            }
            converted
        }
    }
}

/// Convert an expression result to the attribute's value kind.
fn convert(attribute: Attribute, value: &Value) -> Option<AttributeValue> {
    match attribute.kind() {
        AttributeKind::Color => value
            .as_text()
            .and_then(|text| ColorValue::parse(&text))
            .map(AttributeValue::Color),
        AttributeKind::Length => match value {
            Value::Number(n) => Some(LengthValue::Px(*n)),
            Value::Text(text) => LengthValue::parse(text),
            Value::Bool(_) | Value::Undefined => None,
        }
        .map(AttributeValue::Length),
        AttributeKind::Number => match value {
            Value::Bool(_) => None,
            other => other.as_number(),
        }
        .map(AttributeValue::Number),
        AttributeKind::TextPosition => value
            .as_text()
            .and_then(|text| TextPosition::from_str(text.trim()).ok())
            .map(AttributeValue::TextPosition),
        AttributeKind::TagKey | AttributeKind::Path => value.as_text().map(AttributeValue::Text),
    }
}
