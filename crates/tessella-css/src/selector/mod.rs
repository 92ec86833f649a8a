//! MapCSS selector chains and matching.
//!
//! A chain such as `relation[type=route] way[highway]|z12-` compiles to one
//! [`Selector`]: an accepted object type, a zoom range, and an ordered list of
//! [`SelectorTest`]s. Structural tests move the match focus from an object to
//! its children, so the tests after them are evaluated against the children.
//!
//! [MapCSS 0.2 selectors](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Selectors)

use core::cmp::Ordering;
use core::fmt;
use std::collections::HashSet;

use regex::Regex;
use strum_macros::{Display, EnumString};
use tessella_common::{Interner, Symbol};
use tessella_geo::{GeoObject, MAX_ZOOM, MIN_ZOOM, ObjectId, ObjectStore};

/// [§ Type selectors](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Type_selector)
///
/// The object type a chain accepts. `area` and `line` are ways with a
/// geometry class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ObjectType {
    /// `node`
    Node,
    /// `way`
    Way,
    /// `relation`
    Relation,
    /// `area`: a closed way not tagged `area=no`.
    Area,
    /// `line`: any way that is not an area.
    Line,
    /// `*`
    #[strum(serialize = "*")]
    Any,
}

impl ObjectType {
    /// Returns true if `object` is of this type.
    #[must_use]
    pub fn accepts(self, object: &GeoObject, interner: &dyn Interner) -> bool {
        match (self, object) {
            (Self::Any, _)
            | (Self::Node, GeoObject::Node(_))
            | (Self::Way, GeoObject::Way(_))
            | (Self::Relation, GeoObject::Relation(_)) => true,
            (Self::Area, GeoObject::Way(way)) => way.is_area(interner),
            (Self::Line, GeoObject::Way(way)) => way.is_line(interner),
            _ => false,
        }
    }
}

/// [§ Zoom selectors](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Zoom_selector)
///
/// An inclusive range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoomRange {
    /// Lowest zoom level matched.
    pub bottom: u8,
    /// Highest zoom level matched.
    pub top: u8,
}

impl ZoomRange {
    /// Every zoom level.
    pub const ALL: Self = Self {
        bottom: MIN_ZOOM,
        top: MAX_ZOOM,
    };

    /// Returns true if `zoom` lies in the range.
    #[must_use]
    pub const fn contains(&self, zoom: u8) -> bool {
        self.bottom <= zoom && zoom <= self.top
    }

    /// The levels in both ranges. May be empty.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            bottom: self.bottom.max(other.bottom),
            top: self.top.min(other.top),
        }
    }

    /// Returns true if no zoom level is matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bottom > self.top
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}-{}", self.bottom, self.top)
    }
}

/// Ordering operator of a `[key<value]` style condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Comparison {
    /// `<`
    #[strum(serialize = "<")]
    Less,
    /// `<=`
    #[strum(serialize = "<=")]
    LessEq,
    /// `>`
    #[strum(serialize = ">")]
    Greater,
    /// `>=`
    #[strum(serialize = ">=")]
    GreaterEq,
}

impl Comparison {
    /// Returns true if `ordering` satisfies the operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Less => ordering.is_lt(),
            Self::LessEq => ordering.is_le(),
            Self::Greater => ordering.is_gt(),
            Self::GreaterEq => ordering.is_ge(),
        }
    }
}

/// Geometry class of a way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum GeometryClass {
    /// Closed way not tagged `area=no`.
    Area,
    /// Every other way.
    Line,
}

/// A single test in a selector chain.
///
/// [§ Conditions](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Conditions)
#[derive(Debug, Clone)]
pub enum SelectorTest {
    /// `[key]`
    HasTag(Symbol),
    /// `[!key]`
    LacksTag(Symbol),
    /// `[key=value]`
    TagEquals {
        /// Tag key.
        key: Symbol,
        /// Expected value.
        value: Symbol,
    },
    /// `[key!=value]`. Requires the tag to be present.
    TagNotEquals {
        /// Tag key.
        key: Symbol,
        /// Rejected value.
        value: Symbol,
    },
    /// `[key<value]` and friends. Compares numerically when both sides are
    /// numbers, otherwise as strings. An absent tag never matches.
    TagCompare {
        /// Tag key.
        key: Symbol,
        /// Operator.
        op: Comparison,
        /// Right-hand side as written.
        value: String,
        /// Right-hand side as a number, if it is one.
        number: Option<f64>,
    },
    /// `[key=~/pattern/]`. An absent tag never matches.
    TagMatches {
        /// Tag key.
        key: Symbol,
        /// Compiled pattern, unanchored.
        pattern: Regex,
    },
    /// Accept only ways of the given class.
    Geometry(GeometryClass),
    /// Move the focus to the member nodes of each focused object.
    ChildNodes,
    /// Move the focus to the member ways of each focused object.
    ChildWays,
    /// Always matches.
    Always,
}

impl SelectorTest {
    /// Returns true for tests that move the focus instead of filtering it.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::ChildNodes | Self::ChildWays)
    }

    /// Evaluate a filtering test against one object.
    ///
    /// Structural tests return `true`; they are applied by [`Selector::targets`].
    #[must_use]
    pub fn matches(&self, object: &GeoObject, interner: &dyn Interner) -> bool {
        let tags = object.tags();
        let text = |key: &Symbol| tags.get(key).and_then(|value| interner.lookup(*value));
        match self {
            Self::HasTag(key) => tags.contains_key(key),
            Self::LacksTag(key) => !tags.contains_key(key),
            Self::TagEquals { key, value } => tags.get(key) == Some(value),
            Self::TagNotEquals { key, value } => tags.get(key).is_some_and(|v| v != value),
            Self::TagCompare {
                key,
                op,
                value,
                number,
            } => text(key).is_some_and(|actual| {
                let ordering = match (actual.trim().parse::<f64>().ok(), number) {
                    (Some(lhs), Some(rhs)) => lhs.partial_cmp(rhs),
                    _ => Some((*actual).cmp(value.as_str())),
                };
                ordering.is_some_and(|o| op.accepts(o))
            }),
            Self::TagMatches { key, pattern } => {
                text(key).is_some_and(|actual| pattern.is_match(&actual))
            }
            Self::Geometry(class) => object.as_way().is_some_and(|way| match class {
                GeometryClass::Area => way.is_area(interner),
                GeometryClass::Line => way.is_line(interner),
            }),
            Self::ChildNodes | Self::ChildWays | Self::Always => true,
        }
    }
}

/// A compiled selector chain.
#[derive(Debug, Clone)]
pub struct Selector {
    /// Type accepted for the first object of the chain.
    pub object_type: ObjectType,
    /// Intersection of the zoom ranges of every chain item.
    pub zoom: ZoomRange,
    /// Tests in chain order.
    pub tests: Vec<SelectorTest>,
}

impl Selector {
    /// A selector accepting every object of `object_type` at every zoom.
    #[must_use]
    pub const fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            zoom: ZoomRange::ALL,
            tests: Vec::new(),
        }
    }

    /// Returns true if the chain contains a descendant step.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.tests.iter().any(SelectorTest::is_structural)
    }

    /// Type and zoom check for the first object of the chain.
    #[must_use]
    pub fn gate(&self, object: &GeoObject, zoom: u8, interner: &dyn Interner) -> bool {
        self.zoom.contains(zoom) && self.object_type.accepts(object, interner)
    }

    /// Returns true if the chain matches `object` itself.
    ///
    /// Always false for structural chains: they style children, not the
    /// object they start from.
    #[must_use]
    pub fn matches(&self, object: &GeoObject, zoom: u8, interner: &dyn Interner) -> bool {
        !self.is_structural()
            && self.gate(object, zoom, interner)
            && self.tests.iter().all(|test| test.matches(object, interner))
    }

    /// Objects the chain's declarations apply to when matching starts at
    /// `object`.
    ///
    /// Empty when the chain does not match. For a chain without descendant
    /// steps this is `object` itself; otherwise it is every resolved child
    /// that passed the tests following the last step, in member order and
    /// without duplicates.
    #[must_use]
    pub fn targets<'s>(
        &self,
        object: &'s GeoObject,
        zoom: u8,
        store: &'s dyn ObjectStore,
    ) -> Vec<ObjectId> {
        let interner = store.interner();
        if !self.gate(object, zoom, interner) {
            return Vec::new();
        }
        let mut focus: Vec<&'s GeoObject> = vec![object];
        for test in &self.tests {
            match test {
                SelectorTest::ChildNodes => {
                    focus = focus
                        .iter()
                        .flat_map(|o| o.child_nodes().iter())
                        .filter_map(|&id| store.resolve(ObjectId::Node(id)))
                        .collect();
                }
                SelectorTest::ChildWays => {
                    focus = focus
                        .iter()
                        .flat_map(|o| o.child_ways().iter())
                        .filter_map(|&id| store.resolve(ObjectId::Way(id)))
                        .collect();
                }
                filter => focus.retain(|o| filter.matches(o, interner)),
            }
            if focus.is_empty() {
                return Vec::new();
            }
        }
        let mut seen = HashSet::new();
        focus
            .into_iter()
            .map(GeoObject::id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
