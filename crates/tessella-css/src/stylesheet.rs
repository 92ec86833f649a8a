//! Compiled stylesheets.

use std::sync::Arc;

use tessella_common::Symbol;

use crate::expression::Expr;
use crate::selector::Selector;
use crate::style::{Attribute, AttributeValue, ResolvedAttributes};

/// The right-hand side of a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationValue {
    /// A value known at compile time.
    Literal(AttributeValue),
    /// `text: key`: the object's value for this tag key.
    TagText(Symbol),
    /// An `eval()` expression, evaluated per object.
    Eval(Expr),
}

/// `attribute: value`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// The attribute set.
    pub attribute: Attribute,
    /// The value it is set to.
    pub value: DeclarationValue,
}

/// One selector chain and the declarations of its block.
///
/// Chains sharing a block share the declaration list.
#[derive(Debug, Clone)]
pub struct Rule {
    /// The compiled chain.
    pub selector: Selector,
    /// Declarations in source order.
    pub declarations: Arc<[Declaration]>,
}

/// An immutable, ordered rule list plus the `canvas` attributes.
///
/// Source order is the only cascade tie-break: a later matching rule
/// overrides an earlier one.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    /// Rules in source order.
    pub rules: Vec<Rule>,
    /// Attributes of the `canvas {}` block, such as the background `fill-color`.
    pub canvas: ResolvedAttributes,
}

impl Stylesheet {
    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the stylesheet has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
