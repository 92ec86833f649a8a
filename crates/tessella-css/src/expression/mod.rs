//! `eval()` expressions.
//!
//! [MapCSS 0.2 eval](https://wiki.openstreetmap.org/wiki/MapCSS/0.2/eval)
//!
//! Expressions are parsed once at compile time into an [`Expr`] tree and
//! evaluated per object during the cascade. A missing tag yields
//! [`Value::Undefined`], which absorbs every operator so the declaration is
//! skipped for that object.

use core::fmt;

use strum_macros::{Display, EnumString, IntoStaticStr};
use tessella_common::{Interner, Symbol};
use tessella_geo::GeoObject;

use crate::style::ColorValue;

mod parser;

pub use parser::parse_expression;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A missing tag, or an operation on one.
    Undefined,
    /// A number.
    Number(f64),
    /// A string.
    Text(String),
    /// A truth value.
    Bool(bool),
}

impl Value {
    /// Returns true for [`Value::Undefined`].
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// The value as a number. Text is parsed; `true` is 1 and `false` is 0.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Undefined => None,
            Self::Number(n) => Some(*n),
            Self::Text(t) => t.trim().parse().ok(),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }

    /// The value as a string, `None` when undefined.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Undefined => None,
            Self::Number(n) => Some(format_number(*n)),
            Self::Text(t) => Some(t.clone()),
            Self::Bool(b) => Some(b.to_string()),
        }
    }

    /// Truthiness: zero, the empty string, `"no"`, `"false"` and
    /// undefined are false.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined => false,
            Self::Number(n) => *n != 0.0,
            Self::Text(t) => !matches!(t.as_str(), "" | "0" | "no" | "false"),
            Self::Bool(b) => *b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("undefined"),
        }
    }
}

/// Print a number, without a fraction when it is integral.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOp {
    /// `+`
    #[strum(serialize = "+")]
    Add,
    /// `-`
    #[strum(serialize = "-")]
    Sub,
    /// `*`
    #[strum(serialize = "*")]
    Mul,
    /// `/`
    #[strum(serialize = "/")]
    Div,
    /// `.`: string concatenation.
    #[strum(serialize = ".")]
    Concat,
    /// `==`: numeric when both sides are numbers.
    #[strum(serialize = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    NotEq,
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
    /// `eq`: string equality.
    #[strum(serialize = "eq")]
    StrEq,
    /// `ne`: string inequality.
    #[strum(serialize = "ne")]
    StrNotEq,
}

impl BinaryOp {
    /// Apply the operator to two defined operands.
    fn apply(self, lhs: &Value, rhs: &Value) -> Value {
        let numbers = || Some((lhs.as_number()?, rhs.as_number()?));
        let texts = || Some((lhs.as_text()?, rhs.as_text()?));
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div => {
                let Some((a, b)) = numbers() else {
                    return Value::Undefined;
                };
                match self {
                    Self::Add => Value::Number(a + b),
                    Self::Sub => Value::Number(a - b),
                    Self::Mul => Value::Number(a * b),
                    _ if b == 0.0 => Value::Undefined,
                    _ => Value::Number(a / b),
                }
            }
            Self::Concat => texts().map_or(Value::Undefined, |(a, b)| Value::Text(a + &b)),
            Self::StrEq => texts().map_or(Value::Undefined, |(a, b)| Value::Bool(a == b)),
            Self::StrNotEq => texts().map_or(Value::Undefined, |(a, b)| Value::Bool(a != b)),
            Self::Eq | Self::NotEq | Self::Less | Self::LessEq | Self::Greater | Self::GreaterEq => {
                let ordering = match numbers() {
                    Some((a, b)) => a.partial_cmp(&b),
                    None => texts().map(|(a, b)| a.cmp(&b)),
                };
                let Some(ordering) = ordering else {
                    return Value::Undefined;
                };
                Value::Bool(match self {
                    Self::Eq => ordering.is_eq(),
                    Self::NotEq => ordering.is_ne(),
                    Self::Less => ordering.is_lt(),
                    Self::LessEq => ordering.is_le(),
                    Self::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
        }
    }
}

/// A built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Function {
    /// `tag(key)`: value of a tag on the object.
    Tag,
    /// `num(x)`: convert to a number.
    Num,
    /// `str(x)`: convert to a string.
    Str,
    /// `boolean(x)`: truthiness; undefined is false.
    Boolean,
    /// `int(x)`: truncate toward zero.
    Int,
    /// `sqrt(x)`
    Sqrt,
    /// `not(x)`
    Not,
    /// `cond(c, a, b)`
    Cond,
    /// `any(a, b, ...)`: first defined argument.
    Any,
    /// `colgen(x)`: a color derived from the string form of `x`.
    Colgen,
}

impl Function {
    /// Accepted argument counts, inclusive. `None` means unbounded.
    #[must_use]
    pub const fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Cond => (3, Some(3)),
            Self::Any => (1, None),
            _ => (1, Some(1)),
        }
    }
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant.
    Literal(Value),
    /// `tag("key")` with a literal key, interned at compile time.
    Tag(Symbol),
    /// `-x`
    Negate(Box<Expr>),
    /// `lhs op rhs`
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A function call. Arity was checked at compile time.
    Call {
        /// Function.
        function: Function,
        /// Arguments in order.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Evaluate against `object`'s tags.
    #[must_use]
    pub fn evaluate(&self, object: &GeoObject, interner: &dyn Interner) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Tag(key) => object
                .tags()
                .get(key)
                .and_then(|value| interner.lookup(*value))
                .map_or(Value::Undefined, |text| Value::Text(text.to_string())),
            Self::Negate(inner) => {
                let value = inner.evaluate(object, interner);
                value.as_number().map_or(Value::Undefined, |n| Value::Number(-n))
            }
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate(object, interner);
                if lhs.is_undefined() {
                    return Value::Undefined;
                }
                let rhs = rhs.evaluate(object, interner);
                if rhs.is_undefined() {
                    return Value::Undefined;
                }
                op.apply(&lhs, &rhs)
            }
            Self::Call { function, args } => call(*function, args, object, interner),
        }
    }
}

fn call(function: Function, args: &[Expr], object: &GeoObject, interner: &dyn Interner) -> Value {
    let arg = |i: usize| {
        args.get(i)
            .map_or(Value::Undefined, |expr| expr.evaluate(object, interner))
    };
    match function {
        Function::Any => args
            .iter()
            .map(|expr| expr.evaluate(object, interner))
            .find(|value| !value.is_undefined())
            .unwrap_or(Value::Undefined),
        Function::Boolean => Value::Bool(arg(0).truthy()),
        Function::Cond => {
            let condition = arg(0);
            if condition.is_undefined() {
                Value::Undefined
            } else if condition.truthy() {
                arg(1)
            } else {
                arg(2)
            }
        }
        Function::Tag => match arg(0).as_text() {
            Some(key) => interner
                .get(&key)
                .and_then(|key| object.tags().get(&key))
                .and_then(|value| interner.lookup(*value))
                .map_or(Value::Undefined, |text| Value::Text(text.to_string())),
            None => Value::Undefined,
        },
        Function::Num => arg(0).as_number().map_or(Value::Undefined, Value::Number),
        Function::Str => arg(0).as_text().map_or(Value::Undefined, Value::Text),
        Function::Int => arg(0)
            .as_number()
            .map_or(Value::Undefined, |n| Value::Number(n.trunc())),
        Function::Sqrt => match arg(0).as_number() {
            Some(n) if n >= 0.0 => Value::Number(n.sqrt()),
            _ => Value::Undefined,
        },
        Function::Not => {
            let value = arg(0);
            if value.is_undefined() {
                Value::Undefined
            } else {
                Value::Bool(!value.truthy())
            }
        }
        Function::Colgen => arg(0)
            .as_text()
            .map_or(Value::Undefined, |seed| Value::Text(ColorValue::generate(&seed).to_hex())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_comparison_falls_back_to_strings() {
        let two = Value::Number(2.0);
        let ten = Value::Text("10".to_string());
        assert_eq!(BinaryOp::Less.apply(&two, &ten), Value::Bool(true));
        let a = Value::Text("abc".to_string());
        let b = Value::Text("abd".to_string());
        assert_eq!(BinaryOp::Less.apply(&a, &b), Value::Bool(true));
        assert_eq!(
            BinaryOp::StrEq.apply(&Value::Number(2.0), &Value::Text("2".to_string())),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_division_by_zero_is_undefined() {
        assert_eq!(
            BinaryOp::Div.apply(&Value::Number(1.0), &Value::Number(0.0)),
            Value::Undefined
        );
    }
}
