//! Style expressions.
//!
//! Expressions arrive as JSON arrays (`["match", ["get", "kring"], ...]`) and
//! are compiled once into an [`Expression`] tree, then evaluated per feature
//! and zoom level. Supported operators:
//!
//! | Operator | Form |
//! |----------|------|
//! | `get` | `["get", name]` |
//! | `zoom` | `["zoom"]` |
//! | `literal` | `["literal", value]` |
//! | `==` / `!=` | `["==", a, b]` |
//! | `all` / `any` / `!` | boolean combinators |
//! | `match` | `["match", input, label, out, ..., fallback]` |
//! | `interpolate` | `["interpolate", ["linear"], input, stop, out, ...]` |
//!
//! Interpolation blends numbers linearly and colors component-wise in RGBA.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::color::Color;
use crate::geojson::{Feature, Properties};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unknown expression operator: {0}")]
    UnknownOperator(String),
    #[error("`{op}` expects {expected} arguments, found {found}")]
    Arity {
        op: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("Invalid match label: {0}")]
    InvalidLabel(String),
    #[error("Interpolation stops must be strictly ascending numbers")]
    InvalidStops,
    #[error("Unsupported interpolation type: {0}")]
    UnsupportedInterpolation(String),
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("Malformed expression: {0}")]
    Malformed(String),
}

/// A value an expression evaluates to.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Color(Color),
    Array(Vec<Value>),
}

impl StyleValue {
    fn from_json(value: &Value) -> StyleValue {
        match value {
            Value::Null | Value::Object(_) => StyleValue::Null,
            Value::Bool(b) => StyleValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(StyleValue::Null, StyleValue::Number),
            Value::String(s) => StyleValue::String(s.clone()),
            Value::Array(items) => StyleValue::Array(items.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StyleValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StyleValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Colors are either interpolated values or color strings.
    pub fn as_color(&self) -> Option<Color> {
        match self {
            StyleValue::Color(c) => Some(*c),
            StyleValue::String(s) => Color::parse(s),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            StyleValue::Null => "null",
            StyleValue::Bool(_) => "boolean",
            StyleValue::Number(_) => "number",
            StyleValue::String(_) => "string",
            StyleValue::Color(_) => "color",
            StyleValue::Array(_) => "array",
        }
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Null => f.write_str("null"),
            StyleValue::Bool(b) => write!(f, "{b}"),
            StyleValue::Number(n) => write!(f, "{n}"),
            StyleValue::String(s) => f.write_str(s),
            StyleValue::Color(c) => write!(f, "{c}"),
            StyleValue::Array(items) => write!(f, "{}", Value::Array(items.clone())),
        }
    }
}

/// A `match` label: integer or string.
#[derive(Clone, Debug, PartialEq)]
pub enum Label {
    Number(f64),
    String(String),
}

impl Label {
    fn parse(value: &Value) -> Result<Label, ExpressionError> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(Label::Number)
                .ok_or_else(|| ExpressionError::InvalidLabel(value.to_string())),
            Value::String(s) => Ok(Label::String(s.clone())),
            _ => Err(ExpressionError::InvalidLabel(value.to_string())),
        }
    }

    fn matches(&self, input: &StyleValue) -> bool {
        match (self, input) {
            (Label::Number(l), StyleValue::Number(v)) => l == v,
            (Label::String(l), StyleValue::String(v)) => l == v,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal(StyleValue),
    Get(String),
    Zoom,
    Equals(Box<Expression>, Box<Expression>),
    NotEquals(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    All(Vec<Expression>),
    Any(Vec<Expression>),
    Match {
        input: Box<Expression>,
        arms: Vec<(Vec<Label>, Expression)>,
        fallback: Box<Expression>,
    },
    Interpolate {
        input: Box<Expression>,
        stops: Vec<(f64, Expression)>,
    },
}

/// What an expression can see while evaluating.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    pub zoom: f64,
    pub properties: Option<&'a Properties>,
}

impl<'a> EvalContext<'a> {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            properties: None,
        }
    }

    pub fn for_feature(zoom: f64, feature: &'a Feature) -> Self {
        Self {
            zoom,
            properties: feature.properties.as_ref(),
        }
    }
}

impl Expression {
    /// Compile a JSON expression.
    pub fn parse(value: &Value) -> Result<Expression, ExpressionError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(_) => {
                return Err(ExpressionError::Malformed(value.to_string()));
            }
            scalar => return Ok(Expression::Literal(StyleValue::from_json(scalar))),
        };

        let (op, args) = match items.split_first() {
            Some((Value::String(op), args)) => (op.as_str(), args),
            _ => return Err(ExpressionError::Malformed(value.to_string())),
        };

        match op {
            "get" => match args {
                [Value::String(name)] => Ok(Expression::Get(name.clone())),
                _ => Err(arity("get", "1 string", args.len())),
            },
            "zoom" => match args {
                [] => Ok(Expression::Zoom),
                _ => Err(arity("zoom", "0", args.len())),
            },
            "literal" => match args {
                [v] => Ok(Expression::Literal(StyleValue::from_json(v))),
                _ => Err(arity("literal", "1", args.len())),
            },
            "==" | "!=" => match args {
                [a, b] => {
                    let (a, b) = (Box::new(Self::parse(a)?), Box::new(Self::parse(b)?));
                    Ok(if op == "==" {
                        Expression::Equals(a, b)
                    } else {
                        Expression::NotEquals(a, b)
                    })
                }
                _ => Err(arity(if op == "==" { "==" } else { "!=" }, "2", args.len())),
            },
            "!" => match args {
                [a] => Ok(Expression::Not(Box::new(Self::parse(a)?))),
                _ => Err(arity("!", "1", args.len())),
            },
            "all" => Ok(Expression::All(parse_all(args)?)),
            "any" => Ok(Expression::Any(parse_all(args)?)),
            "match" => parse_match(args),
            "interpolate" => parse_interpolate(args),
            other => Err(ExpressionError::UnknownOperator(other.to_string())),
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StyleValue, ExpressionError> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Get(name) => Ok(ctx
                .properties
                .and_then(|p| p.get(name))
                .map_or(StyleValue::Null, StyleValue::from_json)),
            Expression::Zoom => Ok(StyleValue::Number(ctx.zoom)),
            Expression::Equals(a, b) => Ok(StyleValue::Bool(a.evaluate(ctx)? == b.evaluate(ctx)?)),
            Expression::NotEquals(a, b) => {
                Ok(StyleValue::Bool(a.evaluate(ctx)? != b.evaluate(ctx)?))
            }
            Expression::Not(a) => Ok(StyleValue::Bool(!expect_bool(a.evaluate(ctx)?)?)),
            Expression::All(items) => {
                for item in items {
                    if !expect_bool(item.evaluate(ctx)?)? {
                        return Ok(StyleValue::Bool(false));
                    }
                }
                Ok(StyleValue::Bool(true))
            }
            Expression::Any(items) => {
                for item in items {
                    if expect_bool(item.evaluate(ctx)?)? {
                        return Ok(StyleValue::Bool(true));
                    }
                }
                Ok(StyleValue::Bool(false))
            }
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let value = input.evaluate(ctx)?;
                for (labels, output) in arms {
                    if labels.iter().any(|l| l.matches(&value)) {
                        return output.evaluate(ctx);
                    }
                }
                fallback.evaluate(ctx)
            }
            Expression::Interpolate { input, stops } => {
                let x = input.evaluate(ctx)?;
                let x = x.as_f64().ok_or_else(|| ExpressionError::TypeMismatch {
                    expected: "number",
                    found: x.type_name().to_string(),
                })?;
                interpolate(stops, x, ctx)
            }
        }
    }

    /// Evaluate as a filter: anything other than `true` rejects.
    pub fn test(&self, ctx: &EvalContext<'_>) -> Result<bool, ExpressionError> {
        Ok(self.evaluate(ctx)?.as_bool().unwrap_or(false))
    }

    /// Whether the value depends on zoom.
    pub fn is_zoom_dependent(&self) -> bool {
        match self {
            Expression::Zoom => true,
            Expression::Literal(_) | Expression::Get(_) => false,
            Expression::Equals(a, b) | Expression::NotEquals(a, b) => {
                a.is_zoom_dependent() || b.is_zoom_dependent()
            }
            Expression::Not(a) => a.is_zoom_dependent(),
            Expression::All(items) | Expression::Any(items) => {
                items.iter().any(Expression::is_zoom_dependent)
            }
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                input.is_zoom_dependent()
                    || fallback.is_zoom_dependent()
                    || arms.iter().any(|(_, e)| e.is_zoom_dependent())
            }
            Expression::Interpolate { input, stops } => {
                input.is_zoom_dependent() || stops.iter().any(|(_, e)| e.is_zoom_dependent())
            }
        }
    }
}

fn arity(op: &'static str, expected: &'static str, found: usize) -> ExpressionError {
    ExpressionError::Arity {
        op,
        expected,
        found,
    }
}

fn expect_bool(value: StyleValue) -> Result<bool, ExpressionError> {
    value.as_bool().ok_or_else(|| ExpressionError::TypeMismatch {
        expected: "boolean",
        found: value.type_name().to_string(),
    })
}

fn parse_all(args: &[Value]) -> Result<Vec<Expression>, ExpressionError> {
    args.iter().map(Expression::parse).collect()
}

fn parse_match(args: &[Value]) -> Result<Expression, ExpressionError> {
    // input, (label, output)+, fallback
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(arity("match", "an input, label/output pairs and a fallback", args.len()));
    }
    let input = Box::new(Expression::parse(&args[0])?);
    let fallback = Box::new(Expression::parse(&args[args.len() - 1])?);

    let arms = args[1..args.len() - 1]
        .chunks_exact(2)
        .map(|pair| -> Result<(Vec<Label>, Expression), ExpressionError> {
            let labels = match &pair[0] {
                Value::Array(items) if !items.is_empty() => {
                    items.iter().map(Label::parse).collect::<Result<Vec<_>, _>>()?
                }
                single => vec![Label::parse(single)?],
            };
            Ok((labels, Expression::parse(&pair[1])?))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Expression::Match {
        input,
        arms,
        fallback,
    })
}

fn parse_interpolate(args: &[Value]) -> Result<Expression, ExpressionError> {
    // ["linear"], input, (stop, output)+
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(arity("interpolate", "a type, an input and stop/output pairs", args.len()));
    }
    match &args[0] {
        Value::Array(kind) if kind.len() == 1 && kind[0] == "linear" => {}
        other => return Err(ExpressionError::UnsupportedInterpolation(other.to_string())),
    }
    let input = Box::new(Expression::parse(&args[1])?);

    let mut stops = Vec::with_capacity((args.len() - 2) / 2);
    for pair in args[2..].chunks_exact(2) {
        let stop = pair[0].as_f64().ok_or(ExpressionError::InvalidStops)?;
        if let Some((prev, _)) = stops.last() {
            if stop <= *prev {
                return Err(ExpressionError::InvalidStops);
            }
        }
        stops.push((stop, Expression::parse(&pair[1])?));
    }

    Ok(Expression::Interpolate { input, stops })
}

fn interpolate(
    stops: &[(f64, Expression)],
    x: f64,
    ctx: &EvalContext<'_>,
) -> Result<StyleValue, ExpressionError> {
    let upper = stops.iter().position(|(stop, _)| *stop > x);
    let (lo, hi) = match upper {
        Some(0) => return stops[0].1.evaluate(ctx),
        None => return stops[stops.len() - 1].1.evaluate(ctx),
        Some(i) => (&stops[i - 1], &stops[i]),
    };

    let t = (x - lo.0) / (hi.0 - lo.0);
    let a = lo.1.evaluate(ctx)?;
    let b = hi.1.evaluate(ctx)?;

    if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
        return Ok(StyleValue::Number(a + (b - a) * t));
    }
    match (a.as_color(), b.as_color()) {
        (Some(a), Some(b)) => Ok(StyleValue::Color(a.lerp(b, t))),
        _ => Err(ExpressionError::TypeMismatch {
            expected: "numbers or colors at interpolation stops",
            found: format!("{} and {}", a.type_name(), b.type_name()),
        }),
    }
}
