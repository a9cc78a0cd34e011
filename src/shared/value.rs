//! Typed payload values
//!
//! Every payload that flows through the engine is built from [`Value`].
//! Merge rules branch on the shape of a value (scalar vs point array), so
//! payloads are never carried as opaque blobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field map used by modify payloads and spatial modify operations
pub type Fields = BTreeMap<String, Value>;

/// A 2-D point on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise sum
    pub fn offset(self, delta: Point) -> Point {
        Point::new(self.x + delta.x, self.y + delta.y)
    }

    /// Component-wise negation
    pub fn negate(self) -> Point {
        Point::new(-self.x, -self.y)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Structured value carried by payloads and CRDT registers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent value; assigning it to a field removes the field
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Point(Point),
    /// Ordered point array such as a stroke path
    Points(Vec<Point>),
    List(Vec<Value>),
    Map(Fields),
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            Value::Point(point) => Some(*point),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Stable sort key used where values must be totally ordered (CRDT sets)
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Apply `fields` onto `target`, removing fields set to [`Value::Null`].
///
/// Returns the prior value of every touched field (`Null` when absent), which
/// is the snapshot needed to invert the assignment.
pub fn assign_fields(target: &mut Fields, fields: &Fields) -> Fields {
    let mut prior = Fields::new();
    for (name, value) in fields {
        let previous = if value.is_null() {
            target.remove(name)
        } else {
            target.insert(name.clone(), value.clone())
        };
        prior.insert(name.clone(), previous.unwrap_or(Value::Null));
    }
    prior
}

/// Concatenate two point arrays, dropping the duplicated boundary point
pub fn join_points(first: &[Point], second: &[Point]) -> Vec<Point> {
    let mut joined = first.to_vec();
    let skip = match (first.last(), second.first()) {
        (Some(a), Some(b)) if a == b => 1,
        _ => 0,
    };
    joined.extend_from_slice(&second[skip..]);
    joined
}
