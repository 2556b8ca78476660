use core::fmt;
use std::collections::BTreeMap;

use crate::distribution::Potential;
use crate::eval::model::Model;

/// Values exchanged between models and the executor.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A model node carried as data. Never valid inside a returned value.
    Model(Model),
    /// A potential term handed back to the computation that yielded it.
    Potential(Potential),
    #[default]
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(x) => write!(f, "{}", x),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Model(model) => write!(f, "<model {}>", model.name().unwrap_or("<anonymous>")),
            Value::Potential(potential) => write!(f, "<potential {}>", potential.value()),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Integer(i) => Some(*i as f64),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Potential(potential) => Some(potential.value()),
            _ => None,
        }
    }

    /// Depth-first search through lists and maps for the first value matching `predicate`.
    pub fn find_nested<'a, F>(&'a self, predicate: &F) -> Option<&'a Value>
    where
        F: Fn(&Value) -> bool,
    {
        if predicate(self) {
            return Some(self);
        }
        match self {
            Value::List(items) => items.iter().find_map(|item| item.find_nested(predicate)),
            Value::Map(entries) => entries
                .values()
                .find_map(|item| item.find_nested(predicate)),
            _ => None,
        }
    }

    pub fn contains_model(&self) -> bool {
        self.find_nested(&|value| matches!(value, Value::Model(_)))
            .is_some()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::List(values.into_iter().map(Value::Float).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl From<Potential> for Value {
    fn from(potential: Potential) -> Self {
        Value::Potential(potential)
    }
}

impl From<Model> for Value {
    fn from(model: Model) -> Self {
        Value::Model(model)
    }
}
