// src/query.rs
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::document::{get_path, Potato};
use crate::error::{PotatoError, Result};
use crate::value::{compare, deep_equal, js_string, loose_eq, strict_eq, strict_eq_opt};

/// Opaque test function over one potato.
pub type Predicate = Arc<dyn Fn(&Potato) -> bool + Send + Sync>;

/// What a caller passes to select potatoes: a closure, a raw JSON query
/// object, or an already built [`Query`].
#[derive(Clone)]
pub enum Test {
    Predicate(Predicate),
    Spec(Value),
    Query(Query),
}

impl Test {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Potato) -> bool + Send + Sync + 'static,
    {
        Test::Predicate(Arc::new(f))
    }

    /// Matches every potato.
    pub fn all() -> Self {
        Test::Spec(Value::Null)
    }
}

impl Default for Test {
    fn default() -> Self {
        Test::all()
    }
}

impl From<Value> for Test {
    fn from(value: Value) -> Self {
        Test::Spec(value)
    }
}

impl From<Query> for Test {
    fn from(query: Query) -> Self {
        Test::Query(query)
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Predicate(_) => f.write_str("Test::Predicate(..)"),
            Test::Spec(value) => f.debug_tuple("Test::Spec").field(value).finish(),
            Test::Query(query) => f.debug_tuple("Test::Query").field(query).finish(),
        }
    }
}

/// Field-level operators
#[derive(Debug, Clone)]
pub enum QueryOperator {
    Gt(Value),        // $gt
    Gte(Value),       // $gte
    Lt(Value),        // $lt
    Lte(Value),       // $lte
    Eq(Value),        // $eq, and plain literals
    Eqv(Value),       // $eqv
    Neq(Value),       // $neq
    Neqv(Value),      // $neqv
    In(Value),        // $in
    Nin(Value),       // $nin
    All(Value),       // $all
    ElemMatch(Value), // $elemMatch
    Regex(Regex),     // $regex
    Exists(bool),     // $exists
}

#[derive(Clone)]
pub enum Condition {
    Field {
        path: String,
        operators: Vec<QueryOperator>,
    },
    And(Vec<Query>),
    Or(Vec<Query>),
    Nor(Vec<Query>),
    Predicate(Predicate),
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Field { path, operators } => f
                .debug_struct("Field")
                .field("path", path)
                .field("operators", operators)
                .finish(),
            Condition::And(queries) => f.debug_tuple("And").field(queries).finish(),
            Condition::Or(queries) => f.debug_tuple("Or").field(queries).finish(),
            Condition::Nor(queries) => f.debug_tuple("Nor").field(queries).finish(),
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A compiled query: every condition must hold.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub conditions: Vec<Condition>,
}

impl Query {
    pub fn new() -> Self {
        Query {
            conditions: Vec::new(),
        }
    }

    /// Compiles whatever the caller passed, reporting validation failures
    /// under the caller's operation name.
    pub fn compile(test: &Test, caller: &str) -> Result<Self> {
        match test {
            Test::Predicate(predicate) => Ok(Query {
                conditions: vec![Condition::Predicate(Arc::clone(predicate))],
            }),
            Test::Query(query) => Ok(query.clone()),
            Test::Spec(spec) => {
                let map = validate_query(spec, caller)?;
                Self::from_map(&map)
            }
        }
    }

    /// Query parsing from JSON; `null` matches everything.
    pub fn from_json(json: &Value) -> Result<Self> {
        match json {
            Value::Null => Ok(Query::new()),
            Value::Object(map) => Self::from_map(map),
            other => Err(PotatoError::validation(format!(
                "query must be an object, got {}",
                other
            ))),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut query = Query::new();

        for (field, condition) in map {
            if field.starts_with('$') {
                query.conditions.push(Self::parse_logical_operator(field, condition)?);
            } else {
                query.conditions.push(Condition::Field {
                    path: field.clone(),
                    operators: Self::parse_field_condition(condition)?,
                });
            }
        }

        Ok(query)
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition> {
        let parse_branches = |value: &Value| -> Result<Vec<Query>> {
            match value {
                Value::Array(arr) => arr
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => Self::from_map(map),
                        _ => Err(PotatoError::validation(format!(
                            "{} expects an array of query objects",
                            op
                        ))),
                    })
                    .collect(),
                _ => Err(PotatoError::validation(format!("{} requires array", op))),
            }
        };

        match op {
            "$and" => Ok(Condition::And(parse_branches(value)?)),
            "$or" => Ok(Condition::Or(parse_branches(value)?)),
            "$nor" => Ok(Condition::Nor(parse_branches(value)?)),
            _ => Err(PotatoError::validation(format!(
                "Unknown logical operator: {}",
                op
            ))),
        }
    }

    fn parse_field_condition(value: &Value) -> Result<Vec<QueryOperator>> {
        match value {
            Value::Object(map) if is_operator_block(map) => {
                let mut operators = Vec::with_capacity(map.len());

                for (op, arg) in map {
                    let operator = match op.as_str() {
                        "$gt" => QueryOperator::Gt(arg.clone()),
                        "$gte" => QueryOperator::Gte(arg.clone()),
                        "$lt" => QueryOperator::Lt(arg.clone()),
                        "$lte" => QueryOperator::Lte(arg.clone()),
                        "$eq" => QueryOperator::Eq(arg.clone()),
                        "$eqv" => QueryOperator::Eqv(arg.clone()),
                        "$neq" => QueryOperator::Neq(arg.clone()),
                        "$neqv" => QueryOperator::Neqv(arg.clone()),
                        "$in" => QueryOperator::In(arg.clone()),
                        "$nin" => QueryOperator::Nin(arg.clone()),
                        "$all" => QueryOperator::All(arg.clone()),
                        "$elemMatch" => QueryOperator::ElemMatch(arg.clone()),
                        "$regex" => QueryOperator::Regex(build_regex(arg, map.get("$options"))?),
                        // consumed together with $regex
                        "$options" if map.contains_key("$regex") => continue,
                        "$exists" => match arg {
                            Value::Bool(b) => QueryOperator::Exists(*b),
                            _ => return Err(PotatoError::validation("$exists requires bool")),
                        },
                        _ => {
                            return Err(PotatoError::validation(format!(
                                "Unknown operator: {}",
                                op
                            )))
                        }
                    };
                    operators.push(operator);
                }

                Ok(operators)
            }
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => Err(
                PotatoError::validation("cannot mix operators and plain fields in one condition"),
            ),
            // plain literal: strict equality
            _ => Ok(vec![QueryOperator::Eq(value.clone())]),
        }
    }

    /// Adds a field condition.
    pub fn with(mut self, path: impl Into<String>, operator: QueryOperator) -> Self {
        let path = path.into();

        for condition in &mut self.conditions {
            if let Condition::Field { path: existing, operators } = condition {
                if *existing == path {
                    operators.push(operator);
                    return self;
                }
            }
        }

        self.conditions.push(Condition::Field {
            path,
            operators: vec![operator],
        });
        self
    }

    /// Adds a regular-expression condition on the string form of a field.
    pub fn with_regex(self, path: impl Into<String>, regex: Regex) -> Self {
        self.with(path, QueryOperator::Regex(regex))
    }

    pub fn or(mut self, branches: Vec<Query>) -> Self {
        self.conditions.push(Condition::Or(branches));
        self
    }

    pub fn and(mut self, branches: Vec<Query>) -> Self {
        self.conditions.push(Condition::And(branches));
        self
    }

    pub fn nor(mut self, branches: Vec<Query>) -> Self {
        self.conditions.push(Condition::Nor(branches));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether a potato satisfies every condition.
    pub fn matches(&self, potato: &Potato) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Field { path, operators } => {
                let value = get_path(potato.as_map(), path);
                operators.iter().all(|op| Self::matches_operator(value, op))
            }
            Condition::And(queries) => queries.iter().all(|q| q.matches(potato)),
            Condition::Or(queries) => queries.iter().any(|q| q.matches(potato)),
            Condition::Nor(queries) => !queries.iter().any(|q| q.matches(potato)),
            Condition::Predicate(predicate) => predicate(potato),
        })
    }

    fn matches_operator(value: Option<&Value>, operator: &QueryOperator) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match operator {
            QueryOperator::Gt(target) => compare(value, target) == Some(Greater),
            QueryOperator::Gte(target) => matches!(compare(value, target), Some(Greater | Equal)),
            QueryOperator::Lt(target) => compare(value, target) == Some(Less),
            QueryOperator::Lte(target) => matches!(compare(value, target), Some(Less | Equal)),
            QueryOperator::Eq(target) => strict_eq_opt(value, target),
            QueryOperator::Neq(target) => !strict_eq_opt(value, target),
            QueryOperator::Eqv(target) => loose_eq(value, target),
            QueryOperator::Neqv(target) => !loose_eq(value, target),
            QueryOperator::In(target) => in_test(value, target),
            QueryOperator::Nin(target) => !in_test(value, target),
            QueryOperator::All(target) => match (value, target) {
                (Some(Value::Array(have)), Value::Array(wanted)) => {
                    wanted.iter().all(|w| contains(have, w))
                }
                _ => false,
            },
            QueryOperator::ElemMatch(target) => match value {
                Some(Value::Array(items)) => items.iter().any(|item| deep_equal(item, target)),
                _ => false,
            },
            QueryOperator::Regex(regex) => regex.is_match(&js_string(value)),
            QueryOperator::Exists(should_exist) => value.is_some() == *should_exist,
        }
    }
}

/// Null/absent becomes the match-all query; anything but an object is
/// rejected in the caller's name.
pub fn validate_query(spec: &Value, caller: &str) -> Result<Map<String, Value>> {
    match spec {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        _ => Err(PotatoError::validation(format!(
            "{} expected a test function or a query object as a first argument",
            caller
        ))),
    }
}

/// An empty object is an operator block with no conditions.
fn is_operator_block(map: &Map<String, Value>) -> bool {
    map.keys().all(|k| k.starts_with('$'))
}

fn build_regex(pattern: &Value, options: Option<&Value>) -> Result<Regex> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| PotatoError::validation("$regex requires string"))?;
    let flags = match options {
        None => "",
        Some(Value::String(flags)) => flags.as_str(),
        Some(_) => return Err(PotatoError::validation("$options requires string")),
    };

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            // JS-only flags without a matching counterpart
            'g' | 'u' | 'y' => &mut builder,
            other => {
                return Err(PotatoError::validation(format!(
                    "Unknown regex option: {}",
                    other
                )))
            }
        };
    }

    builder
        .build()
        .map_err(|e| PotatoError::validation(format!("Invalid regex: {}", e)))
}

fn contains(items: &[Value], needle: &Value) -> bool {
    items.iter().any(|item| strict_eq(item, needle))
}

fn in_test(value: Option<&Value>, target: &Value) -> bool {
    if let Some(Value::Array(have)) = value {
        if contains(have, target) {
            return true;
        }
    }

    if let (Value::Array(candidates), Some(v)) = (target, value) {
        if contains(candidates, v) {
            return true;
        }
    }

    match (value, target) {
        (Some(Value::Array(have)), Value::Array(candidates)) => {
            candidates.iter().any(|c| contains(have, c))
        }
        _ => false,
    }
}
