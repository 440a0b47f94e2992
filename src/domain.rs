use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::xmlrpc::{Struct, ToValue, Value};

/// Comparison operators accepted in a domain leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    LessOrEq,
    Less,
    Greater,
    GreaterOrEq,
    EqIfSet,
    EqLike,
    EqILike,
    Like,
    NotLike,
    ILike,
    NotILike,
    In,
    NotIn,
    ChildOf,
    ParentOf,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::LessOrEq => "<=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::GreaterOrEq => ">=",
            Operator::EqIfSet => "=?",
            Operator::EqLike => "=like",
            Operator::EqILike => "=ilike",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::ChildOf => "child_of",
            Operator::ParentOf => "parent_of",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Operator> {
        let op = match s {
            "=" => Operator::Eq,
            "!=" => Operator::NotEq,
            "<=" => Operator::LessOrEq,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            ">=" => Operator::GreaterOrEq,
            "=?" => Operator::EqIfSet,
            "=like" => Operator::EqLike,
            "=ilike" => Operator::EqILike,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "ilike" => Operator::ILike,
            "not ilike" => Operator::NotILike,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "child_of" => Operator::ChildOf,
            "parent_of" => Operator::ParentOf,
            _ => return Err(Error::InvalidDomain(format!("unknown operator `{}`", s))),
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Leaf {
        field: String,
        operator: Operator,
        value: Value,
    },
    And,
    Or,
    Not,
}

/// A search filter in Odoo's prefix (Polish) notation.
///
/// Consecutive leaves are implicitly and-ed by the server; `and`, `or` and
/// `not` push the explicit prefix operators, which apply to the terms that
/// follow them.
///
/// ```
/// use odoo_xmlrpc::{Domain, Operator};
///
/// // is_company AND (country is BE OR country is FR)
/// let domain = Domain::new()
///     .filter("is_company", Operator::Eq, true)
///     .or()
///     .filter("country_id.code", Operator::Eq, "BE")
///     .filter("country_id.code", Operator::Eq, "FR");
/// assert_eq!(4, domain.len());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    terms: Vec<Term>,
}

impl Domain {
    /// The empty domain, matching every record.
    pub fn new() -> Domain {
        Domain::default()
    }

    pub fn filter<V: ToValue>(mut self, field: &str, operator: Operator, value: V) -> Domain {
        self.terms.push(Term::Leaf {
            field: field.to_string(),
            operator,
            value: value.to_value(),
        });
        self
    }

    pub fn and(mut self) -> Domain {
        self.terms.push(Term::And);
        self
    }

    pub fn or(mut self) -> Domain {
        self.terms.push(Term::Or);
        self
    }

    pub fn not(mut self) -> Domain {
        self.terms.push(Term::Not);
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

impl ToValue for Domain {
    fn to_value(&self) -> Value {
        Value::Array(
            self.terms
                .iter()
                .map(|term| match *term {
                    Term::Leaf {
                        ref field,
                        operator,
                        ref value,
                    } => Value::Array(vec![
                        Value::String(field.clone()),
                        Value::String(operator.as_str().to_string()),
                        value.clone(),
                    ]),
                    Term::And => Value::String("&".to_string()),
                    Term::Or => Value::String("|".to_string()),
                    Term::Not => Value::String("!".to_string()),
                })
                .collect(),
        )
    }
}

impl TryFrom<Value> for Domain {
    type Error = Error;

    fn try_from(value: Value) -> Result<Domain> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(Error::InvalidDomain(format!(
                    "expected an array, got {}",
                    other.type_name()
                )))
            }
        };

        let mut terms = Vec::with_capacity(items.len());
        for item in items {
            let term = match item {
                Value::String(ref op) if op == "&" => Term::And,
                Value::String(ref op) if op == "|" => Term::Or,
                Value::String(ref op) if op == "!" => Term::Not,
                Value::Array(leaf) => {
                    let mut parts = leaf.into_iter();
                    match (parts.next(), parts.next(), parts.next(), parts.next()) {
                        (Some(Value::String(field)), Some(Value::String(op)), Some(value), None) => {
                            Term::Leaf {
                                field,
                                operator: op.parse()?,
                                value,
                            }
                        }
                        _ => {
                            return Err(Error::InvalidDomain(
                                "a leaf must be [field, operator, value]".to_string(),
                            ))
                        }
                    }
                }
                other => {
                    return Err(Error::InvalidDomain(format!("unexpected term {}", other.type_name())))
                }
            };
            terms.push(term);
        }
        Ok(Domain { terms })
    }
}

/// Paging and ordering for `search` and `search_read`. Unset options are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub order: Option<String>,
}

impl SearchOptions {
    pub fn new() -> SearchOptions {
        SearchOptions::default()
    }

    pub fn offset(mut self, offset: u32) -> SearchOptions {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u32) -> SearchOptions {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: &str) -> SearchOptions {
        self.order = Some(order.to_string());
        self
    }

    /// Adds the set options to an `execute_kw` keyword struct.
    pub fn apply(&self, kwargs: &mut Struct) {
        if let Some(offset) = self.offset {
            kwargs.insert("offset".to_string(), offset.to_value());
        }
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), limit.to_value());
        }
        if let Some(ref order) = self.order {
            kwargs.insert("order".to_string(), order.to_value());
        }
    }
}
