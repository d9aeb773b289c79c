//! Content predicates deciding whether a stored mock answers a request.
//!
//! The predicate is a persisted property of each mock. SOAP mocks typically use
//! `xpath`, REST mocks `jsonPath`; `equals`, `contains` and `matches` work on
//! the raw content of either.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json_path::JsonPath;

/// Persisted match rule. Written in config as one of
/// `{xpath, equals?}`, `{jsonPath, equals?}`, `{equals}`, `{contains}`,
/// `{matches}`; absent means any request matches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(untagged)]
pub enum BodyPredicate {
    /// XPath expression; matches when it selects a value (equal to `equals` if given)
    XPath {
        xpath: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        equals: Option<String>,
    },

    /// JSONPath query; matches when it selects a node (equal to `equals` if given)
    JsonPath {
        #[serde(rename = "jsonPath")]
        json_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        equals: Option<String>,
    },

    /// Exact content equality
    Equals { equals: String },

    /// Content contains substring
    Contains { contains: String },

    /// Regex pattern match
    Matches { matches: String },

    /// Matches every request
    #[default]
    Any,
}

#[derive(Debug, thiserror::Error)]
pub enum PredicateError {
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid JSONPath '{path}': {reason}")]
    JsonPath { path: String, reason: String },
    #[error("invalid XPath '{0}'")]
    XPath(String),
}

/// Predicate ready for evaluation (regex and JSONPath parsed once).
pub enum CompiledPredicate {
    Any,
    Equals(String),
    Contains(String),
    Matches(Regex),
    JsonPath {
        query: JsonPath,
        equals: Option<String>,
    },
    XPath {
        path: String,
        equals: Option<String>,
    },
}

impl CompiledPredicate {
    pub fn compile(predicate: &BodyPredicate) -> Result<Self, PredicateError> {
        match predicate {
            BodyPredicate::Any => Ok(CompiledPredicate::Any),
            BodyPredicate::Equals { equals } => Ok(CompiledPredicate::Equals(equals.clone())),
            BodyPredicate::Contains { contains } => {
                Ok(CompiledPredicate::Contains(contains.clone()))
            }
            BodyPredicate::Matches { matches } => {
                Ok(CompiledPredicate::Matches(Regex::new(matches)?))
            }
            BodyPredicate::JsonPath { json_path, equals } => {
                let query = JsonPath::parse(json_path).map_err(|e| PredicateError::JsonPath {
                    path: json_path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(CompiledPredicate::JsonPath {
                    query,
                    equals: equals.clone(),
                })
            }
            BodyPredicate::XPath { xpath, equals } => {
                sxd_xpath::Factory::new()
                    .build(xpath)
                    .ok()
                    .flatten()
                    .ok_or_else(|| PredicateError::XPath(xpath.clone()))?;
                Ok(CompiledPredicate::XPath {
                    path: xpath.clone(),
                    equals: equals.clone(),
                })
            }
        }
    }

    pub fn matches(&self, content: &str) -> bool {
        match self {
            CompiledPredicate::Any => true,
            CompiledPredicate::Equals(expected) => content == expected,
            CompiledPredicate::Contains(needle) => content.contains(needle.as_str()),
            CompiledPredicate::Matches(regex) => regex.is_match(content),
            CompiledPredicate::JsonPath { query, equals } => {
                compare(extract_json_path(content, query), equals.as_deref())
            }
            CompiledPredicate::XPath { path, equals } => {
                compare(extract_xpath(content, path), equals.as_deref())
            }
        }
    }
}

fn compare(found: Option<String>, expected: Option<&str>) -> bool {
    match (found, expected) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(value), Some(expected)) => value == expected,
    }
}

/// First node selected by `query`, rendered as text (strings unquoted).
fn extract_json_path(content: &str, query: &JsonPath) -> Option<String> {
    let document: serde_json::Value = serde_json::from_str(content).ok()?;
    let nodes = query.query(&document);
    let first = nodes.iter().next()?;
    Some(match first {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Value selected by an XPath expression. Empty node sets and `false` select nothing.
fn extract_xpath(content: &str, path: &str) -> Option<String> {
    use sxd_document::parser;
    use sxd_xpath::{evaluate_xpath, Value};

    let package = parser::parse(content).ok()?;
    let document = package.as_document();

    match evaluate_xpath(&document, path).ok()? {
        Value::String(s) => Some(s),
        Value::Number(n) => {
            if n.fract() == 0.0 {
                Some(format!("{}", n as i64))
            } else {
                Some(n.to_string())
            }
        }
        Value::Boolean(true) => Some("true".to_string()),
        Value::Boolean(false) => None,
        Value::Nodeset(nodes) => nodes.document_order_first().map(|node| node.string_value()),
    }
}
