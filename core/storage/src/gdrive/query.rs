//! Structured builder for Google Drive search queries.
//!
//! Drive filters files with a small text language (`name contains 'x' and
//! 'folder' in parents`). Instead of formatting those strings by hand, callers
//! build a [`Term`] tree and serialize it with [`Term::to_query`]:
//!
//! ```
//! use vaultdrive_storage::gdrive::query::Term;
//!
//! let query = Term::name_contains("pwsafe") & Term::children_of("X1");
//! assert_eq!(query.to_query(), "name contains 'pwsafe' and 'X1' in parents");
//! ```

use std::fmt;
use std::ops::BitAnd;

use serde_json::Value;

use vaultdrive_common::{Error, Result};

/// Operators understood by the Drive query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Contains,
    Equals,
    In,
    And,
}

impl Operator {
    /// The operator's token in query text.
    pub fn token(self) -> &'static str {
        match self {
            Operator::Contains => "contains",
            Operator::Equals => "=",
            Operator::In => "in",
            Operator::And => "and",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A literal value the query language can express.
///
/// Only strings and ordered lists of literals exist here; anything else is
/// rejected when converting from a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    Text(String),
    List(Vec<LiteralValue>),
}

impl LiteralValue {
    fn write_query(&self, out: &mut String) {
        match self {
            LiteralValue::Text(text) => {
                out.push('\'');
                for c in text.chars() {
                    if c == '\'' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('\'');
            }
            LiteralValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_query(out);
                }
                out.push(']');
            }
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(text: &str) -> Self {
        LiteralValue::Text(text.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(text: String) -> Self {
        LiteralValue::Text(text)
    }
}

impl<T: Into<LiteralValue>> From<Vec<T>> for LiteralValue {
    fn from(items: Vec<T>) -> Self {
        LiteralValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for LiteralValue {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(LiteralValue::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(LiteralValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(LiteralValue::List),
            Value::Null => Err(Error::UnsupportedValueKind("null".to_string())),
            Value::Bool(b) => Err(Error::UnsupportedValueKind(format!("boolean {}", b))),
            Value::Number(n) => Err(Error::UnsupportedValueKind(format!("number {}", n))),
            Value::Object(_) => Err(Error::UnsupportedValueKind("object".to_string())),
        }
    }
}

/// One node of a query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAtom {
    /// A field name, written bare. Field names come from a fixed trusted set.
    Field(String),
    /// A quoted literal.
    Literal(LiteralValue),
    /// A nested binary term.
    Term(Box<Term>),
}

impl QueryAtom {
    /// A field reference.
    pub fn field(name: impl Into<String>) -> Self {
        QueryAtom::Field(name.into())
    }

    /// A literal from any supported value.
    pub fn literal(value: impl Into<LiteralValue>) -> Self {
        QueryAtom::Literal(value.into())
    }

    /// A literal from an untyped JSON value.
    ///
    /// # Errors
    /// - `UnsupportedValueKind` for numbers, booleans, null and objects,
    ///   including when nested inside an array
    pub fn literal_from_json(value: Value) -> Result<Self> {
        LiteralValue::try_from(value).map(QueryAtom::Literal)
    }

    /// Serialize to query text.
    pub fn to_query(&self) -> String {
        let mut out = String::new();
        self.write_query(&mut out);
        out
    }

    fn write_query(&self, out: &mut String) {
        match self {
            QueryAtom::Field(name) => out.push_str(name),
            QueryAtom::Literal(value) => value.write_query(out),
            QueryAtom::Term(term) => term.write_query(out),
        }
    }
}

impl From<Term> for QueryAtom {
    fn from(term: Term) -> Self {
        QueryAtom::Term(Box::new(term))
    }
}

impl fmt::Display for QueryAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

/// Two atoms joined by an operator: `<left> <op> <right>`.
///
/// No parentheses are ever added; precedence is whatever Drive defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub left: QueryAtom,
    pub op: Operator,
    pub right: QueryAtom,
}

impl Term {
    /// Create a term.
    pub fn new(left: impl Into<QueryAtom>, op: Operator, right: impl Into<QueryAtom>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// `'<parent_id>' in parents`
    pub fn children_of(parent_id: &str) -> Self {
        Self::new(
            QueryAtom::literal(parent_id),
            Operator::In,
            QueryAtom::field("parents"),
        )
    }

    /// `name contains '<pattern>'`
    pub fn name_contains(pattern: &str) -> Self {
        Self::new(
            QueryAtom::field("name"),
            Operator::Contains,
            QueryAtom::literal(pattern),
        )
    }

    /// `name = '<name>'`
    pub fn name_equals(name: &str) -> Self {
        Self::new(
            QueryAtom::field("name"),
            Operator::Equals,
            QueryAtom::literal(name),
        )
    }

    /// Serialize to query text.
    pub fn to_query(&self) -> String {
        let mut out = String::new();
        self.write_query(&mut out);
        out
    }

    fn write_query(&self, out: &mut String) {
        self.left.write_query(out);
        out.push(' ');
        out.push_str(self.op.token());
        out.push(' ');
        self.right.write_query(out);
    }
}

impl BitAnd for Term {
    type Output = Term;

    fn bitand(self, rhs: Term) -> Term {
        Term::new(self, Operator::And, rhs)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_field_is_bare() {
        assert_eq!(QueryAtom::field("parents").to_query(), "parents");
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(QueryAtom::literal("plain").to_query(), "'plain'");
        assert_eq!(QueryAtom::literal("it's").to_query(), r"'it\'s'");
        assert_eq!(QueryAtom::literal(r"a\b").to_query(), r"'a\\b'");
        // Only quote and backslash are escaped.
        assert_eq!(QueryAtom::literal("a\"b\n").to_query(), "'a\"b\n'");
    }

    #[test]
    fn test_list_literal() {
        let atom = QueryAtom::literal(vec!["a", "b'c"]);
        assert_eq!(atom.to_query(), r"['a','b\'c']");

        let empty: Vec<String> = vec![];
        assert_eq!(QueryAtom::literal(empty).to_query(), "[]");
    }

    #[test]
    fn test_nested_list_literal() {
        let nested = LiteralValue::List(vec![
            LiteralValue::from("x"),
            LiteralValue::from(vec!["y", "z"]),
        ]);
        assert_eq!(QueryAtom::Literal(nested).to_query(), "['x',['y','z']]");
    }

    #[test]
    fn test_json_literals() {
        let atom = QueryAtom::literal_from_json(serde_json::json!(["a", ["b"]])).unwrap();
        assert_eq!(atom.to_query(), "['a',['b']]");
    }

    #[test]
    fn test_unsupported_json_values_rejected() {
        for value in [
            serde_json::json!(42),
            serde_json::json!(true),
            serde_json::json!(null),
            serde_json::json!({"a": "b"}),
            serde_json::json!(["ok", 1]),
        ] {
            let result = QueryAtom::literal_from_json(value);
            assert!(matches!(result, Err(Error::UnsupportedValueKind(_))));
        }
    }

    #[test]
    fn test_children_of() {
        assert_eq!(Term::children_of("root").to_query(), "'root' in parents");
        assert_eq!(Term::children_of("X1").to_query(), "'X1' in parents");
    }

    #[test]
    fn test_name_contains() {
        assert_eq!(
            Term::name_contains("pwsafe.kdbx").to_query(),
            "name contains 'pwsafe.kdbx'"
        );
    }

    #[test]
    fn test_name_equals() {
        assert_eq!(Term::name_equals("o'brien").to_query(), r"name = 'o\'brien'");
    }

    #[test]
    fn test_conjunction() {
        let query = Term::name_contains("db") & Term::children_of("F");
        assert_eq!(query.op, Operator::And);
        assert_eq!(query.to_query(), "name contains 'db' and 'F' in parents");
    }

    #[test]
    fn test_conjunction_chain_has_no_parentheses() {
        let query = Term::name_contains("a") & Term::name_contains("b") & Term::children_of("c");
        assert_eq!(
            query.to_string(),
            "name contains 'a' and name contains 'b' and 'c' in parents"
        );
    }

    #[test]
    fn test_operator_tokens() {
        assert_eq!(Operator::Contains.token(), "contains");
        assert_eq!(Operator::Equals.token(), "=");
        assert_eq!(Operator::In.token(), "in");
        assert_eq!(Operator::And.token(), "and");
    }

    /// Undo the escaping of a single quoted token, failing if it is not one.
    fn unquote(token: &str) -> Option<String> {
        let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(chars.next()?),
                '\'' => return None,
                other => out.push(other),
            }
        }
        Some(out)
    }

    proptest! {
        #[test]
        fn prop_string_literal_is_single_token(s in any::<String>()) {
            let query = QueryAtom::literal(s.as_str()).to_query();
            prop_assert_eq!(unquote(&query), Some(s));
        }

        #[test]
        fn prop_list_joins_element_serializations(
            items in prop::collection::vec(any::<String>(), 0..8)
        ) {
            let expected = format!(
                "[{}]",
                items
                    .iter()
                    .map(|s| QueryAtom::literal(s.as_str()).to_query())
                    .collect::<Vec<_>>()
                    .join(",")
            );
            prop_assert_eq!(QueryAtom::literal(items).to_query(), expected);
        }

        #[test]
        fn prop_and_term_joins_operands(a in "[a-z]{1,8}", b in any::<String>()) {
            let left = QueryAtom::field(a.clone());
            let right = QueryAtom::literal(b.as_str());
            let term = Term::new(left.clone(), Operator::And, right.clone());
            prop_assert_eq!(
                term.to_query(),
                format!("{} and {}", left.to_query(), right.to_query())
            );
        }
    }
}
