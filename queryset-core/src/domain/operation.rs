use serde::{Deserialize, Serialize};
use std::fmt;

use super::chain::ChainError;

/// Where an operation's remote resource lives.
///
/// The remote service spells transforms as `trf`, so that is the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "trf", alias = "transform")]
    Transform,
}

impl Namespace {
    /// Path segment used when resolving a chain.
    pub fn as_path(&self) -> &'static str {
        match self {
            Namespace::Base => "base",
            Namespace::Transform => "trf",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ChainError> {
        match s {
            "base" => Ok(Namespace::Base),
            "trf" | "transform" => Ok(Namespace::Transform),
            other => Err(ChainError::UnknownNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// A scalar operation argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Int(i64),
    Str(String),
}

impl Argument {
    /// Parse a pipeline token. Integer-looking tokens become `Int`.
    pub fn from_token(token: &str) -> Self {
        token
            .parse::<i64>()
            .map(Argument::Int)
            .unwrap_or_else(|_| Argument::Str(token.to_string()))
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Int(i) => write!(f, "{i}"),
            Argument::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::Str(s.to_string())
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Argument::Str(s)
    }
}

impl From<i64> for Argument {
    fn from(i: i64) -> Self {
        Argument::Int(i)
    }
}

impl TryFrom<&serde_json::Value> for Argument {
    type Error = ChainError;

    /// Only strings and integers are accepted. Floats, booleans, null,
    /// arrays and objects are rejected.
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(s) => Ok(Argument::Str(s.clone())),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Argument::Int)
                .ok_or_else(|| ChainError::NonScalarArgument(value.to_string())),
            other => Err(ChainError::NonScalarArgument(other.to_string())),
        }
    }
}

/// A single named step in a chain: fetch a raw column, or apply a transform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawOperation")]
pub struct Operation {
    pub namespace: Namespace,
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Deserialize)]
struct RawOperation {
    namespace: Namespace,
    name: String,
    #[serde(default)]
    arguments: Vec<Argument>,
}

impl TryFrom<RawOperation> for Operation {
    type Error = ChainError;

    fn try_from(raw: RawOperation) -> Result<Self, Self::Error> {
        Operation::new(raw.namespace, raw.name, raw.arguments)
    }
}

impl Operation {
    pub fn new(
        namespace: Namespace,
        name: impl Into<String>,
        arguments: Vec<Argument>,
    ) -> Result<Self, ChainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ChainError::EmptyName);
        }
        Ok(Self {
            namespace,
            name,
            arguments,
        })
    }

    /// Raw column fetch.
    pub fn base(name: impl Into<String>, arguments: Vec<Argument>) -> Result<Self, ChainError> {
        Self::new(Namespace::Base, name, arguments)
    }

    pub fn transform(
        name: impl Into<String>,
        arguments: Vec<Argument>,
    ) -> Result<Self, ChainError> {
        Self::new(Namespace::Transform, name, arguments)
    }

    /// Build from loosely-typed arguments, rejecting anything non-scalar.
    pub fn from_values(
        namespace: Namespace,
        name: impl Into<String>,
        values: &[serde_json::Value],
    ) -> Result<Self, ChainError> {
        let arguments = values
            .iter()
            .map(Argument::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(namespace, name, arguments)
    }

    /// `namespace/name/args`, with args joined by `_` (or a lone `_` when empty).
    pub fn path_segment(&self) -> String {
        let args = if self.arguments.is_empty() {
            "_".to_string()
        } else {
            self.arguments
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join("_")
        };
        format!("{}/{}/{}", self.namespace.as_path(), self.name, args)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segment_with_arguments() {
        let op = Operation::transform("splag", vec![Argument::Int(1), Argument::Int(1)]).unwrap();
        assert_eq!(op.path_segment(), "trf/splag/1_1");
    }

    #[test]
    fn segment_without_arguments() {
        let op = Operation::base("country.name", vec![]).unwrap();
        assert_eq!(op.path_segment(), "base/country.name/_");
    }

    #[test]
    fn nested_list_argument_rejected() {
        let err = Operation::from_values(Namespace::Transform, "templag", &[json!(["-1"])])
            .unwrap_err();
        assert!(matches!(err, ChainError::NonScalarArgument(_)));
    }

    #[test]
    fn float_and_null_arguments_rejected() {
        assert!(Argument::try_from(&json!(1.5)).is_err());
        assert!(Argument::try_from(&json!(null)).is_err());
        assert!(Argument::try_from(&json!({"a": 1})).is_err());
        assert!(Argument::try_from(&json!(true)).is_err());
    }

    #[test]
    fn scalar_values_accepted() {
        let op = Operation::from_values(Namespace::Transform, "templag", &[json!(-1), json!("x")])
            .unwrap();
        assert_eq!(op.arguments, vec![Argument::Int(-1), Argument::Str("x".into())]);
    }

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(
            Operation::base("  ", vec![]),
            Err(ChainError::EmptyName)
        ));
    }

    #[test]
    fn deserialize_validates() {
        let op: Operation =
            serde_json::from_value(json!({"namespace": "transform", "name": "templag", "arguments": ["-1"]}))
                .unwrap();
        assert_eq!(op.namespace, Namespace::Transform);

        let bad: Result<Operation, _> = serde_json::from_value(
            json!({"namespace": "trf", "name": "templag", "arguments": [["-1"]]}),
        );
        assert!(bad.is_err());

        let unnamed: Result<Operation, _> =
            serde_json::from_value(json!({"namespace": "base", "name": ""}));
        assert!(unnamed.is_err());
    }

    #[test]
    fn namespace_serializes_as_wire_form() {
        let s = serde_json::to_string(&Namespace::Transform).unwrap();
        assert_eq!(s, "\"trf\"");
    }
}
