//! Operation chains: the full lineage of one derived column.
//!
//! A chain is stored root first. The root is the outermost transform and the
//! tail is the raw column fetch, so a chain reads like function application:
//! `templag(-1, base(country.name))` is `[trf templag -1, base country.name]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::operation::{Argument, Namespace, Operation};

/// Validation errors raised while building an operation or a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("an operation chain needs at least one operation")]
    Empty,

    #[error("operation name must not be empty")]
    EmptyName,

    #[error("base operation at position {position} has a successor; base must be the last operation")]
    BaseNotTerminal { position: usize },

    #[error("transform '{name}' is the last operation; a chain must end in a base operation")]
    TransformIsTerminal { name: String },

    #[error("arguments must be strings or integers, got {0}")]
    NonScalarArgument(String),

    #[error("unknown namespace '{0}' (expected 'base' or 'trf')")]
    UnknownNamespace(String),

    #[error("malformed pipeline stage '{0}' (expected `namespace name [args...]`)")]
    MalformedStage(String),
}

/// An ordered, validated sequence of operations ending in a `base` fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Operation>", into = "Vec<Operation>")]
pub struct OperationChain {
    operations: Vec<Operation>,
}

impl OperationChain {
    /// Build a chain from a root-first list of operations.
    pub fn new(operations: Vec<Operation>) -> Result<Self, ChainError> {
        validate(&operations)?;
        Ok(Self { operations })
    }

    /// Build a chain from a list written tail first (fetch first).
    pub fn from_tail_first(mut operations: Vec<Operation>) -> Result<Self, ChainError> {
        operations.reverse();
        Self::new(operations)
    }

    /// Parse pipeline notation written in data-flow order:
    /// `base country.name | trf splag 1 1 | trf templag -1`.
    pub fn from_pipeline(pipeline: &str) -> Result<Self, ChainError> {
        let stages = pipeline
            .split('|')
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_tail_first(stages)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The outermost operation.
    pub fn root(&self) -> &Operation {
        &self.operations[0]
    }

    /// The raw column fetch at the end of the chain.
    pub fn tail(&self) -> &Operation {
        &self.operations[self.operations.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Remote path of this chain, without the level-of-analysis prefix.
    pub fn path(&self) -> String {
        super::path::chain_path(self)
    }

    /// Render back to pipeline notation (data-flow order).
    pub fn to_pipeline(&self) -> String {
        self.operations
            .iter()
            .rev()
            .map(|op| {
                let mut parts = vec![op.namespace.as_path().to_string(), op.name.clone()];
                parts.extend(op.arguments.iter().map(|a| a.to_string()));
                parts.join(" ")
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl TryFrom<Vec<Operation>> for OperationChain {
    type Error = ChainError;

    fn try_from(operations: Vec<Operation>) -> Result<Self, Self::Error> {
        Self::new(operations)
    }
}

impl From<OperationChain> for Vec<Operation> {
    fn from(chain: OperationChain) -> Self {
        chain.operations
    }
}

/// Only the tail may be `base`; every operation before it must be a transform.
fn validate(operations: &[Operation]) -> Result<(), ChainError> {
    let (tail, rest) = operations.split_last().ok_or(ChainError::Empty)?;

    if let Some(position) = rest.iter().position(|op| op.namespace == Namespace::Base) {
        return Err(ChainError::BaseNotTerminal { position });
    }

    if tail.namespace != Namespace::Base {
        return Err(ChainError::TransformIsTerminal {
            name: tail.name.clone(),
        });
    }

    Ok(())
}

fn parse_stage(stage: &str) -> Result<Operation, ChainError> {
    let mut tokens = stage.split_whitespace();
    let (namespace, name) = match (tokens.next(), tokens.next()) {
        (Some(ns), Some(name)) => (Namespace::parse(ns)?, name),
        _ => return Err(ChainError::MalformedStage(stage.trim().to_string())),
    };
    let arguments = tokens.map(Argument::from_token).collect();
    Operation::new(namespace, name, arguments)
}
