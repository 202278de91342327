use crate::graph::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
    #[error("{kind} node creation failed: {reason}")]
    NodeCreation { kind: &'static str, reason: String },
    #[error("unknown audio node {0:?}")]
    UnknownNode(NodeId),
    #[error("{node:?} has no {param} parameter")]
    NoSuchParam { node: NodeId, param: &'static str },
    #[error("{node:?}: {reason}")]
    InvalidState { node: NodeId, reason: &'static str },
    #[error("{op} rejected by the audio backend: {reason}")]
    Backend { op: &'static str, reason: String },
}

/// Raised when a UI string does not name a known bus, effect or sample group.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown bus `{0}`")]
    Bus(String),
    #[error("unknown effect `{0}`")]
    Effect(String),
    #[error("unknown sample group `{0}`")]
    Group(String),
}
