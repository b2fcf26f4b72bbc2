//! Triggering events.
//!
//! An [`EventDescriptor`] is built once from the invocation and handed to the
//! trigger matcher; it is never mutated.

use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// Kinds of events that can start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull-request" => Ok(EventKind::PullRequest),
            other => Err(Error::UnsupportedEventKind(other.to_string())),
        }
    }
}

/// The git ref carried by an event, classified by its qualification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefName<'a> {
    /// `refs/heads/<name>`
    Branch(&'a str),
    /// `refs/tags/<name>`
    Tag(&'a str),
    /// An unqualified name; may be either a branch or a tag.
    Bare(&'a str),
}

/// An incoming event: a push to a branch or tag, or a pull request against a
/// target branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventDescriptor {
    pub kind: EventKind,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl EventDescriptor {
    pub fn new(kind: EventKind, git_ref: impl Into<String>) -> Self {
        Self {
            kind,
            git_ref: git_ref.into(),
        }
    }

    /// Build a descriptor from raw strings, rejecting unsupported kinds.
    pub fn parse(kind: &str, git_ref: impl Into<String>) -> Result<Self> {
        let git_ref = git_ref.into();
        if git_ref.trim().is_empty() {
            return Err(Error::InvalidWorkflow("event ref must not be empty".to_string()));
        }
        Ok(Self::new(kind.parse()?, git_ref))
    }

    pub fn push(git_ref: impl Into<String>) -> Self {
        Self::new(EventKind::Push, git_ref)
    }

    pub fn pull_request(target_branch: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, target_branch)
    }

    /// Classify the ref. Pull requests always target a branch.
    pub fn ref_name(&self) -> RefName<'_> {
        let git_ref = self.git_ref.as_str();
        if let Some(branch) = git_ref.strip_prefix(BRANCH_PREFIX) {
            return RefName::Branch(branch);
        }
        if let Some(tag) = git_ref.strip_prefix(TAG_PREFIX) {
            return match self.kind {
                EventKind::Push => RefName::Tag(tag),
                EventKind::PullRequest => RefName::Branch(git_ref),
            };
        }
        match self.kind {
            EventKind::Push => RefName::Bare(git_ref),
            EventKind::PullRequest => RefName::Branch(git_ref),
        }
    }
}

impl fmt::Display for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.git_ref)
    }
}
