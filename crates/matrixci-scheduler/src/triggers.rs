//! Trigger matching and evaluation.

use matrixci_core::events::{EventDescriptor, EventKind, RefName};
use matrixci_core::workflow::TriggerRule;

/// Matcher for determining if a run should be started by an event.
pub struct TriggerMatcher;

impl TriggerMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Check if any rule matches the event. No rules never matches.
    pub fn matches(&self, event: &EventDescriptor, rules: &[TriggerRule]) -> bool {
        rules.iter().any(|rule| self.rule_matches(rule, event))
    }

    fn rule_matches(&self, rule: &TriggerRule, event: &EventDescriptor) -> bool {
        if rule.kind != event.kind {
            return false;
        }

        match (event.kind, event.ref_name()) {
            (EventKind::Push, RefName::Branch(branch)) => self.any_match(&rule.branches, branch),
            (EventKind::Push, RefName::Tag(tag)) => self.any_match(&rule.tags, tag),
            (EventKind::Push, RefName::Bare(name)) => {
                self.any_match(&rule.branches, name) || self.any_match(&rule.tags, name)
            }
            (EventKind::PullRequest, RefName::Branch(target) | RefName::Bare(target)) => {
                self.target_branch_matches(&rule.branches, target)
            }
            (EventKind::PullRequest, RefName::Tag(_)) => false,
        }
    }

    /// Pull requests: an empty branch list matches every target branch.
    fn target_branch_matches(&self, patterns: &[String], branch: &str) -> bool {
        if patterns.is_empty() {
            return true;
        }
        self.any_match(patterns, branch)
    }

    fn any_match(&self, patterns: &[String], text: &str) -> bool {
        patterns.iter().any(|p| self.glob_match(p, text))
    }

    fn glob_match(&self, pattern: &str, text: &str) -> bool {
        if pattern == "*" || pattern == "**" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix("/**") {
            return text
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            let prefix_slash = format!("{}/", prefix);
            if let Some(rest) = text.strip_prefix(&prefix_slash) {
                return !rest.is_empty() && !rest.contains('/');
            }
            return false;
        }
        if let Some((head, tail)) = pattern.split_once('*')
            && !tail.contains('*')
        {
            return text.len() >= head.len() + tail.len()
                && text.starts_with(head)
                && text.ends_with(tail);
        }
        pattern == text
    }
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new()
    }
}
