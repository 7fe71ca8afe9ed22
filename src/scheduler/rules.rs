//! Priority rule registry.
//!
//! Rules are named functions `(details, base_priority) -> delta`. They run in
//! registration order, and a rule that panics contributes zero instead of
//! taking the scheduler down with it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::domain::TaskDetails;

/// Signature of a rule body.
pub type RuleFn = Arc<dyn Fn(&TaskDetails, i64) -> i64 + Send + Sync>;

/// A named priority adjustment.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    func: RuleFn,
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&TaskDetails, i64) -> i64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Run the rule, converting a panic into an error message.
    pub fn apply(&self, details: &TaskDetails, current: i64) -> Result<i64, String> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.func)(details, current))).map_err(panic_message)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "rule panicked".to_string()
    }
}

/// Result of evaluating every rule against one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub sum: i64,
    /// Names of rules that failed and contributed zero
    pub failed: Vec<String>,
}

/// Ordered, name-keyed rule registry.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Re-registering a name replaces the body and keeps the
    /// original position in the evaluation order.
    pub fn add(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Register a closure under `name`.
    pub fn add_rule<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&TaskDetails, i64) -> i64 + Send + Sync + 'static,
    {
        self.add(Rule::new(name, func));
    }

    /// Remove a rule by name. Returns true if it existed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        self.rules.len() != before
    }

    /// Sum every rule's delta against `base_priority`.
    pub fn evaluate(&self, details: &TaskDetails, base_priority: i64) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for rule in &self.rules {
            match rule.apply(details, base_priority) {
                Ok(delta) => outcome.sum = outcome.sum.saturating_add(delta),
                Err(message) => {
                    tracing::warn!(
                        rule = %rule.name,
                        task_id = %details.id,
                        error = %message,
                        "Priority rule failed, contributing zero"
                    );
                    outcome.failed.push(rule.name.clone());
                }
            }
        }

        outcome
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Adds `delta` when the record carries `label`.
pub fn label_rule(label: impl Into<String>, delta: i64) -> Rule {
    let label = label.into();
    Rule::new(format!("label:{}", label), move |details, _| {
        if details.has_label(&label) { delta } else { 0 }
    })
}

/// Adds `delta` when somebody is assigned.
pub fn assignee_rule(delta: i64) -> Rule {
    Rule::new("assigned", move |details, _| {
        if details.assignees.is_empty() { 0 } else { delta }
    })
}

/// Adds `per_mention` for each mention, capped at `cap`.
pub fn mention_rule(per_mention: i64, cap: i64) -> Rule {
    Rule::new("mentions", move |details, _| {
        (details.mentions.len() as i64).saturating_mul(per_mention).min(cap)
    })
}

/// Adds `delta` for records from `repository`.
pub fn repository_rule(repository: impl Into<String>, delta: i64) -> Rule {
    let repository = repository.into();
    Rule::new(format!("repository:{}", repository), move |details, _| {
        if details.repository == repository { delta } else { 0 }
    })
}
