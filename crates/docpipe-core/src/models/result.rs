//! Result types shared by every validation and workflow step.
//!
//! [`ValidationResult`] is the composable "did this succeed and why" unit.
//! [`WorkflowResult`] adds a name and child results, forming a tree that
//! mirrors the orchestration call tree.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Outcome of a validation operation: a validity flag and ordered messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False once any error has been added or merged in.
    pub is_valid: bool,

    /// Messages in the order they were added.
    pub messages: Vec<String>,
}

impl ValidationResult {
    /// Create a valid result with no messages.
    pub fn new() -> Self {
        Self {
            is_valid: true,
            messages: Vec::new(),
        }
    }

    /// Add a message without changing validity.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Add an error message and mark the result invalid.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.messages.push(message.into());
    }

    /// Merge another outcome into this one.
    ///
    /// Validity is ANDed and the other's messages are appended after ours.
    pub fn merge<R: AsRef<ValidationResult>>(&mut self, other: &R) {
        let other = other.as_ref();
        self.is_valid = self.is_valid && other.is_valid;
        self.messages.extend(other.messages.iter().cloned());
    }

    /// Messages as a single comma-separated string.
    pub fn to_str(&self) -> String {
        self.messages.join(", ")
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<ValidationResult> for ValidationResult {
    fn as_ref(&self) -> &ValidationResult {
        self
    }
}

/// Result of a workflow operation, orchestration or activity.
///
/// Messages are tagged as `"{name}::{action} - {message}"`. Child results
/// added through [`WorkflowResult::add_activity_result`] are never merged into
/// this node's validity; call [`WorkflowResult::merge`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Name of the workflow operation that owns this node.
    pub name: String,

    /// Child results in the order they were attached.
    pub activity_results: Vec<WorkflowResult>,

    #[serde(flatten)]
    outcome: ValidationResult,
}

impl WorkflowResult {
    /// Create a valid, empty result for the named operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activity_results: Vec::new(),
            outcome: ValidationResult::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid
    }

    pub fn messages(&self) -> &[String] {
        &self.outcome.messages
    }

    fn tag(&self, action: &str, message: &str) -> String {
        format!("{}::{} - {}", self.name, action, message)
    }

    /// Add a tagged message without changing validity.
    pub fn add_message(&mut self, action: &str, message: impl AsRef<str>) {
        let log = self.tag(action, message.as_ref());
        info!("{}", log);
        self.outcome.add_message(log);
    }

    /// Add a tagged error and mark this node invalid.
    pub fn add_error(&mut self, action: &str, message: impl AsRef<str>) {
        let log = self.tag(action, message.as_ref());
        error!("{}", log);
        self.outcome.add_error(log);
    }

    /// Attach a child result and log `message`.
    ///
    /// The child's validity and messages are not merged into this node.
    pub fn add_activity_result(&mut self, action: &str, message: &str, result: WorkflowResult) {
        self.activity_results.push(result);
        info!("{}", self.tag(action, message));
    }

    /// Merge another outcome into this node.
    pub fn merge<R: AsRef<ValidationResult>>(&mut self, other: &R) {
        self.outcome.merge(other);
    }

    /// Messages as a single comma-separated string.
    pub fn to_str(&self) -> String {
        self.outcome.to_str()
    }
}

impl AsRef<ValidationResult> for WorkflowResult {
    fn as_ref(&self) -> &ValidationResult {
        &self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(is_valid: bool, messages: &[&str]) -> ValidationResult {
        ValidationResult {
            is_valid,
            messages: messages.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_add_message_keeps_validity() {
        let mut r = ValidationResult::new();
        r.add_message("note");
        assert!(r.is_valid);
        assert_eq!(r.messages, vec!["note"]);
    }

    #[test]
    fn test_add_error_invalidates() {
        let mut r = ValidationResult::new();
        r.add_error("broken");
        r.add_message("note");
        assert!(!r.is_valid);
        assert_eq!(r.to_str(), "broken, note");
    }

    #[test]
    fn test_merge_ands_validity_and_concatenates() {
        let cases = [(true, true), (true, false), (false, true), (false, false)];
        for (a, b) in cases {
            let mut r = result(a, &["r1", "r2"]);
            let s = result(b, &["s1"]);
            r.merge(&s);
            assert_eq!(r.is_valid, a && b);
            assert_eq!(r.messages, vec!["r1", "r2", "s1"]);
        }
    }

    #[test]
    fn test_workflow_messages_are_tagged() {
        let mut r = WorkflowResult::new("Folder");
        r.add_message("InvoiceFolder.validate", "input is valid");
        r.add_error("ExtractInvoiceData", "Failed to extract data for a.pdf.");
        assert!(!r.is_valid());
        assert_eq!(
            r.messages(),
            &[
                "Folder::InvoiceFolder.validate - input is valid".to_string(),
                "Folder::ExtractInvoiceData - Failed to extract data for a.pdf.".to_string(),
            ]
        );
    }

    #[test]
    fn test_activity_result_is_not_merged() {
        let mut child = WorkflowResult::new("child");
        child.add_error("step", "failed");

        let mut parent = WorkflowResult::new("parent");
        parent.add_activity_result("run", "Processed child.", child.clone());

        assert!(parent.is_valid());
        assert!(parent.messages().is_empty());
        assert_eq!(parent.activity_results, vec![child.clone()]);

        parent.merge(&child);
        assert!(!parent.is_valid());
        assert_eq!(parent.messages(), child.messages());
    }

    #[test]
    fn test_workflow_result_json_shape() {
        let mut child = WorkflowResult::new("a.pdf");
        child.add_error("ValidateInvoiceData", "customer_name is required");
        let mut parent = WorkflowResult::new("Batch");
        parent.add_activity_result("run", "done", child);

        let json = serde_json::to_value(&parent).unwrap();
        assert_eq!(json["name"], "Batch");
        assert_eq!(json["is_valid"], true);
        assert_eq!(json["activity_results"][0]["is_valid"], false);

        let back: WorkflowResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, parent);
    }
}
