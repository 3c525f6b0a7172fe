use super::StubRule;
use crate::error::EngineError;

/// Check the fields an operator must supply before a rule may be persisted.
///
/// All problems are reported together, joined by `"; "`.
pub fn validate(rule: &StubRule) -> Result<(), EngineError> {
    let mut problems = Vec::new();

    if rule.name.trim().is_empty() {
        problems.push("name is required".to_string());
    }
    if rule.method.trim().is_empty() {
        problems.push("method is required".to_string());
    } else if !rule
        .method
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphabetic())
    {
        problems.push(format!("method '{}' is not a valid HTTP method", rule.method));
    }
    if rule.url_pattern.trim().is_empty() {
        problems.push("url is required".to_string());
    }
    if rule.response_definition.trim().is_empty() {
        problems.push("responseDefinition is required".to_string());
    } else if let Err(e) = serde_json::from_str::<serde_json::Value>(&rule.response_definition) {
        problems.push(format!("responseDefinition is not valid JSON: {e}"));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation(problems.join("; ")))
    }
}
