//! Script evaluation.

use serde_json::{Value, json};
use tracing::debug;

use crate::browser::Browser;
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::relay::ensure_attached;

use super::Executor;

// ============================================================================
// Helpers
// ============================================================================

/// Evaluates an expression and returns its value.
///
/// Promises are awaited; `undefined` becomes `null`.
///
/// # Errors
///
/// [`Error::ScriptError`] if the expression throws.
pub(crate) async fn evaluate_value(browser: &dyn Browser, tab_id: TabId, expression: &str) -> Result<Value> {
    let response = browser
        .send_command(
            tab_id,
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )
        .await?;

    check_exception(&response)?;

    Ok(response
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// Fails with the thrown message if a `Runtime` response carries one.
pub(crate) fn check_exception(response: &Value) -> Result<()> {
    match exception_message(response) {
        Some(message) => Err(Error::script_error(message)),
        None => Ok(()),
    }
}

/// Extracts a readable message from `exceptionDetails`.
///
/// Prefers the first line of the exception description (`Error: boom`), then
/// a thrown primitive, then the generic text.
pub(crate) fn exception_message(response: &Value) -> Option<String> {
    let details = response.get("exceptionDetails")?;

    let description = details
        .pointer("/exception/description")
        .and_then(Value::as_str)
        .and_then(|d| d.lines().next());

    let thrown = details.pointer("/exception/value").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    let message = description
        .map(str::to_string)
        .or(thrown)
        .or_else(|| details.get("text").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "Script threw an exception".to_string());

    Some(message)
}

// ============================================================================
// Executor
// ============================================================================

impl Executor {
    /// Evaluates an expression in an attached tab.
    ///
    /// Result: `{ "result": <value> }`.
    ///
    /// # Errors
    ///
    /// - [`Error::TabNotAttached`]
    /// - [`Error::ScriptError`] with the thrown message
    pub async fn evaluate(&self, tab_id: TabId, expression: &str) -> Result<Value> {
        ensure_attached(&self.registry, tab_id)?;

        debug!(%tab_id, len = expression.len(), "Evaluating script");
        let value = evaluate_value(self.browser.as_ref(), tab_id, expression).await?;

        Ok(json!({ "result": value }))
    }
}

// ============================================================================
// Tests
// ============================================================================
