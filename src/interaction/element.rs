//! Element resolution, click and type.

use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::protocol::ElementTarget;
use crate::relay::ensure_attached;

use super::Executor;
use super::script::{check_exception, exception_message};

// ============================================================================
// Constants
// ============================================================================

const IS_CONNECTED_FN: &str = "function() { return this.isConnected; }";

const CLICK_FN: &str = "function() {
  this.scrollIntoView({ block: 'center', inline: 'center' });
  this.click();
  return true;
}";

const FOCUS_FN: &str = "function() {
  this.scrollIntoView({ block: 'center', inline: 'center' });
  this.focus();
  return document.activeElement === this;
}";

// ============================================================================
// Executor
// ============================================================================

impl Executor {
    /// Clicks an element.
    ///
    /// # Errors
    ///
    /// - [`Error::TabNotAttached`]
    /// - [`Error::ElementNotFound`] / [`Error::StaleRef`] if the target does
    ///   not resolve
    /// - [`Error::ScriptError`] if the click handler throws
    pub async fn click(&self, tab_id: TabId, target: &ElementTarget) -> Result<Value> {
        ensure_attached(&self.registry, tab_id)?;

        let object_id = self.resolve(tab_id, target).await?;
        let outcome = self.call_on(tab_id, &object_id, CLICK_FN).await;
        self.release(tab_id, &object_id).await;
        outcome?;

        debug!(%tab_id, target = target.as_str(), "Clicked");
        Ok(json!({ "success": true }))
    }

    /// Focuses an element and inserts text at the caret.
    ///
    /// # Errors
    ///
    /// See [`click`](Self::click).
    pub async fn type_text(&self, tab_id: TabId, target: &ElementTarget, text: &str) -> Result<Value> {
        ensure_attached(&self.registry, tab_id)?;

        let object_id = self.resolve(tab_id, target).await?;
        let focused = self.call_on(tab_id, &object_id, FOCUS_FN).await;
        self.release(tab_id, &object_id).await;
        focused?;

        self.browser
            .send_command(tab_id, "Input.insertText", json!({ "text": text }))
            .await?;

        debug!(%tab_id, target = target.as_str(), chars = text.chars().count(), "Typed");
        Ok(json!({ "success": true }))
    }

    /// Resolves a target to a remote object id.
    async fn resolve(&self, tab_id: TabId, target: &ElementTarget) -> Result<String> {
        match target {
            ElementTarget::Selector(selector) => self.resolve_selector(tab_id, selector).await,
            ElementTarget::Ref(element_ref) => self.resolve_ref(tab_id, element_ref).await,
        }
    }

    async fn resolve_selector(&self, tab_id: TabId, selector: &str) -> Result<String> {
        let expression = format!("document.querySelector({})", serde_json::to_string(selector)?);

        let response = self
            .browser
            .send_command(tab_id, "Runtime.evaluate", json!({ "expression": expression }))
            .await?;

        if let Some(message) = exception_message(&response) {
            return Err(Error::invalid_argument(format!(
                "invalid selector '{selector}': {message}"
            )));
        }

        response
            .pointer("/result/objectId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::element_not_found(selector))
    }

    async fn resolve_ref(&self, tab_id: TabId, element_ref: &str) -> Result<String> {
        let node = self
            .registry
            .lock()
            .resolve_ref(tab_id, element_ref)
            .ok_or_else(|| Error::stale_ref(element_ref, "not in the latest snapshot"))?;

        let response = match self
            .browser
            .send_command(tab_id, "DOM.resolveNode", json!({ "backendNodeId": node }))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(e),
            Err(e) => {
                trace!(%tab_id, element_ref, error = %e, "Backend node did not resolve");
                return Err(Error::stale_ref(element_ref, "element no longer exists"));
            }
        };

        let object_id = response
            .pointer("/object/objectId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::stale_ref(element_ref, "element no longer exists"))?;

        let connected = match self.call_on(tab_id, &object_id, IS_CONNECTED_FN).await {
            Ok(connected) => connected,
            Err(e) => {
                self.release(tab_id, &object_id).await;
                return Err(e);
            }
        };
        if connected != Value::Bool(true) {
            self.release(tab_id, &object_id).await;
            return Err(Error::stale_ref(element_ref, "element was removed from the page"));
        }

        Ok(object_id)
    }

    /// Calls a function with `this` bound to the object.
    async fn call_on(&self, tab_id: TabId, object_id: &str, function: &str) -> Result<Value> {
        let response = self
            .browser
            .send_command(
                tab_id,
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
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

    /// Releases a remote object; failures only matter to the browser's GC.
    async fn release(&self, tab_id: TabId, object_id: &str) {
        if let Err(e) = self
            .browser
            .send_command(tab_id, "Runtime.releaseObject", json!({ "objectId": object_id }))
            .await
        {
            trace!(%tab_id, error = %e, "releaseObject failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::BackendNodeId;
    use crate::interaction::tests::{attached_executor, attached_executor_with_registry};
    use crate::relay::RefTable;

    fn found(object_id: &str) -> Value {
        json!({ "result": { "type": "object", "subtype": "node", "objectId": object_id } })
    }

    #[tokio::test]
    async fn test_click_by_selector() {
        let (executor, browser, tab) = attached_executor().await;
        browser.respond("Runtime.evaluate", |_| Ok(found("obj-1")));
        browser.respond("Runtime.callFunctionOn", |_| Ok(json!({ "result": { "value": true } })));

        let result = executor
            .click(tab, &ElementTarget::Selector("#x".into()))
            .await
            .expect("click");

        assert_eq!(result, json!({ "success": true }));
        let query = browser.last_params("Runtime.evaluate").expect("query");
        assert_eq!(query["expression"], r##"document.querySelector("#x")"##);
        let call = browser.last_params("Runtime.callFunctionOn").expect("call");
        assert_eq!(call["objectId"], "obj-1");
        assert!(browser.methods().contains(&"Runtime.releaseObject".to_string()));
    }

    #[tokio::test]
    async fn test_selector_without_match() {
        let (executor, browser, tab) = attached_executor().await;
        browser.respond("Runtime.evaluate", |_| {
            Ok(json!({ "result": { "type": "object", "subtype": "null", "value": null } }))
        });

        let err = executor
            .click(tab, &ElementTarget::Selector("#missing".into()))
            .await
            .expect_err("not found");

        assert_eq!(err.to_string(), "Element not found: #missing");
    }

    #[tokio::test]
    async fn test_invalid_selector() {
        let (executor, browser, tab) = attached_executor().await;
        browser.respond("Runtime.evaluate", |_| {
            Ok(json!({
                "result": { "type": "object" },
                "exceptionDetails": { "exception": { "description": "SyntaxError: '##' is not a valid selector" } }
            }))
        });

        let err = executor
            .click(tab, &ElementTarget::Selector("##".into()))
            .await
            .expect_err("invalid");

        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_unknown_ref_is_stale() {
        let (executor, _browser, tab) = attached_executor().await;

        let err = executor
            .click(tab, &ElementTarget::Ref("e5".into()))
            .await
            .expect_err("stale");

        assert_eq!(
            err.to_string(),
            "Stale element ref 'e5': not in the latest snapshot. Take a new snapshot."
        );
    }

    #[tokio::test]
    async fn test_ref_resolves_through_backend_node() {
        let (executor, browser, registry, tab) = attached_executor_with_registry().await;
        let mut refs = RefTable::new();
        refs.insert("e5", BackendNodeId::new(88));
        registry.lock().set_refs(tab, refs);

        browser.respond("DOM.resolveNode", |params| {
            assert_eq!(params["backendNodeId"], 88);
            Ok(json!({ "object": { "objectId": "node-88" } }))
        });
        browser.respond("Runtime.callFunctionOn", |_| Ok(json!({ "result": { "value": true } })));

        executor
            .type_text(tab, &ElementTarget::Ref("e5".into()), "hello")
            .await
            .expect("type");

        assert_eq!(
            browser.last_params("Input.insertText"),
            Some(json!({ "text": "hello" }))
        );
    }

    #[tokio::test]
    async fn test_ref_to_removed_node_is_stale() {
        let (executor, browser, registry, tab) = attached_executor_with_registry().await;
        let mut refs = RefTable::new();
        refs.insert("e5", BackendNodeId::new(88));
        registry.lock().set_refs(tab, refs);

        browser.fail("DOM.resolveNode", "No node with given id found");

        let err = executor
            .click(tab, &ElementTarget::Ref("e5".into()))
            .await
            .expect_err("stale");

        assert!(matches!(err, Error::StaleRef { .. }));
    }

    #[tokio::test]
    async fn test_ref_to_disconnected_node_is_stale() {
        let (executor, browser, registry, tab) = attached_executor_with_registry().await;
        let mut refs = RefTable::new();
        refs.insert("e5", BackendNodeId::new(88));
        registry.lock().set_refs(tab, refs);

        browser.respond("DOM.resolveNode", |_| Ok(json!({ "object": { "objectId": "node-88" } })));
        browser.respond("Runtime.callFunctionOn", |_| Ok(json!({ "result": { "value": false } })));

        let err = executor
            .click(tab, &ElementTarget::Ref("e5".into()))
            .await
            .expect_err("stale");

        assert!(err.to_string().contains("removed from the page"));
    }

    #[tokio::test]
    async fn test_failed_connection_check_releases_object() {
        let (executor, browser, registry, tab) = attached_executor_with_registry().await;
        let mut refs = RefTable::new();
        refs.insert("e5", BackendNodeId::new(88));
        registry.lock().set_refs(tab, refs);

        browser.respond("DOM.resolveNode", |_| Ok(json!({ "object": { "objectId": "node-88" } })));
        browser.fail("Runtime.callFunctionOn", "Execution context was destroyed");

        let err = executor
            .click(tab, &ElementTarget::Ref("e5".into()))
            .await
            .expect_err("fails");

        assert_eq!(err.to_string(), "Protocol error: Execution context was destroyed");
        assert_eq!(
            browser.last_params("Runtime.releaseObject"),
            Some(json!({ "objectId": "node-88" }))
        );
    }

    #[tokio::test]
    async fn test_click_exception_surfaces() {
        let (executor, browser, tab) = attached_executor().await;
        browser.respond("Runtime.evaluate", |_| Ok(found("obj-1")));
        browser.respond("Runtime.callFunctionOn", |_| {
            Ok(json!({ "exceptionDetails": { "exception": { "description": "Error: blocked" } } }))
        });

        let err = executor
            .click(tab, &ElementTarget::Selector("button".into()))
            .await
            .expect_err("throws");

        assert_eq!(err.to_string(), "Script error: Error: blocked");
        assert!(browser.methods().contains(&"Runtime.releaseObject".to_string()));
    }
}
