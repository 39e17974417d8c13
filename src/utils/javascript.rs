use crate::core::WaitUntil;
use crate::errors::{BrowserError, Result};
use headless_chrome::Tab;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct JavaScriptRunner;

impl JavaScriptRunner {
    /// Evaluate `script` on the blocking pool and return its JSON value.
    pub async fn execute(tab: &Arc<Tab>, script: &str) -> Result<Value> {
        let tab = Arc::clone(tab);
        let script = script.to_string();
        tokio::task::spawn_blocking(move || {
            tab.evaluate(&script, false)
                .map(|result| result.value.unwrap_or(Value::Null))
                .map_err(|e| BrowserError::from_driver(e, BrowserError::JavaScriptFailed))
        })
        .await
        .map_err(|e| BrowserError::SessionUnavailable(e.to_string()))?
    }

    pub async fn execute_with_timeout(tab: &Arc<Tab>, script: &str, timeout_ms: u64) -> Result<Value> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), Self::execute(tab, script))
            .await
            .map_err(|_| BrowserError::TimeoutError(format!("script exceeded {}ms", timeout_ms)))?
    }

    /// Poll a boolean expression until it is true or `timeout_ms` elapses.
    pub async fn wait_for_condition(
        tab: &Arc<Tab>,
        condition: &str,
        timeout_ms: u64,
        poll_interval_ms: u64,
    ) -> Result<bool> {
        let start_time = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let poll_interval = Duration::from_millis(poll_interval_ms);

        while start_time.elapsed() < timeout {
            // the document may be mid-navigation, so evaluation errors just mean "not yet"
            match Self::execute(tab, condition).await {
                Ok(Value::Bool(true)) => return Ok(true),
                Err(e) if e.is_session_failure() => return Err(e),
                _ => {}
            }
            tokio::time::sleep(poll_interval).await;
        }

        Ok(false)
    }
}

/// Render `value` as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn exists_script(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

pub fn is_link_script(selector: &str) -> String {
    format!(
        r#"(function() {{
            const el = document.querySelector({});
            return !!el && el.tagName === 'A';
        }})()"#,
        js_string(selector)
    )
}

pub fn remove_target_script(selector: &str) -> String {
    format!(
        r#"(function() {{
            const el = document.querySelector({});
            if (el && el.hasAttribute('target')) el.removeAttribute('target');
            return !!el;
        }})()"#,
        js_string(selector)
    )
}

pub fn clear_input_script(selector: &str) -> String {
    format!(
        r#"(function() {{
            const el = document.querySelector({});
            if (!el) return false;
            el.focus();
            if ('value' in el) {{
                el.value = '';
            }} else if (el.isContentEditable) {{
                el.textContent = '';
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return true;
        }})()"#,
        js_string(selector)
    )
}

pub fn scroll_into_view_script(selector: &str) -> String {
    format!(
        r#"(function() {{
            const el = document.querySelector({});
            if (!el) return false;
            el.scrollIntoView({{ behavior: 'smooth', block: 'center' }});
            return true;
        }})()"#,
        js_string(selector)
    )
}

pub fn document_size_script() -> &'static str {
    r#"(function() {
        const d = document.documentElement;
        const b = document.body || d;
        return {
            width: Math.max(d.scrollWidth, b.scrollWidth, d.clientWidth),
            height: Math.max(d.scrollHeight, b.scrollHeight, d.clientHeight)
        };
    })()"#
}

/// Flags the current document so load-state polls can tell it apart from
/// the one a navigation replaces it with.
pub const MARK_OUTGOING_DOCUMENT: &str = "window.__autopilotOutgoing = true";

/// Boolean expression that holds once a freshly navigated document has
/// reached `state`. Network idle additionally needs a quiet resource timeline,
/// which the caller measures.
pub fn load_state_condition(state: WaitUntil) -> &'static str {
    match state {
        WaitUntil::DomContentLoaded => {
            "!window.__autopilotOutgoing && document.readyState !== 'loading'"
        }
        WaitUntil::Load | WaitUntil::NetworkIdle => {
            "!window.__autopilotOutgoing && document.readyState === 'complete'"
        }
    }
}

pub const RESOURCE_COUNT: &str = "performance.getEntriesByType('resource').length";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_embedded_as_string_literals() {
        let script = exists_script(r#"a[href="x"]'); alert('"#);
        assert_eq!(
            script,
            r#"document.querySelector("a[href=\"x\"]'); alert('") !== null"#
        );
    }

    #[test]
    fn load_conditions_ignore_the_outgoing_document() {
        for state in [WaitUntil::DomContentLoaded, WaitUntil::Load, WaitUntil::NetworkIdle] {
            assert!(load_state_condition(state).starts_with("!window.__autopilotOutgoing"));
        }
        assert!(MARK_OUTGOING_DOCUMENT.contains("__autopilotOutgoing"));
        assert!(load_state_condition(WaitUntil::DomContentLoaded).contains("!== 'loading'"));
        assert!(load_state_condition(WaitUntil::Load).contains("=== 'complete'"));
    }

    #[test]
    fn scripts_reference_the_selector_once() {
        for script in [
            is_link_script("#a"),
            remove_target_script("#a"),
            clear_input_script("#a"),
            scroll_into_view_script("#a"),
        ] {
            assert_eq!(script.matches("\"#a\"").count(), 1);
        }
    }
}
