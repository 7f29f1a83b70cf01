//! WhatsApp Web automation: search for a contact and send a message.
//!
//! Selectors live here in isolation so a future WhatsApp DOM change only
//! touches this file. A Playwright-style adapter would hold a live element
//! handle across awaits for the contact row; this crate's browser binding
//! evaluates find-and-click JS snippets instead, since chromiumoxide has no
//! equivalent `get_by_text` locator.

use crate::error::{WebErrorCode, WebExecutionError};
use chromiumoxide::page::Page;
use serde_json::json;
use std::time::{Duration, Instant};

const WHATSAPP_URL: &str = "https://web.whatsapp.com";
const SEARCH_BOX_SELECTOR: &str = "div[contenteditable=\"true\"][data-tab=\"3\"]";
const MESSAGE_INPUT_SELECTOR: &str = "div[contenteditable=\"true\"][data-tab=\"10\"]";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn send_message(page: &Page, contact: &str, message: &str) -> Result<(), WebExecutionError> {
    if contact.trim().is_empty() {
        return Err(WebExecutionError::new(WebErrorCode::AdapterMissingContact, "contact is required"));
    }
    if message.is_empty() {
        return Err(WebExecutionError::new(WebErrorCode::AdapterMissingMessage, "message is required"));
    }

    tracing::info!(%contact, "whatsapp: sending message");

    let current = page.url().await.ok().flatten().unwrap_or_default();
    if !current.starts_with(WHATSAPP_URL) {
        page.goto(WHATSAPP_URL)
            .await
            .map_err(|e| WebExecutionError::new(WebErrorCode::Unexpected, e.to_string()))?;
        let _ = tokio::time::timeout(Duration::from_secs(10), page.wait_for_navigation()).await;
    }

    wait_for_selector(page, SEARCH_BOX_SELECTOR, DEFAULT_TIMEOUT)
        .await
        .map_err(|_| WebExecutionError::new(WebErrorCode::AdapterNotLoggedIn, "search box not found; user may need to scan the QR code"))?;

    type_into(page, SEARCH_BOX_SELECTOR, contact).await?;

    wait_for_text_and_click(page, contact, DEFAULT_TIMEOUT)
        .await
        .map_err(|_| WebExecutionError::new(WebErrorCode::AdapterContactNotFound, format!("contact '{contact}' not found")))?;

    wait_for_selector(page, MESSAGE_INPUT_SELECTOR, DEFAULT_TIMEOUT)
        .await
        .map_err(|_| WebExecutionError::new(WebErrorCode::AdapterChatNotReady, "message box not found after selecting contact"))?;

    type_into(page, MESSAGE_INPUT_SELECTOR, message).await?;
    press_enter_on(page, MESSAGE_INPUT_SELECTOR).await?;

    tracing::info!(%contact, "whatsapp: message sent");
    Ok(())
}

async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<(), ()> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn type_into(page: &Page, selector: &str, text: &str) -> Result<(), WebExecutionError> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({selector});
            if (!el) return false;
            el.focus();
            el.textContent = {text};
            el.dispatchEvent(new InputEvent('input', {{bubbles: true}}));
            return true;
        }})()"#,
        selector = json!(selector),
        text = json!(text),
    );
    page.evaluate(script)
        .await
        .map_err(|e| WebExecutionError::new(WebErrorCode::Unexpected, e.to_string()))?;
    Ok(())
}

/// Waits for an exact-text match anywhere in the contact list and clicks it.
/// The original used `page.get_by_text(contact, exact=True)`; a plain DOM
/// search over visible leaf nodes approximates it without element handles.
async fn wait_for_text_and_click(page: &Page, contact: &str, timeout: Duration) -> Result<(), ()> {
    let script = format!(
        r#"(() => {{
            const target = {contact};
            const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT);
            let node;
            while ((node = walker.nextNode())) {{
                if (node.children.length === 0 && node.textContent.trim() === target) {{
                    node.click();
                    return true;
                }}
            }}
            return false;
        }})()"#,
        contact = json!(contact),
    );

    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(result) = page.evaluate(script.as_str()).await {
            if result.into_value::<bool>().unwrap_or(false) {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn press_enter_on(page: &Page, selector: &str) -> Result<(), WebExecutionError> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({selector});
            if (!el) return false;
            const opts = {{key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true}};
            el.dispatchEvent(new KeyboardEvent('keydown', opts));
            el.dispatchEvent(new KeyboardEvent('keyup', opts));
            return true;
        }})()"#,
        selector = json!(selector),
    );
    page.evaluate(script)
        .await
        .map_err(|e| WebExecutionError::new(WebErrorCode::Unexpected, e.to_string()))?;
    Ok(())
}
