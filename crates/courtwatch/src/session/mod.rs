//! The browser capability the scan engine drives.
//!
//! Everything the engine needs from a browser goes through [`WebSession`]. Lookups never
//! block: waiting is layered on top by [`crate::wait`], so every component shares one
//! bounded-wait primitive. A session is used strictly sequentially.

#[cfg(test)]
pub(crate) mod fake;
pub mod webdriver;

use async_trait::async_trait;
use serde_json::Value;

pub use webdriver::{BrowserOptions, WebDriverSession};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("WebDriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),
    #[error("Failed to create browser session: {0}")]
    Connect(#[from] fantoccini::error::NewSessionError),
    #[error("Script argument error: {0}")]
    Script(#[from] serde_json::Error),
    #[error("Unexpected page state: {0}")]
    Page(String),
}

/// One `<option>` of a `<select>` control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[async_trait]
pub trait WebSession: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    async fn reload(&self) -> Result<(), SessionError>;

    /// Current match for a CSS selector, `None` when absent.
    async fn find(&self, css: &str) -> Result<Option<Self::Element>, SessionError>;

    async fn is_clickable(&self, element: &Self::Element) -> Result<bool, SessionError>;

    /// True once the element has been detached from the document.
    async fn is_stale(&self, element: &Self::Element) -> Result<bool, SessionError>;

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Force a value into a (possibly read-only) input and fire input/change/blur.
    async fn set_value(&self, element: &Self::Element, value: &str) -> Result<(), SessionError>;

    async fn options(&self, select: &Self::Element) -> Result<Vec<SelectOption>, SessionError>;

    async fn select_value(&self, select: &Self::Element, value: &str)
    -> Result<(), SessionError>;

    async fn click(&self, element: &Self::Element) -> Result<(), SessionError>;

    async fn outer_html(&self, element: &Self::Element) -> Result<String, SessionError>;

    async fn page_text(&self) -> Result<String, SessionError>;

    /// `document.readyState`.
    async fn ready_state(&self) -> Result<String, SessionError>;

    async fn cookie_names(&self) -> Result<Vec<String>, SessionError>;

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}
