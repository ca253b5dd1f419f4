use std::path::PathBuf;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};

use super::{SelectOption, SessionError, WebSession};

const SET_VALUE_SCRIPT: &str = r#"
    const el = arguments[0], val = arguments[1];
    el.removeAttribute('readonly'); el.removeAttribute('disabled');
    el.value = val; el.setAttribute('value', val);
    el.dispatchEvent(new Event('input', {bubbles: true}));
    el.dispatchEvent(new Event('change', {bubbles: true}));
    el.dispatchEvent(new Event('blur', {bubbles: true}));
"#;

const SCROLL_INTO_VIEW_SCRIPT: &str = "arguments[0].scrollIntoView({block: 'center'});";

/// How the Chrome instance behind the WebDriver endpoint is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
    pub profile_dir: Option<PathBuf>,
    pub profile_name: Option<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_size: (1280, 900),
            user_agent: None,
            profile_dir: None,
            profile_name: None,
        }
    }
}

impl BrowserOptions {
    pub fn capabilities(&self) -> Map<String, Value> {
        let (width, height) = self.window_size;
        let mut args = vec![
            format!("--window-size={width},{height}"),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--lang=ja-JP".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(ua) = &self.user_agent {
            args.push(format!("--user-agent={ua}"));
        }
        if let Some(dir) = self.profile_dir.as_ref().filter(|d| d.is_dir()) {
            args.push(format!("--user-data-dir={}", dir.display()));
            if let Some(name) = &self.profile_name {
                args.push(format!("--profile-directory={name}"));
            }
        }

        let mut chrome = json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
            "useAutomationExtension": false,
        });
        // Images and fonts are dead weight when nobody is watching.
        if self.headless {
            chrome["prefs"] = json!({
                "profile.managed_default_content_settings.images": 2,
                "profile.managed_default_content_settings.fonts": 2,
                "profile.default_content_setting_values.notifications": 2,
            });
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), chrome);
        caps
    }
}

/// Only a detached element counts as stale; transport and session failures do not.
fn is_detached(error: &CmdError) -> bool {
    error.is_stale_element_reference() || error.is_no_such_element()
}

/// [`WebSession`] over a WebDriver endpoint (chromedriver).
#[derive(Debug, Clone)]
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    pub async fn connect(options: &BrowserOptions) -> Result<Self, SessionError> {
        log::info!("Connecting to WebDriver at {}...", options.webdriver_url);
        let mut builder = ClientBuilder::native();
        builder.capabilities(options.capabilities());
        let client = builder
            .connect(&options.webdriver_url)
            .await
            .inspect_err(|e| log::error!("WebDriver session error: {e:?}"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebSession for WebDriverSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        Ok(self.client.goto(url).await?)
    }

    async fn reload(&self) -> Result<(), SessionError> {
        Ok(self.client.refresh().await?)
    }

    async fn find(&self, css: &str) -> Result<Option<Element>, SessionError> {
        match self.client.find(Locator::Css(css)).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_clickable(&self, element: &Element) -> Result<bool, SessionError> {
        Ok(element.is_displayed().await? && element.is_enabled().await?)
    }

    async fn is_stale(&self, element: &Element) -> Result<bool, SessionError> {
        match element.tag_name().await {
            Ok(_) => Ok(false),
            Err(e) if is_detached(&e) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Property first, attribute second, so reformatted input values are seen.
    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, SessionError> {
        match element.prop(name).await? {
            Some(value) => Ok(Some(value)),
            None => Ok(element.attr(name).await?),
        }
    }

    async fn set_value(&self, element: &Element, value: &str) -> Result<(), SessionError> {
        let args = vec![serde_json::to_value(element)?, json!(value)];
        self.client.execute(SET_VALUE_SCRIPT, args).await?;
        Ok(())
    }

    async fn options(&self, select: &Element) -> Result<Vec<SelectOption>, SessionError> {
        let mut out = Vec::new();
        for option in select.find_all(Locator::Css("option")).await? {
            let label = option.text().await?.trim().to_string();
            let value = option.attr("value").await?.unwrap_or_default();
            out.push(SelectOption { label, value });
        }
        Ok(out)
    }

    async fn select_value(&self, select: &Element, value: &str) -> Result<(), SessionError> {
        Ok(select.select_by_value(value).await?)
    }

    async fn click(&self, element: &Element) -> Result<(), SessionError> {
        let args = vec![serde_json::to_value(element)?];
        if let Err(e) = self.client.execute(SCROLL_INTO_VIEW_SCRIPT, args).await {
            log::debug!("scrollIntoView failed: {e}");
        }
        Ok(element.click().await?)
    }

    async fn outer_html(&self, element: &Element) -> Result<String, SessionError> {
        Ok(element.html(false).await?)
    }

    async fn page_text(&self) -> Result<String, SessionError> {
        Ok(self.client.source().await?)
    }

    async fn ready_state(&self) -> Result<String, SessionError> {
        let state = self
            .client
            .execute("return document.readyState;", Vec::new())
            .await?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn cookie_names(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .client
            .get_all_cookies()
            .await?
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        Ok(self.client.execute(script, args).await?)
    }

    async fn close(&self) -> Result<(), SessionError> {
        log::info!("Closing browser session");
        Ok(self.client.clone().close().await?)
    }
}
