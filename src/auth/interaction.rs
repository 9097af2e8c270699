//! Seams between the flows and the human on the other end.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::flow::device::DeviceCodeResponse;
use crate::error::AuthError;

/// Opens an authorization URL for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the system browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

/// Asks the user for a secret value such as an API key.
///
/// Called from a blocking thread, so implementations may read the terminal directly.
pub trait SecretPrompt: Send + Sync {
    fn prompt_secret(&self, label: &str) -> Result<String, AuthError>;
}

/// Hidden terminal input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn prompt_secret(&self, label: &str) -> Result<String, AuthError> {
        dialoguer::Password::new()
            .with_prompt(label)
            .interact()
            .map_err(|err| AuthError::Prompt(err.to_string()))
    }
}

/// Progress callbacks for interactive flows. Every method defaults to a no-op.
pub trait FlowNotifier: Send + Sync {
    /// The user must visit `verification_uri` and enter `user_code`.
    fn device_code(&self, _provider: &str, _response: &DeviceCodeResponse) {}

    /// The authorization URL is ready; the browser may or may not have opened.
    fn authorize_url(&self, _provider: &str, _url: &str) {}

    /// The server asked for slower polling; `interval` is the new spacing.
    fn slow_down(&self, _provider: &str, _interval: Duration) {}
}

/// Prints instructions to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl FlowNotifier for ConsoleNotifier {
    fn device_code(&self, provider: &str, response: &DeviceCodeResponse) {
        eprintln!();
        eprintln!("🔐 {provider} device authorization");
        match response.verification_uri_complete.as_deref() {
            Some(complete) => eprintln!("   Open: {complete}"),
            None => eprintln!("   Open: {}", response.verification_uri),
        }
        eprintln!("   Code: {}", response.user_code);
        eprintln!("   Waiting for authorization...");
    }

    fn authorize_url(&self, provider: &str, url: &str) {
        eprintln!();
        eprintln!("🔐 {provider} authorization");
        eprintln!("   If the browser did not open, visit:");
        eprintln!("   {url}");
    }
}

/// Bundle of interaction seams handed to every flow.
#[derive(Clone)]
pub struct Interaction {
    pub browser: Arc<dyn BrowserOpener>,
    pub prompt: Arc<dyn SecretPrompt>,
    pub notifier: Arc<dyn FlowNotifier>,
}

impl Interaction {
    pub fn with_browser(mut self, browser: Arc<dyn BrowserOpener>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn SecretPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn FlowNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl Default for Interaction {
    fn default() -> Self {
        Self {
            browser: Arc::new(SystemBrowser),
            prompt: Arc::new(TerminalPrompt),
            notifier: Arc::new(ConsoleNotifier),
        }
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction").finish_non_exhaustive()
    }
}
