#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_auth::auth::flow::DeviceCodeResponse;
use ai_auth::auth::{AuthToken, BrowserOpener, FlowNotifier, Interaction, SecretPrompt, TokenStore};
use ai_auth::error::AuthError;
use chrono::{Duration as ChronoDuration, Utc};
use url::Url;

pub const AUTH_CODE: &str = "test-auth-code";

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<BTreeMap<String, AuthToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, token: AuthToken) {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert(token.provider.clone(), token);
    }

    pub fn get(&self, provider: &str) -> Option<AuthToken> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(provider)
            .cloned()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        self.seed(token.clone());
        Ok(())
    }

    fn load(&self, provider: &str) -> Option<AuthToken> {
        self.get(provider)
    }

    fn delete(&self, provider: &str) -> Result<bool, AuthError> {
        Ok(self
            .tokens
            .lock()
            .expect("store lock poisoned")
            .remove(provider)
            .is_some())
    }

    fn list_all(&self) -> BTreeSet<String> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn clear_all(&self) -> Result<(), AuthError> {
        self.tokens.lock().expect("store lock poisoned").clear();
        Ok(())
    }
}

pub fn token(provider: &str, access_token: &str) -> AuthToken {
    AuthToken::new(provider, access_token)
}

pub fn live_token(provider: &str, access_token: &str) -> AuthToken {
    AuthToken::new(provider, access_token).with_expires_at(Utc::now() + ChronoDuration::hours(1))
}

pub fn expired_token(provider: &str, access_token: &str) -> AuthToken {
    AuthToken::new(provider, access_token).with_expires_at(Utc::now() - ChronoDuration::minutes(5))
}

/// Answers prompts from a fixed script.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretPrompt for ScriptedPrompt {
    fn prompt_secret(&self, _label: &str) -> Result<String, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .expect("prompt lock poisoned")
            .pop_front()
            .ok_or_else(|| AuthError::Prompt("no scripted answer left".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub slow_downs: Mutex<Vec<Duration>>,
    pub device_codes: Mutex<Vec<String>>,
    pub authorize_urls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn slow_downs(&self) -> Vec<Duration> {
        self.slow_downs.lock().expect("notifier lock poisoned").clone()
    }

    pub fn device_codes(&self) -> Vec<String> {
        self.device_codes.lock().expect("notifier lock poisoned").clone()
    }
}

impl FlowNotifier for RecordingNotifier {
    fn device_code(&self, _provider: &str, response: &DeviceCodeResponse) {
        self.device_codes
            .lock()
            .expect("notifier lock poisoned")
            .push(response.user_code.clone());
    }

    fn authorize_url(&self, _provider: &str, url: &str) {
        self.authorize_urls
            .lock()
            .expect("notifier lock poisoned")
            .push(url.to_string());
    }

    fn slow_down(&self, _provider: &str, interval: Duration) {
        self.slow_downs
            .lock()
            .expect("notifier lock poisoned")
            .push(interval);
    }
}

/// What the fake user does in the browser.
#[derive(Debug, Clone)]
pub enum BrowserAction {
    /// Approve: redirect with the expected state and [`AUTH_CODE`].
    Approve,
    /// Redirect with a state the flow never issued.
    WrongState,
    /// Redirect with `error=<value>`.
    Reject(String),
    /// Never come back.
    Ignore,
}

/// Plays the user's side of a browser login by calling the redirect URI.
pub struct RedirectingBrowser {
    action: BrowserAction,
    opened: Mutex<Vec<String>>,
}

impl RedirectingBrowser {
    pub fn new(action: BrowserAction) -> Self {
        Self {
            action,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("browser lock poisoned").clone()
    }
}

impl BrowserOpener for RedirectingBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened
            .lock()
            .expect("browser lock poisoned")
            .push(url.to_string());

        let authorize = Url::parse(url).expect("authorize url");
        let param = |name: &str| {
            authorize
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .expect("authorize url parameter")
        };
        let redirect_uri = param("redirect_uri");
        let state = param("state");

        let mut callback = Url::parse(&redirect_uri).expect("redirect uri");
        match &self.action {
            BrowserAction::Ignore => return Ok(()),
            BrowserAction::Approve => {
                callback
                    .query_pairs_mut()
                    .append_pair("code", AUTH_CODE)
                    .append_pair("state", &state);
            }
            BrowserAction::WrongState => {
                callback
                    .query_pairs_mut()
                    .append_pair("code", AUTH_CODE)
                    .append_pair("state", "forged-state");
            }
            BrowserAction::Reject(error) => {
                callback.query_pairs_mut().append_pair("error", error);
            }
        }

        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok(())
    }
}

pub fn interaction(
    browser: Arc<RedirectingBrowser>,
    prompt: Arc<ScriptedPrompt>,
    notifier: Arc<RecordingNotifier>,
) -> Interaction {
    Interaction::default()
        .with_browser(browser)
        .with_prompt(prompt)
        .with_notifier(notifier)
}

/// Interaction where every seam is a silent fake.
pub fn quiet_interaction() -> Interaction {
    interaction(
        Arc::new(RedirectingBrowser::new(BrowserAction::Ignore)),
        Arc::new(ScriptedPrompt::default()),
        Arc::new(RecordingNotifier::default()),
    )
}
