//! API key storage: the system keyring first, then environment variables.

use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::core::constants::{API_KEY_ENV_VARS, KEYRING_SERVICE, KEYRING_USER};
use crate::core::credentials::{CredentialError, CredentialProvider};
use crate::core::keyring::{delete_secret, read_secret, store_secret};

mod ui;

use self::ui::{prompt_api_key, prompt_confirmation, ConfirmationChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Keyring,
    Environment(&'static str),
    Prompt,
}

/// Credential provider backed by the platform keyring.
pub struct KeyringCredentials {
    use_keyring: bool,
    api_key: Option<String>,
    source: Option<KeySource>,
}

impl KeyringCredentials {
    pub fn load() -> Self {
        Self::load_with_keyring(true)
    }

    /// Construct the provider, optionally disabling keyring access (useful for tests)
    pub fn load_with_keyring(use_keyring: bool) -> Self {
        let stored = if use_keyring {
            match read_secret(KEYRING_SERVICE, KEYRING_USER) {
                Ok(secret) => secret,
                Err(err) => {
                    warn!(error = %err, recoverable = err.is_recoverable(), "Keyring lookup failed");
                    None
                }
            }
        } else {
            None
        };
        let mut credentials = Self::from_sources(stored, |name| std::env::var(name).ok());
        credentials.use_keyring = use_keyring;
        credentials
    }

    fn from_sources(stored: Option<String>, env: impl Fn(&str) -> Option<String>) -> Self {
        let (api_key, source) = match stored.filter(|key| !key.trim().is_empty()) {
            Some(key) => (Some(key), Some(KeySource::Keyring)),
            None => match key_from_env(env) {
                Some((name, key)) => (Some(key), Some(KeySource::Environment(name))),
                None => (None, None),
            },
        };
        debug!(source = ?source, "Resolved API key source");
        Self {
            use_keyring: false,
            api_key,
            source,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn source(&self) -> Option<KeySource> {
        self.source
    }

    /// Prompts on `input`/`output` and stores the new key.
    pub fn select_from<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), CredentialError> {
        let Some(key) = prompt_api_key(input, output)? else {
            return Err(CredentialError::Cancelled);
        };

        if self.use_keyring {
            match store_secret(KEYRING_SERVICE, KEYRING_USER, &key) {
                Ok(()) => writeln!(output, "✓ API key stored in the system keyring")?,
                Err(err) => {
                    warn!(error = %err, "Could not store API key");
                    writeln!(output, "⚠️ Keyring unavailable; the key will last for this run only")?;
                }
            }
        }
        self.api_key = Some(key);
        self.source = Some(KeySource::Prompt);
        Ok(())
    }

    /// Deletes the stored key. Returns whether one was stored.
    pub fn forget(&mut self) -> Result<bool, CredentialError> {
        let removed = if self.use_keyring {
            delete_secret(KEYRING_SERVICE, KEYRING_USER)?
        } else {
            false
        };
        if matches!(self.source, Some(KeySource::Keyring | KeySource::Prompt)) {
            self.api_key = None;
            self.source = None;
        }
        Ok(removed)
    }
}

impl CredentialProvider for KeyringCredentials {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn select_credential(&mut self) -> Result<(), CredentialError> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.select_from(&mut input, &mut io::stdout())
    }
}

fn key_from_env(env: impl Fn(&str) -> Option<String>) -> Option<(&'static str, String)> {
    API_KEY_ENV_VARS.iter().find_map(|name| {
        env(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| (*name, value))
    })
}

/// `moodchat auth`: prompt for a key and store it.
pub fn interactive_auth() -> Result<(), Box<dyn std::error::Error>> {
    let mut credentials = KeyringCredentials::load();
    if let Some(KeySource::Environment(name)) = credentials.source() {
        println!("Note: {name} is set; a stored key takes precedence over it.");
    }
    match credentials.select_credential() {
        Ok(()) => Ok(()),
        Err(CredentialError::Cancelled) => {
            println!("Cancelled.");
            Ok(())
        }
        Err(err) => Err(Box::new(err)),
    }
}

/// `moodchat deauth`: remove the stored key after confirmation.
pub fn interactive_deauth() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    match prompt_confirmation("Remove the stored Gemini API key?", &mut input, &mut output)? {
        ConfirmationChoice::Yes => {
            let mut credentials = KeyringCredentials::load();
            if credentials.forget()? {
                println!("✓ Removed stored API key");
            } else {
                println!("No stored API key found.");
            }
        }
        ConfirmationChoice::No | ConfirmationChoice::Cancel => println!("Cancelled."),
    }
    Ok(())
}
