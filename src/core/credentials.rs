//! Credential provider boundary.
//!
//! The core only asks two things of a credential source: whether a key is
//! available, and to pick a new one after the provider rejected the current
//! key. Storage and prompting live in [`crate::auth`].

use std::error::Error;
use std::fmt;
use std::io;

use crate::core::keyring::KeyringAccessError;

pub trait CredentialProvider {
    fn has_credential(&self) -> bool;

    /// Replaces the current credential. May block on user input.
    fn select_credential(&mut self) -> Result<(), CredentialError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialStatus {
    #[default]
    Unknown,
    Present,
    Missing,
}

impl CredentialStatus {
    pub fn from_presence(present: bool) -> Self {
        if present {
            CredentialStatus::Present
        } else {
            CredentialStatus::Missing
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CredentialStatus::Unknown => "unknown",
            CredentialStatus::Present => "present",
            CredentialStatus::Missing => "missing",
        }
    }
}

#[derive(Debug)]
pub enum CredentialError {
    /// The user backed out of selection or entered nothing.
    Cancelled,
    Prompt(io::Error),
    Keyring(KeyringAccessError),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Cancelled => write!(f, "credential selection cancelled"),
            CredentialError::Prompt(err) => write!(f, "failed to read credential: {err}"),
            CredentialError::Keyring(err) => write!(f, "keyring unavailable: {err}"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Cancelled => None,
            CredentialError::Prompt(err) => Some(err),
            CredentialError::Keyring(err) => Some(err),
        }
    }
}

impl From<io::Error> for CredentialError {
    fn from(err: io::Error) -> Self {
        CredentialError::Prompt(err)
    }
}

impl From<KeyringAccessError> for CredentialError {
    fn from(err: KeyringAccessError) -> Self {
        CredentialError::Keyring(err)
    }
}
