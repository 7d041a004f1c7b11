use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

/// Holds the access token for the hosted backend (auth + edge functions).
pub trait BackendCredentialStore: Send + Sync {
    fn save_access_token(&self, access_token: &str) -> Result<(), InfraError>;
    fn load_access_token(&self) -> Result<Option<String>, InfraError>;
    fn delete_access_token(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("flowtrack.backend", "default")
    }
}

impl BackendCredentialStore for KeyringCredentialStore {
    fn save_access_token(&self, access_token: &str) -> Result<(), InfraError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(InfraError::Credential(
                "access token must not be empty".to_string(),
            ));
        }
        self.entry()?
            .set_password(access_token)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_access_token(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_access_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    access_token: Mutex<Option<String>>,
}

impl BackendCredentialStore for InMemoryCredentialStore {
    fn save_access_token(&self, access_token: &str) -> Result<(), InfraError> {
        let mut guard = self
            .access_token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(access_token.to_string());
        Ok(())
    }

    fn load_access_token(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .access_token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_access_token(&self) -> Result<(), InfraError> {
        let mut guard = self
            .access_token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
