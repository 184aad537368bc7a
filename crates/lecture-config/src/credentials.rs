use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const INSTITUTION_CODE_KEY: &str = "institution_code";
const PASSWORD_KEY: &str = "password";
const CODE_ENV: &str = "LECTUREFETCH_CODE";
const PASSWORD_ENV: &str = "LECTUREFETCH_PASSWORD";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Login pair for the archive portal
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub institution_code: String,
    pub password: String,
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    pub fn set_login(&mut self, institution_code: String, password: String) {
        self.set(INSTITUTION_CODE_KEY.to_string(), institution_code);
        self.set(PASSWORD_KEY.to_string(), password);
    }

    pub fn clear_login(&mut self) {
        self.remove(INSTITUTION_CODE_KEY);
        self.remove(PASSWORD_KEY);
    }

    /// Resolve the login pair, environment variables taking precedence over the file
    pub fn login(&self) -> Option<Credentials> {
        let institution_code = std::env::var(CODE_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.get(INSTITUTION_CODE_KEY).cloned())?;
        let password = std::env::var(PASSWORD_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.get(PASSWORD_KEY).cloned())?;
        Some(Credentials {
            institution_code,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_credential_store_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_login("409000".to_string(), "secret".to_string());
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        assert_eq!(loaded_store.get("institution_code"), Some(&"409000".to_string()));
        assert_eq!(loaded_store.get("password"), Some(&"secret".to_string()));
    }

    #[test]
    fn test_credential_store_remove() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set("key1".to_string(), "value1".to_string());
        store.set("key2".to_string(), "value2".to_string());

        assert_eq!(store.get("key1"), Some(&"value1".to_string()));
        store.remove("key1");
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.get("key2"), Some(&"value2".to_string()));
    }

    #[test]
    fn test_clear_login_removes_both_keys() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set_login("1".to_string(), "2".to_string());
        store.clear_login();
        assert_eq!(store.get("institution_code"), None);
        assert_eq!(store.get("password"), None);
    }
}
