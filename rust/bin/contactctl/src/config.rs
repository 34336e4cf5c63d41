//! Client-side context management.
//!
//! Reads/writes `~/.openerp/contact.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A named connection to a server exposing the contact admin API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,

    /// Server URL (e.g. "http://localhost:8080").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Name of the currently active context.
    #[serde(rename = "current-context", default)]
    pub current_context: String,

    #[serde(default)]
    pub contexts: Vec<Context>,
}

impl ClientConfig {
    /// Default config file path: ~/.openerp/contact.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("contact.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn current(&self) -> Option<&Context> {
        self.get(&self.current_context)
    }

    pub fn get(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Context> {
        self.contexts.iter_mut().find(|c| c.name == name)
    }

    /// Context named `name`, or the current one when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> anyhow::Result<&Context> {
        match name {
            Some(name) => self
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("Context \"{}\" not found.", name)),
            None => self.current().ok_or_else(|| {
                anyhow::anyhow!("No current context. Run `contactctl context set <name> --server <url>`.")
            }),
        }
    }

    /// Add or update a context.
    pub fn upsert_context(&mut self, ctx: Context) {
        if let Some(existing) = self.get_mut(&ctx.name) {
            *existing = ctx;
        } else {
            self.contexts.push(ctx);
        }
    }

    /// Remove a context by name. Returns true if it was found.
    pub fn remove_context(&mut self, name: &str) -> bool {
        let len = self.contexts.len();
        self.contexts.retain(|c| c.name != name);
        if self.current_context == name {
            self.current_context = String::new();
        }
        self.contexts.len() < len
    }
}

/// Return the OpenERP config directory (~/.openerp).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".openerp")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &str, server: &str) -> Context {
        Context {
            name: name.to_string(),
            server: server.to_string(),
            token: String::new(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.current_context.is_empty());
        assert!(config.contexts.is_empty());
        assert!(config.current().is_none());
    }

    #[test]
    fn test_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("contact.toml");

        let mut config = ClientConfig::default();
        config.current_context = "stage".to_string();
        config.contexts.push(Context {
            token: "abc".to_string(),
            ..ctx("stage", "http://localhost:8080")
        });
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("current-context = \"stage\""));

        let back = ClientConfig::load(&path).unwrap();
        assert_eq!(back.current_context, "stage");
        assert_eq!(back.current().unwrap().token, "abc");
    }

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.contexts.is_empty());
    }

    #[test]
    fn test_empty_token_is_not_written() {
        let mut config = ClientConfig::default();
        config.upsert_context(ctx("local", "http://h"));
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(!text.contains("token"));
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut config = ClientConfig::default();
        config.upsert_context(ctx("a", "http://one"));
        config.upsert_context(ctx("a", "http://two"));
        config.current_context = "a".to_string();

        assert_eq!(config.contexts.len(), 1);
        assert_eq!(config.current().unwrap().server, "http://two");

        assert!(config.remove_context("a"));
        assert!(config.current_context.is_empty());
        assert!(!config.remove_context("a"));
    }

    #[test]
    fn test_resolve_prefers_explicit_name() {
        let mut config = ClientConfig::default();
        config.upsert_context(ctx("a", "http://a"));
        config.upsert_context(ctx("b", "http://b"));
        config.current_context = "a".to_string();

        assert_eq!(config.resolve(None).unwrap().name, "a");
        assert_eq!(config.resolve(Some("b")).unwrap().name, "b");
        assert!(config.resolve(Some("c")).is_err());
    }
}
