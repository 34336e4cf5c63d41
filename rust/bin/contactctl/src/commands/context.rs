//! Context management commands.

use std::path::Path;

use anyhow::Result;

use crate::config::{ClientConfig, Context};

/// Create or update a context. The first context becomes current.
pub fn set(
    name: &str,
    server: Option<&str>,
    token: Option<&str>,
    client_config_path: &Path,
) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    let mut ctx = config.get(name).cloned().unwrap_or_else(|| Context {
        name: name.to_string(),
        ..Context::default()
    });
    if let Some(s) = server {
        ctx.server = s.trim_end_matches('/').to_string();
    }
    if let Some(t) = token {
        ctx.token = t.to_string();
    }
    if ctx.server.is_empty() {
        anyhow::bail!("Context \"{}\" has no server. Pass --server <url>.", name);
    }

    config.upsert_context(ctx);
    if config.current_context.is_empty() {
        config.current_context = name.to_string();
    }
    config.save(client_config_path)?;
    println!("Context \"{}\" saved.", name);
    Ok(())
}

/// List all contexts.
pub fn list(client_config_path: &Path) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;

    if config.contexts.is_empty() {
        println!("No contexts configured.");
        println!("Run: contactctl context set <name> --server <url>");
        return Ok(());
    }

    println!("{:2} {:20} {:40} {:6}", "", "NAME", "SERVER", "TOKEN");
    for ctx in &config.contexts {
        let marker = if ctx.name == config.current_context { "*" } else { " " };
        let token = if ctx.token.is_empty() { "-" } else { "yes" };
        println!("{:2} {:20} {:40} {:6}", marker, ctx.name, ctx.server, token);
    }

    Ok(())
}

/// Switch current context.
pub fn use_context(name: &str, client_config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    if config.get(name).is_none() {
        anyhow::bail!(
            "Context \"{}\" not found. Run `contactctl context list` to see available contexts.",
            name
        );
    }

    config.current_context = name.to_string();
    config.save(client_config_path)?;
    println!("Switched to context \"{}\".", name);
    Ok(())
}

pub fn delete(name: &str, client_config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    if !config.remove_context(name) {
        anyhow::bail!("Context \"{}\" not found.", name);
    }

    config.save(client_config_path)?;
    println!("Context \"{}\" deleted.", name);
    Ok(())
}
