//! Static fallback menu tree
//!
//! This module contains the local menu tree served when the menu service is
//! unreachable, and a loader for replacing it with a tree read from a JSON file.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::MenuNode;
use crate::transform::normalize;

/// Errors that can occur when loading a fallback tree from disk
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The file could not be read
    #[error("Failed to read fallback menu file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a JSON array of menu nodes
    #[error("Failed to parse fallback menu file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Builds the built-in fallback tree
///
/// Contains the two entry points every user of the platform lands on. The
/// result is already normalized.
pub fn default_fallback_menus() -> Vec<MenuNode> {
    let mut dashboard = MenuNode::new("dashboard", "dashboard", "总览")
        .with_path("/")
        .with_permission("menu:dashboard")
        .with_sort_order(1);
    dashboard.title_en = Some("Dashboard".to_string());
    dashboard.icon = Some("dashboard".to_string());
    dashboard.emoji = Some("🏠".to_string());
    dashboard.meta.insert("title".to_string(), "总览".to_string());
    dashboard.meta.insert("title_en".to_string(), "Dashboard".to_string());
    dashboard.meta.insert("keepAlive".to_string(), "true".to_string());

    let mut market_config = MenuNode::new("market_config", "market_config", "市场配置")
        .with_path("/market-config")
        .with_permission("menu:market_config")
        .with_sort_order(2);
    market_config.title_en = Some("Market Config".to_string());
    market_config.icon = Some("market".to_string());
    market_config.emoji = Some("📊".to_string());

    normalize(vec![dashboard, market_config])
}

/// Reads a fallback tree from a JSON file holding an array of menu nodes
///
/// # Arguments
/// * `path` - Location of the JSON file
///
/// # Returns
/// * `Ok(Vec<MenuNode>)` with the normalized tree
/// * `Err(FallbackError)` if the file cannot be read or parsed
pub fn load_fallback_menus(path: impl AsRef<Path>) -> Result<Vec<MenuNode>, FallbackError> {
    let content = fs::read_to_string(path)?;
    let menus: Vec<MenuNode> = serde_json::from_str(&content)?;
    Ok(normalize(menus))
}
