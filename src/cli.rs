//! Command-line interface parsing for menuctl
//!
//! This module handles parsing of CLI arguments using clap, turning them into a
//! `MenuServiceConfig`, and rendering menu trees as indented text.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::fetcher::DEFAULT_BASE_URL;
use crate::data::MenuNode;
use crate::service::MenuServiceConfig;
use crate::transform::MenuStats;

/// Icon shown for nodes that have neither an emoji nor an icon
const DEFAULT_ICON: &str = "📄";

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// An entry of a permission list is empty or contains whitespace
    #[error("Invalid permission list entry: '{0}'. Expected comma-separated values like menu:dashboard,menu:logs")]
    InvalidPermission(String),
}

/// menuctl - Inspect navigation menus served by the menu service
#[derive(Parser, Debug)]
#[command(name = "menuctl")]
#[command(about = "Fetch, filter and validate navigation menus")]
#[command(version)]
pub struct Cli {
    /// Base URL of the menu service API
    #[arg(long, env = "MENU_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Bearer token of the user whose menus are inspected
    #[arg(long, env = "MENU_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Extra attempts after a failed menu fetch
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Fail instead of showing the local fallback menus when the service is unreachable
    #[arg(long)]
    pub no_fallback: bool,

    /// JSON file with a menu array to use as the fallback tree
    #[arg(long, value_name = "PATH")]
    pub fallback_file: Option<PathBuf>,

    /// Locale for titles (en uses English titles when available)
    #[arg(long, default_value = "en")]
    pub locale: String,

    #[command(subcommand)]
    pub command: Command,
}

/// What menuctl should do
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the menu tree
    Tree {
        /// Drop hidden entries
        #[arg(long)]
        visible_only: bool,

        /// Keep only entries allowed by these comma-separated permissions
        #[arg(long, value_name = "LIST", value_parser = parse_permissions_arg)]
        permissions: Option<HashSet<String>>,
    },
    /// Ask the service whether the user may open a menu
    Check {
        /// Menu id to check
        menu_id: String,
    },
    /// Report duplicate ids and paths and malformed permissions
    Validate,
    /// Print statistics about the menu tree
    Stats,
    /// Print the breadcrumb trail for a route path
    Breadcrumb {
        /// Route path, e.g. /market-config
        path: String,
    },
}

impl Cli {
    /// Builds the service configuration these arguments describe
    pub fn service_config(&self) -> MenuServiceConfig {
        MenuServiceConfig::new(self.base_url.clone())
            .with_fallback_to_local(!self.no_fallback)
            .with_request_timeout(Duration::from_secs(self.timeout_secs))
            .with_retries(self.retries, MenuServiceConfig::default().retry_base_delay)
    }
}

/// Parses a comma-separated permission list
///
/// # Arguments
/// * `s` - The list from the command line, e.g. `menu:dashboard,menu:logs`
///
/// # Returns
/// * `Ok(HashSet<String>)` with the trimmed entries
/// * `Err(CliError::InvalidPermission)` if an entry is empty or contains whitespace
pub fn parse_permissions_arg(s: &str) -> Result<HashSet<String>, CliError> {
    s.split(',')
        .map(str::trim)
        .map(|entry| {
            if entry.is_empty() || entry.chars().any(char::is_whitespace) {
                Err(CliError::InvalidPermission(entry.to_string()))
            } else {
                Ok(entry.to_string())
            }
        })
        .collect()
}

/// Renders a menu forest as an indented outline, one node per line
pub fn render_tree(menus: &[MenuNode], locale: &str) -> String {
    let mut out = String::new();
    render_level(menus, locale, 0, &mut out);
    out
}

fn render_level(menus: &[MenuNode], locale: &str, level: usize, out: &mut String) {
    for menu in menus {
        out.push_str(&"  ".repeat(level));
        out.push_str(menu.display_icon().unwrap_or(DEFAULT_ICON));
        out.push(' ');
        out.push_str(menu.display_title(locale));
        if let Some(path) = &menu.path {
            out.push_str(&format!(" ({})", path));
        }
        if menu.is_hidden {
            out.push_str(" [hidden]");
        }
        out.push('\n');
        render_level(&menu.children, locale, level + 1, out);
    }
}

/// Renders a breadcrumb trail as `A > B > C`
pub fn render_breadcrumb(trail: &[&MenuNode], locale: &str) -> String {
    trail
        .iter()
        .map(|menu| menu.display_title(locale))
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Renders tree statistics, one figure per line
pub fn render_stats(stats: &MenuStats) -> String {
    format!(
        "total: {}\nroots: {}\nchildren: {}\nwith permission: {}\nmax depth: {}\n",
        stats.total_nodes,
        stats.root_nodes,
        stats.child_nodes,
        stats.nodes_with_permission,
        stats.max_depth
    )
}
