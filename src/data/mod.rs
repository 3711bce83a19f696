//! Core data models for the menu client
//!
//! This module contains the wire types exchanged with the menu service:
//! the recursive `MenuNode` tree, the user-menu envelope, permission checks,
//! usage statistics and the error bodies returned on failure.

pub mod fallback;
pub mod fetcher;

pub use fallback::{default_fallback_menus, load_fallback_menus, FallbackError};
pub use fetcher::{FetchError, FetchErrorKind, MenuFetcher};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of entry a menu node represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuType {
    /// A navigable page or group
    #[default]
    Menu,
    /// An action button inside a page
    Button,
    /// A tab inside a page
    Tab,
}

/// Whether a menu entry is currently enabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuStatus {
    #[default]
    Active,
    Disabled,
}

/// Category of the user a menu response was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Admin,
    Tenant,
    Limited,
}

/// One entry in the navigation tree
///
/// Children are owned by value, so a tree can never contain a cycle or share
/// a subtree between two parents. Transformations in [`crate::transform`]
/// always build new trees and leave their input untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuNode {
    /// Identifier, unique across the whole tree
    pub id: String,
    /// Machine-readable name
    pub name: String,
    /// Display title (default locale)
    pub title: String,
    /// English display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    /// Route path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Frontend component name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Icon class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Emoji icon, preferred over `icon` when both are set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Parent node id, only meaningful for flat listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Permission required to see this node and its subtree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default)]
    pub menu_type: MenuType,
    /// Ascending sort key among siblings
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub status: MenuStatus,
    /// Opaque display metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    /// Child entries in display order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    /// Creates a visible, active leaf node with the given id, name and title
    pub fn new(id: impl Into<String>, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: title.into(),
            title_en: None,
            path: None,
            component: None,
            icon: None,
            emoji: None,
            parent_id: None,
            permission: None,
            menu_type: MenuType::Menu,
            sort_order: 0,
            is_hidden: false,
            is_external: false,
            status: MenuStatus::Active,
            meta: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Sets the route path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the required permission
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Sets the sibling sort key
    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Marks the node hidden or visible
    pub fn hidden(mut self, is_hidden: bool) -> Self {
        self.is_hidden = is_hidden;
        self
    }

    /// Replaces the children
    pub fn with_children(mut self, children: Vec<MenuNode>) -> Self {
        self.children = children;
        self
    }

    /// Returns the title for a locale
    ///
    /// `"en"` selects `title_en` when present; every other locale uses `title`.
    pub fn display_title(&self, locale: &str) -> &str {
        match (locale, self.title_en.as_deref()) {
            ("en", Some(title_en)) => title_en,
            _ => &self.title,
        }
    }

    /// Returns the icon to display, preferring the emoji
    pub fn display_icon(&self) -> Option<&str> {
        self.emoji.as_deref().or(self.icon.as_deref())
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Length in edges of the longest downward chain; a leaf has depth 0
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        self.status == MenuStatus::Active
    }

    /// Copies every field except the children
    pub(crate) fn shallow_clone(&self) -> MenuNode {
        MenuNode {
            id: self.id.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            title_en: self.title_en.clone(),
            path: self.path.clone(),
            component: self.component.clone(),
            icon: self.icon.clone(),
            emoji: self.emoji.clone(),
            parent_id: self.parent_id.clone(),
            permission: self.permission.clone(),
            menu_type: self.menu_type,
            sort_order: self.sort_order,
            is_hidden: self.is_hidden,
            is_external: self.is_external,
            status: self.status,
            meta: self.meta.clone(),
            children: Vec::new(),
        }
    }
}

/// Response body of the `user-menus` endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMenuResponse {
    pub user_id: String,
    pub user_type: UserType,
    /// Permission strings granted to the user
    pub permissions: Vec<String>,
    /// Menu forest the user may access
    pub menus: Vec<MenuNode>,
    /// ISO-8601 timestamp of the last change on the server
    pub updated_at: String,
}

/// Result of a single menu permission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuPermissionCheck {
    pub menu_id: String,
    pub permission: String,
    pub has_permission: bool,
}

/// Menu usage statistics reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuStatsResponse {
    pub total_menus: u32,
    pub accessible_menus: u32,
    /// Share of menus the user can access, 0-100
    pub permission_coverage: f64,
    /// Visit counts keyed by menu id
    #[serde(default)]
    pub menu_usage: BTreeMap<String, u64>,
}

/// One entry of a request validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: String,
    /// Location of the offending value; elements are field names or indexes
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
}

/// The `detail` field of an error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Validation(Vec<ValidationIssue>),
}

/// Body returned by the server with any non-2xx status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub detail: ErrorDetail,
}

impl ApiErrorBody {
    /// Flattens the detail into a single human-readable line
    pub fn message(&self) -> String {
        match &self.detail {
            ErrorDetail::Message(message) => message.clone(),
            ErrorDetail::Validation(issues) => issues
                .iter()
                .map(|issue| {
                    let loc = issue
                        .loc
                        .iter()
                        .map(|part| match part {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".");
                    if loc.is_empty() {
                        issue.msg.clone()
                    } else {
                        format!("{}: {}", loc, issue.msg)
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}
