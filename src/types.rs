/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shared public types used across all layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the host window the panel docks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    #[default]
    Right,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Right => "right",
        }
    }

    /// Parse a stored string, `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Position::Left),
            "right" => Some(Position::Right),
            _ => None,
        }
    }
}

/// Accent-border placement on the panel container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerBorder {
    None,
    #[default]
    Left,
    Right,
    Both,
}

impl ContainerBorder {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerBorder::None => "none",
            ContainerBorder::Left => "left",
            ContainerBorder::Right => "right",
            ContainerBorder::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ContainerBorder::None),
            "left" => Some(ContainerBorder::Left),
            "right" => Some(ContainerBorder::Right),
            "both" => Some(ContainerBorder::Both),
            _ => None,
        }
    }
}

/// Default panel width in pixels.
pub const DEFAULT_WIDTH: u32 = 300;

/// Persisted panel settings.
///
/// The invariants (`width > 0`, valid enum values) are enforced at the
/// storage read boundary: junk in the backing store reads back as the
/// field default, never as an invalid value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSettings {
    pub enabled: bool,
    pub position: Position,
    pub auto_hide: bool,
    pub animated: bool,
    pub container_border: ContainerBorder,
    pub hide_in_popup_windows: bool,
    /// Panel width in pixels. Always >= 1.
    pub width: u32,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Position::Right,
            auto_hide: false,
            animated: true,
            container_border: ContainerBorder::Left,
            hide_in_popup_windows: false,
            width: DEFAULT_WIDTH,
        }
    }
}

impl PanelSettings {
    /// Return a copy with `update` applied on top.
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        let mut out = self.clone();
        if let Some(enabled) = update.enabled {
            out.enabled = enabled;
        }
        if let Some(position) = update.position {
            out.position = position;
        }
        if let Some(auto_hide) = update.auto_hide {
            out.auto_hide = auto_hide;
        }
        if let Some(animated) = update.animated {
            out.animated = animated;
        }
        if let Some(border) = update.container_border {
            out.container_border = border;
        }
        if let Some(hide) = update.hide_in_popup_windows {
            out.hide_in_popup_windows = hide;
        }
        if let Some(width) = update.width {
            out.width = width.max(1);
        }
        out
    }
}

/// A partial settings update: only the `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub position: Option<Position>,
    pub auto_hide: Option<bool>,
    pub animated: Option<bool>,
    pub container_border: Option<ContainerBorder>,
    pub hide_in_popup_windows: Option<bool>,
    pub width: Option<u32>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }
}

/// Panel lifecycle. `destroy()` returns to `Uninitialized`; a destroyed
/// controller is indistinguishable from a fresh one, so there is no
/// separate destroyed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Active,
}

/// Errors that can occur during panel operations.
#[derive(Debug)]
pub enum PanelError {
    /// The host shell is missing the container the panel attaches to.
    AnchorNotFound,
    /// The input could not be turned into a loadable URL, or the panel is
    /// not in a state that can navigate.
    NavigationRejected(String),
    /// The host preference capability refused access. Handled inside the
    /// settings store (falls back to the local store); never surfaced to
    /// the controller.
    ConfigAccessDenied(String),
    /// The local settings store could not be read or written.
    StoreIo(String),
    /// Internal channel was closed (thread-safe wrapper).
    ChannelClosed,
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelError::AnchorNotFound => write!(f, "host anchor container not found"),
            PanelError::NavigationRejected(msg) => write!(f, "navigation rejected: {msg}"),
            PanelError::ConfigAccessDenied(msg) => write!(f, "preference access denied: {msg}"),
            PanelError::StoreIo(msg) => write!(f, "settings store error: {msg}"),
            PanelError::ChannelClosed => write!(f, "internal channel closed"),
        }
    }
}

impl std::error::Error for PanelError {}
