/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A lifecycle controller for a dockable web-panel sidebar.
//!
//! The controller owns the panel state machine — mount, unmount, settings
//! reconciliation, input normalization, auto-hide — and manipulates the
//! surrounding chrome only through the narrow [`HostShell`] trait. Settings
//! live behind [`ConfigSource`], with a host preference backend and a local
//! fallback selected automatically.
//!
//! Provides two layers:
//!
//! - **[`PanelController`]** — single-threaded, zero-overhead core. Drive
//!   it directly from the host UI thread.
//! - **[`Panel`]** — thread-safe wrapper (`Send + Sync`). Spawns a
//!   background thread running a `PanelController` over the in-memory
//!   [`HeadlessShell`] and communicates via channels.
//!
//! # Example (Rust, direct)
//!
//! ```
//! use sidepanel::{HeadlessShell, PanelController, PanelSettings};
//!
//! let mut panel = PanelController::new(HeadlessShell::new(), PanelSettings::default());
//! panel.init().unwrap();
//! let url = panel.navigate("example.com").unwrap();
//! assert_eq!(url.as_str(), "https://example.com/");
//! ```
//!
//! # Example (thread-safe)
//!
//! ```
//! use sidepanel::{Panel, PanelOptions};
//!
//! let panel = Panel::new(PanelOptions::default()).unwrap();
//! panel.navigate("example.com").unwrap();
//! println!("{}", panel.snapshot().unwrap());
//! ```

mod config;
mod controller;
mod headless;
mod panel;
mod shell;
mod types;

pub use config::{
    ChangeListener, ConfigSource, JsonFileBackend, MemoryBackend, PrefBackend, PrefValue,
    SettingsStore, SubscriberToken,
};
pub use controller::{HIDE_DELAY, PanelController};
pub use headless::{HeadlessShell, ShellCounters};
pub use panel::{Panel, PanelOptions, PanelState};
pub use shell::{HostShell, LoadEvent, LoadObserver};
pub use types::{
    ContainerBorder, Lifecycle, PanelError, PanelSettings, Position, SettingsUpdate,
};
