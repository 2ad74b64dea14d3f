/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A minimal CLI for exercising the panel lifecycle against the headless
//! shell.
//!
//! Thin wrapper around [`sidepanel::Panel`].
//!
//! ```bash
//! sidepanel example.com
//! sidepanel --position left --width 420 "rust borrow checker"
//! sidepanel --config panel.json --toggle 2 https://example.com
//! ```

use std::path::PathBuf;
use std::process;

use bpaf::Bpaf;
use log::error;
use sidepanel::{ContainerBorder, Panel, PanelOptions, Position, SettingsUpdate};

// ---------------------------------------------------------------------------
// CLI parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, usage("sidepanel [OPTIONS] [INPUT]"))]
struct PanelConfig {
    /// Dock the panel on this side (left, right)
    #[bpaf(long, argument::<String>("SIDE"), parse(parse_position), optional)]
    position: Option<Position>,

    /// Panel width in pixels
    #[bpaf(long, argument("PIXELS"), optional)]
    width: Option<u32>,

    /// Hide the panel when the pointer leaves it
    #[bpaf(long)]
    auto_hide: bool,

    /// Disable the hide/show animation
    #[bpaf(long)]
    no_animation: bool,

    /// Accent border placement (none, left, right, both)
    #[bpaf(long, argument::<String>("SIDE"), parse(parse_border), optional)]
    border: Option<ContainerBorder>,

    /// Treat the window as a popup
    #[bpaf(long)]
    popup: bool,

    /// Exclude the panel from popup windows
    #[bpaf(long)]
    hide_in_popups: bool,

    /// Persist settings to this JSON file
    #[bpaf(long, argument("PATH"))]
    config: Option<PathBuf>,

    /// Run N extra toggle (unmount/remount) cycles before printing
    #[bpaf(long, argument("N"), fallback(0u32))]
    toggle: u32,

    /// URL or search text to load in the panel
    #[bpaf(positional::<String>("INPUT"), optional)]
    input: Option<String>,
}

fn parse_position(s: String) -> Result<Position, String> {
    Position::parse(&s).ok_or_else(|| format!("invalid position: {s}"))
}

fn parse_border(s: String) -> Result<ContainerBorder, String> {
    ContainerBorder::parse(&s).ok_or_else(|| format!("invalid border: {s}"))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = panel_config().run();

    let initial = SettingsUpdate {
        position: config.position,
        width: config.width,
        auto_hide: config.auto_hide.then_some(true),
        animated: config.no_animation.then_some(false),
        container_border: config.border,
        hide_in_popup_windows: config.hide_in_popups.then_some(true),
        ..Default::default()
    };

    let panel = Panel::new(PanelOptions {
        initial,
        popup: config.popup,
        store_path: config.config.clone(),
    })
    .unwrap_or_else(|e| {
        error!("failed to start panel: {e}");
        process::exit(1);
    });

    if let Some(input) = &config.input {
        match panel.navigate(input) {
            Ok(url) => eprintln!("Loading {url}..."),
            Err(e) => {
                error!("navigation failed: {e}");
                process::exit(1);
            }
        }
    }

    for _ in 0..config.toggle {
        for _ in 0..2 {
            if let Err(e) = panel.toggle_sidebar() {
                error!("toggle failed: {e}");
                process::exit(1);
            }
        }
    }

    let state = panel.state().unwrap_or_else(|e| {
        error!("failed to read panel state: {e}");
        process::exit(1);
    });
    let snapshot = panel.snapshot().unwrap_or_else(|e| {
        error!("failed to snapshot shell: {e}");
        process::exit(1);
    });

    print!("{snapshot}");
    match serde_json::to_string_pretty(&state) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("failed to serialize state: {e}");
            process::exit(1);
        }
    }
}
