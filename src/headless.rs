/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `HeadlessShell` — an in-memory [`HostShell`] backed by a small named
//! node tree instead of a real window.
//!
//! The tree mirrors the structure a chrome-side shell builds: an anchor
//! wrapper whose children get displaced into a content wrapper, next to a
//! panel holding a toolbar (address field + nav buttons) and a content
//! viewer. Used by the CLI binary, the thread-safe [`Panel`] wrapper, and
//! the integration tests; instrumented with call counters so lifecycle
//! properties are observable from outside.
//!
//! [`Panel`]: crate::Panel

use std::fmt::Write as _;

use log::debug;
use url::Url;

use crate::shell::{HostShell, LoadEvent, LoadObserver};
use crate::types::{PanelError, PanelSettings, Position};

/// Marker for the located anchor container.
#[derive(Debug)]
pub struct HeadlessAnchor;

/// References to the mounted panel nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessHandles {
    id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PanelStyle {
    position: Position,
    width: u32,
    border: &'static str,
    animated: bool,
}

struct MountedPanel {
    id: u64,
    /// Host children displaced into the content wrapper, original order.
    displaced: Vec<String>,
    style: PanelStyle,
    hidden: bool,
    pointer_tracking: bool,
    address: Option<Url>,
    viewer_url: String,
    observer: Option<LoadObserver>,
}

/// Mutating shell calls, counted for the integration tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellCounters {
    /// Every mutating call (everything except the `is_popup_window`
    /// predicate and read accessors).
    pub total_calls: u64,
    pub build_calls: u64,
    pub teardown_calls: u64,
    pub style_calls: u64,
    /// Rising edges of pointer tracking only; re-enabling an already
    /// enabled tracker does not count (no double-binding).
    pub pointer_bindings: u64,
}

pub struct HeadlessShell {
    popup: bool,
    anchor_present: bool,
    anchor_children: Vec<String>,
    mounted: Option<MountedPanel>,
    /// When set, the next `load_content` completes with an unreadable
    /// (cross-origin) final address.
    cross_origin: bool,
    /// When set, the next `build_structure` fails after partially building,
    /// exercising the attach-atomically contract.
    fail_next_build: bool,
    next_id: u64,
    counters: ShellCounters,
}

impl Default for HeadlessShell {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self {
            popup: false,
            anchor_present: true,
            anchor_children: vec!["tab-strip".to_string(), "browser-stack".to_string()],
            mounted: None,
            cross_origin: false,
            fail_next_build: false,
            next_id: 1,
            counters: ShellCounters::default(),
        }
    }

    pub fn set_popup(&mut self, popup: bool) {
        self.popup = popup;
    }

    /// Simulate a host layout without the anchor container.
    pub fn remove_anchor(&mut self) {
        self.anchor_present = false;
    }

    pub fn set_cross_origin(&mut self, cross_origin: bool) {
        self.cross_origin = cross_origin;
    }

    pub fn fail_next_build(&mut self) {
        self.fail_next_build = true;
    }

    pub fn counters(&self) -> ShellCounters {
        self.counters
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn hidden(&self) -> Option<bool> {
        self.mounted.as_ref().map(|m| m.hidden)
    }

    pub fn pointer_tracking(&self) -> Option<bool> {
        self.mounted.as_ref().map(|m| m.pointer_tracking)
    }

    pub fn address(&self) -> Option<String> {
        self.mounted
            .as_ref()
            .and_then(|m| m.address.as_ref().map(Url::to_string))
    }

    pub fn viewer_url(&self) -> Option<String> {
        self.mounted.as_ref().map(|m| m.viewer_url.clone())
    }

    /// Stable textual rendering of the node tree. Two shells with
    /// observably identical trees produce identical snapshots.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        if !self.anchor_present {
            out.push_str("(no anchor)\n");
            return out;
        }
        out.push_str("wrapper\n");
        match &self.mounted {
            None => {
                for child in &self.anchor_children {
                    let _ = writeln!(out, "  {child}");
                }
            }
            Some(m) => {
                let _ = writeln!(out, "  container[position={}]", m.style.position.as_str());
                let panel = format!(
                    "    panel[width={} border={} animated={} hidden={}]\n      toolbar[address={}]\n      viewer[{}]",
                    m.style.width,
                    m.style.border,
                    m.style.animated,
                    m.hidden,
                    m.address.as_ref().map(Url::to_string).unwrap_or_default(),
                    m.viewer_url,
                );
                let mut content = String::from("    content-wrap\n");
                for child in &m.displaced {
                    let _ = writeln!(content, "      {child}");
                }
                // Panel side follows the configured dock position.
                match m.style.position {
                    Position::Left => {
                        out.push_str(&panel);
                        out.push('\n');
                        out.push_str(&content);
                    }
                    Position::Right => {
                        out.push_str(&content);
                        out.push_str(&panel);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    fn mounted_for(&mut self, handles: &HeadlessHandles) -> Option<&mut MountedPanel> {
        self.mounted.as_mut().filter(|m| m.id == handles.id)
    }
}

fn style_of(settings: &PanelSettings) -> PanelStyle {
    PanelStyle {
        position: settings.position,
        width: settings.width,
        border: settings.container_border.as_str(),
        animated: settings.animated,
    }
}

impl HostShell for HeadlessShell {
    type Anchor = HeadlessAnchor;
    type Handles = HeadlessHandles;

    fn is_popup_window(&self) -> bool {
        self.popup
    }

    fn find_anchor(&mut self) -> Option<HeadlessAnchor> {
        self.counters.total_calls += 1;
        self.anchor_present.then_some(HeadlessAnchor)
    }

    fn build_structure(
        &mut self,
        _anchor: HeadlessAnchor,
        settings: &PanelSettings,
    ) -> Result<HeadlessHandles, PanelError> {
        self.counters.total_calls += 1;
        self.counters.build_calls += 1;
        if self.mounted.is_some() {
            // The controller never double-builds between an init/destroy
            // pair; refuse rather than duplicate nodes if an embedder does.
            return Err(PanelError::AnchorNotFound);
        }

        // Built detached; the anchor children move over only on the final
        // attach below, so a failure here leaves the tree untouched.
        let id = self.next_id;
        self.next_id += 1;
        let panel = MountedPanel {
            id,
            displaced: self.anchor_children.clone(),
            style: style_of(settings),
            hidden: false,
            pointer_tracking: false,
            address: None,
            viewer_url: "about:blank".to_string(),
            observer: None,
        };

        if self.fail_next_build {
            self.fail_next_build = false;
            debug!("headless: discarding partially built panel structure");
            drop(panel);
            return Err(PanelError::AnchorNotFound);
        }

        self.anchor_children.clear();
        self.mounted = Some(panel);
        Ok(HeadlessHandles { id })
    }

    fn teardown_structure(&mut self, handles: HeadlessHandles) {
        self.counters.total_calls += 1;
        self.counters.teardown_calls += 1;
        if let Some(m) = self.mounted.take_if(|m| m.id == handles.id) {
            // Displaced children go back in their original order.
            self.anchor_children = m.displaced;
        }
    }

    fn apply_style(&mut self, handles: &HeadlessHandles, settings: &PanelSettings) {
        self.counters.total_calls += 1;
        self.counters.style_calls += 1;
        let style = style_of(settings);
        if let Some(m) = self.mounted_for(handles) {
            m.style = style;
        }
    }

    fn set_hidden(&mut self, handles: &HeadlessHandles, hidden: bool) {
        self.counters.total_calls += 1;
        if let Some(m) = self.mounted_for(handles) {
            m.hidden = hidden;
        }
    }

    fn set_pointer_tracking(&mut self, handles: &HeadlessHandles, enabled: bool) {
        self.counters.total_calls += 1;
        if let Some(m) = self.mounted.as_mut().filter(|m| m.id == handles.id) {
            if enabled && !m.pointer_tracking {
                self.counters.pointer_bindings += 1;
            }
            m.pointer_tracking = enabled;
        }
    }

    fn set_address(&mut self, handles: &HeadlessHandles, url: &Url) {
        self.counters.total_calls += 1;
        if let Some(m) = self.mounted_for(handles) {
            m.address = Some(url.clone());
        }
    }

    fn load_content(&mut self, handles: &HeadlessHandles, url: &Url) {
        self.counters.total_calls += 1;
        let cross_origin = self.cross_origin;
        if let Some(m) = self.mounted_for(handles) {
            m.viewer_url = url.to_string();
            // Completion is queued for the controller's next tick, never
            // delivered inline.
            if let Some(observer) = &m.observer {
                let url = (!cross_origin).then(|| url.clone());
                observer.push(LoadEvent { url });
            }
        }
    }

    fn set_load_observer(&mut self, handles: &HeadlessHandles, observer: LoadObserver) {
        self.counters.total_calls += 1;
        if let Some(m) = self.mounted_for(handles) {
            m.observer = Some(observer);
        }
    }
}
