/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The `HostShell` seam: everything the controller needs from the
//! surrounding chrome, and nothing else.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use url::Url;

use crate::types::{PanelError, PanelSettings};

/// A content-load completion reported by the shell.
///
/// `url` is `None` when the loaded content is cross-origin to the host
/// chrome and its final address cannot be read; the controller then leaves
/// the address field and `current_url` as last set.
#[derive(Debug, Clone)]
pub struct LoadEvent {
    pub url: Option<Url>,
}

/// Shared queue the shell pushes [`LoadEvent`]s into and the controller
/// drains on `tick`. Completion delivery is fire-and-forget: the controller
/// never awaits a load inline.
#[derive(Clone, Default)]
pub struct LoadObserver {
    events: Rc<RefCell<VecDeque<LoadEvent>>>,
}

impl LoadObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: LoadEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn pop(&self) -> Option<LoadEvent> {
        self.events.borrow_mut().pop_front()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// The surrounding chrome environment that owns the real window tree.
///
/// The controller issues commands through this trait and never touches the
/// tree directly. Implementations must keep two contracts:
///
/// - `build_structure` attaches atomically: on error, nothing it created
///   may remain attached.
/// - `teardown_structure` restores any content the panel displaced back to
///   its original location, in its original order.
pub trait HostShell {
    /// Opaque reference to the pre-existing container the panel attaches to.
    type Anchor;
    /// Opaque references to the panel nodes created by `build_structure`.
    type Handles;

    /// True when this window is a popup (no full chrome toolbar).
    fn is_popup_window(&self) -> bool;

    /// Locate the anchor container, `None` when the host layout is missing
    /// it.
    fn find_anchor(&mut self) -> Option<Self::Anchor>;

    /// Build the panel structure (toolbar + content viewer + relocated host
    /// content) off-tree, then attach it in one step.
    fn build_structure(
        &mut self,
        anchor: Self::Anchor,
        settings: &PanelSettings,
    ) -> Result<Self::Handles, PanelError>;

    /// Remove the panel structure and put displaced content back.
    fn teardown_structure(&mut self, handles: Self::Handles);

    /// Apply the visual settings (position, width, border, animation) to an
    /// already-built panel.
    fn apply_style(&mut self, handles: &Self::Handles, settings: &PanelSettings);

    /// Presentation-only visibility toggle used by auto-hide. Must not
    /// detach anything.
    fn set_hidden(&mut self, handles: &Self::Handles, hidden: bool);

    /// Enable or disable pointer enter/leave tracking on the panel. Must be
    /// idempotent: enabling twice binds once.
    fn set_pointer_tracking(&mut self, handles: &Self::Handles, enabled: bool);

    /// Update the visible address field.
    fn set_address(&mut self, handles: &Self::Handles, url: &Url);

    /// Start loading `url` in the panel's content viewer. Completion is
    /// reported later through the registered observer.
    fn load_content(&mut self, handles: &Self::Handles, url: &Url);

    /// Register the observer that receives load completions.
    fn set_load_observer(&mut self, handles: &Self::Handles, observer: LoadObserver);
}
