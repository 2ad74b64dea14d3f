/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Layer 1: `PanelController` — single-threaded panel lifecycle core.
//!
//! Owns the lifecycle state machine (`Uninitialized` ↔ `Active`), reconciles
//! settings changes against the live shell state, normalizes navigation
//! input, and runs the auto-hide debounce. All shell access goes through
//! the injected [`HostShell`]; the controller never blocks — deferred work
//! (the hide timer, load completions) is picked up by [`tick`].
//!
//! [`tick`]: PanelController::tick

use std::time::{Duration, Instant};

use log::{debug, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::shell::{HostShell, LoadObserver};
use crate::types::{Lifecycle, PanelError, PanelSettings};

/// Debounce before an auto-hidden panel actually hides after pointer-leave.
pub const HIDE_DELAY: Duration = Duration::from_millis(500);

/// Where bare search terms are routed.
const SEARCH_URL: &str = "https://www.google.com/search?q=";

/// `encodeURIComponent`-compatible escape set (keeps `- _ . ! ~ * ' ( )`).
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Turn address-bar input into a loadable URL.
///
/// Input with a scheme separator passes through; input with a dot gets an
/// `https://` prefix; anything else is treated as a search query.
fn normalize_input(raw: &str) -> Result<Url, PanelError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(PanelError::NavigationRejected("empty input".to_string()));
    }
    let candidate = if input.contains("://") {
        input.to_string()
    } else if input.contains('.') {
        format!("https://{input}")
    } else {
        format!("{SEARCH_URL}{}", utf8_percent_encode(input, QUERY_ESCAPE))
    };
    Url::parse(&candidate)
        .map_err(|e| PanelError::NavigationRejected(format!("{input:?}: {e}")))
}

// ===========================================================================
// Layer 1: PanelController (single-threaded, zero overhead)
// ===========================================================================

/// Single-threaded panel lifecycle controller. **Not** `Send` or `Sync`.
///
/// Drive it directly from the host UI thread, or through the thread-safe
/// [`Panel`](crate::Panel) wrapper.
pub struct PanelController<S: HostShell> {
    shell: S,
    settings: PanelSettings,
    lifecycle: Lifecycle,
    handles: Option<S::Handles>,
    observer: LoadObserver,
    current_url: Option<Url>,
    hidden: bool,
    hide_deadline: Option<Instant>,
    /// Single-flight guard: a re-entrant init while a build is mid-flight
    /// is a no-op instead of a duplicate structure.
    in_init: bool,
}

impl<S: HostShell> PanelController<S> {
    /// Create a controller over `shell` with the current settings. Does not
    /// touch the shell; call [`init`](Self::init) to mount.
    pub fn new(shell: S, settings: PanelSettings) -> Self {
        Self {
            shell,
            settings,
            lifecycle: Lifecycle::Uninitialized,
            handles: None,
            observer: LoadObserver::new(),
            current_url: None,
            hidden: false,
            hide_deadline: None,
            in_init: false,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether panel nodes currently exist in the shell. Equal to
    /// `lifecycle() == Active` at all times.
    pub fn is_mounted(&self) -> bool {
        self.handles.is_some()
    }

    /// Auto-hide presentation state. Only meaningful while mounted with
    /// `auto_hide` on.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Last confirmed navigation, if any.
    pub fn current_url(&self) -> Option<&Url> {
        self.current_url.as_ref()
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut S {
        &mut self.shell
    }

    /// When the next deferred transition is due, for event loops that want
    /// to sleep until then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.hide_deadline
    }

    /// Mount the panel into the shell.
    ///
    /// No-op when already active, when an init is mid-flight, when settings
    /// disable the panel, or when this is a popup window the panel is
    /// configured to stay out of. The popup check precedes every shell
    /// mutation, so an excluded init performs zero shell calls.
    pub fn init(&mut self) -> Result<(), PanelError> {
        if self.in_init {
            debug!("init: already in flight, skipping");
            return Ok(());
        }
        if self.lifecycle == Lifecycle::Active {
            debug!("init: already active, skipping");
            return Ok(());
        }
        if !self.settings.enabled {
            debug!("init: panel disabled, skipping");
            return Ok(());
        }
        if self.shell.is_popup_window() && self.settings.hide_in_popup_windows {
            debug!("init: popup window excluded, skipping");
            return Ok(());
        }

        self.in_init = true;
        let result = self.mount();
        self.in_init = false;
        result
    }

    fn mount(&mut self) -> Result<(), PanelError> {
        let anchor = self.shell.find_anchor().ok_or(PanelError::AnchorNotFound)?;
        // build_structure attaches atomically: on error nothing it created
        // remains in the shell, so there is no partial DOM to clean up here.
        let handles = self.shell.build_structure(anchor, &self.settings)?;

        self.observer = LoadObserver::new();
        self.shell.set_load_observer(&handles, self.observer.clone());
        if self.settings.auto_hide {
            self.shell.set_pointer_tracking(&handles, true);
        }

        self.handles = Some(handles);
        self.hidden = false;
        self.hide_deadline = None;
        self.current_url = None;
        self.lifecycle = Lifecycle::Active;
        debug!("panel mounted");
        Ok(())
    }

    /// Unmount the panel and restore the shell to its pre-init shape. Safe
    /// to call at any time; a no-op when not mounted.
    pub fn destroy(&mut self) {
        let Some(handles) = self.handles.take() else {
            debug!("destroy: not mounted, skipping");
            return;
        };
        self.shell.teardown_structure(handles);
        self.observer.clear();
        self.hide_deadline = None;
        self.hidden = false;
        self.current_url = None;
        self.lifecycle = Lifecycle::Uninitialized;
        debug!("panel destroyed");
    }

    /// Bring live state into agreement with `new` settings.
    ///
    /// An `enabled` edge mounts or unmounts the panel; everything else is
    /// applied in place without rebuilding. Idempotent: reconciling twice
    /// with identical settings performs no shell calls the second time.
    pub fn reconcile(&mut self, new: PanelSettings) {
        let old = std::mem::replace(&mut self.settings, new);
        let new = &self.settings;

        if !old.enabled && new.enabled {
            if self.lifecycle != Lifecycle::Active {
                if let Err(e) = self.init() {
                    warn!("reconcile: init failed: {e}");
                }
            }
            return;
        }
        if old.enabled && !new.enabled {
            if self.lifecycle == Lifecycle::Active {
                self.destroy();
            }
            return;
        }

        if self.lifecycle != Lifecycle::Active {
            // Settings changes while unmounted only update the stored copy.
            return;
        }
        let Some(handles) = &self.handles else {
            return;
        };

        let visual_changed = old.position != new.position
            || old.width != new.width
            || old.container_border != new.container_border
            || old.animated != new.animated;
        if visual_changed {
            self.shell.apply_style(handles, new);
        }

        if old.auto_hide != new.auto_hide {
            self.shell.set_pointer_tracking(handles, new.auto_hide);
            if !new.auto_hide {
                self.hide_deadline = None;
                if self.hidden {
                    self.hidden = false;
                    self.shell.set_hidden(handles, false);
                }
            }
        }
    }

    /// Normalize `raw` and start loading it in the panel viewer.
    ///
    /// Returns the normalized URL. `current_url` is only updated once the
    /// shell reports the load complete (see [`tick`](Self::tick)); the
    /// visible address field is updated to the normalized form immediately,
    /// so what the user sees after submission is what was loaded.
    pub fn navigate(&mut self, raw: &str) -> Result<Url, PanelError> {
        let Some(handles) = &self.handles else {
            return Err(PanelError::NavigationRejected(
                "panel is not mounted".to_string(),
            ));
        };
        let url = normalize_input(raw)?;
        self.shell.load_content(handles, &url);
        self.shell.set_address(handles, &url);
        debug!("navigating panel to {url}");
        Ok(url)
    }

    /// Activation surface: unmount when mounted, mount otherwise. Popup
    /// exclusion and the `enabled` setting still apply to the mount path.
    pub fn toggle_sidebar(&mut self) -> Result<(), PanelError> {
        if self.lifecycle == Lifecycle::Active {
            self.destroy();
            Ok(())
        } else {
            self.init()
        }
    }

    /// Pointer entered the panel: cancel any pending hide and show it.
    pub fn pointer_enter(&mut self) {
        self.hide_deadline = None;
        if !self.settings.auto_hide {
            return;
        }
        if self.hidden {
            if let Some(handles) = &self.handles {
                self.hidden = false;
                self.shell.set_hidden(handles, false);
            }
        }
    }

    /// Pointer left the panel: arm (or re-arm) the hide debounce.
    pub fn pointer_leave(&mut self) {
        if self.settings.auto_hide && self.handles.is_some() {
            self.hide_deadline = Some(Instant::now() + HIDE_DELAY);
        }
    }

    /// Process deferred work: load completions and the hide debounce.
    ///
    /// Safe to call at any time and with any `now`; after `destroy` the
    /// deadline and event queue are cleared, so a stale tick is a no-op.
    pub fn tick(&mut self, now: Instant) {
        let Some(handles) = &self.handles else {
            return;
        };

        while let Some(event) = self.observer.pop() {
            match event.url {
                Some(url) => {
                    self.shell.set_address(handles, &url);
                    self.current_url = Some(url);
                }
                // Cross-origin completion: the final address is not
                // readable, leave the field as last set.
                None => debug!("cross-origin load completed, address left unchanged"),
            }
        }

        if self.settings.auto_hide
            && !self.hidden
            && self.hide_deadline.is_some_and(|deadline| now >= deadline)
        {
            self.hide_deadline = None;
            self.hidden = true;
            self.shell.set_hidden(handles, true);
        }
    }
}
