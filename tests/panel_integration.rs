/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Integration tests for `PanelController` (driven directly against the
//! `HeadlessShell`), the `SettingsStore`, and the thread-safe `Panel`
//! wrapper.
//!
//! Controller tests never sleep: `tick` takes the current instant as an
//! argument, so the auto-hide debounce is exercised with synthetic
//! deadlines. Only the `Panel` debounce tests use real time.

use std::time::{Duration, Instant};

use sidepanel::{
    ConfigSource, ContainerBorder, HIDE_DELAY, HeadlessShell, JsonFileBackend, Lifecycle,
    MemoryBackend, Panel, PanelController, PanelError, PanelOptions, PanelSettings, Position,
    PrefBackend, PrefValue, SettingsStore, SettingsUpdate,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn controller() -> PanelController<HeadlessShell> {
    PanelController::new(HeadlessShell::new(), PanelSettings::default())
}

fn controller_with(settings: PanelSettings) -> PanelController<HeadlessShell> {
    PanelController::new(HeadlessShell::new(), settings)
}

fn auto_hide_settings() -> PanelSettings {
    PanelSettings {
        auto_hide: true,
        ..PanelSettings::default()
    }
}

fn well_past_hide_delay() -> Instant {
    Instant::now() + HIDE_DELAY + Duration::from_millis(100)
}

// ---------------------------------------------------------------------------
// Lifecycle: init / destroy / toggle
// ---------------------------------------------------------------------------

#[test]
fn test_init_mounts_panel() {
    let mut panel = controller();
    assert_eq!(panel.lifecycle(), Lifecycle::Uninitialized);
    assert!(!panel.is_mounted());

    panel.init().unwrap();

    assert_eq!(panel.lifecycle(), Lifecycle::Active);
    assert!(panel.is_mounted());
    assert!(panel.shell().is_mounted());
    let snapshot = panel.shell().snapshot();
    assert!(snapshot.contains("panel[width=300 border=left animated=true hidden=false]"));
    assert!(snapshot.contains("viewer[about:blank]"));
}

#[test]
fn test_destroy_restores_pre_init_shape() {
    let mut panel = controller();
    let before = panel.shell().snapshot();

    // Even-length alternating sequences must return to the pre-init shape.
    for _ in 0..3 {
        panel.init().unwrap();
        assert_ne!(panel.shell().snapshot(), before);
        panel.destroy();
        assert_eq!(panel.shell().snapshot(), before);
    }
    assert_eq!(panel.shell().counters().build_calls, 3);
    assert_eq!(panel.shell().counters().teardown_calls, 3);
}

#[test]
fn test_init_twice_is_noop() {
    let mut panel = controller();
    panel.init().unwrap();
    panel.init().unwrap();
    assert_eq!(panel.shell().counters().build_calls, 1);
}

#[test]
fn test_destroy_when_uninitialized_is_noop() {
    let mut panel = controller();
    panel.destroy();
    assert_eq!(panel.shell().counters().total_calls, 0);
}

#[test]
fn test_init_disabled_is_noop() {
    let mut panel = controller_with(PanelSettings {
        enabled: false,
        ..PanelSettings::default()
    });
    panel.init().unwrap();
    assert!(!panel.is_mounted());
    assert_eq!(panel.shell().counters().total_calls, 0);
}

#[test]
fn test_popup_exclusion_makes_zero_shell_calls() {
    let mut shell = HeadlessShell::new();
    shell.set_popup(true);
    let mut panel = PanelController::new(
        shell,
        PanelSettings {
            hide_in_popup_windows: true,
            ..PanelSettings::default()
        },
    );
    panel.init().unwrap();
    assert_eq!(panel.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(panel.shell().counters().total_calls, 0);
}

#[test]
fn test_popup_without_exclusion_mounts() {
    let mut shell = HeadlessShell::new();
    shell.set_popup(true);
    let mut panel = PanelController::new(shell, PanelSettings::default());
    panel.init().unwrap();
    assert!(panel.is_mounted());
}

#[test]
fn test_init_without_anchor_fails_cleanly() {
    let mut shell = HeadlessShell::new();
    shell.remove_anchor();
    let mut panel = PanelController::new(shell, PanelSettings::default());

    let err = panel.init().unwrap_err();
    assert!(matches!(err, PanelError::AnchorNotFound));
    assert_eq!(panel.lifecycle(), Lifecycle::Uninitialized);
    assert!(!panel.is_mounted());
}

#[test]
fn test_failed_build_leaves_no_partial_dom() {
    let mut panel = controller();
    let before = panel.shell().snapshot();
    panel.shell_mut().fail_next_build();

    assert!(panel.init().is_err());
    assert_eq!(panel.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(panel.shell().snapshot(), before);

    // The failure is one-shot; the next user action retries naturally.
    panel.init().unwrap();
    assert!(panel.is_mounted());
}

#[test]
fn test_reinit_after_destroy_recreates_state() {
    let mut panel = controller();
    panel.init().unwrap();
    panel.navigate("example.com").unwrap();
    panel.tick(Instant::now());
    assert!(panel.current_url().is_some());

    panel.destroy();
    assert!(panel.current_url().is_none());

    panel.init().unwrap();
    assert!(panel.current_url().is_none());
    assert_eq!(panel.shell().viewer_url().as_deref(), Some("about:blank"));
}

#[test]
fn test_toggle_sidebar_cycles() {
    let mut panel = controller();
    let before = panel.shell().snapshot();

    panel.toggle_sidebar().unwrap();
    assert!(panel.is_mounted());
    panel.toggle_sidebar().unwrap();
    assert!(!panel.is_mounted());
    assert_eq!(panel.shell().snapshot(), before);
}

#[test]
fn test_toggle_respects_popup_exclusion() {
    let mut shell = HeadlessShell::new();
    shell.set_popup(true);
    let mut panel = PanelController::new(
        shell,
        PanelSettings {
            hide_in_popup_windows: true,
            ..PanelSettings::default()
        },
    );
    panel.toggle_sidebar().unwrap();
    assert!(!panel.is_mounted());
    assert_eq!(panel.shell().counters().total_calls, 0);
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

#[test]
fn test_enable_edge_triggers_exactly_one_init() {
    let mut panel = controller_with(PanelSettings {
        enabled: false,
        ..PanelSettings::default()
    });

    let enabled = PanelSettings::default();
    panel.reconcile(enabled.clone());
    assert!(panel.is_mounted());
    assert_eq!(panel.shell().counters().build_calls, 1);

    // enabled true -> true: zero further inits.
    panel.reconcile(enabled);
    assert_eq!(panel.shell().counters().build_calls, 1);
}

#[test]
fn test_disable_edge_unmounts() {
    let mut panel = controller();
    panel.init().unwrap();
    let before_init = "wrapper\n  tab-strip\n  browser-stack\n";

    panel.reconcile(PanelSettings {
        enabled: false,
        ..PanelSettings::default()
    });
    assert!(!panel.is_mounted());
    assert_eq!(panel.shell().snapshot(), before_init);
}

#[test]
fn test_reconcile_identical_settings_makes_no_shell_calls() {
    let mut panel = controller_with(auto_hide_settings());
    panel.init().unwrap();
    let counters = panel.shell().counters();

    panel.reconcile(auto_hide_settings());
    panel.reconcile(auto_hide_settings());

    assert_eq!(panel.shell().counters(), counters);
    assert_eq!(panel.shell().counters().pointer_bindings, 1);
}

#[test]
fn test_reconcile_visual_change_mutates_without_rebuild() {
    let mut panel = controller();
    panel.init().unwrap();

    panel.reconcile(PanelSettings {
        width: 420,
        position: Position::Left,
        container_border: ContainerBorder::Both,
        ..PanelSettings::default()
    });

    assert_eq!(panel.shell().counters().build_calls, 1);
    assert_eq!(panel.shell().counters().style_calls, 1);
    let snapshot = panel.shell().snapshot();
    assert!(snapshot.contains("container[position=left]"));
    assert!(snapshot.contains("width=420"));
    assert!(snapshot.contains("border=both"));
}

#[test]
fn test_reconcile_while_unmounted_touches_no_shell() {
    let mut panel = controller_with(PanelSettings {
        enabled: false,
        ..PanelSettings::default()
    });
    panel.reconcile(PanelSettings {
        enabled: false,
        width: 500,
        ..PanelSettings::default()
    });
    assert_eq!(panel.shell().counters().total_calls, 0);
    assert_eq!(panel.settings().width, 500);
}

#[test]
fn test_reconcile_autohide_rewires_tracking() {
    let mut panel = controller();
    panel.init().unwrap();
    assert_eq!(panel.shell().pointer_tracking(), Some(false));

    panel.reconcile(auto_hide_settings());
    assert_eq!(panel.shell().pointer_tracking(), Some(true));
    assert_eq!(panel.shell().counters().pointer_bindings, 1);

    // Hide the panel, then turn auto-hide off: tracking unwinds and the
    // panel is shown again.
    panel.pointer_leave();
    panel.tick(well_past_hide_delay());
    assert!(panel.is_hidden());

    panel.reconcile(PanelSettings::default());
    assert_eq!(panel.shell().pointer_tracking(), Some(false));
    assert!(!panel.is_hidden());
    assert_eq!(panel.shell().hidden(), Some(false));

    panel.reconcile(auto_hide_settings());
    assert_eq!(panel.shell().counters().pointer_bindings, 2);
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[test]
fn test_navigate_adds_https_for_dotted_input() {
    let mut panel = controller();
    panel.init().unwrap();
    let url = panel.navigate("example.com").unwrap();
    assert_eq!(url.as_str(), "https://example.com/");
    assert_eq!(
        panel.shell().viewer_url().as_deref(),
        Some("https://example.com/")
    );
}

#[test]
fn test_navigate_passes_through_explicit_scheme() {
    let mut panel = controller();
    panel.init().unwrap();
    let url = panel.navigate("ftp://x/y").unwrap();
    assert_eq!(url.as_str(), "ftp://x/y");
}

#[test]
fn test_navigate_routes_bare_text_to_search() {
    let mut panel = controller();
    panel.init().unwrap();
    let url = panel.navigate("hello world").unwrap();
    assert_eq!(
        url.as_str(),
        "https://www.google.com/search?q=hello%20world"
    );
}

#[test]
fn test_navigate_rejects_unparseable_input() {
    let mut panel = controller();
    panel.init().unwrap();
    panel.navigate("example.com").unwrap();

    for bad in ["", "   ", "://nowhere"] {
        let err = panel.navigate(bad).unwrap_err();
        assert!(matches!(err, PanelError::NavigationRejected(_)), "{bad:?}");
    }
    // The address field keeps its last accepted value.
    assert_eq!(
        panel.shell().address().as_deref(),
        Some("https://example.com/")
    );
}

#[test]
fn test_navigate_rejected_when_unmounted() {
    let mut panel = controller();
    let err = panel.navigate("example.com").unwrap_err();
    assert!(matches!(err, PanelError::NavigationRejected(_)));
}

#[test]
fn test_address_roundtrips_to_normalized_form() {
    let mut panel = controller();
    panel.init().unwrap();
    panel.navigate("example.com").unwrap();
    // Visible immediately after submission, before any completion arrives.
    assert_eq!(
        panel.shell().address().as_deref(),
        Some("https://example.com/")
    );
    assert!(panel.current_url().is_none());

    panel.tick(Instant::now());
    assert_eq!(
        panel.current_url().map(|u| u.as_str()),
        Some("https://example.com/")
    );
}

#[test]
fn test_cross_origin_completion_leaves_address_as_last_set() {
    let mut panel = controller();
    panel.init().unwrap();
    panel.shell_mut().set_cross_origin(true);

    panel.navigate("example.com").unwrap();
    panel.tick(Instant::now());

    // Completion carried no readable address: current_url never confirmed,
    // the field still shows the submitted form.
    assert!(panel.current_url().is_none());
    assert_eq!(
        panel.shell().address().as_deref(),
        Some("https://example.com/")
    );
}

// ---------------------------------------------------------------------------
// Auto-hide debounce
// ---------------------------------------------------------------------------

#[test]
fn test_pointer_leave_hides_after_delay_never_earlier() {
    let mut panel = controller_with(auto_hide_settings());
    panel.init().unwrap();

    panel.pointer_leave();
    panel.tick(Instant::now());
    assert!(!panel.is_hidden());

    panel.tick(well_past_hide_delay());
    assert!(panel.is_hidden());
    assert_eq!(panel.shell().hidden(), Some(true));
    // Still mounted: hiding is presentation only.
    assert!(panel.is_mounted());
}

#[test]
fn test_pointer_enter_cancels_pending_hide() {
    let mut panel = controller_with(auto_hide_settings());
    panel.init().unwrap();

    // Any number of leaves is cancelled by a single enter.
    for _ in 0..5 {
        panel.pointer_leave();
    }
    panel.pointer_enter();
    assert!(panel.next_deadline().is_none());

    panel.tick(well_past_hide_delay());
    assert!(!panel.is_hidden());
}

#[test]
fn test_pointer_enter_shows_hidden_panel() {
    let mut panel = controller_with(auto_hide_settings());
    panel.init().unwrap();

    panel.pointer_leave();
    panel.tick(well_past_hide_delay());
    assert!(panel.is_hidden());

    panel.pointer_enter();
    assert!(!panel.is_hidden());
    assert_eq!(panel.shell().hidden(), Some(false));
}

#[test]
fn test_pointer_events_ignored_without_autohide() {
    let mut panel = controller();
    panel.init().unwrap();
    panel.pointer_leave();
    assert!(panel.next_deadline().is_none());
    panel.tick(well_past_hide_delay());
    assert!(!panel.is_hidden());
}

#[test]
fn test_stale_tick_after_destroy_is_noop() {
    let mut panel = controller_with(auto_hide_settings());
    panel.init().unwrap();
    panel.pointer_leave();
    panel.destroy();

    let counters = panel.shell().counters();
    panel.tick(well_past_hide_delay());
    assert!(!panel.is_hidden());
    assert_eq!(panel.shell().counters(), counters);
}

// ---------------------------------------------------------------------------
// Settings store
// ---------------------------------------------------------------------------

/// A host backend whose capability is gone entirely.
struct DeniedBackend;

impl PrefBackend for DeniedBackend {
    fn read(&mut self, key: &str) -> Result<Option<PrefValue>, PanelError> {
        Err(PanelError::ConfigAccessDenied(key.to_string()))
    }
    fn write(&mut self, key: &str, _value: PrefValue) -> Result<(), PanelError> {
        Err(PanelError::ConfigAccessDenied(key.to_string()))
    }
}

/// A host backend that answers reads but denies every write.
#[derive(Default)]
struct ReadOnlyBackend {
    inner: MemoryBackend,
}

impl PrefBackend for ReadOnlyBackend {
    fn read(&mut self, key: &str) -> Result<Option<PrefValue>, PanelError> {
        self.inner.read(key)
    }
    fn write(&mut self, key: &str, _value: PrefValue) -> Result<(), PanelError> {
        Err(PanelError::ConfigAccessDenied(key.to_string()))
    }
}

#[test]
fn test_store_defaults() {
    let mut store = SettingsStore::in_memory();
    assert_eq!(store.get(), PanelSettings::default());
}

#[test]
fn test_store_set_then_get_roundtrip() {
    let mut store = SettingsStore::in_memory();
    store.set(&SettingsUpdate {
        enabled: Some(false),
        position: Some(Position::Left),
        width: Some(480),
        container_border: Some(ContainerBorder::None),
        ..Default::default()
    });
    let settings = store.get();
    assert!(!settings.enabled);
    assert_eq!(settings.position, Position::Left);
    assert_eq!(settings.width, 480);
    assert_eq!(settings.container_border, ContainerBorder::None);
    // Untouched fields keep their defaults.
    assert!(settings.animated);
}

#[test]
fn test_store_junk_values_read_as_defaults() {
    let mut backend = MemoryBackend::new();
    backend.seed("panel.width", PrefValue::Int(0));
    backend.seed("panel.position", PrefValue::Str("diagonal".to_string()));
    backend.seed("panel.enabled", PrefValue::Str("yes".to_string()));
    backend.seed("panel.container-border", PrefValue::Bool(true));

    let mut store = SettingsStore::open(None, Box::new(backend));
    assert_eq!(store.get(), PanelSettings::default());
}

#[test]
fn test_store_unavailable_host_falls_back_at_open() {
    let mut store = SettingsStore::open(Some(Box::new(DeniedBackend)), Box::new(MemoryBackend::new()));
    store.set(&SettingsUpdate {
        width: Some(333),
        ..Default::default()
    });
    assert_eq!(store.get().width, 333);
}

#[test]
fn test_store_denied_write_falls_back_transparently() {
    let store_host = ReadOnlyBackend::default();
    let mut store = SettingsStore::open(Some(Box::new(store_host)), Box::new(MemoryBackend::new()));

    // The probe read succeeds, so the host backend is active; the first
    // write is denied and the store demotes itself without surfacing it.
    store.set(&SettingsUpdate {
        width: Some(275),
        ..Default::default()
    });
    assert_eq!(store.get().width, 275);
}

#[test]
fn test_store_notifications_are_not_reentrant() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut store = SettingsStore::in_memory();
    let seen: Rc<RefCell<Vec<PanelSettings>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let token = store.subscribe(Box::new(move |s| sink.borrow_mut().push(s.clone())));

    store.set(&SettingsUpdate {
        width: Some(410),
        ..Default::default()
    });
    // Nothing delivered from inside set().
    assert!(seen.borrow().is_empty());

    // A burst coalesces into one delivery of the latest settings.
    store.set(&SettingsUpdate {
        width: Some(411),
        ..Default::default()
    });
    store.pump();
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0].width, 411);

    // Nothing pending: pump is a no-op.
    store.pump();
    assert_eq!(seen.borrow().len(), 1);

    store.unsubscribe(token);
    store.set(&SettingsUpdate {
        width: Some(412),
        ..Default::default()
    });
    store.pump();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_json_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panel.json");

    let backend = JsonFileBackend::open(&path).unwrap();
    let mut store = SettingsStore::open(None, Box::new(backend));
    store.set(&SettingsUpdate {
        position: Some(Position::Left),
        auto_hide: Some(true),
        ..Default::default()
    });
    drop(store);

    let backend = JsonFileBackend::open(&path).unwrap();
    let mut store = SettingsStore::open(None, Box::new(backend));
    let settings = store.get();
    assert_eq!(settings.position, Position::Left);
    assert!(settings.auto_hide);
}

#[test]
fn test_json_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panel.json");
    std::fs::write(&path, "not json").unwrap();

    let err = JsonFileBackend::open(&path).unwrap_err();
    assert!(matches!(err, PanelError::StoreIo(_)));
}

// ---------------------------------------------------------------------------
// Thread-safe Panel wrapper
// ---------------------------------------------------------------------------

#[test]
fn test_panel_mounts_and_navigates() {
    let panel = Panel::new(PanelOptions::default()).unwrap();

    let url = panel.navigate("example.com").unwrap();
    assert_eq!(url, "https://example.com/");

    let state = panel.state().unwrap();
    assert_eq!(state.lifecycle, Lifecycle::Active);
    assert!(state.mounted);
    assert_eq!(state.address.as_deref(), Some("https://example.com/"));
    assert_eq!(state.current_url.as_deref(), Some("https://example.com/"));
    assert!(panel.snapshot().unwrap().contains("panel[width=300"));
}

#[test]
fn test_panel_settings_update_reconciles() {
    let panel = Panel::new(PanelOptions::default()).unwrap();
    panel
        .apply_settings(SettingsUpdate {
            width: Some(444),
            position: Some(Position::Left),
            ..Default::default()
        })
        .unwrap();

    let state = panel.state().unwrap();
    assert_eq!(state.settings.width, 444);
    assert!(panel.snapshot().unwrap().contains("width=444"));
    assert!(panel.snapshot().unwrap().contains("position=left"));
}

#[test]
fn test_panel_enable_disable_via_settings() {
    let panel = Panel::new(PanelOptions::default()).unwrap();

    panel
        .apply_settings(SettingsUpdate {
            enabled: Some(false),
            ..Default::default()
        })
        .unwrap();
    assert!(!panel.state().unwrap().mounted);

    panel
        .apply_settings(SettingsUpdate {
            enabled: Some(true),
            ..Default::default()
        })
        .unwrap();
    assert!(panel.state().unwrap().mounted);
}

#[test]
fn test_panel_toggle() {
    let panel = Panel::new(PanelOptions::default()).unwrap();
    panel.toggle_sidebar().unwrap();
    assert!(!panel.state().unwrap().mounted);
    panel.toggle_sidebar().unwrap();
    assert!(panel.state().unwrap().mounted);
}

#[test]
fn test_panel_popup_exclusion() {
    let panel = Panel::new(PanelOptions {
        initial: SettingsUpdate {
            hide_in_popup_windows: Some(true),
            ..Default::default()
        },
        popup: true,
        ..Default::default()
    })
    .unwrap();
    assert!(!panel.state().unwrap().mounted);
}

#[test]
fn test_panel_autohide_debounce_with_real_time() {
    let panel = Panel::new(PanelOptions {
        initial: SettingsUpdate {
            auto_hide: Some(true),
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();

    panel.pointer_leave().unwrap();
    assert!(!panel.state().unwrap().hidden);
    std::thread::sleep(HIDE_DELAY + Duration::from_millis(250));
    assert!(panel.state().unwrap().hidden);

    panel.pointer_enter().unwrap();
    assert!(!panel.state().unwrap().hidden);
}

#[test]
fn test_panel_persists_settings_to_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panel.json");

    {
        let panel = Panel::new(PanelOptions {
            store_path: Some(path.clone()),
            ..Default::default()
        })
        .unwrap();
        panel
            .apply_settings(SettingsUpdate {
                width: Some(512),
                ..Default::default()
            })
            .unwrap();
        // Force a round-trip so the write has been processed.
        panel.state().unwrap();
    }

    let panel = Panel::new(PanelOptions {
        store_path: Some(path),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(panel.state().unwrap().settings.width, 512);
}
