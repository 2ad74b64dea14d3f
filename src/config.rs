/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Settings storage: the `ConfigSource` seam and the shipped
//! `SettingsStore`.
//!
//! The store reads and writes a flat key namespace over a [`PrefBackend`].
//! Two backends exist: an embedder-provided host preference service
//! (capability-gated, may deny access at any point) and a local fallback
//! (JSON file, or plain memory). Backend selection is automatic and
//! invisible to callers: a denied host backend is swapped for the fallback
//! and the operation retried, so [`PanelError::ConfigAccessDenied`] never
//! escapes this module.
//!
//! Change notifications are queued by `set` and delivered by `pump`, never
//! from inside `set` — a listener can observe its own writes only on the
//! next turn of the event loop.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use serde_json::Value;

use crate::types::{ContainerBorder, PanelError, PanelSettings, Position, SettingsUpdate};

pub const KEY_ENABLED: &str = "panel.enabled";
pub const KEY_POSITION: &str = "panel.position";
pub const KEY_AUTO_HIDE: &str = "panel.auto-hide";
pub const KEY_ANIMATED: &str = "panel.animated";
pub const KEY_CONTAINER_BORDER: &str = "panel.container-border";
pub const KEY_HIDE_IN_POPUP: &str = "panel.hide-in-popup-windows";
pub const KEY_WIDTH: &str = "panel.width";

/// A value in the flat preference namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// A flat string-keyed preference backend.
///
/// `Err(ConfigAccessDenied)` from either operation means the capability is
/// gone; the store reacts by switching to its fallback backend.
pub trait PrefBackend {
    fn read(&mut self, key: &str) -> Result<Option<PrefValue>, PanelError>;
    fn write(&mut self, key: &str, value: PrefValue) -> Result<(), PanelError>;
}

/// Volatile in-process backend. The default local fallback when no store
/// file is configured, and the baseline backend for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: BTreeMap<String, PrefValue>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing validation. Lets tests exercise the
    /// read-boundary handling of junk data.
    pub fn seed(&mut self, key: &str, value: PrefValue) {
        self.values.insert(key.to_string(), value);
    }
}

impl PrefBackend for MemoryBackend {
    fn read(&mut self, key: &str) -> Result<Option<PrefValue>, PanelError> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: PrefValue) -> Result<(), PanelError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Local fallback store persisted as a flat JSON object on disk.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    values: serde_json::Map<String, Value>,
}

impl JsonFileBackend {
    /// Open (or create) the store file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PanelError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| PanelError::StoreIo(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(e) => return Err(PanelError::StoreIo(format!("{}: {e}", path.display()))),
        };
        Ok(Self { path, values })
    }

    fn persist(&self) -> Result<(), PanelError> {
        let text = serde_json::to_string_pretty(&Value::Object(self.values.clone()))
            .map_err(|e| PanelError::StoreIo(e.to_string()))?;
        fs::write(&self.path, text)
            .map_err(|e| PanelError::StoreIo(format!("{}: {e}", self.path.display())))
    }
}

impl PrefBackend for JsonFileBackend {
    fn read(&mut self, key: &str) -> Result<Option<PrefValue>, PanelError> {
        Ok(self.values.get(key).and_then(|v| match v {
            Value::Bool(b) => Some(PrefValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(PrefValue::Int),
            Value::String(s) => Some(PrefValue::Str(s.clone())),
            _ => None,
        }))
    }

    fn write(&mut self, key: &str, value: PrefValue) -> Result<(), PanelError> {
        let json = match value {
            PrefValue::Bool(b) => Value::Bool(b),
            PrefValue::Int(i) => Value::Number(i.into()),
            PrefValue::Str(s) => Value::String(s),
        };
        self.values.insert(key.to_string(), json);
        self.persist()
    }
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberToken(u64);

pub type ChangeListener = Box<dyn FnMut(&PanelSettings)>;

/// A settings source the controller can be reconciled against.
pub trait ConfigSource {
    /// Current settings, validated (junk stored values read as defaults).
    fn get(&mut self) -> PanelSettings;

    /// Persist the `Some` fields of `update` and queue a change
    /// notification for the next `pump`.
    fn set(&mut self, update: &SettingsUpdate);

    fn subscribe(&mut self, listener: ChangeListener) -> SubscriberToken;

    fn unsubscribe(&mut self, token: SubscriberToken);

    /// Deliver queued change notifications. Bursts coalesce to the latest
    /// settings; reconcile is idempotent so this loses nothing.
    fn pump(&mut self);
}

/// The shipped [`ConfigSource`]: a validated read/write boundary over a
/// host backend with automatic local fallback.
pub struct SettingsStore {
    backend: Box<dyn PrefBackend>,
    fallback: Option<Box<dyn PrefBackend>>,
    listeners: Vec<(SubscriberToken, ChangeListener)>,
    next_token: u64,
    dirty: bool,
}

impl SettingsStore {
    /// Open over an optional host preference backend, with `local` as the
    /// fallback. The host backend is probed once up front; if the probe is
    /// denied the store starts on the fallback directly.
    pub fn open(host: Option<Box<dyn PrefBackend>>, local: Box<dyn PrefBackend>) -> Self {
        let (backend, fallback) = match host {
            Some(mut host) => match host.read(KEY_ENABLED) {
                Ok(_) => (host, Some(local)),
                Err(e) => {
                    warn!("host preference backend unavailable, using local store: {e}");
                    (local, None)
                }
            },
            None => (local, None),
        };
        Self {
            backend,
            fallback,
            listeners: Vec::new(),
            next_token: 1,
            dirty: false,
        }
    }

    /// Open with a purely in-memory local store and no host backend.
    pub fn in_memory() -> Self {
        Self::open(None, Box::new(MemoryBackend::new()))
    }

    fn demote_to_fallback(&mut self, err: &PanelError) -> bool {
        match self.fallback.take() {
            Some(local) => {
                warn!("host preference backend denied access, switching to local store: {err}");
                self.backend = local;
                true
            }
            None => false,
        }
    }

    fn read_pref(&mut self, key: &str) -> Option<PrefValue> {
        match self.backend.read(key) {
            Ok(value) => value,
            Err(e) => {
                if self.demote_to_fallback(&e) {
                    self.backend.read(key).ok().flatten()
                } else {
                    warn!("failed to read {key}: {e}");
                    None
                }
            }
        }
    }

    fn write_pref(&mut self, key: &str, value: PrefValue) {
        if let Err(e) = self.backend.write(key, value.clone()) {
            if self.demote_to_fallback(&e) {
                if let Err(e) = self.backend.write(key, value) {
                    warn!("failed to write {key} to local store: {e}");
                }
            } else {
                warn!("failed to write {key}: {e}");
            }
        }
    }

    fn read_bool(&mut self, key: &str, default: bool) -> bool {
        match self.read_pref(key) {
            Some(PrefValue::Bool(b)) => b,
            Some(other) => {
                debug!("{key}: ignoring non-boolean stored value {other:?}");
                default
            }
            None => default,
        }
    }

    fn read_width(&mut self) -> u32 {
        match self.read_pref(KEY_WIDTH) {
            Some(PrefValue::Int(i)) if i >= 1 => u32::try_from(i).unwrap_or(u32::MAX),
            Some(other) => {
                debug!("{KEY_WIDTH}: ignoring out-of-range stored value {other:?}");
                crate::types::DEFAULT_WIDTH
            }
            None => crate::types::DEFAULT_WIDTH,
        }
    }

    fn read_str<T>(&mut self, key: &str, parse: impl Fn(&str) -> Option<T>, default: T) -> T {
        match self.read_pref(key) {
            Some(PrefValue::Str(s)) => match parse(&s) {
                Some(v) => v,
                None => {
                    debug!("{key}: ignoring unrecognized stored value {s:?}");
                    default
                }
            },
            Some(other) => {
                debug!("{key}: ignoring non-string stored value {other:?}");
                default
            }
            None => default,
        }
    }
}

impl ConfigSource for SettingsStore {
    fn get(&mut self) -> PanelSettings {
        let defaults = PanelSettings::default();
        PanelSettings {
            enabled: self.read_bool(KEY_ENABLED, defaults.enabled),
            position: self.read_str(KEY_POSITION, Position::parse, defaults.position),
            auto_hide: self.read_bool(KEY_AUTO_HIDE, defaults.auto_hide),
            animated: self.read_bool(KEY_ANIMATED, defaults.animated),
            container_border: self.read_str(
                KEY_CONTAINER_BORDER,
                ContainerBorder::parse,
                defaults.container_border,
            ),
            hide_in_popup_windows: self
                .read_bool(KEY_HIDE_IN_POPUP, defaults.hide_in_popup_windows),
            width: self.read_width(),
        }
    }

    fn set(&mut self, update: &SettingsUpdate) {
        if update.is_empty() {
            return;
        }
        if let Some(enabled) = update.enabled {
            self.write_pref(KEY_ENABLED, PrefValue::Bool(enabled));
        }
        if let Some(position) = update.position {
            self.write_pref(KEY_POSITION, PrefValue::Str(position.as_str().to_string()));
        }
        if let Some(auto_hide) = update.auto_hide {
            self.write_pref(KEY_AUTO_HIDE, PrefValue::Bool(auto_hide));
        }
        if let Some(animated) = update.animated {
            self.write_pref(KEY_ANIMATED, PrefValue::Bool(animated));
        }
        if let Some(border) = update.container_border {
            self.write_pref(
                KEY_CONTAINER_BORDER,
                PrefValue::Str(border.as_str().to_string()),
            );
        }
        if let Some(hide) = update.hide_in_popup_windows {
            self.write_pref(KEY_HIDE_IN_POPUP, PrefValue::Bool(hide));
        }
        if let Some(width) = update.width {
            self.write_pref(KEY_WIDTH, PrefValue::Int(i64::from(width.max(1))));
        }
        self.dirty = true;
    }

    fn subscribe(&mut self, listener: ChangeListener) -> SubscriberToken {
        let token = SubscriberToken(self.next_token);
        self.next_token += 1;
        self.listeners.push((token, listener));
        token
    }

    fn unsubscribe(&mut self, token: SubscriberToken) {
        self.listeners.retain(|(t, _)| *t != token);
    }

    fn pump(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let settings = self.get();
        for (_, listener) in &mut self.listeners {
            listener(&settings);
        }
    }
}
