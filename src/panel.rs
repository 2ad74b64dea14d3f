/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Layer 2: `Panel` — thread-safe wrapper (`Send + Sync`).
//!
//! Spawns a background thread owning a [`PanelController`] over a
//! [`HeadlessShell`] plus a [`SettingsStore`], and communicates via
//! channels. Settings writes are pumped on the panel thread, so change
//! notifications are delivered strictly after the write that caused them —
//! never reentrantly.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use log::warn;
use serde::Serialize;

use crate::config::{ConfigSource, JsonFileBackend, MemoryBackend, PrefBackend, SettingsStore};
use crate::controller::PanelController;
use crate::headless::HeadlessShell;
use crate::types::{Lifecycle, PanelError, PanelSettings, SettingsUpdate};

/// Options for constructing a [`Panel`].
#[derive(Debug, Clone, Default)]
pub struct PanelOptions {
    /// Settings applied on top of whatever the store holds, before the
    /// first mount.
    pub initial: SettingsUpdate,
    /// Treat the headless window as a popup.
    pub popup: bool,
    /// Persist settings to this JSON file; `None` keeps them in memory.
    pub store_path: Option<PathBuf>,
}

/// Observable panel state, snapshotted on the panel thread.
#[derive(Debug, Clone, Serialize)]
pub struct PanelState {
    pub lifecycle: Lifecycle,
    pub mounted: bool,
    pub hidden: bool,
    pub current_url: Option<String>,
    pub address: Option<String>,
    pub viewer_url: Option<String>,
    pub settings: PanelSettings,
}

/// Commands sent from the `Panel` handle to the background thread.
enum Command {
    Navigate {
        raw: String,
        response: mpsc::Sender<Result<String, PanelError>>,
    },
    Toggle {
        response: mpsc::Sender<Result<(), PanelError>>,
    },
    ApplySettings {
        update: SettingsUpdate,
        response: mpsc::Sender<()>,
    },
    PointerEnter {
        response: mpsc::Sender<()>,
    },
    PointerLeave {
        response: mpsc::Sender<()>,
    },
    Snapshot {
        response: mpsc::Sender<String>,
    },
    State {
        response: mpsc::Sender<PanelState>,
    },
    Close {
        response: mpsc::Sender<()>,
    },
}

/// Thread-safe panel handle.
pub struct Panel {
    sender: Mutex<mpsc::Sender<Command>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Panel {
    /// Spawn the panel thread and mount the panel per the stored settings.
    pub fn new(options: PanelOptions) -> Result<Self, PanelError> {
        let (sender, receiver) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("sidepanel".to_string())
            .spawn(move || worker(options, receiver, init_tx))
            .map_err(|e| PanelError::StoreIo(format!("failed to spawn panel thread: {e}")))?;

        let mut panel = Self {
            sender: Mutex::new(sender),
            thread: Some(thread),
        };
        match init_rx.recv() {
            Ok(Ok(())) => Ok(panel),
            Ok(Err(e)) => {
                panel.join();
                Err(e)
            }
            Err(_) => {
                panel.join();
                Err(PanelError::ChannelClosed)
            }
        }
    }

    fn call<T>(&self, make_cmd: impl FnOnce(mpsc::Sender<T>) -> Command) -> Result<T, PanelError> {
        let (tx, rx) = mpsc::channel();
        self.sender
            .lock()
            .unwrap()
            .send(make_cmd(tx))
            .map_err(|_| PanelError::ChannelClosed)?;
        rx.recv().map_err(|_| PanelError::ChannelClosed)
    }

    /// Normalize `raw` and load it in the panel viewer; returns the
    /// normalized URL.
    pub fn navigate(&self, raw: &str) -> Result<String, PanelError> {
        let raw = raw.to_string();
        self.call(|response| Command::Navigate { raw, response })?
    }

    /// Mount or unmount the panel.
    pub fn toggle_sidebar(&self) -> Result<(), PanelError> {
        self.call(|response| Command::Toggle { response })?
    }

    /// Persist a settings update; the change is reconciled on the panel
    /// thread before the next command is processed.
    pub fn apply_settings(&self, update: SettingsUpdate) -> Result<(), PanelError> {
        self.call(|response| Command::ApplySettings { update, response })
    }

    pub fn pointer_enter(&self) -> Result<(), PanelError> {
        self.call(|response| Command::PointerEnter { response })
    }

    pub fn pointer_leave(&self) -> Result<(), PanelError> {
        self.call(|response| Command::PointerLeave { response })
    }

    /// Textual rendering of the shell tree.
    pub fn snapshot(&self) -> Result<String, PanelError> {
        self.call(|response| Command::Snapshot { response })
    }

    pub fn state(&self) -> Result<PanelState, PanelError> {
        self.call(|response| Command::State { response })
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        let (tx, _rx) = mpsc::channel();
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(Command::Close { response: tx });
        }
        self.join();
    }
}

fn open_store(options: &PanelOptions) -> Result<SettingsStore, PanelError> {
    let local: Box<dyn PrefBackend> = match &options.store_path {
        Some(path) => Box::new(JsonFileBackend::open(path)?),
        None => Box::new(MemoryBackend::new()),
    };
    Ok(SettingsStore::open(None, local))
}

fn worker(
    options: PanelOptions,
    receiver: mpsc::Receiver<Command>,
    init_tx: mpsc::Sender<Result<(), PanelError>>,
) {
    let mut store = match open_store(&options) {
        Ok(store) => store,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    if !options.initial.is_empty() {
        store.set(&options.initial);
    }

    // Change notifications land in this slot; the loop drains it into
    // reconcile after every pump.
    let changed: Rc<RefCell<Option<PanelSettings>>> = Rc::new(RefCell::new(None));
    let sink = changed.clone();
    store.subscribe(Box::new(move |settings| {
        *sink.borrow_mut() = Some(settings.clone());
    }));
    // The initial update is settings plumbing, not a change to react to.
    store.pump();
    changed.borrow_mut().take();

    let mut shell = HeadlessShell::new();
    shell.set_popup(options.popup);
    let mut controller = PanelController::new(shell, store.get());
    if let Err(e) = controller.init() {
        warn!("initial panel mount failed: {e}");
    }
    let _ = init_tx.send(Ok(()));

    loop {
        let command = match controller.next_deadline() {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(timeout) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        let mut closing = false;
        if let Some(command) = command {
            match command {
                Command::Navigate { raw, response } => {
                    let result = controller.navigate(&raw).map(|url| url.to_string());
                    if let Err(e) = &result {
                        warn!("navigation failed: {e}");
                    }
                    let _ = response.send(result);
                }
                Command::Toggle { response } => {
                    let _ = response.send(controller.toggle_sidebar());
                }
                Command::ApplySettings { update, response } => {
                    store.set(&update);
                    let _ = response.send(());
                }
                Command::PointerEnter { response } => {
                    controller.pointer_enter();
                    let _ = response.send(());
                }
                Command::PointerLeave { response } => {
                    controller.pointer_leave();
                    let _ = response.send(());
                }
                Command::Snapshot { response } => {
                    let _ = response.send(controller.shell().snapshot());
                }
                Command::State { response } => {
                    let shell = controller.shell();
                    let _ = response.send(PanelState {
                        lifecycle: controller.lifecycle(),
                        mounted: controller.is_mounted(),
                        hidden: controller.is_hidden(),
                        current_url: controller.current_url().map(|u| u.to_string()),
                        address: shell.address(),
                        viewer_url: shell.viewer_url(),
                        settings: controller.settings().clone(),
                    });
                }
                Command::Close { response } => {
                    let _ = response.send(());
                    closing = true;
                }
            }
        }

        // Deliver queued settings notifications, then let the controller
        // catch up on deferred work.
        store.pump();
        if let Some(settings) = changed.borrow_mut().take() {
            controller.reconcile(settings);
        }
        controller.tick(Instant::now());

        if closing {
            break;
        }
    }

    controller.destroy();
}
