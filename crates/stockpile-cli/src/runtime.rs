// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use std::sync::mpsc::Sender;
use stockpile_app::ProductWrite;
use stockpile_db::{ListenerId, Store};
use stockpile_tui::{AppRuntime, InternalEvent};
use tracing::{debug, warn};

pub const OFFLINE_WRITE_ERROR: &str =
    "Database connection error. Please reload the page and try again.";

pub struct StoreRuntime<'a> {
    store: &'a Store,
    listener: Option<ListenerId>,
}

impl<'a> StoreRuntime<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            listener: None,
        }
    }
}

impl AppRuntime for StoreRuntime<'_> {
    fn subscribe_products(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        if let Some(previous) = self.listener.take() {
            self.store.unsubscribe(previous);
        }
        let id = self.store.subscribe_products(move |event| {
            if tx.send(InternalEvent::Feed(event.clone())).is_err() {
                debug!("product feed receiver dropped");
            }
        });
        self.listener = Some(id);
        Ok(())
    }

    fn apply_write(&mut self, write: &ProductWrite) -> Result<()> {
        self.store.apply_write(write)
    }
}

impl Drop for StoreRuntime<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.listener.take() {
            self.store.unsubscribe(id);
        }
    }
}

/// Stands in for the store when startup could not reach it. The UI still
/// runs; it just never leaves the loading state.
pub struct OfflineRuntime {
    reason: String,
}

impl OfflineRuntime {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AppRuntime for OfflineRuntime {
    fn subscribe_products(&mut self, _tx: Sender<InternalEvent>) -> Result<()> {
        Err(anyhow!("{}", self.reason))
    }

    fn apply_write(&mut self, write: &ProductWrite) -> Result<()> {
        warn!(verb = write.verb(), "write refused while offline");
        bail!(OFFLINE_WRITE_ERROR)
    }
}
