// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::dialog::{DialogController, DialogState};
use crate::overlay::OverlaySurface;

pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desync {
    /// Backdrop or scroll lock present with no dialog at all.
    OrphanedOverlay { backdrops: usize, scroll_locked: bool },
    /// A dialog is open but nothing blocks the screen behind it.
    MissingBackdrop,
    /// An opening or closing dialog whose overlay signal never arrived.
    StalledTransition { phase: DialogState, backdrops: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayHealth {
    Healthy,
    /// Mid-transition; only suspicious if it never settles.
    Settling,
    Desynced(Desync),
}

/// Read-only check of the overlay against the dialog phase.
pub fn audit(state: DialogState, overlay: &OverlaySurface) -> OverlayHealth {
    match state {
        DialogState::Closed if overlay.has_backdrop() || overlay.scroll_locked() => {
            OverlayHealth::Desynced(Desync::OrphanedOverlay {
                backdrops: overlay.backdrops(),
                scroll_locked: overlay.scroll_locked(),
            })
        }
        DialogState::Open(_) if !overlay.has_backdrop() => {
            OverlayHealth::Desynced(Desync::MissingBackdrop)
        }
        DialogState::Opening(_) | DialogState::Closing(_) => OverlayHealth::Settling,
        DialogState::Closed | DialogState::Open(_) => OverlayHealth::Healthy,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairTrigger {
    Escape,
    DoubleClick,
    RepairAction,
    Fault,
}

/// Periodic auditor. It never repairs on its own; it only offers a repair
/// that the user or a fault handler can run.
#[derive(Debug, Clone)]
pub struct OverlayMonitor {
    interval: Duration,
    next_check: Option<Instant>,
    offered: Option<Desync>,
    settling: Option<(DialogState, Option<u64>)>,
}

impl OverlayMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_check: None,
            offered: None,
            settling: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn offered(&self) -> Option<Desync> {
        self.offered
    }

    /// Runs the audit when the interval has elapsed. Returns the desync the
    /// first time it is seen; repeated sightings stay quiet. A transition
    /// still in the same phase of the same dialog one interval later counts
    /// as stalled.
    pub fn tick(
        &mut self,
        now: Instant,
        dialogs: &DialogController,
        overlay: &OverlaySurface,
    ) -> Option<Desync> {
        let due = *self.next_check.get_or_insert(now + self.interval);
        if now < due {
            return None;
        }
        self.next_check = Some(now + self.interval);

        let state = dialogs.state();
        let health = match audit(state, overlay) {
            OverlayHealth::Settling => {
                let seen = (state, dialogs.dialog().map(|dialog| dialog.instance));
                if self.settling.replace(seen) == Some(seen) {
                    OverlayHealth::Desynced(Desync::StalledTransition {
                        phase: state,
                        backdrops: overlay.backdrops(),
                    })
                } else {
                    OverlayHealth::Healthy
                }
            }
            other => {
                self.settling = None;
                other
            }
        };

        match health {
            OverlayHealth::Healthy | OverlayHealth::Settling => {
                if self.offered.take().is_some() {
                    debug!("overlay healthy again; withdrawing repair offer");
                }
                None
            }
            OverlayHealth::Desynced(desync) => {
                if self.offered.is_some() {
                    return None;
                }
                info!(?desync, "detected stuck overlay state");
                self.offered = Some(desync);
                Some(desync)
            }
        }
    }

    /// True when a repair is on offer or the overlay is visibly out of step
    /// right now.
    pub fn is_desynced(&self, dialogs: &DialogController, overlay: &OverlaySurface) -> bool {
        self.offered.is_some()
            || matches!(audit(dialogs.state(), overlay), OverlayHealth::Desynced(_))
    }

    pub fn repair(
        &mut self,
        trigger: RepairTrigger,
        dialogs: &mut DialogController,
        overlay: &mut OverlaySurface,
    ) {
        info!(
            ?trigger,
            state = dialogs.state().label(),
            backdrops = overlay.backdrops(),
            "repairing overlay"
        );
        dialogs.force_reset(overlay);
        self.offered = None;
        self.settling = None;
    }
}

impl Default for OverlayMonitor {
    fn default() -> Self {
        Self::new(HEALTH_CHECK_INTERVAL)
    }
}
