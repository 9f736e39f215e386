// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlaySignal {
    Shown,
    Hidden,
}

/// The modal layer under the dialogs: backdrop layers, the scroll lock on
/// the table, and whether the rest of the screen accepts input.
///
/// Lifecycle signals are queued rather than delivered inline; the shell
/// drains them with [`OverlaySurface::take_signals`] after drawing, so they
/// re-enter the state machine as separate events and can be lost.
#[derive(Debug, Clone, Default)]
pub struct OverlaySurface {
    showing: bool,
    backdrops: usize,
    scroll_locked: bool,
    inert: bool,
    signals: VecDeque<OverlaySignal>,
}

impl OverlaySurface {
    pub fn show(&mut self) {
        self.showing = true;
        self.backdrops += 1;
        self.scroll_locked = true;
        self.inert = true;
        self.signals.push_back(OverlaySignal::Shown);
    }

    /// Leaves backdrops and the scroll lock in place; the owner removes
    /// them once `Hidden` arrives.
    pub fn hide(&mut self) {
        self.showing = false;
        self.signals.push_back(OverlaySignal::Hidden);
    }

    pub fn take_signals(&mut self) -> Vec<OverlaySignal> {
        self.signals.drain(..).collect()
    }

    /// Drops queued signals without delivering them.
    pub fn drop_signals(&mut self) -> usize {
        let dropped = self.signals.len();
        self.signals.clear();
        dropped
    }

    pub fn clear_backdrops(&mut self) {
        self.backdrops = 0;
    }

    pub fn unlock_scroll(&mut self) {
        self.scroll_locked = false;
    }

    pub fn restore_interaction(&mut self) {
        self.inert = false;
    }

    pub fn reset(&mut self) {
        self.showing = false;
        self.clear_backdrops();
        self.unlock_scroll();
        self.restore_interaction();
        self.signals.clear();
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn backdrops(&self) -> usize {
        self.backdrops
    }

    pub fn has_backdrop(&self) -> bool {
        self.backdrops > 0
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn is_inert(&self) -> bool {
        self.inert
    }

    pub fn pending_signals(&self) -> usize {
        self.signals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{OverlaySignal, OverlaySurface};

    #[test]
    fn show_then_hide_queues_both_signals_and_keeps_backdrop() {
        let mut overlay = OverlaySurface::default();
        overlay.show();
        overlay.hide();

        assert_eq!(
            overlay.take_signals(),
            vec![OverlaySignal::Shown, OverlaySignal::Hidden]
        );
        assert!(!overlay.is_showing());
        assert_eq!(overlay.backdrops(), 1);
        assert!(overlay.scroll_locked());
        assert!(overlay.take_signals().is_empty());
    }

    #[test]
    fn reset_clears_every_trace() {
        let mut overlay = OverlaySurface::default();
        overlay.show();
        overlay.show();
        overlay.reset();

        assert!(!overlay.is_showing());
        assert!(!overlay.has_backdrop());
        assert!(!overlay.scroll_locked());
        assert!(!overlay.is_inert());
        assert_eq!(overlay.pending_signals(), 0);
    }
}
