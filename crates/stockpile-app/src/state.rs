// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::dialog::{CloseReason, DialogController, DialogEvent, DialogKind, DialogRequest};
use crate::dispatch::dispatch_row_action;
use crate::forms::WriteRequest;
use crate::notice::{NOTICE_DURATION, Notice, Notices};
use crate::overlay::{OverlaySignal, OverlaySurface};
use crate::price::DEFAULT_CURRENCY_SYMBOL;
use crate::recovery::{Desync, HEALTH_CHECK_INTERVAL, OverlayMonitor, RepairTrigger};
use crate::search::{Debouncer, SEARCH_DEBOUNCE};
use crate::table::{ProductTable, RenderedRow, RowAction, RowActionKind};
use crate::{Connectivity, FeedEvent, SortState, TableColumn};

pub const FAULT_NOTICE: &str = "Caught an error. Attempting to recover UI...";
pub const FAULT_REPAIR_DELAY: Duration = Duration::from_millis(500);
pub const FEED_FAILED_NOTICE: &str = "Failed to load products. Please refresh the page.";
pub const CONNECTION_FAILED_NOTICE: &str =
    "Error connecting to database. Please reload and try again later.";
pub const OVERLAY_BLOCKED_STATUS: &str = "screen blocked by a stuck dialog -- press ctrl+r to repair";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiSettings {
    pub currency_symbol: String,
    pub search_debounce: Duration,
    pub health_check_interval: Duration,
    pub notice_duration: Duration,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_owned(),
            search_debounce: SEARCH_DEBOUNCE,
            health_check_interval: HEALTH_CHECK_INTERVAL,
            notice_duration: NOTICE_DURATION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub table: ProductTable,
    pub dialogs: DialogController,
    pub overlay: OverlaySurface,
    pub monitor: OverlayMonitor,
    pub notices: Notices,
    pub connectivity: Connectivity,
    pub search_input: String,
    pub search_focused: bool,
    pub selected_row: usize,
    pub diagnostics_visible: bool,
    pub status_line: Option<String>,
    debouncer: Debouncer<String>,
    repair_due: Option<Instant>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&UiSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    OpenAdd,
    ActOnSelected(RowActionKind),
    RowAction(RowAction),
    FormInput(char),
    FormBackspace,
    FocusNext,
    FocusPrev,
    Confirm,
    CloseDialog(CloseReason),
    OverlaySignal(OverlaySignal),
    Feed(FeedEvent),
    WriteSettled {
        request_id: u64,
        result: Result<(), String>,
    },
    SearchInsert(char),
    SearchBackspace,
    ClearSearch,
    FocusSearch,
    BlurSearch,
    Sort(TableColumn),
    MoveRow(isize),
    Escape,
    DoubleClick,
    Repair,
    ConnectivityFailed(String),
    Connected,
    ReportFault(String),
    ToggleDiagnostics,
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    WriteRequested(WriteRequest),
    TableRendered { rows: usize, visible: usize },
    SearchApplied(String),
    SortChanged(SortState),
    SortUnavailable(TableColumn),
    DialogOpened(DialogKind),
    DialogClosed(CloseReason),
    RepairOffered(Desync),
    Repaired(RepairTrigger),
    RepairScheduled,
    Notice(Notice),
    StatusUpdated(String),
}

impl AppState {
    pub fn new(settings: &UiSettings) -> Self {
        Self {
            table: ProductTable::new(settings.currency_symbol.clone(), SortState::default()),
            dialogs: DialogController::default(),
            overlay: OverlaySurface::default(),
            monitor: OverlayMonitor::new(settings.health_check_interval),
            notices: Notices::new(settings.notice_duration),
            connectivity: Connectivity::default(),
            search_input: String::new(),
            search_focused: false,
            selected_row: 0,
            diagnostics_visible: false,
            status_line: None,
            debouncer: Debouncer::new(settings.search_debounce),
            repair_due: None,
        }
    }

    pub fn dispatch(&mut self, command: AppCommand, now: Instant) -> Vec<AppEvent> {
        match command {
            AppCommand::OpenAdd => {
                if self.background_blocked() {
                    return self.blocked_status();
                }
                let events = self.dialogs.request_open(DialogRequest::Add, &mut self.overlay);
                self.absorb(events, now)
            }
            AppCommand::ActOnSelected(kind) => {
                let Some(product_id) = self.selected().map(|row| row.meta.id) else {
                    return vec![self.set_status("no product selected")];
                };
                self.dispatch(AppCommand::RowAction(RowAction { kind, product_id }), now)
            }
            AppCommand::RowAction(action) => {
                if self.background_blocked() {
                    return self.blocked_status();
                }
                let events =
                    dispatch_row_action(action, &self.table, &mut self.dialogs, &mut self.overlay);
                self.absorb(events, now)
            }
            AppCommand::FormInput(ch) => {
                self.dialogs.input_char(ch);
                Vec::new()
            }
            AppCommand::FormBackspace => {
                self.dialogs.backspace();
                Vec::new()
            }
            AppCommand::FocusNext => {
                self.dialogs.focus_next();
                Vec::new()
            }
            AppCommand::FocusPrev => {
                self.dialogs.focus_prev();
                Vec::new()
            }
            AppCommand::Confirm => {
                let events = self.dialogs.confirm();
                self.absorb(events, now)
            }
            AppCommand::CloseDialog(reason) => {
                self.dialogs.request_close(reason, &mut self.overlay);
                Vec::new()
            }
            AppCommand::OverlaySignal(signal) => {
                let events = self.dialogs.on_signal(signal, &mut self.overlay);
                self.absorb(events, now)
            }
            AppCommand::Feed(FeedEvent::Snapshot(products)) => {
                self.table.apply_snapshot(&products);
                if let Connectivity::Unavailable(reason) = &self.connectivity {
                    info!(%reason, "store reachable again");
                }
                self.connectivity = Connectivity::Connected;
                self.clamp_selection();
                vec![AppEvent::TableRendered {
                    rows: self.table.row_count(),
                    visible: self.table.visible_count(),
                }]
            }
            AppCommand::Feed(FeedEvent::Failed(reason)) => {
                self.table.apply_feed_error(&reason);
                vec![self.notify(Notice::error(FEED_FAILED_NOTICE), now)]
            }
            AppCommand::WriteSettled { request_id, result } => {
                let events = self
                    .dialogs
                    .on_write_settled(request_id, result, &mut self.overlay);
                self.absorb(events, now)
            }
            AppCommand::SearchInsert(ch) => {
                self.search_input.push(ch);
                self.debouncer.push(self.search_input.clone(), now);
                Vec::new()
            }
            AppCommand::SearchBackspace => {
                self.search_input.pop();
                self.debouncer.push(self.search_input.clone(), now);
                Vec::new()
            }
            AppCommand::ClearSearch => {
                if self.search_input.is_empty() && !self.table.search().active {
                    return Vec::new();
                }
                self.search_input.clear();
                self.debouncer.cancel();
                self.apply_query(String::new())
            }
            AppCommand::FocusSearch => {
                if self.background_blocked() {
                    return self.blocked_status();
                }
                self.search_focused = true;
                Vec::new()
            }
            AppCommand::BlurSearch => {
                self.search_focused = false;
                Vec::new()
            }
            AppCommand::Sort(column) => {
                if self.background_blocked() {
                    return self.blocked_status();
                }
                match self.table.toggle_sort(column) {
                    Some(sort) => vec![AppEvent::SortChanged(sort)],
                    None => vec![
                        AppEvent::SortUnavailable(column),
                        self.set_status("sort unavailable"),
                    ],
                }
            }
            AppCommand::MoveRow(delta) => {
                if self.background_blocked() {
                    return self.blocked_status();
                }
                let visible = self.table.visible_count();
                if visible > 0 {
                    let max = visible as isize - 1;
                    self.selected_row = (self.selected_row as isize + delta).clamp(0, max) as usize;
                }
                Vec::new()
            }
            AppCommand::Escape => {
                if self.search_focused {
                    self.search_focused = false;
                    return Vec::new();
                }
                if self
                    .dialogs
                    .request_close(CloseReason::Escape, &mut self.overlay)
                {
                    return Vec::new();
                }
                self.repair(RepairTrigger::Escape)
            }
            AppCommand::DoubleClick => {
                if self.monitor.is_desynced(&self.dialogs, &self.overlay) {
                    self.repair(RepairTrigger::DoubleClick)
                } else {
                    Vec::new()
                }
            }
            AppCommand::Repair => self.repair(RepairTrigger::RepairAction),
            AppCommand::ConnectivityFailed(reason) => {
                if matches!(self.connectivity, Connectivity::Unavailable(_)) {
                    return Vec::new();
                }
                error!(%reason, "store unavailable");
                self.connectivity = Connectivity::Unavailable(reason);
                vec![self.notify(Notice::error(CONNECTION_FAILED_NOTICE), now)]
            }
            AppCommand::Connected => {
                self.connectivity = Connectivity::Connected;
                Vec::new()
            }
            AppCommand::ReportFault(reason) => {
                error!(%reason, "caught runtime fault");
                self.repair_due = Some(now + FAULT_REPAIR_DELAY);
                vec![
                    self.notify(Notice::error(FAULT_NOTICE), now),
                    AppEvent::RepairScheduled,
                ]
            }
            AppCommand::ToggleDiagnostics => {
                self.diagnostics_visible = !self.diagnostics_visible;
                Vec::new()
            }
            AppCommand::Tick => self.tick(now),
        }
    }

    pub fn selected(&self) -> Option<&RenderedRow> {
        self.table.visible_rows().nth(self.selected_row)
    }

    pub fn repair_offered(&self) -> bool {
        self.monitor.offered().is_some()
    }

    /// Background input is swallowed while the overlay marks the screen
    /// inert, exactly as a modal would, even when no dialog owns it.
    pub fn background_blocked(&self) -> bool {
        self.overlay.is_inert()
    }

    fn tick(&mut self, now: Instant) -> Vec<AppEvent> {
        let mut events = Vec::new();
        if let Some(query) = self.debouncer.poll(now) {
            events.extend(self.apply_query(query));
        }
        self.notices.expire(now);
        if let Some(due) = self.repair_due
            && due <= now
        {
            self.repair_due = None;
            events.extend(self.repair(RepairTrigger::Fault));
        }
        if let Some(desync) = self.monitor.tick(now, &self.dialogs, &self.overlay) {
            events.push(AppEvent::RepairOffered(desync));
            events.push(self.set_status("overlay looks stuck -- press ctrl+r to repair"));
        }
        events
    }

    fn apply_query(&mut self, query: String) -> Vec<AppEvent> {
        self.table.apply_query(&query);
        self.clamp_selection();
        debug!(query = %self.table.search().query, visible = self.table.visible_count(), "search applied");
        vec![AppEvent::SearchApplied(self.table.search().query.clone())]
    }

    fn repair(&mut self, trigger: RepairTrigger) -> Vec<AppEvent> {
        self.monitor
            .repair(trigger, &mut self.dialogs, &mut self.overlay);
        self.status_line = None;
        info!(?trigger, "overlay repaired");
        vec![AppEvent::Repaired(trigger)]
    }

    fn absorb(&mut self, events: Vec<DialogEvent>, now: Instant) -> Vec<AppEvent> {
        events
            .into_iter()
            .map(|event| match event {
                DialogEvent::Opened(kind) => AppEvent::DialogOpened(kind),
                DialogEvent::Closed(reason) => AppEvent::DialogClosed(reason),
                DialogEvent::Submit(request) => AppEvent::WriteRequested(request),
                DialogEvent::Notify(notice) => self.notify(notice, now),
            })
            .collect()
    }

    fn notify(&mut self, notice: Notice, now: Instant) -> AppEvent {
        self.notices.push(notice.clone(), now);
        AppEvent::Notice(notice)
    }

    fn clamp_selection(&mut self) {
        let visible = self.table.visible_count();
        self.selected_row = self.selected_row.min(visible.saturating_sub(1));
    }

    fn blocked_status(&mut self) -> Vec<AppEvent> {
        if self.dialogs.state().is_open() {
            return Vec::new();
        }
        vec![self.set_status(OVERLAY_BLOCKED_STATUS)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
