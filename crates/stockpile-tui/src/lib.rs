// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use stockpile_app::{
    AppCommand, AppEvent, AppState, CloseReason, Connectivity, Dialog, DialogKind, DialogState,
    EMPTY_TABLE_MESSAGE, FeedEvent, FormField, NO_RESULTS_MESSAGE, NoticeKind, ProductWrite,
    RenderedRow, RowActionKind, SKELETON_ROWS, SortDirection, SortState, TableColumn, TableView,
    WriteRequest,
};
use tracing::{debug, error, info, warn};

const INPUT_POLL: Duration = Duration::from_millis(25);
const MAX_CONSECUTIVE_FAULTS: u32 = 3;
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);
const SKELETON_CELL: &str = "░░░░░░░░░░";
const SORT_MARK_ASC: &str = "▲";
const SORT_MARK_DESC: &str = "▼";
const DIALOG_WIDTH_PERCENT: u16 = 60;
const DIALOG_HEIGHT_PERCENT: u16 = 40;

/// The data-store seam. Implementations deliver feed events and write
/// settlements through the channel; the event loop never blocks on them.
pub trait AppRuntime {
    /// Starts the product feed. Every delivery, including the first
    /// snapshot, must arrive as [`InternalEvent::Feed`].
    fn subscribe_products(&mut self, tx: Sender<InternalEvent>) -> Result<()>;
    fn apply_write(&mut self, write: &ProductWrite) -> Result<()>;
    fn spawn_write(&mut self, request: WriteRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .apply_write(&request.write)
            .map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::WriteSettled {
            request_id: request.request_id,
            result,
        })
        .map_err(|_| anyhow!("write event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    Feed(FeedEvent),
    WriteSettled {
        request_id: u64,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Quit,
    Dispatch(AppCommand),
    Ignore,
}

#[derive(Debug, Clone, Copy, Default)]
struct ViewData {
    screen: Rect,
    last_click: Option<(Instant, u16, u16)>,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = runtime.subscribe_products(internal_tx.clone()) {
        error!(error = %format!("{error:#}"), "product subscription failed");
        state.dispatch(
            AppCommand::ConnectivityFailed(format!("{error:#}")),
            Instant::now(),
        );
    }

    let mut result: Result<()> = Ok(());
    let mut faults = 0u32;
    loop {
        let now = Instant::now();
        pump(state, runtime, &internal_tx, &internal_rx, now);

        let mut screen = view_data.screen;
        let drawn = terminal
            .draw(|frame| {
                screen = frame.area();
                render(frame, state);
            })
            .map(|_| ())
            .context("draw frame");
        if let Err(error) = drawn {
            if let Some(fatal) = absorb_fault(state, &mut faults, error, Instant::now()) {
                result = Err(fatal);
                break;
            }
            continue;
        }
        view_data.screen = screen;
        deliver_overlay_signals(state, runtime, &internal_tx, Instant::now());

        let event = match next_event() {
            Ok(event) => event,
            Err(error) => {
                if let Some(fatal) = absorb_fault(state, &mut faults, error, Instant::now()) {
                    result = Err(fatal);
                    break;
                }
                continue;
            }
        };
        faults = 0;
        let input = match event {
            Some(Event::Key(key)) if key.kind == KeyEventKind::Press => input_for_key(state, key),
            Some(Event::Mouse(mouse)) => {
                input_for_mouse(state, &mut view_data, mouse, Instant::now())
            }
            _ => Input::Ignore,
        };
        if apply_input(state, runtime, &internal_tx, input, Instant::now()) {
            info!("quit requested");
            break;
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        DisableMouseCapture,
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    result
}

fn next_event() -> Result<Option<Event>> {
    if !event::poll(INPUT_POLL).context("poll event")? {
        return Ok(None);
    }
    event::read().context("read event").map(Some)
}

/// Turns a failed loop step into a recoverable fault: notice now, forced
/// overlay repair shortly after. Hands the error back once failures repeat
/// with no clean turn in between.
fn absorb_fault(
    state: &mut AppState,
    faults: &mut u32,
    error: anyhow::Error,
    now: Instant,
) -> Option<anyhow::Error> {
    *faults += 1;
    if *faults >= MAX_CONSECUTIVE_FAULTS {
        error!(error = %format!("{error:#}"), faults = *faults, "event loop keeps failing");
        return Some(error);
    }
    warn!(error = %format!("{error:#}"), faults = *faults, "event loop fault");
    state.dispatch(AppCommand::ReportFault(format!("{error:#}")), now);
    None
}

/// One turn of the loop minus drawing and input: drain settled work,
/// then advance timers.
fn pump<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
    now: Instant,
) {
    process_internal_events(state, runtime, tx, rx, now);
    let events = state.dispatch(AppCommand::Tick, now);
    handle_app_events(state, runtime, tx, events, now);
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
    now: Instant,
) {
    while let Ok(event) = rx.try_recv() {
        let command = match event {
            InternalEvent::Feed(feed) => AppCommand::Feed(feed),
            InternalEvent::WriteSettled { request_id, result } => {
                AppCommand::WriteSettled { request_id, result }
            }
        };
        let events = state.dispatch(command, now);
        handle_app_events(state, runtime, tx, events, now);
    }
}

/// Overlay lifecycle signals re-enter as their own events once the frame
/// that showed or hid the dialog has been drawn.
fn deliver_overlay_signals<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    now: Instant,
) {
    for signal in state.overlay.take_signals() {
        let events = state.dispatch(AppCommand::OverlaySignal(signal), now);
        handle_app_events(state, runtime, tx, events, now);
    }
}

fn apply_input<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    input: Input,
    now: Instant,
) -> bool {
    match input {
        Input::Quit => true,
        Input::Ignore => false,
        Input::Dispatch(command) => {
            let events = state.dispatch(command, now);
            handle_app_events(state, runtime, tx, events, now);
            false
        }
    }
}

fn handle_app_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
    events: Vec<AppEvent>,
    now: Instant,
) {
    for event in events {
        match event {
            AppEvent::WriteRequested(request) => {
                let request_id = request.request_id;
                if let Err(error) = runtime.spawn_write(request, tx.clone()) {
                    error!(request_id, error = %format!("{error:#}"), "write dispatch failed");
                    state.dispatch(AppCommand::ReportFault(format!("{error:#}")), now);
                }
            }
            other => debug!(?other, "app event"),
        }
    }
}

fn input_for_key(state: &AppState, key: KeyEvent) -> Input {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q' | 'c') if ctrl => return Input::Quit,
        KeyCode::Char('r') if ctrl => return Input::Dispatch(AppCommand::Repair),
        KeyCode::F(12) => return Input::Dispatch(AppCommand::ToggleDiagnostics),
        _ => {}
    }

    let command = if dialog_accepts_input(state) {
        dialog_command_for_key(key, ctrl)
    } else if state.search_focused {
        search_command_for_key(key, ctrl)
    } else {
        table_command_for_key(key, ctrl)
    };
    command.map_or(Input::Ignore, Input::Dispatch)
}

fn dialog_accepts_input(state: &AppState) -> bool {
    matches!(
        state.dialogs.state(),
        DialogState::Opening(_) | DialogState::Open(_)
    )
}

fn dialog_command_for_key(key: KeyEvent, ctrl: bool) -> Option<AppCommand> {
    match key.code {
        KeyCode::Esc => Some(AppCommand::Escape),
        KeyCode::Enter => Some(AppCommand::Confirm),
        KeyCode::Tab | KeyCode::Down => Some(AppCommand::FocusNext),
        KeyCode::BackTab | KeyCode::Up => Some(AppCommand::FocusPrev),
        KeyCode::Backspace => Some(AppCommand::FormBackspace),
        KeyCode::Char(ch) if !ctrl => Some(AppCommand::FormInput(ch)),
        _ => None,
    }
}

fn search_command_for_key(key: KeyEvent, ctrl: bool) -> Option<AppCommand> {
    match key.code {
        KeyCode::Esc => Some(AppCommand::Escape),
        KeyCode::Enter => Some(AppCommand::BlurSearch),
        KeyCode::Backspace => Some(AppCommand::SearchBackspace),
        KeyCode::Char('u') if ctrl => Some(AppCommand::ClearSearch),
        KeyCode::Char(ch) if !ctrl => Some(AppCommand::SearchInsert(ch)),
        _ => None,
    }
}

fn table_command_for_key(key: KeyEvent, ctrl: bool) -> Option<AppCommand> {
    match key.code {
        KeyCode::Char('u') if ctrl => Some(AppCommand::ClearSearch),
        _ if ctrl => None,
        KeyCode::Esc => Some(AppCommand::Escape),
        KeyCode::Char('j') | KeyCode::Down => Some(AppCommand::MoveRow(1)),
        KeyCode::Char('k') | KeyCode::Up => Some(AppCommand::MoveRow(-1)),
        KeyCode::Char('a') => Some(AppCommand::OpenAdd),
        KeyCode::Char('e') | KeyCode::Enter => {
            Some(AppCommand::ActOnSelected(RowActionKind::Edit))
        }
        KeyCode::Char('d') | KeyCode::Delete => {
            Some(AppCommand::ActOnSelected(RowActionKind::Delete))
        }
        KeyCode::Char('/') => Some(AppCommand::FocusSearch),
        KeyCode::Char(digit @ '1'..='3') => {
            let index = digit as usize - '1' as usize;
            Some(AppCommand::Sort(TableColumn::ALL[index]))
        }
        _ => None,
    }
}

fn input_for_mouse(
    state: &AppState,
    view_data: &mut ViewData,
    mouse: MouseEvent,
    now: Instant,
) -> Input {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return Input::Ignore;
    }

    let previous = view_data
        .last_click
        .replace((now, mouse.column, mouse.row));
    let double = previous.is_some_and(|(at, column, row)| {
        now.saturating_duration_since(at) <= DOUBLE_CLICK_WINDOW
            && column == mouse.column
            && row == mouse.row
    });
    if double {
        view_data.last_click = None;
        return Input::Dispatch(AppCommand::DoubleClick);
    }

    let dialog_area = centered_rect(
        DIALOG_WIDTH_PERCENT,
        DIALOG_HEIGHT_PERCENT,
        view_data.screen,
    );
    if state.dialogs.state().is_open()
        && !dialog_area.contains(Position::new(mouse.column, mouse.row))
    {
        return Input::Dispatch(AppCommand::CloseDialog(CloseReason::Backdrop));
    }
    Input::Ignore
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let search = Paragraph::new(search_line(state)).block(
        Block::default()
            .title(search_title(state))
            .borders(Borders::ALL)
            .border_style(if state.search_focused {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            }),
    );
    frame.render_widget(search, layout[0]);

    let body = if state.diagnostics_visible {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(30), Constraint::Length(34)])
            .split(layout[1]);
        let diagnostics = Paragraph::new(diagnostics_lines(state).join("\n"))
            .block(Block::default().title("diagnostics").borders(Borders::ALL));
        frame.render_widget(diagnostics, split[1]);
        split[0]
    } else {
        layout[1]
    };
    render_table(frame, body, state);

    let (footer, footer_style) = footer_text(state);
    let footer_widget = Paragraph::new(footer)
        .style(footer_style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer_widget, layout[2]);

    if state.overlay.has_backdrop() {
        let area = frame.area();
        frame.buffer_mut().set_style(
            area,
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM),
        );
    }

    if state.overlay.is_showing()
        && let Some(dialog) = state.dialogs.dialog()
    {
        let area = centered_rect(DIALOG_WIDTH_PERCENT, DIALOG_HEIGHT_PERCENT, frame.area());
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(dialog_lines(dialog))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(dialog.kind.title())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(dialog_accent(dialog.kind))),
            );
        frame.render_widget(popup, area);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let sort = state.table.sort();
    let header = Row::new(TableColumn::ALL.iter().map(|column| {
        Cell::from(header_label(*column, sort)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let widths = [
        Constraint::Percentage(50),
        Constraint::Percentage(20),
        Constraint::Percentage(30),
    ];

    let rows: Vec<Row<'_>> = match state.table.view() {
        TableView::Loading => (0..SKELETON_ROWS)
            .map(|_| {
                Row::new([SKELETON_CELL; 3].map(Cell::from))
                    .style(Style::default().fg(Color::DarkGray))
            })
            .collect(),
        TableView::Empty => vec![message_row(EMPTY_TABLE_MESSAGE)],
        TableView::Rows if state.table.shows_no_results() => {
            vec![message_row(NO_RESULTS_MESSAGE)]
        }
        TableView::Rows => state
            .table
            .visible_rows()
            .map(product_row)
            .collect(),
    };
    let has_rows = state.table.view() == TableView::Rows && !state.table.shows_no_results();
    let mut table_state = TableState::new().with_selected(has_rows.then_some(state.selected_row));

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(state))
                .borders(Borders::ALL),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn product_row(row: &RenderedRow) -> Row<'static> {
    let mark = Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let name = Line::from(
        row.name_cell
            .segments()
            .iter()
            .map(|segment| {
                if segment.marked {
                    Span::styled(segment.text.clone(), mark)
                } else {
                    Span::raw(segment.text.clone())
                }
            })
            .collect::<Vec<_>>(),
    );
    let actions = row
        .actions
        .iter()
        .map(|action| format!("[{}]", action.kind.label()))
        .collect::<Vec<_>>()
        .join(" ");

    Row::new([
        Cell::from(name),
        Cell::from(row.price_cell.clone()),
        Cell::from(actions).style(Style::default().fg(Color::Cyan)),
    ])
}

fn message_row(message: &'static str) -> Row<'static> {
    Row::new([Cell::from(message), Cell::from(""), Cell::from("")])
        .style(Style::default().fg(Color::DarkGray))
}

fn header_label(column: TableColumn, sort: SortState) -> String {
    if column != sort.column {
        return column.label().to_owned();
    }
    let mark = match sort.direction {
        SortDirection::Asc => SORT_MARK_ASC,
        SortDirection::Desc => SORT_MARK_DESC,
    };
    format!("{} {mark}", column.label())
}

fn table_title(state: &AppState) -> String {
    match state.table.view() {
        TableView::Loading => "products (loading)".to_owned(),
        TableView::Empty => "products (0)".to_owned(),
        TableView::Rows if state.table.search().active => format!(
            "products ({}/{})",
            state.table.visible_count(),
            state.table.row_count()
        ),
        TableView::Rows => format!("products ({})", state.table.row_count()),
    }
}

fn search_title(state: &AppState) -> String {
    if state.search_input.is_empty() {
        "search (/)".to_owned()
    } else {
        "search (ctrl+u clear)".to_owned()
    }
}

fn search_line(state: &AppState) -> Line<'static> {
    let mut spans = vec![Span::raw(state.search_input.clone())];
    if state.search_focused {
        spans.push(Span::styled(
            "_",
            Style::default().add_modifier(Modifier::SLOW_BLINK),
        ));
    } else if state.search_input.is_empty() {
        spans.push(Span::styled(
            "Search products...",
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn dialog_accent(kind: DialogKind) -> Color {
    match kind {
        DialogKind::Delete(_) => Color::Red,
        DialogKind::Add | DialogKind::Edit(_) => Color::Cyan,
    }
}

fn dialog_lines(dialog: &Dialog) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if dialog.kind.has_form() {
        for (field, label, value) in [
            (FormField::Name, "Product Name", &dialog.form.name),
            (FormField::Price, "Price", &dialog.form.price),
        ] {
            let focused = dialog.focus == Some(field);
            let style = if focused {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            let cursor = if focused { "_" } else { "" };
            lines.push(Line::from(vec![
                Span::raw(format!("{label:<13} ")),
                Span::styled(format!("{value}{cursor}"), style),
            ]));
        }
    } else {
        lines.push(Line::from(dialog.delete_message()));
    }
    lines.push(Line::from(""));

    if let Some(message) = &dialog.inline_error {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    let confirm_style = if dialog.confirm.enabled {
        Style::default()
            .fg(Color::Black)
            .bg(dialog_accent(dialog.kind))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM)
    };
    lines.push(Line::from(vec![
        Span::styled(format!(" {} ", dialog.confirm.label), confirm_style),
        Span::raw("  enter confirm  esc cancel"),
    ]));
    lines
}

fn footer_text(state: &AppState) -> (String, Style) {
    if state.repair_offered() {
        return (
            "Overlay looks stuck -- press ctrl+r or double-click to repair".to_owned(),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        );
    }
    if let Some(notice) = state.notices.current(NoticeKind::Error) {
        return (notice.message.clone(), Style::default().fg(Color::Red));
    }
    if let Some(notice) = state.notices.current(NoticeKind::Success) {
        return (notice.message.clone(), Style::default().fg(Color::Green));
    }
    if let Some(status) = &state.status_line {
        return (status.clone(), Style::default().fg(Color::Yellow));
    }
    (
        "a add  e edit  d delete  / search  1-3 sort  ctrl+r repair  F12 diagnostics  ctrl+q quit"
            .to_owned(),
        Style::default().fg(Color::DarkGray),
    )
}

fn diagnostics_lines(state: &AppState) -> Vec<String> {
    let connectivity = match &state.connectivity {
        Connectivity::Unavailable(reason) => format!("unavailable ({reason})"),
        other => other.label().to_owned(),
    };
    vec![
        format!("backdrops: {}", state.overlay.backdrops()),
        format!("scroll lock: {}", yes_no(state.overlay.scroll_locked())),
        format!("pointer blocked: {}", yes_no(state.overlay.is_inert())),
        format!("dialog: {}", state.dialogs.state().label()),
        format!("queued signals: {}", state.overlay.pending_signals()),
        format!("pending writes: {}", state.dialogs.pending_writes()),
        format!(
            "rows: {} rendered, {} visible",
            state.table.row_count(),
            state.table.visible_count()
        ),
        format!("store: {connectivity}"),
        format!(
            "repair offered: {}",
            yes_no(state.repair_offered())
        ),
    ]
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, Input, InternalEvent, ViewData, absorb_fault, apply_input, centered_rect,
        deliver_overlay_signals, diagnostics_lines, footer_text, header_label, input_for_key,
        input_for_mouse, pump, render,
    };
    use anyhow::{Result, anyhow, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::{Duration, Instant};
    use stockpile_app::{
        AppCommand, AppEvent, AppState, CloseReason, DialogKind, DialogState, FAULT_NOTICE,
        FAULT_REPAIR_DELAY, FeedEvent, NoticeKind, Product, ProductWrite, RepairTrigger,
        RowActionKind, SortDirection, SortState, TableColumn, WriteRequest,
    };
    use stockpile_testkit::product;

    #[derive(Default)]
    struct TestRuntime {
        products: Vec<Product>,
        tx: Option<Sender<InternalEvent>>,
        fail_writes: Option<String>,
        refuse_subscription: bool,
        refuse_dispatch: bool,
        writes: Vec<ProductWrite>,
    }

    impl TestRuntime {
        fn with_products(products: Vec<Product>) -> Self {
            Self {
                products,
                ..Self::default()
            }
        }

        fn publish(&self) {
            if let Some(tx) = &self.tx {
                let _ = tx.send(InternalEvent::Feed(FeedEvent::Snapshot(
                    self.products.clone(),
                )));
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn subscribe_products(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
            if self.refuse_subscription {
                bail!("store offline");
            }
            self.tx = Some(tx);
            self.publish();
            Ok(())
        }

        fn apply_write(&mut self, write: &ProductWrite) -> Result<()> {
            self.writes.push(write.clone());
            if let Some(reason) = &self.fail_writes {
                bail!("{reason}");
            }
            match write {
                ProductWrite::Create(draft) => {
                    let id = self.products.len() as i64 + 1;
                    self.products
                        .push(product(id, &draft.name, draft.price_cents));
                }
                ProductWrite::Update { id, draft } => {
                    let Some(existing) = self.products.iter_mut().find(|p| p.id == *id) else {
                        bail!("product {id} not found");
                    };
                    existing.name = draft.name.clone();
                    existing.price_cents = draft.price_cents;
                }
                ProductWrite::Delete(id) => self.products.retain(|p| p.id != *id),
            }
            self.publish();
            Ok(())
        }

        fn spawn_write(&mut self, request: WriteRequest, tx: Sender<InternalEvent>) -> Result<()> {
            if self.refuse_dispatch {
                bail!("write worker unavailable");
            }
            let result = self
                .apply_write(&request.write)
                .map_err(|error| format!("{error:#}"));
            tx.send(InternalEvent::WriteSettled {
                request_id: request.request_id,
                result,
            })?;
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
        now: Instant,
    }

    impl Harness {
        fn start(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: AppState::default(),
                runtime,
                tx,
                rx,
                now: Instant::now(),
            };
            if let Err(error) = harness.runtime.subscribe_products(harness.tx.clone()) {
                harness.state.dispatch(
                    AppCommand::ConnectivityFailed(format!("{error:#}")),
                    harness.now,
                );
            }
            harness.turn();
            harness
        }

        /// One loop iteration: drain, tick, "draw", then deliver signals.
        fn turn(&mut self) {
            pump(
                &mut self.state,
                &mut self.runtime,
                &self.tx,
                &self.rx,
                self.now,
            );
            deliver_overlay_signals(&mut self.state, &mut self.runtime, &self.tx, self.now);
        }

        fn key(&mut self, code: KeyCode) -> bool {
            self.key_with(code, KeyModifiers::NONE)
        }

        fn key_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let input = input_for_key(&self.state, KeyEvent::new(code, modifiers));
            let quit = apply_input(&mut self.state, &mut self.runtime, &self.tx, input, self.now);
            self.turn();
            quit
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch));
            }
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            self.turn();
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn scenario_products() -> Vec<Product> {
        vec![
            product(1, "Widget", 1_000),
            product(2, "Gadget", 2_550),
            product(3, "Widget Pro", 9_999),
        ]
    }

    fn rendered_text(state: &AppState, width: u16, height: u16) -> Result<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height))?;
        terminal.draw(|frame| render(frame, state))?;
        let buffer = terminal.backend().buffer();
        let width = usize::from(buffer.area.width);
        Ok(buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    #[test]
    fn global_keys_win_over_every_focus() {
        let mut state = AppState::default();
        state.search_focused = true;
        let ctrl = |ch| KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL);
        assert_eq!(input_for_key(&state, ctrl('q')), Input::Quit);
        assert_eq!(
            input_for_key(&state, ctrl('r')),
            Input::Dispatch(AppCommand::Repair)
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::F(12))),
            Input::Dispatch(AppCommand::ToggleDiagnostics)
        );
    }

    #[test]
    fn table_keys_map_to_row_and_sort_commands() {
        let state = AppState::default();
        assert_eq!(
            input_for_key(&state, key(KeyCode::Char('a'))),
            Input::Dispatch(AppCommand::OpenAdd)
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::Enter)),
            Input::Dispatch(AppCommand::ActOnSelected(RowActionKind::Edit))
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::Char('d'))),
            Input::Dispatch(AppCommand::ActOnSelected(RowActionKind::Delete))
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::Char('2'))),
            Input::Dispatch(AppCommand::Sort(TableColumn::Price))
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::Char('j'))),
            Input::Dispatch(AppCommand::MoveRow(1))
        );
        assert_eq!(input_for_key(&state, key(KeyCode::Char('z'))), Input::Ignore);
    }

    #[test]
    fn search_focus_routes_characters_into_query() {
        let mut state = AppState::default();
        state.search_focused = true;
        assert_eq!(
            input_for_key(&state, key(KeyCode::Char('a'))),
            Input::Dispatch(AppCommand::SearchInsert('a'))
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::Enter)),
            Input::Dispatch(AppCommand::BlurSearch)
        );
        assert_eq!(
            input_for_key(&state, key(KeyCode::Esc)),
            Input::Dispatch(AppCommand::Escape)
        );
    }

    #[test]
    fn add_flow_writes_closes_and_leaves_no_overlay_residue() {
        let mut harness = Harness::start(TestRuntime::with_products(scenario_products()));
        assert_eq!(harness.state.table.row_count(), 3);

        harness.key(KeyCode::Char('a'));
        assert_eq!(harness.state.dialogs.state(), DialogState::Open(DialogKind::Add));
        assert!(harness.state.overlay.has_backdrop());

        harness.type_text("Doohickey");
        harness.key(KeyCode::Tab);
        harness.type_text("12.5");
        harness.key(KeyCode::Enter);

        assert_eq!(harness.runtime.writes.len(), 1);
        assert_eq!(harness.state.dialogs.state(), DialogState::Closed);
        assert_eq!(harness.state.overlay.backdrops(), 0);
        assert!(!harness.state.overlay.scroll_locked());
        assert!(!harness.state.overlay.is_inert());
        assert_eq!(harness.state.table.row_count(), 4);
        assert_eq!(
            harness
                .state
                .notices
                .current(NoticeKind::Success)
                .map(|notice| notice.message.as_str()),
            Some("Product added successfully")
        );
    }

    #[test]
    fn failed_write_keeps_dialog_open_with_error() {
        let mut runtime = TestRuntime::with_products(scenario_products());
        runtime.fail_writes = Some("disk full".to_owned());
        let mut harness = Harness::start(runtime);

        harness.key(KeyCode::Down);
        harness.key(KeyCode::Char('d'));
        assert!(matches!(
            harness.state.dialogs.state(),
            DialogState::Open(DialogKind::Delete(_))
        ));
        harness.key(KeyCode::Enter);

        assert!(harness.state.dialogs.state().is_open());
        let confirm_enabled = harness
            .state
            .dialogs
            .dialog()
            .map(|dialog| dialog.confirm.enabled);
        assert_eq!(confirm_enabled, Some(true));
        let error = harness
            .state
            .notices
            .current(NoticeKind::Error)
            .map(|notice| notice.message.clone())
            .unwrap_or_default();
        assert!(error.starts_with("Failed to delete product."));
        assert!(error.contains("disk full"));
        assert_eq!(harness.state.table.row_count(), 3);
    }

    #[test]
    fn failed_write_dispatch_reports_fault_and_repairs_overlay() {
        let runtime = TestRuntime {
            products: scenario_products(),
            refuse_dispatch: true,
            ..TestRuntime::default()
        };
        let mut harness = Harness::start(runtime);

        harness.key(KeyCode::Char('a'));
        harness.type_text("Lamp");
        harness.key(KeyCode::Tab);
        harness.type_text("5");
        harness.key(KeyCode::Enter);

        assert_eq!(
            harness
                .state
                .notices
                .current(NoticeKind::Error)
                .map(|notice| notice.message.as_str()),
            Some(FAULT_NOTICE)
        );
        assert!(harness.state.dialogs.state().is_open());

        let events = harness
            .state
            .dispatch(AppCommand::Tick, harness.now + FAULT_REPAIR_DELAY);
        assert!(events.contains(&AppEvent::Repaired(RepairTrigger::Fault)));
        assert_eq!(harness.state.dialogs.state(), DialogState::Closed);
        assert_eq!(harness.state.overlay.backdrops(), 0);
        assert!(!harness.state.overlay.is_inert());
    }

    #[test]
    fn loop_failures_are_reported_until_they_keep_repeating() {
        let now = Instant::now();
        let mut state = AppState::default();
        let mut faults = 0;

        assert!(absorb_fault(&mut state, &mut faults, anyhow!("read event"), now).is_none());
        assert_eq!(
            state
                .notices
                .current(NoticeKind::Error)
                .map(|notice| notice.message.as_str()),
            Some(FAULT_NOTICE)
        );
        assert!(absorb_fault(&mut state, &mut faults, anyhow!("read event"), now).is_none());

        let fatal = absorb_fault(&mut state, &mut faults, anyhow!("read event"), now);
        assert_eq!(fatal.map(|error| error.to_string()), Some("read event".to_owned()));
    }

    #[test]
    fn escape_closes_dialog_without_writing() {
        let mut harness = Harness::start(TestRuntime::with_products(scenario_products()));
        harness.key(KeyCode::Char('e'));
        assert!(harness.state.dialogs.state().is_open());

        harness.key(KeyCode::Esc);
        assert_eq!(harness.state.dialogs.state(), DialogState::Closed);
        assert!(harness.runtime.writes.is_empty());
        assert!(!harness.state.overlay.has_backdrop());
    }

    #[test]
    fn search_narrows_rows_after_debounce() {
        let mut harness = Harness::start(TestRuntime::with_products(scenario_products()));
        harness.key(KeyCode::Char('/'));
        harness.type_text("pro");
        assert_eq!(harness.state.table.visible_count(), 3);

        harness.advance(Duration::from_millis(150));
        assert_eq!(harness.state.table.visible_count(), 1);

        harness.key(KeyCode::Enter);
        assert!(!harness.state.search_focused);
        harness.key_with(KeyCode::Char('u'), KeyModifiers::CONTROL);
        harness.advance(Duration::from_millis(150));
        assert_eq!(harness.state.table.visible_count(), 3);
    }

    #[test]
    fn lost_signal_is_offered_for_repair_and_ctrl_r_recovers() {
        let mut harness = Harness::start(TestRuntime::with_products(scenario_products()));
        assert!(!harness.key(KeyCode::Char('a')));
        harness.key(KeyCode::Esc);
        assert_eq!(harness.state.dialogs.state(), DialogState::Closed);

        // Reopen and lose the shown signal before it is delivered.
        let input = input_for_key(&harness.state, key(KeyCode::Char('a')));
        apply_input(
            &mut harness.state,
            &mut harness.runtime,
            &harness.tx,
            input,
            harness.now,
        );
        assert_eq!(harness.state.overlay.drop_signals(), 1);

        let interval = harness.state.monitor.interval();
        harness.advance(interval);
        harness.advance(interval);
        harness.advance(interval);
        assert!(harness.state.repair_offered());
        assert!(footer_text(&harness.state).0.contains("ctrl+r"));

        harness.key_with(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(harness.state.dialogs.state(), DialogState::Closed);
        assert_eq!(harness.state.overlay.backdrops(), 0);
        assert!(!harness.state.overlay.is_inert());
        assert!(!harness.state.repair_offered());
    }

    #[test]
    fn subscription_failure_is_reported_once() {
        let runtime = TestRuntime {
            refuse_subscription: true,
            ..TestRuntime::default()
        };
        let harness = Harness::start(runtime);
        let error = harness
            .state
            .notices
            .current(NoticeKind::Error)
            .map(|notice| notice.message.clone());
        assert_eq!(
            error.as_deref(),
            Some("Error connecting to database. Please reload and try again later.")
        );
    }

    #[test]
    fn quit_keys_stop_the_loop() {
        let mut harness = Harness::start(TestRuntime::default());
        assert!(harness.key_with(KeyCode::Char('q'), KeyModifiers::CONTROL));
    }

    #[test]
    fn backdrop_click_and_double_click_map_to_commands() {
        let mut harness = Harness::start(TestRuntime::with_products(scenario_products()));
        harness.key(KeyCode::Char('a'));
        let mut view_data = ViewData {
            screen: Rect::new(0, 0, 80, 24),
            last_click: None,
        };

        let inside = centered_rect(60, 40, view_data.screen);
        assert_eq!(
            input_for_mouse(
                &harness.state,
                &mut view_data,
                click(inside.x + 1, inside.y + 1),
                harness.now,
            ),
            Input::Ignore
        );
        assert_eq!(
            input_for_mouse(
                &harness.state,
                &mut view_data,
                click(0, 0),
                harness.now + Duration::from_secs(1),
            ),
            Input::Dispatch(AppCommand::CloseDialog(CloseReason::Backdrop))
        );
        assert_eq!(
            input_for_mouse(
                &harness.state,
                &mut view_data,
                click(0, 0),
                harness.now + Duration::from_millis(1_200),
            ),
            Input::Dispatch(AppCommand::DoubleClick)
        );
    }

    #[test]
    fn header_marks_sorted_column() {
        let sort = SortState {
            column: TableColumn::Price,
            direction: SortDirection::Desc,
        };
        assert_eq!(header_label(TableColumn::Price, sort), "Price ▼");
        assert_eq!(header_label(TableColumn::Name, sort), "Name");
    }

    #[test]
    fn render_shows_skeleton_then_rows() -> Result<()> {
        let mut state = AppState::default();
        let loading = rendered_text(&state, 100, 20)?;
        assert!(loading.contains("░░░"));
        assert!(loading.contains("products (loading)"));

        state.dispatch(
            AppCommand::Feed(FeedEvent::Snapshot(scenario_products())),
            Instant::now(),
        );
        let text = rendered_text(&state, 100, 20)?;
        assert!(text.contains("Name ▲"));
        assert!(text.contains("Widget Pro"));
        assert!(text.contains("₱99.99"));
        assert!(text.contains("[edit] [delete]"));
        Ok(())
    }

    #[test]
    fn render_shows_empty_and_no_result_messages() -> Result<()> {
        let now = Instant::now();
        let mut state = AppState::default();
        state.dispatch(AppCommand::Feed(FeedEvent::Snapshot(Vec::new())), now);
        assert!(rendered_text(&state, 100, 20)?.contains("No products found"));

        state.dispatch(
            AppCommand::Feed(FeedEvent::Snapshot(scenario_products())),
            now,
        );
        state.dispatch(AppCommand::FocusSearch, now);
        for ch in "zzz".chars() {
            state.dispatch(AppCommand::SearchInsert(ch), now);
        }
        state.dispatch(AppCommand::Tick, now + Duration::from_secs(1));
        assert!(
            rendered_text(&state, 100, 20)?.contains("No products found matching your search.")
        );
        Ok(())
    }

    #[test]
    fn selected_row_stays_on_screen_in_long_tables() -> Result<()> {
        let mut state = AppState::default();
        let products = (1..=20)
            .map(|id| product(id, &format!("Item {id:02}"), id * 100))
            .collect();
        state.dispatch(
            AppCommand::Feed(FeedEvent::Snapshot(products)),
            Instant::now(),
        );
        state.selected_row = 17;

        let text = rendered_text(&state, 80, 14)?;
        assert!(text.contains("Item 18"));
        assert!(!text.contains("Item 01"));
        Ok(())
    }

    #[test]
    fn render_draws_dialog_when_overlay_shows() -> Result<()> {
        let mut state = AppState::default();
        state.dispatch(AppCommand::OpenAdd, Instant::now());
        let text = rendered_text(&state, 100, 30)?;
        assert!(text.contains("Product Name"));
        assert!(text.contains("Add Product"));
        Ok(())
    }

    #[test]
    fn diagnostics_report_overlay_bookkeeping() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::OpenAdd, Instant::now());
        let lines = diagnostics_lines(&state);
        assert!(lines.contains(&"backdrops: 1".to_owned()));
        assert!(lines.contains(&"pointer blocked: yes".to_owned()));
        assert!(lines.contains(&"dialog: opening".to_owned()));
        assert!(lines.contains(&"queued signals: 1".to_owned()));
    }
}
