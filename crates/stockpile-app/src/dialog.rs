// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::forms::{ProductFormInput, ProductWrite, WriteRequest};
use crate::ids::ProductId;
use crate::notice::Notice;
use crate::overlay::{OverlaySignal, OverlaySurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Add,
    Edit(ProductId),
    Delete(ProductId),
}

impl DialogKind {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Add => "Add Product",
            Self::Edit(_) => "Edit Product",
            Self::Delete(_) => "Delete Product",
        }
    }

    pub const fn confirm_label(self) -> &'static str {
        match self {
            Self::Add => "Add Product",
            Self::Edit(_) => "Save Changes",
            Self::Delete(_) => "Delete",
        }
    }

    pub const fn busy_label(self) -> &'static str {
        match self {
            Self::Add => "Adding...",
            Self::Edit(_) => "Saving...",
            Self::Delete(_) => "Deleting...",
        }
    }

    const fn past_tense(self) -> &'static str {
        match self {
            Self::Add => "added",
            Self::Edit(_) => "updated",
            Self::Delete(_) => "deleted",
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    pub const fn has_form(self) -> bool {
        !matches!(self, Self::Delete(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Closed,
    Opening(DialogKind),
    Open(DialogKind),
    Closing(DialogKind),
}

impl DialogState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening(_) => "opening",
            Self::Open(_) => "open",
            Self::Closing(_) => "closing",
        }
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogRequest {
    Add,
    Edit {
        id: ProductId,
        name: String,
        price_cents: i64,
    },
    Delete {
        id: ProductId,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Name,
    Price,
}

impl FormField {
    pub const fn other(self) -> Self {
        match self {
            Self::Name => Self::Price,
            Self::Price => Self::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Button,
    Escape,
    Backdrop,
    Completed,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmControl {
    pub enabled: bool,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub instance: u64,
    pub kind: DialogKind,
    pub form: ProductFormInput,
    pub focus: Option<FormField>,
    pub delete_name: String,
    pub confirm: ConfirmControl,
    pub inline_error: Option<String>,
    in_flight: Option<u64>,
}

impl Dialog {
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn delete_message(&self) -> String {
        format!(
            "Are you sure you want to delete \"{}\"? This cannot be undone.",
            self.delete_name
        )
    }

    fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Name => &mut self.form.name,
            FormField::Price => &mut self.form.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogEvent {
    Opened(DialogKind),
    Closed(CloseReason),
    Submit(WriteRequest),
    Notify(Notice),
}

/// Owns the single dialog slot and drives the overlay through its
/// open/close lifecycle. Every mutation of the overlay outside a forced
/// reset goes through here.
#[derive(Debug, Clone, Default)]
pub struct DialogController {
    state: DialogState,
    dialog: Option<Dialog>,
    close_reason: Option<CloseReason>,
    next_instance: u64,
    next_request: u64,
    pending: BTreeMap<u64, DialogKind>,
}

impl DialogController {
    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn request_open(
        &mut self,
        request: DialogRequest,
        overlay: &mut OverlaySurface,
    ) -> Vec<DialogEvent> {
        let mut events = Vec::new();
        if self.state != DialogState::Closed {
            info!(state = self.state.label(), "replacing active dialog");
            overlay.hide();
            overlay.drop_signals();
            self.finish_close(overlay);
            events.push(DialogEvent::Closed(CloseReason::Replaced));
        }

        let (kind, form, delete_name) = match request {
            DialogRequest::Add => (DialogKind::Add, ProductFormInput::default(), String::new()),
            DialogRequest::Edit {
                id,
                name,
                price_cents,
            } => (
                DialogKind::Edit(id),
                ProductFormInput::from_product(&name, price_cents),
                String::new(),
            ),
            DialogRequest::Delete { id, name } => {
                (DialogKind::Delete(id), ProductFormInput::default(), name)
            }
        };

        self.next_instance += 1;
        self.dialog = Some(Dialog {
            instance: self.next_instance,
            kind,
            form,
            focus: None,
            delete_name,
            confirm: ConfirmControl {
                enabled: true,
                label: kind.confirm_label(),
            },
            inline_error: None,
            in_flight: None,
        });
        self.state = DialogState::Opening(kind);
        overlay.show();
        debug!(?kind, instance = self.next_instance, "dialog opening");
        events
    }

    /// Feeds a lifecycle signal back from the overlay. Signals that do not
    /// fit the current phase are stale and ignored, except that `Hidden`
    /// always cleans up the overlay once the slot is empty.
    pub fn on_signal(
        &mut self,
        signal: OverlaySignal,
        overlay: &mut OverlaySurface,
    ) -> Vec<DialogEvent> {
        match (signal, self.state) {
            (OverlaySignal::Shown, DialogState::Opening(kind)) => {
                self.state = DialogState::Open(kind);
                if let Some(dialog) = self.dialog.as_mut()
                    && kind.has_form()
                {
                    dialog.focus = Some(FormField::Name);
                }
                debug!(?kind, "dialog open");
                vec![DialogEvent::Opened(kind)]
            }
            (OverlaySignal::Hidden, DialogState::Closing(_)) => {
                let reason = self.close_reason.unwrap_or(CloseReason::Button);
                self.finish_close(overlay);
                vec![DialogEvent::Closed(reason)]
            }
            (OverlaySignal::Hidden, DialogState::Closed) => {
                self.finish_close(overlay);
                Vec::new()
            }
            (signal, state) => {
                debug!(?signal, state = state.label(), "ignoring stale overlay signal");
                Vec::new()
            }
        }
    }

    pub fn request_close(&mut self, reason: CloseReason, overlay: &mut OverlaySurface) -> bool {
        let kind = match self.state {
            DialogState::Opening(kind) | DialogState::Open(kind) => kind,
            DialogState::Closed | DialogState::Closing(_) => return false,
        };
        self.state = DialogState::Closing(kind);
        self.close_reason = Some(reason);
        overlay.hide();
        debug!(?kind, ?reason, "dialog closing");
        true
    }

    pub fn input_char(&mut self, ch: char) {
        if let Some(dialog) = self.editable_dialog()
            && let Some(field) = dialog.focus
        {
            dialog.field_mut(field).push(ch);
            dialog.inline_error = None;
        }
    }

    pub fn backspace(&mut self) {
        if let Some(dialog) = self.editable_dialog()
            && let Some(field) = dialog.focus
        {
            dialog.field_mut(field).pop();
        }
    }

    pub fn focus_next(&mut self) {
        if let Some(dialog) = self.editable_dialog()
            && let Some(field) = dialog.focus
        {
            dialog.focus = Some(field.other());
        }
    }

    // Two fields, so previous and next coincide.
    pub fn focus_prev(&mut self) {
        self.focus_next();
    }

    /// Validates the form and issues exactly one write. Ignored unless the
    /// dialog is open with its confirm control enabled.
    pub fn confirm(&mut self) -> Vec<DialogEvent> {
        let DialogState::Open(kind) = self.state else {
            return Vec::new();
        };
        let Some(dialog) = self.dialog.as_mut() else {
            return Vec::new();
        };
        if !dialog.confirm.enabled || dialog.in_flight.is_some() {
            debug!(?kind, "confirm ignored while write pending");
            return Vec::new();
        }

        let write = match kind {
            DialogKind::Delete(id) => ProductWrite::Delete(id),
            DialogKind::Add | DialogKind::Edit(_) => match dialog.form.validate() {
                Ok(draft) => match kind {
                    DialogKind::Edit(id) => ProductWrite::Update { id, draft },
                    _ => ProductWrite::Create(draft),
                },
                Err(error) => {
                    let message = error.to_string();
                    debug!(%message, "form validation failed");
                    dialog.inline_error = Some(message.clone());
                    return vec![DialogEvent::Notify(Notice::error(message))];
                }
            },
        };

        self.next_request += 1;
        let request_id = self.next_request;
        dialog.in_flight = Some(request_id);
        dialog.inline_error = None;
        dialog.confirm = ConfirmControl {
            enabled: false,
            label: kind.busy_label(),
        };
        self.pending.insert(request_id, kind);
        info!(request_id, verb = write.verb(), "submitting product write");
        vec![DialogEvent::Submit(WriteRequest { request_id, write })]
    }

    /// Every settlement yields a notice, even when its dialog has since been
    /// replaced or reset. Only the dialog that issued the write reacts.
    pub fn on_write_settled(
        &mut self,
        request_id: u64,
        result: Result<(), String>,
        overlay: &mut OverlaySurface,
    ) -> Vec<DialogEvent> {
        let Some(kind) = self.pending.remove(&request_id) else {
            warn!(request_id, "settlement for unknown write");
            return Vec::new();
        };

        let notice = match &result {
            Ok(()) => Notice::success(format!("Product {} successfully", kind.past_tense())),
            Err(reason) => Notice::error(format!(
                "Failed to {} product. Please try again. Error: {reason}",
                kind.verb()
            )),
        };
        let events = vec![DialogEvent::Notify(notice)];

        let owner = self
            .dialog
            .as_mut()
            .filter(|dialog| dialog.in_flight == Some(request_id));
        let Some(dialog) = owner else {
            debug!(request_id, "write settled after its dialog went away");
            return events;
        };

        dialog.in_flight = None;
        match result {
            Ok(()) => {
                info!(request_id, "product write succeeded");
                self.request_close(CloseReason::Completed, overlay);
            }
            Err(reason) => {
                warn!(request_id, %reason, "product write failed");
                dialog.confirm = ConfirmControl {
                    enabled: true,
                    label: kind.confirm_label(),
                };
                dialog.inline_error = Some(reason);
            }
        }
        events
    }

    /// Drops the dialog and strips the overlay regardless of phase.
    /// Writes already in flight still report their outcome.
    pub fn force_reset(&mut self, overlay: &mut OverlaySurface) {
        if self.state != DialogState::Closed {
            info!(state = self.state.label(), "forcing dialog closed");
        }
        self.state = DialogState::Closed;
        self.dialog = None;
        self.close_reason = None;
        overlay.reset();
    }

    fn editable_dialog(&mut self) -> Option<&mut Dialog> {
        if !self.state.is_open() {
            return None;
        }
        self.dialog
            .as_mut()
            .filter(|dialog| dialog.kind.has_form() && dialog.in_flight.is_none())
    }

    fn finish_close(&mut self, overlay: &mut OverlaySurface) {
        self.state = DialogState::Closed;
        self.dialog = None;
        self.close_reason = None;
        overlay.clear_backdrops();
        overlay.unlock_scroll();
        overlay.restore_interaction();
    }
}
