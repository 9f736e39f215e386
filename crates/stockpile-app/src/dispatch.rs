// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::warn;

use crate::dialog::{DialogController, DialogEvent, DialogRequest};
use crate::notice::Notice;
use crate::overlay::OverlaySurface;
use crate::table::{ProductTable, RowAction, RowActionKind};

pub const INVALID_PRODUCT_DATA: &str = "Invalid product data";

/// Opens the dialog for a row affordance using the attributes captured at
/// the last render, not a fresh store read.
pub fn dispatch_row_action(
    action: RowAction,
    table: &ProductTable,
    dialogs: &mut DialogController,
    overlay: &mut OverlaySurface,
) -> Vec<DialogEvent> {
    let Some(meta) = table.find(action.product_id) else {
        warn!(id = %action.product_id, kind = action.kind.label(), "row action for unknown product");
        return vec![DialogEvent::Notify(Notice::error(INVALID_PRODUCT_DATA))];
    };

    let request = match action.kind {
        RowActionKind::Edit => DialogRequest::Edit {
            id: meta.id,
            name: meta.name.clone(),
            price_cents: meta.price_cents,
        },
        RowActionKind::Delete => DialogRequest::Delete {
            id: meta.id,
            name: meta.name.clone(),
        },
    };
    dialogs.request_open(request, overlay)
}
