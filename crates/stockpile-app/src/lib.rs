// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod dialog;
pub mod dispatch;
pub mod forms;
pub mod ids;
pub mod model;
pub mod notice;
pub mod overlay;
pub mod price;
pub mod recovery;
pub mod search;
pub mod state;
pub mod table;

pub use dialog::*;
pub use dispatch::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use notice::*;
pub use overlay::*;
pub use price::*;
pub use recovery::*;
pub use search::*;
pub use state::*;
pub use table::*;
