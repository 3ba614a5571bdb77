pub mod activity;
pub mod common;
pub mod context;
pub mod menu;
pub mod module;
pub mod panel;
pub mod schema;
pub mod settings;
pub mod theme;
pub mod widget;

pub use activity::*;
pub use common::*;
pub use context::*;
pub use menu::*;
pub use module::*;
pub use panel::*;
pub use schema::*;
pub use settings::*;
pub use theme::*;
pub use widget::*;
