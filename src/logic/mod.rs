pub mod command_bus;
pub mod dashboard;
pub mod feature_gate;
pub mod icons;
pub mod menu_adapter;
pub mod navigation;
pub mod panel_tabs;
pub mod registry;
pub mod sanitize;
pub mod schema;
pub mod settings;
pub mod theme;

pub use command_bus::{CommandBus, CommandHandler, Message, QueryHandler};
pub use dashboard::{Dashboard, DashboardProviderCommand};
pub use feature_gate::*;
pub use icons::IconReference;
pub use menu_adapter::MenuAdapter;
pub use navigation::NavigationResolver;
pub use panel_tabs::{KeepExisting, TabCollisionHandler, TabGate, TabPermissionEvaluator};
pub use registry::Registry;
pub use sanitize::sanitize_widget_data;
pub use settings::SettingsService;
pub use theme::resolve_theme;
