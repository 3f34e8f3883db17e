pub mod cdp_client;
pub mod js_executor;
pub mod navigation;
pub mod network_monitor;

pub use cdp_client::CdpNavigationClient;
pub use js_executor::JsExecutor;
pub use navigation::{ActionRef, FieldMatch, NavigationClient, RowMatch, RowQuery, ViewId};
