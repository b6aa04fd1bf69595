pub mod browser_manager;
pub mod cdp_adapter;
pub mod dom;
pub mod interceptor;
pub mod page_adapter;

pub use cdp_adapter::ChromiumPageAdapter;
pub use page_adapter::{clean_display_name, PageAdapter, ScrollMethod};
