pub mod inbox_watcher;
pub mod mcp_transport;
pub mod report_store;
