mod service;

pub use service::HistoryService;
