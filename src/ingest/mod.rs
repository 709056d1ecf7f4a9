mod service;

pub use service::{IngestError, IngestService};
