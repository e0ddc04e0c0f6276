// doc constants
pub const DOC_ID: &str = "_id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

// event constants
pub const NESTDOC_EVENT: &str = "nestdoc_event";

// store constants
pub const DEFAULT_COLLECTION_SUFFIX: &str = "s";

pub const NESTDOC_VERSION: &str = env!("CARGO_PKG_VERSION");
