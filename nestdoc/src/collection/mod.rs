mod document;
mod object_id;

pub use document::*;
pub use object_id::ObjectId;
pub(crate) use object_id::ObjectIdGenerator;
