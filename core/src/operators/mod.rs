mod r#trait;
mod types;

pub use r#trait::OperatorDirectory;
pub use types::{OperatorId, OperatorRecord, OperatorRole};
