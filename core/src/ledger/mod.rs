mod r#trait;
mod types;

pub use r#trait::QuotaLedger;
pub use types::QuotaProfile;
