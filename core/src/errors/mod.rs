mod gateway_error;
mod ledger_error;

pub use gateway_error::GatewayError;
pub use ledger_error::LedgerError;
