pub mod cli;
pub mod healthcheck;
pub mod serve;
