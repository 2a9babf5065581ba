//! Command handlers, one module per subcommand group.

pub mod chain;
pub mod dev;
pub mod transfer;
pub mod wallet;
