//! Migration System
//!
//! Schema migrations are plain `.sql` files named `<version>_<name>.sql`.
//! Applied versions are tracked in a ledger table; `up` applies pending
//! files in filename order, `down` forgets the latest applied version and
//! `status` reports both.

pub mod definitions;
pub mod executor;
pub mod ledger;
mod lock;
pub mod manager;
pub mod runner;

pub use definitions::*;
pub use executor::MigrationExecutor;
pub use ledger::Ledger;
pub use manager::{list_migrations, version_token, MigrationManager};
pub use runner::MigrationRunner;
