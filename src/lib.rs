//! Schema, view and migration chain for the board database.
//!
//! Tables `users` and `posts` plus the aggregate view `active_users` are
//! created and altered only through the revisions in [`migration`]. View SQL
//! lives once in [`views`]; revisions and the drift detector in [`autogen`]
//! both read it from there.

pub mod autogen;
pub mod config;
pub mod entities;
pub mod inspect;
pub mod migration;
pub mod runner;
pub mod views;

pub use config::DbConfig;
pub use migration::Migrator;
