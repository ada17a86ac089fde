//! # Tread Database Layer
//!
//! SQLite persistence for the Tread inventory and invoicing engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                             │
//! │                    (pool + lifecycle)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Repositories                           │
//! │  ┌───────────┐ ┌───────────┐ ┌──────────┐ ┌─────────────┐  │
//! │  │  Company  │ │  Product  │ │  Ledger  │ │   Invoice   │  │
//! │  │ tenants,  │ │ intake,   │ │ lookup,  │ │ staging,    │  │
//! │  │ stores    │ │ barcodes  │ │ moves    │ │ close,      │  │
//! │  │           │ │           │ │          │ │ returns     │  │
//! │  └───────────┘ └───────────┘ └──────────┘ └─────────────┘  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    SQLite (WAL mode)                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every logical stock move is one SQL transaction: the repositories
//! compose the shared ledger helpers inside a single `begin`/`commit`
//! so a crash can never strand a unit between states.
//!
//! ## Usage
//! ```no_run
//! use tread_db::{Database, DbConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tread_db::DbError> {
//!     let db = Database::new(DbConfig::new("tread.db")).await?;
//!     let company = db.companies().create_company("Trotamundos Shoes").await?;
//!     println!("company {}", company.id);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
