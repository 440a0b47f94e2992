//! Client library for the external XML-RPC API of the Odoo ERP.
//!
//! ```no_run
//! use odoo_xmlrpc::{Config, Domain, Odoo, Operator, SearchOptions};
//!
//! # async fn run() -> odoo_xmlrpc::Result<()> {
//! let odoo = Odoo::connect(Config::new("https://odoo.example.com", "prod", "admin", "secret")).await?;
//! let companies = odoo
//!     .search_read(
//!         "res.partner",
//!         &Domain::new().filter("is_company", Operator::Eq, true),
//!         &["name", "country_id"],
//!         &SearchOptions::new().limit(10),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod odoo;
pub mod xmlrpc;

pub use crate::config::Config;
pub use crate::domain::{Domain, Operator, SearchOptions, Term};
pub use crate::error::{Error, Result};
pub use crate::odoo::{Odoo, Record, ServerVersion};
pub use crate::xmlrpc::{Fault, FaultKind, ToValue, Value};
