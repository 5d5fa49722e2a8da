//! Core types and logic for Tally.
//!
//! Turns uploaded sales/tax tables into one canonical record set per owner
//! and answers grouped summary queries over it. This crate has no HTTP,
//! database or file-format dependencies.

// Native `async fn` in traits; `Send` bounds are spelled out on the trait.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod normalize;
pub mod record;
pub mod store;
pub mod table;

pub use error::{Error, InvalidFilterValue, Result};
pub use ledger::{Ledger, OwnerGuard};
pub use record::{DatasetInfo, Owner, SaleRecord};
