// SPDX-License-Identifier: PMPL-1.0-or-later
//! DbEngine CSV
//!
//! Comma-separated files as a [`TabularSource`](dbengine_query::TabularSource).
//! The first record is the header; column types are inferred from the first
//! data record.

pub mod infer;
pub mod source;

pub use infer::{infer_type, infer_types};
pub use source::CsvSource;
