// Weir: Policy-Enforcing OpenFlow Controller
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Policy Engine Client
//!
//! This is a very simple crate to fetch policy documents from the external Policy Engine service.
//! Policies are authored, validated and versioned remotely; the controller only consumes the
//! current policy list and treats every document as an opaque, already-valid declarative object.
//!
//! ```no_run
//! use policy_engine::PolicyEngineClient;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PolicyEngineClient::new("localhost", 9000)?;
//!     for policy in client.get_policies()? {
//!         println!("{} (priority {})", policy.name, policy.priority);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

mod client;
mod types;

pub use client::PolicyEngineClient;
pub use types::*;

use thiserror::Error as ThisError;

/// # Policy Engine error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// Error during handling of the HTTP request
    #[allow(clippy::upper_case_acronyms)]
    #[error("HTTP Error: {0}")]
    HTTPError(#[from] isahc::Error),
    /// Cannot deserialize the response
    #[error("Cannot parse JSON response: {0}")]
    JsonError(#[from] serde_json::error::Error),
    /// IO Error
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// HTTP Response Error
    #[error("HTTP Response Error: {0}. Message:\n{1}")]
    ResponseError(u16, String),
}

/// Policy Engine result type
pub type Result<T> = core::result::Result<T, Error>;
