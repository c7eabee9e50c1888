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

use crate::types::Policy;
use crate::{Error, Result};

use isahc::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Timeout applied to every request towards the Policy Engine. The sync loop runs on a much
/// longer interval, so a stuck request must never outlive a cycle.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The policy listing comes either as a bare list, as a `{"policies": ...}` wrapper around one,
/// or as a map keyed by policy id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PolicyListing {
    List(Vec<Policy>),
    Wrapped {
        policies: Box<PolicyListing>,
    },
    Map(HashMap<String, Policy>),
}

impl PolicyListing {
    fn into_policies(self) -> Vec<Policy> {
        match self {
            PolicyListing::List(list) => list,
            PolicyListing::Wrapped { policies } => policies.into_policies(),
            PolicyListing::Map(map) => {
                let mut list: Vec<Policy> = map.into_iter().map(|(_, p)| p).collect();
                list.sort_by(|a, b| a.id.cmp(&b.id));
                list
            }
        }
    }
}

/// # Policy Engine handle
///
/// No connection is established at construction; the Policy Engine may well be down when the
/// controller starts, and availability is tracked by the caller as a runtime flag.
#[derive(Debug, Clone)]
pub struct PolicyEngineClient {
    address: String,
    client: HttpClient,
}

impl PolicyEngineClient {
    /// Create a new handle for a Policy Engine reachable at the given host and port.
    pub fn new(address: impl AsRef<str>, port: u16) -> Result<Self> {
        let client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { address: format!("http://{}:{}", address.as_ref(), port), client })
    }

    /// The base URL this handle talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fetch the full policy set. Transport failures, non-success status codes and malformed
    /// bodies are all reported as errors; the caller keeps its previous cache in that case.
    pub fn get_policies(&self) -> Result<Vec<Policy>> {
        let listing: PolicyListing =
            serde_json::from_str(&self.request_get("api/v1/policies")?)?;
        Ok(listing.into_policies())
    }

    fn request_get(&self, key: impl AsRef<str>) -> Result<String> {
        let addr = format!("{}/{}", self.address, key.as_ref());
        let mut response = self.client.get(&addr)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ResponseError(status.as_u16(), response.text()?));
        }
        Ok(response.text()?)
    }
}
