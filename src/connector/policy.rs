//! Status allow-list.
//!
//! # Design Decisions
//! - Exact membership only; a caller wanting "any 2xx" enumerates the codes
//! - The list is never empty, so every policy can accept something
//! - Replacing the list is wholesale, there is no merge

use std::collections::BTreeSet;

use crate::error::{ConnectorError, ConnectorResult};

/// Default allow-list for a plain connector.
pub const DEFAULT_STATUS_CODES: [u16; 4] = [200, 201, 202, 204];

/// Default allow-list for a proxy connector: 2xx plus the 4xx/5xx codes that
/// pass through to the caller untouched.
pub const PROXY_STATUS_CODES: [u16; 18] = [
    200, 201, 202, 203, 204, 205, 206, 400, 401, 402, 403, 404, 405, 406, 407, 408, 410, 501,
];

/// The set of status codes a connector treats as non-fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPolicy {
    codes: BTreeSet<u16>,
}

impl StatusPolicy {
    /// Create a policy from an explicit list of codes.
    pub fn new(codes: impl IntoIterator<Item = u16>) -> ConnectorResult<Self> {
        let mut policy = Self::default();
        policy.set_allow_list(codes)?;
        Ok(policy)
    }

    /// The pass-through allow-list used by proxy connectors.
    pub fn proxy() -> Self {
        Self {
            codes: PROXY_STATUS_CODES.into_iter().collect(),
        }
    }

    /// Replace the allow-list. Fails when `codes` is empty.
    pub fn set_allow_list(&mut self, codes: impl IntoIterator<Item = u16>) -> ConnectorResult<()> {
        let codes: BTreeSet<u16> = codes.into_iter().collect();
        if codes.is_empty() {
            return Err(ConnectorError::Configuration(
                "Cannot set empty valid status codes, please fill in at least one".to_string(),
            ));
        }
        self.codes = codes;
        Ok(())
    }

    /// Returns true if `code` is a literal member of the allow-list.
    pub fn is_acceptable(&self, code: u16) -> bool {
        self.codes.contains(&code)
    }

    /// Iterate over the allowed codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.codes.iter().copied()
    }

    /// Comma-separated list for diagnostics, e.g. `200,201,202,204`.
    pub fn describe(&self) -> String {
        self.codes
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            codes: DEFAULT_STATUS_CODES.into_iter().collect(),
        }
    }
}
