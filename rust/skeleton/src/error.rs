// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for skeleton computation.

/// Result type alias for skeleton operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while computing a straight skeleton.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mesh operation failed on the working copy.
    #[error(transparent)]
    Mesh(#[from] straightskel_mesh::Error),

    /// A predicate the event depends on had no answer.
    #[error("degenerate {event} event: no {what}")]
    Degenerate {
        event: &'static str,
        what: &'static str,
    },

    /// The input mesh cannot be offset.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// More events than the configured limit were handled.
    #[error("event limit of {0} exceeded")]
    EventLimit(usize),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON export failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn degenerate(event: &'static str, what: &'static str) -> Self {
        Error::Degenerate { event, what }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_message_names_event() {
        let e = Error::degenerate("edge", "sheet intersection");
        assert_eq!(e.to_string(), "degenerate edge event: no sheet intersection");
    }

    #[test]
    fn mesh_errors_convert() {
        let e: Error = straightskel_mesh::Error::TooFewVertices(2).into();
        assert!(matches!(e, Error::Mesh(_)));
    }
}
