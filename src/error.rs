//! Error types for grid operations.

use thiserror::Error;

use crate::grid::types::{NodeId, Role};

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Contract violations raised by the energy grid.
///
/// Capped pools, exhausted participants and accounting anomalies are ordinary
/// steady states and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// The live set of `role` was mutated (or a second pass started) while a
    /// pass over it is running.
    #[error("cannot modify the {role} set while a {role} pass is active")]
    PassActive { role: Role },

    /// A node joined a grid it is already a member of.
    #[error("{0} has already joined the grid")]
    NodeAlreadyJoined(NodeId),

    /// A lifecycle event referenced a node that is not a member.
    #[error("{0} is not a member of the grid")]
    UnknownNode(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_active_names_the_role() {
        let err = GridError::PassActive {
            role: Role::Consumer,
        };
        assert_eq!(
            err.to_string(),
            "cannot modify the consumer set while a consumer pass is active"
        );
    }

    #[test]
    fn unknown_node_mentions_id() {
        let err = GridError::UnknownNode(NodeId(7));
        assert!(err.to_string().contains("node#7"));
    }
}
