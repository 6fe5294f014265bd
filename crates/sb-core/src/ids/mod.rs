//! Typed identifiers used across the persistence core.

mod id_macro;

use serde::{Deserialize, Serialize};

use id_macro::impl_id;

/// Stable identifier of a storyboard project.
///
/// Project ids are minted once (uuid v4) and never change; every
/// project-scoped storage key embeds this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

/// Identifier of a single background sync queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncItemId(String);

impl_id!(ProjectId, SyncItemId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_ids_are_unique() {
        assert_ne!(ProjectId::new(), ProjectId::new());
    }

    #[test]
    fn project_id_from_str_round_trips() {
        let id: ProjectId = "p1".into();
        assert_eq!(id.as_str(), "p1");
        assert_eq!(id.to_string(), "p1");
    }
}
