//! Builds the set of workspaces a user may select.

use std::collections::HashSet;

use super::model::Workspace;

/// Merges owned and member workspaces into the accessible set.
///
/// Owned workspaces come first, then member workspaces, each in the order
/// given. Duplicates (same id) keep their first occurrence. Archived
/// workspaces are dropped.
pub fn accessible_workspaces(owned: Vec<Workspace>, member: Vec<Workspace>) -> Vec<Workspace> {
    let mut seen = HashSet::new();
    owned
        .into_iter()
        .chain(member)
        .filter(|ws| !ws.archived)
        .filter(|ws| seen.insert(ws.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(id: &str) -> Workspace {
        Workspace::new(id, "owner", format!("Workspace {id}"))
    }

    #[test]
    fn test_owned_first_then_member() {
        let set = accessible_workspaces(vec![ws("w2")], vec![ws("w1"), ws("w3")]);
        let ids: Vec<_> = set.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["w2", "w1", "w3"]);
    }

    #[test]
    fn test_deduplicates_by_id() {
        let set = accessible_workspaces(vec![ws("w1")], vec![ws("w1"), ws("w2")]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_excludes_archived() {
        let mut archived = ws("w1");
        archived.archived = true;
        let set = accessible_workspaces(vec![archived], vec![ws("w2")]);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].id, "w2");
    }
}
