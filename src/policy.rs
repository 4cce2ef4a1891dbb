//! Choosing which project should be active when the caller does not say.
//!
//! Precedence: the focused editor's project (when activate-on-focus is on),
//! then the currently active project, then the last active project from a
//! previous session, then the first candidate in enumeration order.

use std::path::Path;

use crate::types::ProjectDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub activate_on_focus: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            activate_on_focus: true,
        }
    }
}

impl SelectionPolicy {
    pub fn new(activate_on_focus: bool) -> Self {
        Self { activate_on_focus }
    }

    /// Pick the project that should be active, or `None` when there are no
    /// candidates.
    pub fn resolve(
        &self,
        candidates: &[ProjectDirectory],
        focused: Option<&ProjectDirectory>,
        current: Option<&ProjectDirectory>,
        persisted: Option<&ProjectDirectory>,
    ) -> Option<ProjectDirectory> {
        let known = |dir: &&ProjectDirectory| candidates.contains(dir);

        if self.activate_on_focus {
            if let Some(dir) = focused.filter(known) {
                return Some(dir.clone());
            }
        }

        current
            .filter(known)
            .or_else(|| persisted.filter(known))
            .or_else(|| candidates.first())
            .cloned()
    }
}

/// The deepest candidate containing `path`.
///
/// Nested projects win over their parents.
pub fn project_for_path(candidates: &[ProjectDirectory], path: &Path) -> Option<ProjectDirectory> {
    candidates
        .iter()
        .filter(|dir| dir.contains(path))
        .max_by_key(|dir| dir.depth())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(names: &[&str]) -> Vec<ProjectDirectory> {
        names.iter().map(|n| ProjectDirectory::new(*n)).collect()
    }

    #[test]
    fn test_focus_wins() {
        let candidates = dirs(&["/ws/proj1", "/ws/proj2", "/ws/proj3"]);
        let policy = SelectionPolicy::default();

        let picked = policy.resolve(
            &candidates,
            Some(&candidates[2]),
            Some(&candidates[1]),
            Some(&candidates[0]),
        );
        assert_eq!(picked, Some(candidates[2].clone()));
    }

    #[test]
    fn test_focus_ignored_when_disabled() {
        let candidates = dirs(&["/ws/proj1", "/ws/proj2"]);
        let policy = SelectionPolicy::new(false);

        let picked = policy.resolve(&candidates, Some(&candidates[1]), None, None);
        assert_eq!(picked, Some(candidates[0].clone()));
    }

    #[test]
    fn test_focus_outside_candidates_falls_through() {
        let candidates = dirs(&["/ws/proj1", "/ws/proj2"]);
        let outsider = ProjectDirectory::new("/elsewhere");
        let policy = SelectionPolicy::default();

        let picked = policy.resolve(&candidates, Some(&outsider), Some(&candidates[1]), None);
        assert_eq!(picked, Some(candidates[1].clone()));
    }

    #[test]
    fn test_current_preferred_over_history() {
        let candidates = dirs(&["/ws/proj1", "/ws/proj2", "/ws/proj3"]);
        let policy = SelectionPolicy::default();

        let picked = policy.resolve(&candidates, None, Some(&candidates[1]), Some(&candidates[2]));
        assert_eq!(picked, Some(candidates[1].clone()));
    }

    #[test]
    fn test_history_used_when_current_vanished() {
        let candidates = dirs(&["/ws/proj1", "/ws/proj2"]);
        let gone = ProjectDirectory::new("/ws/removed");
        let policy = SelectionPolicy::default();

        let picked = policy.resolve(&candidates, None, Some(&gone), Some(&candidates[1]));
        assert_eq!(picked, Some(candidates[1].clone()));
    }

    #[test]
    fn test_enumeration_order_default() {
        let candidates = dirs(&["proj1", "proj2"]);
        let policy = SelectionPolicy::default();

        assert_eq!(
            policy.resolve(&candidates, None, None, None),
            Some(ProjectDirectory::new("proj1"))
        );
        assert_eq!(policy.resolve(&[], None, None, None), None);
    }

    #[test]
    fn test_project_for_path_prefers_nested() {
        let candidates = dirs(&["/ws/mono", "/ws/mono/firmware", "/ws/other"]);

        assert_eq!(
            project_for_path(&candidates, Path::new("/ws/mono/firmware/src/main.c")),
            Some(ProjectDirectory::new("/ws/mono/firmware"))
        );
        assert_eq!(
            project_for_path(&candidates, Path::new("/ws/mono/README.md")),
            Some(ProjectDirectory::new("/ws/mono"))
        );
        assert_eq!(project_for_path(&candidates, Path::new("/tmp/x.c")), None);
    }
}
