//! Runtime identity of a task

use marshal_archive::{Item, ItemKind};
use serde::{Deserialize, Serialize};

/// The uid/gid and names a task runs as inside its container.
///
/// Items built through [`AgentUserGroup::owned_item`] belong to this identity
/// and are writable by the task; root-owned items are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUserGroup {
    /// User id
    pub uid: u32,
    /// Group id
    pub gid: u32,
    /// User name (also the HPC launcher's impersonated user)
    pub user: String,
    /// Group name
    pub group: String,
}

impl Default for AgentUserGroup {
    fn default() -> Self {
        Self {
            uid: 0,
            gid: 0,
            user: "root".to_string(),
            group: "root".to_string(),
        }
    }
}

impl AgentUserGroup {
    /// Create an identity
    pub fn new(uid: u32, gid: u32, user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            uid,
            gid,
            user: user.into(),
            group: group.into(),
        }
    }

    /// Returns true for uid 0 and gid 0
    pub fn is_root(&self) -> bool {
        self.uid == 0 && self.gid == 0
    }

    /// Container `User` string: empty for root, otherwise `uid:gid`
    pub fn ownership(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}:{}", self.uid, self.gid)
        }
    }

    /// Archive item owned by this identity
    pub fn owned_item(&self, path: impl Into<String>, kind: ItemKind, mode: u32) -> Item {
        Item::user_owned(path, kind, mode, self.uid, self.gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_string() {
        assert_eq!(AgentUserGroup::default().ownership(), "");
        assert_eq!(AgentUserGroup::new(1000, 100, "alice", "users").ownership(), "1000:100");
    }

    #[test]
    fn owned_items_carry_ids() {
        let aug = AgentUserGroup::new(504, 20, "crayuser", "staff");
        let item = aug.owned_item("/run/determined/workdir", ItemKind::Directory, 0o700);
        assert_eq!((item.uid, item.gid), (504, 20));
        assert!(!item.is_root_owned());
    }
}
