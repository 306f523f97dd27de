//! SSH key material for multi-node trials and interactive shells

use marshal_archive::{path, Archive, ItemKind, RunArchive};
use marshal_common::{AgentUserGroup, SSH_DIR};
use serde::{Deserialize, Serialize};

use crate::assets::Script;

/// A generated key pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeys {
    /// PEM-encoded private key
    pub private_key: String,
    /// OpenSSH public key line
    pub public_key: String,
}

impl std::fmt::Debug for SshKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshKeys")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl SshKeys {
    /// The SSH directory, keys, client config, and sshd config.
    ///
    /// Everything is owned by the task user since sshd refuses keys it does
    /// not consider private to that user.
    pub fn run_archive(&self, owner: &AgentUserGroup) -> RunArchive {
        let file = |name: &str| path::join(SSH_DIR, name);
        let client_config = format!(
            "Host *\n    StrictHostKeyChecking no\n    IdentityFile {}\n",
            file("id_rsa")
        );

        Archive::new(vec![
            owner.owned_item(SSH_DIR, ItemKind::Directory, 0o700),
            owner.owned_item(file("authorized_keys"), ItemKind::file(self.public_key.as_str()), 0o644),
            owner.owned_item(file("id_rsa"), ItemKind::file(self.private_key.as_str()), 0o600),
            owner.owned_item(file("id_rsa.pub"), ItemKind::file(self.public_key.as_str()), 0o644),
            owner.owned_item(file("config"), ItemKind::file(client_config), 0o644),
            owner.owned_item(
                file(Script::SshdConfig.name()),
                ItemKind::file(Script::SshdConfig.contents()),
                0o644,
            ),
        ])
        .mounted_at("/")
    }
}
