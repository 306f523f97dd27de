//! Scripts embedded at build time and copied into task containers

use marshal_archive::{Item, ItemKind};

/// A script or config file shipped inside task containers.
///
/// Contents are compiled into the binary, so a missing asset fails the build
/// rather than a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    /// Trial entrypoint wrapper
    TrialEntrypoint,
    /// Checkpoint GC entrypoint
    GcCheckpointsEntrypoint,
    /// Entrypoint for commands, notebooks, tensorboards, and generic tasks
    CommandEntrypoint,
    /// Entrypoint for interactive shells (starts sshd)
    ShellEntrypoint,
    /// Sourced by entrypoints to tag output streams
    TaskLoggingSetup,
    /// Sourced on exit to drain the output streams
    TaskLoggingTeardown,
    /// Sourced by entrypoints to forward termination signals
    TaskSignalHandling,
    /// sshd configuration for trials and shells
    SshdConfig,
}

impl Script {
    /// File name of the asset
    pub fn name(self) -> &'static str {
        match self {
            Self::TrialEntrypoint => "entrypoint.sh",
            Self::GcCheckpointsEntrypoint => "gc-checkpoints-entrypoint.sh",
            Self::CommandEntrypoint => "command-entrypoint.sh",
            Self::ShellEntrypoint => "shell-entrypoint.sh",
            Self::TaskLoggingSetup => "task-logging-setup.sh",
            Self::TaskLoggingTeardown => "task-logging-teardown.sh",
            Self::TaskSignalHandling => "task-signal-handling.sh",
            Self::SshdConfig => "sshd_config",
        }
    }

    /// Embedded content
    pub fn contents(self) -> &'static [u8] {
        match self {
            Self::TrialEntrypoint => include_bytes!("../assets/entrypoint.sh"),
            Self::GcCheckpointsEntrypoint => include_bytes!("../assets/gc-checkpoints-entrypoint.sh"),
            Self::CommandEntrypoint => include_bytes!("../assets/command-entrypoint.sh"),
            Self::ShellEntrypoint => include_bytes!("../assets/shell-entrypoint.sh"),
            Self::TaskLoggingSetup => include_bytes!("../assets/task-logging-setup.sh"),
            Self::TaskLoggingTeardown => include_bytes!("../assets/task-logging-teardown.sh"),
            Self::TaskSignalHandling => include_bytes!("../assets/task-signal-handling.sh"),
            Self::SshdConfig => include_bytes!("../assets/sshd_config"),
        }
    }

    /// Permission bits the asset is installed with
    pub fn mode(self) -> u32 {
        match self {
            Self::TrialEntrypoint => 0o744,
            Self::SshdConfig => 0o644,
            _ => 0o755,
        }
    }

    /// Root-owned archive item for the asset at `path`
    pub fn item_at(self, path: impl Into<String>) -> Item {
        Item::root_owned(path, ItemKind::file(self.contents()), self.mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Script; 8] = [
        Script::TrialEntrypoint,
        Script::GcCheckpointsEntrypoint,
        Script::CommandEntrypoint,
        Script::ShellEntrypoint,
        Script::TaskLoggingSetup,
        Script::TaskLoggingTeardown,
        Script::TaskSignalHandling,
        Script::SshdConfig,
    ];

    #[test]
    fn every_asset_is_non_empty() {
        for script in ALL {
            assert!(!script.contents().is_empty(), "{}", script.name());
        }
    }

    #[test]
    fn entrypoints_are_shell_scripts() {
        for script in [
            Script::TrialEntrypoint,
            Script::GcCheckpointsEntrypoint,
            Script::CommandEntrypoint,
            Script::ShellEntrypoint,
        ] {
            assert!(script.contents().starts_with(b"#!"), "{}", script.name());
        }
    }

    #[test]
    fn items_are_root_owned() {
        let item = Script::CommandEntrypoint.item_at("/run/determined/command-entrypoint.sh");
        assert!(item.is_root_owned());
        assert_eq!(item.mode, 0o755);
        assert_eq!(item.content(), Script::CommandEntrypoint.contents());
    }
}
