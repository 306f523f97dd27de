//! PBS `qsub` options

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::WlmError;
use crate::WorkloadManager;

const FORBIDDEN: &[&str] = &[
    "-I", "-J", "-N", "-o", "-e", "-j", "-q", "-r", "-u", "-V", "-W", "-X", "-C", "-S", "-z",
];

const RESOURCE_FLAG: &str = "-l";

/// `place=arrangement[:sharing[:grouping]]`
static PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^place=[a-z]+(:[a-z]+(=[A-Za-z0-9_]+)?){0,2}$").expect("valid place pattern")
});

/// `resource=value[,resource=value...]`
static RESOURCE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=[^,=\s]+(,[A-Za-z_][A-Za-z0-9_]*=[^,=\s]+)*$")
        .expect("valid resource list pattern")
});

/// Validate raw PBS options, returning every violation found.
///
/// Unlike Slurm, a forbidden flag is also caught when it appears as its own
/// token later in the option, since `qsub` options are often bundled into one
/// string. Each forbidden flag is reported at most once per option. Every
/// `-l` value must be a resource list or a placement; `select` is never
/// accepted.
pub fn validate_pbs<S: AsRef<str>>(options: &[S]) -> Vec<WlmError> {
    let mut errors = Vec::new();
    for option in options {
        let option = option.as_ref().trim();

        let flagged: BTreeSet<&str> = FORBIDDEN
            .iter()
            .copied()
            .filter(|flag| {
                option.starts_with(flag) || option.split_whitespace().any(|token| token == *flag)
            })
            .collect();
        errors.extend(
            FORBIDDEN
                .iter()
                .filter(|flag| flagged.contains(*flag))
                .map(|flag| WlmError::not_configurable(WorkloadManager::Pbs, flag)),
        );

        for value in resource_values(option) {
            if let Some(error) = check_resource(option, value) {
                errors.push(error);
            }
        }
    }
    errors
}

/// Values given to `-l`, either as the next token or attached (`-lncpus=4`)
fn resource_values(option: &str) -> Vec<&str> {
    let mut values = Vec::new();
    let mut tokens = option.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == RESOURCE_FLAG {
            values.push(tokens.next().unwrap_or_default());
        } else if let Some(attached) = token.strip_prefix(RESOURCE_FLAG) {
            values.push(attached);
        }
    }
    values
}

fn check_resource(option: &str, value: &str) -> Option<WlmError> {
    let selects = value
        .split(',')
        .any(|entry| entry.split('=').next() == Some("select"));
    if selects {
        return Some(WlmError::PbsSelect {
            option: option.to_string(),
        });
    }
    if PLACE.is_match(value) || RESOURCE_LIST.is_match(value) {
        return None;
    }
    Some(WlmError::PbsResourceSyntax {
        value: value.to_string(),
    })
}
