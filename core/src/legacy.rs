//! Deprecated hub loader.
//!
//! The GitHub-hosted prompt hub is gone. Callers still hand us `lc://` paths,
//! so the loader warns and declines; a `None` tells the caller to treat the
//! value as a filesystem path instead.

use tracing::warn;

/// Prefix of paths that used to resolve against the hub
pub const LEGACY_HUB_PREFIX: &str = "lc://";

/// Always returns `None`. Emits a deprecation warning when `path` is a legacy hub path.
pub fn try_load_from_hub<T>(path: &str) -> Option<T> {
    if is_legacy_hub_path(path) {
        warn!(
            target: "legacy",
            path = %path,
            "Loading from the deprecated github-based hub is no longer supported; falling back to the filesystem"
        );
    }
    None
}

pub fn is_legacy_hub_path(path: &str) -> bool {
    path.starts_with(LEGACY_HUB_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptTemplate;

    #[test]
    fn known_legacy_name_yields_none() {
        let loaded: Option<PromptTemplate> =
            try_load_from_hub("lc://prompts/hello-world/prompt.yaml");
        assert!(loaded.is_none());
    }

    #[test]
    fn plain_paths_also_yield_none() {
        assert!(try_load_from_hub::<String>("prompts/planner.txt").is_none());
        assert!(!is_legacy_hub_path("prompts/planner.txt"));
        assert!(is_legacy_hub_path("lc://chains/llm-math/chain.json"));
    }
}
