//! Include/exclude resolution against the registered adapter table.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SearchError;
use crate::{Adapter, AdapterRegistry};

/// Policy when a request carries both an include and an exclude list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionConflict {
    /// Use the include list and ignore the exclude list
    #[default]
    PreferInclude,
    /// Refuse the request as invalid
    Reject,
}

/// Adapters chosen for one search, in registration order.
pub struct ResolvedSources {
    pub adapters: Vec<Arc<dyn Adapter>>,
    /// Requested names that matched nothing
    pub unknown: Vec<String>,
}

impl ResolvedSources {
    pub fn ids(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.id()).collect()
    }
}

/// Does a user-supplied name refer to this adapter?
///
/// Case-insensitive match against the id, the display name, or any single
/// word of the display name ("facebook" selects "Facebook Marketplace").
pub fn matches_source(name: &str, adapter: &dyn Adapter) -> bool {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let display = adapter.display_name().to_lowercase();
    adapter.id().to_lowercase() == needle
        || display == needle
        || display.split_whitespace().any(|word| word == needle)
}

/// Resolve the sources to run.
///
/// `include` and `exclude` come from the request, `defaults` from settings
/// and apply only when neither list is given. An empty resolution is an
/// `EmptySourceSelection` error.
pub fn resolve_sources(
    registry: &AdapterRegistry,
    include: Option<&[String]>,
    exclude: Option<&[String]>,
    defaults: Option<&[String]>,
    conflict: SelectionConflict,
) -> Result<ResolvedSources, SearchError> {
    let exclude = exclude.filter(|list| !list.is_empty());

    let resolved = match (include, exclude) {
        (Some(include), Some(exclude)) => match conflict {
            SelectionConflict::PreferInclude => {
                debug!(
                    target: "audiosearch.engine",
                    ignored = ?exclude,
                    "include and exclude both given; using include"
                );
                select_included(registry, include)
            }
            SelectionConflict::Reject => {
                return Err(SearchError::InvalidRequest(
                    "cannot use both include and exclude source lists".to_string(),
                ))
            }
        },
        (Some(include), None) => select_included(registry, include),
        (None, Some(exclude)) => select_remaining(registry, exclude),
        (None, None) => match defaults {
            Some(defaults) => select_included(registry, defaults),
            None => ResolvedSources {
                adapters: registry.iter().cloned().collect(),
                unknown: Vec::new(),
            },
        },
    };

    for name in &resolved.unknown {
        let available: Vec<_> = registry.iter().map(|a| a.display_name()).collect();
        warn!(
            target: "audiosearch.engine",
            site = %name,
            available = %available.join(", "),
            "unrecognized site"
        );
    }

    if resolved.adapters.is_empty() {
        let requested = include
            .or(exclude)
            .or(defaults)
            .map(|list| list.to_vec())
            .unwrap_or_default();
        return Err(SearchError::EmptySourceSelection { requested });
    }

    Ok(resolved)
}

fn select_included(registry: &AdapterRegistry, names: &[String]) -> ResolvedSources {
    let mut chosen = vec![false; registry.len()];
    let mut unknown = Vec::new();

    for name in names {
        match registry
            .iter()
            .position(|adapter| matches_source(name, adapter.as_ref()))
        {
            Some(idx) => chosen[idx] = true,
            None => unknown.push(name.clone()),
        }
    }

    ResolvedSources {
        adapters: registry
            .iter()
            .zip(chosen)
            .filter(|(_, keep)| *keep)
            .map(|(adapter, _)| Arc::clone(adapter))
            .collect(),
        unknown,
    }
}

fn select_remaining(registry: &AdapterRegistry, names: &[String]) -> ResolvedSources {
    let mut dropped = vec![false; registry.len()];
    let mut unknown = Vec::new();

    for name in names {
        match registry
            .iter()
            .position(|adapter| matches_source(name, adapter.as_ref()))
        {
            Some(idx) => dropped[idx] = true,
            None => unknown.push(name.clone()),
        }
    }

    ResolvedSources {
        adapters: registry
            .iter()
            .zip(dropped)
            .filter(|(_, drop)| !*drop)
            .map(|(adapter, _)| Arc::clone(adapter))
            .collect(),
        unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterQuery, ListingSink};
    use crate::error::AdapterError;
    use async_trait::async_trait;

    struct Site(&'static str, &'static str);

    #[async_trait]
    impl Adapter for Site {
        fn id(&self) -> &'static str {
            self.0
        }
        fn display_name(&self) -> &'static str {
            self.1
        }
        fn description(&self) -> &'static str {
            ""
        }
        async fn search(&self, _: &AdapterQuery, _: &mut ListingSink) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn registry() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(Site("blocket", "Blocket"));
        registry.register(Site("tradera", "Tradera"));
        registry.register(Site("facebook", "Facebook Marketplace"));
        registry.register(Site("hifitorget", "HifiTorget"));
        registry
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_selection_uses_every_source() {
        let resolved =
            resolve_sources(&registry(), None, None, None, SelectionConflict::default()).unwrap();
        assert_eq!(
            resolved.ids(),
            vec!["blocket", "tradera", "facebook", "hifitorget"]
        );
    }

    #[test]
    fn test_include_keeps_registration_order() {
        let include = names(&["HifiTorget", "blocket"]);
        let resolved = resolve_sources(
            &registry(),
            Some(&include),
            None,
            None,
            SelectionConflict::default(),
        )
        .unwrap();
        assert_eq!(resolved.ids(), vec!["blocket", "hifitorget"]);
        assert!(resolved.unknown.is_empty());
    }

    #[test]
    fn test_display_name_word_matches() {
        let include = names(&["marketplace"]);
        let resolved = resolve_sources(
            &registry(),
            Some(&include),
            None,
            None,
            SelectionConflict::default(),
        )
        .unwrap();
        assert_eq!(resolved.ids(), vec!["facebook"]);
    }

    #[test]
    fn test_exclude_removes_matches_and_reports_unknown() {
        let exclude = names(&["Tradera", "facebook", "ebay"]);
        let resolved = resolve_sources(
            &registry(),
            None,
            Some(&exclude),
            None,
            SelectionConflict::default(),
        )
        .unwrap();
        assert_eq!(resolved.ids(), vec!["blocket", "hifitorget"]);
        assert_eq!(resolved.unknown, vec!["ebay".to_string()]);
    }

    #[test]
    fn test_exclude_drops_only_first_match() {
        let mut registry = AdapterRegistry::new();
        registry.register(Site("facebook", "Facebook Marketplace"));
        registry.register(Site("amazon", "Amazon Marketplace"));

        let exclude = names(&["marketplace"]);
        let resolved = resolve_sources(
            &registry,
            None,
            Some(&exclude),
            None,
            SelectionConflict::default(),
        )
        .unwrap();
        assert_eq!(resolved.ids(), vec!["amazon"]);
        assert!(resolved.unknown.is_empty());
    }

    #[test]
    fn test_include_wins_over_exclude_by_default() {
        let include = names(&["tradera"]);
        let exclude = names(&["tradera"]);
        let resolved = resolve_sources(
            &registry(),
            Some(&include),
            Some(&exclude),
            None,
            SelectionConflict::PreferInclude,
        )
        .unwrap();
        assert_eq!(resolved.ids(), vec!["tradera"]);
    }

    #[test]
    fn test_reject_policy_refuses_both_lists() {
        let include = names(&["tradera"]);
        let exclude = names(&["blocket"]);
        let err = resolve_sources(
            &registry(),
            Some(&include),
            Some(&exclude),
            None,
            SelectionConflict::Reject,
        )
        .err()
        .unwrap();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_include_is_empty_selection() {
        let include: Vec<String> = Vec::new();
        let err = resolve_sources(
            &registry(),
            Some(&include),
            None,
            None,
            SelectionConflict::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SearchError::EmptySourceSelection { .. }));
    }

    #[test]
    fn test_mistyped_include_is_empty_selection() {
        let include = names(&["blockett"]);
        let err = resolve_sources(
            &registry(),
            Some(&include),
            None,
            None,
            SelectionConflict::default(),
        )
        .err()
        .unwrap();
        match err {
            SearchError::EmptySourceSelection { requested } => {
                assert_eq!(requested, vec!["blockett".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults_apply_without_selection() {
        let defaults = names(&["hifitorget"]);
        let resolved = resolve_sources(
            &registry(),
            None,
            None,
            Some(&defaults),
            SelectionConflict::default(),
        )
        .unwrap();
        assert_eq!(resolved.ids(), vec!["hifitorget"]);
    }
}
