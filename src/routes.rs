//! Maps paths to logical routes and builds breadcrumb trails.

use serde::{Deserialize, Serialize};

use crate::config::RoutesConfig;
use crate::navigation::{Location, path_segments};
use crate::query::escape_component;

/// How to choose among several routes whose prefixes all match a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// The route declared first wins, even if a later one is more specific.
    #[default]
    FirstDeclared,
    LongestPrefix,
}

/// Route key to prefix segments, in declaration order. Fixed after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteIndex {
    routes: Vec<(String, Vec<String>)>,
}

impl RouteIndex {
    pub fn new<K, P>(entries: impl IntoIterator<Item = (K, P)>) -> Self
    where
        K: Into<String>,
        P: AsRef<str>,
    {
        let mut routes: Vec<(String, Vec<String>)> = Vec::new();
        for (key, prefix) in entries {
            let key = key.into();
            if routes.iter().any(|(existing, _)| *existing == key) {
                tracing::warn!(route = %key, "duplicate route key ignored");
                continue;
            }
            routes.push((key, path_segments(prefix.as_ref())));
        }
        Self { routes }
    }

    pub fn from_config(config: &RoutesConfig) -> Self {
        Self::new(
            config
                .entries
                .iter()
                .map(|entry| (entry.key.clone(), entry.prefix.as_str())),
        )
    }

    pub fn prefix(&self, key: &str) -> Option<&[String]> {
        self.routes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, prefix)| prefix.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.routes
            .iter()
            .map(|(key, prefix)| (key.as_str(), prefix.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub key: String,
    pub prefix: Vec<String>,
    pub remainder: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    pub link: String,
    pub current: bool,
}

#[derive(Debug, Clone)]
pub struct PathMatcher {
    index: RouteIndex,
    policy: MatchPolicy,
}

impl PathMatcher {
    pub fn new(index: RouteIndex, policy: MatchPolicy) -> Self {
        Self { index, policy }
    }

    pub fn from_config(config: &RoutesConfig) -> Self {
        Self::new(RouteIndex::from_config(config), config.policy)
    }

    pub fn index(&self) -> &RouteIndex {
        &self.index
    }

    pub fn match_route(&self, segments: &[String]) -> Option<RouteMatch> {
        let mut best: Option<(&str, &[String])> = None;
        for (key, prefix) in self.index.iter() {
            if !is_prefix(prefix, segments) {
                continue;
            }
            match self.policy {
                MatchPolicy::FirstDeclared => {
                    best = Some((key, prefix));
                    break;
                }
                MatchPolicy::LongestPrefix => {
                    if best.is_none_or(|(_, current)| prefix.len() > current.len()) {
                        best = Some((key, prefix));
                    }
                }
            }
        }

        let Some((key, prefix)) = best else {
            tracing::debug!(path = ?segments, "no route matches path");
            return None;
        };
        Some(RouteMatch {
            key: key.to_string(),
            prefix: prefix.to_vec(),
            remainder: segments[prefix.len()..].to_vec(),
        })
    }

    pub fn match_location(&self, location: &Location) -> Option<RouteMatch> {
        self.match_route(&location.segments())
    }

    /// One crumb per remainder segment plus a leading root crumb for the route itself.
    /// Unmatched paths have no trail.
    pub fn breadcrumbs(&self, segments: &[String]) -> Vec<Breadcrumb> {
        let Some(route) = self.match_route(segments) else {
            return Vec::new();
        };

        let mut link = String::new();
        for segment in &route.prefix {
            link.push('/');
            link.push_str(&escape_component(segment));
        }
        let mut crumbs = Vec::with_capacity(route.remainder.len() + 1);
        crumbs.push(Breadcrumb {
            label: route.key.clone(),
            link: if link.is_empty() { "/".to_string() } else { link.clone() },
            current: route.remainder.is_empty(),
        });
        for (index, segment) in route.remainder.iter().enumerate() {
            link.push('/');
            link.push_str(&escape_component(segment));
            crumbs.push(Breadcrumb {
                label: segment.clone(),
                link: link.clone(),
                current: index + 1 == route.remainder.len(),
            });
        }
        crumbs
    }
}

fn is_prefix(prefix: &[String], segments: &[String]) -> bool {
    prefix.len() <= segments.len()
        && prefix
            .iter()
            .zip(segments)
            .all(|(expected, actual)| expected == actual)
}

#[cfg(test)]
mod tests {
    use super::{MatchPolicy, PathMatcher, RouteIndex};
    use crate::navigation::path_segments;

    fn matcher(policy: MatchPolicy) -> PathMatcher {
        PathMatcher::new(
            RouteIndex::new([
                ("directory", "/directory"),
                ("partition", "/directory/partitions"),
                ("file", "/file"),
            ]),
            policy,
        )
    }

    #[test]
    fn first_declared_route_wins_among_matches() {
        let matched = matcher(MatchPolicy::FirstDeclared)
            .match_route(&path_segments("/directory/partitions/p1"))
            .expect("route should match");
        assert_eq!(matched.key, "directory");
        assert_eq!(matched.remainder, ["partitions", "p1"]);
    }

    #[test]
    fn longest_prefix_policy_prefers_specific_route() {
        let matched = matcher(MatchPolicy::LongestPrefix)
            .match_route(&path_segments("/directory/partitions/p1"))
            .expect("route should match");
        assert_eq!(matched.key, "partition");
        assert_eq!(matched.remainder, ["p1"]);
    }

    #[test]
    fn prefix_must_match_every_segment_from_the_start() {
        let matcher = matcher(MatchPolicy::FirstDeclared);
        assert!(matcher.match_route(&path_segments("/files/x")).is_none());
        assert!(matcher.match_route(&path_segments("/x/directory")).is_none());
        assert!(matcher.match_route(&[]).is_none());
    }

    #[test]
    fn breadcrumbs_link_each_prefix_and_mark_last_current() {
        let crumbs = matcher(MatchPolicy::FirstDeclared)
            .breadcrumbs(&path_segments("/directory/home/my%20docs"));
        let links: Vec<&str> = crumbs.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(
            links,
            ["/directory", "/directory/home", "/directory/home/my%20docs"]
        );
        assert_eq!(crumbs[0].label, "directory");
        assert_eq!(crumbs[2].label, "my docs");
        assert_eq!(
            crumbs.iter().map(|c| c.current).collect::<Vec<_>>(),
            [false, false, true]
        );
    }

    #[test]
    fn breadcrumbs_for_route_root_is_single_current_crumb() {
        let crumbs = matcher(MatchPolicy::FirstDeclared).breadcrumbs(&path_segments("/file"));
        assert_eq!(crumbs.len(), 1);
        assert!(crumbs[0].current);
    }
}
