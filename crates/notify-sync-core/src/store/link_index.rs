//! Reverse index from navigation path to unread notification ids.
//!
//! Lets the navigation watcher answer "does this page clear anything?" with a
//! map lookup instead of scanning the notification list on every route change.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use url::{form_urlencoded, Url};

use crate::config::QueryIdentityRoute;
use crate::models::UnreadLink;

fn base_url() -> &'static Url {
    static BASE: OnceLock<Url> = OnceLock::new();
    BASE.get_or_init(|| Url::parse("http://localhost/").unwrap())
}

fn trim_path(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Normalize a link to the key used by the index.
///
/// Scheme, host and fragment are dropped and trailing slashes trimmed. The
/// query string survives only for routes listed in `routes`, reduced to the
/// listed keys and sorted so equivalent links compare equal.
pub fn normalize_link(link: &str, routes: &[QueryIdentityRoute]) -> String {
    let parsed = match Url::options().base_url(Some(base_url())).parse(link.trim()) {
        Ok(url) => url,
        Err(_) => {
            // Unparseable links still get a stable key
            let path = link.split(['?', '#']).next().unwrap_or_default();
            let path = trim_path(path);
            return if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            };
        }
    };

    let path = trim_path(parsed.path());
    let Some(route) = routes.iter().find(|r| trim_path(&r.path) == path) else {
        return path.to_string();
    };

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| route.keys.iter().any(|k| k == key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return path.to_string();
    }
    pairs.sort();

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{}?{}", path, query)
}

#[derive(Debug, Default)]
pub struct LinkIndex {
    /// normalized link -> unread notification ids
    entries: HashMap<String, HashSet<String>>,
    routes: Vec<QueryIdentityRoute>,
}

impl LinkIndex {
    pub fn new(routes: Vec<QueryIdentityRoute>) -> Self {
        Self {
            entries: HashMap::new(),
            routes,
        }
    }

    pub fn normalize(&self, link: &str) -> String {
        normalize_link(link, &self.routes)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // ===== Getters =====

    pub fn ids_for(&self, path: &str) -> Option<&HashSet<String>> {
        self.entries.get(&self.normalize(path))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.ids_for(path).is_some()
    }

    /// Normalized path currently holding `id`
    pub fn path_of(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, ids)| ids.contains(id))
            .map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &HashSet<String>)> {
        self.entries.iter().map(|(path, ids)| (path.as_str(), ids))
    }

    // ===== Mutations =====

    /// Replace the whole index. If an id is listed under several links the
    /// last one wins.
    pub fn rebuild_from_server_list(&mut self, links: &[UnreadLink]) {
        let mut by_id: HashMap<&str, String> = HashMap::with_capacity(links.len());
        for entry in links.iter().filter(|l| !l.link.trim().is_empty()) {
            by_id.insert(entry.uid.as_str(), self.normalize(&entry.link));
        }

        self.entries.clear();
        for (id, path) in by_id {
            self.entries.entry(path).or_default().insert(id.to_string());
        }
    }

    /// Links that are empty never match a page and are not indexed
    pub fn add(&mut self, id: &str, link: &str) {
        self.remove(id);
        if link.trim().is_empty() {
            return;
        }
        let path = self.normalize(link);
        self.entries.entry(path).or_default().insert(id.to_string());
    }

    /// Linear in the number of distinct links
    pub fn remove(&mut self, id: &str) -> bool {
        let mut removed = false;
        self.entries.retain(|_, ids| {
            removed |= ids.remove(id);
            !ids.is_empty()
        });
        removed
    }

    /// Detach and return every id registered for `path`
    pub fn take(&mut self, path: &str) -> Option<HashSet<String>> {
        let key = self.normalize(path);
        self.entries.remove(&key)
    }
}
