use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::revision::Revision;

/// DAG of revisions keyed by commit id. Edges point from child to parent.
///
/// Only the builder mutates structure. Afterwards the graph is shared
/// read-only; revisions still fill their own build/test caches.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryGraph {
    revisions: HashMap<String, Revision>,
    children: HashMap<String, Vec<String>>,
    /// Resolved commits in the order they left the ready set.
    resolution_order: Vec<String>,
    tip: Option<String>,
    /// Revision expressions the graph was requested with, mapped to the ids they name.
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl HistoryGraph {
    pub(crate) fn set_tip(&mut self, tip: &str) {
        self.tip = Some(tip.to_string());
    }

    pub(crate) fn add_alias(&mut self, alias: &str, id: &str) {
        if alias != id {
            self.aliases.insert(alias.to_string(), id.to_string());
        }
    }

    pub(crate) fn insert(&mut self, revision: Revision) {
        for parent in revision.parent_ids() {
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(revision.id().to_string());
        }
        if !revision.is_placeholder() {
            self.resolution_order.push(revision.id().to_string());
        }
        self.revisions.insert(revision.id().to_string(), revision);
    }

    /// Look up a revision by id, or by the start or end expression the
    /// graph was built from.
    pub fn get(&self, id: &str) -> Option<&Revision> {
        self.revisions
            .get(id)
            .or_else(|| self.revisions.get(self.aliases.get(id)?))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The commit id an alias such as `HEAD~2` stood for when the graph was built.
    pub fn canonical_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map_or(id, String::as_str)
    }

    /// Resolved revisions plus placeholders.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// The start commit the graph was built from.
    pub fn tip(&self) -> Option<&Revision> {
        self.tip.as_deref().and_then(|tip| self.get(tip))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Revision> {
        self.revisions.values()
    }

    pub fn resolution_order(&self) -> &[String] {
        &self.resolution_order
    }

    /// Resolved revisions, parents before children.
    pub fn resolved(&self) -> impl Iterator<Item = &Revision> {
        self.resolution_order.iter().filter_map(|id| self.get(id))
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Revision> {
        self.revisions.values().filter(|revision| revision.is_placeholder())
    }

    pub fn parents(&self, id: &str) -> Vec<&Revision> {
        self.get(id)
            .map(|revision| revision.parent_ids().filter_map(|parent| self.get(parent)).collect())
            .unwrap_or_default()
    }

    pub fn children(&self, id: &str) -> Vec<&Revision> {
        self.children
            .get(self.canonical_id(id))
            .map(|children| children.iter().filter_map(|child| self.get(child)).collect())
            .unwrap_or_default()
    }

    /// Every revision reachable through parent edges, nearest first. Excludes `id`.
    pub fn ancestors(&self, id: &str) -> Vec<&Revision> {
        self.walk(id, |id| self.parents(id))
    }

    /// Every revision reachable through child edges, nearest first. Excludes `id`.
    pub fn descendants(&self, id: &str) -> Vec<&Revision> {
        self.walk(id, |id| self.children(id))
    }

    fn walk<'a, F>(&'a self, id: &str, next: F) -> Vec<&'a Revision>
    where
        F: Fn(&str) -> Vec<&'a Revision>,
    {
        let id = self.canonical_id(id);
        let mut seen = HashSet::from([id.to_string()]);
        let mut queue = VecDeque::from([id.to_string()]);
        let mut found = vec![];

        while let Some(current) = queue.pop_front() {
            for revision in next(&current) {
                if seen.insert(revision.id().to_string()) {
                    queue.push_back(revision.id().to_string());
                    found.push(revision);
                }
            }
        }

        found
    }
}
