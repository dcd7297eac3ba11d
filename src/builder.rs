//! Windowed topological construction of a `HistoryGraph` from a commit log.
//!
//! The window is the log from the start commit back to the end commit,
//! inclusive. In-degrees only count parents inside the window, so commits
//! whose parents all lie outside it are ready immediately and the whole
//! repository history never has to be loaded. Parents outside the window
//! become placeholders.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use tracing::{debug, warn};

use crate::diff::DiffFile;
use crate::error::Result;
use crate::graph::HistoryGraph;
use crate::revision::{ParentDiff, Revision};
use crate::vcs::LogEntry;

/// Log entries from the start commit down to and including the end commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogWindow {
    entries: Vec<LogEntry>,
}

impl LogWindow {
    /// Consume `log` (most recent first) until `end` is seen. If it never is,
    /// the whole log is kept.
    pub fn new(log: Vec<LogEntry>, end: &str) -> Self {
        let mut entries = vec![];

        for entry in log {
            let is_end = entry.id == end;
            entries.push(entry);
            if is_end {
                return LogWindow { entries };
            }
        }

        warn!(end, commits = entries.len(), "End commit not found in log, using the whole log");
        LogWindow { entries }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn tip(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.id.as_str())
    }
}

/// Parent and child adjacency restricted to ids seen in a window.
#[derive(Debug, Default)]
struct Adjacency {
    children: HashMap<String, Vec<String>>,
    parents: HashMap<String, Vec<String>>,
}

impl Adjacency {
    fn new(window: &LogWindow) -> Self {
        let mut adjacency = Adjacency::default();

        for entry in window.entries() {
            // Every commit gets a child list, the tip an empty one.
            adjacency.children.entry(entry.id.clone()).or_default();
            adjacency
                .parents
                .insert(entry.id.clone(), entry.parents.clone());
        }

        for entry in window.entries() {
            for parent in &entry.parents {
                if let Some(children) = adjacency.children.get_mut(parent) {
                    children.push(entry.id.clone());
                }
            }
        }

        adjacency
    }

    fn in_window(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Count of each commit's parents that are themselves in the window.
    fn in_degrees(&self) -> HashMap<String, usize> {
        self.parents
            .iter()
            .map(|(id, parents)| {
                let degree = parents.iter().filter(|parent| self.in_window(parent)).count();
                (id.clone(), degree)
            })
            .collect()
    }
}

/// Build a graph from `log` bounded by `end`. `diff(parent, child)` lists the
/// files changed going from a parent to its child.
pub fn construct<F>(
    log: Vec<LogEntry>,
    end: &str,
    repository: &Path,
    mut diff: F,
) -> Result<HistoryGraph>
where
    F: FnMut(&str, &str) -> Result<Vec<DiffFile>>,
{
    let window = LogWindow::new(log, end);
    let adjacency = Adjacency::new(&window);
    let mut in_degree = adjacency.in_degrees();

    let mut graph = HistoryGraph::default();
    if let Some(tip) = window.tip() {
        graph.set_tip(tip);
    }

    let mut ready: VecDeque<String> = window
        .entries()
        .iter()
        .filter(|entry| in_degree.get(&entry.id) == Some(&0))
        .map(|entry| entry.id.clone())
        .collect();

    while let Some(commit) = ready.pop_front() {
        if graph.get(&commit).is_some_and(|revision| !revision.is_placeholder()) {
            continue;
        }

        let mut parents = vec![];
        for parent in adjacency.parents.get(&commit).into_iter().flatten() {
            if !graph.contains(parent) {
                debug!(commit = %parent, child = %commit, "Adding placeholder for parent outside window");
                graph.insert(Revision::placeholder(parent.as_str(), repository));
            }

            parents.push(ParentDiff {
                parent: parent.clone(),
                files: diff(parent.as_str(), commit.as_str())?,
            });
        }

        debug!(commit = %commit, parents = parents.len(), "Resolved revision");
        graph.insert(Revision::resolved(commit.as_str(), repository, parents));

        for child in adjacency.children.get(&commit).into_iter().flatten() {
            let Some(degree) = in_degree.get_mut(child) else {
                continue;
            };
            match degree.checked_sub(1) {
                Some(remaining) => {
                    *degree = remaining;
                    if remaining == 0 {
                        ready.push_back(child.clone());
                    }
                }
                None => warn!(
                    commit = %child,
                    parent = %commit,
                    "Commit log lists an edge twice, skipping the repeat"
                ),
            }
        }
    }

    let unresolved = adjacency
        .parents
        .keys()
        .filter(|id| graph.get(id).map_or(true, Revision::is_placeholder))
        .count();
    if unresolved != 0 {
        warn!(unresolved, "Commit log contains a cycle, some commits were never resolved");
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_stops_at_end_commit_inclusive() {
        let log = vec![
            LogEntry::new("c4", ["c3"]),
            LogEntry::new("c3", ["c2"]),
            LogEntry::new("c2", ["c1"]),
            LogEntry::new("c1", Vec::<String>::new()),
        ];
        let window = LogWindow::new(log, "c3");

        assert_eq!(window.tip(), Some("c4"));
        assert_eq!(
            window.entries().iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["c4", "c3"]
        );
    }

    #[test]
    fn window_keeps_whole_log_without_end() {
        let log = vec![LogEntry::new("c2", ["c1"]), LogEntry::new("c1", Vec::<String>::new())];
        assert_eq!(LogWindow::new(log, "missing").entries().len(), 2);
    }

    #[test]
    fn duplicate_log_entries_resolve_each_commit_once() {
        let log = vec![
            LogEntry::new("b", ["a"]),
            LogEntry::new("b", ["a"]),
            LogEntry::new("a", Vec::<String>::new()),
        ];
        let graph = construct(log, "a", Path::new("/repo"), |_, _| Ok(vec![])).unwrap();

        assert_eq!(graph.resolution_order(), ["a", "b"]);
        assert_eq!(graph.get("b").unwrap().parent_ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn repeated_parent_yields_one_diff_per_listed_parent() {
        let log = vec![
            LogEntry::new("m", ["a", "a"]),
            LogEntry::new("a", Vec::<String>::new()),
        ];
        let graph = construct(log, "a", Path::new("/repo"), |_, _| Ok(vec![])).unwrap();

        assert_eq!(graph.resolution_order(), ["a", "m"]);
        assert_eq!(graph.get("m").unwrap().parent_diffs().len(), 2);
    }

    #[test]
    fn in_degree_counts_only_parents_in_window() {
        let window = LogWindow::new(
            vec![
                LogEntry::new("m", ["a", "b"]),
                LogEntry::new("b", ["outside"]),
                LogEntry::new("a", ["b"]),
            ],
            "a",
        );
        let adjacency = Adjacency::new(&window);
        let in_degree = adjacency.in_degrees();

        assert_eq!(in_degree["m"], 2);
        assert_eq!(in_degree["b"], 0);
        assert_eq!(in_degree["a"], 1);
        assert!(adjacency.children["m"].is_empty());
        assert_eq!(adjacency.children["b"].len(), 2);
    }
}
