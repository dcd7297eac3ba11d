use std::fmt::Write;

use crate::diff::ChangeType;
use crate::graph::HistoryGraph;
use crate::outcome::CompileState;
use crate::revision::Revision;

pub fn glyph(revision: &Revision) -> char {
    if revision.is_placeholder() {
        return '?';
    }
    match revision.cached_compile_state() {
        CompileState::Yes => 'Y',
        CompileState::No => 'N',
        CompileState::NoBuildFile => '-',
        CompileState::Unknown => '.',
    }
}

/// One glyph per resolved revision, oldest first. Eg. `YYY-N..`
pub fn state_line(graph: &HistoryGraph) -> String {
    graph.resolved().map(glyph).collect()
}

/// One row per revision, tip first, with parents and change counts per parent.
///
/// ```text
/// Y c3 <- c2 (+1 ~2 -0)
/// . c2 <- c1 (+0 ~1 -0), x9 (+3 ~0 -1)
/// ? x9
/// ```
pub fn render_graph(graph: &HistoryGraph) -> String {
    let mut out = String::new();

    for revision in graph.resolved().collect::<Vec<_>>().into_iter().rev() {
        let _ = write!(out, "{} {}", glyph(revision), revision.id());

        let parents = revision
            .parent_diffs()
            .iter()
            .map(|diff| {
                let count = |kind: ChangeType| diff.files.iter().filter(|f| f.change_type == kind).count();
                format!(
                    "{} (+{} ~{} -{})",
                    diff.parent,
                    count(ChangeType::Added),
                    count(ChangeType::Modified),
                    count(ChangeType::Deleted)
                )
            })
            .collect::<Vec<_>>();
        if !parents.is_empty() {
            let _ = write!(out, " <- {}", parents.join(", "));
        }
        out.push('\n');
    }

    let mut placeholders = graph.placeholders().map(Revision::id).collect::<Vec<_>>();
    placeholders.sort_unstable();
    for id in placeholders {
        let _ = writeln!(out, "? {id}");
    }

    out
}

pub fn print_graph(graph: &HistoryGraph) {
    print!("{}", render_graph(graph));
}
