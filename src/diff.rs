use serde::{Deserialize, Serialize};

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl ChangeType {
    /// Map a `git diff --name-status` status letter.
    ///
    /// Type changes count as modifications. Renames and copies never reach
    /// here because diffs are requested with `--no-renames`.
    pub fn from_status(status: &str) -> Option<ChangeType> {
        match status.chars().next()? {
            'A' => Some(ChangeType::Added),
            'M' | 'T' => Some(ChangeType::Modified),
            'D' => Some(ChangeType::Deleted),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Modified => 'M',
            ChangeType::Deleted => 'D',
        }
    }
}

/// One changed path between a revision and one of its parents.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, Deserialize)]
pub struct DiffFile {
    pub change_type: ChangeType,
    pub path: String,
}

impl DiffFile {
    pub fn new(change_type: ChangeType, path: impl Into<String>) -> Self {
        DiffFile {
            change_type,
            path: path.into(),
        }
    }

    /// Parse a single `<status>\t<path>` line. Returns `None` for anything
    /// that is not an add, modify or delete.
    pub fn parse_name_status(line: &str) -> Option<DiffFile> {
        let (status, path) = line.split_once('\t')?;
        let change_type = ChangeType::from_status(status.trim())?;
        let path = path.trim();

        if path.is_empty() {
            return None;
        }

        Some(DiffFile::new(change_type, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_status_lines() {
        assert_eq!(
            DiffFile::parse_name_status("A\tsrc/main/java/App.java"),
            Some(DiffFile::new(ChangeType::Added, "src/main/java/App.java"))
        );
        assert_eq!(
            DiffFile::parse_name_status("D\tREADME.md"),
            Some(DiffFile::new(ChangeType::Deleted, "README.md"))
        );
        assert_eq!(
            DiffFile::parse_name_status("T\tlink"),
            Some(DiffFile::new(ChangeType::Modified, "link"))
        );
    }

    #[test]
    fn rejects_unrecognized_lines() {
        assert_eq!(DiffFile::parse_name_status(""), None);
        assert_eq!(DiffFile::parse_name_status("M"), None);
        assert_eq!(DiffFile::parse_name_status("U\tconflicted.txt"), None);
        assert_eq!(DiffFile::parse_name_status("M\t   "), None);
    }
}
