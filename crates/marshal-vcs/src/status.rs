use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("malformed status entry: {entry:?}")]
    Malformed { entry: String },
    #[error("rename entry missing source path: {entry:?}")]
    MissingRenameSource { entry: String },
}

/// One column of the two-letter porcelain status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub char);

impl StatusCode {
    pub fn is_deleted(self) -> bool {
        self.0 == 'D'
    }

    pub fn is_rename_or_copy(self) -> bool {
        self.0 == 'R' || self.0 == 'C'
    }
}

/// A single working-tree status record.
///
/// For renames and copies `path` is the destination and `orig_path`
/// the source, matching the order git emits in `-z` mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub x: StatusCode,
    pub y: StatusCode,
    pub path: String,
    pub orig_path: Option<String>,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.x.0 == '?' && self.y.0 == '?'
    }

    pub fn is_deleted(&self) -> bool {
        self.x.is_deleted() || self.y.is_deleted()
    }
}

/// Parse `git status --porcelain=v1 -z` output.
///
/// Records are NUL-terminated `XY path`; rename/copy records carry the
/// source path as an extra NUL-separated field after the destination.
pub fn parse_porcelain(output: &[u8]) -> Result<Vec<StatusEntry>, StatusError> {
    let text = String::from_utf8_lossy(output);
    let mut fields = text.split('\0').filter(|field| !field.is_empty());
    let mut entries = Vec::new();

    while let Some(field) = fields.next() {
        let mut chars = field.chars();
        let (Some(x), Some(y), Some(' ')) = (chars.next(), chars.next(), chars.next()) else {
            return Err(StatusError::Malformed {
                entry: field.to_string(),
            });
        };
        let path: String = chars.collect();
        if path.is_empty() {
            return Err(StatusError::Malformed {
                entry: field.to_string(),
            });
        }

        let x = StatusCode(x);
        let y = StatusCode(y);
        let orig_path = if x.is_rename_or_copy() || y.is_rename_or_copy() {
            let source = fields.next().ok_or_else(|| StatusError::MissingRenameSource {
                entry: field.to_string(),
            })?;
            Some(source.to_string())
        } else {
            None
        };

        entries.push(StatusEntry {
            x,
            y,
            path,
            orig_path,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modified_and_untracked() {
        let raw = b" M file1.txt\0?? new.txt\0";
        let entries = parse_porcelain(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "file1.txt");
        assert!(!entries[0].is_untracked());
        assert!(entries[1].is_untracked());
    }

    #[test]
    fn test_parse_rename_resolves_destination_first() {
        let raw = b"R  new2.txt\0old.txt\0";
        let entries = parse_porcelain(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "new2.txt");
        assert_eq!(entries[0].orig_path.as_deref(), Some("old.txt"));
        assert!(!entries[0].is_deleted());
    }

    #[test]
    fn test_parse_deleted() {
        let raw = b"D  gone.txt\0";
        let entries = parse_porcelain(raw).unwrap();
        assert!(entries[0].is_deleted());
    }

    #[test]
    fn test_parse_empty_output() {
        let entries = parse_porcelain(b"").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_rename_without_source_is_error() {
        let err = parse_porcelain(b"R  dest.txt\0").unwrap_err();
        assert!(matches!(err, StatusError::MissingRenameSource { .. }));
    }

    #[test]
    fn test_parse_malformed_entry_is_error() {
        let err = parse_porcelain(b"M\0").unwrap_err();
        assert!(matches!(err, StatusError::Malformed { .. }));
    }
}
