//! Plain `subject \t predicate \t object` files.

use std::path::Path;

use crate::sources::{list_sorted, LineFiles};
use crate::{SourceError, Triple, TripleSource};

/// Reads one TSV file, or every file below a directory in file-name order.
/// Blank lines are ignored; any other line must have exactly three fields.
pub struct TsvSource {
    lines: LineFiles,
}

impl TsvSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let files = if path.is_dir() {
            list_sorted(path, true, |entry| entry.file_type().is_file())?
        } else {
            vec![path.to_path_buf()]
        };
        Ok(Self {
            lines: LineFiles::new(files),
        })
    }
}

impl Iterator for TsvSource {
    type Item = Result<Triple, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (line_no, text) = match self.lines.next_line()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err)),
            };
            if text.trim().is_empty() {
                continue;
            }
            let mut fields = text.split('\t');
            return Some(match (fields.next(), fields.next(), fields.next(), fields.next()) {
                (Some(s), Some(p), Some(o), None) => Ok(Triple::new(s, p, o)),
                _ => Err(self
                    .lines
                    .malformed(line_no, "expected `subject<TAB>predicate<TAB>object`")),
            });
        }
    }
}

impl TripleSource for TsvSource {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_triples_and_flags_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.tsv");
        fs::write(&path, "a\tknows\tb\n\nbroken line\nb\tknows\tc\n").unwrap();

        let items: Vec<_> = TsvSource::open(&path).unwrap().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &Triple::new("a", "knows", "b"));
        match &items[1] {
            Err(err @ SourceError::Malformed { line, .. }) => {
                assert_eq!(*line, 3);
                assert!(err.is_recoverable());
            }
            other => panic!("unexpected item: {other:?}"),
        }
        assert_eq!(items[2].as_ref().unwrap(), &Triple::new("b", "knows", "c"));
    }

    #[test]
    fn directory_input_reads_every_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.tsv"), "x\tp\ty\n").unwrap();
        fs::write(dir.path().join("nested").join("b.tsv"), "y\tp\tz\n").unwrap();

        let triples: Vec<Triple> = TsvSource::open(dir.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            triples,
            vec![Triple::new("x", "p", "y"), Triple::new("y", "p", "z")]
        );
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = TsvSource::open(&dir.path().join("absent.tsv")).unwrap();
        let err = source.next().unwrap().unwrap_err();
        assert!(!err.is_recoverable());
    }
}
