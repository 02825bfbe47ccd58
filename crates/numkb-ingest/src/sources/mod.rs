//! Triple sources.

pub mod memory;
pub mod tsv;
pub mod yago1;

pub use memory::MemorySource;
pub use tsv::TsvSource;
pub use yago1::Yago1Source;

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::SourceError;

/// Entries directly below `dir` (or at any depth when `recursive`), sorted by
/// file name, keeping those accepted by `keep`.
pub(crate) fn list_sorted(
    dir: &Path,
    recursive: bool,
    keep: impl Fn(&walkdir::DirEntry) -> bool,
) -> Result<Vec<PathBuf>, SourceError> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();
    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| SourceError::Listing {
            path: dir.to_path_buf(),
            source: io::Error::from(err),
        })?;
        if keep(&entry) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

struct OpenFile {
    path: PathBuf,
    reader: BufReader<File>,
    line_no: usize,
}

impl OpenFile {
    /// Next line without its terminator; `None` at end of file.
    fn read_line(&mut self) -> Option<Result<(usize, String), SourceError>> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(source) => {
                return Some(Err(SourceError::Io {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
        self.line_no += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Some(match String::from_utf8(buf) {
            Ok(text) => Ok((self.line_no, text)),
            Err(err) => Err(SourceError::Malformed {
                path: self.path.clone(),
                line: self.line_no,
                message: format!("invalid UTF-8: {}", err.utf8_error()),
            }),
        })
    }
}

/// Lines of a queue of files, read one file at a time.
pub(crate) struct LineFiles {
    files: VecDeque<PathBuf>,
    current: Option<OpenFile>,
}

impl LineFiles {
    pub(crate) fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into(),
            current: None,
        }
    }

    /// Next `(line number, text)`, or `None` once every file is exhausted.
    ///
    /// A line that is not valid UTF-8 yields a recoverable `Malformed` error
    /// and reading resumes on the following line.
    pub(crate) fn next_line(&mut self) -> Option<Result<(usize, String), SourceError>> {
        loop {
            if let Some(open) = &mut self.current {
                match open.read_line() {
                    Some(Err(err @ SourceError::Io { .. })) => {
                        self.current = None;
                        return Some(Err(err));
                    }
                    Some(line) => return Some(line),
                    None => self.current = None,
                }
            }

            let path = self.files.pop_front()?;
            match File::open(&path) {
                Ok(file) => {
                    self.current = Some(OpenFile {
                        path,
                        reader: BufReader::new(file),
                        line_no: 0,
                    })
                }
                Err(source) => return Some(Err(SourceError::Io { path, source })),
            }
        }
    }

    /// A malformed-line error pointing at the file currently being read.
    pub(crate) fn malformed(&self, line: usize, message: impl Into<String>) -> SourceError {
        SourceError::Malformed {
            path: self
                .current
                .as_ref()
                .map(|open| open.path.clone())
                .unwrap_or_default(),
            line,
            message: message.into(),
        }
    }
}
