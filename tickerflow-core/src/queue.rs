//! File-backed queues: scanner candidates, open positions, watchlist.
//!
//! Each queue is a UTF-8 text file with one entry per line and the symbol as
//! the first whitespace-delimited token. Every mutation loads the file into a
//! [`QueueFile`], edits it in memory, and flushes the whole file back through a
//! temporary sibling and a rename. A missing file reads as an empty queue.
//!
//! There is no cross-process locking. One pipeline instance is expected to own
//! the files; the in-process write lock only serializes callers that share a
//! `QueueStore`.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{EntryError, LimitPrice, Symbol, WatchlistEntry};

/// The three persisted queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Scanner,
    OpenPositions,
    Watchlist,
}

impl Display for QueueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanner => write!(f, "scanner"),
            Self::OpenPositions => write!(f, "open positions"),
            Self::Watchlist => write!(f, "watchlist"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{kind} queue I/O error at {}: {source}", path.display())]
    Io {
        kind: QueueKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} queue cannot be edited entry by entry")]
    ReadOnly(QueueKind),
}

/// Locations of the queue files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    pub scanner: PathBuf,
    pub open_positions: PathBuf,
    pub watchlist: PathBuf,
}

impl QueuePaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            scanner: dir.join("scanner.txt"),
            open_positions: dir.join("openpositions.txt"),
            watchlist: dir.join("watchlist.txt"),
        }
    }

    pub fn path(&self, kind: QueueKind) -> &Path {
        match kind {
            QueueKind::Scanner => &self.scanner,
            QueueKind::OpenPositions => &self.open_positions,
            QueueKind::Watchlist => &self.watchlist,
        }
    }
}

impl Default for QueuePaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

/// One parsed watchlist line: either a usable entry or the reason it is not.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistLine {
    /// 1-based line number in the file.
    pub line_no: usize,
    pub raw: String,
    pub parsed: Result<WatchlistEntry, EntryError>,
}

/// First whitespace-delimited token of a line as a symbol, if it is one.
fn leading_symbol(line: &str) -> Option<Symbol> {
    line.split_whitespace()
        .next()
        .and_then(|token| Symbol::parse(token).ok())
}

/// In-memory view of a queue file. Edits are invisible on disk until `flush`.
#[derive(Debug)]
struct QueueFile {
    kind: QueueKind,
    path: PathBuf,
    lines: Vec<String>,
}

impl QueueFile {
    fn load(kind: QueueKind, path: &Path) -> Result<Self, QueueError> {
        let lines = match fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(QueueError::Io {
                    kind,
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            lines,
        })
    }

    /// Valid symbols in file order, first occurrence only.
    fn symbols(&self) -> Vec<Symbol> {
        let mut seen = BTreeSet::new();
        self.lines
            .iter()
            .filter_map(|line| leading_symbol(line))
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect()
    }

    fn contains(&self, symbol: &Symbol) -> bool {
        self.lines
            .iter()
            .any(|line| leading_symbol(line).as_ref() == Some(symbol))
    }

    /// Drop every line whose first token is `symbol`. Returns the number removed.
    fn remove(&mut self, symbol: &Symbol) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| leading_symbol(line).as_ref() != Some(symbol));
        before - self.lines.len()
    }

    /// Write the whole file: tmp sibling, then rename into place.
    fn flush(&self) -> Result<(), QueueError> {
        let io_err = |source| QueueError::Io {
            kind: self.kind,
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut content = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            content.push_str(line);
            content.push('\n');
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, content).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_err(e)
        })?;

        debug!(
            queue = %self.kind,
            path = %self.path.display(),
            lines = self.lines.len(),
            "queue flushed"
        );
        Ok(())
    }
}

/// Read/merge/remove operations over the three queue files.
#[derive(Debug)]
pub struct QueueStore {
    paths: QueuePaths,
    write_lock: Mutex<()>,
}

impl QueueStore {
    pub fn new(paths: QueuePaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &QueuePaths {
        &self.paths
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, kind: QueueKind) -> Result<QueueFile, QueueError> {
        QueueFile::load(kind, self.paths.path(kind))
    }

    /// Symbols in the queue. Blank and malformed lines are skipped.
    pub fn load(&self, kind: QueueKind) -> Result<BTreeSet<Symbol>, QueueError> {
        Ok(self.open(kind)?.symbols().into_iter().collect())
    }

    /// Symbols in file order, duplicates removed.
    pub fn load_ordered(&self, kind: QueueKind) -> Result<Vec<Symbol>, QueueError> {
        Ok(self.open(kind)?.symbols())
    }

    /// Number of non-blank lines in the queue.
    pub fn count(&self, kind: QueueKind) -> Result<usize, QueueError> {
        Ok(self.open(kind)?.lines.len())
    }

    pub fn is_empty(&self, kind: QueueKind) -> Result<bool, QueueError> {
        Ok(self.count(kind)? == 0)
    }

    /// Merge `symbols` into the queue without duplicating existing ones.
    ///
    /// Existing lines keep their order; new symbols are appended in sorted order.
    /// The file is rewritten only when something was added. Returns the number
    /// of symbols added.
    pub fn append_unique<'a, I>(&self, kind: QueueKind, symbols: I) -> Result<usize, QueueError>
    where
        I: IntoIterator<Item = &'a Symbol>,
    {
        let _guard = self.lock();
        let mut file = self.open(kind)?;
        let existing: BTreeSet<Symbol> = file.symbols().into_iter().collect();
        let fresh: BTreeSet<&Symbol> = symbols
            .into_iter()
            .filter(|symbol| !existing.contains(*symbol))
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        file.lines.extend(fresh.iter().map(|symbol| symbol.to_string()));
        file.flush()?;
        info!(queue = %kind, added = fresh.len(), "symbols merged into queue");
        Ok(fresh.len())
    }

    /// Remove every line whose first token is `symbol` (case-insensitive).
    ///
    /// Only the scanner queue and watchlist may be edited this way; open positions
    /// are replaced wholesale by the account refresh.
    pub fn remove_symbol(&self, kind: QueueKind, symbol: &Symbol) -> Result<bool, QueueError> {
        if kind == QueueKind::OpenPositions {
            return Err(QueueError::ReadOnly(kind));
        }

        let _guard = self.lock();
        let mut file = self.open(kind)?;
        if file.remove(symbol) == 0 {
            return Ok(false);
        }
        file.flush()?;
        info!(queue = %kind, %symbol, "symbol removed from queue");
        Ok(true)
    }

    /// Drop lines whose first token is not a ticker. Returns the dropped lines.
    pub fn prune_malformed(&self, kind: QueueKind) -> Result<Vec<String>, QueueError> {
        if kind == QueueKind::OpenPositions {
            return Err(QueueError::ReadOnly(kind));
        }

        let _guard = self.lock();
        let mut file = self.open(kind)?;
        let (kept, dropped): (Vec<String>, Vec<String>) = file
            .lines
            .drain(..)
            .partition(|line| leading_symbol(line).is_some());
        if dropped.is_empty() {
            return Ok(dropped);
        }

        file.lines = kept;
        file.flush()?;
        for line in &dropped {
            warn!(queue = %kind, line = %line, "removed line that is not a ticker");
        }
        Ok(dropped)
    }

    /// Append `SYMBOL PRICE` to the watchlist unless the symbol is already there.
    ///
    /// Returns `false` for a duplicate; the file is left untouched.
    pub fn add_watchlist_entry(&self, entry: &WatchlistEntry) -> Result<bool, QueueError> {
        let _guard = self.lock();
        let mut file = self.open(QueueKind::Watchlist)?;
        if file.contains(&entry.symbol) {
            warn!(symbol = %entry.symbol, "already in watchlist, skipping duplicate");
            return Ok(false);
        }

        file.lines.push(entry.to_line());
        file.flush()?;
        info!(symbol = %entry.symbol, limit_price = %entry.limit_price, "added to watchlist");
        Ok(true)
    }

    /// Convenience wrapper over [`add_watchlist_entry`](Self::add_watchlist_entry).
    pub fn add_to_watchlist(&self, symbol: Symbol, price: LimitPrice) -> Result<bool, QueueError> {
        self.add_watchlist_entry(&WatchlistEntry::new(symbol, price))
    }

    /// Every non-blank watchlist line with its parse result, in file order.
    pub fn watchlist_lines(&self) -> Result<Vec<WatchlistLine>, QueueError> {
        let file = self.open(QueueKind::Watchlist)?;
        Ok(file
            .lines
            .into_iter()
            .enumerate()
            .map(|(i, raw)| WatchlistLine {
                line_no: i + 1,
                parsed: WatchlistEntry::parse_line(&raw),
                raw,
            })
            .collect())
    }

    /// Overwrite a queue with exactly `symbols`, one per line.
    pub fn replace<'a, I>(&self, kind: QueueKind, symbols: I) -> Result<(), QueueError>
    where
        I: IntoIterator<Item = &'a Symbol>,
    {
        let _guard = self.lock();
        let mut seen = BTreeSet::new();
        let file = QueueFile {
            kind,
            path: self.paths.path(kind).to_path_buf(),
            lines: symbols
                .into_iter()
                .filter(|symbol| seen.insert(*symbol))
                .map(|symbol| symbol.to_string())
                .collect(),
        };
        file.flush()
    }

    /// Truncate a queue to empty.
    pub fn clear(&self, kind: QueueKind) -> Result<(), QueueError> {
        let _guard = self.lock();
        QueueFile {
            kind,
            path: self.paths.path(kind).to_path_buf(),
            lines: Vec::new(),
        }
        .flush()?;
        info!(queue = %kind, "queue cleared");
        Ok(())
    }
}
