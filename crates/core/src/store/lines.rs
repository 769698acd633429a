//! Line-oriented text file provider.
//!
//! Line N of the file holds the record whose id is N, written as
//! comma-separated `key,value` pairs in field-name order. The id itself is
//! implied by the position and never written. A blank line is an absent
//! record.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{PersistenceProvider, StoreError, record_id};
use crate::entity::{EntityId, Record};

/// The ten people `seed_people` writes, in id order.
pub const SEED_PEOPLE: &[(&str, u32)] = &[
    ("aaa", 10),
    ("bbb", 21),
    ("ccc", 22),
    ("ddd", 13),
    ("eee", 14),
    ("fff", 15),
    ("ggg", 16),
    ("hhh", 17),
    ("iii", 18),
    ("jjj", 19),
];

/// Highest id `add` and `update` will write. The file is padded with a
/// blank line for every lower id, so larger ids are rejected.
pub const MAX_LINE_ID: EntityId = 1_000_000;

/// Records stored one per line in a plain text file.
#[derive(Debug)]
pub struct LineFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl LineFileStore {
    /// Open the file at `path`, creating an empty one if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, "")?;
        }
        tracing::debug!(path = %path.display(), "Opened line file store");
        Ok(Self { path, lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents.
    pub fn contents(&self) -> Result<String, StoreError> {
        let _guard = self.lock.lock();
        Ok(fs::read_to_string(&self.path)?)
    }

    /// Drop every record.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        self.write_lines(&[])
    }

    /// Overwrite the file with the ten [`SEED_PEOPLE`], ids 0 through 9.
    pub fn seed_people(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let lines: Vec<String> = SEED_PEOPLE
            .iter()
            .map(|(name, age)| format!("Age,{age},Name,{name}"))
            .collect();
        self.write_lines(&lines)
    }

    fn read_lines(&self) -> Result<Vec<String>, StoreError> {
        let text = fs::read_to_string(&self.path)?;
        Ok(text.lines().map(str::to_string).collect())
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), StoreError> {
        let mut text = lines.join("\n");
        if !lines.is_empty() {
            text.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn write_record(&self, record: &Record, must_exist: bool) -> Result<(), StoreError> {
        let id = record_id(record)?;
        if id > MAX_LINE_ID {
            return Err(StoreError::Rejected(format!("id {id} is past the last line id {MAX_LINE_ID}")));
        }
        let line = format_line(record)?;
        let index = line_index(id)?;

        let _guard = self.lock.lock();
        let mut lines = self.read_lines()?;
        let occupied = lines.get(index).is_some_and(|l| !l.trim().is_empty());
        match (must_exist, occupied) {
            (true, false) => return Err(StoreError::Missing(id)),
            (false, true) => return Err(StoreError::Conflict(id)),
            _ => {}
        }
        if lines.len() <= index {
            let len = index
                .checked_add(1)
                .ok_or_else(|| StoreError::Rejected(format!("id {id} does not fit a line number")))?;
            lines.resize(len, String::new());
        }
        lines[index] = line;
        self.write_lines(&lines)
    }
}

impl PersistenceProvider for LineFileStore {
    fn add(&self, record: &Record) -> Result<(), StoreError> {
        self.write_record(record, false)
    }

    fn update(&self, record: &Record) -> Result<(), StoreError> {
        self.write_record(record, true)
    }

    fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        let index = line_index(id)?;
        let _guard = self.lock.lock();
        let mut lines = self.read_lines()?;
        match lines.get_mut(index) {
            Some(line) if !line.trim().is_empty() => {
                line.clear();
            }
            _ => return Err(StoreError::Missing(id)),
        }
        self.write_lines(&lines)
    }

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError> {
        let index = line_index(id)?;
        let _guard = self.lock.lock();
        let lines = self.read_lines()?;
        match lines.get(index) {
            Some(line) => parse_line(id, line),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        let _guard = self.lock.lock();
        let lines = self.read_lines()?;
        let mut records = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if let Some(record) = parse_line(index as EntityId, line)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn line_index(id: EntityId) -> Result<usize, StoreError> {
    usize::try_from(id).map_err(|_| StoreError::Rejected(format!("id {id} does not fit a line number")))
}

fn format_line(record: &Record) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(record.len() * 2);
    for (key, value) in record.iter().filter(|(k, _)| *k != Record::ID_FIELD) {
        for part in [key, value] {
            if part.contains([',', '\n', '\r']) {
                return Err(StoreError::Rejected(format!("{part:?} contains a separator")));
            }
            // Lines are trimmed field by field on read.
            if part.trim() != part {
                return Err(StoreError::Rejected(format!("{part:?} has surrounding whitespace")));
            }
        }
        parts.push(key);
        parts.push(value);
    }
    if parts.is_empty() {
        // An empty line would read back as an absent record.
        return Err(StoreError::Rejected("record has no fields besides Id".into()));
    }
    Ok(parts.join(","))
}

fn parse_line(id: EntityId, line: &str) -> Result<Option<Record>, StoreError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() % 2 != 0 {
        return Err(StoreError::Corrupt(format!("line {id} has an unpaired field: {line:?}")));
    }
    let mut record = Record::with_id(id);
    for pair in parts.chunks(2) {
        record.insert(pair[0], pair[1]);
    }
    Ok(Some(record))
}
