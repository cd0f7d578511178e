//! Writes decoded events as one entry per event, named `NNNN/NNNNNNNN.e<type>`.
//!
//! Entries are grouped into directories of 10000. Each entry holds the indented JSON
//! document of its event and carries the event timestamp as its modification time.
//! [`EventArchiveWriter`] streams the entries into a tar archive, [`EventTreeWriter`]
//! creates them as files under a directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use tar::{Builder, EntryType, Header};

use crate::err::Result;
use crate::event_record::DecodedEvent;
use crate::json_output::to_json_vec;

pub const ENTRIES_PER_DIRECTORY: u64 = 10_000;

/// Relative entry name of the `index`th event.
pub fn entry_name(index: u64, event_type: u32) -> String {
    format!(
        "{:04}/{:08}.e{}",
        index / ENTRIES_PER_DIRECTORY,
        index,
        event_type
    )
}

fn modification_time(timestamp: i64) -> Option<SystemTime> {
    let delta = Duration::from_secs(timestamp.unsigned_abs());
    if timestamp >= 0 {
        SystemTime::UNIX_EPOCH.checked_add(delta)
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(delta)
    }
}

const ENTRY_MODE: u32 = 0o644;

/// Streams events into a tar archive.
pub struct EventArchiveWriter<W: Write> {
    builder: Builder<W>,
    written: u64,
}

impl<W: Write> EventArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        EventArchiveWriter {
            builder: Builder::new(writer),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends the next event, returning the name of its entry.
    pub fn write(&mut self, event: &DecodedEvent) -> Result<String> {
        let name = entry_name(self.written, event.event_type);
        let content = to_json_vec(event, true)?;

        let mtime = match u64::try_from(event.context.timestamp) {
            Ok(mtime) => mtime,
            Err(_) => {
                warn!(
                    "Timestamp {} of {} predates the epoch, storing 0 as its modification time",
                    event.context.timestamp, name
                );
                0
            }
        };

        let mut header = Header::new_gnu();
        header.set_path(&name)?;
        header.set_entry_type(EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mtime(mtime);
        header.set_mode(ENTRY_MODE);
        header.set_cksum();
        self.builder.append(&header, content.as_slice())?;

        debug!("Appended {} ({} bytes)", name, content.len());
        self.written += 1;
        Ok(name)
    }

    /// Writes the archive trailer and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        Ok(self.builder.into_inner()?)
    }
}

/// Writes every event into a tar archive on `writer`, stopping at the first error. Returns
/// the number of entries written.
pub fn write_event_archive<W, I>(writer: W, events: I) -> Result<u64>
where
    W: Write,
    I: IntoIterator<Item = Result<DecodedEvent>>,
{
    let mut archive = EventArchiveWriter::new(writer);
    for event in events {
        archive.write(&event?)?;
    }

    let written = archive.written();
    let mut writer = archive.finish()?;
    writer.flush()?;

    info!("Wrote {} events to archive", written);
    Ok(written)
}

#[derive(Debug)]
pub struct EventTreeWriter {
    root: PathBuf,
    written: u64,
}

impl EventTreeWriter {
    /// Creates `root` (and its parents) if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(EventTreeWriter { root, written: 0 })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Writes the next event, returning the path of the created entry.
    pub fn write(&mut self, event: &DecodedEvent) -> Result<PathBuf> {
        let path = self.root.join(entry_name(self.written, event.event_type));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&path)?;
        file.write_all(&to_json_vec(event, true)?)?;

        match modification_time(event.context.timestamp) {
            Some(mtime) => file.set_modified(mtime)?,
            None => warn!(
                "Timestamp {} of {} cannot be used as a modification time",
                event.context.timestamp,
                path.display()
            ),
        }

        debug!("Wrote {}", path.display());
        self.written += 1;
        Ok(path)
    }
}

/// Writes every event under `root`, stopping at the first error. Returns the number of
/// entries written.
pub fn write_event_tree<I>(root: impl AsRef<Path>, events: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<DecodedEvent>>,
{
    let mut writer = EventTreeWriter::new(root)?;
    for event in events {
        writer.write(&event?)?;
    }

    info!(
        "Wrote {} events under {}",
        writer.written(),
        writer.root.display()
    );
    Ok(writer.written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DecodedContext;
    use crate::payload::EventData;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};
    use uuid::Uuid;

    fn event(event_type: u32, timestamp: i64) -> DecodedEvent {
        DecodedEvent {
            event_type,
            type_name: "X".to_owned(),
            version: 1,
            context_version: 1,
            context: DecodedContext {
                timestamp,
                timestamp_str: String::new(),
                user_id: Uuid::nil(),
                ip_address: "127.0.0.1".parse().unwrap(),
                version: 1,
                size: 40,
            },
            data: EventData::new(),
            offset: 0,
        }
    }

    #[test]
    fn test_entry_names() {
        assert_eq!(entry_name(0, 1), "0000/00000000.e1");
        assert_eq!(entry_name(9_999, 15), "0000/00009999.e15");
        assert_eq!(entry_name(10_000, 7), "0001/00010000.e7");
        assert_eq!(entry_name(123_456_789, 35), "12345/123456789.e35");
    }

    #[test]
    fn test_writes_archive_with_timestamps() {
        let events = vec![
            Ok(event(1, 1_500_000_000)),
            Ok(event(15, 1_500_000_060)),
            Ok(event(7, -10)),
        ];

        let mut out = Vec::new();
        assert_eq!(write_event_archive(&mut out, events).unwrap(), 3);

        let mut archive = tar::Archive::new(Cursor::new(out));
        let mut entries = vec![];
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mtime = entry.header().mtime().unwrap();
            let mode = entry.header().mode().unwrap();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            entries.push((name, mtime, mode, content));
        }

        let names: Vec<&str> = entries.iter().map(|e| e.0.as_str()).collect();
        assert_eq!(
            names,
            vec!["0000/00000000.e1", "0000/00000001.e15", "0000/00000002.e7"]
        );
        let mtimes: Vec<u64> = entries.iter().map(|e| e.1).collect();
        assert_eq!(mtimes, vec![1_500_000_000, 1_500_000_060, 0]);
        assert_eq!(entries[1].2, 0o644);
        assert!(entries[1].3.starts_with("{\n    \"type\": 15,"));

        let document: serde_json::Value = serde_json::from_str(&entries[2].3).unwrap();
        assert_eq!(document["context"]["timestamp"], -10);
    }

    #[test]
    fn test_archive_stops_at_first_error() {
        let events = vec![
            Ok(event(1, 0)),
            Err(crate::err::EventLogError::Io(std::io::Error::other("boom"))),
            Ok(event(2, 0)),
        ];

        let mut out = Vec::new();
        assert!(write_event_archive(&mut out, events).is_err());
    }

    #[test]
    fn test_writes_tree_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![Ok(event(1, 1_500_000_000)), Ok(event(15, 1_500_000_060))];

        let written = write_event_tree(dir.path(), events).unwrap();
        assert_eq!(written, 2);

        let second = dir.path().join("0000").join("00000001.e15");
        let content = fs::read_to_string(&second).unwrap();
        assert!(content.starts_with("{\n    \"type\": 15,"));

        let mtime = fs::metadata(&second).unwrap().modified().unwrap();
        assert_eq!(
            mtime.duration_since(SystemTime::UNIX_EPOCH).unwrap(),
            Duration::from_secs(1_500_000_060)
        );
    }

    #[test]
    fn test_stops_at_first_error() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![
            Ok(event(1, 0)),
            Err(crate::err::EventLogError::Io(std::io::Error::other("boom"))),
            Ok(event(2, 0)),
        ];

        assert!(write_event_tree(dir.path(), events).is_err());
        assert!(dir.path().join("0000/00000000.e1").exists());
        assert!(!dir.path().join("0000/00000001.e2").exists());
    }
}
