//! File-backed position records.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use wayfarer_protocol::{
    Codec, CollaboratorError, JsonCodec, PlayerId, PositionRecord, ProtocolError,
};

use crate::{PositionRecords, WayfarerError};

const SOURCE: &str = "position-records";

/// One pretty-printed JSON file per player: `<root>/<player id>.json`.
///
/// Each write goes to its own temporary file in the same directory and is
/// renamed into place, so a crash mid-write never leaves a truncated
/// record behind and overlapping writes for one player never share a
/// temporary file. The last rename wins.
#[derive(Debug, Clone)]
pub struct JsonPositionRecords {
    root: PathBuf,
    codec: JsonCodec,
}

impl JsonPositionRecords {
    /// Uses `root` as the record directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WayfarerError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            codec: JsonCodec,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, player_id: PlayerId) -> PathBuf {
        self.root.join(format!("{}.json", player_id.0))
    }

    /// Reads a record, `None` if the player has none.
    pub fn read(&self, player_id: PlayerId) -> Result<Option<PositionRecord>, WayfarerError> {
        let bytes = match std::fs::read(self.path_for(player_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: PositionRecord = self.codec.decode(&bytes)?;
        if record.player_id != player_id {
            return Err(ProtocolError::InvalidRecord(format!(
                "file for {player_id} holds a record for {}",
                record.player_id
            ))
            .into());
        }
        Ok(Some(record))
    }

    /// Writes a record atomically.
    pub fn write(&self, record: &PositionRecord) -> Result<(), WayfarerError> {
        let path = self.path_for(record.player_id);
        let bytes = self.codec.encode(record)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!(
            player_id = %record.player_id,
            path = %path.display(),
            "position record written"
        );
        Ok(())
    }
}

impl PositionRecords for JsonPositionRecords {
    fn load(&self, player_id: PlayerId) -> Result<Option<PositionRecord>, CollaboratorError> {
        self.read(player_id)
            .map_err(|e| CollaboratorError::new(SOURCE, e.to_string()))
    }

    fn store(&self, record: &PositionRecord) -> Result<(), CollaboratorError> {
        self.write(record)
            .map_err(|e| CollaboratorError::new(SOURCE, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use wayfarer_protocol::{RegionName, SpawnPoint};

    use super::*;

    fn record(player: u64) -> PositionRecord {
        PositionRecord::at_spawn(
            PlayerId(player),
            RegionName::from("Overworld"),
            SpawnPoint::new(100.0, 64.0, 200.0, 90.0),
        )
    }

    #[test]
    fn test_read_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonPositionRecords::open(dir.path()).unwrap();
        assert_eq!(records.read(PlayerId(1)).unwrap(), None);
    }

    #[test]
    fn test_write_then_read_and_no_tmp_left() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonPositionRecords::open(dir.path().join("positions")).unwrap();

        records.write(&record(7)).unwrap();

        assert_eq!(records.read(PlayerId(7)).unwrap(), Some(record(7)));
        let files: Vec<_> = std::fs::read_dir(records.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("7.json")], "no temp file left");
    }

    #[test]
    fn test_write_overlapping_writers_for_one_player_never_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonPositionRecords::open(dir.path()).unwrap();

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let records = &records;
                scope.spawn(move || {
                    let mut moved = record(7);
                    moved.region = RegionName::from(format!("Region{writer}"));
                    for _ in 0..25 {
                        records.write(&moved).unwrap();
                    }
                });
            }
        });

        let read = records.read(PlayerId(7)).unwrap().unwrap();
        assert!(read.region.as_str().starts_with("Region"));
        assert_eq!(std::fs::read_dir(records.root()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonPositionRecords::open(dir.path()).unwrap();

        let mut moved = record(7);
        moved.region = RegionName::from("Nether");
        records.write(&moved).unwrap();
        records.write(&record(7)).unwrap();

        let read = records.read(PlayerId(7)).unwrap().unwrap();
        assert_eq!(read.region, RegionName::from("Overworld"));
    }

    #[test]
    fn test_read_rejects_record_for_other_player() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonPositionRecords::open(dir.path()).unwrap();
        records.write(&record(8)).unwrap();
        std::fs::rename(dir.path().join("8.json"), dir.path().join("9.json")).unwrap();

        let err = records.read(PlayerId(9)).unwrap_err();
        assert!(matches!(err, WayfarerError::Protocol(ProtocolError::InvalidRecord(_))));
    }

    #[test]
    fn test_load_reports_corrupt_file_with_source_tag() {
        let dir = tempfile::tempdir().unwrap();
        let records = JsonPositionRecords::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("3.json"), b"{ not json").unwrap();

        let err = records.load(PlayerId(3)).unwrap_err();
        assert_eq!(err.source_tag, "position-records");
    }
}
