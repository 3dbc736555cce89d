use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use pgnsift_base::prelude::*;
use tracing::debug;

/// The duplicate-detection key: a game already seen is one with an
/// identical triple. Fuzzy matching collapses the triple to the
/// cumulative hash over the first N plies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub final_hash:      Hash,
    pub cumulative_hash: Hash,
    pub plycount:        u32,
}

/// First occurrence of each fingerprint is recorded with its source file;
/// later occurrences report where the original was first seen.
pub enum DuplicateStore {
    InMemory(HashMap<Fingerprint, u32>, FileNames),
    OnDisk(VirtualHashTable, FileNames),
}

#[derive(Default)]
pub struct FileNames {
    names: Vec<String>,
}

impl FileNames {
    fn intern(&mut self, name: &str) -> u32 {
        match self.names.iter().position(|n| n == name) {
            Some(i) => i as u32 + 1,
            None => {
                self.names.push(name.to_string());
                self.names.len() as u32
            }
        }
    }

    fn get(&self, id: u32) -> &str {
        &self.names[id as usize - 1]
    }
}

impl DuplicateStore {
    pub fn in_memory() -> DuplicateStore {
        DuplicateStore::InMemory(HashMap::new(), FileNames::default())
    }

    pub fn on_disk() -> Result<DuplicateStore> {
        Ok(DuplicateStore::OnDisk(
            VirtualHashTable::create(VirtualHashTable::DEFAULT_CAPACITY)?,
            FileNames::default(),
        ))
    }

    /// record the fingerprint; Some(first_seen_filename) when the game is
    /// a duplicate of one already stored
    pub fn check_and_insert(&mut self, fp: Fingerprint, filename: &str) -> Result<Option<String>> {
        match self {
            DuplicateStore::InMemory(map, names) => {
                if let Some(&id) = map.get(&fp) {
                    return Ok(Some(names.get(id).to_string()));
                }
                let id = names.intern(filename);
                map.insert(fp, id);
                Ok(None)
            }
            DuplicateStore::OnDisk(table, names) => {
                let id = names.intern(filename);
                match table.check_and_insert(fp, id)? {
                    Some(first_id) => Ok(Some(names.get(first_id).to_string())),
                    None => Ok(None),
                }
            }
        }
    }
}

/// An on-disk open-addressed hash table for runs too large for memory.
/// Each slot is a fixed-width record; an empty slot has file id zero.
pub struct VirtualHashTable {
    file:     File,
    path:     PathBuf,
    capacity: u64,
    used:     u64,
}

const SLOT_BYTES: u64 = 8 + 8 + 4 + 4;

impl Drop for VirtualHashTable {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl VirtualHashTable {
    pub const DEFAULT_CAPACITY: u64 = 1 << 21;

    pub fn create(capacity: u64) -> Result<VirtualHashTable> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static NEXT_TABLE: AtomicU32 = AtomicU32::new(0);
        let n = NEXT_TABLE.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("pgnsift-dups-{}-{n}.tbl", std::process::id()));
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("creating duplicate table {}", path.display()))?;
        file.set_len(capacity * SLOT_BYTES)?;
        file.seek(SeekFrom::Start(0))?;
        debug!("virtual hash table at {} with {capacity} slots", path.display());
        Ok(VirtualHashTable {
            file,
            path,
            capacity,
            used: 0,
        })
    }

    fn read_slot(&mut self, index: u64) -> Result<(Fingerprint, u32)> {
        self.file.seek(SeekFrom::Start(index * SLOT_BYTES))?;
        let mut buf = [0u8; SLOT_BYTES as usize];
        self.file.read_exact(&mut buf)?;
        let fp = Fingerprint {
            final_hash:      u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            cumulative_hash: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            plycount:        u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        };
        let file_id = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        Ok((fp, file_id))
    }

    fn write_slot(&mut self, index: u64, fp: Fingerprint, file_id: u32) -> Result<()> {
        self.file.seek(SeekFrom::Start(index * SLOT_BYTES))?;
        let mut buf = [0u8; SLOT_BYTES as usize];
        buf[0..8].copy_from_slice(&fp.final_hash.to_le_bytes());
        buf[8..16].copy_from_slice(&fp.cumulative_hash.to_le_bytes());
        buf[16..20].copy_from_slice(&fp.plycount.to_le_bytes());
        buf[20..24].copy_from_slice(&file_id.to_le_bytes());
        self.file.write_all(&buf)?;
        Ok(())
    }

    pub fn check_and_insert(&mut self, fp: Fingerprint, file_id: u32) -> Result<Option<u32>> {
        anyhow::ensure!(self.used < self.capacity - 1, "duplicate table is full");
        let mut index = (fp.final_hash ^ fp.cumulative_hash) % self.capacity;
        loop {
            let (slot_fp, slot_id) = self.read_slot(index)?;
            if slot_id == 0 {
                self.write_slot(index, fp, file_id)?;
                self.used += 1;
                return Ok(None);
            }
            if slot_fp == fp {
                return Ok(Some(slot_id));
            }
            index = (index + 1) % self.capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn fp(n: u64) -> Fingerprint {
        Fingerprint {
            final_hash:      n.wrapping_mul(0x9e3779b97f4a7c15),
            cumulative_hash: n,
            plycount:        (n % 300) as u32,
        }
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = DuplicateStore::in_memory();
        assert_eq!(store.check_and_insert(fp(1), "a.pgn").unwrap(), None);
        assert_eq!(store.check_and_insert(fp(2), "a.pgn").unwrap(), None);
        assert_eq!(
            store.check_and_insert(fp(1), "b.pgn").unwrap(),
            Some("a.pgn".to_string()),
            "duplicate names the first file"
        );
        // and the original record is unchanged
        assert_eq!(store.check_and_insert(fp(1), "c.pgn").unwrap(), Some("a.pgn".to_string()));
    }

    #[test]
    fn test_plycount_distinguishes() {
        let mut store = DuplicateStore::in_memory();
        let a = Fingerprint {
            final_hash: 7,
            cumulative_hash: 9,
            plycount: 40,
        };
        let b = Fingerprint { plycount: 42, ..a };
        assert_eq!(store.check_and_insert(a, "a.pgn").unwrap(), None);
        assert_eq!(store.check_and_insert(b, "a.pgn").unwrap(), None);
    }

    #[test]
    fn test_on_disk_store() {
        let mut table = VirtualHashTable::create(1 << 10).unwrap();
        for n in 1..200 {
            assert_eq!(table.check_and_insert(fp(n), 1).unwrap(), None, "fresh {n}");
        }
        for n in 1..200 {
            assert_eq!(table.check_and_insert(fp(n), 2).unwrap(), Some(1), "dup {n}");
        }
    }

    #[test]
    fn test_on_disk_store_via_facade() {
        let mut store = DuplicateStore::on_disk().unwrap();
        assert_eq!(store.check_and_insert(fp(5), "x.pgn").unwrap(), None);
        assert_eq!(store.check_and_insert(fp(5), "y.pgn").unwrap(), Some("x.pgn".to_string()));
    }
}
