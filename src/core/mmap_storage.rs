//! Memory-Mapped Feature File
//!
//! File append-only berisi feature buffer yang disambung tanpa index:
//! - Zero-copy read: feature di-decode langsung dari page cache
//! - Self-describing: batas antar feature dihitung dari size unit
//! - Persistence: write_pos disimpan di header file

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{Mmap, MmapMut, MmapOptions};
use tracing::debug;

use crate::core::DictionaryStore;
use crate::error::{JbError, Result};
use crate::protocol::{JbFeature, JbReader, JbType};

/// Header di awal file
#[repr(C, align(64))]
struct FileHeader {
    magic: u64,
    version: u32,
    _reserved: u32,
    write_pos: AtomicU64,
}

const MAGIC: u64 = 0x4A42_4F4E_5F46_4631; // "JBON_FF1"
const VERSION: u32 = 1;
const HEADER_SIZE: usize = std::mem::size_of::<FileHeader>();

enum Mapping {
    Write(MmapMut),
    Read(Mmap),
}

impl Mapping {
    #[inline(always)]
    fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::Write(m) => &m[..],
            Mapping::Read(m) => &m[..],
        }
    }
}

/// Append-only mmap file of feature buffers.
pub struct FeatureFile {
    mmap: Mapping,
    capacity: usize,
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Validasi magic + version dari byte awal file yang sudah ada.
fn check_prefix(prefix: &[u8]) -> io::Result<()> {
    if prefix.len() < HEADER_SIZE {
        return Err(invalid_data(format!(
            "not a feature file: {} bytes is shorter than the header",
            prefix.len()
        )));
    }
    let mut magic = [0u8; 8];
    magic.copy_from_slice(&prefix[0..8]);
    if u64::from_ne_bytes(magic) != MAGIC {
        return Err(invalid_data("not a feature file: bad magic".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&prefix[8..12]);
    let version = u32::from_ne_bytes(version);
    if version != VERSION {
        return Err(invalid_data(format!("unsupported feature file version {version}")));
    }
    Ok(())
}

impl FeatureFile {
    /// Membuat atau membuka feature file untuk append
    ///
    /// File kosong/baru di-inisialisasi; file lain tanpa header yang valid
    /// ditolak dengan `InvalidData` dan tidak disentuh.
    ///
    /// # Arguments
    /// * `path` - Path ke file
    /// * `capacity` - Kapasitas data dalam bytes (file lama yang lebih besar tetap utuh)
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let existing = file.metadata()?.len() as usize;
        if existing > 0 {
            // validasi sebelum set_len supaya file asing tidak diubah
            let mut prefix = vec![0u8; HEADER_SIZE.min(existing)];
            file.read_exact(&mut prefix)?;
            check_prefix(&prefix)?;
        }
        let total_size = existing.max(HEADER_SIZE + capacity);
        if total_size > existing {
            file.set_len(total_size as u64)?;
        }

        // SAFETY: file dibuka read/write dan tidak di-truncate selama mapping hidup
        let mut mmap = unsafe { MmapOptions::new().len(total_size).map_mut(&file)? };

        if existing == 0 {
            // SAFETY: mapping page-aligned dan minimal HEADER_SIZE byte
            let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut FileHeader) };
            header.magic = MAGIC;
            header.version = VERSION;
            header.write_pos = AtomicU64::new(0);
        }

        let feature_file = Self {
            mmap: Mapping::Write(mmap),
            capacity: total_size - HEADER_SIZE,
        };
        feature_file.check_write_pos()?;
        debug!(
            path = %path.as_ref().display(),
            capacity = feature_file.capacity,
            used = feature_file.write_pos(),
            "opened feature file"
        );
        Ok(feature_file)
    }

    /// Buka feature file read-only: tidak membuat, memperbesar, atau
    /// menulis file. `append` pada file ini gagal.
    pub fn open_read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: mapping read-only; writer lain tidak men-truncate file
        let mmap = unsafe { Mmap::map(&file)? };
        check_prefix(&mmap)?;

        let feature_file = Self {
            capacity: mmap.len() - HEADER_SIZE,
            mmap: Mapping::Read(mmap),
        };
        feature_file.check_write_pos()?;
        debug!(
            path = %path.as_ref().display(),
            used = feature_file.write_pos(),
            "opened feature file read-only"
        );
        Ok(feature_file)
    }

    fn check_write_pos(&self) -> io::Result<()> {
        if self.write_pos() > self.capacity {
            return Err(invalid_data(
                "feature file write position beyond capacity".to_string(),
            ));
        }
        Ok(())
    }

    #[inline(always)]
    fn header(&self) -> &FileHeader {
        // SAFETY: header berada di awal mmap region, ukuran sudah divalidasi
        unsafe { &*(self.mmap.as_slice().as_ptr() as *const FileHeader) }
    }

    #[inline(always)]
    fn write_pos(&self) -> usize {
        self.header().write_pos.load(Ordering::Acquire) as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte terpakai
    pub fn len(&self) -> usize {
        self.write_pos()
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos() == 0
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.mmap, Mapping::Read(_))
    }

    /// Semua feature yang sudah ditulis, disambung.
    pub fn data(&self) -> &[u8] {
        &self.mmap.as_slice()[HEADER_SIZE..HEADER_SIZE + self.write_pos()]
    }

    /// Append satu feature buffer utuh.
    ///
    /// Returns offset feature, atau `None` jika tidak cukup ruang.
    pub fn append(&mut self, feature: &[u8]) -> Result<Option<usize>> {
        if self.is_read_only() {
            return Err(JbError::Contract("feature file opened read-only".to_string()));
        }
        let reader = JbReader::new(feature);
        let unit_type = reader.unit_type()?;
        if unit_type != JbType::Feature {
            return Err(JbError::TypeMismatch {
                offset: 0,
                expected: "feature",
                found: unit_type.name(),
            });
        }
        let size = reader.size()?;
        if size != feature.len() {
            return Err(JbError::malformed(size, "trailing bytes after feature"));
        }

        let offset = self.write_pos();
        if offset + size > self.capacity {
            return Ok(None);
        }
        let dst = HEADER_SIZE + offset;
        if let Mapping::Write(mmap) = &mut self.mmap {
            mmap[dst..dst + size].copy_from_slice(feature);
        }
        self.header()
            .write_pos
            .store((offset + size) as u64, Ordering::Release);
        Ok(Some(offset))
    }

    /// Feature pada `offset` (hasil `append`).
    pub fn feature(&self, offset: usize, store: Option<&dyn DictionaryStore>) -> Result<JbFeature<'_>> {
        let mut reader = JbReader::new(self.data());
        reader.set_offset(offset)?;
        JbFeature::read(&mut reader, store)
    }

    /// Iterasi `(offset, bytes)` tiap feature.
    pub fn iter(&self) -> FeatureIter<'_> {
        FeatureIter::new(self.data())
    }

    /// Sinkronisasi ke disk
    pub fn flush(&self) -> io::Result<()> {
        match &self.mmap {
            Mapping::Write(mmap) => mmap.flush(),
            Mapping::Read(_) => Ok(()),
        }
    }
}

/// Iterator atas feature yang disambung dalam satu buffer.
///
/// Berhenti setelah error pertama.
pub struct FeatureIter<'a> {
    reader: JbReader<'a>,
    failed: bool,
}

impl<'a> FeatureIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            reader: JbReader::new(buf),
            failed: false,
        }
    }
}

impl<'a> Iterator for FeatureIter<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_eof() {
            return None;
        }
        let offset = self.reader.offset();
        let item = self.reader.size().and_then(|size| {
            if !self.reader.is_feature() {
                return Err(JbError::malformed(offset, "expected feature"));
            }
            self.reader.set_offset(offset + size)?;
            Ok((offset, &self.reader.buffer()[offset..offset + size]))
        });
        self.failed = item.is_err();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JbBuilder;

    fn feature_bytes(id: &str, value: i32) -> Vec<u8> {
        let mut builder = JbBuilder::new(None);
        let start = builder.start_map();
        builder.write_key("value").unwrap();
        builder.write_int32(value);
        builder.end_map(start).unwrap();
        builder.build_feature(Some(id)).unwrap()
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = FeatureFile::open(dir.path().join("features.jbon"), 4096).unwrap();
        assert!(file.is_empty());

        let a = file.append(&feature_bytes("a", 1)).unwrap().unwrap();
        let b = file.append(&feature_bytes("b", 2000)).unwrap().unwrap();
        assert_eq!(a, 0);

        let feature = file.feature(b, None).unwrap();
        assert_eq!(feature.id(), Some("b"));
        let mut map = feature.root_map().unwrap();
        assert!(map.select_key("value").unwrap());
        assert_eq!(map.value().unwrap().read_int32().unwrap(), 2000);

        let ids: Vec<usize> = file.iter().map(|r| r.unwrap().0).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.jbon");
        {
            let mut file = FeatureFile::open(&path, 4096).unwrap();
            file.append(&feature_bytes("p", 7)).unwrap().unwrap();
            file.flush().unwrap();
        }
        let file = FeatureFile::open(&path, 4096).unwrap();
        assert_eq!(file.iter().count(), 1);
        assert_eq!(file.feature(0, None).unwrap().id(), Some("p"));
    }

    #[test]
    fn test_capacity_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = FeatureFile::open(dir.path().join("small.jbon"), 16).unwrap();
        let bytes = feature_bytes("too-large-for-the-file", 1);
        assert!(bytes.len() > 16);
        assert_eq!(file.append(&bytes).unwrap(), None);
        assert!(file.is_empty());
    }

    #[test]
    fn test_rejects_non_feature() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = FeatureFile::open(dir.path().join("bad.jbon"), 4096).unwrap();
        let mut builder = JbBuilder::new(None);
        builder.write_string("nope").unwrap();
        assert!(file.append(builder.as_bytes()).is_err());

        let mut bytes = feature_bytes("x", 1);
        bytes.push(0);
        assert!(file.append(&bytes).unwrap_err().is_malformed());
    }

    #[test]
    fn test_foreign_file_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");
        let raw = feature_bytes("raw", 1);
        std::fs::write(&path, &raw).unwrap();

        let err = FeatureFile::open(&path, 0).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(std::fs::read(&path).unwrap(), raw);

        let err = FeatureFile::open_read(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(std::fs::read(&path).unwrap(), raw);
    }

    #[test]
    fn test_open_read_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.jbon");
        let err = FeatureFile::open_read(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!path.exists());
    }

    #[test]
    fn test_open_read_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.jbon");
        {
            let mut file = FeatureFile::open(&path, 4096).unwrap();
            file.append(&feature_bytes("r", 3)).unwrap().unwrap();
            file.flush().unwrap();
        }
        let before = std::fs::read(&path).unwrap();

        let mut file = FeatureFile::open_read(&path).unwrap();
        assert!(file.is_read_only());
        assert_eq!(file.feature(0, None).unwrap().id(), Some("r"));
        assert_eq!(file.iter().count(), 1);
        assert!(matches!(
            file.append(&feature_bytes("w", 4)),
            Err(JbError::Contract(_))
        ));
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_iter_stops_on_corruption() {
        let mut buf = feature_bytes("ok", 1);
        buf.push(0x20);
        let items: Vec<_> = FeatureIter::new(&buf).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
