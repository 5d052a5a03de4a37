//! Konfigurasi Builder

/// Minimum run length yang layak dikompresi: reference unit di dalam text
/// memakan minimal 2 byte.
pub const MIN_WORD_LEN: usize = 3;

/// Builder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Kapasitas awal buffer (bytes), buffer tumbuh 2x saat penuh
    pub initial_capacity: usize,
    /// Panjang minimum run kata yang dicoba untuk dictionary compression
    pub min_word_len: usize,
    /// Jika `false`, `write_text` hanya menulis raw code points
    pub compress_text: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            min_word_len: MIN_WORD_LEN,
            compress_text: true,
        }
    }
}

impl BuilderConfig {
    /// Effective minimum run length, never below [`MIN_WORD_LEN`].
    #[inline(always)]
    pub fn word_len(&self) -> usize {
        self.min_word_len.max(MIN_WORD_LEN)
    }
}
