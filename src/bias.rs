// bias.rs - Shared reference preference (alpha), one writer and many readers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sentinel stored while the preference is being searched for.
pub const UNSET: f64 = -1.0;

/// Constructor for the single-writer α cell.
///
/// The value is stored as raw `f64` bits in one atomic word, so a reader
/// sees either the old or the new value, never a mix.
pub struct BiasParameter;

impl BiasParameter {
    /// Create an unset cell, returning its only writer and a first reader.
    pub fn unset() -> (BiasWriter, BiasReader) {
        Self::with_bits(UNSET.to_bits())
    }

    /// Create a cell already holding `alpha`.
    pub fn with_value(alpha: f64) -> (BiasWriter, BiasReader) {
        Self::with_bits(alpha.to_bits())
    }

    fn with_bits(bits: u64) -> (BiasWriter, BiasReader) {
        let cell = Arc::new(AtomicU64::new(bits));
        (BiasWriter { cell: Arc::clone(&cell) }, BiasReader { cell })
    }
}

/// Exclusive write handle. Not `Clone`: whoever owns it is the only writer.
#[derive(Debug)]
pub struct BiasWriter {
    cell: Arc<AtomicU64>,
}

impl BiasWriter {
    /// Publish a new α to every reader in a single store.
    pub fn set(&mut self, alpha: f64) {
        self.cell.store(alpha.to_bits(), Ordering::Release);
    }

    /// Return the cell to the searching sentinel.
    pub fn clear(&mut self) {
        self.cell.store(UNSET.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> Option<f64> {
        decode(self.cell.load(Ordering::Acquire))
    }

    pub fn reader(&self) -> BiasReader {
        BiasReader { cell: Arc::clone(&self.cell) }
    }
}

/// Read-only handle given to chains and reports.
#[derive(Debug, Clone)]
pub struct BiasReader {
    cell: Arc<AtomicU64>,
}

impl BiasReader {
    /// Current α, or `None` while unset.
    pub fn get(&self) -> Option<f64> {
        decode(self.cell.load(Ordering::Acquire))
    }

    /// Raw stored value, `UNSET` included.
    pub fn raw(&self) -> f64 {
        f64::from_bits(self.cell.load(Ordering::Acquire))
    }

    /// True when `writer` publishes to this reader's cell.
    pub fn is_fed_by(&self, writer: &BiasWriter) -> bool {
        Arc::ptr_eq(&self.cell, &writer.cell)
    }
}

fn decode(bits: u64) -> Option<f64> {
    let alpha = f64::from_bits(bits);
    // anything not strictly positive counts as unset
    if alpha > 0.0 { Some(alpha) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_single_writer_updates() {
        let (mut writer, reader) = BiasParameter::unset();
        let other = reader.clone();
        assert_eq!(reader.get(), None);
        assert_eq!(reader.raw(), UNSET);

        writer.set(2.5);
        assert_eq!(reader.get(), Some(2.5));
        assert_eq!(other.get(), Some(2.5));

        writer.clear();
        assert_eq!(other.get(), None);

        let (elsewhere, _) = BiasParameter::with_value(1.0);
        assert!(reader.is_fed_by(&writer));
        assert!(!reader.is_fed_by(&elsewhere));
    }
}
