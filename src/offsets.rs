//! Sequential and random I/O offset generation.
//!
//! Sequential and random patterns share one generator shape: precompute a
//! fixed power-of-two array of byte offsets up front (using
//! `rand_xoshiro::Xoshiro256PlusPlus` for the random case) so `next()` on
//! the hot path is an index-and-increment with no per-call RNG draw or
//! allocation.

use crate::error::BenchError;
use crate::plan::{AccessPattern, Region};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Default size of the precomputed offset array. Must be a power of two so
/// `next()` can wrap with a bitmask instead of a modulo.
pub const DEFAULT_TABLE_SIZE: usize = 65_536;

/// Precomputed table of byte offsets, cycled by [`OffsetGenerator::next`].
#[derive(Debug, Clone)]
pub struct OffsetGenerator {
    offsets: Vec<u64>,
    mask: usize,
    index: usize,
}

impl OffsetGenerator {
    /// Build a generator for `pattern` over `region`, using `block_size` as
    /// the step (sequential) or the multiplier from block index to byte
    /// offset (random). `seed` drives the random draw; it has no effect for
    /// `Sequential`. `logical_sector_size` is `Some` when the workload
    /// requires sector-aligned offsets (bypass-cache); every precomputed
    /// offset is checked against it.
    pub fn new(
        pattern: AccessPattern,
        region: Region,
        block_size: u64,
        seed: u64,
        logical_sector_size: Option<u64>,
        table_size: usize,
    ) -> Result<Self, BenchError> {
        let table_size = table_size.next_power_of_two().max(1);
        let region_length = region.length;
        let blocks_in_region = region_length / block_size;
        if blocks_in_region < 1 {
            return Err(BenchError::InvalidWorkload {
                name: String::new(),
                reason: format!(
                    "region of {region_length} bytes holds fewer than one {block_size}-byte block"
                ),
            });
        }

        let mut offsets = Vec::with_capacity(table_size);
        match pattern {
            AccessPattern::Sequential => {
                let mut cursor = 0u64;
                for _ in 0..table_size {
                    offsets.push(region.offset + cursor);
                    cursor += block_size;
                    if cursor >= blocks_in_region * block_size {
                        cursor = 0;
                    }
                }
            }
            AccessPattern::Random => {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                for _ in 0..table_size {
                    let block_index = rng.gen_range(0..blocks_in_region);
                    offsets.push(region.offset + block_index * block_size);
                }
            }
        }

        if let Some(sector) = logical_sector_size {
            if sector > 0 {
                for &off in &offsets {
                    if off % sector != 0 {
                        return Err(BenchError::InvalidWorkload {
                            name: String::new(),
                            reason: format!(
                                "generated offset {off} is not a multiple of sector size {sector}"
                            ),
                        });
                    }
                }
            }
        }

        Ok(Self {
            mask: table_size - 1,
            offsets,
            index: 0,
        })
    }

    /// Return the next offset in the precomputed cycle and advance.
    #[inline(always)]
    pub fn next(&mut self) -> u64 {
        let off = self.offsets[self.index & self.mask];
        self.index = self.index.wrapping_add(1);
        off
    }
}
