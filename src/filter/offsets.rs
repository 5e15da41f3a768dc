use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;

/// Whether every lane of a vector can be addressed from one start position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Addressing {
    /// All lane offsets fit the addressing range
    Low,
    /// Lanes are split into groups with separate start positions
    High,
}

/// Lane/column offsets of a strided decimating multiply
///
/// Lane `l`, column `c` reads the sample `l * D + c` positions after the
/// vector anchor. Lanes are split into groups whose in-group offsets fit the
/// addressing range; each group carries its own start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecimateOffsets {
    decimation: usize,
    lanes: usize,
    columns: usize,
    group_lanes: usize,
    addressing: Addressing,
}

impl DecimateOffsets {
    fn compute(decimation: usize, lanes: usize, columns: usize, range: usize) -> Self {
        let fits = |group: usize| (group - 1) * decimation < range;
        let group_lanes = (1..=lanes)
            .rev()
            .find(|&g| lanes.is_multiple_of(g) && fits(g))
            .unwrap_or(1);
        let addressing = if group_lanes == lanes {
            Addressing::Low
        } else {
            Addressing::High
        };
        Self {
            decimation,
            lanes,
            columns,
            group_lanes,
            addressing,
        }
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Lanes sharing one start position
    pub fn group_lanes(&self) -> usize {
        self.group_lanes
    }

    /// Start of the lane group containing `lane`, relative to the anchor
    pub fn group_start(&self, lane: usize) -> usize {
        (lane / self.group_lanes) * self.group_lanes * self.decimation
    }

    /// Offset of `lane` inside its group
    pub fn lane_offset(&self, lane: usize) -> usize {
        (lane % self.group_lanes) * self.decimation
    }

    #[inline]
    pub fn offset(&self, lane: usize, col: usize) -> usize {
        self.group_start(lane) + self.lane_offset(lane) + col
    }

    /// Column-0 offsets of the first lane group packed one nibble per lane,
    /// lowest lane in the lowest nibble.
    pub fn packed(&self) -> Option<u32> {
        if self.group_lanes > 8 {
            return None;
        }
        (0..self.group_lanes).try_fold(0u32, |packed, lane| {
            let offset = self.lane_offset(lane);
            (offset < 16).then(|| packed | ((offset as u32) << (4 * lane)))
        })
    }
}

type CacheKey = (usize, usize, usize, usize);

fn cache() -> &'static Mutex<HashMap<CacheKey, Arc<DecimateOffsets>>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, Arc<DecimateOffsets>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Offset table for `(decimation, lanes, columns, range)`, computed once per
/// process.
pub fn decimate_offsets(
    decimation: usize,
    lanes: usize,
    columns: usize,
    range: usize,
) -> Arc<DecimateOffsets> {
    let key = (decimation, lanes, columns, range);
    let mut tables = cache().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    tables
        .entry(key)
        .or_insert_with(|| {
            log::debug!(
                "Computing decimate offsets: D={} lanes={} cols={} range={}",
                decimation,
                lanes,
                columns,
                range
            );
            Arc::new(DecimateOffsets::compute(decimation, lanes, columns, range))
        })
        .clone()
}
