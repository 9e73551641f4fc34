//! Transposition table.
//!
//! Cache-line sized clusters of two 16-byte entries. Lookups validate a
//! 50-bit hash prefix before trusting an entry; stores follow a
//! depth-plus-generation replacement priority, preferring same-hash
//! updates, then entries whose recorded piece count exceeds the current
//! root piece count (positions that can never recur this game). Mate
//! scores are ply-adjusted on both write and read so a stored mate
//! distance stays correct when probed at a different ply.

use crate::board::PackedMove;
use crate::eval::{is_mate_score, Eval};

/// Bound type of a stored score.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TtFlag {
    Exact = 0,
    LowerBound = 1,
    UpperBound = 2,
}

/// Upper 50 bits of the hash are stored; the low bits agree within a
/// cluster by construction.
const HASH_MASK: u64 = 0xFFFF_FFFF_FFFF_C000;
const FLAG_SHIFT: u32 = 6;
const FLAG_MASK: u64 = 0b11 << FLAG_SHIFT;
const NUM_PIECES_MASK: u64 = 0b11111 << 1;
const PV_MASK: u64 = 0b1;

const INVALID_DEPTH: u8 = u8::MAX;

/// 16 bytes: packed hash/flag/piece-count/pv word, move, scores, depth
/// and generation.
#[derive(Clone, Copy)]
struct TtEntry {
    key_meta: u64,
    packed_move: PackedMove,
    score: i16,
    static_eval: i16,
    depth: u8,
    generation: u8,
}

impl TtEntry {
    const EMPTY: TtEntry = TtEntry {
        key_meta: 0,
        packed_move: PackedMove::NULL,
        score: 0,
        static_eval: 0,
        depth: INVALID_DEPTH,
        generation: 0,
    };

    #[inline]
    fn is_valid(&self) -> bool {
        self.depth != INVALID_DEPTH
    }

    #[inline]
    fn hash_bits(&self) -> u64 {
        self.key_meta & HASH_MASK
    }

    #[inline]
    fn flag(&self) -> TtFlag {
        match (self.key_meta & FLAG_MASK) >> FLAG_SHIFT {
            0 => TtFlag::Exact,
            1 => TtFlag::LowerBound,
            _ => TtFlag::UpperBound,
        }
    }

    #[inline]
    fn num_pieces(&self) -> u32 {
        (((self.key_meta & NUM_PIECES_MASK) >> 1) + 2) as u32
    }

    #[inline]
    fn is_pv(&self) -> bool {
        self.key_meta & PV_MASK != 0
    }

    /// Replacement priority: deeper and younger entries are worth more.
    #[inline]
    fn priority(&self) -> i32 {
        i32::from(self.depth) + i32::from(self.generation)
    }
}

/// One cache line worth of entries.
#[repr(align(32))]
#[derive(Clone, Copy)]
struct TtCluster {
    entries: [TtEntry; 2],
}

const _: () = assert!(std::mem::size_of::<TtCluster>() == 32);

/// A probe hit with ply-adjusted scores.
#[derive(Clone, Copy, Debug)]
pub struct TtHit {
    pub score: Eval,
    pub static_eval: Eval,
    pub packed_move: PackedMove,
    pub depth: i32,
    pub flag: TtFlag,
    pub is_pv: bool,
    pub num_pieces: u32,
}

pub struct TranspositionTable {
    clusters: Vec<TtCluster>,
    mb_size: usize,
    generation: u8,
}

impl TranspositionTable {
    /// An empty table; `resize` allocates storage.
    #[must_use]
    pub fn new(mb_size: usize) -> Self {
        let mut tt = TranspositionTable {
            clusters: Vec::new(),
            mb_size: 0,
            generation: 0,
        };
        tt.resize(mb_size);
        tt
    }

    /// Resize to `mb_size` MiB. On allocation failure the previous table
    /// is kept and a warning logged; a resize never half-completes.
    pub fn resize(&mut self, mb_size: usize) {
        if mb_size == self.mb_size {
            return;
        }
        let num_clusters = (mb_size * 1024 * 1024) / std::mem::size_of::<TtCluster>();

        let mut clusters: Vec<TtCluster> = Vec::new();
        if clusters.try_reserve_exact(num_clusters).is_err() {
            log::warn!("failed to allocate a {mb_size} MiB transposition table, keeping the old one");
            return;
        }
        clusters.resize(
            num_clusters,
            TtCluster {
                entries: [TtEntry::EMPTY; 2],
            },
        );

        self.clusters = clusters;
        self.mb_size = mb_size;
        self.generation = 0;
        log::info!(
            "transposition table resized to {mb_size} MiB ({} clusters)",
            self.clusters.len()
        );
    }

    /// Drop all entries, keeping the allocation.
    pub fn clear(&mut self) {
        for cluster in &mut self.clusters {
            cluster.entries = [TtEntry::EMPTY; 2];
        }
        self.generation = 0;
    }

    /// Bump the generation at the start of each root search.
    pub fn increment_generation(&mut self) {
        self.generation = self.generation.saturating_add(1);
    }

    #[inline]
    fn cluster_index(&self, hash: u64) -> usize {
        (hash % self.clusters.len() as u64) as usize
    }

    /// Hint the cluster for `hash` into cache before it is probed.
    #[inline]
    pub fn prefetch(&self, hash: u64) {
        if self.clusters.is_empty() {
            return;
        }
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            let ptr = self.clusters.as_ptr().add(self.cluster_index(hash));
            _mm_prefetch(ptr.cast::<i8>(), _MM_HINT_T0);
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = hash;
        }
    }

    /// Probe for `hash`; scores come back adjusted for `ply_from_root`.
    #[must_use]
    pub fn probe(&self, hash: u64, ply_from_root: usize) -> Option<TtHit> {
        if self.clusters.is_empty() {
            return None;
        }
        let cluster = &self.clusters[self.cluster_index(hash)];
        for entry in &cluster.entries {
            if entry.is_valid() && entry.hash_bits() == (hash & HASH_MASK) {
                return Some(TtHit {
                    score: from_tt_score(Eval::from(entry.score), ply_from_root),
                    // Static evals can hold tablebase mate scores, so the
                    // same adjustment applies.
                    static_eval: from_tt_score(Eval::from(entry.static_eval), ply_from_root),
                    packed_move: entry.packed_move,
                    depth: i32::from(entry.depth),
                    flag: entry.flag(),
                    is_pv: entry.is_pv(),
                    num_pieces: entry.num_pieces(),
                });
            }
        }
        None
    }

    /// Store a search result.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &mut self,
        hash: u64,
        score: Eval,
        packed_move: PackedMove,
        is_pv: bool,
        depth: i32,
        ply_from_root: usize,
        static_eval: Eval,
        flag: TtFlag,
        num_pieces_root: u32,
        num_pieces: u32,
    ) {
        if self.clusters.is_empty() {
            return;
        }
        let generation = self.generation;
        let index = self.cluster_index(hash);
        let cluster = &mut self.clusters[index];

        let new_entry = TtEntry {
            key_meta: (hash & HASH_MASK)
                | ((flag as u64) << FLAG_SHIFT)
                | ((u64::from(num_pieces.saturating_sub(2)) << 1) & NUM_PIECES_MASK)
                | u64::from(is_pv),
            packed_move,
            score: to_tt_score(score, ply_from_root) as i16,
            static_eval: to_tt_score(static_eval, ply_from_root) as i16,
            depth: depth.clamp(0, i32::from(INVALID_DEPTH) - 1) as u8,
            generation,
        };

        // Same-hash update: replace only when deeper or upgrading a
        // non-PV slot to PV.
        for entry in &mut cluster.entries {
            if entry.is_valid() && entry.hash_bits() == new_entry.hash_bits() {
                if entry.depth < new_entry.depth || (!entry.is_pv() && new_entry.is_pv()) {
                    *entry = new_entry;
                }
                return;
            }
        }

        // Otherwise take an empty or safely replaceable slot, falling
        // back to the lowest-priority entry.
        let mut replace: Option<&mut TtEntry> = None;
        let mut lowest_priority = new_entry.priority();
        for entry in &mut cluster.entries {
            if !entry.is_valid() || entry.num_pieces() > num_pieces_root {
                *entry = new_entry;
                return;
            }
            let priority = entry.priority();
            if priority < lowest_priority {
                lowest_priority = priority;
                replace = Some(entry);
            }
        }
        if let Some(entry) = replace {
            *entry = new_entry;
        }
    }

    /// How full the table is, in permille, sampled over the leading
    /// clusters.
    #[must_use]
    pub fn hashfull_per_mille(&self) -> u32 {
        let sample = self.clusters.len().min(500);
        if sample == 0 {
            return 0;
        }
        let mut used = 0u32;
        for cluster in &self.clusters[..sample] {
            for entry in &cluster.entries {
                if entry.is_valid() && entry.generation == self.generation {
                    used += 1;
                }
            }
        }
        used * 1000 / (sample as u32 * 2)
    }
}

/// Offset a mate-range score so it is stored relative to this node
/// rather than the root.
#[inline]
#[must_use]
pub(crate) fn to_tt_score(score: Eval, ply_from_root: usize) -> Eval {
    if is_mate_score(score) {
        if score > 0 {
            score + ply_from_root as Eval
        } else {
            score - ply_from_root as Eval
        }
    } else {
        score
    }
}

/// Inverse of `to_tt_score`, applied when reading at a (possibly
/// different) ply.
#[inline]
#[must_use]
pub(crate) fn from_tt_score(score: Eval, ply_from_root: usize) -> Eval {
    if is_mate_score(score) {
        if score > 0 {
            score - ply_from_root as Eval
        } else {
            score + ply_from_root as Eval
        }
    } else {
        score
    }
}
