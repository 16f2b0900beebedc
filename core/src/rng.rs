//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call a platform RNG directly.
//! All randomness flows through SamplerRng instances derived
//! from the single master seed of the run.
//!
//! Each behaviour family gets its own RNG stream, seeded deterministically
//! from (master_seed XOR slot_index). This means:
//!   - Enabling a facet (e.g. the funnel) never changes the other streams.
//!   - Each stream is fully reproducible in isolation.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single behaviour family.
pub struct SamplerRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SamplerRng {
    /// Create a stream RNG from the master seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

// Lets rand_distr distributions sample straight from a stream.
impl RngCore for SamplerRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// All sampler RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_slot(&self, slot: SamplerSlot) -> SamplerRng {
        SamplerRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries — only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum SamplerSlot {
    PurchaseCount = 0,
    OrderValue = 1,
    Referral = 2,
    RequestCount = 3,
    RequestMask = 4,
    Upvote = 5,
    UpvoteMask = 6,
    ChannelAttribution = 7,
    // Add new streams here — append only.
}

impl SamplerSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PurchaseCount => "purchase_count",
            Self::OrderValue => "order_value",
            Self::Referral => "referral",
            Self::RequestCount => "request_count",
            Self::RequestMask => "request_mask",
            Self::Upvote => "upvote",
            Self::UpvoteMask => "upvote_mask",
            Self::ChannelAttribution => "channel_attribution",
        }
    }
}

/// A fresh master seed for runs that were not given one.
pub fn fresh_seed() -> u64 {
    rand::random()
}
