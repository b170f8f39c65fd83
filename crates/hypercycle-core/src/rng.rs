use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive a sub-RNG for an auxiliary stream (rule chemistry, urn seeding),
/// so that changing one setup stage does not shift the tick stream.
pub fn derive_stream(base_seed: u64, salt: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(
        base_seed.wrapping_add(salt.wrapping_mul(crate::constants::RNG_DERIVATION_PRIME)),
    )
}
