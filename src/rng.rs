//! Deterministic pseudorandom generator.
//!
//! `XorShift128` is a Marsaglia xorshift generator with 128 bits of state
//! (period `2^128 - 1`). Three state words start from fixed constants and the
//! fourth holds the seed, so a given seed always yields the same stream.
//!
//! The generator is an explicit value: weight initialization and shuffling
//! take `&mut XorShift128` (or any `R: Rng`) instead of touching global state.
//! It implements [`rand::RngCore`] and [`rand::SeedableRng`], so the `rand`
//! extension traits (`gen_range`, distributions, ...) work on it as well.

use rand::{RngCore, SeedableRng};

const BASE_X: u32 = 123_456_789;
const BASE_Y: u32 = 362_436_069;
const BASE_Z: u32 = 521_288_629;
const BASE_W: u32 = 88_675_123;

/// Largest `f32` strictly below 1.
const ONE_BELOW: f32 = 1.0 - f32::EPSILON / 2.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShift128 {
    x: u32,
    y: u32,
    z: u32,
    w: u32,
}

impl XorShift128 {
    /// Create a generator whose stream is fully determined by `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            x: BASE_X,
            y: BASE_Y,
            z: BASE_Z,
            w: seed,
        }
    }

    /// Reset the state to the base constants plus `seed`.
    pub fn reseed(&mut self, seed: u32) {
        *self = Self::new(seed);
    }

    /// Advance the state and return the next 32-bit word.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let t = self.x ^ (self.x << 11);
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        self.w = (self.w ^ (self.w >> 19)) ^ (t ^ (t >> 8));
        self.w
    }

    /// Uniform sample in the open interval `(0, 1)`. See [`uniform`].
    #[inline]
    pub fn uniform(&mut self) -> f32 {
        uniform(self)
    }

    /// Normal sample with the given mean and standard deviation. See [`normal`].
    #[inline]
    pub fn normal(&mut self, mean: f32, std: f32) -> f32 {
        normal(self, mean, std)
    }
}

/// Uniform sample in the open interval `(0, 1)` from one 32-bit word.
///
/// Computed as `(next + 1) / (u32::MAX + 2)`, which never yields 0 or 1.
#[inline]
pub fn uniform<R: RngCore + ?Sized>(rng: &mut R) -> f32 {
    (unit_open(rng) as f32).min(ONE_BELOW)
}

/// Normal sample with the given mean and standard deviation.
///
/// Box-Muller transform over two uniform draws; only the cosine branch is used,
/// so every output consumes exactly two words of the stream.
pub fn normal<R: RngCore + ?Sized>(rng: &mut R, mean: f32, std: f32) -> f32 {
    let u1 = unit_open(rng);
    let u2 = unit_open(rng);
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    (f64::from(std) * z + f64::from(mean)) as f32
}

#[inline]
fn unit_open<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    (f64::from(rng.next_u32()) + 1.0) / (f64::from(u32::MAX) + 2.0)
}

impl Default for XorShift128 {
    fn default() -> Self {
        Self::new(BASE_W)
    }
}

impl RngCore for XorShift128 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        XorShift128::next_u32(self)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let hi = XorShift128::next_u32(self);
        let lo = XorShift128::next_u32(self);
        (u64::from(hi) << 32) | u64::from(lo)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = XorShift128::next_u32(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShift128 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }

    /// Uses the low 32 bits of `state` as the seed word.
    fn seed_from_u64(state: u64) -> Self {
        Self::new(state as u32)
    }
}
