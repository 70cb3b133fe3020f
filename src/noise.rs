//! Deterministic 2D value noise
//!
//! Integer-lattice value noise with bilinear interpolation, fractal
//! Brownian motion, and a two-field domain warp. All functions are pure:
//! the same `(x, y, seed)` always hashes to the same float on every
//! platform, which is what keeps generated maps byte-identical between
//! server and clients.

use crate::rng::mix32;

/// Hash a lattice point to [0, 1).
///
/// Knuth-style multiplicative scramble of the coordinates and seed,
/// finished with the shared avalanche mixer.
pub fn hash2d(x: i32, y: i32, seed: u32) -> f64 {
    let h = (x as u32)
        .wrapping_mul(374_761_393)
        .wrapping_add((y as u32).wrapping_mul(668_265_263))
        .wrapping_add(seed.wrapping_mul(2_654_435_761));
    mix32(h) as f64 / 4_294_967_296.0
}

/// Smoothstep fade curve for interpolation weights.
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Single-octave value noise in [0, 1).
pub fn value_noise(x: f64, y: f64, seed: u32) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let ix = x0 as i32;
    let iy = y0 as i32;

    let tx = smoothstep(x - x0);
    let ty = smoothstep(y - y0);

    let c00 = hash2d(ix, iy, seed);
    let c10 = hash2d(ix + 1, iy, seed);
    let c01 = hash2d(ix, iy + 1, seed);
    let c11 = hash2d(ix + 1, iy + 1, seed);

    let top = c00 + (c10 - c00) * tx;
    let bottom = c01 + (c11 - c01) * tx;
    top + (bottom - top) * ty
}

/// Fractal Brownian motion: `octaves` layers of value noise at doubling
/// frequency and halving amplitude, normalized back to [0, 1).
pub fn fbm(x: f64, y: f64, seed: u32, octaves: u32) -> f64 {
    let octaves = octaves.clamp(1, 6);
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut total = 0.0;

    for octave in 0..octaves {
        // Each octave gets its own hash stream so layers decorrelate
        sum += value_noise(x * frequency, y * frequency, seed.wrapping_add(octave * 0x9e37)) * amplitude;
        total += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }

    sum / total
}

/// Domain warp: two fBm fields produce an offset added to the input.
///
/// Used by the island-shape predicate to break up the radial silhouette.
/// `strength` is in input units; `scale` is the warp field frequency.
pub fn domain_warp(
    x: f64,
    y: f64,
    scale: f64,
    strength: f64,
    seed_x: u32,
    seed_y: u32,
) -> (f64, f64) {
    let dx = fbm(x * scale, y * scale, seed_x, 4) * 2.0 - 1.0;
    let dy = fbm(x * scale, y * scale, seed_y, 4) * 2.0 - 1.0;
    (x + dx * strength, y + dy * strength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_pure() {
        assert_eq!(hash2d(12, -7, 99), hash2d(12, -7, 99));
        assert_ne!(hash2d(12, -7, 99), hash2d(12, -7, 100));
        assert_ne!(hash2d(12, -7, 99), hash2d(13, -7, 99));
    }

    #[test]
    fn test_value_noise_matches_lattice_at_integers() {
        // At integer coordinates the bilinear blend collapses to the corner hash
        let v = value_noise(3.0, 5.0, 1234);
        assert!((v - hash2d(3, 5, 1234)).abs() < 1e-12);
    }

    #[test]
    fn test_fbm_stays_in_unit_interval() {
        for i in 0..64 {
            let x = i as f64 * 0.37 - 8.0;
            let y = i as f64 * 0.61 - 8.0;
            let v = fbm(x, y, 777, 6);
            assert!((0.0..1.0).contains(&v), "fbm out of range: {v}");
        }
    }

    #[test]
    fn test_warp_strength_zero_is_identity() {
        let (wx, wy) = domain_warp(0.3, -0.4, 2.0, 0.0, 1, 2);
        assert_eq!(wx, 0.3);
        assert_eq!(wy, -0.4);
    }
}
