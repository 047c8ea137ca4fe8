//! Deterministic perturbation
//!
//! The hash is a public contract: `h = h * 31 + unit (mod 2^32)` over the
//! UTF-16 code units of the seed. Any implementation that follows it
//! reproduces the same comparisons for the same inputs.

/// Stable 32-bit polynomial rolling hash of `seed`
#[must_use]
pub fn seed_hash(seed: &str) -> u32 {
    seed.encode_utf16()
        .fold(0u32, |hash, unit| hash.wrapping_mul(31).wrapping_add(u32::from(unit)))
}

/// Seed-derived value in `[min, max]`
#[must_use]
pub fn jitter(seed: &str, min: f64, max: f64) -> f64 {
    let ratio = f64::from(seed_hash(seed) % 10_000) / 9_999.0;
    min + (max - min) * ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_known_values() {
        assert_eq!(seed_hash(""), 0);
        assert_eq!(seed_hash("a"), 97);
        assert_eq!(seed_hash("ab"), 97 * 31 + 98);
        // wraps instead of overflowing
        let long = "x".repeat(64);
        assert_eq!(seed_hash(&long), seed_hash(&long));
    }

    #[test]
    fn hash_uses_utf16_units() {
        // U+1F600 is a surrogate pair in UTF-16
        let expected = 0xD83Du32.wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(seed_hash("\u{1F600}"), expected);
    }

    #[test]
    fn jitter_interpolates() {
        assert_eq!(jitter("", -3.0, 3.0), -3.0);
        let value = jitter("a", 0.0, 1.0);
        assert!((value - 97.0 / 9999.0).abs() < 1e-12);
    }

    #[test]
    fn jitter_stays_in_range() {
        for i in 0..500 {
            let seed = format!("node-{i}:confidence");
            let v = jitter(&seed, -5.0, 4.0);
            assert!((-5.0..=4.0).contains(&v), "{seed} -> {v}");
        }
    }

    #[test]
    fn jitter_is_deterministic() {
        assert_eq!(
            jitter("decision-1:cost", -0.04, 0.04),
            jitter("decision-1:cost", -0.04, 0.04)
        );
    }
}
