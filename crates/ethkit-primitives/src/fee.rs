//! Fee arithmetic shared by the monitor's provider calls and the Finalizer's
//! fee-bump logic (spec §9: "Replacement fee math").
//!
//! Percent margins are always applied with a ceiling, never division-first,
//! to avoid rounding a bump below the chain's replacement threshold.

/// `ceil(value * (100 + margin_pct) / 100)`, computed in `u128` because gas
/// prices/fee caps comfortably fit (wei-per-gas, not wei) and the calling
/// sites already operate in `u128`.
pub fn apply_margin_ceil(value: u128, margin_pct: u32) -> u128 {
    let numerator = value.saturating_mul(100u128 + margin_pct as u128);
    (numerator + 99) / 100
}

/// The minimum value that is both `>= floor` and satisfies a `bump_pct`
/// increase over `previous`, per the replacement rule (spec GLOSSARY):
/// remote nodes accept a same-nonce replacement only if it strictly exceeds
/// the previous by the configured bump.
pub fn bumped_at_least(previous: u128, bump_pct: u32, floor: u128) -> u128 {
    apply_margin_ceil(previous, bump_pct).max(floor)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn margin_ceils_instead_of_truncating() {
        // 10 * 1.10 = 11 exactly.
        assert_eq!(apply_margin_ceil(10, 10), 11);
        // 101 * 1.10 = 111.1 -> ceil to 112, never 111 (division-first would truncate).
        assert_eq!(apply_margin_ceil(101, 10), 112);
    }

    #[test]
    fn bump_respects_floor() {
        // previous=10, bump=10% -> 11, but current chain target is 30: take 30.
        assert_eq!(bumped_at_least(10, 10, 30), 30);
        // previous=100, bump=10% -> 110, chain target only 30: take 110.
        assert_eq!(bumped_at_least(100, 10, 30), 110);
    }

    #[test]
    fn zero_margin_is_identity() {
        assert_eq!(apply_margin_ceil(42, 0), 42);
    }

    proptest! {
        // Spec §8 invariant 5 ("replacement dominance") and §9 ("must guard
        // against ... loss of precision") both reduce to: a margin never
        // rounds down below the exact rational bump.
        #[test]
        fn margin_never_truncates_below_exact(value in 0u128..1_000_000_000_000, margin in 0u32..500) {
            let result = apply_margin_ceil(value, margin);
            let exact_numerator = value as u128 * (100 + margin as u128);
            prop_assert!(result * 100 >= exact_numerator);
        }

        #[test]
        fn bumped_at_least_never_goes_below_previous(previous in 0u128..1_000_000_000_000, bump in 0u32..100, floor in 0u128..1_000_000_000_000) {
            let result = bumped_at_least(previous, bump, floor);
            prop_assert!(result >= previous);
            prop_assert!(result >= floor);
        }
    }
}
