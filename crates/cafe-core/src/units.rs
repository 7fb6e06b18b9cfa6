//! # Unit Converter
//!
//! Converts a recipe quantity into a raw item's stocking unit.
//!
//! ## Supported Families
//! ```text
//! ┌──────────────┬──────────────────┬───────────────┐
//! │ Family       │ Units            │ Base          │
//! ├──────────────┼──────────────────┼───────────────┤
//! │ Mass         │ g, kg            │ g   (kg=1000) │
//! │ Volume       │ ml, l            │ ml  (l=1000)  │
//! └──────────────┴──────────────────┴───────────────┘
//! ```
//!
//! ## Fail-open Policy
//! An unknown unit, or a pair from different families, returns the quantity
//! unchanged with [`ConversionOutcome::Unmatched`]. The order is never
//! blocked; the caller logs the mismatch so the catalog can be cleaned up.
//! Strict accounting mode turns the same outcome into an error one layer up.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFamily {
    Mass,
    Volume,
}

/// How a conversion was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// Same unit after normalization.
    Identity,
    /// Scaled within a family.
    Converted,
    /// No rule applied; quantity returned as-is.
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub quantity: f64,
    pub outcome: ConversionOutcome,
}

impl Conversion {
    #[inline]
    pub fn is_unmatched(&self) -> bool {
        self.outcome == ConversionOutcome::Unmatched
    }
}

/// Lowercases, trims, and folds common spellings onto canonical symbols.
///
/// ```rust
/// use cafe_core::units::normalize_unit;
///
/// assert_eq!(normalize_unit("  Grams "), "g");
/// assert_eq!(normalize_unit("Litre"), "l");
/// assert_eq!(normalize_unit("scoop"), "scoop");
/// ```
pub fn normalize_unit(unit: &str) -> String {
    let unit = unit.trim().to_lowercase();
    let canonical = match unit.as_str() {
        "g" | "gr" | "gram" | "grams" | "gramme" | "grammes" => "g",
        "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => "kg",
        "ml" | "mls" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => "ml",
        "l" | "ltr" | "liter" | "liters" | "litre" | "litres" => "l",
        _ => return unit,
    };
    canonical.to_string()
}

/// Family and factor to the family's base unit, for a normalized unit.
fn base_factor(unit: &str) -> Option<(UnitFamily, f64)> {
    match unit {
        "g" => Some((UnitFamily::Mass, 1.0)),
        "kg" => Some((UnitFamily::Mass, 1000.0)),
        "ml" => Some((UnitFamily::Volume, 1.0)),
        "l" => Some((UnitFamily::Volume, 1000.0)),
        _ => None,
    }
}

/// Converts `quantity` from `from_unit` to `to_unit`.
///
/// ```rust
/// use cafe_core::units::{convert, ConversionOutcome};
///
/// let c = convert(250.0, "ml", "L");
/// assert!((c.quantity - 0.25).abs() < 1e-12);
/// assert_eq!(c.outcome, ConversionOutcome::Converted);
///
/// let c = convert(5.0, "scoop", "g");
/// assert_eq!(c.quantity, 5.0);
/// assert!(c.is_unmatched());
/// ```
pub fn convert(quantity: f64, from_unit: &str, to_unit: &str) -> Conversion {
    let from = normalize_unit(from_unit);
    let to = normalize_unit(to_unit);

    if from == to {
        return Conversion {
            quantity,
            outcome: ConversionOutcome::Identity,
        };
    }

    match (base_factor(&from), base_factor(&to)) {
        (Some((from_family, from_factor)), Some((to_family, to_factor)))
            if from_family == to_family =>
        {
            Conversion {
                quantity: quantity * from_factor / to_factor,
                outcome: ConversionOutcome::Converted,
            }
        }
        _ => Conversion {
            quantity,
            outcome: ConversionOutcome::Unmatched,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_unit_is_identity() {
        let c = convert(18.0, "g", " G ");
        assert_eq!(c.quantity, 18.0);
        assert_eq!(c.outcome, ConversionOutcome::Identity);

        // Unknown but identical units are still identity, not unmatched.
        let c = convert(2.0, "Shot", "shot");
        assert_eq!(c.outcome, ConversionOutcome::Identity);
    }

    #[test]
    fn test_mass_and_volume() {
        assert_eq!(convert(1.5, "kg", "g").quantity, 1500.0);
        assert_eq!(convert(500.0, "g", "kilogram").quantity, 0.5);
        assert_eq!(convert(2.0, "litres", "ml").quantity, 2000.0);
        assert_eq!(convert(30.0, "ml", "l").quantity, 0.03);
    }

    #[test]
    fn test_unknown_unit_fails_open() {
        let c = convert(5.0, "scoop", "g");
        assert_eq!(c.quantity, 5.0);
        assert_eq!(c.outcome, ConversionOutcome::Unmatched);
    }

    #[test]
    fn test_cross_family_fails_open() {
        let c = convert(200.0, "ml", "g");
        assert_eq!(c.quantity, 200.0);
        assert!(c.is_unmatched());
    }

    #[test]
    fn test_round_trip_g_kg() {
        // Deterministic sweep of positive quantities across magnitudes.
        let mut x = 0.001_f64;
        while x < 1.0e7 {
            let there = convert(x, "g", "kg").quantity;
            let back = convert(there, "kg", "g").quantity;
            assert!(
                (back - x).abs() <= x * 1e-12,
                "round trip drifted: {} -> {} -> {}",
                x,
                there,
                back
            );
            x = x * 1.37 + 0.011;
        }
    }

    #[test]
    fn test_round_trip_ml_l() {
        for i in 1..500 {
            let x = i as f64 * 3.3;
            let back = convert(convert(x, "ml", "l").quantity, "l", "ml").quantity;
            assert!((back - x).abs() <= x * 1e-12);
        }
    }
}
