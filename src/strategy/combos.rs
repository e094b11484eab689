//! Named multi-leg structures
//!
//! Purely descriptive: combos are reported next to the classification
//! and never change a tag.

use tracing::debug;

use super::types::{ComboKind, OptionCombo};
use crate::common::types::OptionType;
use crate::portfolio::{OptionLeg, UnderlyingGroup};

/// Find straddles, strangles and vertical spreads among whole legs
///
/// Legs are scanned in canonical order and each leg joins at most one
/// combo. Both legs must share expiry and multiplier.
pub fn detect_combos(group: &UnderlyingGroup) -> Vec<OptionCombo> {
    let legs = group.canonical_legs();
    let mut used = vec![false; legs.len()];
    let mut combos = Vec::new();

    for i in 0..legs.len() {
        if used[i] {
            continue;
        }
        for j in (i + 1)..legs.len() {
            if used[j] {
                continue;
            }
            if let Some(kind) = combo_kind(legs[i], legs[j]) {
                debug!(
                    "{} and {} form {:?}",
                    legs[i].describe(),
                    legs[j].describe(),
                    kind
                );
                combos.push(OptionCombo {
                    kind,
                    underlying: group.symbol.clone(),
                    expiry: legs[i].expiry,
                    legs: vec![legs[i].id, legs[j].id],
                    contracts: legs[i].quantity.abs().min(legs[j].quantity.abs()),
                });
                used[i] = true;
                used[j] = true;
                break;
            }
        }
    }

    combos
}

fn combo_kind(a: &OptionLeg, b: &OptionLeg) -> Option<ComboKind> {
    if a.expiry != b.expiry || a.multiplier != b.multiplier {
        return None;
    }

    let same_sign = a.is_short() == b.is_short();
    match (a.option_type == b.option_type, same_sign) {
        // call with put, same direction
        (false, true) => Some(match (a.strike == b.strike, a.is_short()) {
            (true, false) => ComboKind::LongStraddle,
            (true, true) => ComboKind::ShortStraddle,
            (false, false) => ComboKind::LongStrangle,
            (false, true) => ComboKind::ShortStrangle,
        }),
        // same type, opposite direction
        (true, false) if a.strike != b.strike => Some(match a.option_type {
            OptionType::Call => ComboKind::CallVerticalSpread,
            OptionType::Put => ComboKind::PutVerticalSpread,
        }),
        _ => None,
    }
}
