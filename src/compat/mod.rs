//! Blood-type compatibility for red cell transfusion.
//!
//! O- can donate to every group and AB+ can receive from every group.

use std::collections::BTreeSet;

use crate::models::BloodType;

use BloodType::*;

/// Donor groups acceptable to each recipient group.
fn donors_for(recipient: BloodType) -> &'static [BloodType] {
    match recipient {
        APositive => &[APositive, ANegative, OPositive, ONegative],
        ANegative => &[ANegative, ONegative],
        BPositive => &[BPositive, BNegative, OPositive, ONegative],
        BNegative => &[BNegative, ONegative],
        AbPositive => &[
            AbPositive, AbNegative, APositive, ANegative, BPositive, BNegative, OPositive,
            ONegative,
        ],
        AbNegative => &[AbNegative, ANegative, BNegative, ONegative],
        OPositive => &[OPositive, ONegative],
        ONegative => &[ONegative],
    }
}

/// Recipient groups that can receive from each donor group.
fn recipients_for(donor: BloodType) -> &'static [BloodType] {
    match donor {
        APositive => &[APositive, AbPositive],
        ANegative => &[APositive, ANegative, AbPositive, AbNegative],
        BPositive => &[BPositive, AbPositive],
        BNegative => &[BPositive, BNegative, AbPositive, AbNegative],
        AbPositive => &[AbPositive],
        AbNegative => &[AbPositive, AbNegative],
        OPositive => &[APositive, BPositive, AbPositive, OPositive],
        ONegative => &[
            APositive, ANegative, BPositive, BNegative, AbPositive, AbNegative, OPositive,
            ONegative,
        ],
    }
}

/// Blood groups that may donate to `recipient`.
pub fn compatible_donors(recipient: BloodType) -> BTreeSet<BloodType> {
    donors_for(recipient).iter().copied().collect()
}

/// Blood groups that may receive from `donor`.
pub fn compatible_recipients(donor: BloodType) -> BTreeSet<BloodType> {
    recipients_for(donor).iter().copied().collect()
}

pub fn is_compatible(donor: BloodType, recipient: BloodType) -> bool {
    donors_for(recipient).contains(&donor)
}

/// Like [`compatible_donors`] but keyed by label. Unknown labels give an empty set.
pub fn compatible_donors_for_label(recipient: &str) -> BTreeSet<BloodType> {
    BloodType::parse(recipient)
        .map(compatible_donors)
        .unwrap_or_default()
}

/// Like [`compatible_recipients`] but keyed by label. Unknown labels give an empty set.
pub fn compatible_recipients_for_label(donor: &str) -> BTreeSet<BloodType> {
    BloodType::parse(donor)
        .map(compatible_recipients)
        .unwrap_or_default()
}
