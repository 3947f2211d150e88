// BinWatch: Fill Estimator
//
// Maps the lid-to-trash distance to a fill percentage:
//   100 cm → 0 %   70 cm → 30 %   0 cm → 100 %
// Pure and deterministic; the caller decides what to do with "no reading".

use crate::events::{Distance, FillLevel};

/// Estimate fullness for a bin of `bin_height_cm`.
///
/// Returns `None` when there was no echo. Distances beyond the bin height
/// mean the sonar sees past the empty floor and read as 0 %.
pub fn estimate(distance: Option<Distance>, bin_height_cm: u16) -> Option<FillLevel> {
    let cm = distance?.cm().min(bin_height_cm);
    Some(FillLevel::saturating(100 - i32::from(cm)))
}
