//! IQ-math fixed-point formats used by the control law.
//!
//! Each quantity class carries its own Q format, chosen for its dynamic
//! range: coefficients need headroom above unity, error history needs
//! resolution, the output is compared against raw converter counts.
//!
//! Values that travel to and from hardware (reference, feedback, output,
//! bounds) follow a raw-counts convention: the Q15 bit pattern *is* the
//! ADC/DAC code, so `Iq15::from_bits(2048)` is ADC code 2048 and reads as
//! the real value `2048 / 32768`.

use fixed::types::{I17F15, I1F31, I6F26, I8F24, I9F23};

/// Q15: references, feedback, output and output limits.
pub type Iq15 = I17F15;
/// Q23: loop gain.
pub type Iq23 = I9F23;
/// Q24: controller output history.
pub type Iq24 = I8F24;
/// Q26: filter coefficients, representable range `[-32, 32)`.
pub type Iq26 = I6F26;
/// Q31: error history.
pub type Iq31 = I1F31;

/// Multiply-accumulate keeping the high 32 bits of the widened product.
///
/// The product of a Qm and a Qn operand is exact in 64 bits at Q(m+n);
/// dropping the low word yields Q(m+n-32). The drop truncates toward
/// negative infinity, matching the reference controller's shift behavior.
pub(crate) fn mac_high(acc: i64, lhs: i32, rhs: i32) -> i64 {
    acc + ((i64::from(lhs) * i64::from(rhs)) >> 32)
}

/// Narrow a wide accumulator into a 32-bit container, saturating at the
/// container bounds rather than wrapping.
pub(crate) fn narrow(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
