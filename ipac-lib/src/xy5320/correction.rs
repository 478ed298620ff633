//! Two point correction of the IP-5320 readings
//!
//! Each channel is measured against the auto-zero input
//! and against the calibration reference selected for its
//! gain. The straight line through both points maps the
//! raw counts to counts of an ideal converter and to volts.

use crate::errors::CorrectionError;
use crate::xy5320::registers::CAL_VOLTAGES;
use crate::xy5320::{Gain, VoltageRange};

/// Ideal values for one range/gain combination
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Correction {
  /// voltage of the low point
  pub cal_lo : f64,
  /// voltage of the calibration reference
  pub cal_hi : f64,
  /// lowest voltage of the range
  pub zero   : f64,
  pub span   : f64,
}

impl Correction {
  pub fn ideal(range : VoltageRange, gain : Gain) -> Self {
    let cal_lo = match range {
      VoltageRange::Unipolar10 => CAL_VOLTAGES[3],
      _                        => 0.0,
    };
    let cal_hi = match (range, gain) {
      (_, Gain::X1)                      => CAL_VOLTAGES[0],
      (VoltageRange::Bipolar5, Gain::X2) => CAL_VOLTAGES[1],
      (VoltageRange::Bipolar5, Gain::X4) => CAL_VOLTAGES[2],
      (VoltageRange::Bipolar5, Gain::X8) => CAL_VOLTAGES[3],
      (_, Gain::X2)                      => CAL_VOLTAGES[0],
      (_, Gain::X4)                      => CAL_VOLTAGES[1],
      (_, Gain::X8)                      => CAL_VOLTAGES[2],
    };
    let (zero, span) = match range {
      VoltageRange::Bipolar5   => (-5.0, 10.0),
      VoltageRange::Bipolar10  => (-10.0, 20.0),
      VoltageRange::Unipolar10 => (0.0, 10.0),
    };
    Self {
      cal_lo,
      cal_hi,
      zero,
      span,
    }
  }
}

/// Correct one reading
///
/// # Arguments
///
/// * point     : ideal values for the channel
/// * gain      : channel gain
/// * k         : counts of the converter (4096, 16384 or 65536)
/// * raw       : averaged reading
/// * auto_zero : averaged auto-zero reading
/// * cal       : averaged calibration reading
///
/// Returns (corrected counts, volts)
pub fn correct_channel(point     : &Correction,
                       gain      : Gain,
                       k         : f64,
                       raw       : u16,
                       auto_zero : u16,
                       cal       : u16) -> Result<(i64, f64), CorrectionError> {
  if cal == auto_zero {
    return Err(CorrectionError::DegenerateCalibration);
  }
  let g     = gain.factor() as f64;
  let raw   = raw as f64;
  let az    = auto_zero as f64;
  let slope = g * (point.cal_hi - point.cal_lo) / (cal as f64 - az);
  let temp  = (k * slope / point.span) * (raw + (point.cal_lo * g - point.zero) / slope - az);
  let volts = point.span * temp / k + point.zero;
  Ok((temp as i64, volts))
}
