//! IP-5320 register map and control word assembly

use crate::xy5320::{ChannelGain,
                    Gain,
                    SweepMode,
                    VoltageRange};

pub const IP_MANUFACTURER_XYCOM : u8 = 0xa3;
pub const IP_MODEL_XYCOM_5320   : u8 = 0x32;

pub const MAX_SE_CHANNELS  : usize = 40;
pub const MAX_DIF_CHANNELS : usize = 20;

/// control/status register
pub const CNTL_REG : usize = 0x00;
/// writing here starts a conversion
pub const STRT_REG : usize = 0x10;
/// conversion data
pub const AI_REG   : usize = 0x20;

/// single ended, lower 20 inputs
pub const SEL_SELECT : u16 = 0x0100;
/// single ended, upper 20 inputs
pub const SEH_SELECT : u16 = 0x0200;
pub const AZ_SELECT  : u16 = 0x0300;
/// conversion complete/trigger seen
pub const CTRIG      : u16 = 0x8000;

/// calibration reference channels
pub const CAL0 : u16 = 20;
pub const CAL1 : u16 = 21;
pub const CAL2 : u16 = 22;
pub const CAL3 : u16 = 23;

/// reference voltages of CAL0..CAL3
pub const CAL_VOLTAGES : [f64;4] = [4.9, 2.45, 1.225, 0.6125];

pub const GAIN_X2 : u16 = 0x40;
pub const GAIN_X4 : u16 = 0x80;
pub const GAIN_X8 : u16 = 0xc0;
pub const GAIN_MASK : u16 = 0xc0;

pub const READ_TRIGGER : u16 = 0xffff;

pub const BIT12_MASK : u16 = 0xfff0;
pub const BIT14_MASK : u16 = 0xfffc;
pub const BIT16_MASK : u16 = 0xffff;

pub const CON12 : f64 = 4096.0;
pub const CON14 : f64 = 16384.0;
pub const CON16 : f64 = 65536.0;

/// Gain bits and the calibration reference which
/// stays inside the input range at that gain
pub fn gain_select(range : VoltageRange, gain : Gain) -> (u16, u16) {
  match (range, gain) {
    (_, Gain::X1)                     => (0,       CAL0),
    (VoltageRange::Bipolar5, Gain::X2) => (GAIN_X2, CAL1),
    (VoltageRange::Bipolar5, Gain::X4) => (GAIN_X4, CAL2),
    (VoltageRange::Bipolar5, Gain::X8) => (GAIN_X8, CAL3),
    (_, Gain::X2)                     => (GAIN_X2, CAL0),
    (_, Gain::X4)                     => (GAIN_X4, CAL1),
    (_, Gain::X8)                     => (GAIN_X8, CAL2),
  }
}

/// Control word selecting the input of one channel
/// for the given sweep mode
pub fn build_control(range : VoltageRange,
                     mode  : SweepMode,
                     entry : &ChannelGain) -> u16 {
  let (gain_bits, cal_ch) = gain_select(range, entry.gain);
  let chan = entry.channel as u16;
  match mode {
    SweepMode::Dif => gain_bits | chan,
    SweepMode::Se  => {
      if chan < MAX_DIF_CHANNELS as u16 {
        gain_bits | SEL_SELECT | chan
      } else {
        gain_bits | SEH_SELECT | (chan - MAX_DIF_CHANNELS as u16)
      }
    }
    // the unipolar range has no true zero, it
    // uses the lowest reference instead
    SweepMode::AutoZero => match range {
      VoltageRange::Unipolar10 => gain_bits | CAL3,
      _                        => gain_bits | AZ_SELECT,
    }
    SweepMode::Calibration => gain_bits | cal_ch,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(channel : u8, gain : Gain) -> ChannelGain {
    ChannelGain { channel, gain }
  }

  #[test]
  fn single_ended_halves() {
    let r = VoltageRange::Bipolar10;
    assert_eq!(build_control(r, SweepMode::Se, &entry(3, Gain::X1)),  0x0103);
    assert_eq!(build_control(r, SweepMode::Se, &entry(25, Gain::X2)), 0x0245);
    assert_eq!(build_control(r, SweepMode::Dif, &entry(19, Gain::X8)), 0x00d3);
  }

  #[test]
  fn auto_zero_and_calibration() {
    let e = entry(7, Gain::X4);
    assert_eq!(build_control(VoltageRange::Bipolar5, SweepMode::AutoZero, &e), 0x0380);
    assert_eq!(build_control(VoltageRange::Unipolar10, SweepMode::AutoZero, &e), 0x0080 | 23);
    assert_eq!(build_control(VoltageRange::Bipolar5, SweepMode::Calibration, &e), 0x0080 | 22);
    assert_eq!(build_control(VoltageRange::Bipolar10, SweepMode::Calibration, &e), 0x0080 | 21);
  }
}
