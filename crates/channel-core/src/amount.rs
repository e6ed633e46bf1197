//! Fixed-precision settlement amounts.
//!
//! Allocations are denominated in micro-units (six fractional digits) of
//! the settlement asset and carried as integers end to end, so repeated
//! increments never accumulate binary-float drift. On the wire the
//! clearing node expects decimal strings ("0.010000"), which is exactly
//! the `Display`/`FromStr`/serde representation here.

use crate::errors::ChannelError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of micro-units per whole unit of the settlement asset.
pub const MICRO_UNITS_PER_UNIT: u64 = 1_000_000;

/// Number of fractional digits in the wire representation.
pub const WIRE_DECIMALS: usize = 6;

/// An amount of the settlement asset, in micro-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construct from raw micro-units.
    pub const fn from_micro_units(micro: u64) -> Self {
        Amount(micro)
    }

    /// Raw micro-units.
    pub const fn micro_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction; `None` if `other > self`.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Subtraction clamped at zero. Derived balances clamp rather than
    /// error: a fully spent allocation reads as 0, never negative.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn min(self, other: Amount) -> Amount {
        Amount(self.0.min(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICRO_UNITS_PER_UNIT;
        let frac = self.0 % MICRO_UNITS_PER_UNIT;
        write!(f, "{}.{:06}", whole, frac)
    }
}

impl FromStr for Amount {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return Err(ChannelError::InvalidAmount(s.to_string()));
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(ChannelError::InvalidAmount(s.to_string()));
        }
        if frac_str.len() > WIRE_DECIMALS {
            return Err(ChannelError::InvalidAmount(format!(
                "{} has more than {} fractional digits",
                s, WIRE_DECIMALS
            )));
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| ChannelError::InvalidAmount(s.to_string()))?
        };

        let mut frac: u64 = 0;
        if !frac_str.is_empty() {
            frac = frac_str
                .parse()
                .map_err(|_| ChannelError::InvalidAmount(s.to_string()))?;
            for _ in frac_str.len()..WIRE_DECIMALS {
                frac *= 10;
            }
        }

        whole
            .checked_mul(MICRO_UNITS_PER_UNIT)
            .and_then(|w| w.checked_add(frac))
            .map(Amount)
            .ok_or_else(|| ChannelError::InvalidAmount(format!("{} overflows", s)))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_reference_amounts() {
        assert_eq!("0.01".parse::<Amount>().unwrap(), Amount::from_micro_units(10_000));
        assert_eq!("0.001".parse::<Amount>().unwrap(), Amount::from_micro_units(1_000));
        assert_eq!("1".parse::<Amount>().unwrap(), Amount::from_micro_units(1_000_000));
        assert_eq!("0.000001".parse::<Amount>().unwrap(), Amount::from_micro_units(1));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount::from_micro_units(500_000));
    }

    #[test]
    fn rejects_invalid_amounts() {
        assert!("".parse::<Amount>().is_err());
        assert!("-0.01".parse::<Amount>().is_err());
        assert!("0.0000001".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!(".".parse::<Amount>().is_err());
    }

    #[test]
    fn displays_six_fractional_digits() {
        assert_eq!(Amount::from_micro_units(10_000).to_string(), "0.010000");
        assert_eq!(Amount::from_micro_units(0).to_string(), "0.000000");
        assert_eq!(Amount::from_micro_units(1_234_567).to_string(), "1.234567");
    }

    #[test]
    fn round_trips_through_serde_as_string() {
        let amount: Amount = "0.0025".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"0.002500\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        let small = Amount::from_micro_units(100);
        let big = Amount::from_micro_units(500);
        assert_eq!(small.saturating_sub(big), Amount::ZERO);
        assert_eq!(big.saturating_sub(small), Amount::from_micro_units(400));
    }

    #[test]
    fn checked_arithmetic() {
        let a = Amount::from_micro_units(u64::MAX);
        assert!(a.checked_add(Amount::from_micro_units(1)).is_none());
        assert!(Amount::ZERO.checked_sub(Amount::from_micro_units(1)).is_none());
        assert_eq!(
            Amount::from_micro_units(3)
                .checked_add(Amount::from_micro_units(4))
                .unwrap(),
            Amount::from_micro_units(7)
        );
    }
}
