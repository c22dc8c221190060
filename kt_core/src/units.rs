//! # Unit Types
//!
//! Stress wrappers for the values that cross the input boundary. Internally
//! every stress is a plain `f64` in psi; allowables are tabulated in ksi and
//! converted exactly once.
//!
//! ## Example
//!
//! ```rust
//! use kt_core::units::{Ksi, Psi};
//!
//! let ktdls: Psi = Ksi(86.0).into();
//! assert_eq!(ktdls.value(), 86_000.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// Stress in pounds per square inch (psi)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Psi(pub f64);

/// Stress in kips per square inch (ksi)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ksi(pub f64);

impl From<Psi> for Ksi {
    fn from(psi: Psi) -> Self {
        Ksi(psi.0 / 1000.0)
    }
}

impl From<Ksi> for Psi {
    fn from(ksi: Ksi) -> Self {
        Psi(ksi.0 * 1000.0)
    }
}

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }
        }
    };
}

impl_arithmetic!(Psi);
impl_arithmetic!(Ksi);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ksi_psi_conversion() {
        let s: Psi = Ksi(129.0).into();
        assert_eq!(s.0, 129_000.0);
        let back: Ksi = s.into();
        assert_eq!(back.0, 129.0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Psi(10.0);
        let b = Psi(5.0);
        assert_eq!((a + b).0, 15.0);
        assert_eq!((a - b).0, 5.0);
        assert_eq!((a * 2.0).0, 20.0);
        assert_eq!((a / 2.0).0, 5.0);
    }

    #[test]
    fn test_transparent_serialization() {
        let json = serde_json::to_string(&Ksi(86.0)).unwrap();
        assert_eq!(json, "86.0");
    }
}
