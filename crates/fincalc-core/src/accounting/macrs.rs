//! MACRS General Depreciation System rates, half-year convention.
//!
//! Percentages of cost per recovery year. Each table has one more entry than
//! the class life because the half-year convention pushes half a year of
//! depreciation past the end of the recovery period. Every table sums to 100.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// GDS property class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacrsClass {
    #[serde(rename = "3_year")]
    ThreeYear,
    #[serde(rename = "5_year")]
    FiveYear,
    #[serde(rename = "7_year")]
    SevenYear,
    #[serde(rename = "10_year")]
    TenYear,
    #[serde(rename = "15_year")]
    FifteenYear,
    #[serde(rename = "20_year")]
    TwentyYear,
}

impl MacrsClass {
    pub const ALL: [MacrsClass; 6] = [
        MacrsClass::ThreeYear,
        MacrsClass::FiveYear,
        MacrsClass::SevenYear,
        MacrsClass::TenYear,
        MacrsClass::FifteenYear,
        MacrsClass::TwentyYear,
    ];

    /// Recovery period in years
    pub fn recovery_period(self) -> u32 {
        match self {
            MacrsClass::ThreeYear => 3,
            MacrsClass::FiveYear => 5,
            MacrsClass::SevenYear => 7,
            MacrsClass::TenYear => 10,
            MacrsClass::FifteenYear => 15,
            MacrsClass::TwentyYear => 20,
        }
    }

    /// Annual rates in percent of cost.
    pub fn rates(self) -> &'static [Decimal] {
        match self {
            MacrsClass::ThreeYear => &MACRS_3_YEAR,
            MacrsClass::FiveYear => &MACRS_5_YEAR,
            MacrsClass::SevenYear => &MACRS_7_YEAR,
            MacrsClass::TenYear => &MACRS_10_YEAR,
            MacrsClass::FifteenYear => &MACRS_15_YEAR,
            MacrsClass::TwentyYear => &MACRS_20_YEAR,
        }
    }
}

static MACRS_3_YEAR: [Decimal; 4] = [dec!(33.33), dec!(44.45), dec!(14.81), dec!(7.41)];

static MACRS_5_YEAR: [Decimal; 6] = [
    dec!(20.00),
    dec!(32.00),
    dec!(19.20),
    dec!(11.52),
    dec!(11.52),
    dec!(5.76),
];

static MACRS_7_YEAR: [Decimal; 8] = [
    dec!(14.29),
    dec!(24.49),
    dec!(17.49),
    dec!(12.49),
    dec!(8.93),
    dec!(8.92),
    dec!(8.93),
    dec!(4.46),
];

static MACRS_10_YEAR: [Decimal; 11] = [
    dec!(10.00),
    dec!(18.00),
    dec!(14.40),
    dec!(11.52),
    dec!(9.22),
    dec!(7.37),
    dec!(6.55),
    dec!(6.55),
    dec!(6.56),
    dec!(6.55),
    dec!(3.28),
];

static MACRS_15_YEAR: [Decimal; 16] = [
    dec!(5.00),
    dec!(9.50),
    dec!(8.55),
    dec!(7.70),
    dec!(6.93),
    dec!(6.23),
    dec!(5.90),
    dec!(5.90),
    dec!(5.91),
    dec!(5.90),
    dec!(5.91),
    dec!(5.90),
    dec!(5.91),
    dec!(5.90),
    dec!(5.91),
    dec!(2.95),
];

static MACRS_20_YEAR: [Decimal; 21] = [
    dec!(3.750),
    dec!(7.219),
    dec!(6.677),
    dec!(6.177),
    dec!(5.713),
    dec!(5.285),
    dec!(4.888),
    dec!(4.522),
    dec!(4.462),
    dec!(4.461),
    dec!(4.462),
    dec!(4.461),
    dec!(4.462),
    dec!(4.461),
    dec!(4.462),
    dec!(4.461),
    dec!(4.462),
    dec!(4.461),
    dec!(4.462),
    dec!(4.461),
    dec!(2.231),
];
