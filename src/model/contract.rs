use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::ConfigError;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Option expiry, written the way Deribit names it: `3AUG25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expiry(NaiveDate);

impl Expiry {
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for Expiry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ConfigError::Expiry(s.to_string());
        let code = s.trim().to_uppercase();

        let digits = code.chars().take_while(|c| c.is_ascii_digit()).count();
        if !code.is_ascii() || !(1..=2).contains(&digits) || code.len() != digits + 5 {
            return Err(err());
        }
        let (day, rest) = code.split_at(digits);
        let (month, year) = rest.split_at(3);

        let day: u32 = day.parse().map_err(|_| err())?;
        let month = MONTHS.iter().position(|m| *m == month).ok_or_else(err)? as u32 + 1;
        if !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let year: i32 = 2000 + year.parse::<i32>().map_err(|_| err())?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Expiry)
            .ok_or_else(err)
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:02}",
            self.0.day(),
            MONTHS[self.0.month0() as usize],
            self.0.year() % 100
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Call,
}

impl OptionKind {
    fn suffix(&self) -> &'static str {
        match self {
            OptionKind::Call => "C",
        }
    }
}

/// One option instrument. Built once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub underlying: String,
    pub expiry: Expiry,
    pub strike: u64,
    pub kind: OptionKind,
}

impl Contract {
    pub fn call(underlying: &str, expiry: Expiry, strike: u64) -> Self {
        Contract {
            underlying: underlying.to_uppercase(),
            expiry,
            strike,
            kind: OptionKind::Call,
        }
    }

    /// Deribit instrument name, e.g. `BTC-3AUG25-106000-C`.
    pub fn instrument_name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.underlying,
            self.expiry,
            self.strike,
            self.kind.suffix()
        )
    }

    /// Strike as the OKX chain renders it, e.g. `106,000`.
    pub fn strike_label(&self) -> String {
        let digits = self.strike.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }
}

/// The fixed contract set: one call per strike, in configured order.
pub fn build_contracts(underlying: &str, expiry: Expiry, strikes: &[u64]) -> Vec<Contract> {
    strikes
        .iter()
        .map(|&strike| Contract::call(underlying, expiry, strike))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_round_trips_deribit_code() {
        let expiry: Expiry = "3AUG25".parse().unwrap();
        assert_eq!(expiry.date(), NaiveDate::from_ymd_opt(2025, 8, 3).unwrap());
        assert_eq!(expiry.to_string(), "3AUG25");

        let expiry: Expiry = "26dec25".parse().unwrap();
        assert_eq!(expiry.to_string(), "26DEC25");
    }

    #[test]
    fn expiry_rejects_garbage() {
        for bad in ["", "AUG25", "3AUG", "32AUG25", "3XYZ25", "123AUG25", "3AUG2025", "3AUGX5"] {
            assert!(bad.parse::<Expiry>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn instrument_name_follows_deribit_convention() {
        let expiry: Expiry = "3AUG25".parse().unwrap();
        let contract = Contract::call("btc", expiry, 106_000);
        assert_eq!(contract.instrument_name(), "BTC-3AUG25-106000-C");
    }

    #[test]
    fn strike_label_uses_thousands_separators() {
        let expiry: Expiry = "3AUG25".parse().unwrap();
        assert_eq!(Contract::call("BTC", expiry, 106_000).strike_label(), "106,000");
        assert_eq!(Contract::call("BTC", expiry, 1_250_000).strike_label(), "1,250,000");
        assert_eq!(Contract::call("BTC", expiry, 950).strike_label(), "950");
    }

    #[test]
    fn contracts_keep_strike_order() {
        let expiry: Expiry = "3AUG25".parse().unwrap();
        let contracts = build_contracts("BTC", expiry, &[110_000, 106_000, 108_000]);
        let strikes: Vec<u64> = contracts.iter().map(|c| c.strike).collect();
        assert_eq!(strikes, vec![110_000, 106_000, 108_000]);
    }
}
