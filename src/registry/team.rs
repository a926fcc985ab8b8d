use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};

/// A FIRST team number as accepted by the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamNumber(u32);

impl TeamNumber {
    pub const MIN: u32 = 10;
    pub const MAX: u32 = 99_999;

    pub fn new(number: u32) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&number) {
            bail!(
                "Invalid team number {}. Expected a number between {} and {}.",
                number,
                Self::MIN,
                Self::MAX
            );
        }
        Ok(Self(number))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TeamNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TeamNumber {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u32>() {
            Ok(number) => Self::new(number),
            Err(_) => bail!("Invalid team number '{}'. Expected digits only.", s),
        }
    }
}
