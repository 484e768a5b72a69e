use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Insurance payers the business bills.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Payer {
    Medicare,
    #[serde(rename = "BCBS")]
    Bcbs,
    Aetna,
}

impl Payer {
    pub const ALL: [Payer; 3] = [Payer::Medicare, Payer::Bcbs, Payer::Aetna];

    pub fn as_str(&self) -> &'static str {
        match self {
            Payer::Medicare => "Medicare",
            Payer::Bcbs => "BCBS",
            Payer::Aetna => "Aetna",
        }
    }
}

impl fmt::Display for Payer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown payer: {0}")]
pub struct UnknownPayer(pub String);

impl FromStr for Payer {
    type Err = UnknownPayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Payer::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPayer(s.to_string()))
    }
}
