//! Wholesaler channels and the table set each one owns.
//!
//! Every channel keeps its own rooms, plans, stock, prices and bookings. The
//! ledger code is written once against [`ChannelTables`] and selects the table
//! set by channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A distribution partner through which rooms and plans are sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wholesaler {
    Tl,
    Temairazu,
    Neppan,
    Rakutsu,
    DirectIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown wholesaler: {0}")]
pub struct UnknownWholesaler(pub String);

impl Wholesaler {
    pub const ALL: [Wholesaler; 5] = [
        Wholesaler::Tl,
        Wholesaler::Temairazu,
        Wholesaler::Neppan,
        Wholesaler::Rakutsu,
        Wholesaler::DirectIn,
    ];

    /// Prefix applied to every table of this channel.
    pub fn table_prefix(&self) -> &'static str {
        match self {
            Wholesaler::Tl => "tl",
            Wholesaler::Temairazu => "temairazu",
            Wholesaler::Neppan => "neppan",
            Wholesaler::Rakutsu => "rakutsu",
            Wholesaler::DirectIn => "directin",
        }
    }

    pub fn tables(&self) -> ChannelTables {
        ChannelTables::for_prefix(self.table_prefix())
    }
}

impl fmt::Display for Wholesaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_prefix())
    }
}

impl FromStr for Wholesaler {
    type Err = UnknownWholesaler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Wholesaler::ALL
            .into_iter()
            .find(|w| w.table_prefix() == wanted)
            .ok_or_else(|| UnknownWholesaler(s.to_string()))
    }
}

/// Physical table names for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTables {
    pub room_types: String,
    pub plans: String,
    pub stocks: String,
    pub prices: String,
    pub bookings: String,
}

impl ChannelTables {
    fn for_prefix(prefix: &str) -> Self {
        Self {
            room_types: format!("{prefix}_room_types"),
            plans: format!("{prefix}_plans"),
            stocks: format!("{prefix}_stocks"),
            prices: format!("{prefix}_prices"),
            bookings: format!("{prefix}_bookings"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Wholesaler::from_str("TL").unwrap(), Wholesaler::Tl);
        assert_eq!(
            Wholesaler::from_str("directin").unwrap(),
            Wholesaler::DirectIn
        );
        assert!(Wholesaler::from_str("expedia").is_err());
    }

    #[test]
    fn test_tables_are_prefixed() {
        let tables = Wholesaler::Neppan.tables();
        assert_eq!(tables.stocks, "neppan_stocks");
        assert_eq!(tables.prices, "neppan_prices");
        assert_eq!(tables.room_types, "neppan_room_types");
    }

    #[test]
    fn test_display_matches_serde() {
        for w in Wholesaler::ALL {
            let json = serde_json::to_string(&w).unwrap();
            assert_eq!(json, format!("\"{}\"", w));
        }
    }
}
