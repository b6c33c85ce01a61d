//! Binary sellability state of a room or plan.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SalesState {
    OnSale,
    Stopped,
}

impl SalesState {
    pub fn from_stop_flag(is_stop_sales: bool) -> Self {
        if is_stop_sales {
            SalesState::Stopped
        } else {
            SalesState::OnSale
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SalesState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_mapping() {
        assert!(SalesState::from_stop_flag(true).is_stopped());
        assert!(!SalesState::from_stop_flag(false).is_stopped());
    }
}
