use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Recency weight for `hot`: last activity in unix milliseconds is divided
/// by this before being added to the vote score.
pub const HOT_RECENCY_DIVISOR: f64 = 1e9;

/// Summed vote value of thread `t`, given the per-thread vote totals joined as `vs`.
pub const SCORE_EXPR: &str = "COALESCE(vs.score, 0)";

/// Thread list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
}

#[derive(Debug, thiserror::Error)]
#[error("sort must be one of hot, new, top")]
pub struct UnknownSort;

impl SortMode {
    /// ORDER BY clause over the thread list query. Ranking happens in the
    /// database, so every page is a slice of one global order.
    pub fn order_by(self) -> String {
        match self {
            SortMode::New => "t.created_at DESC, t.id DESC".to_string(),
            SortMode::Top => format!("{SCORE_EXPR} DESC, t.created_at DESC, t.id DESC"),
            SortMode::Hot => format!(
                "({SCORE_EXPR} + t.last_activity_at / {:e}) DESC, t.id DESC",
                HOT_RECENCY_DIVISOR
            ),
        }
    }
}

impl FromStr for SortMode {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            _ => Err(UnknownSort),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes_only() {
        assert_eq!("hot".parse::<SortMode>().unwrap(), SortMode::Hot);
        assert_eq!("new".parse::<SortMode>().unwrap(), SortMode::New);
        assert_eq!("top".parse::<SortMode>().unwrap(), SortMode::Top);
        assert!("best".parse::<SortMode>().is_err());
        assert_eq!(SortMode::default(), SortMode::Hot);
    }

    #[test]
    fn hot_clause_uses_the_recency_divisor() {
        assert_eq!(
            SortMode::Hot.order_by(),
            "(COALESCE(vs.score, 0) + t.last_activity_at / 1e9) DESC, t.id DESC"
        );
    }
}
