//! Hierarchical store keys
//!
//! Keys are `/`-separated relative paths without extension:
//!
//! ```text
//! seasons/{league}
//! matches/{league}/{season}/round_{n}
//! match_details/{league}/{season}/{match}/{category}
//! ```

use std::fmt;

use crate::DetailCategory;

/// Top-level directory of season lists
pub const SEASONS_DIR: &str = "seasons";
/// Top-level directory of round listings
pub const MATCHES_DIR: &str = "matches";
/// Top-level directory of per-match documents
pub const DETAILS_DIR: &str = "match_details";

/// Where a match's documents live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchLocation {
    /// League id
    pub league_id: u64,
    /// Season id
    pub season_id: u64,
    /// Match id
    pub match_id: u64,
}

impl MatchLocation {
    /// Create a location.
    pub fn new(league_id: u64, season_id: u64, match_id: u64) -> Self {
        Self {
            league_id,
            season_id,
            match_id,
        }
    }

    /// Key of one category document of this match.
    pub fn key(&self, category: DetailCategory) -> StoreKey {
        StoreKey::Detail {
            location: *self,
            category,
        }
    }
}

/// Identity of one stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Season list of a league
    Seasons {
        /// League id
        league_id: u64,
    },
    /// Match listing of one round
    Round {
        /// League id
        league_id: u64,
        /// Season id
        season_id: u64,
        /// Round number
        round: u32,
    },
    /// One detail category of one match
    Detail {
        /// Owning league/season/match
        location: MatchLocation,
        /// Category
        category: DetailCategory,
    },
}

impl StoreKey {
    /// Relative path of the key, without extension.
    pub fn as_path(&self) -> String {
        match self {
            StoreKey::Seasons { league_id } => format!("{SEASONS_DIR}/{league_id}"),
            StoreKey::Round {
                league_id,
                season_id,
                round,
            } => format!("{MATCHES_DIR}/{league_id}/{season_id}/round_{round}"),
            StoreKey::Detail { location, category } => format!(
                "{DETAILS_DIR}/{}/{}/{}/{}",
                location.league_id,
                location.season_id,
                location.match_id,
                category.slug()
            ),
        }
    }

    /// Parse a relative key path back into a key.
    pub fn parse(path: &str) -> Option<Self> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            [SEASONS_DIR, league] => Some(StoreKey::Seasons {
                league_id: league.parse().ok()?,
            }),
            [MATCHES_DIR, league, season, round] => Some(StoreKey::Round {
                league_id: league.parse().ok()?,
                season_id: season.parse().ok()?,
                round: round.strip_prefix("round_")?.parse().ok()?,
            }),
            [DETAILS_DIR, league, season, match_id, category] => Some(StoreKey::Detail {
                location: MatchLocation::new(
                    league.parse().ok()?,
                    season.parse().ok()?,
                    match_id.parse().ok()?,
                ),
                category: category.parse().ok()?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_path())
    }
}
