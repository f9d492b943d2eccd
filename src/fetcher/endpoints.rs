//! Upstream endpoint paths, relative to the configured base URL.

use crate::DetailCategory;

/// Season list of a league.
pub fn seasons(league_id: u64) -> String {
    format!("/unique-tournament/{league_id}/seasons")
}

/// Events of one round of a season.
pub fn round_events(league_id: u64, season_id: u64, round: u32) -> String {
    format!("/unique-tournament/{league_id}/season/{season_id}/events/round/{round}")
}

/// One detail category of a match.
pub fn match_detail(match_id: u64, category: DetailCategory) -> String {
    format!("/event/{match_id}{}", category.endpoint_suffix())
}
