//! Default building concepts per zone.
//!
//! Deterministic fallbacks used when a policy path has to start a build
//! without a model-supplied concept. Keeping these per-zone (rather
//! than random) preserves planner purity.

use townforge_types::Zone;

/// The stock building concept for a zone.
pub const fn default_building_concept(zone: Zone) -> &'static str {
    match zone {
        Zone::Residential => "terraced row house",
        Zone::Commercial => "general trading post",
        Zone::Civic => "town meeting hall",
        Zone::Industrial => "timber workshop",
        Zone::Entertainment => "music hall",
    }
}
