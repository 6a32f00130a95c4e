//! Keyword and condition matching for addons and cross-service suggestions

pub mod addon_matcher;
pub mod cross_service;
pub mod rules;

pub use addon_matcher::{AddonMatch, AddonMatchSource, AddonMatcher};
pub use cross_service::{detect_cross_services, CrossServiceSuggestion};
pub use rules::{find_keyword, global_suppressor, keyword_present, KeywordHit};
