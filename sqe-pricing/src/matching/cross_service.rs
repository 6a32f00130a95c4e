//! Cross-service detection
//!
//! Other services the same business offers are suggested when the
//! customer's notes mention one of their keywords. Suggestions become
//! notes on the result and are never priced.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::rules::keyword_present;
use crate::models::Service;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossServiceSuggestion {
    pub service_id: Uuid,
    pub service_name: String,
    pub keyword: String,
}

impl CrossServiceSuggestion {
    pub fn note(&self) -> String {
        format!(
            "Customer mentioned '{}'; consider also quoting {}",
            self.keyword, self.service_name
        )
    }
}

/// Services other than `current` whose keywords appear un-negated in the text
pub fn detect_cross_services(
    free_text: &str,
    current: &Service,
    others: &[Service],
) -> Vec<CrossServiceSuggestion> {
    if free_text.trim().is_empty() {
        return Vec::new();
    }

    others
        .iter()
        .filter(|s| s.id != current.id)
        .filter_map(|service| {
            let keyword = service
                .keywords
                .iter()
                .find(|kw| keyword_present(free_text, kw))?;
            debug!(service = %service.name, keyword = %keyword, "Cross-service keyword found");
            Some(CrossServiceSuggestion {
                service_id: service.id,
                service_name: service.name.clone(),
                keyword: keyword.clone(),
            })
        })
        .collect()
}
