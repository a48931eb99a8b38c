use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The unit of sync: everything the site personalizes on, in plaintext.
///
/// Exists only on the client. The server stores this as an opaque ciphertext
/// and can never reconstruct it. All sub-structures default so that blobs
/// written by older clients still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDataDocument {
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub district: Districts,
    #[serde(default)]
    pub representatives: Representatives,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub bills_voted: Vec<BillVote>,
    #[serde(default)]
    pub faq_bookmarks: Vec<String>,
    #[serde(default)]
    pub learning_progress: BTreeMap<String, f64>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl UserDataDocument {
    /// Creates the empty document a fresh account starts from.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            address: Address::default(),
            district: Districts::default(),
            representatives: Representatives::default(),
            preferences: Preferences::default(),
            bills_voted: Vec::new(),
            faq_bookmarks: Vec::new(),
            learning_progress: BTreeMap::new(),
            stats: Stats::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for UserDataDocument {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Districts {
    #[serde(default)]
    pub congressional: String,
    #[serde(default)]
    pub state_house: String,
    #[serde(default)]
    pub state_senate: String,
}

/// A reference to a representative, resolved by the lookup widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub name: String,
    #[serde(default)]
    pub party: String,
    #[serde(default)]
    pub chamber: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Representatives {
    #[serde(default)]
    pub house: Option<Representative>,
    #[serde(default)]
    pub senate: Vec<Representative>,
    #[serde(default)]
    pub state: Vec<Representative>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Auto,
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub language: String,
    pub theme: Theme,
    pub notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            theme: Theme::Auto,
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Support,
    Oppose,
}

/// One vote a user cast on a bill through the voting widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillVote {
    pub bill_id: String,
    pub vote: VoteChoice,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total_votes: u32,
    #[serde(default)]
    pub alignment_score: f64,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_round_trips_through_json() {
        let doc = UserDataDocument::empty();
        let json = sonic_rs::to_string(&doc).unwrap();
        let back: UserDataDocument = sonic_rs::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn partial_blob_decodes_with_defaults() {
        // Older clients wrote documents without the newer fields.
        let json = r#"{"address":{"zip":"12345"},"created_at":"2025-01-15T00:00:00Z","updated_at":"2025-01-15T00:00:00Z"}"#;
        let doc: UserDataDocument = sonic_rs::from_str(json).unwrap();
        assert_eq!(doc.address.zip, "12345");
        assert_eq!(doc.preferences.language, "en");
        assert!(doc.bills_voted.is_empty());
    }
}
