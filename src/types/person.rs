use serde::{Deserialize, Serialize};

use super::account::RemoteProfile;

/// A person record as returned by the people API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
}

impl Person {
    pub fn profile(&self) -> RemoteProfile {
        RemoteProfile {
            display_name: self.display_name.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            profile_url: self.profile_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PeopleBatch {
    #[serde(default)]
    pub people: Vec<Person>,
}

/// One page of `@me/@friends`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeopleCollection {
    #[serde(default)]
    pub total_results: usize,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub entry: Vec<Person>,
}
