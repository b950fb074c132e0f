use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Gender, GenderPreference, ParticipantId, Profile, Subscription, VipPreferences};

/// Errors that can occur when looking up profiles and subscriptions
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key or project")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// External profile and subscription collaborator
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Profile/eligibility record, `None` if the participant is unknown
    async fn get_profile(&self, id: &ParticipantId) -> Result<Option<Profile>, ProfileError>;

    async fn is_vip_active(&self, id: &ParticipantId) -> Result<bool, ProfileError>;

    async fn get_vip_preferences(&self, id: &ParticipantId) -> Result<VipPreferences, ProfileError>;

    /// VIP preferences if the subscription is active
    async fn vip_status(&self, id: &ParticipantId) -> Result<Option<VipPreferences>, ProfileError> {
        if !self.is_vip_active(id).await? {
            return Ok(None);
        }
        Ok(Some(self.get_vip_preferences(id).await?))
    }
}

/// Collection IDs in Appwrite
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub profiles: String,
    pub subscriptions: String,
}

/// Appwrite-backed profile directory
///
/// Looks up one document per participant by its `userId` attribute in the
/// profiles and subscriptions collections.
pub struct AppwriteDirectory {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
}

impl AppwriteDirectory {
    /// Create a new Appwrite directory client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
        timeout: Duration,
    ) -> Result<Self, ProfileError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
        })
    }

    /// Fetch the first document in `collection` whose `userId` equals `id`
    async fn find_by_user<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &ParticipantId,
    ) -> Result<Option<T>, ProfileError> {
        let user_id = serde_json::to_string(id.as_str())
            .map_err(|e| ProfileError::InvalidResponse(e.to_string()))?;
        let queries = vec![format!("equal(\"userId\", [{}])", user_id), "limit(1)".to_string()];
        let queries_json = serde_json::to_string(&queries)
            .map_err(|e| ProfileError::InvalidResponse(e.to_string()))?;

        let url = format!(
            "{}/databases/{}/collections/{}/documents?query={}",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection,
            urlencoding::encode(&queries_json)
        );

        tracing::debug!("Fetching {} document for {}", collection, id);

        let response = self
            .client
            .get(&url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ProfileError::Unauthorized),
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(ProfileError::ApiError(format!(
                    "Failed to fetch {} for {}: {}",
                    collection, id, status
                )));
            }
            _ => {}
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProfileError::InvalidResponse("Missing documents array".into()))?;

        let Some(doc) = documents.first() else {
            return Ok(None);
        };

        // Extract data from Appwrite document format
        let data = doc.get("data").unwrap_or(doc);

        serde_json::from_value(data.clone())
            .map(Some)
            .map_err(|e| ProfileError::InvalidResponse(format!("Failed to parse {} document: {}", collection, e)))
    }

    async fn subscription(&self, id: &ParticipantId) -> Result<Option<Subscription>, ProfileError> {
        self.find_by_user(&self.collections.subscriptions, id).await
    }
}

#[async_trait]
impl ProfileDirectory for AppwriteDirectory {
    async fn get_profile(&self, id: &ParticipantId) -> Result<Option<Profile>, ProfileError> {
        self.find_by_user(&self.collections.profiles, id).await
    }

    async fn is_vip_active(&self, id: &ParticipantId) -> Result<bool, ProfileError> {
        Ok(self.subscription(id).await?.is_some_and(|s| s.is_active))
    }

    async fn get_vip_preferences(&self, id: &ParticipantId) -> Result<VipPreferences, ProfileError> {
        Ok(self
            .subscription(id)
            .await?
            .map(|s| VipPreferences {
                gender: s.gender_preference,
            })
            .unwrap_or_default())
    }

    // One round-trip instead of two
    async fn vip_status(&self, id: &ParticipantId) -> Result<Option<VipPreferences>, ProfileError> {
        Ok(self
            .subscription(id)
            .await?
            .filter(|s| s.is_active)
            .map(|s| VipPreferences {
                gender: s.gender_preference,
            }))
    }
}

/// In-memory profile directory for tests, benchmarks and local runs
#[derive(Debug, Default)]
pub struct StaticProfileDirectory {
    profiles: RwLock<HashMap<ParticipantId, Profile>>,
    vip: RwLock<HashMap<ParticipantId, VipPreferences>>,
    unavailable: RwLock<HashSet<ParticipantId>>,
}

impl StaticProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a free participant
    pub fn add_free(&self, id: impl Into<ParticipantId>, gender: Gender) -> ParticipantId {
        let id = id.into();
        self.put_profile(Profile {
            user_id: id.to_string(),
            banned: false,
            gender: Some(gender),
        });
        id
    }

    /// Register a participant with an active VIP subscription
    pub fn add_vip(&self, id: impl Into<ParticipantId>, gender: Gender, preference: GenderPreference) -> ParticipantId {
        let id = self.add_free(id, gender);
        self.set_vip(&id, Some(preference));
        id
    }

    pub fn put_profile(&self, profile: Profile) {
        let id = ParticipantId::from(profile.user_id.clone());
        write(&self.profiles).insert(id, profile);
    }

    /// Activate (`Some`) or cancel (`None`) a VIP subscription
    pub fn set_vip(&self, id: &ParticipantId, preference: Option<GenderPreference>) {
        let mut vip = write(&self.vip);
        match preference {
            Some(gender) => vip.insert(id.clone(), VipPreferences { gender }),
            None => vip.remove(id),
        };
    }

    pub fn ban(&self, id: &ParticipantId) {
        if let Some(profile) = write(&self.profiles).get_mut(id) {
            profile.banned = true;
        }
    }

    /// Make every lookup for `id` fail, as if the collaborator were down
    pub fn set_unavailable(&self, id: &ParticipantId, unavailable: bool) {
        let mut set = write(&self.unavailable);
        if unavailable {
            set.insert(id.clone());
        } else {
            set.remove(id);
        }
    }

    fn check_available(&self, id: &ParticipantId) -> Result<(), ProfileError> {
        if read(&self.unavailable).contains(id) {
            return Err(ProfileError::ApiError(format!("Profile service unavailable for {}", id)));
        }
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ProfileDirectory for StaticProfileDirectory {
    async fn get_profile(&self, id: &ParticipantId) -> Result<Option<Profile>, ProfileError> {
        self.check_available(id)?;
        Ok(read(&self.profiles).get(id).cloned())
    }

    async fn is_vip_active(&self, id: &ParticipantId) -> Result<bool, ProfileError> {
        self.check_available(id)?;
        Ok(read(&self.vip).contains_key(id))
    }

    async fn get_vip_preferences(&self, id: &ParticipantId) -> Result<VipPreferences, ProfileError> {
        self.check_available(id)?;
        Ok(read(&self.vip).get(id).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory(server_url: String) -> AppwriteDirectory {
        AppwriteDirectory::new(
            server_url,
            "test_key".to_string(),
            "test_project".to_string(),
            "test_db".to_string(),
            AppwriteCollections {
                profiles: "profiles".to_string(),
                subscriptions: "subscriptions".to_string(),
            },
            Duration::from_secs(5),
        )
        .expect("Failed to create client")
    }

    #[tokio::test]
    async fn test_appwrite_profile_lookup() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/databases/test_db/collections/profiles/documents")
            .match_query(mockito::Matcher::Any)
            .match_header("X-Appwrite-Key", "test_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total":1,"documents":[{"userId":"42","banned":false,"gender":"female"}]}"#)
            .create_async()
            .await;

        let profile = directory(server.url())
            .get_profile(&ParticipantId::from("42"))
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(profile.gender, Some(Gender::Female));
        assert!(!profile.banned);
    }

    #[tokio::test]
    async fn test_appwrite_missing_document_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/databases/test_db/collections/profiles/documents")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"total":0,"documents":[]}"#)
            .create_async()
            .await;

        let profile = directory(server.url()).get_profile(&ParticipantId::from("7")).await.unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_appwrite_vip_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/databases/test_db/collections/subscriptions/documents")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"documents":[{"userId":"42","isActive":true,"genderPreference":"male"}]}"#)
            .create_async()
            .await;

        let status = directory(server.url()).vip_status(&ParticipantId::from("42")).await.unwrap();
        assert_eq!(
            status,
            Some(VipPreferences {
                gender: GenderPreference::Male
            })
        );
    }

    #[tokio::test]
    async fn test_appwrite_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/databases/test_db/collections/profiles/documents")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("GET", "/databases/test_db/collections/subscriptions/documents")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let dir = directory(server.url());
        let id = ParticipantId::from("42");
        assert!(matches!(dir.get_profile(&id).await, Err(ProfileError::Unauthorized)));
        assert!(matches!(dir.is_vip_active(&id).await, Err(ProfileError::ApiError(_))));
    }

    #[tokio::test]
    async fn test_static_directory() {
        let dir = StaticProfileDirectory::new();
        let a = dir.add_vip("a", Gender::Male, GenderPreference::Female);
        let b = dir.add_free("b", Gender::Female);

        assert_eq!(dir.vip_status(&a).await.unwrap().map(|p| p.gender), Some(GenderPreference::Female));
        assert_eq!(dir.vip_status(&b).await.unwrap(), None);

        dir.ban(&b);
        assert!(dir.get_profile(&b).await.unwrap().unwrap().banned);

        dir.set_unavailable(&a, true);
        assert!(dir.get_profile(&a).await.is_err());
    }
}
