use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use super::{Cast, MetadataProvider, ProviderError, ProviderResult, Work};
use crate::error::{Result, SixDegreesError};
use crate::graph::{PersonId, WorkId};

/// Search results (`/search/person`, `/search/movie`)
#[derive(Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct PersonHit {
    id: u64,
}

#[derive(Deserialize)]
struct MovieHit {
    id: u64,
}

/// `/person/{id}/movie_credits` and `/movie/{id}/credits`
#[derive(Deserialize)]
struct CreditsResponse<T> {
    #[serde(default = "Vec::new")]
    cast: Vec<T>,
}

#[derive(Deserialize)]
struct MovieCredit {
    id: u64,
    title: Option<String>,
}

#[derive(Deserialize)]
struct CastMember {
    id: u64,
    name: Option<String>,
}

/// `/person/{id}`
#[derive(Deserialize)]
struct PersonDetails {
    name: Option<String>,
}

/// Connection settings for [`TmdbProvider`]
#[derive(Debug, Clone)]
pub struct TmdbSettings {
    /// API root, e.g. `https://api.themoviedb.org/3`
    pub base_url: String,
    /// v3 API key, or a v4 read access token (JWT, sent as a bearer token)
    pub api_key: String,
    /// Language for titles and names, e.g. `pt-BR`
    pub language: String,
    pub timeout: Duration,
    /// Retries for 429, 5xx and network errors
    pub max_retries: usize,
    /// First backoff delay; doubles on every retry
    pub initial_backoff: Duration,
}

impl Default for TmdbSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: String::new(),
            language: "en-US".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// The Movie Database (TMDB) v3 client
///
/// People are TMDB person IDs and works are TMDB movie IDs. Movie IDs come
/// straight from a person's `movie_credits`, so titles are never looked up
/// to find a cast.
pub struct TmdbProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    language: String,
    timeout: Duration,
    max_retries: usize,
    initial_backoff: Duration,
}

impl TmdbProvider {
    /// Create a new TMDB client
    ///
    /// Fails with a configuration error if the base URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(settings: TmdbSettings) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = settings.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            SixDegreesError::Config(format!("Invalid provider base_url {}: {}", settings.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SixDegreesError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key,
            language: settings.language,
            timeout: settings.timeout,
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff,
        })
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Malformed(format!("bad endpoint {}: {}", path, e)))
    }

    /// GET a JSON document, retrying transient failures with exponential backoff.
    /// `Ok(None)` means the provider answered 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ProviderResult<Option<T>> {
        let url = self.endpoint(path)?;
        let mut attempt = 0;
        let mut delay = self.initial_backoff;

        loop {
            match self.get_once(&url, query).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    log::warn!(
                        "TMDB {} retry {}/{} after error: {}",
                        path,
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> ProviderResult<Option<T>> {
        let mut request = self
            .client
            .get(url.clone())
            .query(query)
            .query(&[("language", self.language.as_str())]);
        request = if self.api_key.starts_with("eyJ") {
            request.bearer_auth(&self.api_key)
        } else {
            request.query(&[("api_key", self.api_key.as_str())])
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        serde_json::from_slice::<T>(&body)
            .map(Some)
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", url.path(), e)))
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    async fn resolve_person_id(&self, name: &str) -> ProviderResult<Option<PersonId>> {
        let found: Option<SearchResponse<PersonHit>> =
            self.get_json("search/person", &[("query", name)]).await?;
        Ok(found
            .and_then(|r| r.results.into_iter().next())
            .map(|hit| PersonId(hit.id)))
    }

    async fn list_works_for_person(&self, person: PersonId) -> ProviderResult<Vec<Work>> {
        let path = format!("person/{}/movie_credits", person.0);
        let credits: Option<CreditsResponse<MovieCredit>> = self.get_json(&path, &[]).await?;

        // The same movie appears once per character played
        let mut seen = HashSet::new();
        Ok(credits
            .map(|c| c.cast)
            .unwrap_or_default()
            .into_iter()
            .filter(|credit| seen.insert(credit.id))
            .map(|credit| Work {
                id: WorkId(credit.id),
                title: credit.title.unwrap_or_default(),
            })
            .collect())
    }

    async fn resolve_work_id(&self, title: &str) -> ProviderResult<Option<WorkId>> {
        let found: Option<SearchResponse<MovieHit>> =
            self.get_json("search/movie", &[("query", title)]).await?;
        Ok(found
            .and_then(|r| r.results.into_iter().next())
            .map(|hit| WorkId(hit.id)))
    }

    async fn list_cast_for_work(&self, work: WorkId) -> ProviderResult<Cast> {
        let path = format!("movie/{}/credits", work.0);
        let credits: Option<CreditsResponse<CastMember>> = self.get_json(&path, &[]).await?;
        Ok(credits
            .map(|c| c.cast)
            .unwrap_or_default()
            .into_iter()
            .map(|member| (PersonId(member.id), member.name.unwrap_or_default()))
            .collect())
    }

    async fn resolve_person_name(&self, person: PersonId) -> ProviderResult<Option<String>> {
        let path = format!("person/{}", person.0);
        let details: Option<PersonDetails> = self.get_json(&path, &[]).await?;
        Ok(details.and_then(|d| d.name))
    }
}
