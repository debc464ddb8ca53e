//! Strava API client
//!
//! This module wraps the handful of Strava v3 endpoints the sync needs: the
//! OAuth token refresh, the current athlete, the paginated route listing and
//! the route detail endpoint that carries the full-resolution polyline.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{RouteSummary, RouteType};
use crate::config::Credentials;

/// Base URL for the Strava v3 REST API
pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";

/// OAuth token endpoint
pub const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Number of routes requested per listing page
pub const ROUTES_PER_PAGE: u32 = 200;

/// Timeout applied to every request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when talking to the Strava API
#[derive(Debug, Error)]
pub enum StravaError {
    /// The token endpoint rejected the credentials
    #[error("Token refresh rejected with HTTP {status}")]
    AuthRejected { status: u16 },

    /// Strava is rate limiting this application
    #[error("Rate limited by Strava (HTTP 429). Try again later or reduce frequency.")]
    RateLimited,

    /// An endpoint answered with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Short-lived bearer token returned by the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// The authenticated athlete
#[derive(Debug, Clone, Deserialize)]
pub struct Athlete {
    pub id: u64,
}

/// Response from the OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// `map` block of a route object
#[derive(Debug, Default, Deserialize)]
struct ApiMap {
    #[serde(default)]
    polyline: Option<String>,
    #[serde(default)]
    summary_polyline: Option<String>,
}

impl ApiMap {
    /// Full-resolution polyline, falling back to the summary one
    fn best_polyline(self) -> Option<String> {
        self.polyline
            .filter(|p| !p.is_empty())
            .or(self.summary_polyline.filter(|p| !p.is_empty()))
    }
}

/// A route object as returned by the listing endpoint
#[derive(Debug, Deserialize)]
struct ApiRoute {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default = "default_route_type")]
    route_type: RouteType,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    elevation_gain: Option<f64>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    map: Option<ApiMap>,
}

fn default_route_type() -> RouteType {
    RouteType::Other
}

/// A route object as returned by the detail endpoint
#[derive(Debug, Deserialize)]
struct ApiRouteDetail {
    #[serde(default)]
    map: Option<ApiMap>,
}

impl From<ApiRoute> for RouteSummary {
    fn from(route: ApiRoute) -> Self {
        let name = route
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Route {}", route.id));

        RouteSummary {
            id: route.id,
            name,
            route_type: route.route_type,
            distance_m: route.distance.unwrap_or(0.0),
            elev_gain_m: route.elevation_gain,
            updated_at: route.updated_at.or(route.created_at),
            summary_polyline: route.map.and_then(ApiMap::best_polyline),
        }
    }
}

/// Routes collected from the paginated listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteListing {
    pub routes: Vec<RouteSummary>,
    /// The page cap was hit while pages were still full, so more routes may exist
    pub truncated: bool,
}

/// Remote source of routes
///
/// Implemented by [`StravaClient`] for the real API. The sync pipeline is
/// generic over this trait so it can run against an in-memory source.
#[allow(async_fn_in_trait)]
pub trait RouteApi {
    /// Exchanges the refresh token for a short-lived access token
    async fn refresh_access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<AccessToken, StravaError>;

    /// Looks up the athlete the token belongs to
    async fn current_athlete(&self, token: &AccessToken) -> Result<Athlete, StravaError>;

    /// Fetches one page of the athlete's routes (pages start at 1)
    async fn list_routes_page(
        &self,
        token: &AccessToken,
        athlete_id: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RouteSummary>, StravaError>;

    /// Fetches the encoded polyline for a single route, if it has one
    async fn route_polyline(
        &self,
        token: &AccessToken,
        route_id: u64,
    ) -> Result<Option<String>, StravaError>;

    /// Fetches every route of the athlete by walking the listing pages
    ///
    /// Stops at the first empty or short page, or after `max_pages` pages. In
    /// the latter case the listing is marked as truncated.
    async fn list_routes(
        &self,
        token: &AccessToken,
        athlete_id: u64,
        per_page: u32,
        max_pages: u32,
    ) -> Result<RouteListing, StravaError> {
        let mut routes = Vec::new();

        for page in 1..=max_pages {
            let batch = self
                .list_routes_page(token, athlete_id, page, per_page)
                .await?;
            let len = batch.len();
            debug!(page, count = len, "Fetched route page");

            routes.extend(batch);
            if len < per_page as usize {
                return Ok(RouteListing {
                    routes,
                    truncated: false,
                });
            }
        }

        warn!(
            max_pages,
            count = routes.len(),
            "Stopped at the page limit while pages were still full; more routes may exist"
        );
        Ok(RouteListing {
            routes,
            truncated: true,
        })
    }
}

/// Client for the Strava v3 API
#[derive(Debug, Clone)]
pub struct StravaClient {
    client: Client,
    api_base: String,
    token_url: String,
}

impl StravaClient {
    /// Creates a client for the given API base and token endpoint
    pub fn with_endpoints(
        api_base: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Result<Self, StravaError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
        })
    }

    /// Performs an authenticated GET and returns the body text
    async fn get(
        &self,
        token: &AccessToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<String, StravaError> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token.as_str())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StravaError::RateLimited);
        }
        if !status.is_success() {
            return Err(StravaError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

impl RouteApi for StravaClient {
    async fn refresh_access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<AccessToken, StravaError> {
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
        ];

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StravaError::AuthRejected {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&text)?;
        info!(expires_at = ?token.expires_at, "Refreshed Strava access token");

        Ok(AccessToken::new(token.access_token))
    }

    async fn current_athlete(&self, token: &AccessToken) -> Result<Athlete, StravaError> {
        let text = self.get(token, "/athlete", &[]).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn list_routes_page(
        &self,
        token: &AccessToken,
        athlete_id: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RouteSummary>, StravaError> {
        let path = format!("/athletes/{}/routes", athlete_id);
        let query = [("page", page.to_string()), ("per_page", per_page.to_string())];
        let text = self.get(token, &path, &query).await?;

        let routes: Vec<ApiRoute> = serde_json::from_str(&text)?;
        Ok(routes.into_iter().map(RouteSummary::from).collect())
    }

    async fn route_polyline(
        &self,
        token: &AccessToken,
        route_id: u64,
    ) -> Result<Option<String>, StravaError> {
        let text = self.get(token, &format!("/routes/{}", route_id), &[]).await?;
        let detail: ApiRouteDetail = serde_json::from_str(&text)?;

        Ok(detail.map.and_then(ApiMap::best_polyline))
    }
}
