use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::types::{
    Credentials, LoginResponse, PredictionAnalytics, PredictionRecord, PredictionRequest,
    RegisteredUser, UserProfile,
};
use crate::fetch::HttpClient;
use crate::fetch::auth::Bearer;
use crate::session::Session;

#[derive(Clone)]
pub struct AdvisoryClient {
    http: Arc<dyn HttpClient>,
    base_url: Url,
}

impl AdvisoryClient {
    pub fn new<C: HttpClient + 'static>(http: C, base_url: &str) -> Result<Self, ApiError> {
        Self::from_shared(Arc::new(http), base_url)
    }

    fn from_shared(http: Arc<dyn HttpClient>, base_url: &str) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("bad API base URL '{base_url}': {e}")))?;
        // Url::join drops the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    /// Returns a client that sends the session's bearer token.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotSignedIn`] when the session holds no token.
    pub fn authorize(&self, session: &Session) -> Result<AuthorizedClient, ApiError> {
        let token = session.token().ok_or(ApiError::NotSignedIn)?;
        let bearer = Bearer::new(self.http.clone(), token)
            .map_err(|e| ApiError::InvalidRequest(format!("stored token is not a valid header: {e}")))?;

        Ok(AuthorizedClient {
            inner: AdvisoryClient {
                http: Arc::new(bearer),
                base_url: self.base_url.clone(),
            },
        })
    }

    #[tracing::instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn register(&self, credentials: &Credentials) -> Result<RegisteredUser, ApiError> {
        let user = self
            .send_json(Method::POST, "api/register", Some(credentials))
            .await?;
        info!("Account registered");
        Ok(user)
    }

    #[tracing::instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.send_json(Method::POST, "api/login", Some(credentials))
            .await
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidRequest(format!("bad endpoint '{path}': {e}")))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "Advisory API request");

        let mut req = Request::new(method, url);
        req.headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::InvalidRequest(format!("unserializable body: {e}")))?;
            req.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            *req.body_mut() = Some(bytes.into());
        }

        Ok(self.http.execute(req).await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = check_status(self.send(method, path, body).await?).await?;
        Ok(resp.json().await?)
    }

    /// Like [`Self::send_json`] but maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let resp = self.send::<()>(Method::GET, path, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(path, "Advisory API returned 404");
            return Ok(None);
        }
        Ok(Some(check_status(resp).await?.json().await?))
    }
}

async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::from_response(status, &body))
}

/// Passes `result` through, but signs the session out first when the
/// service rejected its token.
pub async fn signed_in<T>(session: &mut Session, result: Result<T, ApiError>) -> anyhow::Result<T> {
    match result {
        Err(e) if e.is_auth() => {
            warn!(error = %e, "Session rejected, signing out");
            session.clear().await?;
            Err(anyhow::anyhow!("{e}; please log in again"))
        }
        other => Ok(other?),
    }
}

/// Advisory API calls that require a signed-in session.
///
/// A [`ApiError::Unauthorized`] from any of these means the token is no
/// longer valid; the caller should clear the session.
#[derive(Clone)]
pub struct AuthorizedClient {
    inner: AdvisoryClient,
}

impl AuthorizedClient {
    /// Confirms the token is still accepted and returns its owner.
    pub async fn validate_token(&self) -> Result<UserProfile, ApiError> {
        self.inner.send_json::<(), _>(Method::GET, "api/me", None).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let resp = self.inner.send::<()>(Method::POST, "api/logout", None).await?;
        check_status(resp).await?;
        info!("Logged out");
        Ok(())
    }

    #[tracing::instrument(skip(self, request), fields(crop = %request.crop_type, village = %request.village))]
    pub async fn create_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionRecord, ApiError> {
        let record: PredictionRecord = self
            .inner
            .send_json(Method::POST, "api/predict", Some(request))
            .await?;
        info!(id = record.id, result = %record.prediction_result, "Prediction created");
        Ok(record)
    }

    /// The most recent prediction, or `None` if the user has none yet.
    pub async fn latest_prediction(&self) -> Result<Option<PredictionRecord>, ApiError> {
        self.inner.get_optional("api/predictions/latest").await
    }

    /// All predictions, newest first.
    pub async fn predictions(&self) -> Result<Vec<PredictionRecord>, ApiError> {
        self.inner
            .send_json::<(), _>(Method::GET, "api/predictions", None)
            .await
    }

    pub async fn prediction(&self, id: i64) -> Result<Option<PredictionRecord>, ApiError> {
        self.inner
            .get_optional(&format!("api/predictions/{id}"))
            .await
    }

    pub async fn analytics(&self) -> Result<PredictionAnalytics, ApiError> {
        self.inner
            .send_json::<(), _>(Method::GET, "api/predictions/analytics", None)
            .await
    }
}
