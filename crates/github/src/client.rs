//! The REST client and its port implementations.

use async_trait::async_trait;
use pipeline::ports::{IssueTracker, ReleaseRepository};
use pipeline::{
    AssetUpload, IssueNumber, MirrorConfig, MirrorError, Namespace, NewRelease, Release,
    ReleaseAsset, ReleaseId, ReleasePage, ReleaseQuery, RepositoryId, Version,
};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::GithubError;
use crate::models::{AssetDto, CommentBody, CreateReleaseBody, IssueStateBody, ReleaseDto};
use crate::pagination;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("plotly-mirror/", env!("CARGO_PKG_VERSION"));

/// Releases requested per listing page (the API maximum).
pub const PER_PAGE: u32 = 100;

/// GitHub REST client bound to one upstream and one downstream repository.
pub struct GithubClient {
    http: reqwest::Client,
    api_base_url: String,
    upstream: RepositoryId,
    downstream: RepositoryId,
}

impl GithubClient {
    /// Builds an authenticated client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Setup`] if the token cannot be used as a header
    /// value or the HTTP client cannot be built.
    pub fn new(config: &MirrorConfig) -> Result<Self, GithubError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.expose()))
            .map_err(|_| GithubError::Setup("the access token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        headers.insert(header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| GithubError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upstream: config.upstream.clone(),
            downstream: config.downstream.clone(),
        })
    }

    fn repository(&self, namespace: Namespace) -> &RepositoryId {
        match namespace {
            Namespace::Upstream => &self.upstream,
            Namespace::Downstream => &self.downstream,
        }
    }

    /// `{base}/repos/{owner}/{repo}{path}`
    pub(crate) fn repo_url(&self, repository: &RepositoryId, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_base_url,
            repository.owner(),
            repository.name(),
            path
        )
    }

    /// Sends a request, mapping non-success statuses to [`GithubError::Status`].
    /// A 404 is returned as `Ok(None)`.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Option<Response>, GithubError> {
        let response = request
            .send()
            .await
            .map_err(|source| GithubError::Transport { operation, source })?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "github response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GithubError::Status {
                operation,
                status: status.as_u16(),
                message,
            });
        }
        Ok(Some(response))
    }

    /// Like [`Self::send`], but a 404 is an error too.
    async fn send_required(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, GithubError> {
        self.send(operation, request)
            .await?
            .ok_or(GithubError::Status {
                operation,
                status: StatusCode::NOT_FOUND.as_u16(),
                message: "Not Found".to_string(),
            })
    }

    async fn json<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, GithubError> {
        response
            .json()
            .await
            .map_err(|source| GithubError::Transport { operation, source })
    }

    async fn fetch_release(
        &self,
        operation: &'static str,
        url: String,
    ) -> Result<Option<Release>, GithubError> {
        match self.send(operation, self.http.get(url)).await? {
            Some(response) => {
                let dto: ReleaseDto = Self::json(operation, response).await?;
                Ok(Some(dto.into()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReleaseRepository for GithubClient {
    #[instrument(skip(self))]
    async fn get_release(
        &self,
        namespace: Namespace,
        query: &ReleaseQuery,
    ) -> Result<Option<Release>, MirrorError> {
        let repository = self.repository(namespace);
        let release = match query {
            ReleaseQuery::Tag(version) => {
                let url = self.repo_url(repository, &format!("/releases/tags/{version}"));
                self.fetch_release("get release by tag", url).await?
            }
            ReleaseQuery::Latest => {
                let url = self.repo_url(repository, "/releases/latest");
                self.fetch_release("get latest release", url).await?
            }
        };
        Ok(release)
    }

    #[instrument(skip(self))]
    async fn has_tag(&self, namespace: Namespace, version: &Version) -> Result<bool, MirrorError> {
        let url = self.repo_url(self.repository(namespace), &format!("/git/ref/tags/{version}"));
        let found = self.send("get tag reference", self.http.get(url)).await?;
        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn list_releases(
        &self,
        namespace: Namespace,
        page: u32,
    ) -> Result<ReleasePage, MirrorError> {
        const OPERATION: &str = "list releases";
        let url = self.repo_url(self.repository(namespace), "/releases");
        let request = self
            .http
            .get(url)
            .query(&[("per_page", PER_PAGE), ("page", page)]);
        let response = self.send_required(OPERATION, request).await?;

        let next_page = response
            .headers()
            .get(header::LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(pagination::next_page);
        let releases: Vec<ReleaseDto> = Self::json(OPERATION, response).await?;

        Ok(ReleasePage {
            releases: releases.into_iter().map(Release::from).collect(),
            next_page,
        })
    }

    #[instrument(skip(self, release), fields(tag = %release.tag_name))]
    async fn create_release(&self, release: &NewRelease) -> Result<Release, MirrorError> {
        const OPERATION: &str = "create release";
        let url = self.repo_url(&self.downstream, "/releases");
        let request = self.http.post(url).json(&CreateReleaseBody::from(release));

        match self.send_required(OPERATION, request).await {
            Ok(response) => {
                let dto: ReleaseDto = Self::json(OPERATION, response).await?;
                Ok(dto.into())
            }
            Err(error) if error.is_already_exists() => {
                Err(MirrorError::DownstreamReleaseAlreadyExists {
                    version: Version::parse_strict(&release.tag_name)?,
                    repository: self.downstream.clone(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_assets(&self, release: ReleaseId) -> Result<Vec<ReleaseAsset>, MirrorError> {
        const OPERATION: &str = "list release assets";
        let url = self.repo_url(&self.downstream, &format!("/releases/{release}/assets"));
        let request = self.http.get(url).query(&[("per_page", PER_PAGE)]);
        let response = self.send_required(OPERATION, request).await?;
        let assets: Vec<AssetDto> = Self::json(OPERATION, response).await?;
        Ok(assets.into_iter().map(ReleaseAsset::from).collect())
    }

    #[instrument(skip(self, release, asset), fields(release = %release.tag_name, asset = %asset.name))]
    async fn upload_asset(
        &self,
        release: &Release,
        asset: AssetUpload,
    ) -> Result<ReleaseAsset, MirrorError> {
        const OPERATION: &str = "upload release asset";
        let name = asset.name;
        let request = self
            .http
            .post(&release.upload_url)
            .query(&[("name", name.as_str())])
            .header(header::CONTENT_TYPE, asset.content_type)
            .body(asset.data);

        let upload_failed = |reason: String| MirrorError::UploadFailed {
            asset: name.clone(),
            reason,
        };
        let response = self
            .send_required(OPERATION, request)
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        let dto: AssetDto = Self::json(OPERATION, response)
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        Ok(dto.into())
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    #[instrument(skip(self, body))]
    async fn comment(&self, issue: IssueNumber, body: &str) -> Result<(), MirrorError> {
        let url = self.repo_url(&self.downstream, &format!("/issues/{issue}/comments"));
        let request = self.http.post(url).json(&CommentBody { body });
        self.send_required("create issue comment", request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&self, issue: IssueNumber) -> Result<(), MirrorError> {
        let url = self.repo_url(&self.downstream, &format!("/issues/{issue}"));
        let request = self.http.patch(url).json(&IssueStateBody { state: "closed" });
        self.send_required("close issue", request).await?;
        Ok(())
    }
}
