//! Wire shapes of the REST API and their mapping onto domain types.
//!
//! Only the fields the mirror reads are declared; serde ignores the rest.

use chrono::{DateTime, Utc};
use pipeline::{AssetId, MakeLatest, NewRelease, Release, ReleaseAsset, ReleaseId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseDto {
    pub id: u64,
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    pub html_url: String,
    pub upload_url: String,
    #[serde(default)]
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<AssetDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssetDto {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    pub browser_download_url: String,
}

impl From<ReleaseDto> for Release {
    fn from(dto: ReleaseDto) -> Self {
        Release {
            id: ReleaseId::new(dto.id),
            tag_name: dto.tag_name,
            name: dto.name.filter(|n| !n.is_empty()),
            body: dto.body,
            html_url: dto.html_url,
            upload_url: strip_uri_template(&dto.upload_url).to_string(),
            prerelease: dto.prerelease,
            published_at: dto.published_at,
            assets: dto.assets.into_iter().map(ReleaseAsset::from).collect(),
        }
    }
}

impl From<AssetDto> for ReleaseAsset {
    fn from(dto: AssetDto) -> Self {
        ReleaseAsset {
            id: AssetId::new(dto.id),
            name: dto.name,
            content_type: dto.content_type,
            size: dto.size,
            browser_download_url: dto.browser_download_url,
        }
    }
}

/// Body of `POST /repos/{owner}/{repo}/releases`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateReleaseBody<'a> {
    pub tag_name: &'a str,
    pub name: &'a str,
    pub body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_commitish: Option<&'a str>,
    pub make_latest: &'static str,
}

impl<'a> From<&'a NewRelease> for CreateReleaseBody<'a> {
    fn from(release: &'a NewRelease) -> Self {
        Self {
            tag_name: &release.tag_name,
            name: &release.name,
            body: &release.body,
            target_commitish: release.target_commitish.as_deref(),
            make_latest: MakeLatest::as_str(release.make_latest),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct IssueStateBody {
    pub state: &'static str,
}

/// Removes the RFC 6570 suffix GitHub appends to upload URLs
/// (`.../assets{?name,label}`).
pub(crate) fn strip_uri_template(url: &str) -> &str {
    url.split_once('{').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_JSON: &str = r#"{
        "url": "https://api.github.com/repos/plotly/plotly.js/releases/1",
        "id": 1,
        "tag_name": "v2.5.0",
        "name": "v2.5.0",
        "body": "Changes",
        "draft": false,
        "prerelease": false,
        "html_url": "https://github.com/plotly/plotly.js/releases/tag/v2.5.0",
        "upload_url": "https://uploads.github.com/repos/plotly/plotly.js/releases/1/assets{?name,label}",
        "published_at": "2021-09-06T15:00:00Z",
        "assets": [{
            "id": 10,
            "name": "plotly-esm-min.tar.gz",
            "content_type": "application/gzip",
            "size": 1234,
            "state": "uploaded",
            "browser_download_url": "https://github.com/o/r/releases/download/v2.5.0/plotly-esm-min.tar.gz"
        }]
    }"#;

    #[test]
    fn maps_release_payload_onto_domain_release() {
        let dto: ReleaseDto = serde_json::from_str(RELEASE_JSON).unwrap();
        let release = Release::from(dto);

        assert_eq!(release.id, ReleaseId::new(1));
        assert_eq!(release.tag_name, "v2.5.0");
        assert_eq!(
            release.upload_url,
            "https://uploads.github.com/repos/plotly/plotly.js/releases/1/assets"
        );
        assert!(release.published_at.is_some());
        assert!(release.has_asset("plotly-esm-min.tar.gz"));
        assert_eq!(release.assets[0].size, 1234);
    }

    #[test]
    fn empty_release_name_becomes_none() {
        let json = RELEASE_JSON.replace(r#""name": "v2.5.0""#, r#""name": """#);
        let release = Release::from(serde_json::from_str::<ReleaseDto>(&json).unwrap());
        assert_eq!(release.name, None);
    }

    #[test]
    fn create_body_serializes_legacy_latest_and_omits_missing_target() {
        let new = NewRelease {
            tag_name: "v2.5.0".to_string(),
            name: "v2.5.0".to_string(),
            body: "[plotly.js release](https://x)".to_string(),
            target_commitish: None,
            make_latest: MakeLatest::Legacy,
        };
        let json = serde_json::to_value(CreateReleaseBody::from(&new)).unwrap();
        assert_eq!(json["make_latest"], "legacy");
        assert_eq!(json["tag_name"], "v2.5.0");
        assert!(json.get("target_commitish").is_none());
    }

    #[test]
    fn strip_uri_template_leaves_plain_urls_alone() {
        assert_eq!(strip_uri_template("https://u/assets{?name,label}"), "https://u/assets");
        assert_eq!(strip_uri_template("https://u/assets"), "https://u/assets");
    }
}
