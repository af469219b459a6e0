use async_trait::async_trait;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CharacterInfo, MATCH_THRESHOLD, MetadataSource, SeriesMetadata, best_match};
use crate::errors::ProviderError;
use crate::providers::http_client;

/// Public GraphQL endpoint
const DEFAULT_ENDPOINT: &str = "https://graphql.anilist.co/";

/// Candidates fetched per search
const SEARCH_PAGE_SIZE: u32 = 5;

/// Characters fetched per page
const CHARACTERS_PER_PAGE: u32 = 25;

/// Character pages read per series, the first one included
const MAX_CHARACTER_PAGES: u32 = 10;

const CHARACTER_FIELDS: &str = "
      nodes { gender name { full alternative native } }
      pageInfo { hasNextPage }";

/// AniList client for the anime catalogue
#[derive(Debug)]
pub struct AniList {
    client: reqwest::Client,
    url: url::Url,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: String,
    variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Variables<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_id: Option<u64>,
    chara_page: u32,
    chara_per_page: u32,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: MediaList,
}

#[derive(Debug, Deserialize)]
struct MediaList {
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[derive(Debug, Default, Deserialize)]
struct Media {
    id: u64,
    #[serde(default)]
    title: Option<MediaTitle>,
    #[serde(default)]
    synonyms: Option<Vec<String>>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    characters: Option<CharacterConnection>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaTitle {
    romaji: Option<String>,
    native: Option<String>,
    english: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharacterConnection {
    #[serde(default)]
    page_info: Option<PageInfo>,
    #[serde(default)]
    nodes: Option<Vec<CharacterNode>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct CharacterNode {
    #[serde(default)]
    name: Option<CharacterName>,
    #[serde(default)]
    gender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CharacterName {
    full: Option<String>,
    #[serde(default)]
    alternative: Option<Vec<String>>,
    native: Option<String>,
}

impl CharacterConnection {
    fn has_next_page(&self) -> bool {
        self.page_info.as_ref().is_some_and(|info| info.has_next_page)
    }

    fn take_nodes(&mut self) -> Vec<CharacterNode> {
        self.nodes.take().unwrap_or_default()
    }
}

impl CharacterNode {
    fn into_info(self) -> CharacterInfo {
        let name = self.name.unwrap_or_default();
        let alt_names = name
            .full
            .into_iter()
            .chain(name.alternative.unwrap_or_default())
            .filter(|n| !n.trim().is_empty())
            .collect();
        CharacterInfo {
            name: name.native.unwrap_or_default(),
            alt_names,
            gender: self.gender.filter(|g| !g.trim().is_empty()),
        }
    }
}

impl Media {
    /// Titles and description only; characters are attached separately
    fn to_metadata(&self) -> SeriesMetadata {
        let title = self.title.as_ref();
        let alt_titles = title
            .into_iter()
            .flat_map(|t| [t.romaji.clone(), t.english.clone()])
            .flatten()
            .chain(self.synonyms.clone().unwrap_or_default())
            .filter(|t| !t.trim().is_empty())
            .collect();
        SeriesMetadata {
            title: title.and_then(|t| t.native.clone()).unwrap_or_default(),
            alt_titles,
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            characters: Vec::new(),
        }
    }
}

fn media_fields() -> String {
    format!(
        "id
    title {{ romaji native english }}
    synonyms
    description
    characters(page: $charaPage, perPage: $charaPerPage) {{{}
    }}",
        CHARACTER_FIELDS
    )
}

fn search_query() -> String {
    format!(
        "query ($search: String, $charaPage: Int, $charaPerPage: Int) {{
  Page(perPage: {}) {{
    media(search: $search, type: ANIME) {{
    {}
    }}
  }}
}}",
        SEARCH_PAGE_SIZE,
        media_fields()
    )
}

fn characters_query() -> String {
    format!(
        "query ($mediaId: Int, $charaPage: Int, $charaPerPage: Int) {{
  Media(id: $mediaId) {{
    id
    characters(page: $charaPage, perPage: $charaPerPage) {{{}
    }}
  }}
}}",
        CHARACTER_FIELDS
    )
}

/// Decode a GraphQL body, turning reported errors into a provider error
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    let response: GraphQlResponse<T> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Unparseable(format!("Failed to parse AniList response: {}", e)))?;
    match response.data {
        Some(data) if response.errors.is_empty() => Ok(data),
        _ => {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            Err(ProviderError::Unparseable(format!("AniList errors: {}", messages.join("; "))))
        }
    }
}

impl AniList {
    /// Create a client; an empty endpoint means the public AniList API
    pub fn new(endpoint: &str, token: Option<&str>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let endpoint = if endpoint.is_empty() { DEFAULT_ENDPOINT } else { endpoint };
        let url = url::Url::parse(endpoint)
            .map_err(|e| ProviderError::Configuration(format!("Invalid metadata endpoint '{}': {}", endpoint, e)))?;
        Ok(AniList {
            client: http_client(timeout_secs)?,
            url,
            token: token.map(str::to_string).filter(|t| !t.trim().is_empty()),
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: String, variables: Variables<'_>) -> Result<T, ProviderError> {
        let mut request = self.client.post(self.url.clone()).json(&GraphQlRequest { query, variables });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("AniList API error ({}): {}", status, body);
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        decode(&body)
    }

    /// Character pages after the first, stopping at the page limit
    async fn remaining_characters(&self, media_id: u64) -> Result<Vec<CharacterNode>, ProviderError> {
        let mut nodes = Vec::new();
        for page in 2..=MAX_CHARACTER_PAGES {
            let data: MediaData = self
                .query(
                    characters_query(),
                    Variables {
                        search: None,
                        media_id: Some(media_id),
                        chara_page: page,
                        chara_per_page: CHARACTERS_PER_PAGE,
                    },
                )
                .await?;
            let Some(mut connection) = data.media.and_then(|m| m.characters) else {
                break;
            };
            let page_nodes = connection.take_nodes();
            if page_nodes.is_empty() {
                break;
            }
            debug!("AniList media {}: {} characters on page {}", media_id, page_nodes.len(), page);
            nodes.extend(page_nodes);
            if !connection.has_next_page() {
                break;
            }
        }
        Ok(nodes)
    }
}

#[async_trait]
impl MetadataSource for AniList {
    fn name(&self) -> &str {
        "AniList"
    }

    async fn lookup(&self, title: &str) -> Result<Option<SeriesMetadata>, ProviderError> {
        let data: PageData = self
            .query(
                search_query(),
                Variables {
                    search: Some(title),
                    media_id: None,
                    chara_page: 1,
                    chara_per_page: CHARACTERS_PER_PAGE,
                },
            )
            .await?;
        debug!("AniList returned {} candidates for '{}'", data.page.media.len(), title);

        let mut candidates = data.page.media;
        let summaries: Vec<SeriesMetadata> = candidates.iter().map(Media::to_metadata).collect();
        let Some(chosen) = best_match(title, summaries.clone(), MATCH_THRESHOLD) else {
            return Ok(None);
        };
        let Some(position) = summaries.iter().position(|s| *s == chosen) else {
            return Ok(None);
        };
        let mut media = candidates.swap_remove(position);

        let mut connection = media.characters.take().unwrap_or_default();
        let mut nodes = connection.take_nodes();
        if connection.has_next_page() {
            nodes.extend(self.remaining_characters(media.id).await?);
        }

        let mut metadata = media.to_metadata();
        metadata.characters = nodes.into_iter().map(CharacterNode::into_info).collect();
        Ok(Some(metadata))
    }
}
