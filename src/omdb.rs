use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use image::DynamicImage;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::movie::{MovieDetail, MovieSummary};

/// Read-only access to a remote movie database.
///
/// Futures are boxed and `'static` so callers can move them into spawned tasks.
pub trait MovieApi: Send + Sync {
  fn search(&self, query: &str) -> BoxFuture<'static, Result<Vec<MovieSummary>, FetchError>>;
  fn detail(&self, id: &str) -> BoxFuture<'static, Result<MovieDetail, FetchError>>;
  /// Download and decode the poster image at `url`.
  fn poster(&self, url: &str) -> BoxFuture<'static, Result<DynamicImage, FetchError>>;
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct SearchBody {
  #[serde(rename = "Search", default)]
  search: Vec<SearchItem>,
  #[serde(rename = "Response", default)]
  response: Option<String>,
  #[serde(rename = "Error", default)]
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
  #[serde(rename = "imdbID")]
  imdb_id: String,
  #[serde(rename = "Title", default)]
  title: String,
  #[serde(rename = "Year", default)]
  year: String,
  #[serde(rename = "Poster", default)]
  poster: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailBody {
  #[serde(rename = "imdbID")]
  imdb_id: String,
  #[serde(rename = "Title")]
  title: String,
  #[serde(rename = "Year")]
  year: String,
  #[serde(rename = "Poster")]
  poster: String,
  #[serde(rename = "Runtime")]
  runtime: String,
  #[serde(rename = "imdbRating")]
  imdb_rating: String,
  #[serde(rename = "Plot")]
  plot: String,
  #[serde(rename = "Released")]
  released: String,
  #[serde(rename = "Actors")]
  actors: String,
  #[serde(rename = "Director")]
  director: String,
  #[serde(rename = "Genre")]
  genre: String,
  #[serde(rename = "Response")]
  response: Option<String>,
  #[serde(rename = "Error")]
  error: Option<String>,
}

fn is_false_response(response: Option<&str>) -> bool {
  response.is_some_and(|r| r.eq_ignore_ascii_case("false"))
}

// --- Parsing ---

/// Leading integer of a runtime label: `142 min` → 142. `N/A` and junk → 0.
pub fn parse_runtime(raw: &str) -> u32 {
  raw.split_whitespace().next().and_then(|n| n.parse().ok()).unwrap_or(0)
}

/// Numeric rating, `N/A` → 0.0.
pub fn parse_rating(raw: &str) -> f64 {
  raw.trim().parse::<f64>().ok().filter(|r| r.is_finite()).unwrap_or(0.0)
}

fn parse_search_body(body: &str) -> Result<Vec<MovieSummary>, FetchError> {
  let body: SearchBody = serde_json::from_str(body).map_err(|e| {
    warn!(err = %e, "search response could not be decoded");
    FetchError::FetchFailed
  })?;
  if is_false_response(body.response.as_deref()) || body.search.is_empty() {
    debug!(api_error = body.error.as_deref().unwrap_or(""), "search returned no match");
    return Err(FetchError::NotFound);
  }
  Ok(
    body
      .search
      .into_iter()
      .map(|item| MovieSummary { id: item.imdb_id, title: item.title, year: item.year, poster_url: item.poster })
      .collect(),
  )
}

fn parse_detail_body(requested_id: &str, body: &str) -> Result<MovieDetail, FetchError> {
  let body: DetailBody = serde_json::from_str(body).map_err(|e| {
    warn!(err = %e, id = requested_id, "detail response could not be decoded");
    FetchError::FetchFailed
  })?;
  if is_false_response(body.response.as_deref()) {
    debug!(api_error = body.error.as_deref().unwrap_or(""), id = requested_id, "detail returned no match");
    return Err(FetchError::NotFound);
  }
  let id = if body.imdb_id.is_empty() { requested_id.to_string() } else { body.imdb_id };
  Ok(MovieDetail {
    id,
    title: body.title,
    year: body.year,
    poster_url: body.poster,
    runtime_minutes: parse_runtime(&body.runtime),
    runtime_label: body.runtime,
    external_rating: parse_rating(&body.imdb_rating),
    plot: body.plot,
    released_date: body.released,
    actors: body.actors,
    director: body.director,
    genre: body.genre,
  })
}

// --- HTTP client ---

/// OMDb-style HTTP client: one endpoint, `s=` for search, `i=` for detail.
#[derive(Debug, Clone)]
pub struct OmdbClient {
  client: Client,
  base_url: String,
  api_key: String,
}

impl OmdbClient {
  pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build().context("Failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.to_string(), api_key: api_key.to_string() })
  }

  fn request(&self, param: &str, value: &str) -> RequestBuilder {
    self.client.get(&self.base_url).query(&[("apikey", self.api_key.as_str()), (param, value)])
  }
}

async fn send_checked(request: RequestBuilder) -> Result<Response, FetchError> {
  let response = request.send().await?;
  let status = response.status();
  if !status.is_success() {
    warn!(status = %status, "remote request returned non-success status");
    return Err(FetchError::FetchFailed);
  }
  Ok(response)
}

async fn fetch_body(request: RequestBuilder) -> Result<String, FetchError> {
  Ok(send_checked(request).await?.text().await?)
}

async fn fetch_image(request: RequestBuilder) -> Result<DynamicImage, FetchError> {
  let bytes = send_checked(request).await?.bytes().await?;
  image::load_from_memory(&bytes).map_err(|e| {
    warn!(err = %e, "poster could not be decoded");
    FetchError::FetchFailed
  })
}

impl MovieApi for OmdbClient {
  fn search(&self, query: &str) -> BoxFuture<'static, Result<Vec<MovieSummary>, FetchError>> {
    let request = self.request("s", query);
    async move { parse_search_body(&fetch_body(request).await?) }.boxed()
  }

  fn detail(&self, id: &str) -> BoxFuture<'static, Result<MovieDetail, FetchError>> {
    let request = self.request("i", id);
    let id = id.to_string();
    async move { parse_detail_body(&id, &fetch_body(request).await?) }.boxed()
  }

  fn poster(&self, url: &str) -> BoxFuture<'static, Result<DynamicImage, FetchError>> {
    fetch_image(self.client.get(url)).boxed()
  }
}
