//! Main Metallum scraper API
//!
//! This module provides the high-level API for scraping metal-archives.com.
//! It combines the caching HTTP client with the parsers to look up bands,
//! albums and lyrics by id and to run the advanced searches.

use futures::future::try_join_all;
use tracing::debug;

use crate::client::MetallumClient;
use crate::collection::Collection;
use crate::error::{MetallumError, Result};
use crate::parser::{parse_album, parse_band, parse_lyrics, parse_search_page};
use crate::query::{AlbumSearch, BandSearch, SearchQuery, SongSearch};
use crate::types::{
    Album, AlbumEntry, AlbumResult, Band, BandResult, Lyrics, SearchPage, SongResult,
};

/// Main scraper API for metal-archives.com
///
/// All operations are asynchronous. Pages are served from the client's cache
/// when fresh; live requests go through its rate limiter.
///
/// # Example
/// ```no_run
/// use metallum_core::{BandSearch, MetallumScraper};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scraper = MetallumScraper::new()?;
///
///     let results = scraper.band_search(&BandSearch::new("metallica")).await?;
///     println!("Found {} bands", results.total_record_count);
///
///     Ok(())
/// }
/// ```
pub struct MetallumScraper {
    client: MetallumClient,
}

impl MetallumScraper {
    /// Create a new scraper with default configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        let client = MetallumClient::new()?;
        Ok(Self { client })
    }

    /// Create a new scraper with a custom client.
    ///
    /// This is useful for testing or when clients share a cache and rate
    /// limiter.
    pub fn with_client(client: MetallumClient) -> Self {
        Self { client }
    }

    /// The underlying HTTP client
    pub fn client(&self) -> &MetallumClient {
        &self.client
    }

    /// Get a band, including its complete discography.
    ///
    /// The band page and the discography are fetched concurrently.
    ///
    /// # Returns
    /// * `Ok(Band)` with band attributes and albums
    /// * `Err(MetallumError::InvalidId)` if id is 0
    /// * `Err(MetallumError::NotFound)` if the band doesn't exist
    pub async fn band_for_id(&self, id: u64) -> Result<Band> {
        if id == 0 {
            return Err(MetallumError::InvalidId(id));
        }

        let page_path = format!("bands/_/{}", id);
        let discography_path = format!("band/discography/id/{}/tab/all", id);
        let (page, discography) = tokio::try_join!(
            self.client.fetch(&page_path),
            self.client.fetch(&discography_path)
        )?;

        parse_band(&page, &discography, id)
    }

    /// Get an album with its track list.
    ///
    /// # Returns
    /// * `Ok(Album)` with album attributes and tracks
    /// * `Err(MetallumError::InvalidId)` if id is 0
    /// * `Err(MetallumError::NotFound)` if the album doesn't exist
    pub async fn album_for_id(&self, id: u64) -> Result<Album> {
        if id == 0 {
            return Err(MetallumError::InvalidId(id));
        }

        let html = self.client.fetch(&format!("albums/_/_/{}", id)).await?;
        parse_album(&html, id)
    }

    /// Get the lyrics of a song.
    ///
    /// # Returns
    /// * `Ok(Lyrics)` with the cleaned text
    /// * `Err(MetallumError::InvalidId)` if id is 0
    pub async fn lyrics_for_id(&self, id: u64) -> Result<Lyrics> {
        if id == 0 {
            return Err(MetallumError::InvalidId(id));
        }

        let html = self
            .client
            .fetch(&format!("release/ajax-view-lyrics/id/{}", id))
            .await?;
        Ok(parse_lyrics(&html, id))
    }

    /// Run any advanced search and decode one page of rows.
    ///
    /// A response that cannot be decoded is dropped from the cache so the next
    /// attempt goes back to the origin.
    ///
    /// # Errors
    /// - Fetch errors from the client
    /// - `MetallumError::Decode` naming the search URL, wrapping `Json` when the
    ///   response is not a search envelope or `MalformedRow` when a row has too
    ///   few cells
    pub async fn search<Q: SearchQuery>(&self, query: &Q) -> Result<SearchPage<Q::Row>> {
        let url = self.client.absolute_url(&query.path());
        let body = self.client.fetch(&url).await?;
        let page = parse_search_page(&body, query.page_start()).map_err(|source| {
            self.client.cache().invalidate(&url);
            MetallumError::Decode {
                url,
                source: Box::new(source),
            }
        })?;
        debug!(
            endpoint = Q::ENDPOINT,
            rows = page.results.len(),
            total = page.total_record_count,
            "Search decoded"
        );
        Ok(page)
    }

    /// Search bands.
    ///
    /// # Example
    /// ```no_run
    /// use metallum_core::{BandSearch, MetallumScraper};
    ///
    /// # async fn example() -> Result<(), metallum_core::MetallumError> {
    /// let scraper = MetallumScraper::new()?;
    /// let page = scraper.band_search(&BandSearch::new("metallica")).await?;
    /// for row in &page.results {
    ///     println!("{} ({})", row.name, row.country);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn band_search(&self, query: &BandSearch) -> Result<SearchPage<BandResult>> {
        self.search(query).await
    }

    /// Search albums.
    pub async fn album_search(&self, query: &AlbumSearch) -> Result<SearchPage<AlbumResult>> {
        self.search(query).await
    }

    /// Search songs.
    pub async fn song_search(&self, query: &SongSearch) -> Result<SearchPage<SongResult>> {
        self.search(query).await
    }

    /// Resolve every discography entry into a full album, concurrently.
    ///
    /// Order follows the input; the first failure aborts the whole batch.
    pub async fn resolve_albums(&self, entries: &Collection<AlbumEntry>) -> Result<Collection<Album>> {
        let albums = try_join_all(entries.iter().map(|entry| self.album_for_id(entry.id))).await?;
        Ok(albums.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scraper_for(server: &MockServer, temp: &TempDir) -> MetallumScraper {
        let config = ClientConfig {
            base_url: server.uri(),
            request_interval: Duration::from_millis(1),
            cache_dir: temp.path().to_path_buf(),
            ..ClientConfig::default()
        };
        MetallumScraper::with_client(MetallumClient::with_config(config).unwrap())
    }

    fn album_page(title: &str) -> String {
        format!(
            r#"<html><body><h1 class="album_name">{}</h1>
            <h2 class="band_name"><a href="https://www.metal-archives.com/bands/Metallica/125">Metallica</a></h2>
            <dl><dt>Type:</dt><dd>Full-length</dd></dl></body></html>"#,
            title
        )
    }

    #[test]
    fn test_scraper_creation() {
        let scraper = MetallumScraper::new();
        assert!(scraper.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_id_zero() {
        let scraper = MetallumScraper::new().unwrap();

        match scraper.band_for_id(0).await {
            Err(MetallumError::InvalidId(id)) => assert_eq!(id, 0),
            _ => panic!("Expected InvalidId error"),
        }
        assert!(matches!(scraper.album_for_id(0).await, Err(MetallumError::InvalidId(0))));
        assert!(matches!(scraper.lyrics_for_id(0).await, Err(MetallumError::InvalidId(0))));
    }

    #[tokio::test]
    async fn test_band_for_id_fetches_page_and_discography() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/125"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><h1 class="band_name">Metallica</h1>
                <dl><dt>Country of origin:</dt><dd>United States</dd></dl></body></html>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/band/discography/id/125/tab/all"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<table class="discog"><tbody><tr>
                <td><a href="https://www.metal-archives.com/albums/Metallica/Kill_%27Em_All/547">Kill 'Em All</a></td>
                <td>Full-length</td><td>1983</td><td></td></tr></tbody></table>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server, &temp);
        let band = scraper.band_for_id(125).await.unwrap();
        assert_eq!(band.name, "Metallica");
        assert_eq!(band.country, "United States");
        assert_eq!(band.albums.len(), 1);
        assert_eq!(band.albums[0].id, 547);

        // Served from the cache this time
        let again = scraper.band_for_id(125).await.unwrap();
        assert_eq!(again.albums.len(), 1);
    }

    #[tokio::test]
    async fn test_album_for_id_not_found() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/albums/_/_/999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let scraper = scraper_for(&server, &temp);
        let result = scraper.album_for_id(999).await;
        assert!(matches!(result, Err(MetallumError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lyrics_for_id() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/release/ajax-view-lyrics/id/3449"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Fear<br />\r\nof the dark<br />\r\n"))
            .mount(&server)
            .await;

        let scraper = scraper_for(&server, &temp);
        let lyrics = scraper.lyrics_for_id(3449).await.unwrap();
        assert_eq!(lyrics.text, "Fear\nof the dark");
    }

    #[tokio::test]
    async fn test_band_search_sends_mapped_parameters() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/search/ajax-advanced/searching/bands/"))
            .and(query_param("bandName", "metallica"))
            .and(query_param("exactBandMatch", "1"))
            .and(query_param("iDisplayStart", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"iTotalRecords": 2, "aaData": [
                    ["<a href=\"https://www.metal-archives.com/bands/Metallica/125\">Metallica</a>", "Thrash Metal", "United States"]
                ]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server, &temp);
        let page = scraper.band_search(&BandSearch::new("metallica")).await.unwrap();
        assert_eq!(page.total_record_count, 2);
        assert_eq!(page.results.len(), 1);
        assert!(page.has_next_page());
    }

    #[tokio::test]
    async fn test_undecodable_search_names_url_and_is_not_cached() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/search/ajax-advanced/searching/bands/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .expect(2)
            .mount(&server)
            .await;

        let scraper = scraper_for(&server, &temp);
        let query = BandSearch::new("metallica");
        for _ in 0..2 {
            match scraper.band_search(&query).await {
                Err(MetallumError::Decode { url, source }) => {
                    assert!(url.contains("/search/ajax-advanced/searching/bands/"));
                    assert!(url.contains("bandName=metallica"));
                    assert!(matches!(*source, MetallumError::Json(_)));
                }
                other => panic!("Expected Decode error, got {:?}", other.map(|p| p.results.len())),
            }
        }

        let url = scraper.client().absolute_url(&query.path());
        assert!(scraper.client().cache().read(&url).is_none());
    }

    #[tokio::test]
    async fn test_resolve_albums_keeps_order() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        for (id, title) in [(1u64, "Kill 'Em All"), (2, "Ride the Lightning")] {
            Mock::given(method("GET"))
                .and(path(format!("/albums/_/_/{}", id)))
                .respond_with(ResponseTemplate::new(200).set_body_string(album_page(title)))
                .mount(&server)
                .await;
        }

        let entries: Collection<AlbumEntry> = [(1u64, "Kill 'Em All"), (2, "Ride the Lightning")]
            .into_iter()
            .map(|(id, title)| AlbumEntry {
                id,
                title: title.to_string(),
                album_type: crate::types::AlbumType::FullLength,
                year: None,
                review_count: 0,
                score: None,
            })
            .collect();

        let scraper = scraper_for(&server, &temp);
        let albums = scraper.resolve_albums(&entries).await.unwrap();
        let titles: Vec<&str> = albums.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Kill 'Em All", "Ride the Lightning"]);
    }

    #[tokio::test]
    async fn test_resolve_albums_fails_on_first_error() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/albums/_/_/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let entries: Collection<AlbumEntry> = vec![AlbumEntry {
            id: 1,
            title: "Broken".to_string(),
            album_type: crate::types::AlbumType::Demo,
            year: None,
            review_count: 0,
            score: None,
        }]
        .into();

        let scraper = scraper_for(&server, &temp);
        let result = scraper.resolve_albums(&entries).await;
        assert!(matches!(result, Err(MetallumError::Status { status: 503, .. })));
    }
}
