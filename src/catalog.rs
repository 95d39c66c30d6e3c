//! Catalog query engine: projection, search, tag facets, and download
//! accounting over the games table.

use crate::error::DepotError;
use crate::storage::models::StoredGame;
use crate::storage::Storage;
use base64::Engine;
use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

/// A catalog row in normalized form. Ratings come back uppercased and
/// platforms lowercased regardless of what the row holds, so rows imported
/// from older databases behave the same as freshly written ones.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub name: String,
    pub source_b64: String,
    pub downloads: i64,
    pub genres: Vec<String>,
    pub url: String,
    pub screenshots_url: String,
    pub description: String,
    pub rating: String,
    pub platform: String,
    pub added_at: i64,
    pub in_package_manager: bool,
}

impl From<StoredGame> for GameRecord {
    fn from(row: StoredGame) -> Self {
        Self {
            name: row.name,
            source_b64: row.source_b64,
            downloads: row.downloads,
            genres: row
                .genres
                .split(',')
                .filter(|g| !g.is_empty())
                .map(str::to_owned)
                .collect(),
            url: row.url,
            screenshots_url: row.screenshots_url,
            description: row.description,
            rating: row.rating.to_uppercase(),
            platform: row.platform.to_lowercase(),
            added_at: row.added_at,
            in_package_manager: row.in_package_manager,
        }
    }
}

/// Public projection: what anonymous callers see. Never carries the
/// download URL, the encoded source key, or the package-manager flag.
#[derive(Debug, Clone, Serialize)]
pub struct PublicGame {
    pub name: String,
    pub downloads: i64,
    pub genres: Vec<String>,
    pub screenshots_url: String,
    pub description: String,
    pub rating: String,
    pub platform: String,
    pub added_at: i64,
}

impl From<GameRecord> for PublicGame {
    fn from(game: GameRecord) -> Self {
        Self {
            name: game.name,
            downloads: game.downloads,
            genres: game.genres,
            screenshots_url: game.screenshots_url,
            description: game.description,
            rating: game.rating,
            platform: game.platform,
            added_at: game.added_at,
        }
    }
}

/// Internal projection for the maintenance removal flow: keeps the encoded
/// source key so the caller has a selectable handle, still omits the URL
/// and the package-manager flag.
#[derive(Debug, Clone, Serialize)]
pub struct AdminGame {
    pub name: String,
    pub source_b64: String,
    pub downloads: i64,
    pub genres: Vec<String>,
    pub screenshots_url: String,
    pub description: String,
    pub rating: String,
    pub platform: String,
    pub added_at: i64,
}

impl From<GameRecord> for AdminGame {
    fn from(game: GameRecord) -> Self {
        Self {
            name: game.name,
            source_b64: game.source_b64,
            downloads: game.downloads,
            genres: game.genres,
            screenshots_url: game.screenshots_url,
            description: game.description,
            rating: game.rating,
            platform: game.platform,
            added_at: game.added_at,
        }
    }
}

/// What a download dispenses: the authoritative location plus whether the
/// package is installable through the platform package manager.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadGrant {
    pub url: String,
    pub in_package_manager: bool,
}

/// Fields collected when adding a catalog entry. Downloads, the source key
/// and the timestamp are derived, never caller-supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGame {
    pub name: String,
    pub genres: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub screenshots_url: String,
    #[serde(default)]
    pub description: String,
    pub rating: String,
    pub platform: String,
    #[serde(default)]
    pub in_package_manager: bool,
}

/// De-duplicated union of genre tags, ratings and platforms across the
/// catalog, each ordered by first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagFacets {
    pub genres: Vec<String>,
    pub ratings: Vec<String>,
    pub platforms: Vec<String>,
}

/// A parsed search expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Matches an entry when any supplied tag equals one of its genre tags,
    /// its rating, or its platform. Tag comparison is case-sensitive.
    Tags(Vec<String>),
    /// Case-insensitive substring match against name or description.
    FreeText(String),
}

impl SearchQuery {
    /// Parse the wire form of a search term: `tags=a,b` selects tag search,
    /// `free-text=needle` substring search. Anything else is unrecognized
    /// and matches nothing. Empty tag tokens are dropped.
    pub fn parse(term: &str) -> Option<Self> {
        if let Some(list) = term.strip_prefix("tags=") {
            let tags = list
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect();
            Some(Self::Tags(tags))
        } else {
            term.strip_prefix("free-text=")
                .map(|text| Self::FreeText(text.to_owned()))
        }
    }

    fn matches(&self, game: &GameRecord) -> bool {
        match self {
            Self::Tags(tags) => tags.iter().any(|tag| {
                game.genres.iter().any(|g| g == tag)
                    || *tag == game.rating
                    || *tag == game.platform
            }),
            Self::FreeText(text) => {
                let needle = text.to_lowercase();
                game.name.to_lowercase().contains(&needle)
                    || game.description.to_lowercase().contains(&needle)
            }
        }
    }
}

/// The catalog query engine. Holds no row state of its own; every
/// operation re-reads from the store.
#[derive(Clone)]
pub struct Catalog {
    storage: Storage,
}

impl Catalog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn scan(&self) -> Result<Vec<GameRecord>, DepotError> {
        let conn = self.storage.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, source_b64, downloads, genres, url, screenshots_url,
                    description, rating, platform, added_at, in_package_manager
             FROM games ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], StoredGame::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(GameRecord::from).collect())
    }

    pub fn list(&self) -> Result<Vec<PublicGame>, DepotError> {
        Ok(self.scan()?.into_iter().map(PublicGame::from).collect())
    }

    pub fn get(&self, name: &str) -> Result<PublicGame, DepotError> {
        let conn = self.storage.conn()?;
        let row = conn
            .query_row(
                "SELECT name, source_b64, downloads, genres, url, screenshots_url,
                        description, rating, platform, added_at, in_package_manager
                 FROM games WHERE name = ?1",
                [name],
                StoredGame::from_row,
            )
            .optional()?
            .ok_or_else(|| DepotError::NotFound(format!("no game named {}", name)))?;
        Ok(PublicGame::from(GameRecord::from(row)))
    }

    pub fn search_public(&self, query: &SearchQuery) -> Result<Vec<PublicGame>, DepotError> {
        Ok(self
            .search_records(query)?
            .into_iter()
            .map(PublicGame::from)
            .collect())
    }

    pub fn search_internal(&self, query: &SearchQuery) -> Result<Vec<AdminGame>, DepotError> {
        Ok(self
            .search_records(query)?
            .into_iter()
            .map(AdminGame::from)
            .collect())
    }

    fn search_records(&self, query: &SearchQuery) -> Result<Vec<GameRecord>, DepotError> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|game| query.matches(game))
            .collect())
    }

    pub fn tag_facets(&self) -> Result<TagFacets, DepotError> {
        let mut facets = TagFacets {
            genres: Vec::new(),
            ratings: Vec::new(),
            platforms: Vec::new(),
        };
        for game in self.scan()? {
            for genre in &game.genres {
                if !facets.genres.contains(genre) {
                    facets.genres.push(genre.clone());
                }
            }
            if !facets.ratings.contains(&game.rating) {
                facets.ratings.push(game.rating.clone());
            }
            if !facets.platforms.contains(&game.platform) {
                facets.platforms.push(game.platform.clone());
            }
        }
        Ok(facets)
    }

    /// Dispense the download location for `name`, bumping its counter by
    /// exactly one. The increment is a single UPDATE executed while the
    /// connection lock is held, so concurrent calls on the same entry
    /// serialize without lost updates.
    pub fn record_download(&self, name: &str) -> Result<DownloadGrant, DepotError> {
        let conn = self.storage.conn()?;
        let changed = conn.execute(
            "UPDATE games SET downloads = downloads + 1 WHERE name = ?1",
            [name],
        )?;
        if changed == 0 {
            return Err(DepotError::NotFound(format!("no game named {}", name)));
        }
        let grant = conn.query_row(
            "SELECT url, in_package_manager FROM games WHERE name = ?1",
            [name],
            |row| {
                Ok(DownloadGrant {
                    url: row.get(0)?,
                    in_package_manager: row.get(1)?,
                })
            },
        )?;
        Ok(grant)
    }

    /// Validate, normalize and insert a new entry. Names are unique; the
    /// check and the insert share one transaction.
    pub fn add(&self, game: NewGame) -> Result<AdminGame, DepotError> {
        let name = game.name.trim().replace(' ', "_");
        if name.is_empty() {
            return Err(DepotError::Validation("game name must not be empty".into()));
        }
        if game.url.trim().is_empty() {
            return Err(DepotError::Validation(
                "download URL must not be empty".into(),
            ));
        }
        // Comma is the genre list delimiter in storage
        for genre in &game.genres {
            if genre.contains(',') {
                return Err(DepotError::Validation(format!(
                    "genre tag {:?} contains the list delimiter ','",
                    genre
                )));
            }
        }

        let record = GameRecord {
            source_b64: base64::engine::general_purpose::STANDARD.encode(game.url.as_bytes()),
            name,
            downloads: 1,
            genres: game
                .genres
                .iter()
                .map(|g| g.trim().to_owned())
                .filter(|g| !g.is_empty())
                .collect(),
            url: game.url,
            screenshots_url: game.screenshots_url,
            description: game.description,
            rating: game.rating.to_uppercase(),
            platform: game.platform.to_lowercase(),
            added_at: Utc::now().timestamp(),
            in_package_manager: game.in_package_manager,
        };

        let mut conn = self.storage.conn()?;
        let tx = conn.transaction()?;
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM games WHERE name = ?1)",
            [&record.name],
            |row| row.get(0),
        )?;
        if taken {
            return Err(DepotError::Conflict(format!(
                "a game named {} already exists",
                record.name
            )));
        }
        tx.execute(
            "INSERT INTO games (name, source_b64, downloads, genres, url, screenshots_url,
                                description, rating, platform, added_at, in_package_manager)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                record.name,
                record.source_b64,
                record.downloads,
                record.genres.join(","),
                record.url,
                record.screenshots_url,
                record.description,
                record.rating,
                record.platform,
                record.added_at,
                record.in_package_manager,
            ],
        )?;
        tx.commit()?;
        Ok(AdminGame::from(record))
    }

    /// Remove entries keyed by their encoded source value, the handle the
    /// maintenance removal flow collects. Returns the names of deleted
    /// entries; unknown keys are skipped.
    pub fn remove_by_sources(&self, sources: &[String]) -> Result<Vec<String>, DepotError> {
        let mut conn = self.storage.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = Vec::new();
        {
            let mut select = tx.prepare("SELECT name FROM games WHERE source_b64 = ?1")?;
            let mut delete = tx.prepare("DELETE FROM games WHERE source_b64 = ?1")?;
            for source in sources {
                let names = select
                    .query_map([source], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                if names.is_empty() {
                    continue;
                }
                delete.execute([source])?;
                deleted.extend(names);
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Name-keyed removal for programmatic callers; the encoded source key
    /// is not unique when two entries share a download URL.
    pub fn remove_by_name(&self, name: &str) -> Result<(), DepotError> {
        let conn = self.storage.conn()?;
        let changed = conn.execute("DELETE FROM games WHERE name = ?1", [name])?;
        if changed == 0 {
            return Err(DepotError::NotFound(format!("no game named {}", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minetest() -> NewGame {
        NewGame {
            name: "Minetest".into(),
            genres: vec!["sandbox".into(), "survival".into()],
            url: "http://mirrors.example.org/minetest_5.1.1_amd64.deb".into(),
            screenshots_url: "https://www.minetest.net/#gallery".into(),
            description: "Open-source Minecraft clone that runs natively on Linux".into(),
            rating: "e".into(),
            platform: "Linux".into(),
            in_package_manager: true,
        }
    }

    fn supertuxkart() -> NewGame {
        NewGame {
            name: "SuperTuxKart".into(),
            genres: vec!["racing".into(), "arcade".into()],
            url: "http://mirrors.example.org/supertuxkart_1.2_amd64.deb".into(),
            screenshots_url: String::new(),
            description: "Kart racing with Tux and friends".into(),
            rating: "E".into(),
            platform: "linux".into(),
            in_package_manager: false,
        }
    }

    fn fixture() -> Catalog {
        let catalog = Catalog::new(Storage::in_memory().unwrap());
        catalog.add(minetest()).unwrap();
        catalog.add(supertuxkart()).unwrap();
        catalog
    }

    fn names(games: &[PublicGame]) -> Vec<&str> {
        games.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn list_returns_all_entries_in_insertion_order() {
        let catalog = fixture();
        let games = catalog.list().unwrap();
        assert_eq!(names(&games), ["Minetest", "SuperTuxKart"]);
    }

    #[test]
    fn empty_store_lists_empty() {
        let catalog = Catalog::new(Storage::in_memory().unwrap());
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn public_projection_redacts_internal_fields() {
        let catalog = fixture();
        let value = serde_json::to_value(&catalog.list().unwrap()[0]).unwrap();
        let keys = value.as_object().unwrap();
        assert!(keys.contains_key("name"));
        assert!(keys.contains_key("downloads"));
        assert!(!keys.contains_key("url"));
        assert!(!keys.contains_key("source_b64"));
        assert!(!keys.contains_key("in_package_manager"));
    }

    #[test]
    fn internal_projection_keeps_source_but_not_url() {
        let catalog = fixture();
        let games = catalog
            .search_internal(&SearchQuery::Tags(vec!["sandbox".into()]))
            .unwrap();
        let value = serde_json::to_value(&games[0]).unwrap();
        let keys = value.as_object().unwrap();
        assert!(keys.contains_key("source_b64"));
        assert!(!keys.contains_key("url"));
        assert!(!keys.contains_key("in_package_manager"));
    }

    #[test]
    fn get_normalizes_rating_and_platform() {
        let catalog = fixture();
        let game = catalog.get("Minetest").unwrap();
        assert_eq!(game.rating, "E");
        assert_eq!(game.platform, "linux");
    }

    #[test]
    fn get_unknown_name_is_not_found() {
        let catalog = fixture();
        assert!(matches!(
            catalog.get("Nope"),
            Err(DepotError::NotFound(_))
        ));
    }

    #[test]
    fn add_replaces_spaces_in_names() {
        let catalog = fixture();
        let mut game = minetest();
        game.name = "Super Mario Clone".into();
        game.url = "http://mirrors.example.org/smc.deb".into();
        let added = catalog.add(game).unwrap();
        assert_eq!(added.name, "Super_Mario_Clone");
        catalog.get("Super_Mario_Clone").unwrap();
    }

    #[test]
    fn add_rejects_duplicate_names() {
        let catalog = fixture();
        let err = catalog.add(minetest()).unwrap_err();
        assert!(matches!(err, DepotError::Conflict(_)));
        assert_eq!(catalog.list().unwrap().len(), 2);
    }

    #[test]
    fn add_rejects_genre_with_delimiter() {
        let catalog = fixture();
        let mut game = minetest();
        game.name = "Other".into();
        game.genres = vec!["sandbox,survival".into()];
        assert!(matches!(
            catalog.add(game),
            Err(DepotError::Validation(_))
        ));
    }

    #[test]
    fn add_rejects_empty_name_and_url() {
        let catalog = Catalog::new(Storage::in_memory().unwrap());
        let mut game = minetest();
        game.name = "   ".into();
        assert!(matches!(catalog.add(game), Err(DepotError::Validation(_))));

        let mut game = minetest();
        game.url = String::new();
        assert!(matches!(catalog.add(game), Err(DepotError::Validation(_))));
    }

    #[test]
    fn quoted_names_do_not_break_query_semantics() {
        let catalog = fixture();
        let mut game = minetest();
        game.name = "Robert'); DROP TABLE games;--".into();
        game.url = "http://mirrors.example.org/bobby.deb".into();
        let added = catalog.add(game).unwrap();

        // The table is intact and the hostile name round-trips literally
        assert_eq!(catalog.list().unwrap().len(), 3);
        let fetched = catalog.get(&added.name).unwrap();
        assert_eq!(fetched.name, added.name);
    }

    #[test]
    fn tag_search_matches_genres_rating_and_platform() {
        let catalog = fixture();

        let by_genre = catalog
            .search_public(&SearchQuery::Tags(vec!["survival".into()]))
            .unwrap();
        assert_eq!(names(&by_genre), ["Minetest"]);

        let by_rating = catalog
            .search_public(&SearchQuery::Tags(vec!["E".into()]))
            .unwrap();
        assert_eq!(names(&by_rating), ["Minetest", "SuperTuxKart"]);

        let by_platform = catalog
            .search_public(&SearchQuery::Tags(vec!["linux".into()]))
            .unwrap();
        assert_eq!(by_platform.len(), 2);
    }

    #[test]
    fn tag_search_is_case_sensitive() {
        let catalog = fixture();
        let games = catalog
            .search_public(&SearchQuery::Tags(vec!["Survival".into()]))
            .unwrap();
        assert!(games.is_empty());

        // Ratings are stored uppercased, so the lowercase tag misses
        let games = catalog
            .search_public(&SearchQuery::Tags(vec!["e".into()]))
            .unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn tag_search_is_order_independent() {
        let catalog = fixture();
        let ab = catalog
            .search_public(&SearchQuery::Tags(vec!["racing".into(), "survival".into()]))
            .unwrap();
        let ba = catalog
            .search_public(&SearchQuery::Tags(vec!["survival".into(), "racing".into()]))
            .unwrap();
        let mut ab = names(&ab);
        let mut ba = names(&ba);
        ab.sort_unstable();
        ba.sort_unstable();
        assert_eq!(ab, ba);
    }

    #[test]
    fn entries_match_at_most_once() {
        let catalog = fixture();
        // Both tags hit Minetest; it must still appear exactly once
        let games = catalog
            .search_public(&SearchQuery::Tags(vec!["sandbox".into(), "survival".into()]))
            .unwrap();
        assert_eq!(names(&games), ["Minetest"]);
    }

    #[test]
    fn free_text_search_is_case_insensitive() {
        let catalog = fixture();
        let games = catalog
            .search_public(&SearchQuery::FreeText("MINE".into()))
            .unwrap();
        assert_eq!(names(&games), ["Minetest"]);

        let games = catalog
            .search_public(&SearchQuery::FreeText("clone".into()))
            .unwrap();
        assert_eq!(names(&games), ["Minetest"]);
    }

    #[test]
    fn free_text_empty_needle_matches_everything() {
        let catalog = fixture();
        let games = catalog
            .search_public(&SearchQuery::FreeText(String::new()))
            .unwrap();
        assert_eq!(games.len(), 2);
    }

    #[test]
    fn parse_recognizes_both_prefixes() {
        assert_eq!(
            SearchQuery::parse("tags=a,b"),
            Some(SearchQuery::Tags(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            SearchQuery::parse("free-text=kart racing"),
            Some(SearchQuery::FreeText("kart racing".into()))
        );
        assert_eq!(SearchQuery::parse("bogus=1"), None);
        assert_eq!(
            SearchQuery::parse("tags=a,,b"),
            Some(SearchQuery::Tags(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn facets_dedupe_in_first_appearance_order() {
        let catalog = fixture();
        let facets = catalog.tag_facets().unwrap();
        assert_eq!(facets.genres, ["sandbox", "survival", "racing", "arcade"]);
        assert_eq!(facets.ratings, ["E"]);
        assert_eq!(facets.platforms, ["linux"]);
    }

    #[test]
    fn download_returns_grant_and_increments() {
        let catalog = fixture();
        let grant = catalog.record_download("Minetest").unwrap();
        assert_eq!(grant.url, "http://mirrors.example.org/minetest_5.1.1_amd64.deb");
        assert!(grant.in_package_manager);

        catalog.record_download("Minetest").unwrap();
        assert_eq!(catalog.get("Minetest").unwrap().downloads, 3);
        // The other entry is untouched
        assert_eq!(catalog.get("SuperTuxKart").unwrap().downloads, 1);
    }

    #[test]
    fn download_grant_exposes_only_url_and_flag() {
        let catalog = fixture();
        let grant = catalog.record_download("Minetest").unwrap();
        let value = serde_json::to_value(&grant).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["in_package_manager", "url"]);
    }

    #[test]
    fn download_unknown_name_writes_nothing() {
        let catalog = fixture();
        assert!(matches!(
            catalog.record_download("Nope"),
            Err(DepotError::NotFound(_))
        ));
        assert_eq!(catalog.get("Minetest").unwrap().downloads, 1);
    }

    #[test]
    fn concurrent_downloads_lose_no_updates() {
        let catalog = fixture();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let catalog = catalog.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..5 {
                    catalog.record_download("Minetest").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(catalog.get("Minetest").unwrap().downloads, 1 + 40);
    }

    #[test]
    fn remove_by_sources_returns_deleted_names() {
        let catalog = fixture();
        let source =
            base64::engine::general_purpose::STANDARD.encode(minetest().url.as_bytes());
        let removed = catalog
            .remove_by_sources(&[source, "unknown-key".into()])
            .unwrap();
        assert_eq!(removed, ["Minetest"]);
        assert_eq!(names(&catalog.list().unwrap()), ["SuperTuxKart"]);
    }

    #[test]
    fn remove_by_name_errors_on_unknown() {
        let catalog = fixture();
        catalog.remove_by_name("Minetest").unwrap();
        assert!(matches!(
            catalog.remove_by_name("Minetest"),
            Err(DepotError::NotFound(_))
        ));
    }
}
