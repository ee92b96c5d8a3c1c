use crate::config::{WordSourceType, WordsConfig};
use crate::error::ContentError;
use crate::game::WordPair;
use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

const BUILTIN_WORDS: &str = include_str!("../data/words.json");

#[derive(Debug, Clone, Deserialize)]
struct JsonWordPair {
    pair_id: String,
    civilian: String,
    undercover: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonTheme {
    theme_id: String,
    name: String,
    pairs: Vec<JsonWordPair>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonWordCatalog {
    themes: Vec<JsonTheme>,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub theme_id: String,
    pub name: String,
    pub pairs: Vec<WordPair>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThemeSummary {
    pub theme_id: String,
    pub name: String,
    pub pair_count: usize,
}

/// Immutable snapshot of every themed word pair the server can deal.
#[derive(Debug, Clone)]
pub struct WordCatalog {
    themes: Vec<Theme>,
}

impl WordCatalog {
    #[tracing::instrument(skip(content), fields(content.length = content.len()))]
    pub fn parse(content: &str) -> Result<Self, ContentError> {
        let json: JsonWordCatalog = serde_json::from_str(content)
            .map_err(|e| ContentError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let mut seen_themes = HashSet::new();
        let mut themes = Vec::with_capacity(json.themes.len());

        for theme in json.themes {
            let theme_id = theme.theme_id.trim().to_lowercase();
            if theme_id.is_empty() {
                return Err(ContentError::Parse("theme with empty theme_id".to_string()));
            }
            if !seen_themes.insert(theme_id.clone()) {
                return Err(ContentError::Parse(format!("duplicate theme {}", theme_id)));
            }

            let pairs: Vec<WordPair> = theme
                .pairs
                .into_iter()
                .filter_map(|pair| {
                    let civilian = pair.civilian.trim();
                    let undercover = pair.undercover.trim();
                    if civilian.is_empty()
                        || undercover.is_empty()
                        || civilian.eq_ignore_ascii_case(undercover)
                    {
                        tracing::warn!(pair.id = %pair.pair_id, theme.id = %theme_id, "Skipping unusable word pair");
                        return None;
                    }
                    Some(WordPair {
                        pair_id: pair.pair_id,
                        theme_id: theme_id.clone(),
                        civilian_word: civilian.to_string(),
                        undercover_word: undercover.to_string(),
                    })
                })
                .collect();

            if pairs.is_empty() {
                tracing::warn!(theme.id = %theme_id, "Theme has no usable pairs, skipping");
                continue;
            }

            themes.push(Theme {
                theme_id,
                name: theme.name,
                pairs,
            });
        }

        if themes.is_empty() {
            return Err(ContentError::EmptyCatalogue);
        }
        Ok(Self { themes })
    }

    pub fn builtin() -> Result<Self, ContentError> {
        Self::parse(BUILTIN_WORDS)
    }

    pub fn themes(&self) -> Vec<ThemeSummary> {
        self.themes
            .iter()
            .map(|t| ThemeSummary {
                theme_id: t.theme_id.clone(),
                name: t.name.clone(),
                pair_count: t.pairs.len(),
            })
            .collect()
    }

    pub fn pair_count(&self) -> usize {
        self.themes.iter().map(|t| t.pairs.len()).sum()
    }

    /// Picks a pair uniformly from `theme`, or uniformly over every pair when no theme is given.
    pub fn pick_pair<R: Rng + ?Sized>(
        &self,
        theme: Option<&str>,
        rng: &mut R,
    ) -> Result<WordPair, ContentError> {
        self.pick_pair_except(theme, None, rng)
    }

    /// Like [`pick_pair`](Self::pick_pair) but avoids `used_pair_id` unless it is the only
    /// candidate left.
    pub fn pick_pair_except<R: Rng + ?Sized>(
        &self,
        theme: Option<&str>,
        used_pair_id: Option<&str>,
        rng: &mut R,
    ) -> Result<WordPair, ContentError> {
        let candidates: Vec<&WordPair> = match theme {
            Some(theme_id) => {
                let wanted = theme_id.trim().to_lowercase();
                let theme = self
                    .themes
                    .iter()
                    .find(|t| t.theme_id == wanted)
                    .ok_or_else(|| ContentError::UnknownTheme(theme_id.to_string()))?;
                theme.pairs.iter().collect()
            }
            None => self.themes.iter().flat_map(|t| &t.pairs).collect(),
        };
        let unused: Vec<&WordPair> = candidates
            .iter()
            .copied()
            .filter(|pair| Some(pair.pair_id.as_str()) != used_pair_id)
            .collect();
        let pool = if unused.is_empty() { &candidates } else { &unused };
        pool.choose(rng)
            .map(|pair| (*pair).clone())
            .ok_or(ContentError::EmptyCatalogue)
    }
}

/// Where games get their secret words from.
#[async_trait]
pub trait WordSource: Send + Sync {
    async fn catalog(&self) -> Arc<WordCatalog>;
}

#[tracing::instrument(skip(config), fields(
    words.source_type = ?config.source_type,
    words.file_path = ?config.file_path,
    words.http_url = ?config.http_url
))]
async fn load_catalog(config: &WordsConfig) -> Result<WordCatalog, ContentError> {
    let raw = match config.source_type {
        WordSourceType::Builtin => {
            tracing::debug!("Using built-in word catalogue");
            return WordCatalog::builtin();
        }
        WordSourceType::File => {
            let file_path = config
                .file_path
                .as_ref()
                .ok_or_else(|| ContentError::Config("File path required for file source".to_string()))?;
            tracing::debug!(file.path = %file_path, "Loading words from file");
            tokio::fs::read_to_string(file_path)
                .await
                .map_err(|e| ContentError::FileRead {
                    path: file_path.clone(),
                    source: e,
                })?
        }
        WordSourceType::Http => {
            let url = config
                .http_url
                .as_ref()
                .ok_or_else(|| ContentError::Config("HTTP URL required for http source".to_string()))?;
            tracing::debug!(http.url = %url, "Fetching words from URL");
            let response = reqwest::get(url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ContentError::HttpFetch {
                    url: url.clone(),
                    source: e,
                })?;
            response.text().await.map_err(|e| ContentError::HttpFetch {
                url: url.clone(),
                source: e,
            })?
        }
    };
    WordCatalog::parse(&raw)
}

/// Refreshable holder of the current catalogue.
pub struct WordCatalogCache {
    catalog: RwLock<Arc<WordCatalog>>,
    config: WordsConfig,
}

impl WordCatalogCache {
    pub async fn new(config: WordsConfig) -> Result<Self, ContentError> {
        let catalog = load_catalog(&config).await.map_err(|err| {
            tracing::error!(error = %err, "Failed to load word catalogue");
            err
        })?;

        tracing::info!(
            themes.count = catalog.themes.len(),
            pairs.count = catalog.pair_count(),
            "WordCatalogCache initialized"
        );

        Ok(Self {
            catalog: RwLock::new(Arc::new(catalog)),
            config,
        })
    }

    pub fn from_catalog(catalog: WordCatalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            config: WordsConfig {
                source_type: WordSourceType::Builtin,
                file_path: None,
                http_url: None,
            },
        }
    }

    /// Reloads from the configured source. The previous catalogue stays in place on failure.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<ThemeSummary>, ContentError> {
        tracing::info!("Refreshing word catalogue");
        let fresh = load_catalog(&self.config).await.map_err(|err| {
            tracing::warn!(error = %err, "Word refresh failed, keeping previous catalogue");
            err
        })?;
        let themes = fresh.themes();

        let mut guard = self.catalog.write().await;
        *guard = Arc::new(fresh);
        tracing::info!(
            themes.count = themes.len(),
            pairs.count = guard.pair_count(),
            "Refreshed word catalogue"
        );
        Ok(themes)
    }
}

#[async_trait]
impl WordSource for WordCatalogCache {
    async fn catalog(&self) -> Arc<WordCatalog> {
        self.catalog.read().await.clone()
    }
}
