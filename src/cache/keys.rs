//! Cache names and the keys stored under them.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// The three independent caches, one per entity shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheName {
    /// Newest published articles, as one bounded list.
    Articles,
    /// The category reference table.
    Categories,
    /// Individual article records keyed by id.
    Article,
}

impl CacheName {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheName::Articles => "articles",
            CacheName::Categories => "categories",
            CacheName::Article => "article",
        }
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an invalidation or stats request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTarget {
    One(CacheName),
    All,
}

impl CacheTarget {
    pub fn includes(self, name: CacheName) -> bool {
        match self {
            CacheTarget::All => true,
            CacheTarget::One(target) => target == name,
        }
    }
}

impl From<CacheName> for CacheTarget {
    fn from(name: CacheName) -> Self {
        CacheTarget::One(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown cache `{0}` (expected articles, categories, article or all)")]
pub struct UnknownCacheName(pub String);

impl FromStr for CacheTarget {
    type Err = UnknownCacheName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CacheTarget::All),
            "articles" => Ok(CacheTarget::One(CacheName::Articles)),
            "categories" => Ok(CacheTarget::One(CacheName::Categories)),
            "article" => Ok(CacheTarget::One(CacheName::Article)),
            _ => Err(UnknownCacheName(value.to_string())),
        }
    }
}

/// Key of the newest-articles list for a given page size.
pub fn article_list_key(page_size: usize) -> String {
    format!("published:{page_size}")
}

pub const CATEGORY_LIST_KEY: &str = "categories:all";
