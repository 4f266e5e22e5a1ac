//! Configuration module for the content backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use bitflags::bitflags;

use crate::models::TaxonomyKind;

bitflags! {
    /// Taxonomy modules enabled for this deployment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModuleSet: u32 {
        const PAGES = 1 << 0;
        const SECTIONS = 1 << 1;
        const SERVICES = 1 << 2;
        const PERSONAS = 1 << 3;

        const ALL = Self::PAGES.bits()
            | Self::SECTIONS.bits()
            | Self::SERVICES.bits()
            | Self::PERSONAS.bits();
    }
}

impl From<&str> for ModuleSet {
    fn from(s: &str) -> Self {
        match s.trim() {
            "pages" => Self::PAGES,
            "sections" => Self::SECTIONS,
            "services" => Self::SERVICES,
            "personas" => Self::PERSONAS,
            "all" | "*" => Self::ALL,
            _ => Self::empty(),
        }
    }
}

impl From<TaxonomyKind> for ModuleSet {
    fn from(kind: TaxonomyKind) -> Self {
        match kind {
            TaxonomyKind::Page => Self::PAGES,
            TaxonomyKind::Section => Self::SECTIONS,
            TaxonomyKind::Service => Self::SERVICES,
            TaxonomyKind::Persona => Self::PERSONAS,
        }
    }
}

impl ModuleSet {
    /// Parse a comma separated list such as `pages,services`.
    pub fn parse_list(list: &str) -> Self {
        list.split(',')
            .map(ModuleSet::from)
            .fold(Self::empty(), |acc, m| acc | m)
    }

    pub fn allows(&self, kind: TaxonomyKind) -> bool {
        self.contains(ModuleSet::from(kind))
    }
}

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound for any requested page size.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Directory uploaded files are written to
    pub upload_dir: PathBuf,
    /// URL prefix uploaded files are served under
    pub public_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Default listing page size
    pub page_size: u32,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
    /// Taxonomy modules served by this instance
    pub modules: ModuleSet,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let db_path = env::var("CMS_DB_PATH")
            .unwrap_or_else(|_| "./data/cms.sqlite".to_string())
            .into();

        let index_path = env::var("CMS_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let upload_dir = env::var("CMS_UPLOAD_DIR")
            .unwrap_or_else(|_| "./data/uploads".to_string())
            .into();

        let public_url = normalize_public_url(
            &env::var("CMS_PUBLIC_URL").unwrap_or_else(|_| "/uploads".to_string()),
        );

        let bind_addr = env::var("CMS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|e| format!("Invalid CMS_BIND_ADDR {:?}: {}", bind_addr, e))?;

        let log_level = env::var("CMS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let page_size = parse_or_default("CMS_PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let max_upload_bytes = parse_or_default("CMS_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);

        let modules = match env::var("CMS_MODULES") {
            Ok(list) => ModuleSet::parse_list(&list),
            Err(_) => ModuleSet::ALL,
        };

        Ok(Self {
            db_path,
            index_path,
            upload_dir,
            public_url,
            bind_addr,
            log_level,
            page_size,
            max_upload_bytes,
            modules,
        })
    }

    /// Clamp a requested page size to the configured bounds.
    pub fn page_size_for(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.page_size).clamp(1, MAX_PAGE_SIZE)
    }
}

fn parse_or_default<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// `uploads/` and `/uploads/` both become `/uploads`.
fn normalize_public_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') || trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "CMS_DB_PATH",
            "CMS_INDEX_PATH",
            "CMS_UPLOAD_DIR",
            "CMS_PUBLIC_URL",
            "CMS_BIND_ADDR",
            "CMS_LOG_LEVEL",
            "CMS_PAGE_SIZE",
            "CMS_MAX_UPLOAD_BYTES",
            "CMS_MODULES",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/cms.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.upload_dir, PathBuf::from("./data/uploads"));
        assert_eq!(config.public_url, "/uploads");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.modules, ModuleSet::ALL);
    }

    #[test]
    fn test_module_list_parsing() {
        let modules = ModuleSet::parse_list("pages, services");
        assert!(modules.allows(TaxonomyKind::Page));
        assert!(modules.allows(TaxonomyKind::Service));
        assert!(!modules.allows(TaxonomyKind::Persona));
        assert_eq!(ModuleSet::parse_list("all"), ModuleSet::ALL);
        assert_eq!(ModuleSet::parse_list("bogus"), ModuleSet::empty());
    }

    #[test]
    fn test_public_url_normalization() {
        assert_eq!(normalize_public_url("uploads/"), "/uploads");
        assert_eq!(normalize_public_url("/media"), "/media");
        assert_eq!(
            normalize_public_url("https://cdn.example.com/files/"),
            "https://cdn.example.com/files"
        );
    }
}
