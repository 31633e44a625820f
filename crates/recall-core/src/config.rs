//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Paths to all Recall data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.db)?;
        Ok(())
    }
}

/// Keyword-overlap thresholds for the deterministic grading fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GradingThresholds {
    pub lenient: f64,
    pub strict: f64,
}

impl Default for GradingThresholds {
    fn default() -> Self {
        Self {
            lenient: 0.5,
            strict: 0.75,
        }
    }
}

impl GradingThresholds {
    pub fn for_mode(&self, strict: bool) -> f64 {
        if strict {
            self.strict
        } else {
            self.lenient
        }
    }
}

/// Top-level Recall configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (768 for text-embedding-004).
    pub embedding_dim: usize,
    /// Deadline for a single `embed` call, in seconds.
    pub embed_timeout_secs: u64,
    /// Deadline for a single `generate` call, in seconds.
    pub generate_timeout_secs: u64,
    /// Largest quiz session a caller may request.
    pub max_quiz_count: usize,
    /// Largest flashcard batch a caller may request.
    pub max_generated_cards: usize,
    /// Live quiz sessions kept in memory before the oldest is evicted.
    pub max_sessions: usize,
    /// Idle lifetime of a quiz session, in minutes.
    pub session_ttl_minutes: i64,
    pub grading: GradingThresholds,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            data_paths: DataPaths {
                root: PathBuf::from("data"),
                db: PathBuf::from("data/db"),
                llm_config_file: PathBuf::from("data/llm-config.json"),
            },
            embedding_dim: 768,
            embed_timeout_secs: 30,
            generate_timeout_secs: 60,
            max_quiz_count: 50,
            max_generated_cards: 20,
            max_sessions: 500,
            session_ttl_minutes: 120,
            grading: GradingThresholds::default(),
        }
    }
}

impl RecallConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let defaults = Self::default();
        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            data_paths,
            embedding_dim: env_parse("RECALL_EMBEDDING_DIM").unwrap_or(defaults.embedding_dim),
            embed_timeout_secs: env_parse("RECALL_EMBED_TIMEOUT_SECS")
                .unwrap_or(defaults.embed_timeout_secs),
            generate_timeout_secs: env_parse("RECALL_GENERATE_TIMEOUT_SECS")
                .unwrap_or(defaults.generate_timeout_secs),
            max_quiz_count: env_parse("RECALL_MAX_QUIZ_COUNT").unwrap_or(defaults.max_quiz_count),
            max_generated_cards: defaults.max_generated_cards,
            max_sessions: env_parse("RECALL_MAX_SESSIONS").unwrap_or(defaults.max_sessions),
            session_ttl_minutes: env_parse("RECALL_SESSION_TTL_MINUTES")
                .unwrap_or(defaults.session_ttl_minutes),
            grading: GradingThresholds {
                lenient: env_parse("RECALL_GRADING_LENIENT_THRESHOLD")
                    .unwrap_or(defaults.grading.lenient),
                strict: env_parse("RECALL_GRADING_STRICT_THRESHOLD")
                    .unwrap_or(defaults.grading.strict),
            },
        })
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
