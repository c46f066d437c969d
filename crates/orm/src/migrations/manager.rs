//! Migration Manager - File system operations for migrations
//!
//! Discovers migration scripts in a directory and scaffolds new ones.

use chrono::Utc;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::definitions::{MigrationConfig, MigrationFile, MIGRATION_EXTENSION};
use crate::error::{OrmError, OrmResult};

/// Minimum width of generated version tokens (`001`)
const MIN_VERSION_WIDTH: usize = 3;

/// Migration manager for creating and listing migrations
#[derive(Debug, Clone)]
pub struct MigrationManager {
    config: MigrationConfig,
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::with_config(MigrationConfig::default())
    }
}

impl MigrationManager {
    /// Create a new migration manager with custom configuration
    pub fn with_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// List the migrations in the configured directory, sorted by filename
    pub fn list_migrations(&self) -> OrmResult<Vec<MigrationFile>> {
        list_migrations(&self.config.migrations_dir)
    }

    /// Create a new, empty migration file with the next free version
    pub fn create_migration(&self, name: &str) -> OrmResult<MigrationFile> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(OrmError::InvalidIdentifier {
                identifier: name.to_string(),
                reason: "migration name must contain letters or digits".to_string(),
            });
        }

        let dir = &self.config.migrations_dir;
        fs::create_dir_all(dir).map_err(|e| OrmError::io(dir, e))?;

        let existing = self.list_migrations()?;
        let version = next_version(&existing);
        let filename = format!("{}_{}.{}", version, slug, MIGRATION_EXTENSION);
        let path = dir.join(&filename);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| OrmError::io(&path, e))?;
        file.write_all(migration_template(name, &version).as_bytes())
            .map_err(|e| OrmError::io(&path, e))?;

        tracing::info!("Created migration: {}", filename);

        Ok(MigrationFile {
            filename,
            version,
            name: slug,
            path,
        })
    }
}

/// List migration scripts in `dir`, sorted lexicographically by filename.
///
/// Only regular files ending in `.sql` are considered. Two files sharing a
/// version token are rejected.
pub fn list_migrations(dir: impl AsRef<Path>) -> OrmResult<Vec<MigrationFile>> {
    let mut migrations: Vec<MigrationFile> = sql_files(dir.as_ref())?
        .into_iter()
        .map(|(filename, path)| {
            let (version, name) = version_token(&filename);
            MigrationFile {
                version: version.to_string(),
                name: name.to_string(),
                filename,
                path,
            }
        })
        .collect();
    migrations.sort_by(|a, b| a.filename.cmp(&b.filename));

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for migration in &migrations {
        if let Some(first) = seen.insert(&migration.version, &migration.filename) {
            return Err(OrmError::DuplicateVersion {
                version: migration.version.clone(),
                first: first.to_string(),
                second: migration.filename.clone(),
            });
        }
    }

    Ok(migrations)
}

/// Split a migration filename into its version token and descriptive name.
///
/// `001_create_users.sql` yields `("001", "create_users")`. A name without
/// an underscore uses its stem as the version, so the `.sql` extension is
/// not part of it: `005.sql` yields `("005", "")`.
pub fn version_token(filename: &str) -> (&str, &str) {
    let stem = filename
        .strip_suffix(MIGRATION_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(filename);
    stem.split_once('_').unwrap_or((stem, ""))
}

/// Regular `.sql` files in `dir` as `(filename, path)`, sorted by filename
pub(crate) fn sql_files(dir: &Path) -> OrmResult<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| OrmError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| OrmError::io(dir, e))?;
        let path = entry.path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != MIGRATION_EXTENSION) {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(filename) => files.push((filename, path)),
            Err(raw) => {
                tracing::warn!("Skipping non UTF-8 file name: {:?}", raw);
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn next_version(existing: &[MigrationFile]) -> String {
    let numeric: Vec<(u64, usize)> = existing
        .iter()
        .filter_map(|m| m.version.parse::<u64>().ok().map(|n| (n, m.version.len())))
        .collect();

    let next = numeric.iter().map(|(n, _)| *n).max().map_or(1, |n| n + 1);
    let width = numeric
        .iter()
        .map(|(_, w)| *w)
        .max()
        .unwrap_or(0)
        .max(MIN_VERSION_WIDTH);

    format!("{:0width$}", next, width = width)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

fn migration_template(name: &str, version: &str) -> String {
    format!(
        "-- Migration: {}\n\
         -- Version: {}\n\
         -- Created: {}\n\
         --\n\
         -- The whole file runs as one transaction on `migrate up`.\n\
         -- `migrate down` only forgets this version; write a new migration to undo changes.\n\n",
        name.trim(),
        version,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
