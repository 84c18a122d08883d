//! Migration Loader - reads SQL migration files from a directory
//!
//! Each `*.sql` file is one unit. The file stem is the unit name, so
//! `20240101_120000_create_users.sql` becomes `20240101_120000_create_users`.
//! The body holds an `-- up` section and an optional `-- down` section:
//!
//! ```sql
//! -- up
//! CREATE TABLE users (id SERIAL PRIMARY KEY);
//!
//! -- down
//! DROP TABLE users;
//! ```

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{MigrateError, MigrateResult};
use crate::unit::Direction;

/// A migration unit backed by a SQL file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    pub name: String,
    pub path: PathBuf,
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    /// Build a unit from raw `-- up` / `-- down` file content
    pub fn parse(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content: &str,
    ) -> MigrateResult<Self> {
        let name = name.into();
        let (up_sql, down_sql) = parse_sections(content).ok_or_else(|| {
            MigrateError::load(format!("Migration {} has no '-- up' section", name))
        })?;

        Ok(Self {
            up: split_statements(&up_sql),
            down: split_statements(&down_sql),
            name,
            path: path.into(),
        })
    }

    /// Statements to execute for `direction`, in order
    pub fn statements(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    /// Whether the file carries any `-- down` statements
    pub fn is_reversible(&self) -> bool {
        !self.down.is_empty()
    }
}

/// Loads [`SqlMigration`]s from a directory
pub struct MigrationLoader {
    directory: PathBuf,
}

impl MigrationLoader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load all migration files, sorted by name
    pub fn load(&self) -> MigrateResult<Vec<SqlMigration>> {
        if !self.directory.exists() {
            warn!(directory = %self.directory.display(), "Migrations directory not found");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.directory).map_err(|e| {
            MigrateError::load(format!(
                "Failed to read migrations directory {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            migrations.push(self.load_file(&path)?);
        }

        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            directory = %self.directory.display(),
            count = migrations.len(),
            "Loaded migration files"
        );
        Ok(migrations)
    }

    fn load_file(&self, path: &Path) -> MigrateResult<SqlMigration> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                MigrateError::load(format!("Invalid migration filename: {}", path.display()))
            })?;

        let content = fs::read_to_string(path).map_err(|e| {
            MigrateError::load(format!("Failed to read migration file {}: {}", path.display(), e))
        })?;

        let migration = SqlMigration::parse(name, path, &content)?;
        if !migration.is_reversible() {
            debug!(migration = name, "Migration has no down statements");
        }
        Ok(migration)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// Split file content into `(up, down)` SQL. Returns `None` when no up
/// marker is present. Marker lines are `-- up` / `-- down` (any case,
/// `-- +migrate up` style prefixes accepted); other comment lines are dropped.
fn parse_sections(content: &str) -> Option<(String, String)> {
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = Section::Preamble;
    let mut saw_up = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(comment) = trimmed.strip_prefix("--") {
            let marker = comment.trim().trim_start_matches("+migrate").trim().to_lowercase();
            if marker == "up" || marker.starts_with("up migration") {
                section = Section::Up;
                saw_up = true;
            } else if marker == "down" || marker.starts_with("down migration") {
                section = Section::Down;
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Preamble => {}
        }
    }

    if !saw_up {
        return None;
    }
    Some((
        up_sql.join("\n").trim().to_string(),
        down_sql.join("\n").trim().to_string(),
    ))
}

/// Split SQL into individual statements using the PostgreSQL parser, falling
/// back to naive semicolon splitting for input the parser rejects.
pub fn split_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => statements
            .into_iter()
            .map(|statement| format!("{};", statement))
            .collect(),
        Err(e) => {
            warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const USERS: &str = "-- Migration: create users\n\
        -- up\n\
        CREATE TABLE users (id INT PRIMARY KEY);\n\
        CREATE INDEX users_id ON users (id);\n\
        \n\
        -- down\n\
        DROP TABLE users;\n";

    #[test]
    fn test_parse_sections() {
        let migration = SqlMigration::parse("001_users", "001_users.sql", USERS).unwrap();
        assert_eq!(migration.statements(Direction::Up).len(), 2);
        assert_eq!(migration.statements(Direction::Down), ["DROP TABLE users;"]);
        assert!(migration.is_reversible());
    }

    #[test]
    fn test_parse_accepts_migrate_prefix_markers() {
        let content = "-- +migrate Up\nCREATE TABLE t (id INT);\n-- +migrate Down\nDROP TABLE t;\n";
        let migration = SqlMigration::parse("001_t", "001_t.sql", content).unwrap();
        assert_eq!(migration.statements(Direction::Up), ["CREATE TABLE t (id INT);"]);
        assert_eq!(migration.statements(Direction::Down), ["DROP TABLE t;"]);
    }

    #[test]
    fn test_parse_requires_up_section() {
        let result = SqlMigration::parse("001_bad", "001_bad.sql", "CREATE TABLE t (id INT);");
        assert!(matches!(result, Err(MigrateError::Load { .. })));
    }

    #[test]
    fn test_missing_down_section_is_irreversible() {
        let content = "-- up\nCREATE TABLE t (id INT);";
        let migration = SqlMigration::parse("001_t", "001_t.sql", content).unwrap();
        assert!(!migration.is_reversible());
        assert!(migration.statements(Direction::Down).is_empty());
    }

    #[test]
    fn test_split_statements_falls_back() {
        let statements = split_statements("THIS IS NOT SQL; NOR THIS");
        assert_eq!(statements, vec!["THIS IS NOT SQL;", "NOR THIS;"]);
    }

    #[test]
    fn test_load_sorts_and_filters_files() {
        let dir = tempfile::tempdir().unwrap();
        let posts = "-- up\nCREATE TABLE posts (id INT);\n";
        fs::write(dir.path().join("002_posts.sql"), posts).unwrap();
        fs::write(dir.path().join("001_users.sql"), USERS).unwrap();
        fs::write(dir.path().join("README.md"), "not a migration").unwrap();

        let migrations = MigrationLoader::new(dir.path()).load().unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["001_users", "002_posts"]);
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let migrations = MigrationLoader::new("/nonexistent/migrations").load().unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("001_broken.sql"), "SELECT 1;").unwrap();

        let result = MigrationLoader::new(dir.path()).load();
        assert!(matches!(result, Err(MigrateError::Load { .. })));
    }
}
