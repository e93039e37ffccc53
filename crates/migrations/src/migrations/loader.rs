//! Migration Loader - File system discovery of migrations
//!
//! Scans a flat directory for two kinds of migration files:
//!
//! * declarative pairs, `{version}_{name}.up.sql` with an optional
//!   `{version}_{name}.down.sql`
//! * imperative units, `{version}_{Name}.{ext}`, for any other extension
//!
//! When a version exists in both forms the imperative unit wins and the
//! declarative pair is dropped.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::definitions::{MigrationKind, MigrationUnit};
use crate::error::{MigrateResult, MigrationError};

static DECLARATIVE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)_(.+)\.(up|down)\.sql$").expect("valid declarative pattern"));

static IMPERATIVE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)_(.+)\.([A-Za-z0-9]+)$").expect("valid imperative pattern"));

/// Discovers migrations in a directory
#[derive(Debug, Clone)]
pub struct MigrationLoader {
    directory: PathBuf,
}

impl MigrationLoader {
    /// Create a loader for `directory`.
    ///
    /// Fails with [`MigrationError::DirectoryInvalid`] unless the directory
    /// exists and can be listed.
    pub fn new(directory: impl Into<PathBuf>) -> MigrateResult<Self> {
        let directory = directory.into();

        if !directory.is_dir() {
            return Err(MigrationError::DirectoryInvalid {
                path: directory,
                reason: "not an existing directory".to_string(),
            });
        }

        if let Err(e) = fs::read_dir(&directory) {
            return Err(MigrationError::DirectoryInvalid {
                path: directory,
                reason: e.to_string(),
            });
        }

        Ok(Self { directory })
    }

    /// Get the migrations directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load all migrations, ordered ascending by version
    pub fn load(&self) -> MigrateResult<Vec<MigrationUnit>> {
        let read_failure = |source: std::io::Error| MigrationError::ReadFailure {
            path: self.directory.clone(),
            source,
        };

        let mut file_names = Vec::new();
        for entry in fs::read_dir(&self.directory).map_err(read_failure)? {
            let entry = entry.map_err(read_failure)?;
            // Follows symlinks; dangling links are skipped.
            if !entry.path().is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => file_names.push(name),
                Err(name) => warn!(file = ?name, "Skipping non UTF-8 file name"),
            }
        }
        // Directory order is unspecified; sorting keeps duplicate handling stable.
        file_names.sort();

        let up_stems: HashSet<&str> = file_names
            .iter()
            .filter_map(|name| name.strip_suffix(".up.sql"))
            .collect();

        let mut declarative: BTreeMap<String, MigrationUnit> = BTreeMap::new();
        let mut imperative: BTreeMap<String, MigrationUnit> = BTreeMap::new();

        for file_name in &file_names {
            if let Some(caps) = DECLARATIVE_FILE.captures(file_name) {
                let version = &caps[1];
                let stem = format!("{}_{}", version, &caps[2]);
                let has_up = up_stems.contains(stem.as_str());
                let unit = MigrationUnit::new(
                    version.to_string(),
                    display_name(&caps[2]),
                    self.directory.join(&stem).to_string_lossy().into_owned(),
                    MigrationKind::Declarative,
                );

                // A stem with a forward file beats a down-only one for the same version.
                if has_up {
                    if let Some(existing) = declarative.get(version) {
                        let existing_has_up = Path::new(existing.locator())
                            .file_name()
                            .and_then(|stem| stem.to_str())
                            .map_or(false, |stem| up_stems.contains(stem));
                        if !existing_has_up {
                            warn!(
                                %version,
                                file = %file_name,
                                dropped = existing.name(),
                                "Down-only migration shadowed by a migration with an up file"
                            );
                            declarative.remove(version);
                        }
                    }
                }
                insert_unit(&mut declarative, unit, file_name);
            } else if let Some(caps) = IMPERATIVE_FILE.captures(file_name) {
                let unit = MigrationUnit::new(
                    caps[1].to_string(),
                    display_name(&caps[2]),
                    caps[2].to_string(),
                    MigrationKind::Imperative,
                );
                insert_unit(&mut imperative, unit, file_name);
            } else {
                debug!(file = %file_name, "Ignoring unrecognized file in migrations directory");
            }
        }

        for version in imperative.keys() {
            if declarative.remove(version).is_some() {
                warn!(%version, "Imperative migration overrides SQL migration with the same version");
            }
        }

        let mut units: Vec<MigrationUnit> = declarative
            .into_values()
            .chain(imperative.into_values())
            .collect();
        units.sort_by(|a, b| a.version().as_bytes().cmp(b.version().as_bytes()));

        Ok(units)
    }

    /// Create a new declarative migration pair and return its version
    pub fn create_migration(&self, name: &str) -> MigrateResult<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrationError::InvalidName(name.to_string()));
        }

        let version = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let stem = format!("{}_{}", version, slug);

        let up_path = self.directory.join(format!("{}.up.sql", stem));
        let down_path = self.directory.join(format!("{}.down.sql", stem));

        fs::write(&up_path, self.create_migration_template(name, &version, "Up"))?;
        fs::write(&down_path, self.create_migration_template(name, &version, "Down"))?;

        debug!(path = %up_path.display(), "Created migration");
        Ok(version)
    }

    fn create_migration_template(&self, name: &str, version: &str, direction: &str) -> String {
        format!(
            "-- Migration: {}\n\
             -- Version: {}\n\
             -- Created: {}\n\n\
             -- {} migration\n\n",
            name,
            version,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            direction
        )
    }
}

/// Keep the first unit seen for a version; later files for the same version are ignored
fn insert_unit(units: &mut BTreeMap<String, MigrationUnit>, unit: MigrationUnit, file_name: &str) {
    match units.entry(unit.version().to_string()) {
        Entry::Vacant(slot) => {
            slot.insert(unit);
        }
        Entry::Occupied(existing) => {
            if existing.get().locator() != unit.locator() {
                warn!(
                    version = unit.version(),
                    file = %file_name,
                    kept = existing.get().name(),
                    "Duplicate migration version, ignoring file"
                );
            }
        }
    }
}

/// Turn a file name fragment into a display name: `create_users-table` -> `Create Users Table`
pub(crate) fn display_name(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn slugify(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), "SELECT 1;").unwrap();
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("create_users_table"), "Create Users Table");
        assert_eq!(display_name("add-email_index"), "Add Email Index");
        assert_eq!(display_name("SeedAdminUser"), "SeedAdminUser");
        assert_eq!(display_name("__odd__name"), "Odd Name");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Create Users Table"), "create_users_table");
        assert_eq!(slugify("  add-email index!! "), "add_email_index");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_missing_directory_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        assert!(matches!(
            MigrationLoader::new(&missing),
            Err(MigrationError::DirectoryInvalid { .. })
        ));
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "file.txt");

        assert!(matches!(
            MigrationLoader::new(temp_dir.path().join("file.txt")),
            Err(MigrationError::DirectoryInvalid { .. })
        ));
    }

    #[test]
    fn test_load_recognizes_both_grammars() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "20240102000000_add_email.up.sql");
        touch(&temp_dir, "20240102000000_add_email.down.sql");
        touch(&temp_dir, "20240101000000_create_users.up.sql");
        touch(&temp_dir, "20240103000000_SeedAdminUser.rs");
        touch(&temp_dir, "README.md");
        touch(&temp_dir, "notes_20240101.txt");
        fs::create_dir(temp_dir.path().join("20240104000000_nested.up.sql")).unwrap();

        let loader = MigrationLoader::new(temp_dir.path()).unwrap();
        let units = loader.load().unwrap();

        let versions: Vec<&str> = units.iter().map(|u| u.version()).collect();
        assert_eq!(versions, vec!["20240101000000", "20240102000000", "20240103000000"]);

        assert_eq!(units[0].name(), "Create Users");
        assert_eq!(units[0].kind(), MigrationKind::Declarative);
        assert_eq!(
            units[1].locator(),
            temp_dir.path().join("20240102000000_add_email").to_string_lossy()
        );
        assert_eq!(units[2].kind(), MigrationKind::Imperative);
        assert_eq!(units[2].locator(), "SeedAdminUser");
    }

    #[test]
    fn test_imperative_wins_version_conflict() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "002_create_posts.up.sql");
        touch(&temp_dir, "002_create_posts.down.sql");
        touch(&temp_dir, "002_CreatePosts.rs");
        touch(&temp_dir, "001_create_users.up.sql");

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[1].version(), "002");
        assert_eq!(units[1].kind(), MigrationKind::Imperative);
        assert_eq!(units[1].locator(), "CreatePosts");
    }

    #[test]
    fn test_versions_sort_lexicographically() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "10_ten.up.sql");
        touch(&temp_dir, "9_nine.up.sql");
        touch(&temp_dir, "100_hundred.up.sql");

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();
        let versions: Vec<&str> = units.iter().map(|u| u.version()).collect();

        assert_eq!(versions, vec!["10", "100", "9"]);
    }

    #[test]
    fn test_down_only_pair_is_still_loaded() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "001_orphan.down.sql");

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind(), MigrationKind::Declarative);
    }

    #[test]
    fn test_non_ascii_digits_are_not_versions() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "١٢_arabic.up.sql");
        touch(&temp_dir, "１_fullwidth.up.sql");
        touch(&temp_dir, "３_Fullwidth.rs");

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_up_file_beats_down_only_stem() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "001_a_old.down.sql");
        touch(&temp_dir, "001_b_new.up.sql");
        touch(&temp_dir, "001_b_new.down.sql");

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), "B New");
        assert_eq!(
            units[0].locator(),
            temp_dir.path().join("001_b_new").to_string_lossy()
        );
    }

    #[test]
    fn test_first_up_stem_still_wins() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "001_a_first.up.sql");
        touch(&temp_dir, "001_b_second.up.sql");

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), "A First");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("create_users.sql"), "SELECT 1;").unwrap();
        std::os::unix::fs::symlink(
            shared.path().join("create_users.sql"),
            temp_dir.path().join("001_create_users.up.sql"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            shared.path().join("missing.sql"),
            temp_dir.path().join("002_dangling.up.sql"),
        )
        .unwrap();

        let units = MigrationLoader::new(temp_dir.path()).unwrap().load().unwrap();
        let versions: Vec<&str> = units.iter().map(|u| u.version()).collect();
        assert_eq!(versions, vec!["001"]);
    }

    #[test]
    fn test_create_migration_writes_pair() {
        let temp_dir = TempDir::new().unwrap();
        let loader = MigrationLoader::new(temp_dir.path()).unwrap();

        let version = loader.create_migration("Create Users Table").unwrap();
        assert_eq!(version.len(), 14);

        let up = temp_dir
            .path()
            .join(format!("{}_create_users_table.up.sql", version));
        let down = temp_dir
            .path()
            .join(format!("{}_create_users_table.down.sql", version));
        assert!(up.exists());
        assert!(down.exists());

        let content = fs::read_to_string(up).unwrap();
        assert!(content.contains("-- Migration: Create Users Table"));
        assert!(content.contains("-- Up migration"));

        let units = loader.load().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), "Create Users Table");
    }

    #[test]
    fn test_create_migration_rejects_empty_name() {
        let temp_dir = TempDir::new().unwrap();
        let loader = MigrationLoader::new(temp_dir.path()).unwrap();

        assert!(matches!(
            loader.create_migration("  "),
            Err(MigrationError::InvalidName(_))
        ));
    }
}
