//! Layered page store
//!
//! Reads are served from whichever layer is active at call time: the cache tree
//! when its root exists, otherwise the bundled snapshot. The decision is never
//! cached, so a refresh that installs a new cache tree is picked up by the very
//! next read.
//!
//! The on-disk layout under each layer root is
//! `pages.<language>/<platform>/<command>.md`.

mod names;


pub use names::{AutonymTable, LanguageNames, platform_display_name, title_case};

use crate::config::StoreConfig;
use crate::error::{Error, Result, StorageError};
use crate::types::{
    CommandIndex, LanguageEntry, PageLookup, PlatformEntry, StorageLayer, StoreInfo,
};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Prefix of every language directory in a page tree
pub const PAGES_PREFIX: &str = "pages.";

/// Read-side view over the bundled and cached page trees
#[derive(Clone)]
pub struct LayeredStore {
    bundled_root: PathBuf,
    cache_root: PathBuf,
    default_language: String,
    language_names: Arc<dyn LanguageNames>,
}

impl std::fmt::Debug for LayeredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredStore")
            .field("bundled_root", &self.bundled_root)
            .field("cache_root", &self.cache_root)
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}

impl LayeredStore {
    /// Create a store over the configured layer roots using the built-in autonym table
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            bundled_root: config.bundled_root.clone(),
            cache_root: config.cache_root.clone(),
            default_language: config.default_language.clone(),
            language_names: Arc::new(AutonymTable),
        }
    }

    /// Replace the language-name lookup
    pub fn with_language_names(mut self, names: impl LanguageNames + 'static) -> Self {
        self.language_names = Arc::new(names);
        self
    }

    /// Root of the bundled snapshot
    pub fn bundled_root(&self) -> &Path {
        &self.bundled_root
    }

    /// Root of the updatable cache tree
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Layer that currently serves reads
    ///
    /// Cached wins whenever its root directory exists. Evaluated against the
    /// filesystem on every call.
    pub fn resolve_active_layer(&self) -> StorageLayer {
        if self.cache_root.is_dir() {
            StorageLayer::Cached
        } else {
            StorageLayer::Bundled
        }
    }

    /// Root directory of a layer
    pub fn layer_root(&self, layer: StorageLayer) -> &Path {
        match layer {
            StorageLayer::Bundled => &self.bundled_root,
            StorageLayer::Cached => &self.cache_root,
        }
    }

    fn active_root(&self) -> (StorageLayer, &Path) {
        let layer = self.resolve_active_layer();
        (layer, self.layer_root(layer))
    }

    /// Describe the active layer and when its root was last modified
    pub fn info(&self) -> StoreInfo {
        let (layer, root) = self.active_root();
        let updated_at = fs::metadata(root)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        StoreInfo {
            layer,
            root: root.to_path_buf(),
            updated_at,
        }
    }

    /// Languages present as `pages.<code>` directories, sorted by display name
    pub fn list_languages(&self) -> Result<Vec<LanguageEntry>> {
        let (layer, root) = self.active_root();
        let mut languages: Vec<LanguageEntry> = list_dir(root)?
            .into_iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let code = name.strip_prefix(PAGES_PREFIX)?;
                (!code.is_empty()).then(|| code.to_string())
            })
            .map(|code| LanguageEntry {
                display_name: self
                    .language_names
                    .display_name(&code)
                    .unwrap_or_else(|| title_case(&code)),
                code,
            })
            .collect();

        languages.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        debug!(%layer, count = languages.len(), "listed languages");
        Ok(languages)
    }

    /// Platforms present for the baseline language, sorted by display name
    pub fn list_platforms(&self) -> Result<Vec<PlatformEntry>> {
        let (layer, root) = self.active_root();
        let default_pages = root.join(format!("{PAGES_PREFIX}{}", self.default_language));

        let mut platforms: Vec<PlatformEntry> = list_dir(&default_pages)?
            .into_iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .map(|code| PlatformEntry {
                display_name: platform_display_name(&code),
                code,
            })
            .collect();

        platforms.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        debug!(%layer, count = platforms.len(), "listed platforms");
        Ok(platforms)
    }

    /// Build the command index for the enabled languages and platforms
    ///
    /// Pairs whose directory is missing are skipped and pairs without commands are
    /// omitted, so only languages and platforms present both in the allow-lists and
    /// in the active tree appear.
    pub fn list_commands<L, P>(
        &self,
        enabled_languages: &[L],
        enabled_platforms: &[P],
    ) -> Result<CommandIndex>
    where
        L: AsRef<str>,
        P: AsRef<str>,
    {
        let (layer, root) = self.active_root();
        let mut index = CommandIndex::default();

        for language in enabled_languages {
            let language = language.as_ref();
            if validate_component("language", language).is_err() {
                debug!(language, "skipping invalid language code");
                continue;
            }
            let language_dir = root.join(format!("{PAGES_PREFIX}{language}"));

            for platform in enabled_platforms {
                let platform = platform.as_ref();
                if validate_component("platform", platform).is_err() {
                    debug!(platform, "skipping invalid platform code");
                    continue;
                }

                let commands: Vec<String> = list_dir(&language_dir.join(platform))?
                    .into_iter()
                    .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
                    .filter(|path| path.is_file())
                    .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
                    .collect();

                index.insert(language, platform, commands);
            }
        }

        debug!(%layer, entries = index.len(), "built command index");
        Ok(index)
    }

    /// Read a page from the active layer
    ///
    /// Returns the exact stored text. A missing page yields [`PageLookup::NotFound`]
    /// carrying the attempted path.
    pub fn get_page(&self, language: &str, platform: &str, command: &str) -> Result<PageLookup> {
        validate_component("language", language)?;
        validate_component("platform", platform)?;
        validate_component("command", command)?;

        let layer = self.resolve_active_layer();
        let lookup = self.read_page(layer, language, platform, command)?;

        // The cache tree may have been swapped between resolving and reading; a
        // miss is retried once against whatever layer is active now.
        if !lookup.is_found() {
            let current = self.resolve_active_layer();
            if current != layer {
                debug!(from = %layer, to = %current, "active layer changed during read, retrying");
                return self.read_page(current, language, platform, command);
            }
        }

        Ok(lookup)
    }

    fn read_page(
        &self,
        layer: StorageLayer,
        language: &str,
        platform: &str,
        command: &str,
    ) -> Result<PageLookup> {
        let path = page_path(self.layer_root(layer), language, platform, command);

        match fs::read_to_string(&path) {
            Ok(content) => Ok(PageLookup::Found { path, content }),
            Err(e) if is_absent(&e) => {
                debug!(%layer, ?path, "page not found");
                Ok(PageLookup::NotFound {
                    path,
                    command: command.to_string(),
                })
            }
            Err(source) => Err(StorageError::ReadPage { path, source }.into()),
        }
    }
}

/// Path of a page below a layer root
pub fn page_path(root: &Path, language: &str, platform: &str, command: &str) -> PathBuf {
    root.join(format!("{PAGES_PREFIX}{language}"))
        .join(platform)
        .join(format!("{command}.md"))
}

/// List a directory's entries; an absent directory lists as empty
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if is_absent(&e) => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::ReadDir {
                path: dir.to_path_buf(),
                source,
            }
            .into());
        }
    };

    entries
        .map(|entry| {
            entry.map(|e| e.path()).map_err(|source| {
                Error::from(StorageError::ReadDir {
                    path: dir.to_path_buf(),
                    source,
                })
            })
        })
        .collect()
}

fn is_absent(e: &std::io::Error) -> bool {
    // NotADirectory covers a layer root replaced by a plain file
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

/// Reject a name that would not stay a single entry of its directory
///
/// Each name becomes one path segment (`pages.<language>`, `<platform>`,
/// `<command>.md`). Names that yield an ordinary segment, including empty or
/// dotted ones, are valid and simply miss on disk.
fn validate_component(kind: &'static str, value: &str) -> std::result::Result<(), StorageError> {
    let segment = match kind {
        "language" => format!("{PAGES_PREFIX}{value}"),
        "command" => format!("{value}.md"),
        _ => value.to_string(),
    };

    let mut components = Path::new(&segment).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single_normal || value.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidComponent {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}
