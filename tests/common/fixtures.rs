//! Archive and page-tree fixtures

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tldr_mirror::{Config, SyncCoordinator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Path the mock server serves the archive under
pub const ARCHIVE_PATH: &str = "/tldr/archive/refs/heads/main.zip";

/// Build an in-memory zip archive wrapped in `tldr-main/`, like the upstream one
///
/// Each entry is `(path below the wrapper, content)`.
pub fn upstream_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory("tldr-main/", options)
        .expect("failed to add wrapper directory");
    for (name, content) in entries {
        zip.start_file(format!("tldr-main/{name}"), options)
            .expect("failed to start zip entry");
        zip.write_all(content.as_bytes())
            .expect("failed to write zip entry");
    }
    zip.finish().expect("failed to finish zip").into_inner()
}

/// A realistic archive: `pages` for English, a `pages.en` symlink, extra languages
/// and repository files that must be stripped
pub fn realistic_archive() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let files = [
        ("tldr-main/README.md", "# tldr-pages"),
        ("tldr-main/LICENSE.md", "CC-BY-4.0"),
        ("tldr-main/scripts/build.py", "print('build')"),
        ("tldr-main/pages/common/tar.md", "# tar\n\n> Archiving utility.\n"),
        ("tldr-main/pages/common/git.md", "# git\n\n> Distributed VCS.\n"),
        ("tldr-main/pages/linux/apt.md", "# apt\n\n> Debian package manager.\n"),
        ("tldr-main/pages/osx/brew.md", "# brew\n\n> Homebrew.\n"),
        ("tldr-main/pages.de/common/tar.md", "# tar\n\n> Archivierungswerkzeug.\n"),
        ("tldr-main/pages.fr/linux/apt.md", "# apt\n\n> Gestionnaire de paquets.\n"),
    ];
    for (name, content) in files {
        zip.start_file(name, options)
            .expect("failed to start zip entry");
        zip.write_all(content.as_bytes())
            .expect("failed to write zip entry");
    }
    zip.add_symlink("tldr-main/pages.en", "pages", options)
        .expect("failed to add symlink entry");

    zip.finish().expect("failed to finish zip").into_inner()
}

/// Start a mock server answering the archive path with `body`
pub async fn serve_archive(body: Vec<u8>) -> MockServer {
    serve_response(ResponseTemplate::new(200).set_body_bytes(body)).await
}

/// Start a mock server answering the archive path with `response`
pub async fn serve_response(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

/// Layer roots inside a temporary directory
pub struct TestRoots {
    /// Keeps the temporary directory alive
    pub temp: TempDir,
    /// Bundled snapshot root
    pub bundled: PathBuf,
    /// Cache tree root
    pub cache: PathBuf,
}

impl TestRoots {
    /// Fresh roots; neither layer exists yet
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let bundled = temp.path().join("app").join("share").join("tldr-data");
        let cache = temp.path().join("cache").join("brief").join("tldr-data");
        Self {
            temp,
            bundled,
            cache,
        }
    }

    /// Configuration pointing at these roots and the mock server
    pub fn config(&self, server: &MockServer) -> Config {
        let mut config = Config::with_roots(&self.bundled, &self.cache);
        config.sync.archive_url = format!("{}{}", server.uri(), ARCHIVE_PATH);
        config
    }

    /// Coordinator pointing at these roots and the mock server
    pub fn coordinator(&self, server: &MockServer) -> SyncCoordinator {
        SyncCoordinator::new(self.config(server)).expect("failed to create coordinator")
    }
}

/// Write a page below a layer root
pub fn write_page(root: &Path, language: &str, platform: &str, command: &str, content: &str) {
    let dir = root.join(format!("pages.{language}")).join(platform);
    std::fs::create_dir_all(&dir).expect("failed to create page directory");
    std::fs::write(dir.join(format!("{command}.md")), content).expect("failed to write page");
}
