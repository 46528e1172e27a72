//! Static assets served by the application process itself.
//!
//! `collect_static` copies a source tree into the static root, adding a
//! content-hashed copy of every file and a `staticfiles.json` manifest that
//! maps original names to hashed ones. Each copy gets `.gz` and `.br`
//! siblings that are served to clients accepting those encodings. Hashed
//! names are cached for good in production.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use flate2::{write::GzEncoder, Compression};
use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, services::ServeDir};
use walkdir::WalkDir;

use crate::infrastructure::settings::{Settings, STATIC_URL};

pub const MANIFEST_NAME: &str = "staticfiles.json";
const MANIFEST_VERSION: &str = "1.1";
const HASH_LEN: usize = 12;

const IMMUTABLE: &str = "public, max-age=315360000, immutable";
const SHORT_LIVED: &str = "public, max-age=60";

// Formats that gain nothing from another compression pass.
const PRECOMPRESSED: &[&str] = &["gz", "br", "zip", "png", "jpg", "jpeg", "gif", "webp", "woff", "woff2"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticManifest {
    pub version: String,
    pub paths: BTreeMap<String, String>,
}

impl StaticManifest {
    /// Reads `staticfiles.json` from `root`. A missing manifest is empty.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Public URL for `name`, preferring its hashed copy.
    pub fn url(&self, name: &str) -> String {
        let name = name.trim_start_matches('/');
        let resolved = self.paths.get(name).map(String::as_str).unwrap_or(name);
        format!("{STATIC_URL}{resolved}")
    }
}

/// `app.3f2a9c0d1e4b.css` style names: a 12 digit hex segment right before
/// the extension (or at the end when there is none).
pub fn is_hashed(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    let parts: Vec<&str> = file.split('.').collect();
    let candidate = match parts.len() {
        0 | 1 => return false,
        2 => parts[1],
        n => parts[n - 2],
    };
    candidate.len() == HASH_LEN && candidate.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn hashed_name(rel: &str, contents: &[u8]) -> String {
    let digest = blake3::hash(contents).to_hex();
    let hash = &digest.as_str()[..HASH_LEN];
    let (dir, file) = match rel.rsplit_once('/') {
        Some((dir, file)) => (format!("{dir}/"), file),
        None => (String::new(), rel),
    };
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{dir}{stem}.{hash}.{ext}"),
        _ => format!("{dir}{file}.{hash}"),
    }
}

/// Copies every file under `source` into `dest` under its own name and under
/// a content-hashed name, compresses both, then writes the manifest.
pub fn collect_static(source: &Path, dest: &Path) -> Result<StaticManifest> {
    let mut manifest = StaticManifest { version: MANIFEST_VERSION.to_string(), paths: BTreeMap::new() };
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.with_context(|| format!("scanning {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_name(source, entry.path())?;
        if rel == MANIFEST_NAME {
            continue;
        }
        let contents = fs::read(entry.path()).with_context(|| format!("reading {}", entry.path().display()))?;
        let hashed = hashed_name(&rel, &contents);
        for name in [&rel, &hashed] {
            let target = dest.join(name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &contents).with_context(|| format!("writing {}", target.display()))?;
            if compressible(&target) {
                write_compressed(&target, &contents)?;
            }
        }
        tracing::debug!(file = %rel, hashed = %hashed, "collected");
        manifest.paths.insert(rel, hashed);
    }

    fs::create_dir_all(dest)?;
    fs::write(dest.join(MANIFEST_NAME), serde_json::to_vec_pretty(&manifest)?)?;
    Ok(manifest)
}

/// `/`-separated path of `path` below `root`, as used in URLs and the manifest.
fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root)?;
    Ok(rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
}

fn compressible(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => !PRECOMPRESSED.contains(&ext.to_string_lossy().to_lowercase().as_str()),
        None => true,
    }
}

/// Writes `<target>.gz` and `<target>.br` next to `target`.
fn write_compressed(target: &Path, contents: &[u8]) -> Result<()> {
    let mut gzip = GzEncoder::new(Vec::new(), Compression::best());
    gzip.write_all(contents)?;
    let gz_path = with_suffix(target, "gz");
    fs::write(&gz_path, gzip.finish()?).with_context(|| format!("writing {}", gz_path.display()))?;

    let mut brotli = brotli::CompressorWriter::new(Vec::new(), 4096, 11, 22);
    brotli.write_all(contents)?;
    let br_path = with_suffix(target, "br");
    fs::write(&br_path, brotli.into_inner()).with_context(|| format!("writing {}", br_path.display()))?;
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

async fn cache_control(req: Request, next: Next) -> Response {
    let hashed = is_hashed(req.uri().path());
    let mut response = next.run(req).await;
    if response.status().is_success() {
        let value = if hashed { IMMUTABLE } else { SHORT_LIVED };
        response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
    }
    response
}

/// Router serving `STATIC_ROOT` under `/static/`. Precompressed `.gz`/`.br`
/// siblings are used when present.
pub fn router(settings: &Settings) -> Router {
    let files = ServeDir::new(&settings.static_root)
        .precompressed_gzip()
        .precompressed_br();
    let prefix = STATIC_URL.trim_end_matches('/');
    let router = Router::new().nest_service(prefix, files);

    if settings.static_compressed_manifest {
        router
            .layer(middleware::from_fn(cache_control))
            .layer(CompressionLayer::new())
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn recognizes_hashed_names() {
        assert!(is_hashed("/static/css/app.3f2a9c0d1e4b.css"));
        assert!(is_hashed("LICENSE.0123456789ab"));
        assert!(!is_hashed("/static/css/app.css"));
        assert!(!is_hashed("app.3F2A9C0D1E4B.css"));
        assert!(!is_hashed("app.3f2a9c.css"));
    }

    #[test]
    fn hashed_name_keeps_directory_and_extension() {
        let name = hashed_name("css/app.css", b"body{}");
        assert!(name.starts_with("css/app."));
        assert!(name.ends_with(".css"));
        assert!(is_hashed(&name));
        assert_ne!(name, hashed_name("css/app.css", b"body{color:red}"));
        assert!(is_hashed(&hashed_name("LICENSE", b"mit")));
    }

    #[test]
    fn collect_writes_copies_and_manifest() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(source.path().join("css")).unwrap();
        fs::write(source.path().join("css/app.css"), "body{}").unwrap();
        fs::write(source.path().join("robots.txt"), "User-agent: *").unwrap();

        let manifest = collect_static(source.path(), dest.path()).unwrap();
        let hashed = &manifest.paths["css/app.css"];
        assert!(dest.path().join("css/app.css").exists());
        assert!(dest.path().join(hashed).exists());

        let loaded = StaticManifest::load(dest.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.version, "1.1");
        assert_eq!(loaded.url("css/app.css"), format!("/static/{hashed}"));
        assert_eq!(loaded.url("missing.js"), "/static/missing.js");
    }

    #[test]
    fn collect_writes_gzip_and_brotli_siblings() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(source.path().join("app.css"), "body{margin:0}").unwrap();
        fs::write(source.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let manifest = collect_static(source.path(), dest.path()).unwrap();
        let hashed = &manifest.paths["app.css"];
        for name in ["app.css".to_string(), hashed.clone()] {
            assert!(dest.path().join(format!("{name}.gz")).exists(), "{name}.gz");
            assert!(dest.path().join(format!("{name}.br")).exists(), "{name}.br");
        }
        assert!(!dest.path().join("logo.png.gz").exists());
    }

    #[test]
    fn missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(StaticManifest::load(dir.path()).unwrap(), StaticManifest::default());
    }

    fn settings(root: &Path, production: bool) -> Settings {
        let base = if production { Settings::production(vec!["localhost".into()]) } else { Settings::local() };
        Settings { static_root: root.to_path_buf(), ..base }
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn serves_gzip_sibling_when_accepted() {
        use std::io::Read;

        let source = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::write(source.path().join("app.css"), "body{margin:0}").unwrap();
        let manifest = collect_static(source.path(), root.path()).unwrap();
        let hashed = &manifest.paths["app.css"];
        assert!(hashed.starts_with("app.") && hashed.ends_with(".css"));
        assert!(root.path().join(format!("{hashed}.gz")).exists());

        let request = Request::builder()
            .uri(manifest.url("app.css"))
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let response = router(&settings(root.path(), false)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get(header::CONTENT_ENCODING), Some(&HeaderValue::from_static("gzip")));

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let mut decoded = String::new();
        flate2::read::GzDecoder::new(&body[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "body{margin:0}");
    }

    #[tokio::test]
    async fn serves_files_with_cache_headers_in_production() {
        let source = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::write(source.path().join("app.js"), "console.log(1)").unwrap();
        let manifest = collect_static(source.path(), root.path()).unwrap();
        let app = router(&settings(root.path(), true));

        let hashed = get(app.clone(), &manifest.url("app.js")).await;
        assert_eq!(hashed.status(), 200);
        assert_eq!(hashed.headers().get(header::CACHE_CONTROL), Some(&HeaderValue::from_static(IMMUTABLE)));

        let plain = get(app.clone(), "/static/app.js").await;
        assert_eq!(plain.status(), 200);
        assert_eq!(plain.headers().get(header::CACHE_CONTROL), Some(&HeaderValue::from_static(SHORT_LIVED)));

        assert_eq!(get(app, "/static/nope.js").await.status(), 404);
    }

    #[tokio::test]
    async fn local_serves_without_cache_headers() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("app.js"), "console.log(1)").unwrap();
        let response = get(router(&settings(root.path(), false)), "/static/app.js").await;
        assert_eq!(response.status(), 200);
        assert!(!response.headers().contains_key(header::CACHE_CONTROL));
    }
}
