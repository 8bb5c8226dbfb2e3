//! Storage for files submitted through forms.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::AsRefStr;
use tracing::debug;

use crate::{Config, HookflowError, Result, common::Vars, utils};

const LOCATION_KEY: &str = "fileUploadLocation";
const EXPIRATION_KEY: &str = "fileExpirationHours";
const HOUR_MILLIS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileLocation {
    #[default]
    Local,
    Object,
}

impl FileLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Some(FileLocation::Local),
            "object" | "s3" => Some(FileLocation::Object),
            _ => None,
        }
    }
}

/// A file part of a form submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Reference to a stored upload, embedded into the form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub name: String,
    pub url: String,
    pub size: usize,
    pub mime_type: String,
    pub location: FileLocation,
    pub expires_at: String,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    fn location(&self) -> FileLocation;

    /// Stores `file` under `key` and returns its public url.
    async fn put(
        &self,
        key: &str,
        file: &UploadedFile,
    ) -> Result<String>;
}

/// Files on local disk, served back under `/uploads`.
pub struct LocalFileStore {
    dir: PathBuf,
    public_url: String,
}

impl LocalFileStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        public_url: &str,
    ) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    fn location(&self) -> FileLocation {
        FileLocation::Local
    }

    async fn put(
        &self,
        key: &str,
        file: &UploadedFile,
    ) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(key), &file.data).await?;
        Ok(format!("{}/uploads/{}", self.public_url, key))
    }
}

/// Files PUT to an object storage endpoint.
pub struct ObjectFileStore {
    endpoint: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ObjectFileStore {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            http,
        }
    }
}

#[async_trait]
impl FileStore for ObjectFileStore {
    fn location(&self) -> FileLocation {
        FileLocation::Object
    }

    async fn put(
        &self,
        key: &str,
        file: &UploadedFile,
    ) -> Result<String> {
        let url = format!("{}/{}", self.endpoint, key);
        let mut request = self.http.put(&url).header(reqwest::header::CONTENT_TYPE, file.mime_type.as_str()).body(file.data.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| HookflowError::IoError(format!("failed to upload {} to object storage: {}", file.name, e)))?;
        Ok(url)
    }
}

/// Upload backends configured for this process.
pub struct Uploads {
    local: Arc<LocalFileStore>,
    object: Option<Arc<ObjectFileStore>>,
    default_expiration_hours: i64,
}

impl Uploads {
    pub fn new(
        config: &Config,
        http: reqwest::Client,
    ) -> Self {
        Self {
            local: Arc::new(LocalFileStore::new(&config.uploads.local_dir, &config.server.public_url)),
            object: config.uploads.object_endpoint.as_deref().map(|endpoint| Arc::new(ObjectFileStore::new(endpoint, config.uploads.object_token.clone(), http))),
            default_expiration_hours: config.uploads.default_expiration_hours,
        }
    }

    pub fn local_dir(&self) -> &PathBuf {
        self.local.dir()
    }

    pub fn store(
        &self,
        location: FileLocation,
    ) -> Result<Arc<dyn FileStore>> {
        match location {
            FileLocation::Local => Ok(self.local.clone()),
            FileLocation::Object => match &self.object {
                Some(store) => Ok(store.clone()),
                None => Err(HookflowError::Config("object uploads need [uploads] object_endpoint".to_string())),
            },
        }
    }

    /// Stores `files` where the form node `config` says and returns the
    /// references keyed by form field.
    pub async fn persist(
        &self,
        config: &Vars,
        files: &[UploadedFile],
        submitted_at: i64,
    ) -> Result<Map<String, Value>> {
        let location = match config.get_str(LOCATION_KEY) {
            Some(s) => FileLocation::parse(s).ok_or_else(|| HookflowError::BadRequest(format!("unknown file upload location '{}'", s)))?,
            None => FileLocation::default(),
        };
        let hours = config.get::<i64>(EXPIRATION_KEY).filter(|h| *h > 0).unwrap_or(self.default_expiration_hours);
        let expires_at = utils::time::to_rfc3339(submitted_at + hours * HOUR_MILLIS);
        let store = self.store(location)?;

        let mut refs = Map::new();
        for file in files {
            let key = format!("{}_{}", utils::longid(), sanitize(&file.name));
            let url = store.put(&key, file).await?;
            debug!("stored upload {} at {}", file.name, url);
            let stored = StoredFile {
                name: file.name.clone(),
                url,
                size: file.data.len(),
                mime_type: file.mime_type.clone(),
                location,
                expires_at: expires_at.clone(),
            };
            let mut field = file.field.clone();
            let mut n = 1;
            while refs.contains_key(&field) {
                n += 1;
                field = format!("{}_{}", file.field, n);
            }
            refs.insert(field, serde_json::to_value(stored)?);
        }
        Ok(refs)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name.chars().map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }).collect();
    match cleaned.trim_start_matches('.') {
        "" => "file".to_string(),
        s => s.to_string(),
    }
}

#[cfg(test)]
mod test {
    use axum::body::Bytes;
    use serde_json::json;

    use super::{FileLocation, UploadedFile, Uploads, sanitize};
    use crate::{Config, common::Vars};

    fn file(field: &str) -> UploadedFile {
        UploadedFile {
            field: field.to_string(),
            name: "report 1.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize("a b.txt"), "a_b.txt");
        assert_eq!(sanitize(""), "file");
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(FileLocation::parse("S3"), Some(FileLocation::Object));
        assert_eq!(FileLocation::parse("local"), Some(FileLocation::Local));
        assert_eq!(FileLocation::parse("ftp"), None);
    }

    #[tokio::test]
    async fn test_persist_local_with_expiration() {
        let dir = std::env::temp_dir().join(format!("hookflow-upload-{}", crate::utils::longid()));
        let mut config = Config::default();
        config.uploads.local_dir = dir.to_string_lossy().to_string();
        let uploads = Uploads::new(&config, reqwest::Client::new());

        let node_config: Vars = json!({"fileUploadLocation": "local", "fileExpirationHours": 12}).into();
        let refs = uploads.persist(&node_config, &[file("doc"), file("doc")], 0).await.unwrap();

        assert_eq!(refs.len(), 2);
        let doc = &refs["doc"];
        assert_eq!(doc["expiresAt"], json!("1970-01-01T12:00:00+00:00"));
        assert_eq!(doc["size"], json!(8));
        assert_eq!(doc["location"], json!("local"));
        let url = doc["url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:8080/uploads/"));
        let key = url.rsplit('/').next().unwrap();
        assert_eq!(std::fs::read(dir.join(key)).unwrap(), b"%PDF-1.4");
        assert!(refs.contains_key("doc_2"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_object_location_needs_endpoint() {
        let uploads = Uploads::new(&Config::default(), reqwest::Client::new());
        let node_config: Vars = json!({"fileUploadLocation": "s3"}).into();
        assert!(uploads.persist(&node_config, &[file("doc")], 0).await.is_err());
    }
}
