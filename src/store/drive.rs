use crate::config::DriveConfig;
use crate::error::{Error, Result};
use crate::models::{DocumentRecord, FileSummary};
use crate::store::DocumentFetcher;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
const MAX_DRIVE_PAGE_SIZE: usize = 1000;
const FILE_FIELDS: &str = "id, name, mimeType, modifiedTime";
const LISTING_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime)";

/// Google Drive + Docs REST adapter
///
/// Only Google Docs are indexed. Credentials are not acquired here: the
/// adapter sends whatever bearer token it was configured with.
pub struct DriveDocumentStore {
    drive_url: String,
    docs_url: String,
    access_token: String,
    page_size: usize,
    client: reqwest::Client,
}

impl DriveDocumentStore {
    pub fn new(config: &DriveConfig, access_token: impl Into<String>) -> Self {
        Self {
            drive_url: config.drive_url.trim_end_matches('/').to_string(),
            docs_url: config.docs_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            page_size: config.page_size.clamp(1, MAX_DRIVE_PAGE_SIZE),
            client: reqwest::Client::new(),
        }
    }

    /// Public edit link for a Google Doc
    pub fn document_url(document_id: &str) -> String {
        format!("https://docs.google.com/document/d/{}/edit", document_id)
    }

    /// List files across every page, stopping early once `max` files are in
    async fn list_entries(&self, mime_type: Option<&str>, max: Option<usize>) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_size = match max {
                Some(max) => (max - files.len()).min(self.page_size),
                None => self.page_size,
            };
            let page = self
                .list_page(page_size, mime_type, page_token.as_deref())
                .await?;
            files.extend(page.files);

            if let Some(max) = max {
                if files.len() >= max {
                    files.truncate(max);
                    break;
                }
            }
            match page.next_page_token {
                Some(next) if !next.is_empty() && page_token.as_deref() != Some(next.as_str()) => {
                    debug!("Following Drive listing to the next page");
                    page_token = Some(next);
                }
                _ => break,
            }
        }

        Ok(files)
    }

    async fn list_page(
        &self,
        page_size: usize,
        mime_type: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<DriveFileList> {
        let url = format!("{}/files", self.drive_url);
        let page_size = page_size.to_string();
        let mut query = vec![
            ("pageSize", page_size.as_str()),
            ("fields", LISTING_FIELDS),
        ];
        let filter = mime_type.map(|mime| format!("mimeType='{}'", mime));
        if let Some(filter) = &filter {
            query.push(("q", filter.as_str()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to reach Drive API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "Drive API returned error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse Drive listing: {}", e)))
    }

    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files/{}", self.drive_url, file_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to reach Drive API: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "Drive API returned error {} for {}",
                response.status(),
                file_id
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse metadata of {}: {}", file_id, e)))
    }

    async fn fetch_document_text(&self, document_id: &str) -> Result<String> {
        let url = format!("{}/documents/{}", self.docs_url, document_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to reach Docs API: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "Docs API returned error {} for {}",
                response.status(),
                document_id
            )));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse document {}: {}", document_id, e)))?;

        Ok(extract_text(&doc))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Write(format!("Failed to reach Docs API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Write(format!(
                "Docs API returned error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Write(format!("Failed to parse Docs API response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    fn into_record(self, content: String) -> DocumentRecord {
        DocumentRecord {
            source_uri: DriveDocumentStore::document_url(&self.id),
            updated_at: self.modified_time.unwrap_or_else(Utc::now),
            id: self.id,
            title: self.name,
            content,
        }
    }
}

/// Concatenate every text run in a Docs API document body
pub(crate) fn extract_text(doc: &Value) -> String {
    let mut text = String::new();
    let content = doc
        .pointer("/body/content")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for element in content {
        let elements = element
            .pointer("/paragraph/elements")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for run in elements {
            if let Some(s) = run.pointer("/textRun/content").and_then(Value::as_str) {
                text.push_str(s);
            }
        }
    }

    text
}

#[async_trait::async_trait]
impl DocumentFetcher for DriveDocumentStore {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        let files = self.list_entries(Some(GOOGLE_DOC_MIME), None).await?;
        info!("Found {} Google Docs", files.len());

        let mut records = Vec::with_capacity(files.len());
        for file in files {
            match self.fetch_document_text(&file.id).await {
                Ok(content) => {
                    debug!("Fetched {} ({} chars)", file.name, content.len());
                    records.push(file.into_record(content));
                }
                Err(e) => warn!("Skipping {}: {}", file.name, e),
            }
        }

        Ok(records)
    }

    async fn read(&self, document_id: &str) -> Result<DocumentRecord> {
        let file = self.file_metadata(document_id).await?;
        let content = self.fetch_document_text(document_id).await?;
        Ok(file.into_record(content))
    }

    async fn create(&self, title: &str, body: &str) -> Result<DocumentRecord> {
        let created = self
            .post_json(&format!("{}/documents", self.docs_url), &json!({ "title": title }))
            .await?;
        let document_id = created
            .get("documentId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Write("Docs API response had no documentId".to_string()))?
            .to_string();

        if !body.is_empty() {
            let update = json!({
                "requests": [{
                    "insertText": {
                        "location": { "index": 1 },
                        "text": body,
                    }
                }]
            });
            self.post_json(
                &format!("{}/documents/{}:batchUpdate", self.docs_url, document_id),
                &update,
            )
            .await?;
        }

        info!("Created document {} ({})", title, document_id);
        Ok(DocumentRecord {
            source_uri: Self::document_url(&document_id),
            id: document_id,
            title: title.to_string(),
            content: body.to_string(),
            updated_at: Utc::now(),
        })
    }

    async fn list_files(&self, limit: usize, mime_type: Option<&str>) -> Result<Vec<FileSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let files = self.list_entries(mime_type, Some(limit)).await?;
        Ok(files
            .into_iter()
            .map(|f| FileSummary {
                id: f.id,
                name: f.name,
                mime_type: f.mime_type,
                modified_at: f.modified_time,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_extract_text_joins_text_runs() {
        let doc = json!({
            "body": {
                "content": [
                    { "sectionBreak": {} },
                    { "paragraph": { "elements": [
                        { "textRun": { "content": "Apples are " } },
                        { "textRun": { "content": "red.\n" } }
                    ]}},
                    { "table": {} },
                    { "paragraph": { "elements": [
                        { "inlineObjectElement": {} },
                        { "textRun": { "content": "Pears too.\n" } }
                    ]}}
                ]
            }
        });

        assert_eq!(extract_text(&doc), "Apples are red.\nPears too.\n");
    }

    #[test]
    fn test_extract_text_empty_document() {
        assert_eq!(extract_text(&json!({})), "");
        assert_eq!(extract_text(&json!({ "body": {} })), "");
    }

    #[test]
    fn test_drive_listing_parsing() {
        let raw = r#"{"files":[
            {"id":"1","name":"Doc A","mimeType":"application/vnd.google-apps.document","modifiedTime":"2024-05-01T10:00:00.000Z"},
            {"id":"2","name":"photo.png","mimeType":"image/png"}
        ]}"#;
        let listing: DriveFileList = serde_json::from_str(raw).unwrap();

        assert_eq!(listing.files.len(), 2);
        assert_eq!(listing.files[0].name, "Doc A");
        assert!(listing.files[0].modified_time.is_some());
        assert!(listing.files[1].modified_time.is_none());
    }

    #[test]
    fn test_document_url() {
        assert_eq!(
            DriveDocumentStore::document_url("abc"),
            "https://docs.google.com/document/d/abc/edit"
        );
    }

    #[test]
    fn test_listing_page_token_parsing() {
        let listing: DriveFileList =
            serde_json::from_str(r#"{"nextPageToken":"p2","files":[]}"#).unwrap();
        assert_eq!(listing.next_page_token.as_deref(), Some("p2"));

        let last: DriveFileList = serde_json::from_str(r#"{"files":[]}"#).unwrap();
        assert!(last.next_page_token.is_none());
    }

    /// Minimal HTTP/1.1 server answering every request through `respond`
    /// and recording the request targets it saw
    async fn fake_google(respond: fn(&str) -> String) -> (DriveDocumentStore, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let targets = Arc::new(Mutex::new(Vec::new()));
        let seen = targets.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let target = request.split_whitespace().nth(1).unwrap_or_default().to_string();
                seen.lock().unwrap().push(target.clone());

                let body = respond(&target);
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let config = DriveConfig {
            drive_url: format!("{}/drive/v3", base),
            docs_url: format!("{}/docs/v1", base),
            access_token: None,
            page_size: 1,
        };
        (DriveDocumentStore::new(&config, "token"), targets)
    }

    fn docs_body(text: &str) -> String {
        json!({ "body": { "content": [
            { "paragraph": { "elements": [ { "textRun": { "content": text } } ] } }
        ]}})
        .to_string()
    }

    /// Two listing pages of one Google Doc each, linked by `nextPageToken`
    fn two_pages(target: &str) -> String {
        if target.starts_with("/docs/v1/documents/a") {
            docs_body("Apples are red.")
        } else if target.starts_with("/docs/v1/documents/b") {
            docs_body("Cars have wheels.")
        } else if target.starts_with("/drive/v3/files/a") {
            json!({"id": "a", "name": "Doc A", "mimeType": GOOGLE_DOC_MIME,
                   "modifiedTime": "2024-05-01T10:00:00Z"})
            .to_string()
        } else if target.contains("pageToken=p2") {
            json!({"files": [{"id": "b", "name": "Doc B", "mimeType": GOOGLE_DOC_MIME}]}).to_string()
        } else {
            json!({"nextPageToken": "p2",
                   "files": [{"id": "a", "name": "Doc A", "mimeType": GOOGLE_DOC_MIME}]})
            .to_string()
        }
    }

    #[tokio::test]
    async fn test_list_all_follows_next_page_token() {
        let (store, targets) = fake_google(two_pages).await;

        let records = store.list_all().await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(records[1].content, "Cars have wheels.");
        assert_eq!(records[1].source_uri, DriveDocumentStore::document_url("b"));

        let targets = targets.lock().unwrap();
        let listings: Vec<&String> = targets.iter().filter(|t| t.starts_with("/drive/v3/files?")).collect();
        assert_eq!(listings.len(), 2);
        assert!(listings.iter().all(|t| t.contains("pageSize=1")));
        assert!(!listings[0].contains("pageToken"));
        assert!(listings[1].contains("pageToken=p2"));
    }

    #[tokio::test]
    async fn test_list_files_pages_until_limit() {
        let (store, targets) = fake_google(two_pages).await;

        let one = store.list_files(1, None).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(targets.lock().unwrap().len(), 1);

        let both = store.list_files(5, None).await.unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[1].name, "Doc B");
        let targets = targets.lock().unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets[1..].iter().all(|t| t.contains("pageSize=1")));
        assert!(targets[2].contains("pageToken=p2"));
    }

    #[tokio::test]
    async fn test_list_files_sends_mime_filter() {
        let (store, targets) = fake_google(two_pages).await;

        store.list_files(1, Some("application/pdf")).await.unwrap();
        store.list_files(1, None).await.unwrap();

        let targets = targets.lock().unwrap();
        assert!(targets[0].contains("q=mimeType"));
        assert!(targets[0].contains("application%2Fpdf"));
        assert!(!targets[1].contains("q="));
    }

    #[tokio::test]
    async fn test_listing_stops_on_repeated_page_token() {
        fn stuck(_target: &str) -> String {
            json!({"nextPageToken": "same", "files": [{"id": "x", "name": "X"}]}).to_string()
        }
        let (store, targets) = fake_google(stuck).await;

        let files = store.list_entries(None, None).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(targets.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_read_fetches_metadata_and_text() {
        let (store, _) = fake_google(two_pages).await;

        let record = store.read("a").await.unwrap();

        assert_eq!(record.id, "a");
        assert_eq!(record.title, "Doc A");
        assert_eq!(record.content, "Apples are red.");
        assert_eq!(record.updated_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_store_trims_urls() {
        let config = DriveConfig {
            drive_url: "http://localhost:9000/drive/v3/".to_string(),
            docs_url: "http://localhost:9000/docs/v1/".to_string(),
            access_token: None,
            page_size: 0,
        };
        let store = DriveDocumentStore::new(&config, "token");
        assert_eq!(store.drive_url, "http://localhost:9000/drive/v3");
        assert_eq!(store.docs_url, "http://localhost:9000/docs/v1");
        assert_eq!(store.page_size, 1);
    }
}
