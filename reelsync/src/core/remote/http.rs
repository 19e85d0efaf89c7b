//! HTTP Remote Catalog
//!
//! Blocking `reqwest` client for the remote video service.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::Deserialize;

use super::{
    ChatMessage, RemoteCatalog, RemoteError, RemoteResult, RemoteVideo, UploadReceipt,
    UploadRequest, UNNAMED_VIDEO,
};
use crate::core::settings::RemoteSettings;
use crate::core::UNKNOWN_STATUS;

const API_KEY_HEADER: &str = "X-Api-Key";

// =============================================================================
// Wire Types
// =============================================================================

/// The list endpoint answers either `{"results": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoListResponse {
    Wrapped { results: Vec<RawVideo> },
    Bare(Vec<RawVideo>),
}

#[derive(Debug, Default, Deserialize)]
struct RawVideo {
    video_id: Option<String>,
    url: Option<String>,
    indexing_status: Option<String>,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    video_name: Option<String>,
    title: Option<String>,
}

impl RawVideo {
    fn into_video(self) -> Option<RemoteVideo> {
        let video_id = self.video_id.filter(|id| !id.is_empty())?;
        let name = self
            .metadata
            .video_name
            .filter(|n| !n.is_empty())
            .or(self.metadata.title.filter(|t| !t.is_empty()))
            .unwrap_or_else(|| UNNAMED_VIDEO.to_string());

        Some(RemoteVideo {
            video_id,
            name,
            url: self.url,
            indexing_status: self
                .indexing_status
                .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        })
    }
}

/// Parse a list-endpoint body, dropping entries without a video id
pub(crate) fn parse_video_list(body: &str) -> RemoteResult<Vec<RemoteVideo>> {
    let response: VideoListResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;

    let raw = match response {
        VideoListResponse::Wrapped { results } => results,
        VideoListResponse::Bare(videos) => videos,
    };

    Ok(raw.into_iter().filter_map(RawVideo::into_video).collect())
}

fn parse_receipt(body: &str) -> RemoteResult<UploadReceipt> {
    let raw: serde_json::Value =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;

    let field = |name: &str| raw.get(name).and_then(|v| v.as_str()).map(str::to_string);

    Ok(UploadReceipt {
        video_id: field("video_id"),
        url: field("url"),
        raw,
    })
}

// =============================================================================
// Client
// =============================================================================

/// [`RemoteCatalog`] over the service's REST API
pub struct HttpRemoteCatalog {
    client: Client,
    /// Media client; its timeout bounds each connect and body read, not the transfer
    download_client: Client,
    api_key: Option<String>,
    base_url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
    chat_timeout: Duration,
}

impl HttpRemoteCatalog {
    pub fn new(settings: &RemoteSettings) -> RemoteResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RemoteError::Request(format!("Failed to build HTTP client: {}", e)))?;

        let download_timeout = Duration::from_secs(settings.download_timeout_secs);
        let download_client = Client::builder()
            .connect_timeout(download_timeout)
            .timeout(download_timeout)
            .build()
            .map_err(|e| RemoteError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            download_client,
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            upload_timeout: Duration::from_secs(settings.upload_timeout_secs),
            chat_timeout: Duration::from_secs(settings.chat_timeout_secs),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn api_key(&self) -> RemoteResult<&str> {
        self.api_key.as_deref().ok_or(RemoteError::NotConfigured)
    }

    fn send(&self, request: RequestBuilder, timeout: Duration) -> RemoteResult<Response> {
        let response = request
            .header(API_KEY_HEADER, self.api_key()?)
            .timeout(timeout)
            .send()
            .map_err(|e| RemoteError::Request(e.to_string()))?;
        check_status(response)
    }

    fn upload(&self, form: multipart::Form) -> RemoteResult<UploadReceipt> {
        let response = self.send(
            self.client
                .post(self.endpoint("/v1/videos/upload"))
                .multipart(form),
            self.upload_timeout,
        )?;
        parse_receipt(&read_body(response)?)
    }
}

fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(RemoteError::Status {
        code: status.as_u16(),
        body,
    })
}

fn read_body(response: Response) -> RemoteResult<String> {
    response
        .text()
        .map_err(|e| RemoteError::Decode(format!("Failed to read response: {}", e)))
}

fn upload_form(request: &UploadRequest) -> multipart::Form {
    multipart::Form::new()
        .text("index", request.index.to_string())
        .text("enable_thumbnails", request.enable_thumbnails.to_string())
        .text("video_name", request.video_name.clone())
        .text("group_id", request.group_id.clone())
}

impl RemoteCatalog for HttpRemoteCatalog {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn list_videos(&self) -> RemoteResult<Vec<RemoteVideo>> {
        let response = self.send(
            self.client.get(self.endpoint("/v1/videos")),
            self.request_timeout,
        )?;
        parse_video_list(&read_body(response)?)
    }

    fn upload_file(&self, path: &Path, request: &UploadRequest) -> RemoteResult<UploadReceipt> {
        self.api_key()?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        let part = multipart::Part::file(path)
            .map_err(|e| RemoteError::Request(format!("Failed to open {}: {}", path.display(), e)))?
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        tracing::info!(path = %path.display(), name = %request.video_name, "Uploading video");
        self.upload(upload_form(request).part("file", part))
    }

    fn upload_from_url(&self, url: &str, request: &UploadRequest) -> RemoteResult<UploadReceipt> {
        tracing::info!(url = %url, name = %request.video_name, "Submitting video URL");
        self.upload(upload_form(request).text("video_url", url.to_string()))
    }

    fn delete_video(&self, video_id: &str) -> RemoteResult<()> {
        let result = self.send(
            self.client
                .delete(self.endpoint(&format!("/v1/videos/{}", video_id))),
            self.request_timeout,
        );

        match result {
            Ok(_) => Ok(()),
            Err(RemoteError::Status { code: 404, .. }) => {
                Err(RemoteError::NotFound(video_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn ask_question(
        &self,
        video_id: &str,
        messages: &[ChatMessage],
    ) -> RemoteResult<serde_json::Value> {
        let payload = serde_json::json!({
            "video_id": video_id,
            "messages": messages,
        });

        let response = self.send(
            self.client.post(self.endpoint("/v1/qa/chat")).json(&payload),
            self.chat_timeout,
        )?;

        response
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn open_download(&self, url: &str) -> RemoteResult<Box<dyn Read>> {
        // Media URLs point at a CDN and carry their own authorization
        let response = self
            .download_client
            .get(url)
            .send()
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        Ok(Box::new(check_status(response)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_list() {
        let body = r#"{"results": [
            {"video_id": "abc-1", "url": "https://cdn/abc.mp4", "indexing_status": "indexed",
             "metadata": {"video_name": "Launch"}},
            {"video_id": "def-2", "metadata": {"title": "Fallback Title"}},
            {"video_id": "ghi-3"},
            {"url": "https://cdn/orphan.mp4"}
        ]}"#;

        let videos = parse_video_list(body).unwrap();
        assert_eq!(videos.len(), 3);

        assert_eq!(videos[0].name, "Launch");
        assert_eq!(videos[0].indexing_status, "indexed");
        assert_eq!(videos[0].url.as_deref(), Some("https://cdn/abc.mp4"));

        assert_eq!(videos[1].name, "Fallback Title");
        assert_eq!(videos[1].indexing_status, "unknown");

        assert_eq!(videos[2].name, UNNAMED_VIDEO);
    }

    #[test]
    fn test_parse_bare_list() {
        let body = r#"[{"video_id": "abc-1", "indexing_status": "processing"}]"#;
        let videos = parse_video_list(body).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].indexing_status, "processing");
    }

    #[test]
    fn test_parse_list_rejects_garbage() {
        assert!(matches!(
            parse_video_list(r#"{"error": "nope"}"#),
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_receipt() {
        let receipt = parse_receipt(r#"{"video_id": "v-9", "status": "queued"}"#).unwrap();
        assert_eq!(receipt.video_id.as_deref(), Some("v-9"));
        assert!(receipt.url.is_none());
        assert_eq!(receipt.raw["status"], "queued");
    }

    #[test]
    fn test_unconfigured_client_makes_no_request() {
        let settings = RemoteSettings {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            ..RemoteSettings::default()
        };
        let catalog = HttpRemoteCatalog::new(&settings).unwrap();

        assert!(!catalog.is_configured());
        assert!(matches!(catalog.list_videos(), Err(RemoteError::NotConfigured)));
        assert!(matches!(
            catalog.delete_video("abc"),
            Err(RemoteError::NotConfigured)
        ));
        assert!(matches!(
            catalog.upload_file(Path::new("/nonexistent.mp4"), &UploadRequest::new("x", "default")),
            Err(RemoteError::NotConfigured)
        ));
    }

    #[test]
    fn test_slow_download_outlasting_timeout_completes() {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        // A configured proxy would intercept the loopback request
        let proxied = ["http_proxy", "HTTP_PROXY", "all_proxy", "ALL_PROXY"]
            .iter()
            .any(|var| std::env::var_os(var).is_some());
        if proxied {
            return;
        }

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let chunk = [7u8; 1024];
        let chunks = 5;

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                chunk.len() * chunks
            )
            .unwrap();
            for _ in 0..chunks {
                stream.write_all(&chunk).unwrap();
                stream.flush().unwrap();
                std::thread::sleep(Duration::from_millis(300));
            }
        });

        let settings = RemoteSettings {
            download_timeout_secs: 1,
            ..RemoteSettings::default()
        };
        let catalog = HttpRemoteCatalog::new(&settings).unwrap();

        let mut body = catalog
            .open_download(&format!("http://{}/clip.mp4", addr))
            .unwrap();
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes).unwrap();

        assert_eq!(bytes.len(), chunk.len() * chunks);
        server.join().unwrap();
    }
}
