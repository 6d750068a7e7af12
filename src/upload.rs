//! Client for the hosted media service that stores uploaded video files.
//!
//! Uploads are signed Cloudinary calls made with a blocking `ureq` agent; the
//! caller waits for the asset to be stored and gets back its durable URL.
//! The file goes out as a `multipart/form-data` part read straight from the
//! received buffer, so an upload holds one copy of the video in memory.

use std::io::{Cursor, Read};

use anyhow::{Context, Result, anyhow};
use axum::body::Bytes;
use chrono::Utc;
use mime_guess::MimeGuess;
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use sha1::{Digest, Sha1};

pub const DEFAULT_CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Raw video bytes received from a client.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl MediaFile {
    /// Declared content type, falling back to a guess from the file name.
    pub fn mime_type(&self) -> String {
        if let Some(content_type) = self.content_type.as_deref().filter(|value| !value.is_empty()) {
            return content_type.to_owned();
        }
        self.file_name
            .as_deref()
            .map(|name| MimeGuess::from_path(name).first_or_octet_stream())
            .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM)
            .to_string()
    }
}

/// Where the media service put an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub url: String,
    pub public_id: Option<String>,
}

pub trait MediaUploader: Send + Sync {
    fn upload(&self, media: &MediaFile) -> Result<UploadedMedia>;
}

#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

pub struct CloudinaryUploader {
    credentials: CloudinaryCredentials,
    api_base: String,
    folder: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct CloudinaryResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: Option<String>,
}

#[derive(Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

impl CloudinaryUploader {
    pub fn new(credentials: CloudinaryCredentials) -> Self {
        Self {
            credentials,
            api_base: DEFAULT_CLOUDINARY_API_BASE.to_owned(),
            folder: None,
            agent: ureq::Agent::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_folder(mut self, folder: Option<String>) -> Self {
        self.folder = folder.filter(|value| !value.is_empty());
        self
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/video/upload",
            self.api_base, self.credentials.cloud_name
        )
    }

    /// Parameters covered by the request signature, sorted by name.
    fn signed_params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(folder) = &self.folder {
            params.push(("folder", folder.clone()));
        }
        params.push(("timestamp", timestamp.to_string()));
        params
    }
}

impl MediaUploader for CloudinaryUploader {
    fn upload(&self, media: &MediaFile) -> Result<UploadedMedia> {
        let timestamp = Utc::now().timestamp();
        let params = self.signed_params(timestamp);
        let signature = sign_params(&params, &self.credentials.api_secret);

        let mut fields: Vec<(&str, &str)> = vec![
            ("api_key", self.credentials.api_key.as_str()),
            ("signature", signature.as_str()),
        ];
        fields.extend(params.iter().map(|(key, value)| (*key, value.as_str())));

        let boundary = format!("videometa-{:016x}{:016x}", OsRng.next_u64(), OsRng.next_u64());
        let body = MultipartBody::new(&boundary, &fields, media);

        let url = self.upload_url();
        tracing::debug!(%url, bytes = media.bytes.len(), "uploading video to media service");
        let request = self
            .agent
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .set("Content-Length", &body.len().to_string());
        let response = match request.send(body.into_reader()) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response
                    .into_json::<CloudinaryErrorBody>()
                    .map(|body| body.error.message)
                    .unwrap_or_else(|_| "no error message".to_owned());
                return Err(anyhow!("media service rejected upload ({code}): {detail}"));
            }
            Err(err) => return Err(err).context("sending upload to media service"),
        };

        let body: CloudinaryResponse = response
            .into_json()
            .context("parsing media service response")?;
        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| anyhow!("media service response did not include a URL"))?;

        Ok(UploadedMedia {
            url,
            public_id: body.public_id,
        })
    }
}

/// A `multipart/form-data` request body: text fields, then the file part.
/// Only the framing around the file is allocated.
struct MultipartBody {
    head: Vec<u8>,
    file: Bytes,
    tail: Vec<u8>,
}

impl MultipartBody {
    fn new(boundary: &str, fields: &[(&str, &str)], media: &MediaFile) -> Self {
        let mut head = String::new();
        for (name, value) in fields {
            head.push_str(&format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        let file_name: String = media
            .file_name
            .as_deref()
            .unwrap_or("upload")
            .chars()
            .filter(|c| !matches!(c, '"' | '\r' | '\n'))
            .collect();
        head.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {}\r\n\r\n",
            media.mime_type()
        ));

        Self {
            head: head.into_bytes(),
            file: media.bytes.clone(),
            tail: format!("\r\n--{boundary}--\r\n").into_bytes(),
        }
    }

    fn len(&self) -> usize {
        self.head.len() + self.file.len() + self.tail.len()
    }

    fn into_reader(self) -> impl Read + Send {
        Cursor::new(self.head)
            .chain(Cursor::new(self.file))
            .chain(Cursor::new(self.tail))
    }
}

/// Cloudinary request signature: SHA-1 over `k=v&k=v` followed by the secret.
fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> CloudinaryUploader {
        CloudinaryUploader::new(CloudinaryCredentials {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
        })
    }

    #[test]
    fn signature_matches_reference_digest() {
        let params = uploader().signed_params(1700000000);
        assert_eq!(
            sign_params(&params, "secret"),
            "84af3c6077e429a8e7ff26d2ca13d5feb6bc7cb0"
        );
    }

    #[test]
    fn folder_is_signed_before_timestamp() {
        let uploader = uploader().with_folder(Some("uploads".into()));
        let params = uploader.signed_params(1700000000);
        assert_eq!(params[0].0, "folder");
        assert_eq!(
            sign_params(&params, "secret"),
            "a79c80ceb5a3fcc9524e76d2500d4f9d6e74e97b"
        );
    }

    #[test]
    fn empty_folder_is_ignored() {
        let uploader = uploader().with_folder(Some(String::new()));
        assert_eq!(uploader.signed_params(1).len(), 1);
    }

    #[test]
    fn upload_url_uses_cloud_name() {
        let uploader = uploader().with_api_base("http://127.0.0.1:9/v1_1/");
        assert_eq!(uploader.upload_url(), "http://127.0.0.1:9/v1_1/demo/video/upload");
    }

    #[test]
    fn mime_type_prefers_declared_content_type() {
        let media = MediaFile {
            file_name: Some("clip.webm".into()),
            content_type: Some("video/mp4".into()),
            bytes: Bytes::new(),
        };
        assert_eq!(media.mime_type(), "video/mp4");

        let guessed = MediaFile {
            content_type: None,
            ..media.clone()
        };
        assert_eq!(guessed.mime_type(), "video/webm");

        let unknown = MediaFile {
            file_name: None,
            content_type: None,
            bytes: Bytes::new(),
        };
        assert_eq!(unknown.mime_type(), "application/octet-stream");
    }

    #[test]
    fn unreachable_service_is_an_error() {
        let uploader = uploader().with_api_base("http://127.0.0.1:9/v1_1");
        let media = MediaFile {
            file_name: Some("clip.mp4".into()),
            content_type: None,
            bytes: Bytes::from_static(b"not really a video"),
        };
        assert!(uploader.upload(&media).is_err());
    }

    #[test]
    fn multipart_body_frames_fields_and_file() {
        let media = MediaFile {
            file_name: Some("my \"clip\".mp4".into()),
            content_type: None,
            bytes: Bytes::from_static(b"\x00\x01binary+/video"),
        };
        let fields = [("api_key", "key"), ("timestamp", "42")];
        let body = MultipartBody::new("b0undary", &fields, &media);
        let expected_len = body.len();

        let mut sent = Vec::new();
        body.into_reader().read_to_end(&mut sent).unwrap();
        assert_eq!(sent.len(), expected_len);

        let expected_head = "--b0undary\r\nContent-Disposition: form-data; name=\"api_key\"\r\n\r\nkey\r\n\
             --b0undary\r\nContent-Disposition: form-data; name=\"timestamp\"\r\n\r\n42\r\n\
             --b0undary\r\nContent-Disposition: form-data; name=\"file\"; filename=\"my clip.mp4\"\r\n\
             Content-Type: video/mp4\r\n\r\n";
        let mut expected = expected_head.as_bytes().to_vec();
        expected.extend_from_slice(b"\x00\x01binary+/video");
        expected.extend_from_slice(b"\r\n--b0undary--\r\n");
        assert_eq!(sent, expected);
    }
}
