use crate::{
    config::{ClientConfig, Verify},
    RemoteError,
};
use reqwest::{multipart::Part, RequestBuilder, Response};
use std::path::Path;

pub fn new_client(config: &ClientConfig) -> Result<reqwest::Client, RemoteError> {
    let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);

    match &config.verify {
        Some(Verify::Disabled) => {
            log::warn!("certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        Some(Verify::CaFile(path)) => {
            let pem = std::fs::read(path).map_err(|err| {
                RemoteError::transport(format!(
                    "cannot read ca file '{}': {}",
                    path.display(),
                    err
                ))
            })?;
            for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        None => {}
    }

    builder.build().map_err(Into::into)
}

/// Sends the request, turning any non-success response into a [`RemoteError`]
pub async fn send(req: RequestBuilder) -> Result<Response, RemoteError> {
    let resp = req.send().await.map_err(|err| {
        log::warn!("request failed: {}", err);
        RemoteError::transport(err)
    })?;

    let status = resp.status();
    log::trace!("{} -> {}", resp.url(), status);
    if status.is_success() {
        return Ok(resp);
    }

    let err = error_response(status.as_u16(), resp.text().await);
    log::warn!("error response: {}", err);
    Err(err)
}

fn error_response<E>(status: u16, body: Result<String, E>) -> RemoteError
where
    E: std::fmt::Display,
{
    match body {
        Ok(body) => RemoteError::from_response(status, &body),
        Err(err) => RemoteError {
            status: Some(status),
            ..RemoteError::transport(format!("cannot read error response: {}", err))
        },
    }
}

pub async fn get_json<T>(req: RequestBuilder) -> Result<T, RemoteError>
where
    for<'de> T: serde::Deserialize<'de>,
{
    let resp = send(req).await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|err| RemoteError {
        message: format!("cannot decode response: {}", err),
        status: Some(status),
    })
}

/// A multipart part streaming the file at `path`
pub async fn file_part(path: &Path) -> Result<Part, RemoteError> {
    let with_path = |err: std::io::Error| {
        RemoteError::transport(format!("cannot read '{}': {}", path.display(), err))
    };

    let file = tokio::fs::File::open(path).await.map_err(with_path)?;
    let len = file.metadata().await.map_err(with_path)?.len();

    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Part::stream_with_length(file, len)
        .file_name(file_name)
        .mime_str(mime.as_ref())
        .map_err(Into::into)
}
