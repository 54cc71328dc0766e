//! Upload stage: reads the multipart body into a [`MultipartForm`].
//!
//! Only file parts submitted under the route's field name are kept. Each one
//! is buffered up to `max_size` bytes; anything beyond that is read and
//! counted but discarded, so an oversized file costs no more memory than an
//! accepted one. A part past `max_files` ends collection with `TooManyFiles`
//! before its content is read. The body is consumed here and the handler
//! receives the request with an empty body.

use axum::{
    body::Body,
    extract::{
        FromRequest, Multipart, Request,
        multipart::{Field, MultipartError},
    },
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
};
use bytes::{Bytes, BytesMut};
use tracing::debug;

use usergate_core::{IncomingFile, MultipartForm, UploadConstraintSet, UploadFailure};

/// Allowance for multipart framing and non-file fields on top of the files.
const FORM_OVERHEAD: usize = 1 << 20;

/// Body limit for a route accepting `constraints`.
pub fn body_limit(constraints: &UploadConstraintSet) -> usize {
    let max_size = usize::try_from(constraints.max_size).unwrap_or(usize::MAX);
    max_size
        .saturating_add(1)
        .saturating_mul(constraints.max_files)
        .saturating_add(FORM_OVERHEAD)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            v.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

/// Split the file parts for `constraints.field_name` out of `req`.
///
/// A request that is not `multipart/form-data` yields an empty form.
pub async fn collect_multipart(
    req: Request,
    constraints: &UploadConstraintSet,
) -> Result<(Request, MultipartForm), UploadFailure> {
    if !is_multipart(req.headers()) {
        return Ok((req, MultipartForm::new()));
    }

    let (parts, body) = req.into_parts();

    // The extractor needs the headers (boundary) and extensions (body limit).
    let mut body_req = Request::new(body);
    *body_req.method_mut() = parts.method.clone();
    *body_req.uri_mut() = parts.uri.clone();
    *body_req.headers_mut() = parts.headers.clone();
    *body_req.extensions_mut() = parts.extensions.clone();

    let mut multipart = Multipart::from_request(body_req, &())
        .await
        .map_err(|e| UploadFailure::InvalidForm(e.body_text()))?;

    let mut form = MultipartForm::new();
    let mut matched = 0usize;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| body_failure(e, constraints, matched))?
    {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if field.name() != Some(constraints.field_name.as_str()) {
            continue;
        }

        matched += 1;
        if matched > constraints.max_files {
            // At least one file is present, so the count check is next.
            return Err(UploadFailure::TooManyFiles {
                max: constraints.max_files,
                received: matched,
            });
        }

        let declared_content_type = field.content_type().map(str::to_owned);
        let (content, size) = read_capped(&mut field, constraints.max_size, &file_name).await?;
        debug!(file = %file_name, size, "Received file part");

        let mut file = IncomingFile::new(constraints.field_name.clone(), file_name, content);
        file.declared_content_type = declared_content_type;
        file.size = size;
        form.push(file);
    }

    Ok((Request::from_parts(parts, Body::empty()), form))
}

async fn read_capped(
    field: &mut Field<'_>,
    max_size: u64,
    file_name: &str,
) -> Result<(Bytes, u64), UploadFailure> {
    let mut buffer = BytesMut::new();
    let mut size = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadFailure::FileTooLarge {
                file: file_name.to_string(),
                max: max_size,
            }
        } else {
            invalid_form(e)
        }
    })? {
        size += chunk.len() as u64;
        if size <= max_size {
            buffer.extend_from_slice(&chunk);
        }
    }

    if size > max_size {
        return Ok((Bytes::new(), size));
    }
    Ok((buffer.freeze(), size))
}

fn invalid_form(err: MultipartError) -> UploadFailure {
    UploadFailure::InvalidForm(err.body_text())
}

/// Map an error between parts. Hitting the body limit there means the
/// request carried more than `max_files` files' worth of data.
fn body_failure(err: MultipartError, constraints: &UploadConstraintSet, matched: usize) -> UploadFailure {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadFailure::TooManyFiles {
            max: constraints.max_files,
            received: matched.max(constraints.max_files) + 1,
        }
    } else {
        invalid_form(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const BOUNDARY: &str = "gate-test-boundary";

    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        axum::http::Request::builder()
            .method("POST")
            .uri("/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn constraints() -> UploadConstraintSet {
        UploadConstraintSet::multiple_image_upload(Path::new("/unused"), 2).with_max_size(8)
    }

    #[tokio::test]
    async fn test_collects_only_matching_file_parts() {
        let req = multipart_request(&[
            ("images", Some("a.png"), b"1234".as_slice()),
            ("other", Some("b.png"), b"5678".as_slice()),
            ("images", None, b"plain text field".as_slice()),
            ("images", Some("c.png"), b"abcdefgh".as_slice()),
        ]);

        let (req, form) = collect_multipart(req, &constraints()).await.unwrap();
        assert_eq!(form.len(), 2);

        let files: Vec<_> = form.files("images").collect();
        assert_eq!(files[0].file_name, "a.png");
        assert_eq!(files[0].content.as_ref(), b"1234");
        assert_eq!(files[1].size, 8);
        assert_eq!(
            files[0].declared_content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert!(req.headers().contains_key(CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_oversized_part_keeps_size_only() {
        let req = multipart_request(&[("images", Some("big.png"), b"0123456789".as_slice())]);
        let (_, form) = collect_multipart(req, &constraints()).await.unwrap();

        let file = form.files("images").next().unwrap();
        assert_eq!(file.size, 10);
        assert!(file.content.is_empty());
    }

    #[tokio::test]
    async fn test_extra_part_is_too_many_files() {
        let req = multipart_request(&[
            ("images", Some("a.png"), b"1".as_slice()),
            ("images", Some("b.png"), b"2".as_slice()),
            ("images", Some("c.png"), b"3".as_slice()),
        ]);
        let err = collect_multipart(req, &constraints()).await.unwrap_err();
        assert!(matches!(err, UploadFailure::TooManyFiles { max: 2, received: 3 }));
    }

    #[tokio::test]
    async fn test_non_multipart_is_empty_form() {
        let req = axum::http::Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (_, form) = collect_multipart(req, &constraints()).await.unwrap();
        assert!(form.is_empty());
    }

    #[tokio::test]
    async fn test_missing_boundary_is_invalid_form() {
        let req = axum::http::Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("garbage"))
            .unwrap();
        let err = collect_multipart(req, &constraints()).await.unwrap_err();
        assert_eq!(err.tag(), "InvalidFormData");
    }

    #[test]
    fn test_body_limit_allows_one_byte_over() {
        let limit = body_limit(&constraints());
        assert_eq!(limit, 9 * 2 + FORM_OVERHEAD);
    }
}
