use std::convert::Infallible;

use serde::Serialize;
use serde_json::json;
use warp::{
    body::BodyDeserializeError,
    http::{header, HeaderValue, StatusCode},
    reject::{LengthRequired, MethodNotAllowed, PayloadTooLarge, Rejection, UnsupportedMediaType},
    reply::{self, Reply, Response},
};

use crate::error::ApiError;

pub fn json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn ok<T: Serialize>(value: &T) -> Response {
    json(value, StatusCode::OK)
}

pub fn created<T: Serialize>(value: &T) -> Response {
    json(value, StatusCode::CREATED)
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Binary download with an attachment disposition.
pub fn attachment(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    let mut response = Response::new(bytes.into());
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={filename}")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

fn error_response(error: &ApiError) -> Response {
    let status = error.status();
    if status.is_server_error() {
        log::error!("{error}");
    } else {
        log::debug!("{status}: {error}");
    }
    json(&error.body(), status)
}

fn detail(message: &str, status: StatusCode) -> Response {
    json(&json!({ "detail": message }), status)
}

/// Turns every rejection into a JSON response.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(error) = err.find::<ApiError>() {
        return Ok(error_response(error));
    }

    let response = if err.is_not_found() {
        detail("Not found.", StatusCode::NOT_FOUND)
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        log::debug!("Malformed body: {e}");
        detail(&format!("JSON parse error - {e}"), StatusCode::BAD_REQUEST)
    } else if err.find::<PayloadTooLarge>().is_some() {
        detail("Request body is too large.", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<LengthRequired>().is_some() {
        detail("Content-Length header is required.", StatusCode::LENGTH_REQUIRED)
    } else if err.find::<UnsupportedMediaType>().is_some() {
        detail(
            "Unsupported media type in request.",
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        )
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        detail("Invalid query string.", StatusCode::BAD_REQUEST)
    } else if err.find::<MethodNotAllowed>().is_some() {
        detail("Method not allowed.", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        log::error!("Unhandled rejection: {err:?}");
        detail("Internal server error.", StatusCode::INTERNAL_SERVER_ERROR)
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn api_errors_keep_their_status() {
        let response = handle_rejection(ApiError::Forbidden.into()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = handle_rejection(ApiError::validation("name", "Too long.").into())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unmatched_routes_are_not_found() {
        let response = handle_rejection(warp::reject::not_found()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn attachment_headers() {
        let response = attachment(b"%PDF".to_vec(), "application/pdf", "list.pdf");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=list.pdf"
        );
    }
}
