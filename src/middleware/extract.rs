//! Body, path and query extractors that reject with [`AppError`], so malformed
//! input gets the same `{ "error", "message" }` body and a 400 like every
//! other failure.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request as HttpRequest, StatusCode}};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct NamedBody {
        #[allow(dead_code)]
        name: String,
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_request() {
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{\"nam\": 1}"))
            .unwrap();
        let err = ApiJson::<NamedBody>::from_request(req, &()).await.err().unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "bad_request");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let req = HttpRequest::builder().method("POST").uri("/").body(Body::from("{}")).unwrap();
        let err = ApiJson::<NamedBody>::from_request(req, &()).await.err().unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
