//! Request extractors whose rejections use [`ApiError`].

use axum::extract::{FromRequest, FromRequestParts};

use crate::api::error::ApiError;

/// `Json` body whose parse failures become a JSON 400 response.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` string whose parse failures become a JSON 400 response.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
