use axum::extract::FromRequest;

use crate::database::Document;
use crate::error::ApiError;

/// JSON body extractor whose rejections go through [`ApiError`] (malformed body → 400).
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Request body as a document; `{}` when a client sends an empty object.
pub type DocumentBody = JsonBody<Document>;
