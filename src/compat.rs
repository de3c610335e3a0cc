use std::error::Error;

use crate::model::{self, network::ErrorBody};
use crate::service::ServiceError;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(model::ApiError))]
pub struct MyJson<T>(pub T);

impl<T: Serialize> IntoResponse for MyJson<T> {
    fn into_response(self) -> axum::response::Response {
        let Self(value) = self;
        axum::Json(value).into_response()
    }
}

impl From<JsonRejection> for model::ApiError {
    fn from(value: JsonRejection) -> Self {
        match value {
            JsonRejection::MissingJsonContentType(_) => {
                model::ApiError::NotJson(with_sources(&value))
            }
            _ => model::ApiError::InvalidJson(with_sources(&value)),
        }
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(model::ApiError))]
pub struct MyQuery<T>(pub T);

impl From<QueryRejection> for model::ApiError {
    fn from(value: QueryRejection) -> Self {
        model::ApiError::InvalidQuery(with_sources(&value))
    }
}

fn with_sources(err: &dyn Error) -> String {
    let mut s = format!("{}", err);

    let mut source_ = err.source();
    while let Some(source) = source_ {
        s.push_str(&format!(": {}", source));
        source_ = source.source();
    }

    s
}

impl model::ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            model::ApiError::Service(ServiceError::ValidationFailed(_))
            | model::ApiError::Service(ServiceError::DuplicateSlug(_)) => StatusCode::BAD_REQUEST,

            model::ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,

            model::ApiError::Service(ServiceError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,

            model::ApiError::InvalidJson(_) => StatusCode::UNPROCESSABLE_ENTITY,

            model::ApiError::NotJson(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            model::ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for model::ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!(%status, "request rejected: {}", self);
        }

        (
            status,
            axum::Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
