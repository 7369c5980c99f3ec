use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        auth::AuthError, comments::CommentError, follows::FollowError, groups::GroupError,
        listing::ListingError, posts::PostError, repos::RepoError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Map a repository failure onto a status and a public message.
pub fn repo_error_to_http(source: &'static str, err: &RepoError) -> HttpError {
    let (status, public_message) = match err {
        RepoError::NotFound => (StatusCode::NOT_FOUND, "Resource not found"),
        RepoError::Duplicate { .. } => (StatusCode::CONFLICT, "Duplicate record"),
        RepoError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "Invalid input"),
        RepoError::Integrity { .. } => (StatusCode::CONFLICT, "Integrity constraint violated"),
        RepoError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, "Database timeout"),
        RepoError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };
    HttpError::from_error(source, status, public_message, err)
}

impl From<ListingError> for HttpError {
    fn from(error: ListingError) -> Self {
        const SOURCE: &str = "application::listing";
        match &error {
            ListingError::Repo(err) => repo_error_to_http(SOURCE, err),
            other => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                other,
            ),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::posts";
        match &error {
            PostError::Repo(err) => repo_error_to_http(SOURCE, err),
            PostError::UnknownPost => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
            PostError::NotAuthor { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Only the author may edit this post",
                &error,
            ),
            PostError::Storage(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store uploaded image",
                &error,
            ),
        }
    }
}

impl From<CommentError> for HttpError {
    fn from(error: CommentError) -> Self {
        const SOURCE: &str = "application::comments";
        match &error {
            CommentError::Repo(err) => repo_error_to_http(SOURCE, err),
            CommentError::UnknownPost => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "application::follows";
        match &error {
            FollowError::Repo(err) => repo_error_to_http(SOURCE, err),
            other => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                other,
            ),
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(error: AuthError) -> Self {
        const SOURCE: &str = "application::auth";
        match &error {
            AuthError::Repo(err) => repo_error_to_http(SOURCE, err),
            AuthError::Hashing(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
            AuthError::InvalidCredentials => HttpError::from_error(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                "Invalid username or password",
                &error,
            ),
            AuthError::Invalid(_) | AuthError::DuplicateUsername(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Post(#[from] PostError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. })
            | AppError::Post(PostError::UnknownPost)
            | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Auth(AuthError::Invalid(_) | AuthError::DuplicateUsername(_))
            | AppError::Group(
                GroupError::EmptyTitle
                | GroupError::TitleTooLong
                | GroupError::Slug(_)
                | GroupError::DuplicateSlug(_),
            )
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Infra(InfraError::Connect(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "Resource not found",
            StatusCode::BAD_REQUEST => "Request could not be processed",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            _ => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
