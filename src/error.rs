use std::backtrace::Backtrace;
use chrono::NaiveDate;
use rocket::http::Status;
use rocket::response::status::Custom;

/// Business-rule rejections. Reported once to the caller, never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("registration is closed")]
    RegistrationClosed,
    #[error("run master cannot register as a player of the same run")]
    MasterConflict,
    #[error("user is already registered")]
    DuplicateRegistration,
    #[error("confirmed convention event registration is required")]
    ConventionGateNotMet,
    #[error("user is not registered")]
    NotRegistered,
    #[error("date {date} is out of range {date_start} .. {date_end}")]
    DateOutOfRange {
        date: NaiveDate,
        date_start: NaiveDate,
        date_end: NaiveDate,
    },
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("no free slots left")]
    CapacityExceeded,
    #[error("{0}")]
    Invalid(String),
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("user identity is required")]
    Unauthorized,
    #[error("SQL error: {0}")]
    Db(sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        error!("SQL Error: {err}\nbacktrace: {}", Backtrace::capture());
        AppError::Db(err)
    }
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
    pub fn status(&self) -> Status {
        match self {
            AppError::Rule(err) => match err {
                RuleError::RegistrationClosed
                | RuleError::MasterConflict
                | RuleError::DuplicateRegistration
                | RuleError::CapacityExceeded => Status::Conflict,
                RuleError::ConventionGateNotMet => Status::Forbidden,
                RuleError::NotRegistered => Status::NotFound,
                RuleError::DateOutOfRange { .. }
                | RuleError::InvalidStatus(_)
                | RuleError::Invalid(_) => Status::UnprocessableEntity,
            },
            AppError::NotFound(_) => Status::NotFound,
            AppError::Forbidden(_) => Status::Forbidden,
            AppError::Unauthorized => Status::Unauthorized,
            AppError::Db(_) | AppError::Other(_) => Status::InternalServerError,
        }
    }
}

impl From<AppError> for Custom<String> {
    fn from(err: AppError) -> Self {
        let status = err.status();
        match &err {
            AppError::Rule(_) | AppError::Forbidden(_) => warn!("Rejected: {err}"),
            AppError::Other(_) => error!("Error: {err}\nbacktrace: {}", Backtrace::capture()),
            _ => {}
        }
        Custom(status, err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
