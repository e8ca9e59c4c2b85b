//! Error taxonomy for the authorization core (§7).
//!
//! Four kinds, matching a `failure`-derive shape in spirit: `NotFound` is recovered
//! locally by whichever caller can treat "nothing here" as a valid outcome, and never
//! escapes a call otherwise; `Conflict` is retried once by the mutation engine;
//! `Canceled` propagates without logging; everything else becomes `Internal`, logged
//! with a redacted message.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use failure::Fail;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "not found")]
    NotFound,
    #[fail(display = "conflict: {}", _0)]
    Conflict(String),
    #[fail(display = "canceled")]
    Canceled,
    #[fail(display = "internal error")]
    Internal(#[cause] failure::Error),
}

impl Error {
    pub fn internal<E: Into<failure::Error>>(e: E) -> Self {
        Error::Internal(e.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<DieselError> for Error {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Error::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Error::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(_, info) => Error::internal(failure::err_msg(info.message().to_string())),
            other => Error::internal(failure::Error::from(other)),
        }
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Error::internal(failure::Error::from(err))
    }
}
