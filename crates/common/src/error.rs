use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A snowflake id that is not an unsigned 64-bit integer.
    #[error("invalid identifier: {value}")]
    InvalidId { value: String },
}

impl Error {
    #[must_use]
    pub fn invalid_id(value: impl Into<String>) -> Self {
        Self::InvalidId {
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Crate errors that can carry a failure prefixed with what was being
/// attempted, e.g. "failed to read trivia.json: No such file".
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait whose `.with_context()` turns any
/// displayable failure into the crate's `Error`.
///
/// The invoking module needs `Error: FromMessage` and a `Result<T>` alias.
///
/// ```ignore
/// gamehall_common::impl_context!();
///
/// let raw = std::fs::read_to_string(path)
///     .with_context(|| format!("failed to read {}", path.display()))?;
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn with_context<C: std::fmt::Display>(self, describe: impl FnOnce() -> C) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn with_context<C: std::fmt::Display>(self, describe: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|source| {
                    <Error as $crate::FromMessage>::from_message(format!("{}: {source}", describe()))
                })
            }
        }
    };
}
