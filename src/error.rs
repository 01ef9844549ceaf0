use jni::JNIEnv;
use thiserror::Error;

/// Navigation core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("Tracker not initialized")]
    NotInitialized,

    #[error("Invalid filter config: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("JNI error: {0}")]
    JniError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for NavError {
    fn from(err: serde_json::Error) -> Self {
        NavError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for NavError {
    fn from(err: std::io::Error) -> Self {
        NavError::StorageError(err.to_string())
    }
}

impl From<jni::errors::Error> for NavError {
    fn from(err: jni::errors::Error) -> Self {
        NavError::JniError(err.to_string())
    }
}

/// Result type for navigation core operations
pub type JResult<T> = Result<T, NavError>;

/// Java exception class a given error is raised as
pub fn exception_class(error: &NavError) -> &'static str {
    match error {
        NavError::NotInitialized => "java/lang/IllegalStateException",
        NavError::InvalidConfig(_) | NavError::InvalidParameters(_) => {
            "java/lang/IllegalArgumentException"
        }
        NavError::StorageError(_) | NavError::Serialization(_) => "java/io/IOException",
        NavError::JniError(_) | NavError::Internal(_) => "java/lang/RuntimeException",
    }
}

/// Throw Java exception from Rust error
pub fn throw_java_exception(env: &mut JNIEnv, error: &NavError) -> JResult<()> {
    let message = error.to_string();
    env.throw_new(exception_class(error), message)
        .map_err(|_| NavError::JniError("Failed to throw exception".to_string()))?;

    Ok(())
}
