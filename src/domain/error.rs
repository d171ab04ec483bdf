use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("document `{id}` is not a valid {shape}: {message}")]
    Malformed {
        id: String,
        shape: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn malformed(id: impl Into<String>, shape: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            id: id.into(),
            shape,
            message: message.into(),
        }
    }
}
