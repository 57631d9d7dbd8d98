use imgvault_files::FilesError;
use imgvault_types::TextError;
use imgvault_uuid::UuidError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("parent folder does not exist")]
    InvalidParent,
    #[error("folder does not exist")]
    InvalidFolder,
    #[error("not found")]
    NotFound,
    #[error("folder is not empty")]
    NotEmpty,
    #[error("failed to upload blob: {0}")]
    UploadFailed(#[source] FilesError),
    #[error("failed to delete blob: {0}")]
    DeleteFailed(#[source] FilesError),
    #[error("corrupt folder hierarchy: {0}")]
    CorruptHierarchy(String),

    #[error("blob store error: {0}")]
    Blob(#[from] FilesError),
    #[error("invalid identifier: {0}")]
    Uuid(#[from] UuidError),
    #[error("invalid text: {0}")]
    Text(#[from] TextError),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record: {0}")]
    FileRead(std::io::Error),
    #[error("failed to delete record: {0}")]
    FileDelete(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("corrupt record at {path}: {reason}", path = path.display())]
    CorruptRecord {
        path: std::path::PathBuf,
        reason: String,
    },
    #[error("failed to serialize token claims: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
    #[error("failed to parse ECDSA private key: {0}")]
    EcdsaPrivateKeyParse(Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to encode ECDSA private key: {0}")]
    EcdsaPrivateKeyEncode(String),
}

impl VaultError {
    /// True for errors caused by the caller's input rather than by storage or a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidCredentials
                | Self::InvalidToken
                | Self::UsernameTaken
                | Self::InvalidParent
                | Self::InvalidFolder
                | Self::NotFound
                | Self::NotEmpty
                | Self::Uuid(_)
                | Self::Text(_)
        )
    }
}

pub type VaultResult<T> = std::result::Result<T, VaultError>;
