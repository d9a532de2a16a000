pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Network or transport failure while resolving a cache miss.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The persistent blob store could not be opened or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Decode or parse failure for a single asset payload.
    #[error("asset load error: {0}")]
    AssetLoad(String),

    /// A scene switch was requested for an id no scene descriptor carries.
    #[error("scene not found: {0}")]
    SceneNotFound(String),

    /// Descriptor kind the pipeline does not recognize. Non-fatal: the
    /// pipeline converts this to an absent asset at its boundary.
    #[error("unknown asset type: {0}")]
    UnknownAssetType(String),

    /// Experience configuration could not be read or is structurally invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
