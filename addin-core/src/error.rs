//! Add-in host error types

use std::path::PathBuf;
use thiserror::Error;

use addin_api::{AddinId, AddinStatus, EventKind};

/// Errors that can occur in the add-in host
#[derive(Error, Debug)]
pub enum AddinError {
    /// Registry already holds the maximum number of add-ins
    #[error("Cannot import more than {max} add-ins")]
    CapacityExceeded { max: usize },

    /// The same binary was imported before
    #[error("Add-in already imported: {path}")]
    AlreadyImported { path: PathBuf },

    /// The add-in binary does not exist
    #[error("Add-in library not found: {path}")]
    BinaryNotFound { path: PathBuf },

    /// The sidecar manifest does not exist
    #[error("Add-in manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    /// The sidecar manifest could not be read or holds unusable values
    #[error("Failed to parse add-in manifest {path}: {reason}")]
    ManifestParseFailed { path: PathBuf, reason: String },

    /// The library could not be loaded or lacks a required entry point
    #[error("Failed to load add-in library {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// The add-in targets a different host build
    #[error("Add-in {path} is incompatible with this host: {reason}")]
    AbiMismatch { path: PathBuf, reason: String },

    /// Host-side allocation for the add-in failed
    #[error("Failed to allocate add-in state: {0}")]
    AllocationFailed(String),

    /// A handler symbol could not be found in the add-in library
    #[error("Add-in {id} does not export '{symbol}' for {kind} events")]
    SymbolResolutionFailed {
        id: AddinId,
        kind: EventKind,
        symbol: String,
    },

    /// No add-in with this identity is imported
    #[error("Add-in {id} not found")]
    UnknownAddin { id: AddinId },

    /// Configuration file could not be parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AddinError {
    /// Status code reported across the C ABI
    pub fn status(&self) -> AddinStatus {
        match self {
            Self::CapacityExceeded { .. } => AddinStatus::CapacityExceeded,
            Self::AlreadyImported { .. } => AddinStatus::AlreadyImported,
            Self::BinaryNotFound { .. } => AddinStatus::BinaryNotFound,
            Self::ManifestNotFound { .. } => AddinStatus::ManifestNotFound,
            Self::ManifestParseFailed { .. } => AddinStatus::ManifestParseFailed,
            Self::LoadFailed { .. } => AddinStatus::LoadFailed,
            Self::AbiMismatch { .. } => AddinStatus::AbiMismatch,
            Self::AllocationFailed(_) => AddinStatus::AllocationFailed,
            Self::SymbolResolutionFailed { .. } => AddinStatus::SymbolResolutionFailed,
            Self::UnknownAddin { .. } => AddinStatus::UnknownAddin,
            Self::Config(_) | Self::Io(_) => AddinStatus::Internal,
        }
    }
}
