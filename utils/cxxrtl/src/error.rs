use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load CXXRTL library {}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("CXXRTL library {} does not export `{symbol}`", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("name {0:?} contains an interior NUL byte")]
    InvalidName(String),

    #[error("`{0}` returned a null handle")]
    NullHandle(&'static str),

    #[error("object of width {width} and depth {depth} spans {expected} chunks, got {actual}")]
    ChunkMismatch {
        width: usize,
        depth: usize,
        expected: usize,
        actual: usize,
    },

    #[error("object has no `{0}` value")]
    NoValue(&'static str),

    #[error("memory index {index} is outside {zero_at}..{}", .zero_at + .depth)]
    RowOutOfRange {
        index: usize,
        zero_at: usize,
        depth: usize,
    },

    #[error("CXXRTL library does not export optional `{0}`")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
