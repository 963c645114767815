use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Grammar violations found while reading a chain file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralKind {
    BadHeader,
    BadNonce,
    BadSeparator,
    TruncatedChain,
}

/// Well-formed lines that fail digest or difficulty re-derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoKind {
    DigestMismatch,
    DifficultyMismatch,
}

impl fmt::Display for StructuralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StructuralKind::BadHeader => "bad header",
            StructuralKind::BadNonce => "bad nonce",
            StructuralKind::BadSeparator => "bad separator",
            StructuralKind::TruncatedChain => "truncated chain",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CryptoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CryptoKind::DigestMismatch => "digest mismatch",
            CryptoKind::DifficultyMismatch => "difficulty mismatch",
        };
        f.write_str(name)
    }
}

/// Which piece of the command line was missing or wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    MissingParameter,
    MissingContinueFile,
    MissingCheckFile,
    MissingChainFile,
    Invalid,
}

#[derive(Error, Debug)]
pub enum HcbError {
    #[error("{message}")]
    Usage { kind: UsageKind, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("can't open file \"{}\": {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid starting message: {0}")]
    InvalidMessage(String),

    #[error("{kind} at line #{line}: expected \"{expected}\" but got \"{actual}\"")]
    Structural {
        kind: StructuralKind,
        line: usize,
        expected: String,
        actual: String,
    },

    #[error("{kind} at line #{line}: expected \"{expected}\" but got \"{actual}\"")]
    Crypto {
        kind: CryptoKind,
        line: usize,
        expected: String,
        actual: String,
    },
}

impl HcbError {
    pub fn usage(kind: UsageKind, message: impl Into<String>) -> Self {
        HcbError::Usage {
            kind,
            message: message.into(),
        }
    }

    /// Process exit code for this error. Every category and kind has its own.
    pub fn exit_code(&self) -> i32 {
        match self {
            HcbError::Usage { kind, .. } => match kind {
                UsageKind::MissingParameter => 1,
                UsageKind::MissingContinueFile => 2,
                UsageKind::MissingCheckFile => 3,
                UsageKind::MissingChainFile => 13,
                UsageKind::Invalid => 14,
            },
            HcbError::Io(_) | HcbError::Open { .. } | HcbError::Serde(_) => 4,
            HcbError::Structural { kind, .. } => match kind {
                StructuralKind::BadHeader => 5,
                StructuralKind::BadSeparator => 6,
                StructuralKind::TruncatedChain => 9,
                StructuralKind::BadNonce => 10,
            },
            HcbError::Crypto { kind, .. } => match kind {
                CryptoKind::DigestMismatch => 7,
                CryptoKind::DifficultyMismatch => 8,
            },
            HcbError::Format(_) => 11,
            HcbError::InvalidMessage(_) => 12,
        }
    }

    /// Line number of a validation failure, if this is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            HcbError::Structural { line, .. } | HcbError::Crypto { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HcbError>;
