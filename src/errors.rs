//! Error types.

/// An error that aborts the tracing pass. When the pass returns one of
/// these, the module has been left as it was before the pass ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceError {
    /// There is no function named `main`, or `main` has no non-phi
    /// instruction, so there is nowhere to put the start-of-trace
    /// marker.
    MissingEntryPoint,
    /// A string literal could not be turned into a constant operand.
    Materialization {
        /// The symbol the constant would have been given.
        symbol: String,
        /// Why the literal was rejected.
        reason: String,
    },
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TraceError::MissingEntryPoint => {
                write!(f, "no non-phi instruction found in a function named `main`")
            }
            TraceError::Materialization { symbol, reason } => {
                write!(f, "cannot materialize constant `{}`: {}", symbol, reason)
            }
        }
    }
}

impl std::error::Error for TraceError {}

/// An error that occurs when parsing textual IR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// One-based source line.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new<S: Into<String>>(line: usize, message: S) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}
