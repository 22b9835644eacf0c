use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! internal_error {
    ($msg:expr) => {
        crate::Error::Internal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Internal {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into the four failure classes the engine distinguishes. Each class has a
/// different blast radius during an analysis pass, and [`Error::is_decode_error`] /
/// [`Error::is_internal`] let callers route them without matching every variant.
///
/// # Error Categories
///
/// ## Decode Errors
/// Fatal for the one method being decoded; the method is skipped and the pass continues.
/// - [`Error::Malformed`] - Corrupt method body (bad branch target, reserved opcode, broken regions)
/// - [`Error::OutOfBounds`] - Truncated operand or instruction stream
/// - [`Error::UnresolvedToken`] - Operand token missing from the assembly's member table
///
/// ## Rule Errors
/// - [`Error::RuleFailed`] - A rule callback returned an error or panicked
/// - [`Error::RuleInstantiation`] - A rule factory could not construct its rule
///
/// ## Engine Errors
/// - [`Error::Internal`] - An engine invariant was violated (a bug in this crate, not the input)
///
/// ## Encoding Errors
/// - [`Error::InvalidMnemonic`] - Unknown mnemonic passed to the instruction encoder
/// - [`Error::InvalidBranch`] - Branch or label misuse in the instruction encoder
///
/// # Examples
///
/// ```rust
/// use dotlint::{assembly::decode_stream, Error, Parser};
///
/// // `br.s` with its offset byte missing
/// let mut parser = Parser::new(&[0x2B]);
/// match decode_stream(&mut parser) {
///     Err(e) if e.is_decode_error() => println!("method skipped: {e}"),
///     Err(e) => println!("unexpected: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The method body is damaged and could not be decoded.
    ///
    /// Raised for genuinely corrupt input: reserved opcodes, branch targets that do not land
    /// on an instruction boundary, exception regions outside the body or partially
    /// overlapping each other. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading bytecode.
    ///
    /// This error occurs when an instruction or its operand is truncated by the end of the
    /// method body.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A metadata token used as an instruction operand could not be resolved.
    ///
    /// Call, field and function-pointer operands are resolved against the member table of
    /// the assembly being analyzed. The associated [`Token`] is the unresolved operand.
    #[error("Unresolved member token - {0}")]
    UnresolvedToken(Token),

    /// A rule callback failed.
    ///
    /// Covers both returned errors and panics caught at the dispatcher boundary. The rule is
    /// disabled for the remainder of the assembly.
    #[error("Rule {check_id} failed: {message}")]
    RuleFailed {
        /// Check identifier of the failing rule
        check_id: String,
        /// Failure description, including the event being visited
        message: String,
    },

    /// A rule could not be constructed by its factory.
    ///
    /// The rule is never registered; the run continues without it.
    #[error("Rule {check_id} could not be instantiated: {message}")]
    RuleInstantiation {
        /// Check identifier of the rule that failed to build
        check_id: String,
        /// Reason reported by the factory
        message: String,
    },

    /// An internal invariant of the engine was violated.
    ///
    /// These indicate a bug in the tracker or call graph (for example a push-range walk
    /// running off the start of a method) rather than a problem with the analyzed assembly,
    /// and are surfaced separately from findings.
    #[error("Internal error - {file}:{line}: {message}")]
    Internal {
        /// Description of the broken invariant
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The instruction encoder does not know this mnemonic.
    #[error("Invalid instruction mnemonic - {0}")]
    InvalidMnemonic(String),

    /// A branch, switch or label could not be encoded.
    #[error("Invalid branch - {0}")]
    InvalidBranch(String),

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories, such as a rule reporting
    /// a problem in its own bookkeeping.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for errors that make a single method body undecodable.
    ///
    /// The dispatcher skips such methods and keeps going with the rest of the assembly.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. } | Error::OutOfBounds | Error::UnresolvedToken(_)
        )
    }

    /// Returns `true` for engine invariant violations.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal { .. })
    }
}
