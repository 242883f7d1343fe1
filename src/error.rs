use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the library.
///
/// The resolution engine itself never fails: unification conflicts found while
/// propagating facts are discarded on the spot. These variants surface at the
/// edges, from parsing and loading program text, and from the checked
/// unification entry point [`Atom::try_unify_with_ground`](crate::Atom::try_unify_with_ground).
#[derive(Debug, Error)]
pub enum Error {
    /// Program or query text does not follow the grammar.
    #[error("syntax error at line {line}, column {column}: unexpected `{snippet}`")]
    Parse {
        /// 1-based line of the offending input.
        line: usize,
        /// 1-based column of the offending input.
        column: usize,
        /// The start of the input that could not be parsed.
        snippet: String,
    },

    /// A program file could not be read.
    #[error("cannot read `{}`", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A program file is not valid UTF-8.
    #[error("`{}` is not valid UTF-8", path.display())]
    Encoding {
        /// File that was being read.
        path: PathBuf,
    },

    /// Unification was attempted between atoms of different predicates.
    #[error("predicate mismatch: expected `{expected}`, found `{found}`")]
    PredicateMismatch {
        /// Predicate of the pattern atom.
        expected: String,
        /// Predicate of the ground atom.
        found: String,
    },

    /// Unification was attempted between atoms of different arities.
    #[error("arity mismatch: expected {expected} arguments, found {found}")]
    ArityMismatch {
        /// Arity of the pattern atom.
        expected: usize,
        /// Arity of the ground atom.
        found: usize,
    },

    /// The atom on the ground side of a unification contains variables.
    #[error("`{atom}` is not ground")]
    NotGround {
        /// Rendering of the offending atom.
        atom: String,
    },

    /// A variable would have to be bound to two different constants.
    #[error("variable `{variable}` is bound to `{bound}` but must also match `{found}`")]
    ConflictingBinding {
        /// The variable with conflicting bindings.
        variable: String,
        /// The constant it was bound to first.
        bound: String,
        /// The constant it would also have to equal.
        found: String,
    },

    /// Two constants at the same argument position differ.
    #[error("argument {position}: `{expected}` does not match `{found}`")]
    ConstantMismatch {
        /// 0-based argument position.
        position: usize,
        /// Constant in the pattern atom.
        expected: String,
        /// Constant in the ground atom.
        found: String,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a [`Error::Parse`] pointing at `rest`, the unparsed tail of `input`.
    #[cfg(feature = "parsing")]
    pub(crate) fn parse_at(input: &str, rest: &str) -> Self {
        let offset = input.len().saturating_sub(rest.len());
        let consumed = &input[..offset];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rfind('\n')
            .map_or(offset, |newline| offset - newline - 1)
            + 1;
        let snippet = rest
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(24)
            .collect::<String>();
        let snippet = if snippet.is_empty() {
            "end of input".to_string()
        } else {
            snippet
        };

        Self::Parse {
            line,
            column,
            snippet,
        }
    }
}
