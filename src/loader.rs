use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use bstr::ByteSlice;
use log::debug;

use crate::error::{Error, Result};
use crate::model::Program;
use crate::parser::parse_program;

/// Reads and parses a program file.
///
/// Returns `Ok(None)` when the file does not exist. A leading UTF-8 byte
/// order mark is skipped.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file exists but cannot be read,
/// [`Error::Encoding`] if it is not UTF-8, and [`Error::Parse`] if its
/// contents are not a valid program.
pub fn load_program(path: impl AsRef<Path>) -> Result<Option<Program>> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    let text = bytes.to_str().map_err(|_| Error::Encoding {
        path: path.to_path_buf(),
    })?;

    let program = parse_program(text)?;
    debug!(
        "loaded {}: {} rules, {} facts",
        path.display(),
        program.rules.len(),
        program.facts.len()
    );
    Ok(Some(program))
}
