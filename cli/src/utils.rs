use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Reads a whole file, failing if it is larger than `max` bytes.
///
/// The size is checked against the file metadata first and then enforced
/// while reading, so a file that grows after the check is still rejected.
pub(crate) fn read_file(path: &Path, max: u64) -> Result<Vec<u8>> {
    let read_error = |source: io::Error| Error::Read {
        path: path.display().to_string(),
        source,
    };
    let too_large = || Error::FileTooLarge {
        path: path.display().to_string(),
        max,
    };

    let file = File::open(path).map_err(read_error)?;
    let metadata = file.metadata().map_err(read_error)?;
    if metadata.is_file() && metadata.len() > max {
        return Err(too_large());
    }

    let mut buffer = Vec::new();
    file.take(max.saturating_add(1))
        .read_to_end(&mut buffer)
        .map_err(read_error)?;
    if buffer.len() as u64 > max {
        return Err(too_large());
    }
    Ok(buffer)
}
