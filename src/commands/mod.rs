pub mod receive;
pub mod send;
pub mod sign;

use crate::error::CliResult;
use std::io::Read;
use std::path::Path;

/// Read a file, or stdin when the path is `-`
pub(crate) fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read(path)?)
    }
}
