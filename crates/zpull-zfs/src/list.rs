//! `zfs list -H -p` framing shared by the buffered and streaming listers.

use crate::stream;
use crate::system::SystemZfs;
use std::io::{BufRead, Read};
use zpull_core::error::{ZpullError, ZpullResult};

/// `list -H -p -o <props> [args]`.
pub(crate) fn list_args(properties: &[&str], extra: &[&str]) -> ZpullResult<Vec<String>> {
    if properties.is_empty() {
        return Err(ZpullError::InvalidConfig(
            "zfs list needs at least one property".into(),
        ));
    }
    let mut args = vec![
        "list".to_string(),
        "-H".to_string(),
        "-p".to_string(),
        "-o".to_string(),
        properties.join(","),
    ];
    args.extend(extra.iter().map(|arg| arg.to_string()));
    Ok(args)
}

/// Split one output line on tabs into exactly `fields` values.
pub(crate) fn split_row(line: &str, fields: usize) -> ZpullResult<Vec<String>> {
    let row: Vec<String> = line.splitn(fields, '\t').map(str::to_string).collect();
    if row.len() != fields {
        return Err(ZpullError::UnexpectedOutput(format!(
            "zfs list returned {} fields, expected {fields}: {line:?}",
            row.len()
        )));
    }
    Ok(row)
}

/// Next newline-terminated line, without the newline. `None` at end of output.
pub(crate) fn next_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> ZpullResult<Option<String>> {
    buf.clear();
    let read = reader.by_ref().take(max as u64 + 1).read_until(b'\n', buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() > max {
        return Err(ZpullError::UnexpectedOutput(format!(
            "zfs list line exceeds {max} bytes"
        )));
    }
    String::from_utf8(std::mem::take(buf))
        .map(Some)
        .map_err(|_| ZpullError::UnexpectedOutput("zfs list output is not valid UTF-8".into()))
}

impl SystemZfs {
    /// Run `zfs list` to completion and return every row, or the first error.
    ///
    /// Bounded by the configured command timeout, which surfaces as `Cancelled`.
    pub fn list(&self, properties: &[&str], extra: &[&str]) -> ZpullResult<Vec<Vec<String>>> {
        let cancel = self.command().deadline().unwrap_or_default();
        stream::spawn_listing(self.command(), &cancel, properties, extra).drain()
    }
}
