//! `zfs get` / `zfs set`.

use crate::system::SystemZfs;
use zpull_core::endpoint::normalize_resume_token;
use zpull_core::error::{ZpullError, ZpullResult};
use zpull_core::path::DatasetPath;
use zpull_core::property::PropertySet;

pub(crate) const RESUME_TOKEN_PROPERTY: &str = "receive_resume_token";

pub(crate) fn parse_get_output(stdout: &[u8], expected: usize) -> ZpullResult<PropertySet> {
    let text = String::from_utf8_lossy(stdout);
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != expected {
        return Err(ZpullError::UnexpectedOutput(format!(
            "zfs get returned {} property values, expected {expected}",
            lines.len()
        )));
    }

    let mut props = PropertySet::new();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [name, value] = fields.as_slice() else {
            return Err(ZpullError::UnexpectedOutput(format!(
                "zfs get did not return a property/value pair: {line:?}"
            )));
        };
        props.insert(*name, *value)?;
    }
    Ok(props)
}

impl SystemZfs {
    /// Current values of `names` on `fs`, keyed by property name.
    pub fn get(&self, fs: &DatasetPath, names: &[&str]) -> ZpullResult<PropertySet> {
        if names.is_empty() {
            return Ok(PropertySet::new());
        }
        let args = vec![
            "get".to_string(),
            "-Hp".to_string(),
            "-o".to_string(),
            "property,value".to_string(),
            names.join(","),
            fs.to_string(),
        ];
        let stdout = self.command().run(&args)?;
        parse_get_output(&stdout, names.len())
    }

    /// `zfs set name=value... <fs>`. An empty set runs nothing.
    pub fn set(&self, fs: &DatasetPath, props: &PropertySet) -> ZpullResult<()> {
        if props.is_empty() {
            return Ok(());
        }
        let mut args = vec!["set".to_string()];
        args.extend(props.to_assignments());
        args.push(fs.to_string());
        self.command().run_silent(&args)
    }

    /// Resume token left by an interrupted resumable receive; empty when there is none.
    pub fn receive_resume_token(&self, fs: &DatasetPath) -> ZpullResult<String> {
        let props = self.get(fs, &[RESUME_TOKEN_PROPERTY])?;
        let token = props.get(RESUME_TOKEN_PROPERTY).ok_or_else(|| {
            ZpullError::UnexpectedOutput(format!(
                "zfs get did not report {RESUME_TOKEN_PROPERTY} for {fs}"
            ))
        })?;
        Ok(normalize_resume_token(token).to_string())
    }
}
