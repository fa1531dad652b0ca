//! Ordered, case-preserving header list.
//!
//! Names compare case-insensitively. `add` appends, `set` drops every earlier
//! value of the name first. Validation follows the usual header grammar:
//! names are visible ASCII, values are tab or printable ASCII unless the
//! caller opts into non-ASCII values.

use crate::error::BuildError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, value: &str) -> Result<(), BuildError> {
        check_name(name)?;
        check_value(name, value)?;
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    pub fn add_non_ascii(&mut self, name: &str, value: &str) -> Result<(), BuildError> {
        check_name(name)?;
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<(), BuildError> {
        check_name(name)?;
        check_value(name, value)?;
        self.remove_all(name);
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    pub fn set_non_ascii(&mut self, name: &str, value: &str) -> Result<(), BuildError> {
        check_name(name)?;
        self.remove_all(name);
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Append a `"Name: value"` line, splitting on the first colon.
    pub fn add_line(&mut self, line: &str) -> Result<(), BuildError> {
        let (name, value) = parse_line(line)?;
        self.add(name, value)
    }

    pub fn remove_all(&mut self, name: &str) {
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Last value of `name`, matching how a later `add` shadows earlier ones.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }
}

/// Split `"Name: value"` on the first colon and trim both halves.
pub fn parse_line(line: &str) -> Result<(&str, &str), BuildError> {
    let malformed = || BuildError::MalformedHeader {
        line: line.to_string(),
    };
    let (name, value) = line.split_once(':').ok_or_else(malformed)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(malformed());
    }
    Ok((name, value.trim()))
}

fn check_name(name: &str) -> Result<(), BuildError> {
    if name.is_empty() {
        return Err(BuildError::InvalidHeader {
            name: String::new(),
            reason: "name is empty".to_string(),
        });
    }
    if let Some((index, c)) = name
        .char_indices()
        .find(|(_, c)| !('\u{21}'..='\u{7e}').contains(c))
    {
        return Err(BuildError::InvalidHeader {
            name: name.to_string(),
            reason: format!("unexpected char {:#06x} at {index} in name", c as u32),
        });
    }
    Ok(())
}

fn check_value(name: &str, value: &str) -> Result<(), BuildError> {
    if let Some((index, c)) = value
        .char_indices()
        .find(|(_, c)| *c != '\t' && !('\u{20}'..='\u{7e}').contains(c))
    {
        return Err(BuildError::InvalidHeader {
            name: name.to_string(),
            reason: format!("unexpected char {:#06x} at {index} in value", c as u32),
        });
    }
    Ok(())
}
