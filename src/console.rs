//! Interactive mapping entry.
//!
//! Walks the user through method, path, request headers, status, response
//! headers, and body, then registers the result with the [`Mapper`].

use crate::config::{validate_status, SUPPORTED_METHODS};
use crate::mapper::Mapper;
use crate::mapping::{RequestMapping, ResponseData};
use crate::normalize::HeaderMap;
use std::io::{BufRead, Write};

/// Input ended before the flow finished.
#[derive(Debug, thiserror::Error)]
#[error("console input closed")]
pub struct InputClosed;

/// Prompt-driven mapping entry over any line-based input.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prompt for mappings until the user declines to add another one or
    /// the input ends. Returns how many were added.
    pub fn add_mappings(&mut self, mapper: &Mapper) -> anyhow::Result<usize> {
        let mut added = 0;
        loop {
            match self.add_one(mapper) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) if e.is::<InputClosed>() => return Ok(added),
                Err(e) => return Err(e),
            }

            match self.confirm("Do you want to add additional mapping?") {
                Ok(true) => continue,
                Ok(false) => return Ok(added),
                Err(e) if e.is::<InputClosed>() => return Ok(added),
                Err(e) => return Err(e),
            }
        }
    }

    fn add_one(&mut self, mapper: &Mapper) -> anyhow::Result<bool> {
        let method = self.choose_method()?;
        let path = self.read_path()?;
        let headers = self.read_headers("request", true)?;
        let status = self.read_status()?;
        let response_headers = self.read_headers("response", false)?;
        let body = self.read_body()?;

        let request = RequestMapping {
            method,
            path,
            headers,
            params: HeaderMap::new(),
        };
        let response = ResponseData {
            status,
            headers: response_headers,
            ..ResponseData::default()
        }
        .with_body(body.into_bytes());

        match mapper.add(request, response) {
            Ok(id) => {
                writeln!(self.output, "Added mapping {id}")?;
                Ok(true)
            }
            Err(e) if e.is_duplicate() => {
                writeln!(self.output, "Failed to add request mapping: {e}")?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_line(&mut self) -> anyhow::Result<String> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(InputClosed.into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        loop {
            writeln!(self.output, "{question} [y/n]")?;
            match self.read_line()?.to_lowercase().as_str() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                other => writeln!(self.output, "Invalid value [{other}]")?,
            }
        }
    }

    fn choose_method(&mut self) -> anyhow::Result<String> {
        loop {
            writeln!(self.output, "Select method:")?;
            for (i, method) in SUPPORTED_METHODS.iter().enumerate() {
                writeln!(self.output, "{}. {}", i + 1, method)?;
            }

            let line = self.read_line()?;
            let choice = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| SUPPORTED_METHODS.get(i));
            match choice {
                Some(method) => {
                    writeln!(self.output, "Selected method: {method}")?;
                    return Ok(method.to_string());
                }
                None => writeln!(self.output, "Invalid value [{line}]")?,
            }
        }
    }

    fn read_path(&mut self) -> anyhow::Result<String> {
        loop {
            writeln!(self.output, "Please enter path to endpoint")?;
            let line = self.read_line()?;
            if line.starts_with('/') {
                return Ok(line);
            }
            writeln!(self.output, "Path should start with '/'")?;
        }
    }

    /// Collect headers until the user stops. Request header names are
    /// lower-cased; response header names are kept as typed.
    fn read_headers(&mut self, kind: &str, lowercase: bool) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        while self.confirm(&format!("Do you want to add {kind} header?"))? {
            writeln!(self.output, "Enter key")?;
            let key = self.read_line()?;
            writeln!(self.output, "Enter value")?;
            let value = self.read_line()?;

            if self.confirm(&format!("Is it correct header?\n{key}: {value}"))? {
                let key = if lowercase { key.to_lowercase() } else { key };
                headers.entry(key).or_default().push(value);
            }
        }
        if headers.is_empty() {
            writeln!(self.output, "Skip headers")?;
        }
        Ok(headers)
    }

    fn read_status(&mut self) -> anyhow::Result<u16> {
        loop {
            writeln!(self.output, "Enter response status")?;
            let line = self.read_line()?;
            match line.parse::<u16>() {
                Ok(status) if validate_status(status).is_ok() => return Ok(status),
                _ => writeln!(self.output, "Failed to parse value {line}. Please try again")?,
            }
        }
    }

    fn read_body(&mut self) -> anyhow::Result<String> {
        writeln!(self.output, "Please enter response data")?;
        loop {
            let text = self.read_line()?;
            if self.confirm("Is it final response text?")? {
                return Ok(text);
            }
        }
    }
}
