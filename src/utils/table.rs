//! Create, read and write the tab-separated [`Table`] reports.

use crate::utils;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A row-based table of text cells.
///
/// # Examples
///
/// ```
/// use arts::Table;
///
/// let mut table = Table::new();
/// table.headers = vec!["#Core_gene", "Duplication"].into_iter().map(String::from).collect();
/// table.add_row(vec!["TIGR00001".to_string(), "Yes".to_string()])?;
///
/// println!("{}", table.to_markdown()?);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
///
/// | #Core_gene | Duplication |
/// |------------|-------------|
/// | TIGR00001  |     Yes     |
///
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Table {
    /// Names of the table columns.
    pub headers: Vec<String>,
    /// Rows of table values.
    pub rows: Vec<Vec<String>>,
    /// Optional file path for where the table was read from.
    pub path: Option<PathBuf>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Create a new table with empty headers and rows.
    pub fn new() -> Self {
        Table { headers: Vec::new(), rows: Vec::new(), path: None }
    }

    /// Create a new table with the given headers.
    pub fn with_headers(headers: &[&str]) -> Self {
        Table { headers: headers.iter().map(|h| h.to_string()).collect(), ..Default::default() }
    }

    /// Read a delimited file, the first line is the header. Blank lines are skipped.
    pub fn read(path: &Path) -> Result<Table, Report> {
        let mut table = Table::new();

        // lookup delimiter from file extension
        let delim = utils::get_delimiter(&path)?;

        // attempt to open the file path
        let file = File::open(path).wrap_err_with(|| eyre!("Failed to read file: {path:?}"))?;

        // read and parse lines
        for line in BufReader::new(file).lines() {
            let line = line.wrap_err_with(|| eyre!("Failed to read line from: {path:?}"))?;
            if line.trim().is_empty() {
                continue;
            }
            let row = line.split(delim).map(String::from).collect_vec();
            // if headers are empty, this is the first line, write headers
            if table.headers.is_empty() {
                table.headers = row;
            }
            // otherwise regular row
            else {
                table.rows.push(row);
            }
        }

        table.path = Some(path.to_path_buf());

        Ok(table)
    }

    /// Add a new row to the table.
    ///
    /// # Arguments
    ///
    /// * `row` - A vector of new data to add as a row, must match the width of the headers.
    pub fn add_row(&mut self, row: Vec<String>) -> Result<(), Report> {
        let (new, ex) = (row.len(), self.headers.len());
        if !self.headers.is_empty() && ex != new {
            return Err(eyre!("New row size ({new}) does not match the table headers ({ex})."));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn header_position(&self, header: &str) -> Result<usize, Report> {
        let pos = self
            .headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| eyre!("Column '{header}' was not found in table: {:?}.", self.path))?;

        Ok(pos)
    }

    /// Get all values of a column.
    pub fn get_column(&self, header: &str) -> Result<Vec<&str>, Report> {
        let header_i = self.header_position(header)?;
        let column = self.rows.iter().map(|row| row.get(header_i).map(String::as_str).unwrap_or("")).collect();
        Ok(column)
    }

    /// Write to file, the delimiter is chosen from the file extension.
    pub fn write(&self, path: &Path) -> Result<(), Report> {
        let mut file =
            File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;

        // Parse line delimiter from file extension
        let delim = utils::get_delimiter(&path)?.to_string();

        // write headers
        let line = format!("{}\n", self.headers.iter().join(&delim));
        file.write_all(line.as_bytes())
            .wrap_err_with(|| format!("Unable to write table headers: {line}"))?;

        // write regular rows
        for row in &self.rows {
            let line = format!("{}\n", row.iter().join(&delim));
            file.write_all(line.as_bytes())
                .wrap_err_with(|| format!("Unable to write table rows: {line}"))?;
        }

        Ok(())
    }

    /// Convert table to markdown format
    pub fn to_markdown(&self) -> Result<String, Report> {
        // get the maximum width of each column, +2 to add space on either side
        let col_widths = self
            .headers
            .iter()
            .enumerate()
            .map(|(col_i, header)| {
                self.rows
                    .iter()
                    .map(|row| row.get(col_i).map(|c| c.len()).unwrap_or(0))
                    .chain([header.len()])
                    .max()
                    .unwrap_or(header.len())
                    + 2
            })
            .collect_vec();

        let mut markdown = String::from("|");
        // frame in between headers and rows
        let mut header_frame = String::from("|");

        // Create the header line
        for (header, col_width) in self.headers.iter().zip(col_widths.iter()) {
            markdown.push_str(&format!("{:^width$}|", header, width = col_width));
            header_frame.push_str(&format!("{}|", "-".repeat(*col_width)));
        }
        markdown.push('\n');
        markdown.push_str(&header_frame);
        markdown.push('\n');

        // Create the row lines
        for row in &self.rows {
            markdown.push('|');
            for (col_i, col_width) in col_widths.iter().enumerate() {
                let cell = row.get(col_i).map(String::as_str).unwrap_or("");
                markdown.push_str(&format!("{:^width$}|", cell, width = col_width));
            }
            markdown.push('\n');
        }

        Ok(markdown)
    }
}
