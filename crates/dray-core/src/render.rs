use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::OutputConfig;
use crate::datetime::parse_record_date;
use crate::task::{ClientRecord, TaskRecord};

const ABSENT: &str = "-";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    #[must_use]
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            color: output.color,
        }
    }

    #[tracing::instrument(skip(self, tasks, today))]
    pub fn print_task_table(&self, tasks: &[TaskRecord], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = ["ID", "Type", "Status", "Created", "Deadline", "Description"];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let deadline = cell(task.deadline.as_deref());
            let deadline = match task.deadline.as_deref().and_then(parse_record_date) {
                Some(date) if date < today => self.paint(&deadline, "31"),
                _ => deadline,
            };

            rows.push(vec![
                self.paint(&task.id.to_string(), "33"),
                cell(task.kind.as_deref()),
                cell(task.status.as_deref()),
                cell(task.creation_date.as_deref()),
                deadline,
                cell(task.description.as_deref()),
            ]);
        }

        write_table(&mut out, &headers, rows)
    }

    #[tracing::instrument(skip(self, clients))]
    pub fn print_client_table(&self, clients: &[ClientRecord]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = ["ID", "Name", "NIF", "Phone", "Email", "Address"];

        let rows = clients
            .iter()
            .map(|client| {
                vec![
                    self.paint(&client.id.to_string(), "33"),
                    client.name.clone(),
                    client.nif.clone(),
                    client.phone.clone(),
                    client.email.clone(),
                    client.address.clone(),
                ]
            })
            .collect();

        write_table(&mut out, &headers, rows)
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_detail(&self, task: &TaskRecord) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id           {}", task.id)?;
        writeln!(out, "type         {}", task.kind.as_deref().unwrap_or(ABSENT))?;
        writeln!(out, "status       {}", task.status.as_deref().unwrap_or(ABSENT))?;
        writeln!(out, "created      {}", task.creation_date.as_deref().unwrap_or(ABSENT))?;
        writeln!(out, "deadline     {}", task.deadline.as_deref().unwrap_or(ABSENT))?;
        writeln!(
            out,
            "user         {}",
            task.user_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| ABSENT.to_string())
        )?;
        writeln!(
            out,
            "description  {}",
            task.description.as_deref().unwrap_or(ABSENT)
        )?;

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn cell(value: Option<&str>) -> String {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        ABSENT.to_string()
    } else {
        trimmed.to_string()
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, value) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(value));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, value) in row.iter().enumerate() {
            let padding = widths[idx].saturating_sub(visible_width(value));
            write!(writer, "{}{} ", value, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

// Padding has to ignore ANSI escapes, which have no display width.
fn visible_width(value: &str) -> usize {
    let mut stripped = String::with_capacity(value.len());
    let mut in_escape = false;

    for ch in value.chars() {
        if in_escape {
            if ch == 'm' {
                in_escape = false;
            }
            continue;
        }
        if ch == '\x1b' {
            in_escape = true;
            continue;
        }
        stripped.push(ch);
    }

    UnicodeWidthStr::width(stripped.as_str())
}
