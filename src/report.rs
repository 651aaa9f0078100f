// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Check outcomes and their aggregation into a pass/warn/fail report.

use std::fmt;

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Warning,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Warning => f.write_str("WARNING"),
            Status::Failed => f.write_str("FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Grouping shown in the report, e.g. "tools" or "pods"
    pub category: String,
    pub name: String,
    pub status: Status,
    pub message: String,
    pub remediation: Option<String>,
    /// Only failed required checks count towards the overall failure
    pub required: bool,
}

impl CheckResult {
    pub fn ok(category: &str, name: &str, message: impl Into<String>) -> Self {
        Self::new(category, name, Status::Ok, message)
    }

    pub fn warning(category: &str, name: &str, message: impl Into<String>) -> Self {
        Self::new(category, name, Status::Warning, message)
    }

    pub fn failed(category: &str, name: &str, message: impl Into<String>) -> Self {
        Self::new(category, name, Status::Failed, message)
    }

    fn new(category: &str, name: &str, status: Status, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            status,
            message: message.into(),
            remediation: None,
            required: true,
        }
    }

    pub fn with_remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation = Some(hint.into());
        self
    }

    /// Mark the check as optional; a failure is then reported as a warning
    pub fn optional(mut self) -> Self {
        self.required = false;
        if self.status == Status::Failed {
            self.status = Status::Warning;
        }
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.required && self.status == Status::Failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    title: String,
    results: Vec<CheckResult>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = CheckResult>) {
        self.results.extend(results);
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_blocking()).count()
    }

    pub fn warnings(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == Status::Warning)
            .count()
    }

    /// Worst status across all checks, with non-blocking failures demoted
    pub fn overall(&self) -> Status {
        if self.failures() > 0 {
            Status::Failed
        } else if self.warnings() > 0 {
            Status::Warning
        } else {
            Status::Ok
        }
    }

    pub fn passed(&self) -> bool {
        self.failures() == 0
    }

    /// Process exit code: 0 when no required check failed
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        let mut category = "";
        for r in &self.results {
            if r.category != category {
                category = &r.category;
                writeln!(f, "[{}]", category)?;
            }
            writeln!(f, "  {:<8} {:<40} {}", r.status, r.name, r.message)?;
            if r.status != Status::Ok {
                if let Some(hint) = &r.remediation {
                    writeln!(f, "           -> {}", hint)?;
                }
            }
        }
        write!(
            f,
            "Result: {} ({} failed, {} warnings, {} checks)",
            self.overall(),
            self.failures(),
            self.warnings(),
            self.results.len()
        )
    }
}
