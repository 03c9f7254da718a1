//! `handoff doctor`: config validation, database and page registry checks.
//!
//! Prints one line per check with an `[ok]`, `[warn]`, `[fail]` or `[info]`
//! marker and exits non-zero when anything failed.

use {
    anyhow::Result,
    handoff_config::{HandoffConfig, Severity},
    handoff_store::SqlitePageRegistry,
};

use crate::db_commands;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

impl From<Severity> for Status {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
            Severity::Info => Self::Info,
        }
    }
}

struct Section {
    title: String,
    items: Vec<(Status, String)>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push((status, message.into()));
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for (status, message) in &section.items {
            eprintln!("  [{}{}{RESET}]  {message}", status.color(), status.label());
            match status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

pub async fn handle_doctor(config: &HandoffConfig) -> Result<()> {
    eprintln!("{BOLD}handoff doctor{RESET}");
    eprintln!("{BOLD}=============={RESET}\n");

    let mut sections = vec![check_config(config)];
    sections.push(check_database(config).await);

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn check_config(config: &HandoffConfig) -> Section {
    let label = handoff_config::find_config_file()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults, no config file found".into());
    let mut section = Section::new(format!("Config ({label})"));

    let result = handoff_config::validate(config);
    if result.diagnostics.is_empty() {
        section.push(Status::Ok, "No problems found");
    }
    for d in &result.diagnostics {
        section.push(d.severity.into(), format!("{}: {}", d.path, d.message));
    }
    section
}

async fn check_database(config: &HandoffConfig) -> Section {
    let mut section = Section::new(format!("Database ({})", config.database.url));

    let pool = match db_commands::open(config).await {
        Ok(pool) => {
            section.push(Status::Ok, "Connected, migrations up to date");
            pool
        },
        Err(e) => {
            section.push(Status::Fail, format!("Cannot open database: {e}"));
            return section;
        },
    };

    match SqlitePageRegistry::new(pool).list().await {
        Ok(pages) => {
            let active: Vec<_> = pages.iter().filter(|p| p.status == "active").collect();
            if active.is_empty() {
                section.push(Status::Warn, "No active pages registered; every message will fail");
            } else {
                section.push(Status::Ok, format!("{} active page(s)", active.len()));
            }
            for page in active.iter().filter(|p| !p.has_api_key) {
                section.push(
                    Status::Warn,
                    format!(
                        "{} page {} has no assistant key; general messages hand off",
                        page.platform, page.page_id
                    ),
                );
            }
        },
        Err(e) => section.push(Status::Fail, format!("Cannot read page registry: {e}")),
    }
    section
}
