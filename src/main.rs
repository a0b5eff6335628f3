use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use termbase_check::report::{self, ReportFormat};
use termbase_check::scan::{self, ScanReport};
use termbase_check::unknown::CandidateKind;
use termbase_check::{
    AddRequest, Capabilities, Config, ScanRequest, Session, StoreBackend, TermRecord, TermStatus,
};

#[derive(Parser, Debug)]
#[command(
    name = "termbase-check",
    version,
    about = "Check bilingual medical terminology in slide decks against a termbase"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<PathBuf>,

    /// Termbase backend (overrides settings [store].backend)
    #[arg(long = "store", value_enum, global = true)]
    store: Option<StoreBackend>,

    /// Local termbase CSV (overrides settings [store].path)
    #[arg(long = "termbase", global = true)]
    termbase: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a PDF or text file and report terminology issues
    Scan {
        /// PDF or UTF-8 text (form feeds separate units)
        input: PathBuf,

        /// Write the issue report to this file
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,

        /// Report format (default: from --out extension, else csv)
        #[arg(short = 'f', long = "format", value_enum)]
        format: Option<ReportFormat>,

        /// Max distance between an English term and its Chinese counterpart
        #[arg(short = 'w', long = "window")]
        window: Option<usize>,

        /// OCR near-empty pages even if [ocr].enabled is off
        #[arg(long = "ocr")]
        ocr: bool,

        /// Disable fuzzy scoring of unknown terms
        #[arg(long = "no-fuzzy")]
        no_fuzzy: bool,

        /// Add every new pair to the termbase as pending
        #[arg(long = "save-new")]
        save_new: bool,

        /// Approve new pairs and unknown terms interactively
        #[arg(long = "review")]
        review: bool,
    },
    /// Rewrite a CSV termbase with canonical columns
    Normalize {
        input: PathBuf,

        /// Output path (default: overwrite input)
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Add one confirmed term
    Add {
        #[arg(long = "en")]
        en: String,
        #[arg(long = "zh")]
        zh: String,
        #[arg(long = "abbr")]
        abbr: Option<String>,
        /// First-mention style, e.g. "ZH(EN;ABBR)"
        #[arg(long = "style")]
        style: Option<String>,
        /// Known misspellings, delimiter separated
        #[arg(long = "variants")]
        variants: Option<String>,
    },
    /// List the termbase
    Show {
        /// Only rows with this status (confirmed, pending-new, ...)
        #[arg(long = "status")]
        status: Option<String>,
    },
    /// Show which optional subsystems are available
    Capabilities,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    termbase_check::logging::init(cli.verbose)?;
    let config = Config {
        settings_path: cli.read_settings.clone(),
        store: cli.store,
        termbase: cli.termbase.clone(),
    };

    match cli.command {
        Command::Scan {
            input,
            out,
            format,
            window,
            ocr,
            no_fuzzy,
            save_new,
            review,
        } => {
            let request = ScanRequest {
                window,
                force_ocr: ocr,
                no_fuzzy,
            };
            run_scan(&config, input, out, format, request, save_new, review).await
        }
        Command::Normalize { input, out } => {
            let out = out.unwrap_or_else(|| input.clone());
            let warnings = termbase_check::normalize_file(&input, &out)?;
            print_warnings(&warnings);
            println!("normalized termbase written to {}", out.display());
            Ok(())
        }
        Command::Add {
            en,
            zh,
            abbr,
            style,
            variants,
        } => {
            let record = termbase_check::build_record(
                &AddRequest {
                    en,
                    zh,
                    abbr,
                    style,
                    variants,
                },
                &scan::today(),
            )?;
            let mut session = open_session(&config).await?;
            if session.append(vec![record]) == 0 {
                println!("term already present");
                return Ok(());
            }
            session.save().await?;
            println!("term added to {}", session.describe_store());
            Ok(())
        }
        Command::Show { status } => {
            let session = open_session(&config).await?;
            let status = status.as_deref().map(TermStatus::parse);
            println!(
                "{}",
                termbase_check::format_table(session.table(), status.as_ref())
            );
            Ok(())
        }
        Command::Capabilities => {
            let settings = termbase_check::resolve_settings(&config)?;
            for line in Capabilities::detect(&settings).lines() {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

async fn open_session(config: &Config) -> Result<Session> {
    let settings = termbase_check::resolve_settings(config)?;
    let capabilities = Capabilities::detect(&settings);
    let session = Session::open(&settings, &capabilities).await?;
    print_warnings(session.warnings());
    Ok(session)
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

async fn run_scan(
    config: &Config,
    input: PathBuf,
    out: Option<PathBuf>,
    format: Option<ReportFormat>,
    request: ScanRequest,
    save_new: bool,
    review: bool,
) -> Result<()> {
    let settings = termbase_check::resolve_settings(config)?;
    let capabilities = Capabilities::detect(&settings);
    let mut session = Session::open(&settings, &capabilities).await?;
    print_warnings(session.warnings());

    let units = termbase_check::load_input(&input, &settings, &capabilities, &request)?;
    let report = termbase_check::scan_units(
        &units,
        session.table(),
        &settings,
        &capabilities,
        &request,
    )?;
    println!("{}", report.summary());

    match &out {
        Some(path) => {
            let format = format
                .or_else(|| ReportFormat::from_path(path))
                .unwrap_or(ReportFormat::Csv);
            report::write_report(&report, format, path)?;
            println!("report written to {}", path.display());
        }
        None if !report.has_findings() => println!("no terminology issues found"),
        None => {
            for line in report::text_lines(&report) {
                println!("{}", line);
            }
        }
    }

    let today = scan::today();
    let mut approved = Vec::new();
    if review {
        approved = review_findings(&report, &today)?;
    } else if save_new {
        approved = report.promotable(&today);
    }
    if !approved.is_empty() {
        let added = session.append(approved);
        session.save().await?;
        println!("{} term(s) added to {}", added, session.describe_store());
    } else if session.commit().await? {
        println!("termbase saved to {}", session.describe_store());
    }
    Ok(())
}

enum Answer {
    Yes,
    No,
    Quit,
}

fn ask(prompt: &str, input: &mut impl BufRead) -> Result<Option<String>> {
    print!("{} ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn parse_answer(value: &str) -> Result<Answer> {
    match value.to_lowercase().as_str() {
        "y" | "yes" => Ok(Answer::Yes),
        "" | "n" | "no" => Ok(Answer::No),
        "q" | "quit" => Ok(Answer::Quit),
        _ => Err(anyhow!("expected y/n/q")),
    }
}

/// Walks new pairs and unknown candidates, returning the approved records.
fn review_findings(report: &ScanReport, today: &str) -> Result<Vec<TermRecord>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut approved = Vec::new();

    for pair in &report.diff.new_items {
        let abbr = if pair.abbr.is_empty() {
            String::new()
        } else {
            format!(";{}", pair.abbr)
        };
        let prompt = format!(
            "[p{}] add {}({}{})? [y/N/q]",
            pair.page, pair.zh, pair.en, abbr
        );
        loop {
            let Some(answer) = ask(&prompt, &mut input)? else {
                return Ok(approved);
            };
            match parse_answer(&answer) {
                Ok(Answer::Yes) => approved.push(scan::promote_pair(pair, today)),
                Ok(Answer::No) => {}
                Ok(Answer::Quit) => return Ok(approved),
                Err(err) => {
                    eprintln!("{}", err);
                    continue;
                }
            }
            break;
        }
    }

    for candidate in &report.unknowns {
        let (label, counterpart) = match candidate.kind {
            CandidateKind::UnknownEn => ("Chinese", "zh"),
            CandidateKind::UnknownZh => ("English", "en"),
        };
        let hint = candidate
            .suggestion
            .as_deref()
            .map(|suggestion| format!(" (close to {})", suggestion))
            .unwrap_or_default();
        let prompt = format!(
            "{} {}{}: {} for it ({}), empty to skip, /q to stop:",
            candidate.kind.as_str(),
            candidate.candidate,
            hint,
            label,
            counterpart
        );
        let Some(answer) = ask(&prompt, &mut input)? else {
            break;
        };
        if answer == "/q" {
            break;
        }
        if answer.is_empty() {
            continue;
        }
        let (en, zh) = match candidate.kind {
            CandidateKind::UnknownEn => (candidate.candidate.as_str(), answer.as_str()),
            CandidateKind::UnknownZh => (answer.as_str(), candidate.candidate.as_str()),
        };
        approved.push(scan::pending_record(en, zh, today));
    }
    Ok(approved)
}
