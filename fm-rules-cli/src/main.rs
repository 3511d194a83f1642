//! A thin host binary for `fm-rules`: walks a vault of Markdown files,
//! loads a JSON rule document, runs every enabled rule against each file's
//! front matter in order, prints a summary, and optionally writes the
//! mutated front matter back to disk.
//!
//! The core library never walks a directory or touches a filesystem path
//! beyond what it's handed; all of that lives here, in the host.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use fm_rules::engine::{self, FileContext, Status};
use fm_rules::{frontmatter, rule_storage::RuleFile};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use walkdir::WalkDir;

/// Applies front-matter rules across a vault of Markdown notes.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON rule document (spec's "Rule storage" shape).
    #[clap(long)]
    rules: PathBuf,
    /// Directory to walk for `.md` files.
    #[clap(long)]
    vault: PathBuf,
    /// Run every rule and print what would change, but never write files.
    #[clap(long)]
    dry_run: bool,
    /// Write a `.bak` copy of every file before overwriting it.
    #[clap(long)]
    backup: bool,
    /// Print one line per rule per file instead of just the per-file summary.
    #[clap(long)]
    verbose: bool,
    /// Disables fancy color output. This app detects `tty`s, so you don't
    /// need to worry about setting this option when piping.
    #[clap(long)]
    no_color: bool,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let rules_text = std::fs::read_to_string(&cli.rules)?;
    let rule_file = RuleFile::from_json(&rules_text)?;
    let rules = rule_file.enabled_rules();

    let stdout = StandardStream::stdout(if cli.no_color || atty::isnt(atty::Stream::Stdout) {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    });

    let mut files_scanned = 0usize;
    let mut files_modified = 0usize;
    let mut files_errored = 0usize;

    for entry in WalkDir::new(&cli.vault).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        files_scanned += 1;
        match process_file(entry.path(), &cli.vault, &rules, &cli, &stdout) {
            Ok(Outcome::Unchanged) => {}
            Ok(Outcome::Modified) => files_modified += 1,
            Ok(Outcome::Errored) => files_errored += 1,
            Err(err) => {
                files_errored += 1;
                print_line(
                    &stdout,
                    Color::Red,
                    &format!("{}: {err}", entry.path().display()),
                )?;
            }
        }
    }

    print_summary(&stdout, files_scanned, files_modified, files_errored)?;
    Ok(())
}

enum Outcome {
    Unchanged,
    Modified,
    Errored,
}

fn process_file(
    path: &Path,
    vault: &Path,
    rules: &[engine::Rule],
    cli: &Cli,
    stdout: &StandardStream,
) -> Result<Outcome, anyhow::Error> {
    let text = std::fs::read_to_string(path)?;
    let (front_matter, body) = frontmatter::split(&text)?;
    let ctx = file_context(path, vault);

    let mut current = front_matter;
    let mut any_modified = false;
    let mut any_error = false;

    for rule in rules {
        let result = engine::run_rule(rule, &current, &ctx);
        if cli.verbose {
            print_rule_line(stdout, path, rule, &result)?;
        }
        match result.status {
            Status::Error => any_error = true,
            Status::Success | Status::Warning => {
                any_modified = any_modified || result.modified;
            }
            Status::Skipped => {}
        }
        current = result.new_value;
    }

    if any_error {
        return Ok(Outcome::Errored);
    }
    if !any_modified {
        return Ok(Outcome::Unchanged);
    }
    if cli.dry_run {
        return Ok(Outcome::Modified);
    }

    let rewritten = frontmatter::join(&current, body)?;
    if cli.backup {
        let mut backup_name = path.as_os_str().to_owned();
        backup_name.push(".bak");
        std::fs::write(PathBuf::from(backup_name), &text)?;
    }
    std::fs::write(path, rewritten)?;
    Ok(Outcome::Modified)
}

fn file_context(path: &Path, vault: &Path) -> FileContext {
    let basename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let relative = path.strip_prefix(vault).unwrap_or(path);
    let folder = relative
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    FileContext {
        basename,
        path: relative.to_string_lossy().into_owned(),
        folder,
        vault_name: vault
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
    }
}

fn print_rule_line(
    stdout: &StandardStream,
    path: &Path,
    rule: &engine::Rule,
    result: &engine::FileResult,
) -> Result<(), anyhow::Error> {
    let color = match result.status {
        Status::Success => Color::Green,
        Status::Warning => Color::Yellow,
        Status::Error => Color::Red,
        Status::Skipped => Color::Blue,
    };
    let detail = result
        .error
        .as_deref()
        .or(result.warning.as_deref())
        .unwrap_or("");
    print_line(
        stdout,
        color,
        &format!(
            "{}: [{}] {} ({}) {detail}",
            path.display(),
            result.status.as_str(),
            rule.name,
            rule.id
        ),
    )
}

fn print_line(stdout: &StandardStream, color: Color, message: &str) -> Result<(), anyhow::Error> {
    let mut stdout = stdout.lock();
    stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
    writeln!(stdout, "{message}")?;
    stdout.reset()?;
    Ok(())
}

fn print_summary(
    stdout: &StandardStream,
    scanned: usize,
    modified: usize,
    errored: usize,
) -> Result<(), anyhow::Error> {
    let mut stdout = stdout.lock();
    writeln!(
        stdout,
        "scanned {scanned} file(s), modified {modified}, errored {errored}"
    )?;
    Ok(())
}
