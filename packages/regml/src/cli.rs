//! Command-line interface for the RegML engine.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::apply::apply_notice;
use crate::chain::{resolve_chain, resolve_chain_through, NoticeDir, NoticeListing};
use crate::changeset;
use crate::config::{self, validate_document_number, validate_part};
use crate::diff::{diff, verify};
use crate::error::Result;
use crate::export::write_export;
use crate::notice::Notice;
use crate::ops::OpKind;
use crate::terms::find_term_candidates;
use crate::tree::DocTree;
use crate::validate::{max_severity, Severity, StructureValidator, Validator};

/// RegML - Versioned regulation changeset and diff engine.
#[derive(Parser)]
#[command(name = "regml")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply one notice to a regulation version.
    ApplyNotice {
        /// Regulation document file (JSON)
        regulation: PathBuf,

        /// Notice file (JSON)
        notice: PathBuf,

        /// Verify the result against an expected document file
        #[arg(short, long)]
        expect: Option<PathBuf>,
    },

    /// Resolve and apply the notice chain for a part.
    ApplyThrough {
        /// CFR part number (e.g., 1003)
        part: String,

        /// Stop after applying this notice document number
        #[arg(short, long)]
        through: Option<String>,

        /// Data root holding regulation/ and notice/ directories
        #[arg(short, long)]
        data_root: Option<PathBuf>,
    },

    /// List a notice's operations in execution order.
    NoticeChanges {
        /// Notice file (JSON)
        notice: PathBuf,
    },

    /// Structural diff between two regulation versions.
    Diff {
        /// Older document file
        left: PathBuf,

        /// Newer document file
        right: PathBuf,

        /// Write the diff JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export document files as JSON with pairwise diffs.
    Json {
        /// Document files, oldest first
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Run the structural validator against a document file.
    Validate {
        /// Document file (JSON)
        file: PathBuf,
    },

    /// List unreferenced occurrences of defined terms.
    CheckTerms {
        /// Document file (JSON)
        file: PathBuf,

        /// Term to look for (repeatable)
        #[arg(short, long = "term", required = true)]
        terms: Vec<String>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ApplyNotice {
            regulation,
            notice,
            expect,
        } => apply_notice_command(&regulation, &notice, expect.as_deref()),
        Commands::ApplyThrough {
            part,
            through,
            data_root,
        } => apply_through_command(&part, through.as_deref(), data_root.as_deref()),
        Commands::NoticeChanges { notice } => notice_changes_command(&notice),
        Commands::Diff {
            left,
            right,
            output,
        } => diff_command(&left, &right, output.as_deref()),
        Commands::Json { files, output_dir } => json_command(&files, output_dir.as_deref()),
        Commands::Validate { file } => validate_command(&file),
        Commands::CheckTerms { file, terms } => check_terms_command(&file, &terms),
    }
}

/// Execute the apply-notice command.
fn apply_notice_command(
    regulation: &Path,
    notice_path: &Path,
    expect: Option<&Path>,
) -> Result<()> {
    let tree = DocTree::load(regulation)?;
    let notice = Notice::load(notice_path)?;

    println!(
        "{} notice {} to {} version {}",
        style("Applying").bold(),
        style(&notice.document_number).cyan(),
        style(&tree.part).cyan(),
        style(&tree.version).green()
    );

    let outcome = apply_notice(&tree, &notice)?;

    for relabel in &outcome.relabeled {
        println!(
            "  {} {} -> {}",
            style("renumbered").yellow(),
            relabel.before,
            relabel.after
        );
    }

    if let Some(expected_path) = expect {
        let expected = DocTree::load(expected_path)?;
        verify(&expected, &outcome.tree)?;
        println!("{}", style("Verification passed").green().bold());
    }

    let out_dir = regulation.parent().unwrap_or_else(|| Path::new("."));
    let out_path = out_dir.join(format!("{}.json", outcome.tree.version));
    outcome.tree.save(&out_path)?;

    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        out_path.display()
    );
    Ok(())
}

/// Execute the apply-through command.
fn apply_through_command(
    part: &str,
    through: Option<&str>,
    data_root: Option<&Path>,
) -> Result<()> {
    validate_part(part)?;
    if let Some(doc) = through {
        validate_document_number(doc)?;
    }
    let data_root = data_root.unwrap_or_else(|| Path::new(config::DEFAULT_DATA_ROOT));

    let store = NoticeDir::new(data_root);
    let refs = store.list(part)?;
    let baseline_version = refs
        .iter()
        .min_by_key(|r| (r.effective_date, r.document_number.clone()))
        .map(|r| r.applies_to_version.clone())
        .ok_or_else(|| {
            crate::error::RegmlError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No notices found for part {part}"),
            ))
        })?;

    let chain = match through {
        Some(doc) => resolve_chain_through(&baseline_version, &refs, doc)?,
        None => resolve_chain(&baseline_version, &refs)?,
    };

    let regulation_dir = config::regulation_dir(data_root, part);
    let baseline = DocTree::load(&regulation_dir.join(format!("{baseline_version}.json")))?;

    println!(
        "{} {} notices to part {} from version {}",
        style("Applying").bold(),
        style(chain.len()).cyan(),
        style(part).cyan(),
        style(&baseline_version).green()
    );

    let pb = ProgressBar::new(chain.len() as u64);
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:30.green} {pos}/{len} {msg}")
            .expect("valid template"),
    );

    let mut current = baseline;
    for r in &chain {
        pb.set_message(r.document_number.clone());
        let notice = store.load(part, &r.document_number)?;
        let outcome = match apply_notice(&current, &notice) {
            Ok(outcome) => outcome,
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        };
        outcome
            .tree
            .save(&regulation_dir.join(format!("{}.json", outcome.tree.version)))?;
        current = outcome.tree;
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{} part {} is at version {}",
        style("Done:").green().bold(),
        part,
        style(&current.version).green()
    );
    Ok(())
}

/// Execute the notice-changes command.
fn notice_changes_command(notice_path: &Path) -> Result<()> {
    let notice = Notice::load(notice_path)?;
    let plan = changeset::plan(&notice)?;

    println!(
        "{} ({} -> {}, effective {})",
        style(&notice.document_number).bold(),
        notice.applies_to_version,
        notice.document_number,
        notice.effective_date
    );
    for planned in &plan.ops {
        let op = &planned.op;
        let kind = match op.kind {
            OpKind::Insert => style(op.kind.as_str()).green(),
            OpKind::Replace | OpKind::DesignateReserved => style(op.kind.as_str()).yellow(),
            OpKind::Delete => style(op.kind.as_str()).red(),
            OpKind::Move => style(op.kind.as_str()).cyan(),
        };
        match &op.destination {
            Some(destination) => {
                println!("  [{}] {} {} -> {}", planned.index, kind, op.target_label, destination);
            }
            None => println!("  [{}] {} {}", planned.index, kind, op.target_label),
        }
    }
    Ok(())
}

/// Execute the diff command.
fn diff_command(left: &Path, right: &Path, output: Option<&Path>) -> Result<()> {
    let a = DocTree::load(left)?;
    let b = DocTree::load(right)?;
    let changes = diff(&a, &b);
    let json = serde_json::to_string_pretty(&changes)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "{} ({} changes) {}",
                style("Saved diff").green().bold(),
                changes.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Execute the json export command.
fn json_command(files: &[PathBuf], output_dir: Option<&Path>) -> Result<()> {
    let mut trees = Vec::with_capacity(files.len());
    for file in files {
        trees.push(DocTree::load(file)?);
    }
    let output_dir = output_dir.unwrap_or_else(|| Path::new("."));
    let written = write_export(&trees, output_dir)?;
    for path in &written {
        println!("{} {}", style("Wrote").green(), path.display());
    }
    Ok(())
}

/// Execute the validate command.
fn validate_command(file: &Path) -> Result<()> {
    let tree = DocTree::load(file)?;
    for warning in &tree.warnings {
        println!("{} {}", style("load warning:").yellow(), warning);
    }

    let diagnostics = StructureValidator.validate(&tree);
    for diagnostic in &diagnostics {
        println!("{diagnostic}");
    }
    println!(
        "{} {} finding(s), worst severity {}",
        style("Validation:").bold(),
        diagnostics.len(),
        max_severity(&diagnostics)
    );
    if max_severity(&diagnostics) >= Severity::Error {
        std::process::exit(1);
    }
    Ok(())
}

/// Execute the check-terms command.
fn check_terms_command(file: &Path, terms: &[String]) -> Result<()> {
    let tree = DocTree::load(file)?;
    let candidates = find_term_candidates(&tree, terms);
    for candidate in &candidates {
        println!(
            "  {} '{}' at {} (offset {})",
            style("unreferenced").yellow(),
            candidate.term,
            candidate.occurrence_label,
            candidate.offset
        );
    }
    println!(
        "{} {} candidate(s)",
        style("Terms:").bold(),
        candidates.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_apply_notice() {
        let cli = Cli::parse_from(["regml", "apply-notice", "1003/v1.json", "notice.json"]);

        let Commands::ApplyNotice {
            regulation,
            notice,
            expect,
        } = cli.command
        else {
            panic!("expected apply-notice");
        };
        assert_eq!(regulation, PathBuf::from("1003/v1.json"));
        assert_eq!(notice, PathBuf::from("notice.json"));
        assert!(expect.is_none());
    }

    #[test]
    fn test_cli_parse_apply_through() {
        let cli = Cli::parse_from([
            "regml",
            "apply-through",
            "1003",
            "--through",
            "2012-1728",
            "--data-root",
            "/tmp/data",
        ]);

        let Commands::ApplyThrough {
            part,
            through,
            data_root,
        } = cli.command
        else {
            panic!("expected apply-through");
        };
        assert_eq!(part, "1003");
        assert_eq!(through, Some("2012-1728".to_string()));
        assert_eq!(data_root, Some(PathBuf::from("/tmp/data")));
    }

    #[test]
    fn test_cli_parse_check_terms_requires_a_term() {
        assert!(Cli::try_parse_from(["regml", "check-terms", "v1.json"]).is_err());
        let cli = Cli::parse_from([
            "regml",
            "check-terms",
            "v1.json",
            "--term",
            "branch office",
            "--term",
            "dwelling",
        ]);
        let Commands::CheckTerms { terms, .. } = cli.command else {
            panic!("expected check-terms");
        };
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn test_cli_parse_json_requires_files() {
        assert!(Cli::try_parse_from(["regml", "json"]).is_err());
    }
}
