//! `generate`: one batch from a notes file, then the exports.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

use crate::cli::CliError;
use crate::config::AppConfig;
use crate::export;
use crate::orchestrator::{BatchOutcome, Orchestrator};
use crate::report::{ReportFormat, ReportStatus, ReportStore};
use crate::stream::{ConsumerOutcome, GenerationBackend, HttpBackend};

#[derive(Args)]
pub struct GenerateArgs {
    /// Incident notes file, or `-` for stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Report formats to generate (repeatable or comma-separated; default: all)
    #[arg(short, long = "format", value_name = "ID", value_delimiter = ',')]
    pub formats: Vec<String>,

    /// Directory for the exports (default: ~/IncidentReports)
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Also write each completed report as markdown
    #[arg(long)]
    pub markdown: bool,
}

pub async fn execute(args: GenerateArgs, config: &AppConfig, quiet: bool) -> Result<(), CliError> {
    let formats = parse_formats(&args.formats)?;
    let notes = read_input(&args.input).await?;
    let backend = HttpBackend::new(&config.backend_url, config.connect_timeout)?;
    let out_dir = args.out_dir.clone().unwrap_or_else(|| config.export_dir.clone());

    run(
        Arc::new(backend),
        config,
        &notes,
        &formats,
        &Destination {
            dir: out_dir,
            markdown: args.markdown,
            quiet,
        },
    )
    .await
}

struct Destination {
    dir: PathBuf,
    markdown: bool,
    quiet: bool,
}

/// Run the batch and write what it produced. The PDF is only written when
/// every format completed; markdown is written for each completed format.
async fn run(
    backend: Arc<dyn GenerationBackend>,
    config: &AppConfig,
    notes: &str,
    formats: &[ReportFormat],
    dest: &Destination,
) -> Result<(), CliError> {
    let store = ReportStore::new();
    let orchestrator = Orchestrator::new(store.clone(), backend, config.consumer_config());

    let progress = (!dest.quiet).then(|| watch_progress(store.clone()));
    let outcome = orchestrator.run_batch(notes, formats).await?;
    if let Some(task) = progress {
        task.abort();
    }
    if !dest.quiet {
        print_summary(&outcome);
    }

    let snapshot = store.snapshot()?;
    let today = chrono::Local::now().date_naive();

    if dest.markdown {
        for format in outcome.outcomes.keys().filter(|f| snapshot.entry(**f).is_completed()) {
            let md = export::export_markdown(&snapshot, *format, today)?;
            let path = export::write_to_dir(&dest.dir, &md.filename, md.content.as_bytes())?;
            println!("{}", path.display());
        }
    }

    let failed: Vec<ReportFormat> = outcome
        .outcomes
        .iter()
        .filter(|(_, o)| !o.is_completed())
        .map(|(f, _)| *f)
        .collect();
    if !failed.is_empty() {
        return Err(CliError::Incomplete {
            failed,
            total: outcome.outcomes.len(),
        });
    }

    let pdf = export::export_all(&snapshot, today)?;
    let path = export::write_to_dir(&dest.dir, &pdf.filename, &pdf.bytes)?;
    println!("{}", path.display());
    Ok(())
}

fn parse_formats(ids: &[String]) -> Result<Vec<ReportFormat>, CliError> {
    if ids.is_empty() {
        return Ok(ReportFormat::all().to_vec());
    }
    ids.iter()
        .map(|id| ReportFormat::from_str(id.trim()).ok_or_else(|| CliError::UnknownFormat(id.clone())))
        .collect()
}

async fn read_input(source: &str) -> Result<String, CliError> {
    let input_error = |e| CliError::Input {
        path: if source == "-" { "stdin".to_string() } else { source.to_string() },
        source: e,
    };
    if source == "-" {
        let mut notes = String::new();
        tokio::io::stdin()
            .read_to_string(&mut notes)
            .await
            .map_err(input_error)?;
        Ok(notes)
    } else {
        tokio::fs::read_to_string(source).await.map_err(input_error)
    }
}

/// Print one stderr line per status change until aborted.
fn watch_progress(store: ReportStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut revisions = store.subscribe();
        let mut seen: BTreeMap<ReportFormat, ReportStatus> = BTreeMap::new();
        loop {
            if let Ok(snapshot) = store.snapshot() {
                for format in &snapshot.requested {
                    let entry = snapshot.entry(*format);
                    if seen.insert(*format, entry.status) != Some(entry.status) {
                        let detail = entry.error.or(entry.activity).unwrap_or_default();
                        eprintln!("{:<26} {:<10} {}", format.label(), entry.status.as_str(), detail);
                    }
                }
            }
            if revisions.changed().await.is_err() {
                break;
            }
        }
    })
}

fn print_summary(outcome: &BatchOutcome) {
    for (format, result) in &outcome.outcomes {
        match result {
            ConsumerOutcome::Completed => eprintln!("  [OK] {}", format.label()),
            ConsumerOutcome::Failed { error } => eprintln!("  [X]  {}: {error}", format.label()),
            ConsumerOutcome::Superseded => eprintln!("  [-]  {}: superseded", format.label()),
        }
    }
    eprintln!(
        "{} completed, {} failed",
        outcome.completed(),
        outcome.failed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ScriptedBackend;

    fn dest(dir: &std::path::Path, markdown: bool) -> Destination {
        Destination {
            dir: dir.to_path_buf(),
            markdown,
            quiet: true,
        }
    }

    #[test]
    fn formats_default_to_all() {
        assert_eq!(parse_formats(&[]).unwrap().len(), 8);
        assert_eq!(
            parse_formats(&["resolution".into()]).unwrap(),
            vec![ReportFormat::Resolution]
        );
        assert!(matches!(
            parse_formats(&["haiku".into()]),
            Err(CliError::UnknownFormat(_))
        ));
    }

    #[tokio::test]
    async fn missing_input_file_is_input_error() {
        let err = read_input("/definitely/not/here.txt").await.unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));
        assert_eq!(err.exit_status(), 2);
    }

    #[tokio::test]
    async fn writes_pdf_and_markdown_when_all_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new()
            .with_report(ReportFormat::ExecutiveSummary, &["## Summary\n", "Checkout down"])
            .with_report(ReportFormat::ActionItems, &["- [ ] Add alerting"]);

        run(
            Arc::new(backend),
            &AppConfig::default(),
            "14:23 alert fired",
            &[ReportFormat::ExecutiveSummary, ReportFormat::ActionItems],
            &dest(tmp.path(), true),
        )
        .await
        .unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n.starts_with("incident-reports-") && n.ends_with(".pdf")));
        assert!(names.iter().any(|n| n.starts_with("incident-report-action_items-")));
    }

    #[tokio::test]
    async fn failed_format_skips_pdf_and_reports_incomplete() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new()
            .with_report(ReportFormat::ExecutiveSummary, &["ok"])
            .with_refusal(ReportFormat::Resolution, "connection refused");

        let err = run(
            Arc::new(backend),
            &AppConfig::default(),
            "db down",
            &[ReportFormat::ExecutiveSummary, ReportFormat::Resolution],
            &dest(tmp.path(), true),
        )
        .await
        .unwrap_err();

        match err {
            CliError::Incomplete { failed, total } => {
                assert_eq!(failed, vec![ReportFormat::Resolution]);
                assert_eq!(total, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1, "only the completed markdown: {names:?}");
        assert!(names[0].ends_with(".md"));
    }

    #[tokio::test]
    async fn blank_notes_rejected_before_any_request() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new());
        let err = run(
            backend.clone(),
            &AppConfig::default(),
            "  \n ",
            &[ReportFormat::Resolution],
            &dest(tmp.path(), false),
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_status(), 2);
        assert!(backend.opened().is_empty());
    }
}
