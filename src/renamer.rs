use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

use crate::{
    error::NamerError,
    image_asset::{ImageAsset, Payload},
    naming::{
        apply_rename, clean_suggestion, plan_rename_avoiding, NamingOptions, PlannedNames,
        RenamePlan,
    },
    ocr::TextExtractor,
    prompt::build_prompt,
    providers::ModelClient,
};

/// Pipeline step a file was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Suggest,
    Sanitize,
    Rename,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Preprocess => write!(f, "preprocess"),
            Stage::Suggest => write!(f, "suggest"),
            Stage::Sanitize => write!(f, "sanitize"),
            Stage::Rename => write!(f, "rename"),
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    /// Dry run: where the file would go.
    DryRun(RenamePlan),
    Renamed(RenamePlan),
    /// The suggested name is the current name.
    Unchanged(PathBuf),
    Failed {
        path: PathBuf,
        stage: Stage,
        error: NamerError,
    },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::DryRun(plan) | FileOutcome::Renamed(plan) => &plan.source,
            FileOutcome::Unchanged(path) => path,
            FileOutcome::Failed { path, .. } => path,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            FileOutcome::DryRun(plan) | FileOutcome::Renamed(plan) => Some(&plan.destination),
            FileOutcome::Unchanged(path) => Some(path),
            FileOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<FileOutcome>,
}

impl Report {
    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Renamed(_)))
    }

    pub fn suggested(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::DryRun(_)))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Unchanged(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failed)
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Runs each screenshot through load → OCR → prompt → model → sanitize →
/// rename, one file at a time.
pub struct ScreenshotRenamer<E: TextExtractor> {
    client: ModelClient,
    ocr: E,
    options: NamingOptions,
    do_rename: bool,
}

impl<E: TextExtractor> ScreenshotRenamer<E> {
    pub fn new(client: ModelClient, ocr: E, options: NamingOptions, do_rename: bool) -> Self {
        Self {
            client,
            ocr,
            options,
            do_rename,
        }
    }

    pub async fn run(&self, files: &[PathBuf]) -> Report {
        let mut report = Report::default();
        let mut planned = PlannedNames::default();

        for path in files {
            let span = info_span!("file", path = %path.display());
            let outcome = self.process(path, &planned).instrument(span).await;
            if let FileOutcome::DryRun(plan) | FileOutcome::Renamed(plan) = &outcome {
                planned.record(plan);
            }
            print_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        report
    }

    /// Process one file. Never panics or aborts the batch; every error ends
    /// up in [`FileOutcome::Failed`].
    pub async fn process_file(&self, path: &Path) -> FileOutcome {
        self.process(path, &PlannedNames::default()).await
    }

    async fn process(&self, path: &Path, planned: &PlannedNames) -> FileOutcome {
        let failed = |stage: Stage, error: NamerError| FileOutcome::Failed {
            path: path.to_path_buf(),
            stage,
            error,
        };

        let payload = match ImageAsset::load(path)
            .and_then(|asset| asset.payload(self.client.transmit_format()))
        {
            Ok(payload) => payload,
            Err(e) => return failed(Stage::Preprocess, e),
        };

        let ocr_text = self.ocr.extract_text(path).await;
        if ocr_text.is_none() {
            debug!("No text extracted from image.");
        }
        let prompt = build_prompt(ocr_text.as_deref(), self.options.max_chars);

        let suggestion = match self.ask_model(path, &payload, &prompt).await {
            Ok(suggestion) => suggestion,
            Err(e) => return failed(Stage::Suggest, e),
        };
        debug!(suggestion = %suggestion, "model suggestion");
        if clean_suggestion(&suggestion).is_empty() {
            return failed(Stage::Suggest, NamerError::EmptySuggestion);
        }

        let plan = match plan_rename_avoiding(path, &suggestion, &self.options, planned) {
            Ok(plan) => plan,
            Err(e) => return failed(Stage::Sanitize, e),
        };

        if plan.is_noop() {
            return FileOutcome::Unchanged(plan.source);
        }
        if !self.do_rename {
            return FileOutcome::DryRun(plan);
        }

        match apply_rename(&plan) {
            Ok(()) => FileOutcome::Renamed(plan),
            Err(e) => failed(Stage::Rename, e),
        }
    }

    async fn ask_model(
        &self,
        path: &Path,
        payload: &Payload,
        prompt: &str,
    ) -> Result<String, NamerError> {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!(
            "Asking {} about {}",
            self.client.get_model_name(),
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self.client.suggest_name(payload, prompt).await;
        spinner.finish_and_clear();
        result
    }
}

fn print_outcome(outcome: &FileOutcome) {
    match outcome {
        FileOutcome::DryRun(plan) => {
            println!(
                "{} → {}",
                plan.source.display(),
                plan.destination.display().to_string().green()
            );
        }
        FileOutcome::Renamed(plan) => {
            println!(
                "  {} {} → {}",
                "✓".green(),
                plan.source.display(),
                plan.destination.display().to_string().green()
            );
        }
        FileOutcome::Unchanged(path) => {
            println!("{} {}", path.display(), "(name unchanged)".dimmed());
        }
        FileOutcome::Failed { path, stage, error } => {
            eprintln!(
                "{}: {} ({}): {}",
                "Error".red().bold(),
                path.display(),
                stage,
                error
            );
        }
    }
}
