//! Offline diagnosis tool for answer sheets.
//!
//! # Usage
//!
//! ```bash
//! sheet-ocr check-key exam/answer_key.json
//! sheet-ocr segment --key exam/answer_key.json \
//!     --question-region crops/qn.png --answer-region crops/ans.png \
//!     --subject Math --student-id 20231234 -o tokens/
//! ```
//!
//! `check-key` validates an answer key and prints the canonical question
//! lists. `segment` runs row segmentation, question mapping and key
//! generation on two region crops and writes every token raster to
//! `<output-dir>/<key>.png`.

use std::fs;
use std::path::{Path, PathBuf};

use answer_sheet_ocr::domain::{AnswerKey, PageContext};
use answer_sheet_ocr::pipeline::{ConfigLoader, KeyGenerator, PipelineConfig, QuestionIndexMapper};
use answer_sheet_ocr::processors::{LineSegmenter, TextTokenExtractor};
use answer_sheet_ocr::utils::{init_tracing, load_image};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

/// Command-line arguments for the answer-sheet diagnosis tool
#[derive(Parser)]
#[command(name = "sheet-ocr")]
#[command(about = "Answer-sheet diagnosis - inspects answer keys and token segmentation")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an answer key and print its question lists
    CheckKey {
        /// Path to the answer key JSON
        key: PathBuf,
    },
    /// Segment two region crops and dump every keyed token
    Segment {
        /// Path to the answer key JSON
        #[arg(short, long)]
        key: PathBuf,

        /// Crop of the question-number column
        #[arg(long)]
        question_region: PathBuf,

        /// Crop of the answer column
        #[arg(long)]
        answer_region: PathBuf,

        /// Exam subject used in token keys
        #[arg(long)]
        subject: String,

        /// Student id used in token keys
        #[arg(long)]
        student_id: String,

        /// Pipeline configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory to write token images to
        #[arg(short, long)]
        output_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    match args.command {
        Command::CheckKey { key } => check_key(&key),
        Command::Segment {
            key,
            question_region,
            answer_region,
            subject,
            student_id,
            config,
            output_dir,
        } => {
            let config = match config {
                Some(path) => ConfigLoader::load_from_file(&path)?,
                None => PipelineConfig::default(),
            };
            let page_id = answer_region
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("page")
                .to_string();
            let context = PageContext::new(page_id, subject, student_id);
            segment(&key, &question_region, &answer_region, &context, &config, &output_dir)
        }
    }
}

fn check_key(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let answer_key = AnswerKey::from_file(path)?;
    let render = |ids: Vec<answer_sheet_ocr::domain::QuestionId>| {
        ids.iter().map(|id| id.to_string()).collect::<Vec<_>>()
    };
    let summary = json!({
        "entries": answer_key.len(),
        "list_a": render(answer_key.list_a()),
        "list_b": render(answer_key.list_b()),
        "tail_question_counts": answer_key.tail_question_counts(),
        "uniform": answer_key.is_uniform(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn segment(
    key_path: &Path,
    question_path: &Path,
    answer_path: &Path,
    context: &PageContext,
    config: &PipelineConfig,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let answer_key = AnswerKey::from_file(key_path)?;
    let question_region = load_image(question_path)?;
    let answer_region = load_image(answer_path)?;

    let segmenter = LineSegmenter::new(config.line_segmenter.clone());
    let extractor = TextTokenExtractor::new(config.token_extractor.clone());

    let question_bands = segmenter.segment(&question_region);
    let table = QuestionIndexMapper::new(&answer_key).map(&question_bands);
    let answer_bands = segmenter.segment(&answer_region);
    let tokens: Vec<_> = answer_bands.iter().flat_map(|band| extractor.extract(band)).collect();
    info!(
        question_bands = question_bands.len(),
        answer_bands = answer_bands.len(),
        tokens = tokens.len(),
        "segmented regions"
    );

    let keyed = KeyGenerator::new(context, &answer_key).generate(tokens, &table)?;

    fs::create_dir_all(output_dir)?;
    for (key, token) in keyed.iter() {
        let path = output_dir.join(format!("{key}.png"));
        token.raster.save(&path)?;
    }

    let summary = json!({
        "page_id": context.page_id,
        "question_bands": question_bands.len(),
        "question_ranges": table.ranges(),
        "answer_bands": answer_bands.len(),
        "tokens": keyed.len(),
        "key_collisions": keyed.collisions(),
        "keys": keyed.iter().map(|(k, _)| k).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
