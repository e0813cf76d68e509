use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use pathweaver::config::EditorConfig;
use pathweaver::model::ObjectType;
use pathweaver::pathway::PathwayModel;
use pathweaver::{generator, parser};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and re-write pathway XML documents", long_about = None)]
struct Cli {
    /// Session configuration (JSON); defaults apply when absent
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a JSON summary of a pathway
    Info {
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
    /// Print the full pathway as JSON
    Dump {
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
    /// Read a pathway and write it back out
    Roundtrip {
        #[arg(value_name = "IN")]
        input: Utf8PathBuf,
        #[arg(value_name = "OUT")]
        output: Utf8PathBuf,
    },
    /// Validate every pathway document below a directory
    Check {
        #[arg(value_name = "DIR")]
        dir: Utf8PathBuf,
    },
}

#[derive(Serialize)]
struct Summary<'a> {
    title: Option<&'a str>,
    elements: usize,
    types: BTreeMap<&'static str, usize>,
    groups: Vec<GroupSummary>,
    problems: Vec<String>,
}

#[derive(Serialize)]
struct GroupSummary {
    id: String,
    members: usize,
}

fn summarize(model: &PathwayModel) -> Summary<'_> {
    Summary {
        title: model.info().map(|i| i.title.as_str()),
        elements: model.len(),
        types: model
            .type_counts()
            .into_iter()
            .map(|(t, n)| (t.tag_name(), n))
            .collect(),
        groups: model
            .of_type(ObjectType::Group)
            .filter_map(|g| {
                let id = g.id()?;
                Some(GroupSummary {
                    id: id.to_string(),
                    members: model.group_members(id).map_or(0, |m| m.len()),
                })
            })
            .collect(),
        problems: model.validate(),
    }
}

fn is_pathway_file(path: &Utf8Path) -> bool {
    matches!(path.extension(), Some("xml") | Some("gpml"))
}

fn check_dir(dir: &Utf8Path, config: &EditorConfig) -> Result<()> {
    let files: Vec<Utf8PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.into_path()).ok())
        .filter(|p| is_pathway_file(p))
        .collect();

    let failures: Vec<(Utf8PathBuf, String)> = files
        .par_iter()
        .filter_map(|path| {
            let problem = match parser::read_from_file(path, config) {
                Ok(model) => {
                    let problems = model.validate();
                    if problems.is_empty() {
                        return None;
                    }
                    problems.join("; ")
                }
                Err(e) => format!("{:#}", e),
            };
            Some((path.clone(), problem))
        })
        .collect();

    for (path, problem) in &failures {
        eprintln!("FAIL {}: {}", path, problem);
    }
    println!("{} files checked, {} failed", files.len(), failures.len());
    if !failures.is_empty() {
        bail!("{} of {} pathway files failed", failures.len(), files.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Command::Info { file } => {
            let model = parser::read_from_file(&file, &config)
                .with_context(|| format!("Failed to parse {}", file))?;
            println!("{}", serde_json::to_string_pretty(&summarize(&model))?);
        }
        Command::Dump { file } => {
            let model = parser::read_from_file(&file, &config)
                .with_context(|| format!("Failed to parse {}", file))?;
            let elements: Vec<_> = model.elements().collect();
            println!("{}", serde_json::to_string_pretty(&elements)?);
        }
        Command::Roundtrip { input, output } => {
            let model = parser::read_from_file(&input, &config)
                .with_context(|| format!("Failed to parse {}", input))?;
            generator::write_to_file(&model, &output)?;
            println!("Wrote {} elements to {}", model.len(), output);
        }
        Command::Check { dir } => check_dir(&dir, &config)?,
    }
    Ok(())
}
