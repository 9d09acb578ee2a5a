//! Minimal CLI: schema document → (check inputs | describe)
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use json_struct::ir::SchemaDoc;
use json_struct::lower::{emit_doc, lower};
use json_struct::{Schema, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON/NDJSON documents against a declarative schema document
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// parse every input document and report failures with their paths
    Check(CheckOut),
    /// print the schema as understood after loading
    Describe(DescribeOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema document (.json)
    #[arg(long, short)]
    schema: PathBuf,

    /// reject undeclared keys on the root object, whatever the document says
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// print each parsed document to stdout
    #[arg(long, default_value_t = false)]
    emit: bool,

    /// only report failures
    #[arg(long, short, default_value_t = false)]
    quiet: bool,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input document and where it came from.
struct Document {
    label: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> Result<Schema> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema document {}", self.schema.display()))?;
        let doc = SchemaDoc::from_json_str(&source)
            .with_context(|| format!("invalid schema document {}", self.schema.display()))?;
        let schema = lower(&doc)?;
        tracing::debug!(schema = %schema.name(), is_async = schema.is_async(), "loaded schema");
        Ok(if self.strict { schema.strict() } else { schema })
    }
}

impl InputSettings {
    fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            if self.ndjson {
                for (line_number, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let label = format!("{source_path_str}:{}", line_number + 1);
                    let json_value = serde_json::from_str::<serde_json::Value>(line)
                        .with_context(|| format!("failed to parse JSON line ({label})"))?;
                    self.push(&mut documents, label, json_value)?;
                }
            } else {
                let json_value = serde_json::from_str::<serde_json::Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                self.push(&mut documents, source_path_str, json_value)?;
            }
        }
        tracing::info!(documents = documents.len(), "loaded inputs");
        Ok(documents)
    }

    fn push(&self, documents: &mut Vec<Document>, label: String, json_value: serde_json::Value) -> Result<()> {
        let json_value = match self.json_pointer.as_deref() {
            None => Some(json_value),
            Some(pointer) => json_value.pointer(pointer).cloned(),
        };
        let Some(json_value) = json_value else {
            // the schema decides whether a missing node is acceptable
            documents.push(Document { label, value: Value::Undefined });
            return Ok(());
        };
        match self.jq_expr.as_ref() {
            None => documents.push(Document { label, value: Value::from(json_value) }),
            Some(jq_expr) => {
                let outputs = crate::jq_exec::run_jaq(jq_expr, &json_value)
                    .with_context(|| format!("failed to apply jq expression to {label}"))?;
                for (index, output) in outputs.into_iter().enumerate() {
                    documents.push(Document { label: format!("{label}#{index}"), value: Value::from(output) });
                }
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Returns whether every checked document was valid.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Check(target) => {
                let schema = target.schema_settings.load()?;
                let documents = target.input_settings.load()?;
                let outcomes = check_documents(&schema, documents);
                let mut failures = 0usize;
                for (label, outcome) in &outcomes {
                    match outcome {
                        Ok(parsed) => {
                            if !target.quiet {
                                eprintln!("{} {label}", "✅".green());
                            }
                            if target.emit {
                                let json = parsed.clone().into_json().unwrap_or(serde_json::Value::Null);
                                println!("{}", serde_json::to_string(&json)?);
                            }
                        }
                        Err(message) => {
                            failures += 1;
                            eprintln!("{} {label}: {}", "❌".red(), message.red());
                        }
                    }
                }
                let summary = format!("{} checked, {failures} failed", outcomes.len());
                if failures == 0 {
                    eprintln!("{}", summary.green().bold());
                } else {
                    eprintln!("{}", summary.red().bold());
                }
                Ok(failures == 0)
            }
            Command::Describe(target) => {
                let schema = target.schema_settings.load()?;
                let rendered = match emit_doc(&schema) {
                    Some(doc) => serde_json::to_string_pretty(&doc)?,
                    // refinements (string patterns) have no document form
                    None => serde_json::to_string_pretty(&serde_json::json!({
                        "name": schema.name(),
                        "description": schema.description(),
                        "async": schema.is_async(),
                    }))?,
                };
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &rendered)?;
                } else {
                    println!("{rendered}");
                }
                Ok(true)
            }
        }
    }
}

/// Parse every document in parallel; outcomes keep input order.
fn check_documents(schema: &Schema, documents: Vec<Document>) -> Vec<(String, Result<Value, String>)> {
    documents
        .into_par_iter()
        .map(|Document { label, value }| {
            let outcome = json_struct::parse(schema, value).map_err(|error| error.message());
            (label, outcome)
        })
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use json_struct::{array, integer, object, string};
    use serde_json::json;

    #[test]
    fn parallel_check_keeps_input_order() {
        let schema = object(|o| {
            o.field("id", integer());
            o.field("tags", array(string()));
        })
        .unwrap();
        let documents = (0..64)
            .map(|i| Document {
                label: format!("doc{i}"),
                value: Value::from(if i % 7 == 0 { json!({"id": i, "tags": [i]}) } else { json!({"id": i, "tags": []}) }),
            })
            .collect();
        let outcomes = check_documents(&schema, documents);
        assert_eq!(outcomes.len(), 64);
        for (i, (label, outcome)) in outcomes.iter().enumerate() {
            assert_eq!(label, &format!("doc{i}"));
            assert_eq!(outcome.is_err(), i % 7 == 0);
        }
        assert_eq!(
            outcomes[7].1.as_ref().unwrap_err(),
            "Failed parsing at .tags[0]. Reason: Expected string, received number"
        );
    }

    #[test]
    fn missing_pointer_targets_become_undefined() {
        let settings = InputSettings {
            ndjson: false,
            json_pointer: Some("/payload".into()),
            jq_expr: None,
            input: vec![],
        };
        let mut documents = Vec::new();
        settings.push(&mut documents, "a".into(), json!({"payload": 1})).unwrap();
        settings.push(&mut documents, "b".into(), json!({"other": 1})).unwrap();
        assert_eq!(documents[0].value, Value::from(1));
        assert!(documents[1].value.is_undefined());
    }

    #[test]
    fn literal_paths_pass_through_unglobbed() {
        let out = resolve_file_path_patterns(["plain.json"]).unwrap();
        assert_eq!(out, vec![PathBuf::from("plain.json")]);
    }
}
