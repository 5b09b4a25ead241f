//! Stage runner for the knowledge-graph build.
//!
//! `pipeline parse` digitizes every downloaded document that has no
//! parsed JSON yet; `pipeline load` reads the tabular outputs and parsed
//! statutes, resolves cross-domain links, and loads the graph store.
//! Paths come from `PIPELINE_*` environment variables, with `data/`
//! defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use docparse::{
    DocParseError, DocumentSplitter, Element, ParsedDocument, ParserClient, ParserConfig,
    SplitConfig,
};
use extract::schema::{Article, Biomarker, Law};
use extract::{vocabulary, ArticleParser};
use graph::{GraphConfig, GraphDataset, GraphIntegrator};
use resolve::ArticleIndex;

mod tables;

const MAX_FAILURE_SAMPLES: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let Some(stage) = std::env::args().nth(1) else {
        bail!("usage: pipeline <parse|load>");
    };
    match stage.as_str() {
        "parse" => run_parse().await,
        "load" => run_load().await,
        other => bail!("unknown stage '{other}', expected parse or load"),
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_flag(var: &str) -> bool {
    std::env::var(var)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct FailureBucket {
    count: usize,
    samples: Vec<String>,
}

/// Failure counts per kind, keeping at most `MAX_FAILURE_SAMPLES`
/// sample inputs each.
#[derive(Debug, Default)]
struct FailureTally {
    buckets: BTreeMap<String, FailureBucket>,
}

impl FailureTally {
    fn record(&mut self, kind: &str, sample: &str) {
        let bucket = self.buckets.entry(kind.to_string()).or_default();
        bucket.count += 1;
        if bucket.samples.len() < MAX_FAILURE_SAMPLES {
            bucket.samples.push(sample.to_string());
        }
    }

    fn total(&self) -> usize {
        self.buckets.values().map(|b| b.count).sum()
    }

    fn log(&self, stage: &str) {
        for (kind, bucket) in &self.buckets {
            warn!(
                stage,
                kind = %kind,
                count = bucket.count,
                samples = ?bucket.samples,
                "stage failures"
            );
        }
    }
}

fn failure_kind(err: &DocParseError) -> &'static str {
    match err {
        DocParseError::UnsupportedFormat(_) => "unsupported_format",
        DocParseError::FileTooLarge { .. } => "file_too_large",
        DocParseError::TooManyPages { .. } => "too_many_pages",
        DocParseError::RateLimited | DocParseError::Transient { .. } => "transient",
        DocParseError::Rejected { .. } => "rejected",
        DocParseError::Pdf(_) => "pdf",
        DocParseError::Json(_) => "json",
        DocParseError::Io(_) => "io",
    }
}

/// Digitizes downloads into parsed JSON files, one per document.
/// Existing outputs are skipped, so a rerun only touches new files.
async fn run_parse() -> Result<()> {
    let downloads = env_path("PIPELINE_DOWNLOADS_DIR", "data/downloads");
    let parsed_dir = env_path("PIPELINE_PARSED_DIR", "data/parsed");
    tokio::fs::create_dir_all(&parsed_dir)
        .await
        .with_context(|| format!("Failed to create {}", parsed_dir.display()))?;

    let config = ParserConfig::from_env()?;
    let client = ParserClient::new(config)?;
    let split = match std::env::var("PIPELINE_SPLIT_PROFILE").as_deref() {
        Ok("text") => SplitConfig::text(),
        _ => SplitConfig::tables(),
    };
    let splitter = DocumentSplitter::new(client, split);

    let mut documents: Vec<PathBuf> = WalkDir::new(&downloads)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    documents.sort();
    info!(dir = %downloads.display(), files = documents.len(), "parse stage started");

    let mut parsed = 0usize;
    let mut skipped = 0usize;
    let mut incomplete = 0usize;
    let mut failures = FailureTally::default();

    for path in &documents {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            failures.record("unnamed", &path.display().to_string());
            continue;
        };
        let output = parsed_dir.join(format!("{stem}.json"));
        if output.exists() {
            skipped += 1;
            continue;
        }

        match splitter.parse_document(path).await {
            Ok(document) => {
                if !document.is_complete() {
                    incomplete += 1;
                    warn!(
                        file = %path.display(),
                        chunks_failed = document.chunks_failed,
                        "document parsed with missing page ranges"
                    );
                }
                let json = serde_json::to_string_pretty(&document)?;
                tokio::fs::write(&output, json)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                parsed += 1;
            }
            Err(err) => {
                error!(file = %path.display(), error = %err, "document parse failed");
                failures.record(failure_kind(&err), &path.display().to_string());
            }
        }
    }

    failures.log("parse");
    info!(
        total = documents.len(),
        parsed,
        skipped,
        incomplete,
        failed = failures.total(),
        "parse stage finished"
    );
    Ok(())
}

/// Layout elements carry plain text; the merged content may be table
/// markup when the parse requested HTML.
fn document_text(elements: &[Element], content: &str) -> String {
    if elements.is_empty() {
        return content.to_string();
    }
    elements
        .iter()
        .map(|e| e.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits each law's parsed document into article records.
async fn parse_statutes(laws: &[Law], parsed_dir: &Path) -> Result<Vec<Article>> {
    let parser = ArticleParser::new();
    let mut articles = Vec::new();
    for law in laws {
        let path = parsed_dir.join(format!("{}.json", law.law_id));
        if !path.exists() {
            warn!(law = %law.law_id, path = %path.display(), "no parsed document for law");
            continue;
        }
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let document: ParsedDocument = serde_json::from_str(&json)
            .with_context(|| format!("Malformed parsed document {}", path.display()))?;
        let text = document_text(&document.elements, &document.content);
        let parsed = parser.parse(&law.law_id, &text);
        info!(law = %law.law_id, articles = parsed.len(), "statute split into articles");
        articles.extend(parsed);
    }
    Ok(articles)
}

/// Curated marker nodes. Ids come from the same derivation the
/// resolvers use, so every edge record lands on an existing node.
fn biomarker_nodes() -> Vec<Biomarker> {
    vocabulary::biomarkers()
        .iter()
        .map(|def| Biomarker {
            biomarker_id: def.entity_id(),
            name_en: def.name.to_string(),
            name_ko: def.korean_forms.first().copied().unwrap_or(def.name).to_string(),
            biomarker_type: def.kind,
            gene: def.gene.to_string(),
            kcd_codes: def.kcd_codes.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

async fn write_report<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

/// Reads tables and parsed statutes, resolves links, and loads the
/// graph store. The unresolved-reference report is written before the
/// store is touched.
async fn run_load() -> Result<()> {
    let tables_dir = env_path("PIPELINE_TABLES_DIR", "data/tables");
    let parsed_dir = env_path("PIPELINE_PARSED_DIR", "data/parsed");
    let reports_dir = env_path("PIPELINE_REPORTS_DIR", "data/reports");
    tokio::fs::create_dir_all(&reports_dir)
        .await
        .with_context(|| format!("Failed to create {}", reports_dir.display()))?;

    let drugs = tables::read_drugs(&tables_dir.join("drugs.csv"))?;
    let diseases = tables::read_diseases(&tables_dir.join("diseases.csv"))?;
    let mut tests = tables::read_tests(&tables_dir.join("tests.csv"))?;
    let cancers = tables::read_cancers(&tables_dir.join("cancers.csv"))?;
    let laws = tables::read_laws(&tables_dir.join("laws.csv"))?;

    let articles = parse_statutes(&laws, &parsed_dir).await?;
    let biomarkers = biomarker_nodes();

    let tested_by = resolve::test_match::resolve_tests(&mut tests);
    let has_biomarker = resolve::disease_match::link_diseases(&diseases);
    let is_a = resolve::hierarchy::link_disease_hierarchy(&diseases);
    let cancer_types = resolve::cancer_match::link_cancer_types(&diseases, &cancers);
    let cancer_biomarkers = resolve::cancer_match::link_cancer_biomarkers(&cancers);
    let targets = resolve::drug_match::link_targets(&drugs);
    let indicated_for = resolve::drug_match::link_indications(&drugs, &cancers);

    let index = ArticleIndex::build(&laws, &articles);
    let resolution = index.resolve_references(&articles);
    info!(
        resolved = resolution.resolved.len(),
        unresolved = resolution.unresolved.len(),
        "statute references resolved"
    );
    for miss in resolution.unresolved.iter().take(MAX_FAILURE_SAMPLES) {
        warn!(
            article = %miss.source_article_id,
            raw = %miss.raw,
            reason = %miss.reason,
            "unresolved reference"
        );
    }
    write_report(
        &reports_dir.join("unresolved_references.json"),
        &resolution.unresolved,
    )
    .await?;

    let dataset = GraphDataset {
        drugs,
        diseases,
        biomarkers,
        tests,
        cancers,
        laws,
        articles,
        has_biomarker,
        cancer_biomarkers,
        tested_by,
        targets,
        indicated_for,
        cancer_types,
        is_a,
        references: resolution.resolved,
    };
    info!(
        drugs = dataset.drugs.len(),
        diseases = dataset.diseases.len(),
        biomarkers = dataset.biomarkers.len(),
        tests = dataset.tests.len(),
        cancers = dataset.cancers.len(),
        laws = dataset.laws.len(),
        articles = dataset.articles.len(),
        "dataset assembled"
    );
    for (rel_type, rows) in dataset.relationship_row_counts() {
        info!(rel_type, rows, "relationship rows prepared");
    }

    let config = GraphConfig::from_env();
    let integrator = GraphIntegrator::connect(&config).await?;
    let report = integrator.run(env_flag("PIPELINE_CLEAR_DB"), &dataset).await?;
    write_report(&reports_dir.join("verification_report.json"), &report).await?;

    info!(
        nodes = report.total_nodes(),
        relationships = report.total_relationships(),
        "load stage finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_tally_caps_samples_per_kind() {
        let mut tally = FailureTally::default();
        for i in 0..15 {
            tally.record("transient", &format!("file-{i}.pdf"));
        }
        tally.record("rejected", "bad.pdf");

        let bucket = tally.buckets.get("transient").unwrap();
        assert_eq!(bucket.count, 15);
        assert_eq!(bucket.samples.len(), MAX_FAILURE_SAMPLES);
        assert_eq!(tally.total(), 16);
    }

    #[test]
    fn test_failure_kinds_group_transient_errors() {
        assert_eq!(failure_kind(&DocParseError::RateLimited), "transient");
        assert_eq!(
            failure_kind(&DocParseError::Transient {
                reason: "connection reset".into()
            }),
            "transient"
        );
        assert_eq!(
            failure_kind(&DocParseError::UnsupportedFormat("zip".into())),
            "unsupported_format"
        );
    }

    #[test]
    fn test_document_text_prefers_element_text() {
        let elements = vec![
            Element {
                category: "heading".into(),
                page: 1,
                text: "제1조(목적)".into(),
                coordinates: None,
            },
            Element {
                category: "paragraph".into(),
                page: 1,
                text: "이 법은 다음을 목적으로 한다.".into(),
                coordinates: None,
            },
        ];
        let text = document_text(&elements, "<p>markup</p>");
        assert_eq!(text, "제1조(목적)\n이 법은 다음을 목적으로 한다.");
    }

    #[test]
    fn test_document_text_falls_back_to_content() {
        assert_eq!(document_text(&[], "plain body"), "plain body");
    }

    #[test]
    fn test_biomarker_nodes_use_resolver_ids() {
        let nodes = biomarker_nodes();
        assert_eq!(nodes.len(), vocabulary::biomarkers().len());

        let her2 = vocabulary::find_by_name("HER2").unwrap();
        assert!(nodes.iter().any(|n| n.biomarker_id == her2.entity_id()));

        let ids: std::collections::HashSet<_> =
            nodes.iter().map(|n| n.biomarker_id.clone()).collect();
        assert_eq!(ids.len(), nodes.len());
    }

    #[test]
    fn test_env_path_falls_back_to_default() {
        assert_eq!(
            env_path("PIPELINE_UNSET_FOR_TEST", "data/parsed"),
            PathBuf::from("data/parsed")
        );
    }
}
