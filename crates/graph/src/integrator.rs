//! Loads a validated dataset into Neo4j.
//!
//! Nodes first, label by label, then relationships. Every statement is
//! a MERGE keyed on identity, so re-running the same load changes
//! nothing. Relationship statements match both endpoints and never
//! create them.

use neo4rs::{BoltList, BoltType, Graph, Query};
use tracing::{info, warn};

use crate::bolt;
use crate::config::GraphConfig;
use crate::dataset::GraphDataset;
use crate::error::GraphError;
use crate::verify::{VerificationReport, NODE_LABELS, RELATIONSHIP_TYPES};

const SCHEMA_STATEMENTS: [&str; 14] = [
    "CREATE CONSTRAINT drug_atc_code IF NOT EXISTS FOR (n:Drug) REQUIRE n.atc_code IS UNIQUE",
    "CREATE CONSTRAINT disease_kcd_code IF NOT EXISTS FOR (n:Disease) REQUIRE n.kcd_code IS UNIQUE",
    "CREATE CONSTRAINT biomarker_id IF NOT EXISTS FOR (n:Biomarker) REQUIRE n.biomarker_id IS UNIQUE",
    "CREATE CONSTRAINT test_id IF NOT EXISTS FOR (n:Test) REQUIRE n.test_id IS UNIQUE",
    "CREATE CONSTRAINT cancer_id IF NOT EXISTS FOR (n:Cancer) REQUIRE n.cancer_id IS UNIQUE",
    "CREATE CONSTRAINT law_id IF NOT EXISTS FOR (n:Law) REQUIRE n.law_id IS UNIQUE",
    "CREATE CONSTRAINT article_id IF NOT EXISTS FOR (n:Article) REQUIRE n.article_id IS UNIQUE",
    "CREATE INDEX drug_ingredient_en IF NOT EXISTS FOR (n:Drug) ON (n.ingredient_en)",
    "CREATE INDEX disease_name_kr IF NOT EXISTS FOR (n:Disease) ON (n.name_kr)",
    "CREATE INDEX biomarker_name_en IF NOT EXISTS FOR (n:Biomarker) ON (n.name_en)",
    "CREATE INDEX test_edi_code IF NOT EXISTS FOR (n:Test) ON (n.edi_code)",
    "CREATE INDEX cancer_name_kr IF NOT EXISTS FOR (n:Cancer) ON (n.name_kr)",
    "CREATE INDEX law_name IF NOT EXISTS FOR (n:Law) ON (n.law_name)",
    "CREATE INDEX article_law_id IF NOT EXISTS FOR (n:Article) ON (n.law_id)",
];

pub struct GraphIntegrator {
    graph: Graph,
    batch_size: usize,
}

impl GraphIntegrator {
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let graph = Graph::new(
            config.uri.as_str(),
            config.user.as_str(),
            config.password.as_str(),
        )
        .await?;
        Ok(Self {
            graph,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn new(graph: Graph, batch_size: usize) -> Self {
        Self {
            graph,
            batch_size: batch_size.max(1),
        }
    }

    /// Validates, optionally clears, then loads the whole dataset and
    /// verifies the result.
    pub async fn run(
        &self,
        clear_db: bool,
        dataset: &GraphDataset,
    ) -> Result<VerificationReport, GraphError> {
        dataset.validate()?;

        if clear_db {
            info!("clearing existing graph");
            self.statement("MATCH (n) DETACH DELETE n").await?;
        }

        self.init_schema().await?;
        self.load_nodes(dataset).await?;
        self.load_relationships(dataset).await?;
        self.verify(dataset).await
    }

    async fn init_schema(&self) -> Result<(), GraphError> {
        for statement in SCHEMA_STATEMENTS {
            self.statement(statement).await?;
        }
        info!("constraints and indexes in place");
        Ok(())
    }

    async fn load_nodes(&self, dataset: &GraphDataset) -> Result<(), GraphError> {
        self.load_label("Drug", "atc_code", bolt::drug_rows(&dataset.drugs)).await?;
        self.load_label("Disease", "kcd_code", bolt::disease_rows(&dataset.diseases)).await?;
        self.load_label("Biomarker", "biomarker_id", bolt::biomarker_rows(&dataset.biomarkers))
            .await?;
        self.load_label("Test", "test_id", bolt::test_rows(&dataset.tests)).await?;
        self.load_label("Cancer", "cancer_id", bolt::cancer_rows(&dataset.cancers)).await?;
        self.load_label("Law", "law_id", bolt::law_rows(&dataset.laws)).await?;
        self.load_label("Article", "article_id", bolt::article_rows(&dataset.articles)).await?;
        Ok(())
    }

    async fn load_relationships(&self, dataset: &GraphDataset) -> Result<(), GraphError> {
        self.load_edges(
            edge_statement("HAS_BIOMARKER", ("Disease", "kcd_code"), ("Biomarker", "biomarker_id"), None),
            bolt::has_biomarker_rows(&dataset.has_biomarker),
        )
        .await?;
        self.load_edges(
            edge_statement("HAS_BIOMARKER", ("Cancer", "cancer_id"), ("Biomarker", "biomarker_id"), None),
            bolt::cancer_biomarker_rows(&dataset.cancer_biomarkers),
        )
        .await?;
        self.load_edges(
            edge_statement("TESTED_BY", ("Biomarker", "biomarker_id"), ("Test", "test_id"), None),
            bolt::tested_by_rows(&dataset.tested_by),
        )
        .await?;
        self.load_edges(
            edge_statement("TARGETS", ("Drug", "atc_code"), ("Biomarker", "biomarker_id"), None),
            bolt::targets_rows(&dataset.targets),
        )
        .await?;
        self.load_edges(
            edge_statement("INDICATED_FOR", ("Drug", "atc_code"), ("Cancer", "cancer_id"), None),
            bolt::indicated_for_rows(&dataset.indicated_for),
        )
        .await?;
        self.load_edges(
            edge_statement("CANCER_TYPE", ("Disease", "kcd_code"), ("Cancer", "cancer_id"), None),
            bolt::cancer_type_rows(&dataset.cancer_types),
        )
        .await?;
        self.load_edges(
            edge_statement("IS_A", ("Disease", "kcd_code"), ("Disease", "kcd_code"), None),
            bolt::is_a_rows(&dataset.is_a),
        )
        .await?;
        self.load_edges(
            edge_statement("HAS_CHILD", ("Article", "article_id"), ("Article", "article_id"), None),
            bolt::has_child_rows(&dataset.articles),
        )
        .await?;
        self.load_edges(
            edge_statement(
                "REFERS_TO",
                ("Article", "article_id"),
                ("Article", "article_id"),
                Some("reference_type"),
            ),
            bolt::reference_rows(&dataset.references, false),
        )
        .await?;
        self.load_edges(
            edge_statement(
                "CROSS_LAW_REFERS_TO",
                ("Article", "article_id"),
                ("Article", "article_id"),
                Some("reference_type"),
            ),
            bolt::reference_rows(&dataset.references, true),
        )
        .await?;
        Ok(())
    }

    async fn load_label(
        &self,
        label: &str,
        key: &str,
        rows: Vec<BoltType>,
    ) -> Result<(), GraphError> {
        if rows.is_empty() {
            return Ok(());
        }
        let statement = node_statement(label, key);
        let total = rows.len();
        for chunk in rows.chunks(self.batch_size) {
            self.batch(&statement, chunk).await?;
        }
        info!(label, rows = total, "nodes loaded");
        Ok(())
    }

    async fn load_edges(&self, statement: String, rows: Vec<BoltType>) -> Result<(), GraphError> {
        if rows.is_empty() {
            return Ok(());
        }
        let total = rows.len();
        for chunk in rows.chunks(self.batch_size) {
            self.batch(&statement, chunk).await?;
        }
        info!(rows = total, "relationships loaded");
        Ok(())
    }

    async fn batch(&self, statement: &str, chunk: &[BoltType]) -> Result<(), GraphError> {
        let mut rows = BoltList::new();
        for row in chunk {
            rows.push(row.clone());
        }
        let query = Query::new(statement.to_string()).param("rows", BoltType::List(rows));
        self.graph.run(query).await?;
        Ok(())
    }

    async fn statement(&self, statement: &str) -> Result<(), GraphError> {
        self.graph.run(Query::new(statement.to_string())).await?;
        Ok(())
    }

    /// Reads back per-label and per-type counts. A relationship type
    /// that had input rows but shows zero edges fails the run.
    pub async fn verify(&self, dataset: &GraphDataset) -> Result<VerificationReport, GraphError> {
        let mut report = VerificationReport::default();

        for label in NODE_LABELS {
            let count = self
                .count(&format!("MATCH (n:{label}) RETURN count(n) AS count"))
                .await?;
            report.node_counts.insert(label.to_string(), count);
        }
        for rel_type in RELATIONSHIP_TYPES {
            let count = self
                .count(&format!("MATCH ()-[r:{rel_type}]->() RETURN count(r) AS count"))
                .await?;
            report.relationship_counts.insert(rel_type.to_string(), count);
        }

        for (rel_type, input_rows) in dataset.relationship_row_counts() {
            let loaded = report.relationship_counts.get(rel_type).copied().unwrap_or(0);
            if input_rows > 0 && loaded == 0 {
                return Err(GraphError::Verification(format!(
                    "{rel_type} had {input_rows} input rows but no edges were created"
                )));
            }
            if input_rows == 0 && loaded > 0 {
                warn!(rel_type, loaded, "edges present without input rows");
            }
        }

        info!(
            nodes = report.total_nodes(),
            relationships = report.total_relationships(),
            "graph verified"
        );
        Ok(report)
    }

    async fn count(&self, statement: &str) -> Result<i64, GraphError> {
        let mut result = self.graph.execute(Query::new(statement.to_string())).await?;
        if let Some(row) = result.next().await? {
            Ok(row.get::<i64>("count").unwrap_or(0))
        } else {
            Ok(0)
        }
    }
}

fn node_statement(label: &str, key: &str) -> String {
    format!("UNWIND $rows AS row MERGE (n:{label} {{{key}: row.{key}}}) SET n += row")
}

fn edge_statement(
    rel_type: &str,
    from: (&str, &str),
    to: (&str, &str),
    merge_prop: Option<&str>,
) -> String {
    let merge = match merge_prop {
        Some(prop) => format!(" {{{prop}: row.props.{prop}}}"),
        None => String::new(),
    };
    format!(
        "UNWIND $rows AS row \
         MATCH (a:{} {{{}: row.from}}) \
         MATCH (b:{} {{{}: row.to}}) \
         MERGE (a)-[r:{rel_type}{merge}]->(b) SET r += row.props",
        from.0, from.1, to.0, to.1
    )
}
