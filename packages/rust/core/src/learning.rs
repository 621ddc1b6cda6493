//! The `learn` workflow: turn one link's command output into facts and
//! relationships on its operation.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use factlearn_extract::{Parser, ParserRegistry};
use factlearn_shared::{Fact, LearnError, LearningConfig, Link, Result};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::codec::decode_text;
use crate::lookup::{OperationLookup, TemplateSource, locate_one};
use crate::model::{CoOccurrenceModel, ModelBuilder};
use crate::relationships::build_relationships;
use crate::store::FactStore;

/// Outcome of a single `learn` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LearnReport {
    /// Facts yielded by all parsers, duplicates included.
    pub found: usize,
    /// Facts accepted as new for the operation.
    pub saved: usize,
    /// Link facts whose score was bumped.
    pub rescored: usize,
    /// Relationships appended to the link.
    pub relationships: usize,
    /// Parsers that failed and contributed nothing.
    pub failed_parsers: Vec<String>,
}

/// Knowledge extraction service. Holds the parser set, the co-occurrence
/// model and the operation lookup; safe to share across tasks.
pub struct LearningService {
    parsers: ParserRegistry,
    model: ModelBuilder,
    operations: Arc<dyn OperationLookup>,
    config: LearningConfig,
}

impl LearningService {
    pub fn new(
        parsers: ParserRegistry,
        templates: Arc<dyn TemplateSource>,
        operations: Arc<dyn OperationLookup>,
    ) -> Self {
        debug!(parsers = parsers.len(), "learning service created");
        Self {
            parsers,
            model: ModelBuilder::new(templates),
            operations,
            config: LearningConfig::default(),
        }
    }

    /// Override the `[learning]` settings.
    pub fn with_config(mut self, config: LearningConfig) -> Self {
        self.config = config;
        self
    }

    /// Rebuild the co-occurrence model from every known ability.
    pub async fn build_model(&self) -> Result<Arc<CoOccurrenceModel>> {
        self.model.build_model().await
    }

    /// The model relationship building currently uses.
    pub fn model(&self) -> Arc<CoOccurrenceModel> {
        self.model.current()
    }

    /// Learn from one link's base64-encoded command output.
    ///
    /// `link` identifies the execution record; the authoritative copy inside
    /// the operation's chain is the one that gets updated. Decode and lookup
    /// failures abort before anything is written.
    #[instrument(skip_all, fields(operation = %link.operation_id, link = %link.id))]
    pub async fn learn(&self, link: &Link, blob: &str) -> Result<LearnReport> {
        let text = decode_text(blob)?;
        let operation = locate_one(self.operations.as_ref(), &link.operation_id).await?;

        let (found_facts, failed_parsers) = self.extract_facts(&text);

        let mut operation = operation.lock().await;
        let mut store = FactStore::open(&mut operation, &link.id)?;

        let saved = found_facts.iter().filter(|f| store.save_fact(f)).count();
        let rescored = store.update_scores(found_facts.len() as i64);

        let model = self.model.current();
        let relationships =
            build_relationships(&model, store.link_mut(), &found_facts, &self.config.edge);

        let report = LearnReport {
            found: found_facts.len(),
            saved,
            rescored,
            relationships,
            failed_parsers,
        };
        info!(
            found = report.found,
            saved = report.saved,
            relationships = report.relationships,
            "learned from link output"
        );
        Ok(report)
    }

    /// Run every parser over `text`, in registration order. A parser that
    /// errors or panics is logged and contributes nothing; the rest proceed.
    /// Returns the facts found and the names of the parsers that failed.
    pub fn extract_facts(&self, text: &str) -> (Vec<Fact>, Vec<String>) {
        let mut found = Vec::new();
        let mut failed = Vec::new();

        for parser in self.parsers.iter() {
            match run_parser(parser, text) {
                Ok(facts) => {
                    debug!(parser = parser.name(), facts = facts.len(), "parser finished");
                    found.extend(facts.into_iter().map(|mut fact| {
                        fact.score = self.config.initial_score;
                        fact
                    }));
                }
                Err(e) => {
                    error!(parser = parser.name(), error = %e, "parser failed, skipping");
                    failed.push(parser.name().to_string());
                }
            }
        }

        (found, failed)
    }
}

/// Drain one parser completely, turning errors and panics into
/// [`LearnError::Parser`]. Nothing from a failed parser is kept.
fn run_parser(parser: &dyn Parser, text: &str) -> Result<Vec<Fact>> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        parser.parse(text).map(|facts| facts.collect::<Vec<_>>())
    }));

    match outcome {
        Ok(Ok(facts)) => Ok(facts),
        Ok(Err(e)) => Err(LearnError::parser(parser.name(), e.to_string())),
        Err(payload) => Err(LearnError::parser(
            parser.name(),
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::codec::encode_text;
    use crate::lookup::SharedOperation;
    use crate::memory::{InMemoryOperations, InMemoryTemplates};
    use factlearn_extract::FactStream;
    use factlearn_shared::{Ability, LinkId, Operation, OperationId};

    // -----------------------------------------------------------------------
    // Test parsers
    // -----------------------------------------------------------------------

    struct StaticParser {
        name: &'static str,
        facts: Vec<(&'static str, &'static str)>,
    }

    impl Parser for StaticParser {
        fn parse<'a>(&'a self, _text: &'a str) -> Result<FactStream<'a>> {
            Ok(Box::new(self.facts.iter().map(|(t, v)| Fact::new(*t, *v))))
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    struct FailingParser;

    impl Parser for FailingParser {
        fn parse<'a>(&'a self, _text: &'a str) -> Result<FactStream<'a>> {
            Err(LearnError::parser("broken", "cannot read output"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct PanickingParser;

    impl Parser for PanickingParser {
        fn parse<'a>(&'a self, _text: &'a str) -> Result<FactStream<'a>> {
            Ok(Box::new(
                [Fact::new("host.name", "half")]
                    .into_iter()
                    .chain(std::iter::once_with(|| -> Fact { panic!("parser bug") })),
            ))
        }

        fn name(&self) -> &str {
            "boom"
        }
    }

    fn yields(name: &'static str, facts: &[(&'static str, &'static str)]) -> Box<dyn Parser> {
        Box::new(StaticParser {
            name,
            facts: facts.to_vec(),
        })
    }

    // -----------------------------------------------------------------------
    // Fixture
    // -----------------------------------------------------------------------

    fn ability(id: &str, command: &str) -> Ability {
        Ability {
            ability_id: id.into(),
            technique_id: "T1082".into(),
            test: encode_text(command),
        }
    }

    struct Fixture {
        service: LearningService,
        operation: SharedOperation,
        link: Link,
    }

    async fn fixture(parsers: Vec<Box<dyn Parser>>) -> Fixture {
        let templates = Arc::new(InMemoryTemplates::new(vec![
            ability("discover", "hostname #{host.name} && ip #{host.ip}"),
            ability("whoami", "whoami"),
        ]));
        let operations = Arc::new(InMemoryOperations::new());

        let mut op = Operation::new("op");
        let link = Link::new(op.id, "paw-1", ability("whoami", "whoami"));
        op.add_link(link.clone());
        let operation = operations.insert(op);

        let registry = ParserRegistry::with_parsers(parsers).expect("registry");
        let service = LearningService::new(registry, templates, operations);
        service.build_model().await.expect("model");

        Fixture {
            service,
            operation,
            link,
        }
    }

    fn host_parser() -> Box<dyn Parser> {
        yields("host", &[("host.name", "box1"), ("host.ip", "10.0.0.1")])
    }

    fn output() -> String {
        encode_text("box1 10.0.0.1")
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn learns_facts_and_relationship() {
        let f = fixture(vec![host_parser()]).await;
        assert!(f.service.model().contains_group(&["host.name", "host.ip"]));

        let report = f.service.learn(&f.link, &output()).await.expect("learn");
        assert_eq!(report.found, 2);
        assert_eq!(report.saved, 2);
        assert_eq!(report.relationships, 1);
        assert!(report.failed_parsers.is_empty());

        let op = f.operation.lock().await;
        assert_eq!(op.all_facts().count(), 2);

        let link = op.link(&f.link.id).expect("link");
        let rel = &link.relationships[0];
        assert_eq!(rel.edge, "has");
        assert_eq!(rel.source.trait_name, "host.name");
        assert_eq!(rel.target.trait_name, "host.ip");

        // saved facts are on the link when scores are bumped
        assert!(link.facts.iter().all(|f| f.score == 3));
        assert!(link.facts.iter().all(|f| f.collected_by.as_deref() == Some("paw-1")));
    }

    #[tokio::test]
    async fn relearning_rescores_without_duplicating() {
        let f = fixture(vec![host_parser()]).await;
        f.service.learn(&f.link, &output()).await.expect("first");
        let report = f.service.learn(&f.link, &output()).await.expect("second");

        assert_eq!(report.saved, 0);
        assert_eq!(report.rescored, 2);
        // relationships come from everything found, not only new facts
        assert_eq!(report.relationships, 1);

        let op = f.operation.lock().await;
        assert_eq!(op.all_facts().count(), 2);
        assert!(op.all_facts().all(|f| f.score == 5));
        assert_eq!(op.link(&f.link.id).expect("link").relationships.len(), 2);
    }

    #[tokio::test]
    async fn increment_counts_rejected_duplicates() {
        let f = fixture(vec![yields(
            "mixed",
            &[
                ("host.name", "box1"),
                ("host.ip", "10.0.0.1"),
                ("host.user", "root"),
            ],
        )])
        .await;

        let other = {
            let mut op = f.operation.lock().await;
            let mut other = Link::new(op.id, "paw-2", ability("ip", "ip addr"));
            other.facts.push(Fact::new("host.ip", "10.0.0.1"));
            op.add_link(other)
        };

        let report = f.service.learn(&f.link, &output()).await.expect("learn");
        assert_eq!(report.found, 3);
        assert_eq!(report.saved, 2);
        assert_eq!(report.relationships, 1);

        let op = f.operation.lock().await;
        assert_eq!(op.all_facts().count(), 3);
        let link = op.link(&f.link.id).expect("link");
        assert!(link.facts.iter().all(|f| f.score == 4));
        assert_eq!(op.link(&other).expect("other").facts[0].score, 1);
    }

    #[tokio::test]
    async fn failing_parsers_are_isolated() {
        let f = fixture(vec![
            Box::new(FailingParser) as Box<dyn Parser>,
            Box::new(PanickingParser),
            yields("good", &[("host.user", "root")]),
        ])
        .await;

        let report = f.service.learn(&f.link, &output()).await.expect("learn");
        assert_eq!(report.failed_parsers, vec!["broken", "boom"]);
        assert_eq!(report.found, 1);

        let op = f.operation.lock().await;
        let values: Vec<_> = op.all_facts().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["root"]);
    }

    #[tokio::test]
    async fn facts_keep_parser_then_yield_order() {
        let f = fixture(vec![
            yields("first", &[("a", "1"), ("b", "2")]),
            yields("second", &[("c", "3")]),
        ])
        .await;
        let (facts, failed) = f.service.extract_facts("ignored");
        let values: Vec<_> = facts.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn learning_config_sets_edge_and_starting_score() {
        let f = fixture(vec![host_parser()]).await;
        let service = f.service.with_config(LearningConfig {
            edge: "uses".into(),
            initial_score: 10,
        });

        service.learn(&f.link, &output()).await.expect("learn");
        let op = f.operation.lock().await;
        let link = op.link(&f.link.id).expect("link");
        assert_eq!(link.relationships[0].edge, "uses");
        assert!(link.facts.iter().all(|f| f.score == 12));
    }

    struct ScoringParser;

    impl Parser for ScoringParser {
        fn parse<'a>(&'a self, _text: &'a str) -> Result<FactStream<'a>> {
            Ok(Box::new(std::iter::once(
                Fact::new("host.name", "box1").with_score(50),
            )))
        }

        fn name(&self) -> &str {
            "scoring"
        }
    }

    #[tokio::test]
    async fn parser_scores_are_replaced_by_initial_score() {
        let f = fixture(vec![Box::new(ScoringParser) as Box<dyn Parser>]).await;
        let (facts, _) = f.service.extract_facts("ignored");
        assert_eq!(facts[0].score, 1);

        f.service.learn(&f.link, &output()).await.expect("learn");
        let op = f.operation.lock().await;
        assert_eq!(op.all_facts().map(|f| f.score).collect::<Vec<_>>(), vec![2]);
    }

    // -----------------------------------------------------------------------
    // Fatal errors leave state untouched
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_operation_is_a_lookup_error() {
        let f = fixture(vec![host_parser()]).await;
        let mut stray = f.link.clone();
        stray.operation_id = OperationId::new();

        let err = f.service.learn(&stray, &output()).await.err().expect("error");
        assert!(matches!(err, LearnError::Lookup { .. }));

        let op = f.operation.lock().await;
        assert_eq!(op.all_facts().count(), 0);
        assert!(op.link(&f.link.id).expect("link").relationships.is_empty());
    }

    #[tokio::test]
    async fn link_outside_chain_is_a_lookup_error() {
        let f = fixture(vec![host_parser()]).await;
        let mut stray = f.link.clone();
        stray.id = LinkId::new();

        let err = f.service.learn(&stray, &output()).await.err().expect("error");
        assert!(matches!(err, LearnError::Lookup { .. }));
        assert_eq!(f.operation.lock().await.all_facts().count(), 0);
    }

    #[tokio::test]
    async fn undecodable_output_is_a_decode_error() {
        let f = fixture(vec![host_parser()]).await;

        let err = f.service.learn(&f.link, "!!not base64!!").await.err().expect("error");
        assert!(matches!(err, LearnError::Decode { .. }));
        assert_eq!(f.operation.lock().await.all_facts().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_learns_keep_facts_unique() {
        let f = fixture(vec![host_parser()]).await;

        let links: Vec<Link> = {
            let mut op = f.operation.lock().await;
            (0..8)
                .map(|i| {
                    let link = Link::new(op.id, format!("paw-{i}"), ability("whoami", "whoami"));
                    op.add_link(link.clone());
                    link
                })
                .collect()
        };

        let service = Arc::new(f.service);
        let tasks: Vec<_> = links
            .into_iter()
            .map(|link| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.learn(&link, &output()).await })
            })
            .collect();

        let mut saved = 0;
        for task in tasks {
            saved += task.await.expect("join").expect("learn").saved;
        }
        assert_eq!(saved, 2);

        let op = f.operation.lock().await;
        let keys: HashSet<_> = op.all_facts().map(Fact::unique).collect();
        assert_eq!(keys.len(), op.all_facts().count());
        assert_eq!(keys.len(), 2);
    }
}
