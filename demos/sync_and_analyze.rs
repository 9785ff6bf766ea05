//! End-to-end demo: mirror a small upstream corpus with [`SyncEngine`], then
//! run [`AnalysisOrchestrator`] over the mirrored documents and print the
//! duplicate groups it finds.
//!
//! Uses [`MockUpstreamClient`] so the demo runs with no network access; a
//! real deployment would build a [`ReqwestUpstreamClient`] from a loaded
//! [`dupehound::config::DupehoundConfig`] instead.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use dupehound::{
    AnalysisOptions, AnalysisOrchestrator, DedupConfig, InMemoryStore, NullProgress, SyncConfig,
    SyncEngine, SyncNullProgress,
};
use upstream_client::mock::MockUpstreamClient;
use upstream_client::model::UpstreamDocument;

fn sample_document(id: i64, title: &str, content: &str) -> UpstreamDocument {
    UpstreamDocument {
        id,
        title: title.to_string(),
        content: content.to_string(),
        tags: vec![],
        correspondent: None,
        document_type: None,
        created: Some(Utc::now()),
        modified: Some(Utc::now()),
        added: Some(Utc::now()),
        original_file_name: Some(format!("{title}.pdf")),
    }
}

fn repeated_paragraph(seed: &str) -> String {
    let paragraph = format!(
        "{seed} the quick brown fox jumps over the lazy dog near the riverbank \
         while the autumn leaves drift slowly across the quiet courtyard each morning"
    );
    vec![paragraph; 4].join(" ")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let corpus = vec![
        sample_document(1, "invoice-march", &repeated_paragraph("march invoice")),
        sample_document(2, "invoice-march-copy", &repeated_paragraph("march invoice")),
        sample_document(3, "contract-renewal", "a short contract renewal notice with unrelated text"),
    ];

    let client = Arc::new(MockUpstreamClient::new(corpus));
    let store = Arc::new(InMemoryStore::new());

    let sync_engine = SyncEngine::new(client.clone(), store.clone());
    let sync_result = sync_engine
        .run(&SyncConfig::default(), &SyncNullProgress)
        .await?;
    info!(
        inserted = sync_result.inserted,
        updated = sync_result.updated,
        skipped = sync_result.skipped,
        "sync complete"
    );

    let orchestrator = AnalysisOrchestrator::new(store.clone());
    let analysis_result = orchestrator.run(&DedupConfig::default(), AnalysisOptions::default(), &NullProgress)?;

    println!(
        "analyzed {} documents, generated {} signatures, found {} duplicate groups",
        analysis_result.documents_analyzed,
        analysis_result.signatures_generated,
        analysis_result.groups_created
    );

    for group in store.list_groups()? {
        println!(
            "group {} (confidence={:.3}): {:?}",
            group.group.id,
            group.group.confidence_score,
            group.members.iter().map(|m| m.document_id.clone()).collect::<Vec<_>>()
        );
    }

    Ok(())
}
