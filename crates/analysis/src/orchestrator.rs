//! The ten-stage analysis orchestrator: loads documents, generates or
//! reuses MinHash signatures, builds a fresh LSH index, enumerates and
//! scores candidate pairs, forms groups via union-find, and atomically
//! reconciles them against the existing group set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use lsh::{LshConfig, LshIndex};
use minhash::MinHasher;
use scoring::{PairScore, ScoringPayload};
use store::{Document, DuplicateGroup, DuplicateGroupMember, GroupWithMembers, Store};
use unionfind::UnionFind;

use crate::config::{AnalysisOptions, DedupConfig, SCORING_BATCH_SIZE};
use crate::error::AnalysisError;
use crate::progress::ProgressObserver;
use crate::result::AnalysisResult;

/// Deterministic seed for the signature hasher: every analysis run over
/// the same corpus and `num_permutations` must derive bit-identical
/// MinHash permutation families (see `minhash::MinHasher`).
const SIGNATURE_SEED: u64 = 0xD0C5_EED0_0000_0001;

pub struct AnalysisOrchestrator<S> {
    store: Arc<S>,
}

impl<S: Store + 'static> AnalysisOrchestrator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, config, options, progress))]
    pub fn run(
        &self,
        config: &DedupConfig,
        options: AnalysisOptions,
        progress: &dyn ProgressObserver,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        progress.on_progress(0.0);

        // Stage 2 — load documents.
        let all_docs = self.store.list_documents(false)?;
        if all_docs.is_empty() {
            progress.on_progress(1.0);
            return Ok(AnalysisResult {
                duration_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            });
        }

        let docs_by_id: HashMap<String, Document> =
            all_docs.iter().map(|d| (d.id.clone(), d.clone())).collect();

        let docs_to_process: Vec<&Document> = if options.force {
            all_docs.iter().collect()
        } else {
            all_docs
                .iter()
                .filter(|d| matches!(d.processing_status, store::ProcessingStatus::Pending))
                .collect()
        };

        progress.on_progress(0.10);

        // Stage 3 — signatures.
        let hasher = MinHasher::new(config.num_permutations, SIGNATURE_SEED);
        let mut signatures_generated = 0u64;
        let mut signatures_reused = 0u64;
        let mut newly_generated_ids: Vec<String> = Vec::new();

        for doc in &docs_to_process {
            let existing = self.store.get_signature(&doc.id)?;
            if let Some(existing) = &existing {
                if existing.num_permutations == config.num_permutations {
                    signatures_reused += 1;
                    continue;
                }
            }

            let Some(content) = self.store.get_content(&doc.id)? else {
                warn!(document_id = %doc.id, "document has no content, skipping signature generation");
                continue;
            };

            let Some(shingles) = textnorm::shingle(&content.normalized_text, config.ngram_size, config.min_words) else {
                // DocumentTooShort: not an error, no signature written.
                continue;
            };

            let sig = hasher.signature(&shingles);
            self.store.save_signature(&store::DocumentSignature {
                document_id: doc.id.clone(),
                minhash_signature: minhash::to_bytes(&sig),
                algorithm_version: config.algorithm_version.clone(),
                num_permutations: config.num_permutations,
                created_at: Utc::now(),
            })?;
            signatures_generated += 1;
            newly_generated_ids.push(doc.id.clone());
        }

        progress.on_progress(0.40);

        // Stage 4 — build a fresh LSH index from every compatible signature.
        let all_signatures = self.store.list_signatures(config.num_permutations)?;
        let mut signature_words: HashMap<String, Vec<u32>> = HashMap::with_capacity(all_signatures.len());
        let lsh_config = LshConfig::new(config.num_bands);
        let index = LshIndex::new(lsh_config, config.num_permutations)?;
        for row in &all_signatures {
            let words = minhash::from_bytes(&row.minhash_signature).unwrap_or_else(|_| {
                warn!(document_id = %row.document_id, "corrupt signature bytes, treating as empty");
                vec![u32::MAX; config.num_permutations]
            });
            index.insert(&row.document_id, &words);
            signature_words.insert(row.document_id.clone(), words);
        }

        progress.on_progress(0.45);

        // Stage 5 — candidate enumeration, deduplicated by canonical pair key.
        let search_scope: Vec<String> = if options.force {
            signature_words.keys().cloned().collect()
        } else {
            docs_to_process
                .iter()
                .map(|d| d.id.clone())
                .filter(|id| signature_words.contains_key(id))
                .collect()
        };

        let mut candidate_jaccard: HashMap<(String, String), f64> = HashMap::new();
        for doc_id in &search_scope {
            let Some(sig) = signature_words.get(doc_id) else { continue };
            let candidates = index.candidates(sig, Some(doc_id.as_str()));
            for other_id in candidates {
                let Some(other_sig) = signature_words.get(&other_id) else { continue };
                let key = canonical_pair(doc_id, &other_id);
                if candidate_jaccard.contains_key(&key) {
                    continue;
                }
                let estimate = minhash::jaccard(sig, other_sig).unwrap_or(0.0);
                candidate_jaccard.insert(key, estimate);
            }
        }
        let candidate_pairs_found = candidate_jaccard.len() as u64;

        progress.on_progress(0.60);

        // Stage 6 — scoring, pre-filtered and batch-loaded in chunks.
        let prefiltered: Vec<((String, String), f64)> = candidate_jaccard
            .into_iter()
            .filter(|(_, jaccard)| scoring::passes_prefilter(*jaccard, config.similarity_threshold))
            .collect();

        let participant_ids: Vec<String> = {
            let mut ids: std::collections::HashSet<String> = std::collections::HashSet::new();
            for ((a, b), _) in &prefiltered {
                ids.insert(a.clone());
                ids.insert(b.clone());
            }
            ids.into_iter().collect()
        };

        let payloads = self.load_scoring_payloads(&participant_ids, &docs_by_id, config)?;

        let mut scored_pairs: Vec<((String, String), PairScore)> = Vec::with_capacity(prefiltered.len());
        for (pair, jaccard_estimate) in &prefiltered {
            let (Some(a), Some(b)) = (payloads.get(&pair.0), payloads.get(&pair.1)) else {
                continue;
            };
            let score = scoring::score_pair(*jaccard_estimate, a, b, &config.weights);
            if score.overall >= config.similarity_threshold {
                scored_pairs.push((pair.clone(), score));
            }
        }
        let candidate_pairs_scored = scored_pairs.len() as u64;

        progress.on_progress(0.85);

        // Stage 7 — group formation via union-find, arithmetic-mean scores.
        let mut uf = UnionFind::new();
        for ((a, b), _) in &scored_pairs {
            uf.union(a, b);
        }
        let components = uf.components();

        let mut new_groups: Vec<GroupWithMembers> = Vec::new();
        for (_root, members) in &components {
            let contributing: Vec<&PairScore> = scored_pairs
                .iter()
                .filter(|((a, b), _)| members.contains(a) && members.contains(b))
                .map(|(_, score)| score)
                .collect();
            if contributing.is_empty() {
                continue;
            }
            let mean = |f: fn(&PairScore) -> f64| -> f64 {
                contributing.iter().copied().map(f).sum::<f64>() / contributing.len() as f64
            };

            let primary_id = members
                .iter()
                .min_by_key(|id| {
                    let upstream_id = docs_by_id.get(id.as_str()).map(|d| d.upstream_id).unwrap_or(i64::MAX);
                    (upstream_id, id.to_string())
                })
                .cloned();

            let now = Utc::now();
            let group = DuplicateGroup {
                id: Uuid::new_v4().to_string(),
                confidence_score: mean(|s| s.overall),
                jaccard_similarity: mean(|s| s.jaccard),
                fuzzy_text_ratio: mean(|s| s.fuzzy),
                metadata_similarity: mean(|s| s.metadata),
                filename_similarity: mean(|s| s.filename),
                algorithm_version: config.algorithm_version.clone(),
                reviewed: false,
                resolved: false,
                created_at: now,
                updated_at: now,
            };
            let group_members = members
                .iter()
                .map(|id| DuplicateGroupMember {
                    group_id: group.id.clone(),
                    document_id: id.clone(),
                    is_primary: Some(id) == primary_id.as_ref(),
                })
                .collect();

            new_groups.push(GroupWithMembers {
                group,
                members: group_members,
            });
        }

        progress.on_progress(0.90);

        // Stage 8 — atomic reconciliation against the existing group set.
        //
        // An existing group is only a deletion candidate if this run actually
        // touched one of its members — either by querying its signature
        // directly (`search_scope`) or by discovering it as a neighbour of a
        // document that was queried (it ended up in a freshly computed
        // group). A group none of whose members were touched this run is
        // left exactly as it is: an incremental run with nothing pending
        // must find zero groups created and zero removed.
        let mut touched_ids: std::collections::HashSet<String> = search_scope.iter().cloned().collect();
        for group in &new_groups {
            for member in &group.members {
                touched_ids.insert(member.document_id.clone());
            }
        }

        let existing_groups = self.store.list_groups()?;
        let mut existing_by_key: HashMap<String, GroupWithMembers> =
            existing_groups.into_iter().map(|g| (g.member_key(), g)).collect();

        let mut to_update = Vec::new();
        let mut to_create = Vec::new();
        let mut matched_keys: std::collections::HashSet<String> = std::collections::HashSet::new();

        for mut new_group in new_groups {
            let key = new_group.member_key();
            if let Some(existing) = existing_by_key.get(&key) {
                new_group.group.id = existing.group.id.clone();
                new_group.group.reviewed = existing.group.reviewed;
                new_group.group.resolved = existing.group.resolved;
                new_group.group.created_at = existing.group.created_at;
                for member in &mut new_group.members {
                    member.group_id = new_group.group.id.clone();
                }
                to_update.push(new_group);
                matched_keys.insert(key);
            } else {
                to_create.push(new_group);
            }
        }

        let mut to_delete_ids = Vec::new();
        for (key, existing) in existing_by_key.drain() {
            if matched_keys.contains(&key) {
                continue;
            }
            if existing.group.reviewed || existing.group.resolved {
                continue;
            }
            let was_touched = existing.members.iter().any(|m| touched_ids.contains(&m.document_id));
            if !was_touched {
                continue;
            }
            to_delete_ids.push(existing.group.id.clone());
        }

        let groups_created = to_create.len() as u64;
        let groups_updated = to_update.len() as u64;
        let groups_removed = to_delete_ids.len() as u64;

        self.store.reconcile_groups(&to_update, &to_create, &to_delete_ids)?;

        // Stage 9 — finalise.
        if !newly_generated_ids.is_empty() {
            self.store.mark_completed(&newly_generated_ids)?;
        }
        let total_groups = self.store.list_groups()?.len() as u64;
        let mut sync_state = self.store.get_sync_state()?;
        sync_state.last_analysis_at = Some(Utc::now());
        sync_state.total_duplicate_groups = total_groups;
        self.store.save_sync_state(&sync_state)?;

        progress.on_progress(1.0);

        let result = AnalysisResult {
            documents_total: all_docs.len() as u64,
            documents_analyzed: docs_to_process.len() as u64,
            signatures_generated,
            signatures_reused,
            candidate_pairs_found,
            candidate_pairs_scored,
            groups_created,
            groups_updated,
            groups_removed,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            documents_analyzed = result.documents_analyzed,
            signatures_generated,
            signatures_reused,
            groups_created,
            groups_updated,
            groups_removed,
            elapsed_ms = result.duration_ms,
            "analysis run complete"
        );

        Ok(result)
    }

    /// Stage 6's batch load: fetches a [`ScoringPayload`] per participant
    /// id, in chunks bounded by [`SCORING_BATCH_SIZE`] to respect the
    /// store's bind-variable limits, sampling normalized text only when the
    /// fuzzy weight is active.
    fn load_scoring_payloads(
        &self,
        ids: &[String],
        docs_by_id: &HashMap<String, Document>,
        config: &DedupConfig,
    ) -> Result<HashMap<String, ScoringPayload>, AnalysisError> {
        let mut out = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(SCORING_BATCH_SIZE) {
            for id in chunk {
                let Some(doc) = docs_by_id.get(id) else { continue };
                let sampled_text = if config.weights.fuzzy > 0 {
                    self.store
                        .get_content(id)?
                        .map(|c| fuzzytext::sample(&c.normalized_text, config.fuzzy_sample_size))
                } else {
                    None
                };
                out.insert(
                    id.clone(),
                    ScoringPayload {
                        doc_id: doc.id.clone(),
                        upstream_id: doc.upstream_id,
                        correspondent: doc.correspondent.clone(),
                        document_type: doc.document_type.clone(),
                        original_file_size: doc.original_file_size,
                        archive_file_size: doc.archive_file_size,
                        created: doc.created.map(|c| c.date_naive()),
                        original_file_name: doc.original_file_name.clone(),
                        sampled_text,
                    },
                );
            }
        }
        Ok(out)
    }
}

/// The canonical pair key used to deduplicate symmetric LSH probes:
/// lexicographically ordered so `(a, b)` and `(b, a)` collapse to one entry.
fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
