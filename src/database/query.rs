//! Query planning and the lazy accession stream

use famdb_core::{FamDbResult, TaxonId};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::filter::{accept_all, FamilyQuery, LazyFamily, Predicate};
use super::Database;
use crate::lineage::LineageOptions;

/// How a [`FamilyQuery`] is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Whole database with a stage filter: read only the by-stage indices
    StageIndex(Vec<String>),
    /// Whole database without a stage list: enumerate every partition
    FullScan,
    /// Walk the combined lineage and collect each taxon's families
    LineageWalk {
        tax_id: TaxonId,
        ancestors: bool,
        descendants: bool,
    },
    /// Every family stored below one bucket group, e.g. `Families/DR`
    GroupScan(String),
}

impl QueryPlan {
    pub fn for_query(query: &FamilyQuery) -> Self {
        let (tax_id, ancestors, descendants) = query.target();
        let stages = query.stages();

        if tax_id.is_root() && descendants {
            if !stages.is_empty() && query.repeat_type.is_none() && query.name.is_none() {
                return QueryPlan::StageIndex(stages);
            }
            return QueryPlan::FullScan;
        }

        QueryPlan::LineageWalk {
            tax_id,
            ancestors,
            descendants,
        }
    }
}

enum Source {
    Stage { partition: u32, stage: String },
    Partition(u32),
    Group { partition: u32, group: String },
    Lineage { tax_id: TaxonId, opts: LineageOptions },
    Taxon(TaxonId),
}

/// Accessions matching a query, de-duplicated, in no particular order.
///
/// Work is done as the iterator is pulled. An error is yielded in place of
/// the accession or batch that failed; pulling again continues with the
/// remaining work.
pub struct AccessionStream<'a> {
    db: &'a Database,
    plan: QueryPlan,
    predicates: Vec<Predicate>,
    curated_only: bool,
    uncurated_only: bool,
    sources: VecDeque<Source>,
    pending: VecDeque<(u32, String)>,
    seen: HashSet<String>,
}

impl<'a> AccessionStream<'a> {
    pub(crate) fn new(db: &'a Database, query: &FamilyQuery) -> Self {
        Self::with_plan(db, query, QueryPlan::for_query(query))
    }

    /// Answer `query` with a given plan instead of the one it would select
    pub(crate) fn with_plan(db: &'a Database, query: &FamilyQuery, plan: QueryPlan) -> Self {
        let partitions: Vec<u32> = db.partitions().map(|p| p.number()).collect();

        let sources: VecDeque<Source> = match &plan {
            QueryPlan::StageIndex(stages) => partitions
                .iter()
                .flat_map(|p| {
                    stages.iter().map(move |s| Source::Stage {
                        partition: *p,
                        stage: s.clone(),
                    })
                })
                .collect(),
            QueryPlan::FullScan => partitions.into_iter().map(Source::Partition).collect(),
            QueryPlan::GroupScan(group) => partitions
                .into_iter()
                .map(|partition| Source::Group {
                    partition,
                    group: group.clone(),
                })
                .collect(),
            QueryPlan::LineageWalk {
                tax_id,
                ancestors,
                descendants,
            } => VecDeque::from([Source::Lineage {
                tax_id: *tax_id,
                opts: LineageOptions::default()
                    .with_ancestors(*ancestors)
                    .with_descendants(*descendants),
            }]),
        };

        debug!("Query plan {:?} over {} sources", plan, sources.len());

        Self {
            db,
            predicates: query.predicates(matches!(plan, QueryPlan::StageIndex(_))),
            plan,
            curated_only: query.curated_only,
            uncurated_only: query.uncurated_only,
            sources,
            pending: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    fn expand(&mut self, source: Source) -> FamDbResult<()> {
        match source {
            Source::Stage { partition, stage } => {
                if let Some(p) = self.db.partition(partition) {
                    for acc in p.stage_accessions(&stage)? {
                        self.pending.push_back((partition, acc));
                    }
                }
            }
            Source::Partition(partition) => {
                if let Some(p) = self.db.partition(partition) {
                    for acc in p.accessions()? {
                        self.pending.push_back((partition, acc));
                    }
                }
            }
            Source::Group { partition, group } => {
                if let Some(p) = self.db.partition(partition) {
                    for acc in p.accessions_under(&group)? {
                        self.pending.push_back((partition, acc));
                    }
                }
            }
            Source::Lineage { tax_id, opts } => {
                let lineage = self.db.get_lineage_combined(tax_id, opts)?;
                self.sources.extend(lineage.taxa().into_iter().map(Source::Taxon));
            }
            Source::Taxon(tax_id) => {
                if let Some((partition, accessions)) =
                    self.db
                        .taxon_families(tax_id, self.curated_only, self.uncurated_only)?
                {
                    for acc in accessions {
                        self.pending.push_back((partition, acc));
                    }
                }
            }
        }
        Ok(())
    }

    fn accept(&self, partition: u32, accession: &str) -> FamDbResult<bool> {
        match self.db.partition(partition) {
            Some(p) => accept_all(&self.predicates, &mut LazyFamily::new(p, accession)),
            None => Ok(false),
        }
    }
}

impl<'a> Iterator for AccessionStream<'a> {
    type Item = FamDbResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((partition, accession)) = self.pending.pop_front() {
                if !self.seen.insert(accession.clone()) {
                    continue;
                }
                match self.accept(partition, &accession) {
                    Ok(true) => return Some(Ok(accession)),
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }

            let source = self.sources.pop_front()?;
            if let Err(e) = self.expand(source) {
                return Some(Err(e));
            }
        }
    }
}
