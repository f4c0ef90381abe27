//! The scan report. Pairs structured `log` records with the legacy `*BAD:`-prefixed
//! console transcript, since the tool promises no stable machine-readable format:
//! the transcript and the findings collected here are two views of the same events.

use std::fmt;

/// One non-fatal condition observed and (usually) repaired during a scan. Every error
/// kind except `BadBootSector` shows up here rather than as a propagated `Err`.
#[derive(Debug, Clone)]
pub enum Finding {
    /// A live file's chain was longer than its recorded size; truncated and the tail
    /// freed.
    ChainTooLong {
        entry: String,
        meta_clusters: u32,
        fat_clusters: u32,
    },
    /// A live file's recorded size was larger than its chain; size rewritten down.
    SizeTooLarge {
        entry: String,
        old_size: u32,
        new_size: u32,
    },
    /// A bad cluster was spliced out of a live chain.
    BadClusterInChain { entry: String, bad_cluster: u32 },
    /// A chain referenced a cluster index outside the volume.
    OutOfRangeCluster { entry: String, cluster: u32 },
    /// A live file's `startCluster` was 0 or 1; left untouched.
    StartClusterBelowTwo { entry: String, start_cluster: u16 },
    /// A chain walk exceeded `totalClusters` steps and was truncated.
    CycleDetected { entry: String, truncated_at: u32 },
    /// A recovered orphan chain was written as a new root-directory entry.
    OrphanRecovered {
        name: String,
        start_cluster: u32,
        chain_length: u32,
    },
    /// No root-directory slot was available for a recovered orphan.
    RootDirectoryFull { remaining_orphans: usize },
    /// An orphan chain had more than one incoming FAT pointer; recovered per-cluster.
    AmbiguousOrphanRoot { clusters: Vec<u32> },
    /// Two directory entries' chains share a cluster. Reported, not auto-repaired.
    DoubleOwnership { cluster: u32, first_owner: String, second_owner: String },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::ChainTooLong {
                entry,
                meta_clusters,
                fat_clusters,
            } => write!(
                f,
                "*BAD:\tFile size in the metadata is smaller than the cluster chain length for the file would suggest.\n\
                 \t\t{entry}: metadata wants {meta_clusters} cluster(s), chain has {fat_clusters}; chain truncated."
            ),
            Finding::SizeTooLarge {
                entry,
                old_size,
                new_size,
            } => write!(
                f,
                "*BAD:\tFile size in the metadata that is larger than the cluster chain for the file would suggest.\n\
                 \t\t{entry}: size changed from {old_size} to {new_size}."
            ),
            Finding::BadClusterInChain { entry, bad_cluster } => write!(
                f,
                "*BAD:\tBad cluster {bad_cluster} detected and removed from chain.\n\t\t{entry}"
            ),
            Finding::OutOfRangeCluster { entry, cluster } => write!(
                f,
                "*BAD:\tCluster {cluster} referenced by {entry} is outside the volume; treated as end-of-chain."
            ),
            Finding::StartClusterBelowTwo {
                entry,
                start_cluster,
            } => write!(
                f,
                "*BAD:\tStarting cluster number smaller than 2.\n\t\t{entry}: starting cluster {start_cluster}."
            ),
            Finding::CycleDetected {
                entry,
                truncated_at,
            } => write!(
                f,
                "*BAD:\tCluster chain cycle detected.\n\t\t{entry}: truncated at cluster {truncated_at}."
            ),
            Finding::OrphanRecovered {
                name,
                start_cluster,
                chain_length,
            } => write!(
                f,
                "*BAD:\tCluster {start_cluster} is unassigned but not freed. Now in directory as {name}.\n\
                 \t\tChain length {chain_length} cluster(s)."
            ),
            Finding::RootDirectoryFull { remaining_orphans } => write!(
                f,
                "*BAD:\tRoot directory is full; {remaining_orphans} orphan chain(s) left unlinked."
            ),
            Finding::AmbiguousOrphanRoot { clusters } => write!(
                f,
                "*BAD:\tOrphan chain has no unambiguous root; recovered cluster-by-cluster: {clusters:?}."
            ),
            Finding::DoubleOwnership {
                cluster,
                first_owner,
                second_owner,
            } => write!(
                f,
                "*BAD:\tCluster {cluster} is claimed by both {first_owner} and {second_owner}."
            ),
        }
    }
}

/// The accumulated outcome of a scan: every finding observed, in the order produced.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    /// Records a finding, emits it at `warn!` (the scan-report log level for repairs),
    /// and appends it to the transcript-producing list.
    pub fn push(&mut self, finding: Finding) {
        log::warn!("{finding}");
        self.findings.push(finding);
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Renders the full `*BAD:`-prefixed transcript, one finding per paragraph.
    pub fn transcript(&self) -> String {
        self.findings
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
