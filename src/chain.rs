//! The chain walker. Produces the ordered sequence of clusters forming a file (or a
//! subdirectory stream) starting from a given cluster, splicing out bad clusters and
//! bounding itself against cyclic chains.

use crate::fat::{self, ClusterState};
use crate::image::Image;
use crate::report::{Finding, Report};

/// The result of walking one cluster chain.
pub struct ChainWalk {
    /// Clusters visited, in chain order, *after* any bad-cluster splice repairs.
    pub clusters: Vec<u32>,
    /// Set when the walk hit the `totalClusters` step bound and was truncated.
    pub cycle_truncated: bool,
}

impl ChainWalk {
    pub fn len(&self) -> u32 {
        self.clusters.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Walks the chain starting at `start`, mutating the image in place whenever a repair is
/// required (bad-cluster splice, cycle truncation). Both are inline repairs, not deferred
/// to a later pass.
///
/// `entry_label` is a human-readable name for the owning directory entry, used only to
/// annotate findings.
pub fn walk_chain(img: &mut Image, start: u32, report: &mut Report, entry_label: &str) -> ChainWalk {
    let mut clusters = Vec::new();
    let mut cluster = start;
    let limit = img.geo.total_clusters;
    let mut steps: u32 = 0;
    let mut cycle_truncated = false;

    loop {
        if img.is_out_of_range(cluster) {
            if !clusters.is_empty() {
                report.push(Finding::OutOfRangeCluster {
                    entry: entry_label.to_string(),
                    cluster,
                });
            }
            break;
        }

        let next = match img.classify_fat(cluster) {
            ClusterState::InUse(next) => next as u32,
            // Free, Reserved, Bad or End: this cluster does not point onward, so it is
            // the terminal cluster of the chain (or, for Bad/Free/Reserved reached as a
            // *first* cluster, the chain is empty).
            _ => break,
        };

        clusters.push(cluster);
        steps += 1;

        if steps > limit {
            img.set_fat(cluster, fat::END_OF_CHAIN);
            report.push(Finding::CycleDetected {
                entry: entry_label.to_string(),
                truncated_at: cluster,
            });
            cycle_truncated = true;
            break;
        }

        if img.is_out_of_range(next) {
            report.push(Finding::OutOfRangeCluster {
                entry: entry_label.to_string(),
                cluster: next,
            });
            break;
        }

        if img.classify_fat(next) == ClusterState::Bad {
            report.push(Finding::BadClusterInChain {
                entry: entry_label.to_string(),
                bad_cluster: next,
            });
            // Read-then-write: the next pointer was already captured above, so
            // overwriting `cluster`'s entry here cannot desynchronize the walk.
            img.set_fat(cluster, next + 1);
            cluster = next + 1;
        } else {
            cluster = next;
        }
    }

    ChainWalk {
        clusters,
        cycle_truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SyntheticImage;

    #[test]
    fn walks_a_simple_chain_to_end_of_chain() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[10, 11, 12]);
        let bpb = synth.bpb();
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let walk = walk_chain(&mut img, 10, &mut report, "A.TXT");
        assert_eq!(walk.clusters, vec![10, 11, 12]);
        assert!(!walk.cycle_truncated);
        assert!(report.is_clean());
    }

    #[test]
    fn splices_out_a_bad_cluster_mid_chain() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[30, 31, 32]);
        synth.mark_bad(31);
        let bpb = synth.bpb();
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let walk = walk_chain(&mut img, 30, &mut report, "C.TXT");
        assert_eq!(walk.clusters, vec![30, 32]);
        assert_eq!(img.get_fat(30), 32);
        assert!(matches!(
            report.findings[0],
            Finding::BadClusterInChain {
                bad_cluster: 31,
                ..
            }
        ));
    }

    #[test]
    fn truncates_a_cyclic_chain_within_the_cluster_bound() {
        // total_clusters chosen odd so the bound (limit+1) lands on an even step, i.e.
        // on cluster 51, reproducing the alternating 50/51 cycle exactly.
        let mut synth = SyntheticImage::floppy_144_with_total_clusters(61);
        synth.set_fat_raw(50, 51);
        synth.set_fat_raw(51, 50);
        let bpb = synth.bpb();
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let walk = walk_chain(&mut img, 50, &mut report, "CYCLE");
        assert!(walk.cycle_truncated);
        assert_eq!(img.classify_fat(51), ClusterState::End);
        assert!(matches!(report.findings[0], Finding::CycleDetected { .. }));
    }
}
