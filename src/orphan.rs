//! The orphan detector. Builds the allocation bitmap, runs the directory walker in sweep
//! mode against it, then groups whatever remains set into maximal cluster chains. The FAT
//! is read-only throughout this module; grouping never mutates a chain, only discovers it.

use std::collections::{HashMap, HashSet};

use crate::bpb::Geometry;
use crate::fat::ClusterState;
use crate::image::Image;
use crate::report::{Finding, Report};

/// One maximal orphan chain, to become a single recovered directory entry.
pub struct OrphanGroup {
    pub start_cluster: u32,
    pub clusters: Vec<u32>,
}

/// Builds the initial allocation bitmap: `true` for every cluster whose FAT entry is
/// neither FREE nor BAD (i.e. Reserved, InUse or End, anything the FAT claims is
/// occupied). Sized `totalClusters` so cluster numbers index it directly.
pub fn build_allocation_bitmap(img: &Image, geo: &Geometry) -> Vec<bool> {
    let mut bitmap = vec![false; geo.total_clusters as usize];
    for n in 2..geo.total_clusters {
        let allocated = !matches!(img.classify_fat(n), ClusterState::Free | ClusterState::Bad);
        bitmap[n as usize] = allocated;
    }
    bitmap
}

/// Groups whatever is left set in `bitmap` after the sweep into maximal orphan chains.
/// Each chain's root is the one member no other IN-USE FAT entry anywhere in the volume
/// points at; chains with no such unambiguous root are reported via `AmbiguousOrphanRoot`
/// and recovered one cluster at a time instead.
pub fn group_orphans(img: &Image, geo: &Geometry, bitmap: &[bool], report: &mut Report) -> Vec<OrphanGroup> {
    let orphan_set: HashSet<u32> = (2..geo.total_clusters)
        .filter(|&n| bitmap.get(n as usize).copied().unwrap_or(false))
        .collect();
    if orphan_set.is_empty() {
        return Vec::new();
    }

    // The source began its orphan search at cluster 5, not 2, which would have silently
    // missed an orphan anywhere in 2..5. Flag that range specifically since it's the one
    // difference from the source's behavior.
    for n in 2..5.min(geo.total_clusters) {
        if orphan_set.contains(&n) {
            log::debug!("cluster {n} is orphaned in the 2..5 range the source would have skipped");
        }
    }

    let mut incoming: HashMap<u32, u32> = HashMap::new();
    for n in 2..geo.total_clusters {
        if let ClusterState::InUse(next) = img.classify_fat(n) {
            let next = next as u32;
            if orphan_set.contains(&next) {
                *incoming.entry(next).or_insert(0) += 1;
            }
        }
    }

    let mut remaining = orphan_set.clone();
    let mut groups = Vec::new();

    let mut roots: Vec<u32> = orphan_set
        .iter()
        .copied()
        .filter(|c| *incoming.get(c).unwrap_or(&0) == 0)
        .collect();
    roots.sort_unstable();
    for root in roots {
        if !remaining.contains(&root) {
            continue;
        }
        let chain = trace_orphan_chain(img, &orphan_set, root, &mut remaining);
        if !chain.is_empty() {
            groups.push(OrphanGroup {
                start_cluster: chain[0],
                clusters: chain,
            });
        }
    }

    // Whatever is left belongs to components with no zero-incoming member, pure cycles
    // most commonly. No unambiguous root exists, so fall back to one file per cluster.
    loop {
        let start = match remaining.iter().min().copied() {
            Some(s) => s,
            None => break,
        };
        let component = trace_orphan_chain(img, &orphan_set, start, &mut remaining);
        if component.is_empty() {
            break;
        }
        report.push(Finding::AmbiguousOrphanRoot {
            clusters: component.clone(),
        });
        for c in component {
            groups.push(OrphanGroup {
                start_cluster: c,
                clusters: vec![c],
            });
        }
    }

    groups
}

/// Follows FAT pointers from `start` through `orphan_set` only, consuming visited
/// clusters out of `remaining` as it goes. Used both to trace a chain forward from an
/// unambiguous root and to trace out a cycle's full membership starting from an arbitrary
/// member (the traversal stops either at a non-orphan target or when it reaches a cluster
/// already consumed, which for a cycle is the starting cluster itself).
fn trace_orphan_chain(
    img: &Image,
    orphan_set: &HashSet<u32>,
    start: u32,
    remaining: &mut HashSet<u32>,
) -> Vec<u32> {
    let mut chain = Vec::new();
    let mut cur = start;
    let limit = orphan_set.len() as u32 + 1;
    let mut steps = 0u32;

    loop {
        if !remaining.remove(&cur) {
            break;
        }
        chain.push(cur);
        steps += 1;
        if steps > limit {
            break;
        }
        match img.classify_fat(cur) {
            ClusterState::InUse(next) => {
                let next = next as u32;
                if orphan_set.contains(&next) {
                    cur = next;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    chain
}
