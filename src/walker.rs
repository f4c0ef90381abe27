//! The directory walker. Walks one directory's entry stream, dispatching each live
//! entry to the action appropriate for the current [`Mode`] and recursing into
//! subdirectories. Replaces the original's `option` integer flag (0 = reconcile, 1 =
//! orphan-sweep) with an enum-valued visitor, plus a third, repair-free `List` mode for
//! the informational `--list` CLI surface.

use std::collections::HashMap;

use crate::bpb::Geometry;
use crate::chain::{walk_chain, ChainWalk};
use crate::dirent::DirEntryView;
use crate::image::Image;
use crate::reconcile::reconcile_size;
use crate::report::{Finding, Report};

/// Directory nesting is bounded by `totalClusters` in principle; this bound exists only to
/// stop a maliciously or corruptly self-referential subdirectory chain from recursing
/// without limit.
const MAX_DEPTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Repairs chain/size mismatches and records cluster ownership for double-ownership
    /// detection.
    Reconcile,
    /// Clears bits in the allocation bitmap for every cluster reachable from a live entry;
    /// whatever remains set afterward is orphaned.
    Sweep,
    /// Read-only traversal for the `--list` CLI surface; never mutates the image.
    List,
}

/// What a traversal produced, beyond the findings already pushed onto the `Report`.
#[derive(Default)]
pub struct WalkOutcome {
    pub listed: Vec<String>,
}

/// Walks the fixed-size root directory region, recursing into subdirectories as needed.
pub fn walk_root(
    img: &mut Image,
    geo: &Geometry,
    mode: Mode,
    owners: &mut HashMap<u32, String>,
    bitmap: Option<&mut [bool]>,
    report: &mut Report,
) -> WalkOutcome {
    let addrs = root_addrs(geo);
    let mut outcome = WalkOutcome::default();
    walk_stream(img, geo, &addrs, mode, owners, bitmap, report, 0, &mut outcome);
    outcome
}

fn root_addrs(geo: &Geometry) -> Vec<usize> {
    (0..geo.root_dir_entries as usize)
        .map(|i| geo.root_dir_base as usize + i * 32)
        .collect()
}

fn cluster_stream_addrs(geo: &Geometry, clusters: &[u32]) -> Vec<usize> {
    clusters
        .iter()
        .flat_map(|&c| {
            let base = geo.cluster_to_addr(c);
            (0..geo.entries_per_cluster()).map(move |i| base + i * 32)
        })
        .collect()
}

fn walk_stream(
    img: &mut Image,
    geo: &Geometry,
    addrs: &[usize],
    mode: Mode,
    owners: &mut HashMap<u32, String>,
    mut bitmap: Option<&mut [bool]>,
    report: &mut Report,
    depth: u32,
    outcome: &mut WalkOutcome,
) {
    for &addr in addrs {
        // Read everything needed from the raw bytes up front and drop the borrow before
        // making any further mutable calls into `img`: the view borrows `img` immutably,
        // and later branches need `img` mutably (chain walk, FAT writes).
        let (is_end, skip, name, start_cluster, is_dir, is_hidden, _file_size) = match img.dirent_at(addr) {
            Some(raw) => {
                let view = DirEntryView::new(raw);
                let is_end = view.is_end_of_directory();
                let skip = view.is_deleted()
                    || view.is_dot_entry()
                    || view.is_volume_label()
                    || view.is_long_filename();
                (
                    is_end,
                    skip,
                    view.display_name(),
                    view.start_cluster(),
                    view.is_directory(),
                    view.is_hidden(),
                    view.file_size(),
                )
            }
            None => break,
        };

        if is_end {
            break;
        }
        if skip {
            continue;
        }

        if mode == Mode::List {
            outcome
                .listed
                .push(format!("{name}{}", if is_dir { "/" } else { "" }));
        }

        let sc = start_cluster as u32;
        if sc < 2 {
            if mode != Mode::List {
                report.push(Finding::StartClusterBelowTwo {
                    entry: name,
                    start_cluster,
                });
            }
            continue;
        }
        if img.is_out_of_range(sc) {
            if mode != Mode::List {
                report.push(Finding::OutOfRangeCluster {
                    entry: name,
                    cluster: sc,
                });
            }
            continue;
        }

        let chain: Option<ChainWalk> = if mode == Mode::List {
            None
        } else {
            Some(walk_chain(img, sc, report, &name))
        };

        if let Some(chain) = &chain {
            record_ownership_or_sweep(mode, owners, bitmap.as_deref_mut(), chain, &name, report);
        }

        if mode == Mode::Reconcile && !is_dir {
            if let Some(chain) = &chain {
                let addr = addr;
                reconcile_size(img, geo, addr, chain, &name, report);
            }
        }

        if is_dir {
            // Recurse only into directories that are not HIDDEN. A hidden
            // directory's own clusters are still walked and owned/swept above; only its
            // contents are left unvisited.
            if is_hidden || depth >= MAX_DEPTH {
                continue;
            }
            if let Some(chain) = &chain {
                let sub_addrs = cluster_stream_addrs(geo, &chain.clusters);
                walk_stream(
                    img,
                    geo,
                    &sub_addrs,
                    mode,
                    owners,
                    bitmap.as_deref_mut(),
                    report,
                    depth + 1,
                    outcome,
                );
            }
        }
    }
}

fn record_ownership_or_sweep(
    mode: Mode,
    owners: &mut HashMap<u32, String>,
    bitmap: Option<&mut [bool]>,
    chain: &ChainWalk,
    name: &str,
    report: &mut Report,
) {
    match mode {
        Mode::Reconcile => {
            for &c in &chain.clusters {
                if let Some(prev) = owners.insert(c, name.to_string()) {
                    if prev != name {
                        report.push(Finding::DoubleOwnership {
                            cluster: c,
                            first_owner: prev,
                            second_owner: name.to_string(),
                        });
                    }
                }
            }
        }
        Mode::Sweep => {
            if let Some(bm) = bitmap {
                for &c in &chain.clusters {
                    if let Some(slot) = bm.get_mut(c as usize) {
                        *slot = false;
                    }
                }
            }
        }
        Mode::List => {}
    }
}
