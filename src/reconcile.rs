//! Reconciles a live file's recorded size against its actual cluster-chain length. Pure
//! with respect to the chain itself: it only ever rewrites the owning directory entry's
//! `fileSize` field, or truncates the chain by freeing the tail, never the chain-walking
//! logic in [`crate::chain`].

use crate::bpb::Geometry;
use crate::chain::ChainWalk;
use crate::dirent::{DirEntryView, DirEntryViewMut};
use crate::fat::{FREE, END_OF_CHAIN};
use crate::image::Image;
use crate::report::{Finding, Report};

/// Reconciles the directory entry at `addr` against the already-walked `chain`. Takes the
/// entry by address rather than by a pre-borrowed view so that the truncation path (which
/// needs `img.set_fat`) never has to hold a directory-entry borrow of `img` open at the
/// same time. The two regions never overlap on disk, but the borrow checker only knows
/// about `Image` as a whole.
pub fn reconcile_size(
    img: &mut Image,
    geo: &Geometry,
    addr: usize,
    chain: &ChainWalk,
    entry_label: &str,
    report: &mut Report,
) {
    let file_size = match img.dirent_at(addr) {
        Some(raw) => DirEntryView::new(raw).file_size(),
        None => return,
    };
    let cluster_size = geo.cluster_size as u64;
    let fat_clusters = chain.len();

    // ceil(size / clusterSize); an empty recorded size implies zero clusters, not one.
    let meta_clusters = if file_size == 0 {
        0
    } else {
        ((file_size as u64 + cluster_size - 1) / cluster_size) as u32
    };

    // A file recorded as empty but whose startCluster is allocated and in-use must not
    // have its chain truncated away: it is treated as "metadata too small" regardless of
    // which direction the general comparison below would otherwise take.
    if meta_clusters == 0 && fat_clusters > 0 {
        let new_size = fat_clusters as u64 * cluster_size;
        report.push(Finding::SizeTooLarge {
            entry: entry_label.to_string(),
            old_size: file_size,
            new_size: new_size as u32,
        });
        write_file_size(img, addr, new_size as u32);
        return;
    }

    use std::cmp::Ordering;
    match meta_clusters.cmp(&fat_clusters) {
        Ordering::Equal => {}
        Ordering::Less => {
            // Case 2: the chain is longer than the metadata calls for. Free the tail
            // clusters beyond what the metadata needs and terminate the chain there.
            report.push(Finding::ChainTooLong {
                entry: entry_label.to_string(),
                meta_clusters,
                fat_clusters,
            });
            truncate_chain(img, chain, meta_clusters);
        }
        Ordering::Greater => {
            // Case 3: the metadata claims more clusters than the chain has. Shrink the
            // recorded size down to what the chain actually holds.
            let new_size = fat_clusters as u64 * cluster_size;
            report.push(Finding::SizeTooLarge {
                entry: entry_label.to_string(),
                old_size: file_size,
                new_size: new_size as u32,
            });
            write_file_size(img, addr, new_size as u32);
        }
    }
}

fn write_file_size(img: &mut Image, addr: usize, new_size: u32) {
    if let Some(raw) = img.dirent_at_mut(addr) {
        DirEntryViewMut::new(raw).set_file_size(new_size);
    }
}

/// Frees every cluster in `chain` beyond the first `keep` of them, terminating the new
/// tail with END-OF-CHAIN. `keep == 0` frees the entire chain (no terminal cluster
/// remains, matching an empty file whose chain was entirely spurious).
fn truncate_chain(img: &mut Image, chain: &ChainWalk, keep: u32) {
    let keep = keep as usize;
    if keep >= chain.clusters.len() {
        return;
    }
    if keep > 0 {
        img.set_fat(chain.clusters[keep - 1], END_OF_CHAIN);
    }
    for &c in &chain.clusters[keep..] {
        img.set_fat(c, FREE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::walk_chain;
    use crate::testutil::SyntheticImage;

    #[test]
    fn shrinks_recorded_size_when_chain_is_shorter() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[20, 21]);
        synth.write_root_entry(0, b"B       ", b"TXT", 0, 20, 4 * 512);
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let chain = walk_chain(&mut img, 20, &mut report, "B.TXT");
        let addr = geo.cluster_to_addr(0);
        reconcile_size(&mut img, &geo, addr, &chain, "B.TXT", &mut report);

        let view = DirEntryView::new(img.dirent_at(addr).unwrap());
        assert_eq!(view.file_size(), 2 * 512);
        assert!(matches!(report.findings[0], Finding::SizeTooLarge { .. }));
    }

    #[test]
    fn truncates_chain_when_metadata_is_shorter() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[10, 11, 12]);
        synth.write_root_entry(0, b"A       ", b"TXT", 0, 10, 512);
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let chain = walk_chain(&mut img, 10, &mut report, "A.TXT");
        let addr = geo.cluster_to_addr(0);
        reconcile_size(&mut img, &geo, addr, &chain, "A.TXT", &mut report);

        assert_eq!(img.classify_fat(10), crate::fat::ClusterState::End);
        assert_eq!(img.classify_fat(11), crate::fat::ClusterState::Free);
        assert_eq!(img.classify_fat(12), crate::fat::ClusterState::Free);
        let view = DirEntryView::new(img.dirent_at(addr).unwrap());
        assert_eq!(view.file_size(), 512);
        assert!(matches!(report.findings[0], Finding::ChainTooLong { .. }));
    }

    #[test]
    fn empty_recorded_size_with_an_allocated_chain_grows_instead_of_truncating() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[40, 41]);
        synth.write_root_entry(0, b"E       ", b"DAT", 0, 40, 0);
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let chain = walk_chain(&mut img, 40, &mut report, "E.DAT");
        let addr = geo.cluster_to_addr(0);
        reconcile_size(&mut img, &geo, addr, &chain, "E.DAT", &mut report);

        let view = DirEntryView::new(img.dirent_at(addr).unwrap());
        assert_eq!(view.file_size(), 2 * 512);
        assert_eq!(img.classify_fat(40), crate::fat::ClusterState::InUse(41));
        assert_eq!(img.classify_fat(41), crate::fat::ClusterState::End);
        assert!(matches!(report.findings[0], Finding::SizeTooLarge { .. }));
    }

    #[test]
    fn matching_chain_and_size_need_no_reconciliation() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[60]);
        synth.write_root_entry(0, b"F       ", b"TXT", 0, 60, 512);
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let chain = walk_chain(&mut img, 60, &mut report, "F.TXT");
        let addr = geo.cluster_to_addr(0);
        reconcile_size(&mut img, &geo, addr, &chain, "F.TXT", &mut report);

        assert!(report.is_clean());
    }
}
