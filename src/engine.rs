//! Top-level scan entry point. Composes the geometry with the directory walker's two
//! visitor modes (`Reconcile` runs to completion before `Sweep`/orphan recovery) and the
//! orphan detector plus directory mutator.
//!
//! It exists only to sequence the components above in the right order and to own the
//! `HashMap`/bitmap scratch state a single scan needs.

use std::collections::HashMap;

use crate::bpb::{Bpb, Geometry};
use crate::error::Result;
use crate::image::Image;
use crate::mutator::write_orphans;
use crate::orphan::{build_allocation_bitmap, group_orphans};
use crate::report::Report;
use crate::walker::{walk_root, Mode, WalkOutcome};

/// Runs one full scan-and-repair pass over `buf`, mutating it in place.
///
/// Returns `Ok(Report)` for every outcome except a fatal `Error::BadBootSector`. A clean
/// scan with no findings is still `Ok` with an empty report.
pub fn scan(buf: &mut [u8]) -> Result<Report> {
    let bpb = Bpb::parse(buf)?;
    let geo = Geometry::from_bpb(&bpb);
    let mut img = Image::new(buf, &bpb);
    let mut report = Report::new();

    log::info!(
        "scanning volume: {} cluster(s) of {} byte(s), {} FAT copy/copies",
        geo.total_clusters,
        geo.cluster_size,
        geo.num_fats
    );

    // Step 1: reconcile every live file's size against its chain, and record cluster
    // ownership for double-ownership detection, before any orphan is considered.
    // Truncations here free clusters that must not then be rediscovered as orphans.
    let mut owners: HashMap<u32, String> = HashMap::new();
    walk_root(&mut img, &geo, Mode::Reconcile, &mut owners, None, &mut report);

    // Step 2: sweep. Build the allocation bitmap fresh (after step 1's truncations have
    // already freed their tail clusters) and clear every cluster reachable from a live
    // entry.
    let mut bitmap = build_allocation_bitmap(&img, &geo);
    walk_root(
        &mut img,
        &geo,
        Mode::Sweep,
        &mut owners,
        Some(&mut bitmap),
        &mut report,
    );

    // Step 3: whatever remains set in the bitmap is orphaned. Group into maximal chains
    // and attach each as a new root-directory entry.
    let groups = group_orphans(&img, &geo, &bitmap, &mut report);
    if !groups.is_empty() {
        write_orphans(&mut img, &geo, &groups, &mut report);
    }

    if report.is_clean() {
        log::info!("scan complete: no inconsistencies found");
    } else {
        log::info!("scan complete: {} finding(s)", report.findings.len());
    }

    Ok(report)
}

/// Read-only directory listing for the `--list` surface: walks the tree without
/// reconciling or sweeping, for informational display only. Pretty printing is not part
/// of correctness.
pub fn list(buf: &mut [u8]) -> Result<WalkOutcome> {
    let bpb = Bpb::parse(buf)?;
    let geo = Geometry::from_bpb(&bpb);
    let mut img = Image::new(buf, &bpb);
    let mut report = Report::new();
    let mut owners = HashMap::new();
    Ok(walk_root(
        &mut img,
        &geo,
        Mode::List,
        &mut owners,
        None,
        &mut report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SyntheticImage;

    #[test]
    fn a_clean_image_produces_no_findings() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[10]);
        synth.write_root_entry(0, b"A       ", b"TXT", 0, 10, 512);
        let report = scan(synth.buf_mut()).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn scanning_twice_is_idempotent() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[10, 11, 12]);
        synth.write_root_entry(0, b"A       ", b"TXT", 0, 10, 512);
        synth.link_chain(&[40, 41]);

        let first = scan(synth.buf_mut()).unwrap();
        assert!(!first.is_clean());

        let before = synth.buf_mut().to_vec();
        let second = scan(synth.buf_mut()).unwrap();
        assert!(second.is_clean(), "second scan found: {:?}", second.findings);
        assert_eq!(synth.buf_mut(), before.as_slice());
    }

    #[test]
    fn recovers_an_orphan_chain_as_a_new_root_entry() {
        let mut synth = SyntheticImage::floppy_144();
        synth.link_chain(&[40, 41]);
        let report = scan(synth.buf_mut()).unwrap();
        assert!(matches!(
            report.findings[0],
            crate::report::Finding::OrphanRecovered { start_cluster: 40, .. }
        ));
    }

    #[test]
    fn rejects_a_bad_boot_sector() {
        let mut buf = vec![0u8; 16];
        assert!(matches!(scan(&mut buf), Err(crate::error::Error::BadBootSector(_))));
    }
}
