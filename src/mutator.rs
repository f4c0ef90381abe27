//! The directory mutator. Writes one synthetic root-directory entry per recovered
//! orphan chain, named `FOUNDk.DAT` in scan order, reusing the first empty or deleted
//! slot it finds, exactly where the legacy format always looks for free space.

use crate::bpb::Geometry;
use crate::dirent::{self, format_short_name, DirEntryView, DirEntryViewMut};
use crate::image::Image;
use crate::orphan::OrphanGroup;
use crate::report::{Finding, Report};

/// Writes `groups` as successive `FOUNDk.DAT` root entries. Stops and reports
/// `RootDirectoryFull` as soon as no slot remains, listing how many orphans were left
/// unlinked.
pub fn write_orphans(img: &mut Image, geo: &Geometry, groups: &[OrphanGroup], report: &mut Report) {
    for (i, group) in groups.iter().enumerate() {
        let found_name = format!("FOUND{}", i + 1);
        let (name, ext) = format_short_name(&found_name, Some("DAT"));
        let chain_length = group.clusters.len() as u32;
        let size = chain_length * geo.cluster_size;

        match find_free_root_slot(img, geo) {
            Some(addr) => {
                write_entry_and_reterminate(img, geo, addr, &name, &ext, group.start_cluster, size);
                report.push(Finding::OrphanRecovered {
                    name: format!("{found_name}.DAT"),
                    start_cluster: group.start_cluster,
                    chain_length,
                });
            }
            None => {
                report.push(Finding::RootDirectoryFull {
                    remaining_orphans: groups.len() - i,
                });
                break;
            }
        }
    }
}

/// Returns the byte address of the first empty or deleted root-directory slot, or `None`
/// if every slot in the fixed-size root region holds a live entry.
fn find_free_root_slot(img: &Image, geo: &Geometry) -> Option<usize> {
    (0..geo.root_dir_entries as usize)
        .map(|i| geo.root_dir_base as usize + i * 32)
        .find(|&addr| match img.dirent_at(addr) {
            Some(raw) => {
                let view = DirEntryView::new(raw);
                view.is_end_of_directory() || view.is_deleted()
            }
            None => false,
        })
}

fn write_entry_and_reterminate(
    img: &mut Image,
    geo: &Geometry,
    addr: usize,
    name: &[u8; 8],
    ext: &[u8; 3],
    start_cluster: u32,
    size: u32,
) {
    let was_terminator = img
        .dirent_at(addr)
        .map(|raw| DirEntryView::new(raw).is_end_of_directory())
        .unwrap_or(false);

    if let Some(raw) = img.dirent_at_mut(addr) {
        DirEntryViewMut::new(raw).write_fresh(name, ext, dirent::ATTR_ARCHIVE, start_cluster as u16, size);
    }

    // The slot we just claimed used to be the end-of-directory terminator; the next slot
    // must become the new terminator so the stream still ends somewhere.
    if was_terminator {
        let next_addr = addr + 32;
        if next_addr < geo.root_dir_base as usize + geo.root_dir_entries as usize * 32 {
            if let Some(raw) = img.dirent_at_mut(next_addr) {
                DirEntryViewMut::new(raw).mark_end_of_directory();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SyntheticImage;

    #[test]
    fn writes_a_recovered_orphan_into_the_first_free_slot() {
        let mut synth = SyntheticImage::floppy_144();
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let groups = vec![OrphanGroup {
            start_cluster: 40,
            clusters: vec![40, 41],
        }];
        write_orphans(&mut img, &geo, &groups, &mut report);

        let addr = geo.root_dir_base as usize;
        let view = DirEntryView::new(img.dirent_at(addr).unwrap());
        assert_eq!(view.display_name(), "FOUND1.DAT");
        assert_eq!(view.start_cluster(), 40);
        assert_eq!(view.file_size(), 2 * geo.cluster_size);
        assert!(matches!(report.findings[0], Finding::OrphanRecovered { .. }));

        // The slot after the new entry is still a terminator.
        let next_view = DirEntryView::new(img.dirent_at(addr + 32).unwrap());
        assert!(next_view.is_end_of_directory());
    }

    #[test]
    fn reuses_a_deleted_slot_without_moving_the_terminator() {
        let mut synth = SyntheticImage::floppy_144();
        synth.write_root_entry(0, b"DELETED ", b"OLD", 0, 5, 512);
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        synth.buf_mut()[geo.root_dir_base as usize] = dirent::SLOT_DELETED;
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let groups = vec![OrphanGroup {
            start_cluster: 40,
            clusters: vec![40],
        }];
        write_orphans(&mut img, &geo, &groups, &mut report);

        let addr = geo.root_dir_base as usize;
        let view = DirEntryView::new(img.dirent_at(addr).unwrap());
        assert_eq!(view.display_name(), "FOUND1.DAT");
    }

    #[test]
    fn reports_root_directory_full_when_no_slot_remains() {
        let mut synth = SyntheticImage::floppy_144();
        let bpb = synth.bpb();
        let geo = Geometry::from_bpb(&bpb);
        for i in 0..geo.root_dir_entries as usize {
            synth.write_root_entry(i, b"F       ", b"TXT", 0, 2, 512);
        }
        let mut img = Image::new(synth.buf_mut(), &bpb);
        let mut report = Report::new();

        let groups = vec![OrphanGroup {
            start_cluster: 40,
            clusters: vec![40],
        }];
        write_orphans(&mut img, &geo, &groups, &mut report);

        assert!(matches!(
            report.findings[0],
            Finding::RootDirectoryFull { remaining_orphans: 1 }
        ));
    }
}
