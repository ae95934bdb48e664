fn main() {
    println!("Run `cargo test -p layout-compat` to execute on-disk layout tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use nsplitter_collect::{Mode, collect_candidates};
    use nsplitter_engine::{
        MergeOptions, Merger, NullSink, SplitOptions, Splitter, is_split_directory, merged_name,
        split_dir_name,
    };
    use tempfile::TempDir;

    /// Stand-in for the 1 GiB unit of the FAT32 layout, scaled down.
    const UNIT: u64 = 1024;

    fn pattern(len: u64) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    fn write_source(dir: &Path, name: &str, len: u64) -> (PathBuf, Vec<u8>) {
        let path = dir.join(name);
        let data = pattern(len);
        fs::write(&path, &data).unwrap();
        (path, data)
    }

    /// Part names and sizes inside a split directory, sorted by name.
    fn listing(dir: &Path) -> Vec<(String, u64)> {
        let mut parts: Vec<(String, u64)> = fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                (
                    e.file_name().to_string_lossy().into_owned(),
                    e.metadata().unwrap().len(),
                )
            })
            .collect();
        parts.sort();
        parts
    }

    fn splitter(max_chunk_size: u64, remove_source: bool) -> Splitter {
        Splitter::new(SplitOptions {
            max_chunk_size,
            buffer_size: 100,
            remove_source,
            ..SplitOptions::default()
        })
        .unwrap()
    }

    fn merger() -> Merger {
        Merger::new(MergeOptions {
            buffer_size: 333,
            ..MergeOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn four_and_a_quarter_units_make_two_parts() {
        let tmp = TempDir::new().unwrap();
        let (source, data) = write_source(tmp.path(), "game.nsp", 4 * UNIT + UNIT / 4);

        let report = splitter(4 * UNIT, true).split(&source, &NullSink).unwrap();
        let split_dir = tmp.path().join("game.split.nsp");
        assert_eq!(report.split_dir, split_dir);
        assert!(report.source_removed);
        assert!(!source.exists());
        assert_eq!(
            listing(&split_dir),
            [("00".to_string(), 4 * UNIT), ("01".to_string(), UNIT / 4)]
        );

        let merged = merger().merge(&split_dir, &NullSink).unwrap();
        assert_eq!(merged.merged_path, source);
        assert_eq!(fs::read(&source).unwrap(), data);
        assert!(!split_dir.exists());
    }

    #[test]
    fn smaller_than_chunk_is_single_part() {
        let tmp = TempDir::new().unwrap();
        let (source, data) = write_source(tmp.path(), "clip.mp4", UNIT - 1);

        splitter(UNIT, false).split(&source, &NullSink).unwrap();

        let split_dir = tmp.path().join("clip.split.mp4");
        assert_eq!(listing(&split_dir), [("00".to_string(), UNIT - 1)]);
        assert_eq!(fs::read(split_dir.join("00")).unwrap(), data);
        assert!(source.exists());
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let tmp = TempDir::new().unwrap();
        let (source, _) = write_source(tmp.path(), "disk.img", 3 * UNIT);

        let report = splitter(UNIT, false).split(&source, &NullSink).unwrap();
        assert_eq!(report.plan.sizes().collect::<Vec<_>>(), [UNIT, UNIT, UNIT]);
        assert_eq!(listing(&report.split_dir).len(), 3);
    }

    #[test]
    fn round_trip_across_sizes_and_chunks() {
        const BUFFER: usize = 8;
        let tmp = TempDir::new().unwrap();

        // Chunks below, equal to, above and a multiple of the read buffer.
        for chunk in [5u64, 8, 11, 16] {
            let split = Splitter::new(SplitOptions {
                max_chunk_size: chunk,
                buffer_size: BUFFER,
                remove_source: true,
                ..SplitOptions::default()
            })
            .unwrap();
            let merge = Merger::new(MergeOptions {
                buffer_size: BUFFER,
                ..MergeOptions::default()
            })
            .unwrap();

            for size in 0..=3 * chunk + 1 {
                let name = format!("s{size}c{chunk}.bin");
                let (source, data) = write_source(tmp.path(), &name, size);

                let report = split.split(&source, &NullSink).unwrap();
                assert_eq!(report.plan.part_count, size.div_ceil(chunk), "{name}");
                assert_eq!(
                    listing(&report.split_dir).len() as u64,
                    report.plan.part_count,
                    "{name}"
                );

                merge.merge(&report.split_dir, &NullSink).unwrap();
                assert_eq!(fs::read(&source).unwrap(), data, "{name}");
            }
        }
    }

    #[test]
    fn empty_split_set_merges_to_empty_file() {
        let tmp = TempDir::new().unwrap();
        let split_dir = tmp.path().join("blank.split.bin");
        fs::create_dir(&split_dir).unwrap();

        let report = merger().merge(&split_dir, &NullSink).unwrap();
        assert_eq!(report.total_bytes, 0);
        assert_eq!(fs::metadata(tmp.path().join("blank.bin")).unwrap().len(), 0);
    }

    #[test]
    fn many_parts_merge_in_numeric_order() {
        let tmp = TempDir::new().unwrap();
        let (source, data) = write_source(tmp.path(), "long.bin", 12 * 10 + 3);

        splitter(10, false).split(&source, &NullSink).unwrap();
        fs::remove_file(&source).unwrap();

        let split_dir = tmp.path().join("long.split.bin");
        let names: Vec<String> = listing(&split_dir).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.first().map(String::as_str), Some("00"));
        assert_eq!(names.last().map(String::as_str), Some("12"));

        merger().merge(&split_dir, &NullSink).unwrap();
        assert_eq!(fs::read(&source).unwrap(), data);
    }

    #[test]
    fn discovery_finds_split_sets_written_by_splitter() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("library").join("switch");
        fs::create_dir_all(&nested).unwrap();
        let (a, _) = write_source(tmp.path(), "a.nsp", 50);
        let (b, _) = write_source(&nested, "b.nsp", 50);

        let split = splitter(20, true);
        split.split(&a, &NullSink).unwrap();
        split.split(&b, &NullSink).unwrap();

        let found = collect_candidates(tmp.path(), "nsp", true, Mode::Merge).unwrap();
        assert_eq!(
            found,
            [tmp.path().join("a.split.nsp"), nested.join("b.split.nsp")]
        );
        assert!(found.iter().all(|p| is_split_directory(p)));

        // Parts inside a SplitSet never look like split candidates.
        let to_split = collect_candidates(tmp.path(), "nsp", true, Mode::Split).unwrap();
        assert!(to_split.is_empty());
    }

    #[test]
    fn naming_round_trips_through_the_filesystem() {
        let tmp = TempDir::new().unwrap();
        for name in ["game.nsp", "archive.tar.gz", "movie.split.mp4"] {
            let dir_name = split_dir_name(name).unwrap();
            assert_eq!(merged_name(&dir_name).unwrap(), name);

            let dir = tmp.path().join(&dir_name);
            fs::create_dir(&dir).unwrap();
            assert!(is_split_directory(&dir));
        }

        let plain = tmp.path().join("plain");
        fs::create_dir(&plain).unwrap();
        assert!(!is_split_directory(&plain));
    }
}
