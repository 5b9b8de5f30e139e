//! Synthetic payload generation for load testing.
//!
//! Writes the canned request-body cases the service is exercised with:
//! fully matching ids, fully disjoint ids, one-sided documents and the
//! empty document, each scaled up to an approximate target size.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

/// Arguments for the gen command
#[derive(Parser, Debug)]
pub struct GenArgs {
    /// Approximate size of each generated file, in megabytes
    #[arg(long, default_value_t = 1)]
    pub size_mb: u64,

    /// Directory the case files are written into
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Length of generated names
    #[arg(long, default_value_t = 5)]
    pub name_len: usize,
}

/// Generate the canned payload cases
pub fn run_gen(args: GenArgs) -> Result<()> {
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {:?}", args.out_dir))?;

    let mut rng = rand::thread_rng();
    let cases: [(&str, usize, usize, f64); 5] = [
        ("case_match.json", 3, 3, 1.0),
        ("case_unpaired.json", 3, 3, 0.0),
        ("case_only_first.json", 3, 0, 0.0),
        ("case_only_last.json", 0, 3, 0.0),
        ("case_empty.json", 0, 0, 0.0),
    ];

    for (file_name, num_first, num_last, overlap) in cases {
        let path = args.out_dir.join(file_name);
        generate_case(
            &mut rng,
            args.size_mb * 1024 * 1024,
            num_first,
            num_last,
            overlap,
            args.name_len,
            &path,
        )?;
    }
    Ok(())
}

/// Random capitalized name-like string.
fn random_name(rng: &mut impl Rng, len: usize) -> String {
    let mut name = String::with_capacity(len);
    for i in 0..len.max(1) {
        let c = rng.gen_range(b'a'..=b'z') as char;
        if i == 0 {
            name.extend(c.to_uppercase());
        } else {
            name.push(c);
        }
    }
    name
}

/// Distinct random ids from `range`.
fn sample_ids(rng: &mut impl Rng, count: usize, range: std::ops::Range<i64>) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(count);
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        let id = rng.gen_range(range.clone());
        if seen.insert(id) {
            ids.push(id);
        }
    }
    ids
}

/// Write one case file. Base record counts are scaled up until the output
/// roughly reaches `target_bytes`; `overlap_ratio` controls how many last
/// ids are overwritten with first ids so they pair.
fn generate_case(
    rng: &mut impl Rng,
    target_bytes: u64,
    num_first: usize,
    num_last: usize,
    overlap_ratio: f64,
    name_len: usize,
    path: &Path,
) -> Result<()> {
    // Rough record cost: name + id + JSON overhead.
    let approx_record_size = (name_len + 20) as u64;
    let base_records = (num_first + num_last).max(1) as u64;
    let scale = (target_bytes / (base_records * approx_record_size)).max(1) as usize;

    let num_first = num_first * scale;
    let num_last = num_last * scale;

    // Disjoint id ranges by default; overlap is introduced explicitly.
    let ids_first = sample_ids(rng, num_first, 1..1_000_000_000);
    let mut ids_last = sample_ids(rng, num_last, 1_000_000_001..2_000_000_000);

    let overlap_size = (num_first.min(num_last) as f64 * overlap_ratio) as usize;
    if overlap_size > 0 {
        let mut shared = ids_first.clone();
        shared.shuffle(rng);
        ids_last[..overlap_size].copy_from_slice(&shared[..overlap_size]);
    }

    let mut first_names: Vec<_> = ids_first
        .into_iter()
        .map(|id| json!([random_name(rng, name_len), id]))
        .collect();
    let mut last_names: Vec<_> = ids_last
        .into_iter()
        .map(|id| json!([random_name(rng, name_len), id]))
        .collect();
    first_names.shuffle(rng);
    last_names.shuffle(rng);

    let document = json!({"first_names": first_names, "last_names": last_names});
    let writer = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create {path:?}"))?,
    );
    serde_json::to_writer(writer, &document)?;

    let size_mb = std::fs::metadata(path)?.len() as f64 / (1024.0 * 1024.0);
    println!("{}: {:.2} MB", path.display(), size_mb);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_cases_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        run_gen(GenArgs {
            size_mb: 0, // keep base counts, no scaling
            out_dir: dir.path().to_path_buf(),
            name_len: 5,
        })
        .unwrap();

        for case in [
            "case_match.json",
            "case_unpaired.json",
            "case_only_first.json",
            "case_only_last.json",
            "case_empty.json",
        ] {
            namemerge_core::validate_file(&dir.path().join(case))
                .unwrap_or_else(|e| panic!("{case} failed validation: {e}"));
        }
    }

    #[test]
    fn full_overlap_pairs_every_last_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.json");
        let mut rng = rand::thread_rng();
        generate_case(&mut rng, 0, 4, 4, 1.0, 5, &path).unwrap();

        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let ids = |key: &str| -> std::collections::BTreeSet<i64> {
            doc[key]
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item[1].as_i64().unwrap())
                .collect()
        };
        assert_eq!(ids("first_names"), ids("last_names"));
    }

    #[test]
    fn scaling_approaches_the_target_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.json");
        let mut rng = rand::thread_rng();
        generate_case(&mut rng, 256 * 1024, 3, 3, 0.5, 5, &path).unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert!(size > 64 * 1024, "generated only {size} bytes");
    }
}
