use approx::assert_relative_eq;
use famtree::crossvalidation::{CrossValidator, EvaluatorOptions, MaeAccumulation, ERROR_SENTINEL};
use famtree::filter::PresenceFilter;
use famtree::io::parser::family_importer::{load_families_from_path, LoadOptions};
use famtree::io::parser::newick_parser::NewickParser;
use famtree::io::parser::query_importer::QueryCases;
use famtree::io::writer::table_writer::{write_families, write_query_cases};
use famtree::model::{BirthDeathCache, FamilySizeDomain, Viterbi};
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

const TREE: &str = "((human:6,chimp:6):81,(mouse:17,rat:17):70);";

const FAMILIES: &str = "Desc\tFamily ID\thuman\tchimp\tmouse\trat
kinase\tF1\t2\t2\t1\t1
olfactory\tF2\t5\t4\t0\t0
histone\tF3\t3\t3\t3\t2
orphan\tF4\t0\t0\t0\t1
zinc finger\tF5\t2\t2\t1\t1
";

#[test]
fn filter_then_cross_validate() {
    let dir = TempDir::new().unwrap();
    let family_path = dir.path().join("families.tab");
    File::create(&family_path)
        .unwrap()
        .write_all(FAMILIES.as_bytes())
        .unwrap();

    let loaded = load_families_from_path(&family_path, &LoadOptions::default()).unwrap();
    assert!(loaded.diagnostics.is_empty());
    let mut families = loaded.families;
    assert_eq!(families.max_size(), 5);

    let mut tree = NewickParser::parse_string(TREE).unwrap();
    let mut domain = FamilySizeDomain::for_max_size(families.max_size());
    let outcome = PresenceFilter.apply(&mut families, &mut tree, &mut domain).unwrap();
    assert_eq!(outcome.families_after, 3);
    assert_eq!(outcome.max_size_after, 3);
    let ids: Vec<&str> = families.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["F1", "F3", "F5"]);
    let refs: Vec<Option<usize>> = families.records().iter().map(|r| r.reference_index).collect();
    assert_eq!(refs, vec![Some(0), Some(1), Some(0)]);
    assert!(!tree.has_marks());

    let truth_path = dir.path().join("truth.tab");
    write_families(File::create(&truth_path).unwrap(), &families, b'\t').unwrap();

    let mut cases = QueryCases::default();
    for record in families.records() {
        cases.push(&record.id, "human", record.counts[0]);
    }
    let query_path = dir.path().join("query.tab");
    write_query_cases(File::create(&query_path).unwrap(), &cases).unwrap();

    tree.set_lambda(0.002);
    let mut cache = BirthDeathCache::new();
    let summary = CrossValidator::new(&mut tree, &mut cache, &Viterbi)
        .evaluate(&query_path, &truth_path)
        .unwrap();
    assert_eq!(summary.cases.len(), 3);
    // the filter leaves the last family (F5) on the tips and only human is
    // overwritten per case, so F3 is compared against 3,2,1,1
    assert_relative_eq!(summary.cases[0].sse, 0.0);
    assert_relative_eq!(summary.cases[1].sse, 6.0);
    assert_relative_eq!(summary.cases[1].sae, 4.0);
    assert_relative_eq!(summary.mse, 1.5 / 3.0);
    assert_relative_eq!(summary.mae, 1.0 / 3.0);
    assert!(!cache.is_ready());

    let options = EvaluatorOptions {
        posterior: false,
        mae_accumulation: MaeAccumulation::Historical,
    };
    let historical = CrossValidator::new(&mut tree, &mut cache, &Viterbi)
        .with_options(options)
        .evaluate_by_family(&query_path, &truth_path, "MSE");
    assert_relative_eq!(historical, 2.5 / 3.0);

    let missing = dir.path().join("missing.tab");
    let value = CrossValidator::new(&mut tree, &mut cache, &Viterbi).evaluate_by_family(&query_path, &missing, "MSE");
    assert_eq!(value, ERROR_SENTINEL);
}
