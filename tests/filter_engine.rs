use std::collections::BTreeSet;
use std::sync::Arc;

use plotdata::data::filter::{FilterError, apply_filter, prepare_expression, quoted_column_names};
use plotdata::data::manager::DataManager;
use plotdata::data::model::{Dataset, TableView, Value};

fn mjd_dataset() -> Dataset {
    Dataset::new(
        vec!["MJD".into(), "Col A".into(), "band".into()],
        vec![
            vec![Value::Integer(51000), Value::Integer(52500), Value::Integer(60100)],
            vec![Value::Float(5.0), Value::Float(12.5), Value::Float(20.0)],
            vec![
                Value::String("g".into()),
                Value::String("r".into()),
                Value::String("g".into()),
            ],
        ],
    )
    .unwrap()
}

fn ab_dataset() -> Arc<Dataset> {
    Arc::new(
        Dataset::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Integer(0), Value::Integer(2), Value::Integer(3)],
                vec![Value::Integer(1), Value::Integer(1), Value::Integer(5)],
            ],
        )
        .unwrap(),
    )
}

fn manager() -> DataManager {
    let mut dm = DataManager::default();
    dm.set_dataset(mjd_dataset(), None);
    dm
}

#[test]
fn clearing_shows_the_full_dataset_again() {
    let mut dm = manager();
    let full = dm.display_data().unwrap();
    dm.apply_filter("MJD > 52000").unwrap();
    assert_ne!(dm.display_data().unwrap(), full);

    dm.clear_filter();
    dm.clear_filter();
    assert_eq!(dm.display_data().unwrap(), full);
    assert!(!dm.display_data().unwrap().is_filtered());
}

#[test]
fn filtering_keeps_columns_and_source_order() {
    let mut dm = manager();
    dm.apply_filter("band == 'g'").unwrap();
    let view = dm.display_data().unwrap();
    assert_eq!(view.column_names(), mjd_dataset().column_names());
    let rows: Vec<usize> = (0..view.n_rows()).map(|r| view.source_row(r)).collect();
    assert_eq!(rows, vec![0, 2]);
    assert_eq!(view.value(1, 0), &Value::Integer(60100));
}

#[test]
fn selected_rows_are_exactly_the_matching_ones() {
    let ds = ab_dataset();
    let outcome = apply_filter("a + b >= 3 or b == 1 and a == 0", Some(&ds)).unwrap();
    let view = outcome.view.unwrap();
    for r in 0..ds.n_rows() {
        let (a, b) = (
            ds.value(r, 0).as_f64().unwrap(),
            ds.value(r, 1).as_f64().unwrap(),
        );
        let expected = a + b >= 3.0 || (b == 1.0 && a == 0.0);
        let selected = (0..view.n_rows()).any(|v| view.source_row(v) == r);
        assert_eq!(selected, expected, "row {r}");
    }
}

#[test]
fn names_with_spaces_are_quoted_and_plain_names_are_not() {
    let cols = vec!["Col A".to_string(), "x".to_string()];
    assert_eq!(prepare_expression("Col A > 10", &cols), "`Col A` > 10");
    assert_eq!(prepare_expression("x > 10", &cols), "x > 10");

    let ds = Arc::new(
        Dataset::new(
            cols,
            vec![
                vec![Value::Integer(5), Value::Integer(50)],
                vec![Value::Integer(20), Value::Integer(1)],
            ],
        )
        .unwrap(),
    );
    let outcome = apply_filter("x > 10", Some(&ds)).unwrap();
    assert_eq!(outcome.view.unwrap().n_rows(), 1);
    let outcome = apply_filter("Col A > 10", Some(&ds)).unwrap();
    assert_eq!(outcome.view.unwrap().source_row(0), 1);
}

#[test]
fn unknown_quoted_columns_are_reported_together() {
    let ds = ab_dataset();
    let err = apply_filter("`a` > 1 & `c` < 5", Some(&ds)).unwrap_err();
    assert_eq!(err, FilterError::UnknownColumn(BTreeSet::from(["c".to_string()])));
    let message = err.to_string();
    assert!(message.contains('c'));
    assert!(message.contains("backticks"));
    assert!(message.contains("Available columns"));

    let err = apply_filter("`zz` > 1 | `yy` < 5 | a > 0", Some(&ds)).unwrap_err();
    assert_eq!(
        err,
        FilterError::UnknownColumn(BTreeSet::from(["yy".to_string(), "zz".to_string()]))
    );
}

#[test]
fn no_match_is_an_error_and_keeps_the_selection() {
    let mut dm = manager();
    dm.apply_filter("band == 'r'").unwrap();
    assert_eq!(dm.apply_filter("MJD > 99999"), Err(FilterError::EmptyResult));
    assert_eq!(dm.display_data().unwrap().n_rows(), 1);
}

#[test]
fn blank_expression_clears() {
    let mut dm = manager();
    dm.apply_filter("MJD > 52000").unwrap();
    for blank in ["", "   ", "\n\t"] {
        assert_eq!(dm.apply_filter(blank).unwrap(), "Filter cleared");
        assert!(!dm.has_filter());
        assert_eq!(dm.display_data().unwrap().n_rows(), 3);
    }
}

#[test]
fn mjd_window_selects_one_row() {
    let ds = Arc::new(mjd_dataset());
    let outcome = apply_filter("`MJD` > 52000 & `MJD` < 60000", Some(&ds)).unwrap();
    let view = outcome.view.unwrap();
    assert_eq!(view.n_rows(), 1);
    assert_eq!(view.value(0, 0), &Value::Integer(52500));
    assert!(outcome.message.contains('1') && outcome.message.contains('3'));
}

#[test]
fn word_connectives_match_symbols() {
    let ds = ab_dataset();
    let words = apply_filter("`a` > 1 and `b` < 2", Some(&ds)).unwrap();
    let symbols = apply_filter("`a` > 1 & `b` < 2", Some(&ds)).unwrap();
    assert_eq!(words.view, symbols.view);
    assert_eq!(words.expression, symbols.expression);

    let words = apply_filter("a == 0 OR b == 5", Some(&ds)).unwrap();
    let symbols = apply_filter("a == 0 | b == 5", Some(&ds)).unwrap();
    assert_eq!(words.view, symbols.view);
}

#[test]
fn invalid_and_undefined_expressions() {
    let ds = ab_dataset();
    assert_eq!(
        apply_filter("a > 1", None).unwrap_err(),
        FilterError::NoDataLoaded
    );
    assert_eq!(
        apply_filter("a > limit", Some(&ds)).unwrap_err(),
        FilterError::UndefinedIdentifier("limit".into())
    );
    assert!(matches!(
        apply_filter("a >", Some(&ds)).unwrap_err(),
        FilterError::InvalidExpression(_)
    ));
    assert!(matches!(
        apply_filter("a + 1", Some(&ds)).unwrap_err(),
        FilterError::InvalidExpression(_)
    ));
}

#[test]
fn filtering_never_touches_the_source() {
    let ds = Arc::new(mjd_dataset());
    let before = (*ds).clone();
    let first = apply_filter("MJD > 52000", Some(&ds)).unwrap();
    let second = apply_filter("MJD < 52000", Some(&ds)).unwrap();
    assert_eq!(*ds, before);
    assert_eq!(first.view.unwrap().n_rows(), 2);
    assert_eq!(second.view.unwrap().n_rows(), 1);
    assert_eq!(TableView::full(ds).n_rows(), 3);
}

#[test]
fn quoted_names_helper() {
    assert_eq!(
        quoted_column_names(&mjd_dataset()),
        vec!["`MJD`", "`Col A`", "`band`"]
    );
}
