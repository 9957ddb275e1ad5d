//! Integration test: walkers and filters over real spaces

mod common;

use common::{ints, GbmParams};
use kolosal_grid::filter::FilteringIterator;
use kolosal_grid::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn drain(mut it: Box<dyn HyperSpaceIterator>) -> Vec<RawPoint> {
    let mut points = Vec::new();
    while it.has_next() {
        match it.next_point() {
            Some(p) => points.push(p),
            None => break,
        }
    }
    points
}

#[test]
fn test_cartesian_mixed_radix_order() {
    let space = HyperSpace::new()
        .with_param("ntrees", [1, 2])
        .with_param("max_depth", [1, 2, 5]);
    let walker = create_walker(
        GbmParams::default(),
        space,
        SearchCriteria::cartesian(),
        FieldNaming::Consistent,
    )
    .unwrap();
    assert_eq!(walker.hyper_space_size(), 6);

    let order: Vec<(i64, i64)> = drain(walker.iterator())
        .iter()
        .map(|p| (ints(p, "ntrees"), ints(p, "max_depth")))
        .collect();
    assert_eq!(order, vec![(1, 1), (2, 1), (1, 2), (2, 2), (1, 5), (2, 5)]);
}

#[test]
fn test_cartesian_completeness() {
    let space = HyperSpace::new()
        .with_param("ntrees", [10, 20, 30])
        .with_param("max_depth", [2, 4])
        .with_param("learn_rate", [0.1, 0.05])
        .with_param("histogram_type", ["uniform_adaptive", "random"]);
    let walker = create_walker(
        GbmParams::default(),
        space,
        SearchCriteria::cartesian(),
        FieldNaming::Consistent,
    )
    .unwrap();

    let points = drain(walker.iterator());
    assert_eq!(points.len(), 24);
    let distinct: HashSet<String> = points.iter().map(|p| p.to_string()).collect();
    assert_eq!(distinct.len(), 24);
}

#[test]
fn test_random_walk_is_reproducible() {
    let space = HyperSpace::from_json_str(
        r#"{"ntrees": [10, 20, 30, 40], "max_depth": [2, 3, 4, 5, 6]}"#,
    )
    .unwrap();
    let walk = |seed| {
        let walker = create_walker(
            GbmParams::default(),
            space.clone(),
            SearchCriteria::random_discrete(seed).with_max_models(8),
            FieldNaming::Consistent,
        )
        .unwrap();
        drain(walker.iterator())
    };

    let first = walk(2024);
    assert_eq!(first.len(), 8);
    assert_eq!(first, walk(2024));
    assert_ne!(first, walk(2025));
}

#[test]
fn test_sequential_walker_builds_rows() {
    let table = HyperTable::new(
        vec!["ntrees".into(), "learn_rate".into()],
        vec![
            vec![100.into(), 0.01.into()],
            vec![50.into(), HyperValue::Null],
        ],
    )
    .unwrap();
    let walker = create_walker(
        GbmParams::default(),
        table,
        SearchCriteria::sequential(),
        FieldNaming::Consistent,
    )
    .unwrap();

    let params: Vec<GbmParams> = drain(walker.iterator())
        .iter()
        .map(|p| walker.build_params(p).unwrap())
        .collect();
    assert_eq!(params.len(), 2);
    assert_eq!((params[0].ntrees, params[0].learn_rate), (100, 0.01));
    assert_eq!((params[1].ntrees, params[1].learn_rate), (50, 0.1));
}

#[test]
fn test_filter_budget_on_ten_point_space() {
    let space = HyperSpace::new().with_param("max_depth", (1..=10).collect::<Vec<i64>>());
    let walker = CartesianWalker::new(GbmParams::default(), space, FieldNaming::Consistent).unwrap();
    let mut it = FilteringIterator::new(
        walker.iterator(),
        Arc::new(|p: &RawPoint| ints(p, "max_depth") % 2 == 0),
        walker.hyper_space_size(),
        3,
    );

    let mut accepted = Vec::new();
    while it.has_next() {
        if let Some(p) = it.next_point() {
            accepted.push(ints(&p, "max_depth"));
        }
    }
    assert_eq!(accepted, vec![2, 4, 6]);
    assert!(it.visited() <= 10);
}

#[test]
fn test_filtered_walker_over_subspaces() {
    let space = HyperSpace::from_json_str(
        r#"{
            "ntrees": [10, 20],
            "subspaces": [
                {"max_depth": [3, 6]},
                {"learn_rate": [0.1, 0.2]}
            ]
        }"#,
    )
    .unwrap();
    let inner = create_walker(
        GbmParams::default(),
        space,
        SearchCriteria::cartesian(),
        FieldNaming::Consistent,
    )
    .unwrap();
    let filtered = FilteredWalker::new(inner, |p: &RawPoint| {
        !matches!(p.get("max_depth"), Some(HyperValue::Int(6)))
    });

    assert_eq!(filtered.hyper_space_size(), 8);
    let points = drain(filtered.iterator());
    assert_eq!(points.len(), 6);
    assert!(points.iter().all(|p| p.get("max_depth") != Some(&HyperValue::Int(6))));
}

#[test]
fn test_pinned_parameter_rejected() {
    let base = GbmParams {
        ntrees: 300,
        ..Default::default()
    };
    let space = HyperSpace::new().with_param("ntrees", [10, 20]);
    let result = create_walker(base, space, SearchCriteria::cartesian(), FieldNaming::Consistent);
    assert!(matches!(result, Err(GridError::SpaceConstruction(_))));
}
