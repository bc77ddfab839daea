//! Catalog to statistics, with a stand-in for the remote service.

use std::io::Cursor;
use std::time::Duration;

use lensfield_core::{Angle, SkyPoint};
use lensfield_survey::catalog::{CatalogColumns, LensCatalog};
use lensfield_survey::pipeline::{draw_controls, query_field_pair};
use lensfield_survey::query::{
    CancelHandle, CatalogObject, Completion, QueryError, RateLimitedQueryRunner, TargetTypes,
    TruncationReason,
};
use lensfield_survey::sampler::ControlPointSampler;
use rand::rngs::StdRng;
use rand::SeedableRng;

const CATALOG: &str = "\
name,RA,DEC,zlens,grading
# exported lens list
J0001,10.0,5.0,0.41,confident
J0002,50.0,-20.0,0.55,probable
J0003,120.0,33.0,,confident
J0004,200.0,-45.0,0.7,possible
J0005,300.0,60.0,0.33,confident
";

/// A quasar and a galaxy at every field center; an extra X-ray binary north
/// of the lenses at RA 10 and 50.
async fn sky(center: SkyPoint, _radius: Angle) -> Result<Vec<CatalogObject>, QueryError> {
    let mut objects = vec![
        CatalogObject::new("q", "QSO", center),
        CatalogObject::new("g", "G", center),
    ];
    if center.ra_deg() == 10.0 || center.ra_deg() == 50.0 {
        let offset = SkyPoint::new(center.ra_deg(), center.dec_deg() + 0.05).unwrap();
        objects.push(CatalogObject::new("x", "XRB", offset));
    }
    Ok(objects)
}

fn lenses() -> LensCatalog {
    let catalog =
        LensCatalog::from_reader(Cursor::new(CATALOG), &CatalogColumns::default()).unwrap();
    catalog.filter(&["confident", "probable"], true)
}

#[test]
fn test_catalog_filtering() {
    let catalog = lenses();
    let names: Vec<&str> = catalog.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["J0001", "J0002", "J0005"]);
}

#[tokio::test(start_paused = true)]
async fn test_lens_against_control_fields() {
    let catalog = lenses();
    let lens_points = catalog.positions();
    let mut rng = StdRng::seed_from_u64(7);
    let controls = draw_controls(
        &ControlPointSampler::new(),
        lens_points.len(),
        &catalog.exclusion_set(),
        Angle::from_arcminutes(20.0),
        false,
        &mut rng,
    )
    .unwrap();
    assert_eq!(controls.len(), lens_points.len());
    for control in &controls {
        for lens in &lens_points {
            assert!(control.separation(lens).arcminutes() > 20.0);
        }
    }

    let runner = RateLimitedQueryRunner::new(TargetTypes::default())
        .with_throttle(Duration::from_secs(1));
    let pair = query_field_pair(
        &runner,
        &lens_points,
        &controls,
        Angle::from_arcminutes(15.0),
        &sky,
        false,
    )
    .await;
    assert!(pair.is_complete());

    let lens_counts: Vec<_> = pair.lens.counts();
    assert_eq!(lens_counts, vec![Some(2), Some(2), Some(1)]);
    assert!(pair.control.counts().iter().all(|c| *c == Some(1)));

    let cmp = pair.comparison();
    assert_eq!(cmp.lens_total, 5);
    assert_eq!(cmp.control_total, 3);
    assert_eq!(cmp.lens_positive, 3);
    assert_eq!(cmp.control_positive, 3);
    assert!((cmp.mean_lens.unwrap() - 5.0 / 3.0).abs() < 1e-12);
    assert!((cmp.chi2.p_value - 1.0).abs() < 1e-12);

    // The quasar and the X-ray binary sit 3' apart in two lens fields.
    let (lens_seps, control_seps) = pair.pooled_separations();
    assert_eq!(lens_seps.len(), 2);
    assert!(lens_seps.iter().all(|s| (s - 3.0).abs() < 1e-6));
    assert!(control_seps.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_same_inputs_same_outcome() {
    let catalog = lenses();
    let runner = RateLimitedQueryRunner::new(TargetTypes::default());
    let radius = Angle::from_arcminutes(10.0);
    let points = catalog.positions();

    let first = runner.run(&points, radius, &sky).await;
    let second = runner.run(&points, radius, &sky).await;
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start() {
    let (handle, token) = CancelHandle::new();
    handle.cancel();
    let runner = RateLimitedQueryRunner::new(TargetTypes::default()).with_cancellation(token);

    let outcome = runner
        .run(&lenses().positions(), Angle::from_arcminutes(10.0), &sky)
        .await;
    assert!(outcome.is_empty());
    assert_eq!(outcome.requested(), 3);
    assert_eq!(
        outcome.completion(),
        Completion::Truncated(TruncationReason::Cancelled)
    );
}
