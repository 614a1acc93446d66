//! Batch generation of 3D route traces.

use crate::{
    crs::{Crs, TransformCache},
    feedback::Feedback,
    geometry::LineGeometry,
    raster::RasterSource,
    ProfileError,
};
use log::debug;
use std::{collections::HashMap, fmt};

/// A single attribute value of a route feature.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => f.write_str("NULL"),
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Real(r) => write!(f, "{r}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A route line with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFeature {
    pub geometry: LineGeometry,
    pub attributes: HashMap<String, AttrValue>,
    /// The source's own identifier for the feature, if it has one.
    pub fid: Option<String>,
}

impl RouteFeature {
    pub fn new(geometry: LineGeometry) -> Self {
        Self {
            geometry,
            attributes: HashMap::new(),
            fid: None,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, field: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn with_fid(mut self, fid: impl Into<String>) -> Self {
        self.fid = Some(fid.into());
        self
    }
}

/// Identifier of the route at position `seq` of its source.
///
/// The value of the identifier field when it is set and non-null,
/// else the source's feature id, else `seq`.
pub fn route_id(id_value: Option<&AttrValue>, fid: Option<&str>, seq: usize) -> String {
    match (id_value.filter(|value| !value.is_null()), fid) {
        (Some(value), _) => value.to_string(),
        (None, Some(fid)) => fid.to_owned(),
        (None, None) => seq.to_string(),
    }
}

/// An ordered collection of route features.
pub trait FeatureSource {
    /// Attribute field names declared by the source.
    fn fields(&self) -> &[String];

    fn feature_count(&self) -> usize;

    /// Features in source order. An `Err` item is a feature which
    /// could not be read as a route.
    fn features(&self) -> Box<dyn Iterator<Item = Result<RouteFeature, ProfileError>> + '_>;
}

/// In-memory [`FeatureSource`].
#[derive(Debug, Clone, Default)]
pub struct RouteLayer {
    fields: Vec<String>,
    features: Vec<RouteFeature>,
}

impl RouteLayer {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: RouteFeature) {
        self.features.push(feature);
    }
}

impl FeatureSource for RouteLayer {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn features(&self) -> Box<dyn Iterator<Item = Result<RouteFeature, ProfileError>> + '_> {
        Box::new(self.features.iter().cloned().map(Ok))
    }
}

/// A route line with an elevation at every vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace3D {
    /// Route identifier.
    pub id: String,

    /// CRS of `vertices` (the raster's).
    pub crs: Crs,

    /// `[x, y, z]` per vertex.
    pub vertices: Vec<[f64; 3]>,
}

/// Destination for generated traces.
pub trait FeatureSink {
    fn add_feature(&mut self, trace: Trace3D) -> Result<(), ProfileError>;
}

impl FeatureSink for Vec<Trace3D> {
    fn add_feature(&mut self, trace: Trace3D) -> Result<(), ProfileError> {
        self.push(trace);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    /// Stopped at a route boundary on request. Traces already written
    /// are kept.
    Canceled,
}

/// Counters and final status of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchRunState {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub status: RunStatus,
}

/// Generates a [`Trace3D`] for every route of a [`FeatureSource`].
///
/// A route which cannot be traced (no elevation at a vertex, no
/// transform for its CRS, unreadable geometry) is reported and
/// skipped. An unreadable raster or a failing sink aborts the run.
pub struct TraceGenerator<'a, R: ?Sized> {
    raster: &'a R,
    transforms: &'a TransformCache,
    id_field: Option<String>,
    interval_m: f64,
}

impl<'a, R> TraceGenerator<'a, R>
where
    R: RasterSource + ?Sized,
{
    pub fn new(raster: &'a R, transforms: &'a TransformCache) -> Self {
        Self {
            raster,
            transforms,
            id_field: None,
            interval_m: 0.0,
        }
    }

    /// Attribute holding the route identifier. Routes without it fall
    /// back as described in [`route_id`].
    #[must_use]
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    /// Maximum vertex spacing, measured as [`LineGeometry::length`]
    /// is. `0` (the default) keeps the original vertices.
    #[must_use]
    pub fn interval(mut self, meters: f64) -> Self {
        self.interval_m = meters;
        self
    }

    pub fn run<S, K, F>(
        &self,
        source: &S,
        sink: &mut K,
        feedback: &mut F,
    ) -> Result<BatchRunState, ProfileError>
    where
        S: FeatureSource + ?Sized,
        K: FeatureSink + ?Sized,
        F: Feedback + ?Sized,
    {
        if !self.interval_m.is_finite() || self.interval_m < 0.0 {
            return Err(ProfileError::InvalidParameter(format!(
                "trace interval must be zero or positive, got {}",
                self.interval_m
            )));
        }

        let total = source.feature_count();
        let id_field = match self.id_field.as_deref() {
            Some(field) if source.fields().iter().any(|f| f == field) => Some(field),
            Some(field) => {
                feedback.push_info(&format!(
                    "field '{field}' not found, identifying routes by sequence number"
                ));
                None
            }
            None => None,
        };

        let mut state = BatchRunState {
            status: RunStatus::Running,
            ..Default::default()
        };
        let now = std::time::Instant::now();

        for (seq, feature) in source.features().enumerate() {
            if feedback.is_canceled() {
                feedback.push_info("canceled");
                state.status = RunStatus::Canceled;
                break;
            }

            let (id, result) = match feature {
                Ok(feature) => {
                    let id_value = id_field.and_then(|field| feature.attributes.get(field));
                    let id = route_id(id_value, feature.fid.as_deref(), seq);
                    feedback.push_info(&format!("tracing route {id}"));
                    let result = self.trace(&feature.geometry, &id);
                    (id, result)
                }
                Err(e) => (seq.to_string(), Err(e)),
            };
            state.processed += 1;

            match result {
                Ok(trace) => {
                    if let Err(e) = sink.add_feature(trace) {
                        feedback.report_error(&format!("route {id}: {e}"));
                        return Err(e);
                    }
                    state.succeeded += 1;
                    feedback.push_info(&format!("route {id} done"));
                }
                Err(e @ ProfileError::RasterUnavailable(_)) => {
                    feedback.report_error(&format!("route {id}: {e}"));
                    return Err(e);
                }
                Err(e) => {
                    state.failed += 1;
                    feedback.report_error(&format!("route {id}: {e}"));
                }
            }

            feedback.set_progress(percent(state.processed, total));
        }

        if state.status == RunStatus::Running {
            state.status = RunStatus::Completed;
        }
        feedback.push_info(&format!(
            "{} routes traced, {} failed",
            state.succeeded, state.failed
        ));
        debug!("batch; {state:?}, exec: {:?}", now.elapsed());

        Ok(state)
    }

    /// Densifies `line` if requested, then looks up every vertex in
    /// the raster's CRS.
    fn trace(&self, line: &LineGeometry, id: &str) -> Result<Trace3D, ProfileError> {
        let densified;
        let line = if self.interval_m > 0.0 {
            densified = line.densify(self.interval_m)?;
            &densified
        } else {
            line
        };
        if line.line().0.len() < 2 {
            return Err(ProfileError::InvalidGeometry(format!(
                "route {id} has fewer than 2 vertices"
            )));
        }

        let raster_crs = self.raster.crs();
        let transform = self.transforms.get(line.crs(), raster_crs)?;
        let mut vertices = Vec::with_capacity(line.line().0.len());
        for vertex in line.vertices() {
            let position = match &transform {
                Some(transform) => transform.transform(vertex)?,
                None => vertex,
            };
            let z = self
                .raster
                .query_elevation(position)?
                .ok_or(ProfileError::NoElevationData {
                    x: vertex.x,
                    y: vertex.y,
                })?;
            vertices.push([position.x, position.y, z]);
        }

        Ok(Trace3D {
            id: id.to_owned(),
            crs: raster_crs.clone(),
            vertices,
        })
    }
}


#[allow(clippy::cast_precision_loss)]
fn percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (processed as f64 / total as f64 * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AttrValue, FeatureSink, FeatureSource, RouteFeature, RouteLayer, RunStatus, Trace3D,
        TraceGenerator,
    };
    use crate::{
        crs::{Crs, TransformCache},
        feedback::Feedback,
        geometry::LineGeometry,
        lookup::tests::CountingTransforms,
        raster::{GridRaster, RasterSource},
        ProfileError,
    };
    use geo::{geometry::Coord, line_string};
    use std::sync::atomic::Ordering;

    /// Records everything and cancels after `cancel_after` routes.
    #[derive(Default)]
    struct Recorder {
        infos: Vec<String>,
        errors: Vec<String>,
        progress: Vec<f64>,
        cancel_after: Option<usize>,
    }

    impl Feedback for Recorder {
        fn push_info(&mut self, msg: &str) {
            self.infos.push(msg.to_owned());
        }

        fn report_error(&mut self, msg: &str) {
            self.errors.push(msg.to_owned());
        }

        fn set_progress(&mut self, percent: f64) {
            self.progress.push(percent);
        }

        fn is_canceled(&self) -> bool {
            self.cancel_after
                .map_or(false, |n| self.progress.len() >= n)
        }
    }

    /// 100 × 10 m of 100 m terrain in web mercator, starting at the
    /// origin.
    fn raster() -> GridRaster {
        GridRaster::constant(
            Crs::web_mercator(),
            Coord { x: 0.0, y: 10.0 },
            1.0,
            (100, 10),
            100.0,
        )
        .unwrap()
    }

    fn route(x0: f64, x1: f64) -> RouteFeature {
        RouteFeature::new(LineGeometry::new(
            line_string![(x: x0, y: 5.0), (x: x1, y: 5.0)],
            Crs::web_mercator(),
        ))
    }

    fn layer(routes: impl IntoIterator<Item = RouteFeature>) -> RouteLayer {
        let mut layer = RouteLayer::new(["route_id"]);
        for r in routes {
            layer.push(r);
        }
        layer
    }

    #[test]
    fn test_failed_route_is_isolated() {
        let source = layer([
            route(1.0, 9.0).with_attr("route_id", AttrValue::Text("A".into())),
            route(150.0, 160.0).with_attr("route_id", AttrValue::Text("B".into())),
            route(20.0, 30.0).with_attr("route_id", AttrValue::Text("C".into())),
        ]);
        let raster = raster();
        let transforms = TransformCache::default();
        let mut sink = Vec::new();
        let mut feedback = Recorder::default();

        let state = TraceGenerator::new(&raster, &transforms)
            .id_field("route_id")
            .run(&source, &mut sink, &mut feedback)
            .unwrap();

        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!((state.processed, state.succeeded, state.failed), (3, 2, 1));
        assert_eq!(
            sink.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            ["A", "C"]
        );
        assert_eq!(feedback.errors.len(), 1);
        assert!(feedback.errors[0].contains("route B"));
        assert!(feedback.errors[0].contains("no elevation data"));
        assert_eq!(feedback.progress.last(), Some(&100.0));
        assert!(feedback.infos.last().unwrap().contains("2 routes traced, 1 failed"));
    }

    #[test]
    fn test_cancel_between_routes() {
        let source = layer((0..5).map(|i| route(i as f64 * 10.0, i as f64 * 10.0 + 5.0)));
        let raster = raster();
        let transforms = TransformCache::default();
        let mut sink = Vec::new();
        let mut feedback = Recorder {
            cancel_after: Some(2),
            ..Default::default()
        };

        let state = TraceGenerator::new(&raster, &transforms)
            .run(&source, &mut sink, &mut feedback)
            .unwrap();

        assert_eq!(state.status, RunStatus::Canceled);
        assert_eq!(sink.len(), 2);
        assert!(*feedback.progress.last().unwrap() <= 40.0);
    }

    #[test]
    fn test_unavailable_raster_aborts() {
        struct Closed(Crs);
        impl RasterSource for Closed {
            fn crs(&self) -> &Crs {
                &self.0
            }
            fn query_elevation(&self, _: Coord<f64>) -> Result<Option<f64>, ProfileError> {
                Err(ProfileError::RasterUnavailable("closed".into()))
            }
        }

        let source = layer([route(1.0, 2.0), route(3.0, 4.0)]);
        let raster = Closed(Crs::web_mercator());
        let transforms = TransformCache::default();
        let mut sink: Vec<Trace3D> = Vec::new();
        let mut feedback = Recorder::default();

        let result = TraceGenerator::new(&raster, &transforms).run(&source, &mut sink, &mut feedback);
        assert!(matches!(result, Err(ProfileError::RasterUnavailable(_))));
        assert!(sink.is_empty());
        assert_eq!(feedback.errors.len(), 1);
    }

    #[test]
    fn test_id_fallback_to_sequence() {
        let source = layer([
            route(1.0, 2.0).with_attr("route_id", AttrValue::Int(42)),
            route(3.0, 4.0).with_attr("route_id", AttrValue::Null),
            route(5.0, 6.0),
            route(7.0, 8.0).with_fid("rtss-17"),
            route(7.0, 8.0)
                .with_fid("rtss-18")
                .with_attr("route_id", AttrValue::Text("B".into())),
        ]);
        let raster = raster();
        let transforms = TransformCache::default();

        let mut sink = Vec::new();
        TraceGenerator::new(&raster, &transforms)
            .id_field("route_id")
            .run(&source, &mut sink, &mut Recorder::default())
            .unwrap();
        assert_eq!(
            sink.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            ["42", "1", "2", "rtss-17", "B"]
        );

        // Unknown field: every route falls back.
        let mut sink = Vec::new();
        let mut feedback = Recorder::default();
        TraceGenerator::new(&raster, &transforms)
            .id_field("missing")
            .run(&source, &mut sink, &mut feedback)
            .unwrap();
        assert_eq!(
            sink.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            ["0", "1", "2", "rtss-17", "rtss-18"]
        );
        assert!(feedback.infos[0].contains("'missing' not found"));
    }

    #[test]
    fn test_interval() {
        let source = layer([route(0.0, 10.0)]);
        let raster = raster();
        let transforms = TransformCache::default();

        let mut sink = Vec::new();
        TraceGenerator::new(&raster, &transforms)
            .run(&source, &mut sink, &mut Recorder::default())
            .unwrap();
        assert_eq!(
            sink[0].vertices,
            vec![[0.0, 5.0, 100.0], [10.0, 5.0, 100.0]]
        );
        assert_eq!(sink[0].crs, Crs::web_mercator());

        let mut sink = Vec::new();
        TraceGenerator::new(&raster, &transforms)
            .interval(2.5)
            .run(&source, &mut sink, &mut Recorder::default())
            .unwrap();
        assert_eq!(sink[0].vertices.len(), 5);
        assert!(sink[0].vertices.iter().all(|v| v[2] == 100.0));

        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let mut sink = Vec::new();
            let mut feedback = Recorder::default();
            assert!(matches!(
                TraceGenerator::new(&raster, &transforms)
                    .interval(bad)
                    .run(&source, &mut sink, &mut feedback),
                Err(ProfileError::InvalidParameter(_))
            ));
            assert!(feedback.infos.is_empty());
        }
    }

    #[test]
    fn test_reprojected_routes_share_transform() {
        let counters = CountingTransforms::default();
        let transforms = TransformCache::new(counters.clone());
        let raster = raster();
        // Degrees just east of null island land inside the raster.
        let wgs84_route = || {
            RouteFeature::new(LineGeometry::new(
                line_string![(x: 0.00001, y: 0.00004), (x: 0.00005, y: 0.00004)],
                Crs::wgs84(),
            ))
        };
        let source = layer([wgs84_route(), wgs84_route(), wgs84_route()]);
        let mut sink = Vec::new();
        let state = TraceGenerator::new(&raster, &transforms)
            .run(&source, &mut sink, &mut Recorder::default())
            .unwrap();

        assert_eq!(state.succeeded, 3);
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.calls.load(Ordering::SeqCst), 6);
        assert!(sink[0].vertices[0][0] > 1.0 && sink[0].vertices[0][0] < 2.0);
    }

    #[test]
    fn test_unreadable_feature_is_skipped() {
        struct Partial(Vec<String>);
        impl FeatureSource for Partial {
            fn fields(&self) -> &[String] {
                &self.0
            }
            fn feature_count(&self) -> usize {
                2
            }
            fn features(
                &self,
            ) -> Box<dyn Iterator<Item = Result<RouteFeature, ProfileError>> + '_> {
                Box::new(
                    [
                        Err(ProfileError::InvalidGeometry("polygon".into())),
                        Ok(route(1.0, 2.0)),
                    ]
                    .into_iter(),
                )
            }
        }

        let raster = raster();
        let transforms = TransformCache::default();
        let mut sink = Vec::new();
        let mut feedback = Recorder::default();
        let state = TraceGenerator::new(&raster, &transforms)
            .run(&Partial(vec![]), &mut sink, &mut feedback)
            .unwrap();
        assert_eq!((state.succeeded, state.failed), (1, 1));
        assert_eq!(sink[0].id, "1");
        assert!(feedback.errors[0].starts_with("route 0"));
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        struct Full;
        impl FeatureSink for Full {
            fn add_feature(&mut self, _: Trace3D) -> Result<(), ProfileError> {
                Err(ProfileError::Sink("disk full".into()))
            }
        }

        let source = layer([route(1.0, 2.0), route(3.0, 4.0)]);
        let raster = raster();
        let transforms = TransformCache::default();
        let mut feedback = Recorder::default();
        assert!(matches!(
            TraceGenerator::new(&raster, &transforms).run(&source, &mut Full, &mut feedback),
            Err(ProfileError::Sink(_))
        ));
        assert_eq!(feedback.errors.len(), 1);
        assert!(feedback.errors[0].starts_with("route 0"));
        assert!(feedback.errors[0].contains("disk full"));
    }

    #[test]
    fn test_unknown_crs_is_isolated() {
        let unknown = RouteFeature::new(LineGeometry::new(
            line_string![(x: 1.0, y: 5.0), (x: 2.0, y: 5.0)],
            Crs::new("EPSG:999999"),
        ));
        let source = layer([route(1.0, 9.0), unknown, route(20.0, 30.0)]);
        let raster = raster();
        let transforms = TransformCache::default();
        let mut sink = Vec::new();
        let mut feedback = Recorder::default();

        let state = TraceGenerator::new(&raster, &transforms)
            .run(&source, &mut sink, &mut feedback)
            .unwrap();

        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!((state.succeeded, state.failed), (2, 1));
        assert_eq!(
            sink.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            ["0", "2"]
        );
        assert_eq!(feedback.errors.len(), 1);
        assert!(feedback.errors[0].starts_with("route 1"));
        assert!(feedback.errors[0].contains("EPSG:999999"));
    }

    #[test]
    fn test_single_vertex_route_is_skipped() {
        let point = RouteFeature::new(LineGeometry::new(
            line_string![(x: 3.0, y: 5.0)],
            Crs::web_mercator(),
        ));
        let source = layer([point, route(1.0, 9.0)]);
        let raster = raster();
        let transforms = TransformCache::default();
        let mut sink = Vec::new();
        let mut feedback = Recorder::default();

        let state = TraceGenerator::new(&raster, &transforms)
            .run(&source, &mut sink, &mut feedback)
            .unwrap();

        assert_eq!((state.succeeded, state.failed), (1, 1));
        assert_eq!(sink[0].id, "1");
        assert!(feedback.errors[0].contains("fewer than 2 vertices"));
    }

    #[test]
    fn test_geographic_interval_in_meters() {
        // About 4.5 m long, densified to 1 m spacing.
        let source = layer([RouteFeature::new(LineGeometry::new(
            line_string![(x: 0.00001, y: 0.00004), (x: 0.00005, y: 0.00004)],
            Crs::wgs84(),
        ))]);
        let raster = raster();
        let transforms = TransformCache::default();
        let mut sink = Vec::new();
        TraceGenerator::new(&raster, &transforms)
            .interval(1.0)
            .run(&source, &mut sink, &mut Recorder::default())
            .unwrap();
        assert!(sink[0].vertices.len() >= 6);
        assert!(sink[0].vertices.iter().all(|v| v[2] == 100.0));
        assert!(sink[0].vertices.windows(2).all(|w| w[0][0] < w[1][0]));
    }
}
