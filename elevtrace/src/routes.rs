//! GeoJSON route input and trace output.

use anyhow::{anyhow, Result};
use geo::{
    geometry::{Coord, LineString, Point},
    EuclideanDistance, LineLocatePoint,
};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use routeprof::{
    route_id, AttrValue, Crs, FeatureSink, FeatureSource, Geocoder, LineGeometry, ProfileError,
    RouteFeature, RouteRef, Trace3D,
};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

/// Routes read from a GeoJSON FeatureCollection.
pub struct GeojsonRoutes {
    crs: Crs,
    fields: Vec<String>,
    features: Vec<Feature>,
    id_field: Option<String>,
}

impl GeojsonRoutes {
    /// Reads `path`. The collection's legacy `crs` member, when
    /// present, overrides `default_crs`.
    pub fn open(path: &Path, default_crs: &Crs, id_field: Option<&str>) -> Result<Self> {
        let file = File::open(path)?;
        let collection = match GeoJson::from_reader(file)? {
            GeoJson::FeatureCollection(collection) => collection,
            _ => return Err(anyhow!("{} is not a FeatureCollection", path.display())),
        };
        let crs = collection
            .foreign_members
            .as_ref()
            .and_then(named_crs)
            .unwrap_or_else(|| default_crs.clone());

        let mut fields: Vec<String> = Vec::new();
        for properties in collection.features.iter().filter_map(|f| f.properties.as_ref()) {
            for key in properties.keys() {
                if !fields.contains(key) {
                    fields.push(key.clone());
                }
            }
        }

        Ok(Self {
            crs,
            fields,
            features: collection.features,
            id_field: id_field.map(str::to_owned),
        })
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    fn route(&self, seq: usize, feature: &Feature) -> Result<RouteFeature, ProfileError> {
        let line = line_string(seq, feature)?;
        let mut route = RouteFeature::new(LineGeometry::new(line, self.crs.clone()));
        if let Some(properties) = &feature.properties {
            for (key, value) in properties {
                route.attributes.insert(key.clone(), attr_value(value));
            }
        }
        route.fid = feature_id(feature);
        Ok(route)
    }

    /// Identifier of the feature at `seq`, by the same rule as batch
    /// traces use.
    fn route_ref(&self, seq: usize, feature: &Feature) -> RouteRef {
        let id_value = self
            .id_field
            .as_deref()
            .and_then(|field| feature.property(field))
            .map(attr_value);
        let id = route_id(id_value.as_ref(), feature_id(feature).as_deref(), seq);
        let route = RouteRef::new(id);
        match feature.property("name").and_then(JsonValue::as_str) {
            Some(name) => route.with_name(name),
            None => route,
        }
    }
}

impl FeatureSource for GeojsonRoutes {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn features(&self) -> Box<dyn Iterator<Item = Result<RouteFeature, ProfileError>> + '_> {
        Box::new(
            self.features
                .iter()
                .enumerate()
                .map(|(seq, feature)| self.route(seq, feature)),
        )
    }
}

impl Geocoder for GeojsonRoutes {
    fn forward(&self, route: &RouteRef) -> Result<Option<LineGeometry>, ProfileError> {
        self.features
            .iter()
            .enumerate()
            .find(|(seq, feature)| self.route_ref(*seq, feature).id == route.id)
            .map(|(seq, feature)| {
                line_string(seq, feature).map(|line| LineGeometry::new(line, self.crs.clone()))
            })
            .transpose()
    }

    fn inverse(
        &self,
        coord: Coord<f64>,
        crs: &Crs,
    ) -> Result<Option<(RouteRef, f64)>, ProfileError> {
        if crs != &self.crs {
            return Err(ProfileError::Geocoder(format!(
                "routes are in {}, not {crs}",
                self.crs
            )));
        }
        let point = Point::from(coord);
        let mut nearest: Option<(f64, usize, LineString<f64>)> = None;
        for (seq, feature) in self.features.iter().enumerate() {
            // Unreadable features cannot be nearest.
            let Ok(line) = line_string(seq, feature) else {
                continue;
            };
            let distance = point.euclidean_distance(&line);
            if nearest.as_ref().map_or(true, |(best, ..)| distance < *best) {
                nearest = Some((distance, seq, line));
            }
        }
        Ok(nearest.map(|(_, seq, line)| {
            let geometry = LineGeometry::new(line, self.crs.clone());
            let measure = geometry
                .line()
                .line_locate_point(&point)
                .map_or(0.0, |fraction| fraction * geometry.length());
            (self.route_ref(seq, &self.features[seq]), measure)
        }))
    }
}

fn named_crs(members: &JsonObject) -> Option<Crs> {
    members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(|name| {
            // Accept OGC URNs such as urn:ogc:def:crs:EPSG::3857.
            match name.rsplit_once("EPSG::") {
                Some((_, code)) => Crs::new(format!("EPSG:{code}")),
                None => Crs::new(name),
            }
        })
}

fn feature_id(feature: &Feature) -> Option<String> {
    feature.id.as_ref().map(|id| match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    })
}

fn attr_value(value: &JsonValue) -> AttrValue {
    match value {
        JsonValue::Null => AttrValue::Null,
        JsonValue::Bool(b) => AttrValue::Bool(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(AttrValue::Int)
            .or_else(|| n.as_f64().map(AttrValue::Real))
            .unwrap_or(AttrValue::Null),
        JsonValue::String(s) => AttrValue::Text(s.clone()),
        other => AttrValue::Text(other.to_string()),
    }
}

/// Reads a feature's geometry as a 2D line. Z values are dropped.
fn line_string(seq: usize, feature: &Feature) -> Result<LineString<f64>, ProfileError> {
    let invalid = |what: &str| ProfileError::InvalidGeometry(format!("feature {seq}: {what}"));
    let positions = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(geojson::Value::LineString(positions)) => positions,
        Some(geojson::Value::MultiLineString(parts)) if parts.len() == 1 => &parts[0],
        Some(geojson::Value::MultiLineString(parts)) => {
            return Err(invalid(&format!("MultiLineString with {} parts", parts.len())))
        }
        Some(_) => return Err(invalid("geometry is not a line")),
        None => return Err(invalid("no geometry")),
    };
    positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(invalid("position with fewer than 2 coordinates")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// Collects traces as GeoJSON features.
#[derive(Default)]
pub struct TraceWriter {
    crs: Option<Crs>,
    features: Vec<Feature>,
}

impl TraceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Writes the collected traces to `path`, through a temporary
    /// file so a failed run never leaves a partial output.
    pub fn finish(self, path: &Path) -> Result<()> {
        let foreign_members = self.crs.map(|crs| {
            let mut members = JsonObject::new();
            members.insert(
                "crs".into(),
                serde_json::json!({ "type": "name", "properties": { "name": crs.as_str() } }),
            );
            members
        });
        let collection = FeatureCollection {
            bbox: None,
            features: self.features,
            foreign_members,
        };
        let tmp_path = path.with_extension("tmp");
        let wtr = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(wtr, &collection)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }
}

impl FeatureSink for TraceWriter {
    fn add_feature(&mut self, trace: Trace3D) -> Result<(), ProfileError> {
        match &self.crs {
            None => self.crs = Some(trace.crs.clone()),
            Some(crs) if *crs != trace.crs => {
                return Err(ProfileError::Sink(format!(
                    "trace {} is in {}, collection is in {crs}",
                    trace.id, trace.crs
                )))
            }
            Some(_) => (),
        }
        let positions = trace.vertices.iter().map(|v| v.to_vec()).collect();
        let mut properties = JsonObject::new();
        properties.insert("id".into(), JsonValue::String(trace.id));
        self.features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::LineString(positions))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
        Ok(())
    }
}
