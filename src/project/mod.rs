//! Project data model: zero point, measurements and assets.
//!
//! The on-disk format is JSON with camelCase keys. Points are stored in one
//! list; assets carry `"type": "asset"`, measurements carry `mode` and a
//! mode-specific `data` object. In memory both are variants of
//! [`ProjectPoint`], so a measurement can never hold the wrong data shape.

pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::core::constants::DEFAULT_MAP_CENTER;
use crate::core::geo::LatLng;
use crate::core::viewport::View;
use crate::{MapError, Result};

/// Source of unique identifiers for projects and points.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids, starting at 1.
#[derive(Debug, Default)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

/// A geographic position as stored in project files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPosition {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// Reference origin for local measurements.
pub type ZeroPoint = GeoPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMode {
    Baseline,
    Triangulation,
}

impl MeasurementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Triangulation => "triangulation",
        }
    }
}

/// Measured distances in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Distance along the baseline and perpendicular offset from it
    Baseline { x: f64, y: f64 },
    /// Distances from two reference points
    Triangulation { dist_a: f64, dist_b: f64 },
}

impl Measurement {
    pub fn mode(&self) -> MeasurementMode {
        match self {
            Self::Baseline { .. } => MeasurementMode::Baseline,
            Self::Triangulation { .. } => MeasurementMode::Triangulation,
        }
    }

    /// Local-frame offset, when the measurement has one.
    pub fn local_offset(&self) -> Option<(f64, f64)> {
        match *self {
            Self::Baseline { x, y } => Some((x, y)),
            Self::Triangulation { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        let values = match *self {
            Self::Baseline { x, y } => [x, y],
            Self::Triangulation { dist_a, dist_b } => [dist_a, dist_b],
        };
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(MapError::InvalidProject(format!(
                "{} measurement has a non-finite value",
                self.mode().as_str()
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    pub id: String,
    pub label: String,
    pub measurement: Measurement,
    /// Geographic position, when one has been resolved
    pub position: Option<GeoPosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: String,
    /// Catalogue id such as `sedan`; unknown ids are kept verbatim
    pub asset_type: String,
    pub position: Option<GeoPosition>,
}

impl Asset {
    /// Human-readable name from the asset catalogue, or the raw type.
    pub fn display_name(&self) -> &str {
        asset_kind(&self.asset_type)
            .map(|kind| kind.name)
            .unwrap_or(self.asset_type.as_str())
    }
}

/// Entry in the built-in asset catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetKind {
    pub id: &'static str,
    pub name: &'static str,
}

pub const ASSET_LIBRARY: [AssetKind; 4] = [
    AssetKind { id: "sedan", name: "Generic Sedan" },
    AssetKind { id: "pickup", name: "Generic Pickup" },
    AssetKind { id: "cone", name: "Traffic Cone" },
    AssetKind { id: "marker", name: "Evidence Marker" },
];

pub fn asset_kind(id: &str) -> Option<&'static AssetKind> {
    ASSET_LIBRARY.iter().find(|kind| kind.id == id)
}

/// One entry of a project's point list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint", into = "RawPoint")]
pub enum ProjectPoint {
    Measurement(MeasurementPoint),
    Asset(Asset),
}

/// Wire shape shared by both point kinds.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPoint {
    id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<MeasurementMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<RawData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<GeoPosition>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    #[serde(rename = "distA", default, skip_serializing_if = "Option::is_none")]
    dist_a: Option<f64>,
    #[serde(rename = "distB", default, skip_serializing_if = "Option::is_none")]
    dist_b: Option<f64>,
}

impl TryFrom<RawPoint> for ProjectPoint {
    type Error = MapError;

    fn try_from(raw: RawPoint) -> Result<Self> {
        match raw.kind.as_deref() {
            Some("asset") => {
                let asset_type = raw.asset_type.ok_or_else(|| {
                    MapError::InvalidProject(format!("asset {} has no assetType", raw.id))
                })?;
                Ok(Self::Asset(Asset {
                    id: raw.id,
                    asset_type,
                    position: raw.position,
                }))
            }
            Some(other) => Err(MapError::InvalidProject(format!(
                "point {} has unknown type `{}`",
                raw.id, other
            ))),
            None => {
                let mode = raw.mode.ok_or_else(|| {
                    MapError::InvalidProject(format!("measurement {} has no mode", raw.id))
                })?;
                let data = raw.data.unwrap_or_default();
                let missing = |field: &str| {
                    MapError::InvalidProject(format!(
                        "{} measurement {} is missing `{}`",
                        mode.as_str(),
                        raw.id,
                        field
                    ))
                };
                let measurement = match mode {
                    MeasurementMode::Baseline => Measurement::Baseline {
                        x: data.x.ok_or_else(|| missing("x"))?,
                        y: data.y.ok_or_else(|| missing("y"))?,
                    },
                    MeasurementMode::Triangulation => Measurement::Triangulation {
                        dist_a: data.dist_a.ok_or_else(|| missing("distA"))?,
                        dist_b: data.dist_b.ok_or_else(|| missing("distB"))?,
                    },
                };
                let position = match (raw.latitude, raw.longitude) {
                    (Some(latitude), Some(longitude)) => Some(GeoPosition::new(longitude, latitude)),
                    _ => None,
                };
                Ok(Self::Measurement(MeasurementPoint {
                    id: raw.id,
                    label: raw.label.unwrap_or_default(),
                    measurement,
                    position,
                }))
            }
        }
    }
}

impl From<ProjectPoint> for RawPoint {
    fn from(point: ProjectPoint) -> Self {
        match point {
            ProjectPoint::Measurement(m) => {
                let data = match m.measurement {
                    Measurement::Baseline { x, y } => RawData {
                        x: Some(x),
                        y: Some(y),
                        ..RawData::default()
                    },
                    Measurement::Triangulation { dist_a, dist_b } => RawData {
                        dist_a: Some(dist_a),
                        dist_b: Some(dist_b),
                        ..RawData::default()
                    },
                };
                RawPoint {
                    id: m.id,
                    label: Some(m.label),
                    mode: Some(m.measurement.mode()),
                    data: Some(data),
                    latitude: m.position.map(|p| p.latitude),
                    longitude: m.position.map(|p| p.longitude),
                    ..RawPoint::default()
                }
            }
            ProjectPoint::Asset(a) => RawPoint {
                id: a.id,
                kind: Some("asset".to_string()),
                asset_type: Some(a.asset_type),
                position: a.position,
                ..RawPoint::default()
            },
        }
    }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// `[longitude, latitude, zoom]`
    pub map_center: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_point: Option<ZeroPoint>,
    #[serde(default)]
    pub points: Vec<ProjectPoint>,
}

impl Project {
    /// Starts an empty project centered on the default location.
    pub fn create(name: impl Into<String>, ids: &dyn IdGenerator, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(3);
        Self {
            id: ids.next_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            map_center: DEFAULT_MAP_CENTER,
            zero_point: None,
            points: Vec::new(),
        }
    }

    pub fn view(&self) -> View {
        View::from_map_center(self.map_center)
    }

    pub fn set_view(&mut self, view: &View, now: DateTime<Utc>) {
        self.map_center = view.to_map_center();
        self.touch(now);
    }

    pub fn set_zero_point(&mut self, zero_point: Option<ZeroPoint>, now: DateTime<Utc>) -> Result<()> {
        if let Some(point) = &zero_point {
            point.lat_lng().validate()?;
        }
        self.zero_point = zero_point;
        self.touch(now);
        Ok(())
    }

    /// Appends a measurement. The label must not be blank.
    pub fn add_measurement(
        &mut self,
        label: &str,
        measurement: Measurement,
        position: Option<GeoPosition>,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> Result<&MeasurementPoint> {
        let label = label.trim();
        if label.is_empty() {
            return Err(MapError::InvalidProject("measurement label is empty".to_string()));
        }
        measurement.validate()?;

        self.points.push(ProjectPoint::Measurement(MeasurementPoint {
            id: ids.next_id(),
            label: label.to_string(),
            measurement,
            position,
        }));
        self.touch(now);
        match self.points.last() {
            Some(ProjectPoint::Measurement(m)) => Ok(m),
            _ => Err(MapError::InvalidProject("measurement was not stored".to_string())),
        }
    }

    /// Places an asset at the center of `view`.
    pub fn add_asset(
        &mut self,
        asset_type: &str,
        view: &View,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
    ) -> Result<&Asset> {
        if asset_type.trim().is_empty() {
            return Err(MapError::InvalidProject("asset type is empty".to_string()));
        }
        if asset_kind(asset_type).is_none() {
            log::warn!("placing asset of unknown type `{}`", asset_type);
        }

        self.points.push(ProjectPoint::Asset(Asset {
            id: ids.next_id(),
            asset_type: asset_type.to_string(),
            position: Some(GeoPosition::new(view.longitude, view.latitude)),
        }));
        self.touch(now);
        match self.points.last() {
            Some(ProjectPoint::Asset(a)) => Ok(a),
            _ => Err(MapError::InvalidProject("asset was not stored".to_string())),
        }
    }

    pub fn measurements(&self) -> impl Iterator<Item = &MeasurementPoint> {
        self.points.iter().filter_map(|p| match p {
            ProjectPoint::Measurement(m) => Some(m),
            ProjectPoint::Asset(_) => None,
        })
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.points.iter().filter_map(|p| match p {
            ProjectPoint::Asset(a) => Some(a),
            ProjectPoint::Measurement(_) => None,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.trunc_subsecs(3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_create_uses_injected_ids_and_defaults() {
        let ids = SequentialIds::new("p");
        let project = Project::create("Crash 12", &ids, at(0));
        assert_eq!(project.id, "p-1");
        assert_eq!(project.map_center, [-58.8344, -27.469213, 16.0]);
        assert_eq!(project.created_at, project.updated_at);
        assert!(project.points.is_empty());
        assert_eq!(ids.next_id(), "p-2");
    }

    #[test]
    fn test_add_points() {
        let ids = SequentialIds::new("id");
        let mut project = Project::create("Scene", &ids, at(0));

        let m = project
            .add_measurement("  Skid Mark ", Measurement::Baseline { x: 3.5, y: -1.0 }, None, &ids, at(5))
            .unwrap();
        assert_eq!(m.label, "Skid Mark");
        assert!(project
            .add_measurement("   ", Measurement::Baseline { x: 0.0, y: 0.0 }, None, &ids, at(6))
            .is_err());

        let view = View::new(-58.83, -27.46, 17.0);
        let asset = project.add_asset("cone", &view, &ids, at(10)).unwrap();
        assert_eq!(asset.display_name(), "Traffic Cone");
        assert_eq!(asset.position, Some(GeoPosition::new(-58.83, -27.46)));

        assert_eq!(project.measurements().count(), 1);
        assert_eq!(project.assets().count(), 1);
        assert_eq!(project.updated_at, at(10));
    }

    #[test]
    fn test_parse_mixed_points() {
        let json = r#"{
            "id": "abc",
            "name": "Night crash",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-01T10:30:00.000Z",
            "mapCenter": [-58.8344, -27.469213, 16],
            "points": [
                { "id": "m1", "label": "P1", "mode": "baseline", "data": { "x": 10, "y": 0 } },
                { "id": "m2", "label": "P2", "mode": "triangulation", "data": { "distA": 4.2, "distB": 6.1 },
                  "latitude": -27.4691, "longitude": -58.8341 },
                { "id": "a1", "type": "asset", "assetType": "sedan",
                  "position": { "longitude": -58.8344, "latitude": -27.469213 } }
            ]
        }"#;
        let project = Project::from_json(json).unwrap();
        assert_eq!(project.points.len(), 3);
        assert_eq!(project.zero_point, None);

        match &project.points[0] {
            ProjectPoint::Measurement(m) => {
                assert_eq!(m.measurement, Measurement::Baseline { x: 10.0, y: 0.0 });
                assert_eq!(m.position, None);
            }
            other => panic!("expected measurement, got {:?}", other),
        }
        match &project.points[1] {
            ProjectPoint::Measurement(m) => {
                assert_eq!(m.measurement.mode(), MeasurementMode::Triangulation);
                assert_eq!(m.position, Some(GeoPosition::new(-58.8341, -27.4691)));
            }
            other => panic!("expected measurement, got {:?}", other),
        }
        match &project.points[2] {
            ProjectPoint::Asset(a) => assert_eq!(a.display_name(), "Generic Sedan"),
            other => panic!("expected asset, got {:?}", other),
        }
    }

    #[test]
    fn test_mode_and_data_must_agree() {
        let bad = r#"{ "id": "m1", "label": "P1", "mode": "triangulation", "data": { "x": 1, "y": 2 } }"#;
        assert!(serde_json::from_str::<ProjectPoint>(bad).is_err());

        let unknown = r#"{ "id": "x", "type": "vehicle" }"#;
        assert!(serde_json::from_str::<ProjectPoint>(unknown).is_err());
    }

    #[test]
    fn test_point_wire_shape() {
        let asset = ProjectPoint::Asset(Asset {
            id: "a1".into(),
            asset_type: "bus".into(),
            position: None,
        });
        let value = serde_json::to_value(&asset).unwrap();
        assert_eq!(value, serde_json::json!({ "id": "a1", "type": "asset", "assetType": "bus" }));

        let m = ProjectPoint::Measurement(MeasurementPoint {
            id: "m1".into(),
            label: "P1".into(),
            measurement: Measurement::Triangulation { dist_a: 1.5, dist_b: 2.0 },
            position: None,
        });
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "m1", "label": "P1", "mode": "triangulation",
                "data": { "distA": 1.5, "distB": 2.0 }
            })
        );
    }

    #[test]
    fn test_timestamps_keep_millisecond_format() {
        let project = Project::create("T", &SequentialIds::new("t"), at(0));
        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(value["createdAt"], "2023-11-14T22:13:20.000Z");
        assert!(value.get("zeroPoint").is_none());
    }

    #[test]
    fn test_zero_point_must_be_projectable() {
        let mut project = Project::create("Z", &SequentialIds::new("z"), at(0));
        assert!(project.set_zero_point(Some(ZeroPoint::new(0.0, 90.0)), at(1)).is_err());
        project
            .set_zero_point(Some(ZeroPoint::new(-58.8344, -27.469213)), at(2))
            .unwrap();
        let json = project.to_json().unwrap();
        assert!(json.contains("\"zeroPoint\""));
        assert_eq!(Project::from_json(&json).unwrap(), project);
    }
}
