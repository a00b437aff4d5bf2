//! Wire types for the asynchronous geoprocessing job REST API.
//!
//! Covers the three calls a client makes against a job service:
//! - `submitJob` with named form parameters
//! - `jobs/{jobId}` status polling
//! - `jobs/{jobId}/results/{paramName}` output retrieval
//!
//! Geometries travel in Esri JSON (`{x, y}` points, `{rings}` polygons).

use foundation::{Point, Polygon, SpatialReference};
use layers::{Attributes, Feature};
use serde::{Deserialize, Serialize};

/// Name of the viewshed service's polygon output parameter.
pub const VIEWSHED_OUTPUT: &str = "OutputViewshed";

/// Lifecycle state of a job.
///
/// `None` and `Cleared` are client-local: no server job exists in either.
/// The remaining states mirror what the service reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(skip)]
    None,
    #[serde(rename = "esriJobNew")]
    New,
    #[serde(rename = "esriJobSubmitted")]
    Submitted,
    #[serde(rename = "esriJobWaiting")]
    Waiting,
    #[serde(rename = "esriJobExecuting")]
    Executing,
    #[serde(rename = "esriJobCancelling")]
    Cancelling,
    #[serde(rename = "esriJobCancelled")]
    Cancelled,
    #[serde(rename = "esriJobDeleting")]
    Deleting,
    #[serde(rename = "esriJobDeleted")]
    Deleted,
    #[serde(rename = "esriJobTimedOut")]
    TimedOut,
    #[serde(rename = "esriJobFailed")]
    Failed,
    #[serde(rename = "esriJobSucceeded")]
    Succeeded,
    #[serde(skip)]
    Cleared,
}

impl JobStatus {
    pub const ALL: [JobStatus; 13] = [
        JobStatus::None,
        JobStatus::New,
        JobStatus::Submitted,
        JobStatus::Waiting,
        JobStatus::Executing,
        JobStatus::Cancelling,
        JobStatus::Cancelled,
        JobStatus::Deleting,
        JobStatus::Deleted,
        JobStatus::TimedOut,
        JobStatus::Failed,
        JobStatus::Succeeded,
        JobStatus::Cleared,
    ];

    /// Short lowercase name, e.g. `"executing"` or `"timed-out"`.
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::None => "none",
            JobStatus::New => "new",
            JobStatus::Submitted => "submitted",
            JobStatus::Waiting => "waiting",
            JobStatus::Executing => "executing",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Deleting => "deleting",
            JobStatus::Deleted => "deleted",
            JobStatus::TimedOut => "timed-out",
            JobStatus::Failed => "failed",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Cleared => "cleared",
        }
    }

    /// Statuses that end polling. `Cancelling` and `Deleting` are transient.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded
                | JobStatus::Cancelled
                | JobStatus::Deleted
                | JobStatus::TimedOut
                | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A service message, normalized to a short kind (`"Error"`, `"Warning"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireMessage")]
pub struct JobMessage {
    pub kind: String,
    pub description: String,
}

impl JobMessage {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self::new("Error", description)
    }
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    description: String,
}

impl From<WireMessage> for JobMessage {
    fn from(wire: WireMessage) -> Self {
        let kind = wire
            .kind
            .strip_prefix("esriJobMessageType")
            .map(str::to_string)
            .unwrap_or(wire.kind);
        JobMessage {
            kind,
            description: wire.description,
        }
    }
}

/// Job snapshot as returned by submit and by every status poll.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobInfo {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "jobStatus")]
    pub status: JobStatus,
    #[serde(default)]
    pub messages: Vec<JobMessage>,
}

impl JobInfo {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<JobMessage>) -> Self {
        self.messages = messages;
        self
    }
}

/// Terrain model granularity used by the service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DemResolution {
    #[default]
    Finest,
    TenMeter,
    TwentyFourMeter,
    ThirtyMeter,
    NinetyMeter,
}

impl DemResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemResolution::Finest => "FINEST",
            DemResolution::TenMeter => "10m",
            DemResolution::TwentyFourMeter => "24m",
            DemResolution::ThirtyMeter => "30m",
            DemResolution::NinetyMeter => "90m",
        }
    }
}

impl std::str::FromStr for DemResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finest" => Ok(DemResolution::Finest),
            "10m" => Ok(DemResolution::TenMeter),
            "24m" => Ok(DemResolution::TwentyFourMeter),
            "30m" => Ok(DemResolution::ThirtyMeter),
            "90m" => Ok(DemResolution::NinetyMeter),
            other => Err(format!(
                "unknown DEM resolution '{other}' (expected FINEST, 10m, 24m, 30m or 90m)"
            )),
        }
    }
}

impl std::fmt::Display for DemResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One viewshed analysis, immutable once submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub location: Point,
    /// Meters, must be positive.
    pub max_distance: f64,
    pub dem_resolution: DemResolution,
    /// Meters above the surface.
    pub observer_height: f64,
    pub surface_offset: f64,
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<(), String> {
        if !self.max_distance.is_finite() || self.max_distance <= 0.0 {
            return Err(format!(
                "maximum distance must be a positive number of meters, got {}",
                self.max_distance
            ));
        }
        if !self.observer_height.is_finite() {
            return Err("observer height must be finite".to_string());
        }
        if !self.surface_offset.is_finite() {
            return Err("surface offset must be finite".to_string());
        }
        if !self.location.x.is_finite() || !self.location.y.is_finite() {
            return Err("observer location must have finite coordinates".to_string());
        }
        Ok(())
    }
}

/// Named `submitJob` form parameters, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitParameters {
    pairs: Vec<(&'static str, String)>,
}

impl SubmitParameters {
    pub fn viewshed(request: &AnalysisRequest) -> Self {
        let sr = request.location.spatial_reference;
        let input_points = input_point_feature_set(&request.location);
        let pairs = vec![
            ("InputPoints", input_points.to_string()),
            ("MaximumDistance", format_number(request.max_distance)),
            ("MaximumDistanceUnits", "Meters".to_string()),
            ("DEMResolution", request.dem_resolution.as_str().to_string()),
            ("ObserverHeight", format_number(request.observer_height)),
            ("ObserverHeightUnits", "Meters".to_string()),
            ("SurfaceOffset", format_number(request.surface_offset)),
            ("SurfaceOffsetUnits", "Meters".to_string()),
            ("GeneralizeViewshedPolygons", "true".to_string()),
            ("env:outSR", sr.wkid.to_string()),
        ];
        Self { pairs }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

fn format_number(v: f64) -> String {
    format!("{v}")
}

/// Single-point feature set. The service rejects z values, so none are sent.
fn input_point_feature_set(location: &Point) -> serde_json::Value {
    let sr = serde_json::json!({ "wkid": location.spatial_reference.wkid });
    serde_json::json!({
        "geometryType": "esriGeometryPoint",
        "spatialReference": sr,
        "features": [{
            "geometry": { "x": location.x, "y": location.y, "spatialReference": sr },
            "attributes": {}
        }]
    })
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSpatialReference {
    #[serde(default)]
    pub wkid: Option<u32>,
    #[serde(rename = "latestWkid", default, skip_serializing_if = "Option::is_none")]
    pub latest_wkid: Option<u32>,
}

impl WireSpatialReference {
    fn resolve(&self) -> Option<SpatialReference> {
        self.wkid.or(self.latest_wkid).map(SpatialReference::new)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireFeature {
    #[serde(default)]
    pub geometry: Option<WirePolygon>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WirePolygon {
    pub rings: Vec<Vec<Vec<f64>>>,
    #[serde(rename = "spatialReference", default)]
    pub spatial_reference: Option<WireSpatialReference>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FeatureSetValue {
    #[serde(default)]
    pub features: Vec<WireFeature>,
    #[serde(rename = "spatialReference", default)]
    pub spatial_reference: Option<WireSpatialReference>,
}

/// Output parameter as returned by `jobs/{jobId}/results/{paramName}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterValue {
    #[serde(rename = "paramName", default)]
    pub param_name: String,
    #[serde(rename = "dataType", default)]
    pub data_type: String,
    #[serde(default)]
    pub value: FeatureSetValue,
}

/// Attribute table of a viewshed polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewshedAttributes {
    #[serde(rename = "DEMResolution", default, skip_serializing_if = "Option::is_none")]
    pub dem_resolution: Option<String>,
    #[serde(rename = "ProductName", default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(rename = "Source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "Source_URL", default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(rename = "PerimeterKm", default, skip_serializing_if = "Option::is_none")]
    pub perimeter_km: Option<f64>,
    #[serde(rename = "AreaSqKm", default, skip_serializing_if = "Option::is_none")]
    pub area_sq_km: Option<f64>,
    #[serde(rename = "Shape_Length", default, skip_serializing_if = "Option::is_none")]
    pub shape_length: Option<f64>,
    #[serde(rename = "Shape_Area", default, skip_serializing_if = "Option::is_none")]
    pub shape_area: Option<f64>,
}

/// The single feature a successful viewshed job produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewshedFeature {
    pub geometry: Polygon,
    pub attributes: ViewshedAttributes,
}

impl ViewshedFeature {
    /// Decodes an output feature. `fallback` applies when neither the
    /// geometry nor the feature set names a spatial reference.
    pub fn from_wire(
        wire: &WireFeature,
        set_sr: Option<WireSpatialReference>,
        fallback: SpatialReference,
    ) -> Result<Self, String> {
        let geometry = wire
            .geometry
            .as_ref()
            .ok_or_else(|| "viewshed feature has no geometry".to_string())?;
        let sr = geometry
            .spatial_reference
            .and_then(|s| s.resolve())
            .or_else(|| set_sr.and_then(|s| s.resolve()))
            .unwrap_or(fallback);

        let mut rings = Vec::with_capacity(geometry.rings.len());
        for ring in &geometry.rings {
            let mut out = Vec::with_capacity(ring.len());
            for coord in ring {
                match coord.as_slice() {
                    [x, y, ..] => out.push([*x, *y]),
                    _ => return Err("polygon vertex needs at least two coordinates".to_string()),
                }
            }
            rings.push(out);
        }
        if rings.is_empty() {
            return Err("viewshed polygon has no rings".to_string());
        }

        let attributes: ViewshedAttributes =
            serde_json::from_value(serde_json::Value::Object(wire.attributes.clone()))
                .map_err(|e| format!("invalid viewshed attributes: {e}"))?;

        Ok(Self {
            geometry: Polygon::new(rings, sr),
            attributes,
        })
    }

    pub fn into_feature(self) -> Feature {
        let mut attributes = Attributes::new();
        if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(&self.attributes) {
            attributes.extend(map);
        }
        Feature {
            object_id: None,
            geometry: self.geometry.into(),
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnalysisRequest, DemResolution, JobInfo, JobMessage, JobStatus, ParameterValue,
        SubmitParameters, ViewshedFeature,
    };
    use foundation::{Point, SpatialReference};
    use pretty_assertions::assert_eq;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            location: Point::new(0.0, 0.0, SpatialReference::WEB_MERCATOR).with_z(35.0),
            max_distance: 5000.0,
            dem_resolution: DemResolution::Finest,
            observer_height: 2.0,
            surface_offset: 0.0,
        }
    }

    #[test]
    fn status_decodes_service_names() {
        let info: JobInfo = serde_json::from_str(
            r#"{"jobId":"j1","jobStatus":"esriJobTimedOut","messages":[
                {"type":"esriJobMessageTypeError","description":"DEM unavailable"},
                {"type":"esriJobMessageTypeInformative","description":"Started"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(info.status, JobStatus::TimedOut);
        assert_eq!(
            info.messages,
            vec![
                JobMessage::new("Error", "DEM unavailable"),
                JobMessage::new("Informative", "Started"),
            ]
        );
    }

    #[test]
    fn unknown_or_local_statuses_are_rejected_on_the_wire() {
        assert!(serde_json::from_str::<JobStatus>(r#""esriJobPaused""#).is_err());
        assert!(serde_json::from_str::<JobStatus>(r#""None""#).is_err());
        assert!(serde_json::from_str::<JobStatus>(r#""Cleared""#).is_err());
    }

    #[test]
    fn terminal_and_transient_statuses() {
        let terminal: Vec<_> = JobStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![
                &JobStatus::Cancelled,
                &JobStatus::Deleted,
                &JobStatus::TimedOut,
                &JobStatus::Failed,
                &JobStatus::Succeeded,
            ]
        );
        assert!(!JobStatus::Cancelling.is_terminal());
        assert!(!JobStatus::Deleting.is_terminal());
    }

    #[test]
    fn submit_parameters_cover_the_service_contract() {
        let params = SubmitParameters::viewshed(&request());
        assert_eq!(params.get("MaximumDistance"), Some("5000"));
        assert_eq!(params.get("MaximumDistanceUnits"), Some("Meters"));
        assert_eq!(params.get("DEMResolution"), Some("FINEST"));
        assert_eq!(params.get("ObserverHeight"), Some("2"));
        assert_eq!(params.get("ObserverHeightUnits"), Some("Meters"));
        assert_eq!(params.get("SurfaceOffset"), Some("0"));
        assert_eq!(params.get("SurfaceOffsetUnits"), Some("Meters"));
        assert_eq!(params.get("GeneralizeViewshedPolygons"), Some("true"));
        assert_eq!(params.get("env:outSR"), Some("102100"));

        let points: serde_json::Value =
            serde_json::from_str(params.get("InputPoints").unwrap()).unwrap();
        let geometry = &points["features"][0]["geometry"];
        assert_eq!(points["features"].as_array().map(Vec::len), Some(1));
        assert_eq!(geometry["x"], 0.0);
        assert!(geometry.get("z").is_none());
    }

    #[test]
    fn request_validation_rejects_non_positive_distance() {
        let mut req = request();
        req.max_distance = 0.0;
        assert!(req.validate().is_err());
        req.max_distance = f64::NAN;
        assert!(req.validate().is_err());
        assert!(request().validate().is_ok());
    }

    #[test]
    fn dem_resolution_parses_case_insensitively() {
        assert_eq!("finest".parse::<DemResolution>(), Ok(DemResolution::Finest));
        assert_eq!("90M".parse::<DemResolution>(), Ok(DemResolution::NinetyMeter));
        assert!("5m".parse::<DemResolution>().is_err());
    }

    #[test]
    fn result_feature_decodes_into_a_layer_feature() {
        let value: ParameterValue = serde_json::from_str(
            r#"{"paramName":"OutputViewshed","dataType":"GPFeatureRecordSetLayer",
                "value":{"spatialReference":{"wkid":102100,"latestWkid":3857},
                "features":[{"geometry":{"rings":[[[0,0],[0,10],[10,10],[0,0]]]},
                "attributes":{"OBJECTID":1,"DEMResolution":"10m","ProductName":"NED",
                "Source":"USGS","PerimeterKm":12.5,"AreaSqKm":3.25}}]}}"#,
        )
        .unwrap();
        let feature = ViewshedFeature::from_wire(
            &value.value.features[0],
            value.value.spatial_reference,
            SpatialReference::WGS84,
        )
        .unwrap();
        assert_eq!(feature.geometry.spatial_reference, SpatialReference::WEB_MERCATOR);
        assert_eq!(feature.geometry.rings[0][2], [10.0, 10.0]);
        assert_eq!(feature.attributes.product_name.as_deref(), Some("NED"));
        assert_eq!(feature.attributes.area_sq_km, Some(3.25));

        let layer_feature = feature.into_feature();
        assert_eq!(layer_feature.attribute("DEMResolution"), Some(&serde_json::json!("10m")));
        assert!(layer_feature.attribute("Source_URL").is_none());
    }

    #[test]
    fn result_feature_without_geometry_is_an_error() {
        let value: ParameterValue =
            serde_json::from_str(r#"{"value":{"features":[{"attributes":{}}]}}"#).unwrap();
        assert!(
            ViewshedFeature::from_wire(&value.value.features[0], None, SpatialReference::WGS84)
                .is_err()
        );
    }
}
