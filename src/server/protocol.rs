//! JSON-RPC protocol types for the cleaner server

use serde::{Deserialize, Serialize};

use crate::clean::CleanAxes;
use crate::engine::{JobId, JobSpec, OutputFormat};
use crate::geometry::{BBox, Edge};

/// JSON-RPC Request format
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// JSON-RPC Response format
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// JSON-RPC Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}

impl Response {
    /// Create a success response with a JSON value
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Response {
            id,
            result: None,
            error: Some(ErrorResponse { code, message }),
        }
    }

    /// Success response from any serializable result
    pub fn from_serializable<T: Serialize>(id: Option<serde_json::Value>, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::error(
                id,
                error_codes::INTERNAL_ERROR,
                format!("Failed to serialize result: {}", e),
            ),
        }
    }
}

/// Params of a `Submit` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitParams {
    pub layer: u32,
    pub datatype: u32,
    pub min_width: i32,
    pub min_space: i32,
    pub bbox: BBox,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_correction: Option<bool>,
    #[serde(default)]
    pub axes: CleanAxes,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<u32>,
}

impl SubmitParams {
    pub fn job_id(&self) -> JobId {
        JobId::new(self.layer, self.datatype)
    }

    pub fn into_job(self) -> JobSpec {
        let mut job = JobSpec::new(self.job_id(), self.bbox, self.min_width, self.min_space)
            .with_edges(self.edges)
            .with_correction(self.apply_correction)
            .with_axes(self.axes)
            .with_output(self.output);
        if let Some(passes) = self.max_passes {
            job.rules = job.rules.with_max_passes(passes);
        }
        job
    }

    pub fn from_job(job: &JobSpec) -> Self {
        SubmitParams {
            layer: job.id.layer,
            datatype: job.id.datatype,
            min_width: job.rules.min_width,
            min_space: job.rules.min_space,
            bbox: job.bbox,
            edges: job.edges.clone(),
            apply_correction: Some(job.rules.apply_correction),
            axes: job.rules.axes,
            output: job.output,
            max_passes: Some(job.rules.max_passes),
        }
    }
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Custom error codes
    pub const DUPLICATE_JOB: i32 = 2;
    pub const UNKNOWN_JOB: i32 = 3;
    pub const ALREADY_RETRIEVED: i32 = 4;
    pub const JOB_FAILED: i32 = 5;
    pub const TIMEOUT: i32 = 6;
    pub const SHUTTING_DOWN: i32 = 7;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_params_defaults() {
        let params: SubmitParams = serde_json::from_str(
            r#"{"layer":31,"datatype":0,"min_width":5,"min_space":5,"bbox":[0,100,0,50]}"#,
        )
        .unwrap();
        assert!(params.edges.is_empty());
        assert_eq!(params.axes, CleanAxes::Horizontal);
        assert_eq!(params.output, OutputFormat::Rows);

        let job = params.into_job();
        assert_eq!(job.id, JobId::new(31, 0));
        assert!(job.rules.apply_correction);
        assert_eq!(job.rules.max_passes, crate::clean::DEFAULT_MAX_PASSES);

        let params: SubmitParams = serde_json::from_str(
            r#"{"layer":31,"datatype":0,"min_width":5,"min_space":5,"bbox":[0,100,0,50],"max_passes":0}"#,
        )
        .unwrap();
        assert_eq!(params.into_job().rules.max_passes, 1);
    }

    #[test]
    fn test_submit_params_round_trip_keeps_explicit_flag() {
        let job = JobSpec::new(JobId::new(2, 1), BBox::new(0, 10, 0, 10), 1, 1).with_correction(Some(true));
        let json = serde_json::to_string(&SubmitParams::from_job(&job)).unwrap();
        let back: SubmitParams = serde_json::from_str(&json).unwrap();
        assert!(back.into_job().rules.apply_correction);
    }

    #[test]
    fn test_error_response_omits_result() {
        let json = serde_json::to_string(&Response::error(Some(1.into()), error_codes::TIMEOUT, "late".into())).unwrap();
        assert_eq!(json, r#"{"id":1,"error":{"code":6,"message":"late"}}"#);
    }
}
